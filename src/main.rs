use std::io::Write;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use tokio::runtime::Runtime;

use manifest_uploader::cli::Args;
use manifest_uploader::cloud::s3::S3Store;
use manifest_uploader::config::UploadConfig;
use manifest_uploader::pipeline::run_upload;
use manifest_uploader::UploadError;

fn main() {
    let args = Args::parse();

    if let Err(e) = initialize_logging(args.verbose) {
        eprintln!("{:#}", e);
    }

    let config = match UploadConfig::from_args(&args) {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };

    match run(&config) {
        Ok(manifest) => {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = stdout.write_all(&manifest).and_then(|_| writeln!(stdout)) {
                error!("Failed to print manifest: {}", e);
                process::exit(1);
            }
        }
        Err(e) => {
            error!("{:#}", e);
            let code = e
                .downcast_ref::<UploadError>()
                .map(UploadError::exit_code)
                .unwrap_or(1);
            process::exit(code);
        }
    }
}

/// Initialize logging on stderr; stdout only carries the manifest
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .context("Failed to initialize logger")?;
    Ok(())
}

fn run(config: &UploadConfig) -> Result<Vec<u8>> {
    let runtime = Runtime::new().context("Failed to create async runtime")?;
    runtime.block_on(async {
        let store = S3Store::from_config(config).context("Failed to create object store client")?;
        let manifest = run_upload(Arc::new(store), config).await?;
        info!("Upload of {} complete", config.destination);
        Ok::<_, anyhow::Error>(manifest)
    })
}

fn exit_with(err: &UploadError) -> ! {
    error!("{}", err);
    process::exit(err.exit_code())
}
