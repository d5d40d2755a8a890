use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for manifest-uploader.
///
/// Uploads every regular file under `--src` to `--dst`, hashing each file
/// while it streams, then publishes a `manifest.json` of relative paths to
/// SHA-256 digests next to the uploaded objects and in `--manifest`.
#[derive(Parser, Debug)]
#[clap(
    name = "manifest-uploader",
    about = "Upload a directory tree to object storage with a SHA-256 manifest"
)]
pub struct Args {
    /// File or directory to upload
    #[clap(long, default_value = ".")]
    pub src: PathBuf,

    /// Destination as [s3://|gs://]bucket/prefix
    #[clap(long)]
    pub dst: String,

    /// Directory for the local manifest.json copy
    #[clap(long, default_value = ".")]
    pub manifest: PathBuf,

    /// AWS region for S3 uploads
    #[clap(long)]
    pub region: Option<String>,

    /// AWS profile to use for S3 uploads
    #[clap(long)]
    pub profile: Option<String>,

    /// Custom endpoint for S3-compatible services
    #[clap(long)]
    pub endpoint: Option<String>,

    /// Maximum number of concurrent file uploads (default: 2x CPUs, at most 32)
    #[clap(long)]
    pub concurrency: Option<usize>,

    /// Multipart part size for uploads (in MB)
    #[clap(long, default_value = "8", help = "Multipart part size for uploads (in MB)")]
    pub buffer_size: usize,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["manifest-uploader", "--dst", "bucket/prefix"]).unwrap();
        assert_eq!(args.src, PathBuf::from("."));
        assert_eq!(args.manifest, PathBuf::from("."));
        assert_eq!(args.dst, "bucket/prefix");
        assert_eq!(args.buffer_size, 8);
        assert!(args.concurrency.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn test_dst_is_required() {
        assert!(Args::try_parse_from(["manifest-uploader", "--src", "/data"]).is_err());
    }

    #[test]
    fn test_all_options() {
        let args = Args::try_parse_from([
            "manifest-uploader",
            "--src",
            "/data",
            "--dst",
            "gs://archive/v1",
            "--manifest",
            "/out",
            "--region",
            "eu-west-1",
            "--profile",
            "ci",
            "--endpoint",
            "http://localhost:9000",
            "--concurrency",
            "3",
            "--buffer-size",
            "16",
            "-v",
        ])
        .unwrap();

        assert_eq!(args.src, PathBuf::from("/data"));
        assert_eq!(args.manifest, PathBuf::from("/out"));
        assert_eq!(args.region.as_deref(), Some("eu-west-1"));
        assert_eq!(args.profile.as_deref(), Some("ci"));
        assert_eq!(args.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(args.concurrency, Some(3));
        assert_eq!(args.buffer_size, 16);
        assert!(args.verbose);
    }

    #[test]
    fn test_rejects_non_numeric_concurrency() {
        let result = Args::try_parse_from(["manifest-uploader", "--dst", "b/p", "--concurrency", "many"]);
        assert!(result.is_err());
    }
}
