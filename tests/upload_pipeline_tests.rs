//! End-to-end tests of the upload pipeline.
//!
//! Every run goes through `run_upload` against the in-memory store, so
//! remote objects, aborted uploads and the published manifest can all be
//! inspected without a network.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use manifest_uploader::cloud::memory::MemoryStore;
use manifest_uploader::config::{Destination, UploadConfig};
use manifest_uploader::models::Manifest;
use manifest_uploader::pipeline::run_upload;
use manifest_uploader::utils::hash::{ContentDigest, HashingTee};
use manifest_uploader::UploadError;

struct Fixture {
    source: TempDir,
    output: TempDir,
    store: Arc<MemoryStore>,
}

impl Fixture {
    fn new() -> Self {
        Fixture {
            source: TempDir::new().unwrap(),
            output: TempDir::new().unwrap(),
            store: Arc::new(MemoryStore::new("bucket")),
        }
    }

    fn write(&self, relative: &str, data: &[u8]) {
        let path = self.source.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, data).unwrap();
    }

    fn config(&self, concurrency: usize) -> UploadConfig {
        self.config_for(self.source.path(), concurrency)
    }

    fn config_for(&self, source: &Path, concurrency: usize) -> UploadConfig {
        UploadConfig {
            source: source.to_path_buf(),
            destination: "s3://bucket/run".parse().unwrap(),
            manifest_dir: self.output.path().to_path_buf(),
            region: None,
            profile: None,
            endpoint: None,
            concurrency,
            buffer_size_mb: 8,
        }
    }

    fn local_manifest(&self) -> PathBuf {
        self.output.path().join("manifest.json")
    }
}

fn entries(bytes: &[u8]) -> BTreeMap<String, String> {
    serde_json::from_slice(bytes).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_full_tree_upload() -> Result<()> {
    let fx = Fixture::new();
    fx.write("readme.md", b"# hello");
    fx.write("bin/tool", &[0u8, 1, 2, 3, 255]);
    fx.write("docs/guide/intro.txt", b"intro");

    let bytes = run_upload(Arc::clone(&fx.store), &fx.config(4)).await?;
    let manifest = entries(&bytes);

    let keys: Vec<&str> = manifest.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["bin/tool", "docs/guide/intro.txt", "readme.md"]);
    assert_eq!(manifest["readme.md"], ContentDigest::of(b"# hello").to_string());

    assert_eq!(
        fx.store.keys(),
        vec![
            "run/bin/tool",
            "run/docs/guide/intro.txt",
            "run/manifest.json",
            "run/readme.md",
        ]
    );
    assert_eq!(fx.store.object("run/manifest.json").unwrap(), bytes);
    assert_eq!(fs::read(fx.local_manifest())?, bytes);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_remote_bytes_match_digests() -> Result<()> {
    let fx = Fixture::new();
    let large: Vec<u8> = (0..3_000_000u32).map(|i| (i % 251) as u8).collect();
    fx.write("large.bin", &large);
    fx.write("small.txt", b"small");

    let bytes = run_upload(Arc::clone(&fx.store), &fx.config(2)).await?;
    let manifest = Manifest::from_json(&bytes)?;

    for (relative, digest) in manifest.iter() {
        let local = fs::read(fx.source.path().join(relative))?;
        let remote = fx.store.object(&format!("run/{}", relative)).unwrap();
        assert_eq!(local, remote);

        let mut tee = HashingTee::new(remote.as_slice(), tokio::io::sink());
        tee.copy_to_end().await?;
        assert_eq!(tee.finalize().0.to_string(), digest);
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_single_file_root() -> Result<()> {
    let fx = Fixture::new();
    fx.write("notes.txt", b"just one");

    let config = fx.config_for(&fx.source.path().join("notes.txt"), 4);
    let bytes = run_upload(Arc::clone(&fx.store), &config).await?;
    let manifest = entries(&bytes);

    assert_eq!(manifest.len(), 1);
    assert_eq!(manifest["notes.txt"], ContentDigest::of(b"just one").to_string());
    assert_eq!(fx.store.object("run/notes.txt").unwrap(), b"just one");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_directory_publishes_empty_manifest() -> Result<()> {
    let fx = Fixture::new();
    fs::create_dir(fx.source.path().join("nothing-here"))?;

    let bytes = run_upload(Arc::clone(&fx.store), &fx.config(4)).await?;

    assert_eq!(bytes, b"{}");
    assert_eq!(fx.store.keys(), vec!["run/manifest.json"]);
    assert_eq!(fs::read(fx.local_manifest())?, b"{}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_write_publishes_nothing() {
    let fx = Fixture::new();
    fx.write("file1.txt", b"one");
    fx.write("file2.txt", b"two");
    fx.write("file3.txt", b"three");
    fx.store.fail_writes_to("run/file2.txt");

    let err = run_upload(Arc::clone(&fx.store), &fx.config(3)).await.unwrap_err();

    assert!(matches!(err, UploadError::RemoteStore { .. }));
    assert_eq!(err.exit_code(), 1);
    assert!(fx.store.object("run/manifest.json").is_none());
    assert!(fx.store.object("run/file2.txt").is_none());
    assert!(fx.store.aborted_keys().contains(&"run/file2.txt".to_string()));
    assert!(!fx.local_manifest().exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_commit_publishes_nothing() {
    let fx = Fixture::new();
    fx.write("a.txt", b"a");
    fx.write("b.txt", b"b");
    fx.store.fail_commits_to("run/b.txt");

    let err = run_upload(Arc::clone(&fx.store), &fx.config(2)).await.unwrap_err();

    assert!(matches!(err, UploadError::RemoteStore { ref target, .. } if target == "memory://bucket/run/b.txt"));
    assert!(fx.store.object("run/manifest.json").is_none());
    assert!(!fx.local_manifest().exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_many_files() -> Result<()> {
    let fx = Fixture::new();
    for i in 0..150 {
        fx.write(&format!("dir{}/file{:03}.dat", i % 7, i), format!("content {}", i).as_bytes());
    }

    let bytes = run_upload(Arc::clone(&fx.store), &fx.config(16)).await?;
    let manifest = entries(&bytes);

    assert_eq!(manifest.len(), 150);
    assert_eq!(
        manifest["dir3/file010.dat"],
        ContentDigest::of(b"content 10").to_string()
    );
    assert_eq!(fx.store.keys().len(), 151);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrency_limit_respected() -> Result<()> {
    let fx = Fixture::new();
    for i in 0..40 {
        fx.write(&format!("f{:02}.bin", i), &vec![i as u8; 64 * 1024]);
    }

    let bytes = run_upload(Arc::clone(&fx.store), &fx.config(3)).await?;

    assert_eq!(entries(&bytes).len(), 40);
    let peak = fx.store.peak_open_targets();
    assert!(peak >= 1 && peak <= 3, "peak open targets was {}", peak);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_root_is_traversal_error() {
    let fx = Fixture::new();
    let config = fx.config_for(&fx.source.path().join("does-not-exist"), 2);

    let err = run_upload(Arc::clone(&fx.store), &config).await.unwrap_err();

    assert!(matches!(err, UploadError::Traversal { .. }));
    assert!(fx.store.keys().is_empty());
    assert!(!fx.local_manifest().exists());
}

#[test]
fn test_destination_without_prefix_is_config_error() {
    for uri in ["bucket", "s3://bucket", "gs://bucket/"] {
        let err = uri.parse::<Destination>().unwrap_err();
        assert!(matches!(err, UploadError::Config { .. }));
        assert_eq!(err.exit_code(), 2);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_top_level_manifest_is_replaced() -> Result<()> {
    let fx = Fixture::new();
    fx.write("manifest.json", b"{\"stale\": true}");
    fx.write("data.txt", b"data");

    let bytes = run_upload(Arc::clone(&fx.store), &fx.config(2)).await?;
    let manifest = entries(&bytes);

    assert!(manifest.contains_key("manifest.json"));
    assert_eq!(fx.store.object("run/manifest.json").unwrap(), bytes);
    Ok(())
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread")]
async fn test_symlinks_are_skipped() -> Result<()> {
    let fx = Fixture::new();
    fx.write("target.txt", b"target");
    std::os::unix::fs::symlink(
        fx.source.path().join("target.txt"),
        fx.source.path().join("alias.txt"),
    )?;

    let bytes = run_upload(Arc::clone(&fx.store), &fx.config(2)).await?;
    let manifest = entries(&bytes);

    assert_eq!(manifest.keys().collect::<Vec<_>>(), vec!["target.txt"]);
    Ok(())
}
