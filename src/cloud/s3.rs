use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use rusoto_s3::S3Client;

use crate::cloud::client::create_s3_client;
use crate::cloud::streaming::S3UploadStream;
use crate::cloud::streaming_target::ObjectStore;
use crate::config::{StoreScheme, UploadConfig};
use crate::constants::{GCS_REGION_NAME, GCS_S3_ENDPOINT};

/// Object store backed by an S3 (or S3-compatible) bucket.
///
/// The client is shared by every upload; each `open_target` call creates an
/// independent [`S3UploadStream`].
///
/// # Example
///
/// ```no_run
/// # use manifest_uploader::cloud::s3::S3Store;
/// # fn example() -> anyhow::Result<()> {
/// let store = S3Store::new("my-bucket", Some("us-west-2"), None, None, 8)?;
/// assert_eq!(store.bucket(), "my-bucket");
/// # Ok(())
/// # }
/// ```
pub struct S3Store {
    client: Arc<S3Client>,
    bucket: String,
    scheme: StoreScheme,
    part_size_mb: usize,
}

impl S3Store {
    /// Create a store for `bucket`.
    ///
    /// # Arguments
    ///
    /// * `bucket` - Bucket name
    /// * `region_name` - Optional AWS region name (e.g., "us-east-1")
    /// * `profile` - Optional AWS profile name for credentials
    /// * `endpoint` - Optional custom endpoint for S3-compatible services
    /// * `part_size_mb` - Multipart part size in megabytes
    pub fn new(
        bucket: &str,
        region_name: Option<&str>,
        profile: Option<&str>,
        endpoint: Option<&str>,
        part_size_mb: usize,
    ) -> Result<Self> {
        let client = create_s3_client(region_name, profile, endpoint)?;
        Ok(Self::with_client(client, bucket, StoreScheme::S3, part_size_mb))
    }

    /// Build a store around an existing client.
    pub fn with_client(
        client: Arc<S3Client>,
        bucket: &str,
        scheme: StoreScheme,
        part_size_mb: usize,
    ) -> Self {
        S3Store {
            client,
            bucket: bucket.to_string(),
            scheme,
            part_size_mb,
        }
    }

    /// Create the store described by a run configuration.
    ///
    /// `gs://` destinations go through the Cloud Storage XML API unless an
    /// explicit endpoint was given.
    pub fn from_config(config: &UploadConfig) -> Result<Self> {
        let destination = &config.destination;
        let (region, endpoint) = match destination.scheme {
            StoreScheme::S3 => (config.region.clone(), config.endpoint.clone()),
            StoreScheme::Gcs => (
                Some(config.region.clone().unwrap_or_else(|| GCS_REGION_NAME.to_string())),
                Some(config.endpoint.clone().unwrap_or_else(|| GCS_S3_ENDPOINT.to_string())),
            ),
        };

        let client = create_s3_client(region.as_deref(), config.profile.as_deref(), endpoint.as_deref())?;
        debug!(
            "Created {} client for bucket {} (endpoint: {})",
            destination.scheme,
            destination.bucket,
            endpoint.as_deref().unwrap_or("default")
        );

        Ok(Self::with_client(
            client,
            &destination.bucket,
            destination.scheme,
            config.buffer_size_mb,
        ))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    type Target = S3UploadStream;

    async fn open_target(&self, key: &str) -> Result<S3UploadStream> {
        Ok(S3UploadStream::new(
            Arc::clone(&self.client),
            &self.bucket,
            key,
            self.part_size_mb,
        ))
    }

    fn location(&self, key: &str) -> String {
        format!("{}://{}/{}", self.scheme, self.bucket, key)
    }
}
