use std::fmt;
use std::str::FromStr;

use crate::error::UploadError;

/// Remote store addressed by a destination URI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StoreScheme {
    /// Amazon S3 or any S3-compatible service
    #[default]
    S3,
    /// Google Cloud Storage
    Gcs,
}

impl fmt::Display for StoreScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreScheme::S3 => write!(f, "s3"),
            StoreScheme::Gcs => write!(f, "gs"),
        }
    }
}

/// Where uploaded objects go: `[scheme://]bucket/prefix`.
///
/// Both the bucket and the prefix are required; surrounding slashes on the
/// prefix are dropped so keys never contain empty segments at the joins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Destination {
    pub scheme: StoreScheme,
    pub bucket: String,
    pub prefix: String,
}

impl Destination {
    /// Object key for a path relative to the upload root
    pub fn key_for(&self, relative_path: &str) -> String {
        format!("{}/{}", self.prefix, relative_path)
    }
}

impl FromStr for Destination {
    type Err = UploadError;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = match uri.split_once("://") {
            Some((scheme, rest)) => {
                let scheme = match scheme.to_ascii_lowercase().as_str() {
                    "s3" => StoreScheme::S3,
                    "gs" => StoreScheme::Gcs,
                    other => {
                        return Err(UploadError::config(
                            uri,
                            format!("unsupported scheme '{}' (expected s3 or gs)", other),
                        ))
                    }
                };
                (scheme, rest)
            }
            None => (StoreScheme::default(), uri),
        };

        let (bucket, prefix) = rest
            .split_once('/')
            .ok_or_else(|| UploadError::config(uri, "expected bucket/prefix"))?;
        if bucket.is_empty() {
            return Err(UploadError::config(uri, "bucket is empty"));
        }

        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            return Err(UploadError::config(uri, "prefix is empty"));
        }

        Ok(Destination {
            scheme,
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
        })
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.prefix)
    }
}
