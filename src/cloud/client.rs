use std::sync::Arc;

use anyhow::{Context, Result};
use log::warn;
use rusoto_core::{HttpClient, Region};
use rusoto_s3::S3Client;

/// Resolve the region for the client.
///
/// A custom endpoint always produces `Region::Custom`, so S3-compatible
/// services (MinIO, GCS interoperability) can be addressed directly.
pub fn resolve_region(region_name: Option<&str>, endpoint: Option<&str>) -> Region {
    if let Some(endpoint) = endpoint {
        let name = region_name
            .map(str::to_string)
            .unwrap_or_else(|| Region::default().name().to_string());
        return Region::Custom {
            name,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        };
    }

    match region_name {
        Some(name) => match name.parse::<Region>() {
            Ok(r) => r,
            Err(_) => {
                warn!("Invalid region '{}', using default", name);
                Region::default()
            }
        },
        None => Region::default(),
    }
}

/// Create an S3 client with the specified region, profile and endpoint
pub fn create_s3_client(
    region_name: Option<&str>,
    profile: Option<&str>,
    endpoint: Option<&str>,
) -> Result<Arc<S3Client>> {
    let region = resolve_region(region_name, endpoint);

    // Create S3 client with profile if specified
    let s3_client = if let Some(profile_name) = profile {
        match rusoto_credential::ProfileProvider::new() {
            Ok(mut provider) => {
                provider.set_profile(profile_name);
                let http_client = HttpClient::new().context("Failed to create HTTP client")?;
                Arc::new(S3Client::new_with(http_client, provider, region))
            }
            Err(e) => {
                warn!("Failed to create AWS profile provider: {}, using default", e);
                Arc::new(S3Client::new(region))
            }
        }
    } else {
        Arc::new(S3Client::new(region))
    };

    Ok(s3_client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_region_named() {
        assert_eq!(resolve_region(Some("eu-west-1"), None).name(), "eu-west-1");
    }

    #[test]
    fn test_resolve_region_invalid_falls_back() {
        assert_eq!(
            resolve_region(Some("not-a-region"), None).name(),
            Region::default().name()
        );
    }

    #[test]
    fn test_resolve_region_custom_endpoint() {
        let region = resolve_region(Some("auto"), Some("https://storage.googleapis.com/"));
        assert_eq!(
            region,
            Region::Custom {
                name: "auto".to_string(),
                endpoint: "https://storage.googleapis.com".to_string(),
            }
        );
    }
}
