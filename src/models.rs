use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::UploadError;
use crate::utils::hash::ContentDigest;

/// One successfully uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    /// Path relative to the upload root, `/`-separated
    pub relative_path: String,
    pub digest: ContentDigest,
}

/// What an upload task reports back to the aggregator.
#[derive(Debug)]
pub enum UploadOutcome {
    Uploaded(UploadResult),
    Failed(UploadError),
}

/// Relative path to `sha256:<hex>` digest for every uploaded file.
///
/// Serializes as a flat JSON object with keys in sorted order, so the same
/// tree always produces the same bytes.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an upload. A path that is already present is rejected and the
    /// existing entry is kept.
    pub fn insert(&mut self, result: UploadResult) -> Result<(), UploadError> {
        if self.entries.contains_key(&result.relative_path) {
            return Err(UploadError::DuplicateEntry(result.relative_path));
        }
        self.entries.insert(result.relative_path, result.digest.to_string());
        Ok(())
    }

    pub fn get(&self, relative_path: &str) -> Option<&str> {
        self.entries.get(relative_path).map(String::as_str)
    }

    pub fn contains(&self, relative_path: &str) -> bool {
        self.entries.contains_key(relative_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Pretty-printed JSON encoding
    pub fn to_json(&self) -> Result<Vec<u8>, UploadError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, UploadError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(path: &str, data: &[u8]) -> UploadResult {
        UploadResult {
            relative_path: path.to_string(),
            digest: ContentDigest::of(data),
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut manifest = Manifest::new();
        assert!(manifest.is_empty());

        manifest.insert(result("a.txt", b"abc")).unwrap();
        assert_eq!(manifest.len(), 1);
        assert!(manifest.contains("a.txt"));
        assert_eq!(
            manifest.get("a.txt"),
            Some("sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        assert_eq!(manifest.get("b.txt"), None);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut manifest = Manifest::new();
        manifest.insert(result("dup.txt", b"first")).unwrap();

        let err = manifest.insert(result("dup.txt", b"second")).unwrap_err();
        assert!(matches!(err, UploadError::DuplicateEntry(ref p) if p == "dup.txt"));
        assert_eq!(manifest.get("dup.txt").unwrap(), ContentDigest::of(b"first").to_string());
    }

    #[test]
    fn test_json_is_sorted_and_flat() {
        let mut manifest = Manifest::new();
        manifest.insert(result("z/last.txt", b"z")).unwrap();
        manifest.insert(result("a.txt", b"a")).unwrap();
        manifest.insert(result("m/mid.bin", b"m")).unwrap();

        let json = String::from_utf8(manifest.to_json().unwrap()).unwrap();
        let a = json.find("\"a.txt\"").unwrap();
        let m = json.find("\"m/mid.bin\"").unwrap();
        let z = json.find("\"z/last.txt\"").unwrap();
        assert!(a < m && m < z);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_object().unwrap().len(), 3);
        assert_eq!(Manifest::from_json(json.as_bytes()).unwrap(), manifest);
    }

    #[test]
    fn test_empty_manifest_json() {
        let json = Manifest::new().to_json().unwrap();
        assert_eq!(json, b"{}");
    }

    #[test]
    fn test_iter_in_key_order() {
        let mut manifest = Manifest::new();
        manifest.insert(result("b", b"2")).unwrap();
        manifest.insert(result("a", b"1")).unwrap();
        let keys: Vec<&str> = manifest.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
