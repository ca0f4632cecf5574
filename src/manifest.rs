//! OCI image index served by ghcr.io for each bottled formula version

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const OCI_INDEX_MEDIA_TYPE: &str = "application/vnd.oci.image.index.v1+json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema_version: u32,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub manifests: Vec<ManifestEntry>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    #[serde(default)]
    pub media_type: Option<String>,
    pub digest: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub platform: Option<ManifestPlatform>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestPlatform {
    pub architecture: String,
    pub os: String,
    #[serde(rename = "os.version", default)]
    pub os_version: Option<String>,
}

impl ManifestEntry {
    /// Homebrew's bottle digest annotation (`sh.brew.bottle.digest`)
    pub fn bottle_digest(&self) -> Option<&str> {
        self.annotations.get("sh.brew.bottle.digest").map(String::as_str)
    }

    /// Ref name annotation, e.g. `1.24.5.arm64_sonoma`
    pub fn ref_name(&self) -> Option<&str> {
        self.annotations
            .get("org.opencontainers.image.ref.name")
            .map(String::as_str)
    }
}

impl Manifest {
    /// Entry whose ref name ends with the given bottle tag
    pub fn entry_for_tag(&self, tag: &str) -> Option<&ManifestEntry> {
        self.manifests.iter().find(|m| {
            m.ref_name()
                .is_some_and(|r| r.rsplit_once('.').is_some_and(|(_, t)| t == tag))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"{
        "schemaVersion": 2,
        "mediaType": "application/vnd.oci.image.index.v1+json",
        "manifests": [
            {
                "mediaType": "application/vnd.oci.image.manifest.v1+json",
                "digest": "sha256:111",
                "size": 2000,
                "platform": {"architecture": "arm64", "os": "darwin", "os.version": "macOS 14"},
                "annotations": {
                    "org.opencontainers.image.ref.name": "1.21.1.arm64_sonoma",
                    "sh.brew.bottle.digest": "abc"
                }
            },
            {
                "digest": "sha256:222",
                "platform": {"architecture": "amd64", "os": "linux"},
                "annotations": {
                    "org.opencontainers.image.ref.name": "1.21.1.x86_64_linux",
                    "sh.brew.bottle.digest": "def",
                    "sh.brew.bottle.glibc.version": "2.35"
                }
            }
        ],
        "annotations": {"org.opencontainers.image.version": "1.21.1"}
    }"#;

    #[test]
    fn test_decode_index() {
        let manifest: Manifest = serde_json::from_str(INDEX).unwrap();
        assert_eq!(manifest.schema_version, 2);
        assert_eq!(manifest.manifests.len(), 2);

        let linux = manifest.entry_for_tag("x86_64_linux").unwrap();
        assert_eq!(linux.digest, "sha256:222");
        assert_eq!(linux.bottle_digest(), Some("def"));
        assert!(linux.platform.as_ref().unwrap().os_version.is_none());

        assert!(manifest.entry_for_tag("ventura").is_none());
    }
}
