//! Homebrew JSON API client.
//!
//! [`BrewApi`] fetches one formula record per request from
//! `https://formulae.brew.sh/api/formula/{name}.json`. Every request carries
//! the configured timeout, and the HTTP status is checked before the body is
//! decoded, so an error page never reaches the JSON decoder. Responses are not
//! cached here; the only cache in the crate is the bottle/manifest cache in
//! [`download`](crate::download).
//!
//! The dependency builder does not talk to [`BrewApi`] directly but to the
//! [`FormulaSource`] trait, which lets tests and benches substitute an
//! in-memory catalogue.
//!
//! # Examples
//!
//! ```no_run
//! use brewc::{BrewApi, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let api = BrewApi::new(&config)?;
//!
//!     let formula = api.fetch_formula("ripgrep").await?;
//!     println!("{} {:?}", formula.name, formula.dependencies);
//!     Ok(())
//! }
//! ```

use crate::cellar::Cellar;
use crate::config::Config;
use crate::error::{BrewcError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

/// Homebrew formula metadata from the JSON API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub versions: Versions,
    #[serde(default)]
    pub revision: u32,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub build_dependencies: Vec<String>,
    #[serde(default)]
    pub bottle: Option<Bottle>,
    #[serde(default)]
    pub keg_only: bool,
    #[serde(default)]
    pub installed: Vec<InstalledVersion>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Versions {
    #[serde(default)]
    pub stable: Option<String>,
    #[serde(default)]
    pub head: Option<String>,
    #[serde(default)]
    pub bottle: bool,
}

/// Bottle information from API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bottle {
    #[serde(default)]
    pub stable: Option<BottleData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BottleData {
    #[serde(default)]
    pub rebuild: u32,
    #[serde(default)]
    pub root_url: Option<String>,
    #[serde(default)]
    pub files: HashMap<String, BottleFile>,
}

/// Bottle file metadata for a specific platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BottleFile {
    #[serde(default)]
    pub cellar: String,
    pub url: String,
    pub sha256: String,
}

/// Entry of the `installed` array (only populated by local `brew info --json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstalledVersion {
    pub version: String,
    #[serde(default)]
    pub installed_as_dependency: bool,
    #[serde(default)]
    pub installed_on_request: bool,
}

impl Formula {
    /// Stable version, or a configuration error if the formula has none
    pub fn stable_version(&self) -> Result<&str> {
        self.versions
            .stable
            .as_deref()
            .ok_or_else(|| BrewcError::Configuration(format!("No stable version for {}", self.name)))
    }

    /// Bottle descriptor for a platform tag, falling back to the `all` bottle.
    /// Returns the tag that matched alongside the descriptor.
    pub fn bottle_file(&self, tag: &str) -> Option<(&str, &BottleFile)> {
        let files = &self.bottle.as_ref()?.stable.as_ref()?.files;
        files
            .get_key_value(tag)
            .or_else(|| files.get_key_value("all"))
            .map(|(tag, file)| (tag.as_str(), file))
    }

    /// Installed according to the API record or the local Cellar
    pub fn is_installed_in(&self, cellar: &Cellar) -> bool {
        !self.installed.is_empty() || cellar.is_installed(&self.name)
    }
}

/// Anything that can resolve a formula name into its metadata record
pub trait FormulaSource: Send + Sync + 'static {
    fn fetch_formula(&self, name: &str) -> impl Future<Output = Result<Formula>> + Send;
}

/// Homebrew API client
#[derive(Clone)]
pub struct BrewApi {
    client: reqwest::Client,
    base: String,
}

impl BrewApi {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .pool_idle_timeout(Duration::from_secs(90)) // HTTP keep-alive standard
            .pool_max_idle_per_host(config.threads) // Reuse connections during parallel discovery
            .user_agent(format!("brewc/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn formula_url(&self, name: &str) -> String {
        format!("{}/formula/{}.json", self.base, name)
    }

    /// Fetch metadata for a specific formula by name.
    ///
    /// # Errors
    ///
    /// - [`BrewcError::Network`] on connection failure or timeout
    /// - [`BrewcError::HttpStatus`] for any non-2xx response (404 for unknown formulae)
    /// - [`BrewcError::Decode`] if the body is not a formula record
    pub async fn fetch_formula(&self, name: &str) -> Result<Formula> {
        let url = self.formula_url(name);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrewcError::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let formula: Formula = serde_json::from_slice(&body)?;

        tracing::debug!(formula = %formula.name, deps = formula.dependencies.len(), "fetched formula");
        Ok(formula)
    }
}

impl FormulaSource for BrewApi {
    fn fetch_formula(&self, name: &str) -> impl Future<Output = Result<Formula>> + Send {
        BrewApi::fetch_formula(self, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WGET_JSON: &str = r#"{
        "name": "wget",
        "full_name": "wget",
        "desc": "Internet file retriever",
        "versions": {"stable": "1.24.5", "head": "HEAD", "bottle": true},
        "revision": 0,
        "dependencies": ["libidn2", "openssl@3"],
        "build_dependencies": ["pkgconf"],
        "bottle": {
            "stable": {
                "rebuild": 0,
                "root_url": "https://ghcr.io/v2/homebrew/core",
                "files": {
                    "arm64_sonoma": {
                        "cellar": "/opt/homebrew/Cellar",
                        "url": "https://ghcr.io/v2/homebrew/core/wget/blobs/sha256:aaa",
                        "sha256": "aaa"
                    },
                    "x86_64_linux": {
                        "cellar": "/home/linuxbrew/.linuxbrew/Cellar",
                        "url": "https://ghcr.io/v2/homebrew/core/wget/blobs/sha256:bbb",
                        "sha256": "bbb"
                    }
                }
            }
        },
        "keg_only": false,
        "installed": []
    }"#;

    #[test]
    fn test_decode_formula_record() {
        let formula: Formula = serde_json::from_str(WGET_JSON).unwrap();
        assert_eq!(formula.name, "wget");
        assert_eq!(formula.stable_version().unwrap(), "1.24.5");
        assert_eq!(formula.dependencies, vec!["libidn2", "openssl@3"]);
        assert_eq!(formula.bottle_file("x86_64_linux").unwrap().1.sha256, "bbb");
        assert!(formula.bottle_file("ventura").is_none());
        assert!(formula.installed.is_empty());
    }

    #[test]
    fn test_absent_optional_fields() {
        let formula: Formula = serde_json::from_str(r#"{"name": "tiny"}"#).unwrap();
        assert!(formula.dependencies.is_empty());
        assert!(formula.bottle.is_none());
        assert!(formula.bottle_file("arm64_sonoma").is_none());
        assert!(matches!(
            formula.stable_version(),
            Err(BrewcError::Configuration(_))
        ));
    }

    #[test]
    fn test_all_bottle_fallback() {
        let formula: Formula = serde_json::from_str(
            r#"{"name": "ca-certificates",
                "bottle": {"stable": {"files": {"all": {"url": "u", "sha256": "s"}}}}}"#,
        )
        .unwrap();
        let (tag, file) = formula.bottle_file("arm64_sequoia").unwrap();
        assert_eq!(tag, "all");
        assert_eq!(file.url, "u");
    }

    #[test]
    fn test_installed_from_record_or_cellar() {
        let temp = tempfile::TempDir::new().unwrap();
        let cellar = Cellar::new(temp.path());

        let mut formula: Formula = serde_json::from_str(WGET_JSON).unwrap();
        assert!(!formula.is_installed_in(&cellar));

        std::fs::create_dir_all(temp.path().join("wget/1.24.5")).unwrap();
        assert!(formula.is_installed_in(&cellar));

        let empty = Cellar::new(temp.path().join("nowhere"));
        formula.installed.push(InstalledVersion {
            version: "1.24.5".into(),
            installed_as_dependency: false,
            installed_on_request: true,
        });
        assert!(formula.is_installed_in(&empty));
    }

    #[test]
    fn test_formula_url_template() {
        let config = Config::with_root(std::path::Path::new("/tmp"));
        let api = BrewApi::new(&config).unwrap();
        assert_eq!(
            api.formula_url("ffmpeg"),
            "https://formulae.brew.sh/api/formula/ffmpeg.json"
        );
    }
}
