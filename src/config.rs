//! Runtime configuration shared by the builder, downloader and Cellar reader.
//!
//! A [`Config`] is built once per invocation and handed to every component
//! that needs a directory, an endpoint, or the thread budget. Nothing in the
//! crate reads these values from process-wide state after construction, so
//! several independent configurations can coexist (tests rely on this).

use crate::error::{BrewcError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const HOMEBREW_API_BASE: &str = "https://formulae.brew.sh/api";
pub const GHCR_MANIFEST_BASE: &str = "https://ghcr.io/v2/homebrew/core";

/// Anonymous bearer token accepted by ghcr.io for public Homebrew images
pub const ANONYMOUS_GHCR_TOKEN: &str = "QQ==";

pub const DEFAULT_THREADS: usize = 10;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
pub struct Config {
    /// Homebrew's cache root (`~/Library/Caches/Homebrew` on macOS)
    pub caches_dir: PathBuf,
    /// Content-addressed download directory inside the cache root
    pub downloads_dir: PathBuf,
    /// Installation root for kegs
    pub cellar: PathBuf,
    pub api_base: String,
    pub manifest_base: String,
    pub github_token: String,
    pub threads: usize,
    pub request_timeout: Duration,
    pub download_timeout: Duration,
}

impl Config {
    /// Resolve configuration from the Homebrew environment variables
    pub fn from_env() -> Result<Self> {
        let caches_dir = match std::env::var_os("HOMEBREW_CACHE") {
            Some(dir) => PathBuf::from(dir),
            None => default_caches_dir()?,
        };

        let cellar = match std::env::var_os("HOMEBREW_CELLAR") {
            Some(dir) => PathBuf::from(dir),
            None => detect_prefix().join("Cellar"),
        };

        let github_token = std::env::var("HOMEBREW_GITHUB_API_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| ANONYMOUS_GHCR_TOKEN.to_string());

        Ok(Self {
            downloads_dir: caches_dir.join("downloads"),
            caches_dir,
            cellar,
            api_base: HOMEBREW_API_BASE.to_string(),
            manifest_base: GHCR_MANIFEST_BASE.to_string(),
            github_token,
            threads: DEFAULT_THREADS,
            request_timeout: REQUEST_TIMEOUT,
            download_timeout: DOWNLOAD_TIMEOUT,
        })
    }

    /// Self-contained configuration rooted at `root`, with `Cellar/` and
    /// `cache/` underneath
    pub fn with_root(root: &Path) -> Self {
        let caches_dir = root.join("cache");
        Self {
            downloads_dir: caches_dir.join("downloads"),
            caches_dir,
            cellar: root.join("Cellar"),
            api_base: HOMEBREW_API_BASE.to_string(),
            manifest_base: GHCR_MANIFEST_BASE.to_string(),
            github_token: ANONYMOUS_GHCR_TOKEN.to_string(),
            threads: DEFAULT_THREADS,
            request_timeout: REQUEST_TIMEOUT,
            download_timeout: DOWNLOAD_TIMEOUT,
        }
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn github_token(mut self, token: impl Into<String>) -> Self {
        self.github_token = token.into();
        self
    }

    /// Point both remote endpoints at another host (used against local test servers)
    pub fn endpoints(mut self, api_base: impl Into<String>, manifest_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.manifest_base = manifest_base.into();
        self
    }

    /// Create the cache directories if they don't exist yet
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.caches_dir, &self.downloads_dir] {
            std::fs::create_dir_all(dir).map_err(|e| BrewcError::fs(dir, e))?;
        }
        Ok(())
    }
}

fn default_caches_dir() -> Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| BrewcError::Configuration("HOME is not set".to_string()))?;

    if cfg!(target_os = "macos") {
        return Ok(home.join("Library/Caches/Homebrew"));
    }

    Ok(match std::env::var_os("XDG_CACHE_HOME") {
        Some(cache_home) => PathBuf::from(cache_home).join("Homebrew"),
        None => home.join(".cache/Homebrew"),
    })
}

/// Detect the Homebrew prefix on this system
pub fn detect_prefix() -> PathBuf {
    if let Ok(prefix) = std::env::var("HOMEBREW_PREFIX") {
        return PathBuf::from(prefix);
    }

    if cfg!(target_os = "linux") {
        return PathBuf::from("/home/linuxbrew/.linuxbrew");
    }

    #[cfg(target_arch = "aarch64")]
    {
        PathBuf::from("/opt/homebrew")
    }
    #[cfg(not(target_arch = "aarch64"))]
    {
        PathBuf::from("/usr/local")
    }
}
