//! Content-addressed bottle and manifest cache.
//!
//! Artifacts are stored where `brew` itself looks for them, keyed by the
//! sha256 of their source URL:
//!
//! ```text
//! {downloads}/{sha256(bottle_url)}--{name}--{version}.{tag}.bottle.tar.gz
//! {downloads}/{sha256(manifest_url)}--{name}-{version}.bottle_manifest.json
//! {caches}/{name}--{version}                      -> bottle
//! {caches}/{name}_bottle_manifest--{version}      -> manifest
//! ```
//!
//! The path is a pure function of formula and platform, so a path that exists
//! is a cache hit and no request is made. New files are streamed to a
//! temporary sibling and renamed into place only once complete, so a reader
//! never sees a partial artifact and a failed download leaves nothing behind.

use crate::api::{BottleFile, Formula};
use crate::config::Config;
use crate::error::{BrewcError, Result};
use crate::manifest::{Manifest, OCI_INDEX_MEDIA_TYPE};
use crate::traverse::{self, Order, TraversalReport};
use crate::tree::FormulaTree;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Hex-encoded sha256 of a string (cache keys are hashes of URLs)
pub fn sha256_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// ghcr.io repository name for a formula: `@` becomes `/`, `+` becomes `x`
pub fn image_name(formula_name: &str) -> String {
    formula_name.replace('@', "/").replace('+', "x")
}

pub fn manifest_url(manifest_base: &str, formula_name: &str, version: &str) -> String {
    format!(
        "{}/{}/manifests/{}",
        manifest_base.trim_end_matches('/'),
        image_name(formula_name),
        version
    )
}

/// Deterministic cache locations
#[derive(Debug, Clone)]
pub struct CachePaths {
    downloads_dir: PathBuf,
    caches_dir: PathBuf,
}

impl CachePaths {
    pub fn new(config: &Config) -> Self {
        Self {
            downloads_dir: config.downloads_dir.clone(),
            caches_dir: config.caches_dir.clone(),
        }
    }

    pub fn bottle(&self, name: &str, version: &str, tag: &str, bottle_url: &str) -> PathBuf {
        self.downloads_dir.join(format!(
            "{}--{}--{}.{}.bottle.tar.gz",
            sha256_hex(bottle_url),
            name,
            version,
            tag
        ))
    }

    pub fn bottle_alias(&self, name: &str, version: &str) -> PathBuf {
        self.caches_dir.join(format!("{name}--{version}"))
    }

    pub fn manifest(&self, name: &str, version: &str, manifest_url: &str) -> PathBuf {
        self.downloads_dir.join(format!(
            "{}--{}-{}.bottle_manifest.json",
            sha256_hex(manifest_url),
            name,
            version
        ))
    }

    pub fn manifest_alias(&self, name: &str, version: &str) -> PathBuf {
        self.caches_dir
            .join(format!("{name}_bottle_manifest--{version}"))
    }
}

/// Bottle and manifest downloader for one platform tag
#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
    paths: CachePaths,
    manifest_base: String,
    token: String,
    tag: String,
    progress: Option<MultiProgress>,
}

impl Downloader {
    pub fn new(config: &Config, tag: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.download_timeout)
            .connect_timeout(config.request_timeout)
            .user_agent(format!("brewc/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            paths: CachePaths::new(config),
            manifest_base: config.manifest_base.clone(),
            token: config.github_token.clone(),
            tag: tag.into(),
            progress: None,
        })
    }

    /// Show a progress bar per bottle download
    pub fn with_progress(mut self, progress: MultiProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    fn select_bottle<'a>(&self, formula: &'a Formula) -> Result<(&'a str, &'a BottleFile)> {
        formula.bottle_file(&self.tag).ok_or_else(|| {
            BrewcError::Configuration(format!(
                "No bottle of {} for platform {}",
                formula.name, self.tag
            ))
        })
    }

    pub fn bottle_path(&self, formula: &Formula) -> Result<PathBuf> {
        let version = formula.stable_version()?;
        let (tag, file) = self.select_bottle(formula)?;
        Ok(self.paths.bottle(&formula.name, version, tag, &file.url))
    }

    pub fn manifest_url(&self, formula: &Formula) -> Result<String> {
        Ok(manifest_url(
            &self.manifest_base,
            &formula.name,
            formula.stable_version()?,
        ))
    }

    pub fn manifest_path(&self, formula: &Formula) -> Result<PathBuf> {
        let version = formula.stable_version()?;
        let url = self.manifest_url(formula)?;
        Ok(self.paths.manifest(&formula.name, version, &url))
    }

    pub fn is_bottle_cached(&self, formula: &Formula) -> Result<bool> {
        Ok(self.bottle_path(formula)?.is_file())
    }

    pub fn is_manifest_cached(&self, formula: &Formula) -> Result<bool> {
        Ok(self.manifest_path(formula)?.is_file())
    }

    /// Read the cached manifest, downloading it first on a miss
    pub async fn ensure_manifest(&self, formula: &Formula) -> Result<Manifest> {
        let version = formula.stable_version()?;
        let url = self.manifest_url(formula)?;
        let path = self.paths.manifest(&formula.name, version, &url);

        if path.is_file() {
            debug!(formula = %formula.name, "manifest cache hit");
            let bytes = fs::read(&path).await.map_err(|e| BrewcError::fs(&path, e))?;
            return Ok(serde_json::from_slice(&bytes)?);
        }

        info!(formula = %formula.name, %url, "downloading manifest");
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, OCI_INDEX_MEDIA_TYPE)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrewcError::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        // Decode before persisting so a bad body never becomes a cache hit
        let manifest: Manifest = serde_json::from_slice(&body)?;

        let temp = temp_path(&path);
        fs::write(&temp, &body)
            .await
            .map_err(|e| BrewcError::fs(&temp, e))?;
        commit(&temp, &path).await?;
        create_alias(&path, &self.paths.manifest_alias(&formula.name, version)).await?;

        Ok(manifest)
    }

    /// Make sure the bottle for this platform is in the cache and return its path
    pub async fn ensure_bottle(&self, formula: &Formula) -> Result<PathBuf> {
        let version = formula.stable_version()?;
        let (tag, file) = self.select_bottle(formula)?;
        let path = self.paths.bottle(&formula.name, version, tag, &file.url);

        if path.is_file() {
            debug!(formula = %formula.name, "bottle cache hit");
            return Ok(path);
        }

        info!(formula = %formula.name, url = %file.url, "downloading bottle");
        let mut response = self
            .client
            .get(&file.url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrewcError::HttpStatus {
                url: file.url.clone(),
                status: status.as_u16(),
            });
        }

        let pb = self.progress_bar(&formula.name, response.content_length());
        let temp = temp_path(&path);

        let streamed = async {
            let mut out = fs::File::create(&temp)
                .await
                .map_err(|e| BrewcError::fs(&temp, e))?;
            let mut hasher = Sha256::new();

            while let Some(chunk) = response.chunk().await? {
                hasher.update(&chunk);
                out.write_all(&chunk)
                    .await
                    .map_err(|e| BrewcError::fs(&temp, e))?;
                if let Some(pb) = &pb {
                    pb.inc(chunk.len() as u64);
                }
            }

            out.flush().await.map_err(|e| BrewcError::fs(&temp, e))?;
            Ok::<_, BrewcError>(format!("{:x}", hasher.finalize()))
        }
        .await;

        let actual = match streamed {
            Ok(actual) => actual,
            Err(e) => {
                let _ = fs::remove_file(&temp).await;
                abandon(pb, &formula.name);
                return Err(e);
            }
        };

        if !file.sha256.is_empty() && !actual.eq_ignore_ascii_case(&file.sha256) {
            let _ = fs::remove_file(&temp).await;
            abandon(pb, &formula.name);
            return Err(BrewcError::ChecksumMismatch {
                name: formula.name.clone(),
                expected: file.sha256.clone(),
                actual,
            });
        }

        if let Err(e) = commit(&temp, &path).await {
            abandon(pb, &formula.name);
            return Err(e);
        }
        create_alias(&path, &self.paths.bottle_alias(&formula.name, version)).await?;

        if let Some(pb) = pb {
            pb.finish_with_message(format!("✓ {}", formula.name));
        }

        Ok(path)
    }

    /// Prefetch manifest and bottle for one formula
    pub async fn fetch(&self, formula: &Formula) -> Result<PathBuf> {
        self.ensure_manifest(formula).await?;
        self.ensure_bottle(formula).await
    }

    /// Prefetch every formula of a tree, continuing past individual failures
    pub async fn fetch_all(&self, tree: &FormulaTree, budget: usize) -> TraversalReport {
        let downloader = self.clone();
        traverse::traverse(tree, budget, Order::ParentFirst, move |formula| {
            let downloader = downloader.clone();
            async move { downloader.fetch(&formula).await.map(|_| ()) }
        })
        .await
    }

    fn progress_bar(&self, name: &str, total: Option<u64>) -> Option<ProgressBar> {
        let mp = self.progress.as_ref()?;
        let pb = mp.add(ProgressBar::new(total.unwrap_or(0)));
        let style = ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        pb.set_message(format!("⬇ {name}"));
        Some(pb)
    }
}

fn abandon(pb: Option<ProgressBar>, name: &str) {
    if let Some(pb) = pb {
        pb.abandon_with_message(format!("✗ {name}"));
    }
}

/// Unique sibling path for an in-flight write
fn temp_path(path: &Path) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}-{}.incomplete", std::process::id(), n));
    path.with_file_name(name)
}

/// Atomically move a finished temp file onto its cache path
async fn commit(temp: &Path, path: &Path) -> Result<()> {
    if let Err(e) = fs::rename(temp, path).await {
        let _ = fs::remove_file(temp).await;
        return Err(BrewcError::fs(path, e));
    }
    Ok(())
}

/// Point a human-readable name in the caches dir at a cache file.
///
/// The link is made under a unique name and renamed over the alias, so
/// concurrent writers of the same alias each replace it whole.
#[cfg(unix)]
async fn create_alias(target: &Path, alias: &Path) -> Result<()> {
    let temp = temp_path(alias);
    fs::symlink(target, &temp)
        .await
        .map_err(|e| BrewcError::fs(&temp, e))?;
    commit(&temp, alias).await
}

#[cfg(not(unix))]
async fn create_alias(_target: &Path, _alias: &Path) -> Result<()> {
    Ok(())
}
