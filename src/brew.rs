//! Thin wrapper around the `brew` executable.
//!
//! brewc never installs anything itself: once bottles are in the cache it
//! hands each formula to `brew`, which finds the artifacts already downloaded.

use crate::error::{BrewcError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

const BREW_LOCATIONS: &[&str] = &[
    "/usr/local/bin/brew",
    "/opt/homebrew/bin/brew",
    "/home/linuxbrew/.linuxbrew/bin/brew",
];

#[derive(Debug, Clone)]
pub struct Brew {
    bin: PathBuf,
}

impl Brew {
    /// Use a specific `brew` executable
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    /// Find `brew` in the standard Homebrew install locations
    pub fn locate() -> Result<Self> {
        BREW_LOCATIONS
            .iter()
            .map(Path::new)
            .find(|path| path.is_file())
            .map(Self::new)
            .ok_or_else(|| {
                BrewcError::Configuration(format!(
                    "brew binary not found (looked in {})",
                    BREW_LOCATIONS.join(", ")
                ))
            })
    }

    pub async fn install(&self, name: &str, verbose: bool) -> Result<()> {
        self.run("install", name, verbose).await
    }

    pub async fn uninstall(&self, name: &str, verbose: bool) -> Result<()> {
        self.run("uninstall", name, verbose).await
    }

    pub async fn reinstall(&self, name: &str, verbose: bool) -> Result<()> {
        self.run("reinstall", name, verbose).await
    }

    async fn run(&self, command: &str, name: &str, verbose: bool) -> Result<()> {
        debug!(bin = %self.bin.display(), command, formula = name, "running brew");

        let mut cmd = Command::new(&self.bin);
        cmd.arg(command)
            .arg(name)
            .env("HOMEBREW_NO_AUTO_UPDATE", "1")
            .stdin(Stdio::null());

        if verbose {
            cmd.arg("--verbose");
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let status = cmd.status().await.map_err(|e| BrewcError::fs(&self.bin, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(BrewcError::CommandFailed {
                command: command.to_string(),
                name: name.to_string(),
                code: status.code().unwrap_or(-1),
            })
        }
    }
}
