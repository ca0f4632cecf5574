//! Platform detection for selecting the correct bottle.
//!
//! Homebrew keys `bottle.stable.files` by a platform tag:
//! - `arm64_<codename>` for Apple Silicon (`arm64_sonoma`)
//! - `<codename>` for Intel Macs (`ventura`, not `x86_64_ventura`)
//! - `<arch>_linux` on Linux (`x86_64_linux`, `arm64_linux`)
//!
//! Unknown architectures and OS releases are reported as
//! [`BrewcError::Configuration`] rather than aborting the process; the caller
//! decides whether that is fatal.

use crate::error::{BrewcError, Result};

/// Detect the bottle tag for the running system
pub fn detect_bottle_tag() -> Result<String> {
    let arch = normalize_arch(std::env::consts::ARCH)?;

    #[cfg(target_os = "macos")]
    {
        let version = macos_version()?;
        let codename = macos_codename(&version)?;
        Ok(bottle_tag(arch, Some(codename)))
    }

    #[cfg(target_os = "linux")]
    {
        Ok(bottle_tag(arch, None))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        let _ = arch;
        Err(BrewcError::Configuration(format!(
            "unsupported operating system: {}",
            std::env::consts::OS
        )))
    }
}

/// Homebrew uses "arm64" not "aarch64"
fn normalize_arch(arch: &str) -> Result<&'static str> {
    match arch {
        "aarch64" | "arm64" => Ok("arm64"),
        "x86_64" => Ok("x86_64"),
        other => Err(BrewcError::Configuration(format!(
            "unknown architecture: {other}"
        ))),
    }
}

/// Compose the tag; `None` means Linux
fn bottle_tag(arch: &str, macos_codename: Option<&str>) -> String {
    match macos_codename {
        Some(codename) if arch == "arm64" => format!("arm64_{codename}"),
        Some(codename) => codename.to_string(),
        None => format!("{arch}_linux"),
    }
}

#[cfg(target_os = "macos")]
fn macos_version() -> Result<String> {
    let output = std::process::Command::new("sw_vers")
        .arg("-productVersion")
        .output()
        .map_err(|e| BrewcError::Configuration(format!("failed to run sw_vers: {e}")))?;

    String::from_utf8(output.stdout)
        .map(|v| v.trim().to_string())
        .map_err(|_| BrewcError::Configuration("invalid UTF-8 in sw_vers output".to_string()))
}

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn macos_codename(version: &str) -> Result<&'static str> {
    let major: u32 = version
        .split('.')
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| BrewcError::Configuration(format!("unknown macOS version: {version}")))?;

    match major {
        26 | 16 => Ok("tahoe"),
        15 => Ok("sequoia"),
        14 => Ok("sonoma"),
        13 => Ok("ventura"),
        12 => Ok("monterey"),
        11 => Ok("big_sur"),
        _ => Err(BrewcError::Configuration(format!(
            "unsupported macOS version: {version}"
        ))),
    }
}
