//! Cellar reader - the local half of the "already installed" check

use crate::error::{BrewcError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Read-only view of a Homebrew Cellar directory
#[derive(Debug, Clone)]
pub struct Cellar {
    path: PathBuf,
}

impl Cellar {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Installed versions of a formula, newest first
    pub fn installed_versions(&self, name: &str) -> Result<Vec<String>> {
        let formula_path = self.path.join(name);

        if !formula_path.is_dir() {
            return Ok(vec![]);
        }

        let mut versions = Vec::new();
        let entries = fs::read_dir(&formula_path).map_err(|e| BrewcError::fs(&formula_path, e))?;

        for entry in entries {
            let entry = entry.map_err(|e| BrewcError::fs(&formula_path, e))?;
            let version = entry.file_name().to_string_lossy().to_string();

            // Skip hidden files
            if version.starts_with('.') || !entry.path().is_dir() {
                continue;
            }

            versions.push(version);
        }

        versions.sort_by(|a, b| compare_versions(b, a));
        Ok(versions)
    }

    /// True when at least one keg of `name` is present
    pub fn is_installed(&self, name: &str) -> bool {
        self.installed_versions(name)
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }
}

/// Compare two version strings numerically, falling back to lexicographic
fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let a_parts: Vec<u32> = a.split('.').filter_map(|s| s.parse::<u32>().ok()).collect();
    let b_parts: Vec<u32> = b.split('.').filter_map(|s| s.parse::<u32>().ok()).collect();

    for i in 0..a_parts.len().max(b_parts.len()) {
        let a_part = a_parts.get(i).unwrap_or(&0);
        let b_part = b_parts.get(i).unwrap_or(&0);
        match a_part.cmp(b_part) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }

    a.cmp(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_formula_is_not_installed() {
        let temp = TempDir::new().unwrap();
        let cellar = Cellar::new(temp.path());
        assert!(!cellar.is_installed("wget"));
        assert!(cellar.installed_versions("wget").unwrap().is_empty());
    }

    #[test]
    fn test_versions_newest_first() {
        let temp = TempDir::new().unwrap();
        for version in ["1.9.0", "1.10.2", "1.10.0"] {
            fs::create_dir_all(temp.path().join("wget").join(version)).unwrap();
        }
        fs::create_dir_all(temp.path().join("wget/.hidden")).unwrap();

        let cellar = Cellar::new(temp.path());
        assert_eq!(
            cellar.installed_versions("wget").unwrap(),
            vec!["1.10.2", "1.10.0", "1.9.0"]
        );
        assert!(cellar.is_installed("wget"));
    }

    #[test]
    fn test_empty_formula_dir_is_not_installed() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("wget")).unwrap();
        assert!(!Cellar::new(temp.path()).is_installed("wget"));
    }
}
