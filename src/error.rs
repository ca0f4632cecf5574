use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrewcError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request to {url} failed with HTTP status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to parse JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Checksum mismatch for {name}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    CycleDetected(Vec<String>),

    #[error("brew {command} {name} exited with status {code}")]
    CommandFailed {
        command: String,
        name: String,
        code: i32,
    },

    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

impl BrewcError {
    /// Attach a path to an I/O error
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BrewcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_only_on_http_errors() {
        let err = BrewcError::HttpStatus {
            url: "https://example.invalid".into(),
            status: 404,
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(BrewcError::Configuration("x".into()).status(), None);
    }

    #[test]
    fn test_cycle_message_lists_path() {
        let err = BrewcError::CycleDetected(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "Dependency cycle detected: a -> b -> a");
    }
}
