//! Error types shared by the Arbor crates

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for Arbor operations.
pub type Result<T> = std::result::Result<T, ArborError>;

#[derive(Error, Debug)]
pub enum ArborError {
    /// A caller supplied a malformed filter or enum value.
    #[error("invalid {name} '{value}': expected {expected}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    /// The file analyzer failed for one file.
    #[error("analysis of {} failed", path.display())]
    Analysis {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The repository could not store or drop the graph data of one file.
    #[error("persisting {} failed", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The project root could not be established.
    #[error("cannot establish project root {}", path.display())]
    ProjectRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ArborError {
    pub fn invalid_parameter(
        name: &'static str,
        value: impl Into<String>,
        expected: &'static str,
    ) -> Self {
        ArborError::InvalidParameter {
            name,
            value: value.into(),
            expected,
        }
    }

    pub fn analysis(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        ArborError::Analysis {
            path: path.into(),
            source,
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        ArborError::Persistence {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_message() {
        let err = ArborError::invalid_parameter("kind", "Widget", "a declaration kind");
        assert_eq!(
            err.to_string(),
            "invalid kind 'Widget': expected a declaration kind"
        );
    }

    #[test]
    fn test_analysis_error_keeps_source() {
        let err = ArborError::analysis("src/a.cs", anyhow::anyhow!("parser crashed"));
        assert_eq!(err.to_string(), "analysis of src/a.cs failed");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("parser crashed"));
    }
}
