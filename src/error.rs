use std::path::PathBuf;

/// Errors that can occur in numtcheck.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    Parameter(String),

    #[error("I/O error: {source} ({path})")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("schema error: {0}")]
    Schema(String),

    #[error("format error in {path} line {line}: {message}")]
    Format {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("QC JSON error: {0}")]
    Json(String),

    #[error("{failed} of {total} samples failed")]
    SampleFailures { failed: usize, total: usize },
}

impl Error {
    /// Convenience for wrapping an `io::Error` with a path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }

    /// Non-numeric (or otherwise unparsable) value at a known line of a file.
    pub fn format(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            source: err,
            path: PathBuf::from("<unknown>"),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
