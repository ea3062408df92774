use thiserror::Error;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Failed to serialise procedure document: {0}")]
    Serialise(#[from] toml::ser::Error),
    #[error("Invalid document version '{0}' (expected major.minor.patch)")]
    InvalidVersion(String),
    #[error("Document version {found} is newer than the supported version {supported}")]
    UnsupportedVersion { found: String, supported: String },
    #[error("Malformed document at '{path}': {message}")]
    Structure { path: String, message: String },
    #[error("Unknown node type '{tag}' at '{path}'")]
    UnknownNodeType { path: String, tag: String },
    #[error("Keyword '{keyword}' of node '{path}': {source}")]
    Keyword {
        path: String,
        keyword: String,
        source: BoxedError,
    },
    #[error("Cannot add node '{path}' to the procedure: {source}")]
    Procedure { path: String, source: BoxedError },
    #[error("Line {line}: {message}")]
    Legacy { line: usize, message: String },
}

impl DocumentError {
    /// Attaches a legacy-format line number to an error raised while building a node.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            DocumentError::Legacy { .. } => self,
            other => DocumentError::Legacy {
                line,
                message: other.to_string(),
            },
        }
    }
}
