use thiserror::Error;

/// Errors that can abort a metadata conversion.
///
/// Unresolved paths and targets are not errors; they surface as missing
/// targets on the linked model. Only structural violations of the annotation
/// shape end up here.
#[derive(Error, Debug)]
pub enum LinkerError {
    #[error("unsupported collection kind '{kind}' (target: {target})")]
    UnsupportedCollection { kind: String, target: String },

    #[error("collection of {expected} contains a {found} item (target: {target})")]
    MismatchedCollectionItem {
        expected: String,
        found: String,
        target: String,
    },

    #[error("annotation '{term}' has no record, value or collection (target: {target})")]
    UnsupportedAnnotation { term: String, target: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for results using `LinkerError`.
pub type Result<T> = std::result::Result<T, LinkerError>;
