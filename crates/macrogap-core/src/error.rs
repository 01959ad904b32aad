//! Error types for Macrogap.

use thiserror::Error;

use crate::report::FailureReport;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    /// Embedding or completion service is unconfigured, unreachable or timed out.
    #[error("External service unavailable: {0}")]
    ExternalServiceUnavailable(String),

    /// An external service answered, but not with something usable.
    #[error("Malformed external response: {0}")]
    MalformedExternalResponse(String),

    /// Required ingredients matched no candidate; no substitute is fabricated.
    #[error("Required ingredients unavailable: {}", required.join(", "))]
    ConstraintUnsatisfiable { required: Vec<String> },

    /// Every tier ran and the final suggestion list is still empty.
    #[error("No results after fallback: {0}")]
    NoResultsAfterFallback(FailureReport),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl Error {
    /// Whether the error only means an optional collaborator is missing.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            Self::ExternalServiceUnavailable(_) | Self::MalformedExternalResponse(_) | Self::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_message_lists_ingredients() {
        let err = Error::ConstraintUnsatisfiable {
            required: vec!["Banana".into(), "Quark".into()],
        };
        assert_eq!(err.to_string(), "Required ingredients unavailable: Banana, Quark");
    }

    #[test]
    fn test_degradable_classification() {
        assert!(Error::ExternalServiceUnavailable("down".into()).is_degradable());
        assert!(Error::MalformedExternalResponse("bad".into()).is_degradable());
        assert!(!Error::Database("locked".into()).is_degradable());
        assert!(!Error::ConstraintUnsatisfiable { required: vec![] }.is_degradable());
    }
}
