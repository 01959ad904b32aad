//! Embedding service trait and the no-op fallback.

use macrogap_core::{Error, Result};

/// A black-box text embedding service.
///
/// Implementations may be slow, absent or unreliable. Callers treat every
/// `Err` as "no vectors produced".
pub trait EmbeddingService: Send + Sync {
    /// Embed a batch of texts. On success returns exactly one vector per text.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Identifier recorded next to cached vectors.
    fn model_id(&self) -> &str;

    /// Whether a service is configured at all.
    fn is_available(&self) -> bool;
}

/// Placeholder service that never produces vectors (keyword-only mode).
pub struct NoopEmbedder;

impl EmbeddingService for NoopEmbedder {
    fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::ExternalServiceUnavailable(
            "no embedding service configured".into(),
        ))
    }

    fn model_id(&self) -> &str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Check a service response: one non-empty, finite vector per input text.
///
/// Any violation rejects the whole batch.
pub fn validate_vectors(vectors: Vec<Vec<f32>>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected {
        return Err(Error::MalformedExternalResponse(format!(
            "expected {} vectors, got {}",
            expected,
            vectors.len()
        )));
    }
    if let Some(pos) = vectors
        .iter()
        .position(|v| v.is_empty() || v.iter().any(|x| !x.is_finite()))
    {
        return Err(Error::MalformedExternalResponse(format!(
            "vector {} is empty or not finite",
            pos
        )));
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_is_unavailable() {
        let err = NoopEmbedder.embed(&["hi".into()]).unwrap_err();
        assert!(matches!(err, Error::ExternalServiceUnavailable(_)));
        assert!(!NoopEmbedder.is_available());
    }

    #[test]
    fn test_validate_count_mismatch() {
        let err = validate_vectors(vec![vec![1.0]], 2).unwrap_err();
        assert!(matches!(err, Error::MalformedExternalResponse(_)));
    }

    #[test]
    fn test_validate_rejects_empty_and_nan() {
        assert!(validate_vectors(vec![vec![1.0], vec![]], 2).is_err());
        assert!(validate_vectors(vec![vec![f32::NAN]], 1).is_err());
        assert_eq!(validate_vectors(vec![vec![0.5, 0.5]], 1).unwrap().len(), 1);
    }
}
