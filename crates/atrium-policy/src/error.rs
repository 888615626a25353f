use thiserror::Error;

/// Errors from the rule-set load/save helpers.
///
/// The evaluation and registration paths never produce these: `evaluate`
/// degrades every failure to a deny-shaped [`crate::Decision`] and `register`
/// refuses with a logged warning, so callers on the hot path have nothing to
/// unwrap.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("rule load error: {0}")]
    LoadError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("deserialization error: {0}")]
    DeserializationError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

pub type PolicyResult<T> = Result<T, PolicyError>;
