use store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComputedError {
    /// The derivation function returned an error, nothing was committed.
    #[error("Derivation failed. cause: {0}")]
    Derivation(anyhow::Error),

    #[error("Configuration error. cause: {0}")]
    Config(serde_json::Error),

    #[error("Store error. cause: {0}")]
    Store(#[from] StoreError),
}

/// Setters report failures as [`StoreError`]s, the original [`ComputedError`] is kept as the cause.
impl From<ComputedError> for StoreError {
    fn from(error: ComputedError) -> Self {
        match error {
            ComputedError::Store(error) => error,
            error => StoreError::UpdateRejected(error.into()),
        }
    }
}
