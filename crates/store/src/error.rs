use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// A setter refused the update, the state is unchanged.
    #[error("Update rejected. cause: {0}")]
    UpdateRejected(anyhow::Error),

    #[error("Expected a JSON object. found: {0}")]
    NotAnObject(String),
}
