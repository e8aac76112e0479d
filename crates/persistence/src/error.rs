use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to write stop-state file: {0}")]
    Write(#[from] std::io::Error),

    #[error("Failed to serialize stop state: {0}")]
    Serialize(#[from] serde_json::Error),
}
