#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Cluster not found: {0}")]
    ClusterNotFound(String),
}
