use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("Cloud provider error: {0:#}")]
    ProviderError(anyhow::Error),
    #[error("Remote execution error: {0:#}")]
    RemoteError(anyhow::Error),
    #[error("Preparation of member {member} ({address}) failed with exit code {status}: {stderr}")]
    PreparationFailed {
        member: String,
        address: String,
        status: i32,
        stderr: String,
    },
    #[error("Cluster error: {0}")]
    ClusterError(#[from] swarm::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
    #[error("Error: {0}")]
    GenericError(String),
}

impl From<serde_json::error::Error> for PoolError {
    fn from(e: serde_json::error::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

impl From<toml::de::Error> for PoolError {
    fn from(error: toml::de::Error) -> Self {
        Self::DeserializationError(error.to_string())
    }
}

impl From<anyhow::Error> for PoolError {
    fn from(error: anyhow::Error) -> Self {
        Self::GenericError(format!("{error:#}"))
    }
}
