use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("Cluster has no workers")]
    NoWorkers,
    #[error("Worker loop failed: {0}")]
    WorkerJoinError(#[from] tokio::task::JoinError),
}
