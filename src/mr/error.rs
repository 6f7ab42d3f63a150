//! Error taxonomy. Reassignable failures (a stalled or crashed worker)
//! never surface here; the watchdog reclaims those silently. Only
//! input-format and transport failures are structured.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("task finished for unknown task id `{0}`")]
    UnknownTaskId(u32),

    #[error("output filename `{0}` has no `-`-delimited partition suffix")]
    MissingPartitionSuffix(String),

    #[error("output filename `{0}` has a non-numeric partition suffix")]
    InvalidPartitionSuffix(String),

    #[error("reduce partition {partition} out of range (n_reduce={n_reduce})")]
    PartitionOutOfRange { partition: usize, n_reduce: usize },

    #[error("task id `{0}` is not a valid integer")]
    InvalidTaskId(String),
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("rpc call failed: {0}")]
    Rpc(#[from] tarpc::client::RpcError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("coordinator protocol violation: {0}")]
    Protocol(String),
}
