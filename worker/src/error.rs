use std::io;

use machine_learning::NnErr;
use solver::SolverErr;
use tensor::TensorErr;

/// The worker module's result type.
pub type Result<T> = std::result::Result<T, WorkerErr>;

/// Worker runtime failures.
#[derive(Debug, thiserror::Error)]
pub enum WorkerErr {
    #[error(transparent)]
    Nn(#[from] NnErr),
    #[error(transparent)]
    Solver(#[from] SolverErr),
    #[error(transparent)]
    Tensor(#[from] TensorErr),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },
    #[error("every one of the {candidates} candidates degenerated")]
    AllCandidatesDegenerate { candidates: usize },
    #[error("request {id} failed: {message}")]
    Remote { id: u64, message: String },
    #[error("request {id} got a {got} response")]
    UnexpectedResponse { id: u64, got: &'static str },
    #[error("the computation context is gone")]
    Disconnected,
}
