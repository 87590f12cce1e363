use tensor::{Shape, TensorErr};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, NnErr>;

/// The machine learning module's error type.
#[derive(Debug, thiserror::Error)]
pub enum NnErr {
    #[error(transparent)]
    Tensor(#[from] TensorErr),
    #[error("the parameter {name} is missing")]
    MissingParam { name: String },
    #[error("the parameter {name} has {shape}, expected {expected}")]
    ParamShape {
        name: String,
        shape: Shape,
        expected: String,
    },
    #[error("invalid diffusion schedule: {reason}")]
    InvalidSchedule { reason: String },
    #[error("timestep {t} is out of range for a schedule of {steps} steps")]
    TimestepOutOfRange { t: usize, steps: usize },
    #[error("failed to load model resource: {reason}")]
    ResourceLoadFailure { reason: String },
    #[error("failed to read model resource: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed model metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}
