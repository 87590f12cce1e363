use tensor::{Shape, TensorErr};

/// The result type used in the entire solver.
pub type Result<T> = std::result::Result<T, SolverErr>;

/// The solver's error type.
#[derive(Debug, thiserror::Error)]
pub enum SolverErr {
    #[error(transparent)]
    Tensor(#[from] TensorErr),
    #[error("a perspective solution needs 13 values, got {shape}")]
    InvalidSample { shape: Shape },
    #[error("expected {expected}, got {shape}")]
    InvalidInput {
        expected: &'static str,
        shape: Shape,
    },
    #[error("numeric degeneracy: {reason}")]
    NumericDegeneracy { reason: String },
    #[error("invalid hyperparameter {name} = {value}")]
    InvalidHyperparameter { name: &'static str, value: f32 },
}
