use crate::shape::Shape;

/// The result type used in the entire tensor module.
pub type Result<T> = std::result::Result<T, TensorErr>;

/// The tensor module's error type.
#[derive(Debug, thiserror::Error)]
pub enum TensorErr {
    #[error("shape mismatch in {op}: {lhs} and {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },
    #[error("invalid shape for {op}: {shape}, {reason}")]
    InvalidShape {
        op: &'static str,
        shape: Shape,
        reason: &'static str,
    },
    #[error("axis {axis} out of range for {op} on a tensor with {ndim} dimensions")]
    AxisOutOfRange {
        op: &'static str,
        axis: isize,
        ndim: usize,
    },
    #[error("invalid range {start}..{end} for an axis of size {len}")]
    InvalidRange {
        start: usize,
        end: usize,
        len: usize,
    },
    #[error("cannot reshape {numel} elements into {request}")]
    Inference { request: String, numel: usize },
    #[error("data size {len} does not match {shape}")]
    DataLength { len: usize, shape: Shape },
    #[error("{op} is empty")]
    Empty { op: &'static str },
    #[error("backward is not supported for {op}")]
    UnsupportedGradient { op: &'static str },
    #[error(transparent)]
    Layout(#[from] ndarray::ShapeError),
}
