//! Reverse-mode differentiable n-dimensional `f32` tensors.
//!
//! Every operation returns a new [`Tensor`] whose backward procedure routes the gradient it
//! receives to the operation's differentiable inputs. Gradients are pushed eagerly: calling
//! [`Tensor::backward`] on an output walks the whole graph below it.

mod conv;
mod error;
mod ops;
mod shape;
mod tensor;

pub use error::{Result, TensorErr};
pub use ndarray;
pub use shape::{Dim, Shape};
pub use tensor::{GradFn, GradSlot, Tensor};

/// Creates a constant [`Tensor`] from nested `f32` literals, like `ndarray::array!`.
#[macro_export]
macro_rules! tensor {
    ($($data:tt)+) => {
        $crate::Tensor::from_array($crate::ndarray::array![$($data)+])
    };
}
