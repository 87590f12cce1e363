mod elementwise;
mod layout;
mod linalg;
mod reduce;

use std::rc::Rc;

use crate::{
    error::{Result, TensorErr},
    tensor::{GradFn, Tensor},
};

/// Builds the backward procedure of an operation with a single input.
///
/// # Arguments
/// * `input` - The operation's input.
/// * `local` - Maps the gradient of the output to the gradient of the input.
///
/// # Returns
/// `None` if the input is not differentiable.
pub(crate) fn unary_grad<F>(input: &Tensor, local: F) -> Option<GradFn>
where
    F: Fn(&Tensor) -> Result<Tensor> + 'static,
{
    let upstream = input.grad_fn()?;
    Some(Rc::new(move |grad: Tensor| -> Result<()> {
        upstream(local(&grad)?)
    }))
}

/// Builds the backward procedure of an operation with two inputs.
///
/// Each local gradient is only computed when the matching input is differentiable.
pub(crate) fn binary_grad<F, G>(lhs: &Tensor, rhs: &Tensor, local_lhs: F, local_rhs: G) -> Option<GradFn>
where
    F: Fn(&Tensor) -> Result<Tensor> + 'static,
    G: Fn(&Tensor) -> Result<Tensor> + 'static,
{
    let lhs_upstream = lhs.grad_fn();
    let rhs_upstream = rhs.grad_fn();
    if lhs_upstream.is_none() && rhs_upstream.is_none() {
        return None;
    }

    Some(Rc::new(move |grad: Tensor| -> Result<()> {
        if let Some(upstream) = &lhs_upstream {
            upstream(local_lhs(&grad)?)?;
        }
        if let Some(upstream) = &rhs_upstream {
            upstream(local_rhs(&grad)?)?;
        }
        Ok(())
    }))
}

/// A backward procedure that always fails, for operations that only support inference.
pub(crate) fn unsupported_grad(input: &Tensor, op: &'static str) -> Option<GradFn> {
    if !input.needs_grad() {
        return None;
    }

    Some(Rc::new(move |_: Tensor| -> Result<()> {
        Err(TensorErr::UnsupportedGradient { op })
    }))
}

/// Resolves a possibly negative axis against `ndim` dimensions.
pub(crate) fn resolve_axis(op: &'static str, axis: isize, ndim: usize) -> Result<usize> {
    let resolved = if axis < 0 { axis + ndim as isize } else { axis };
    if resolved < 0 || resolved as usize >= ndim {
        return Err(TensorErr::AxisOutOfRange { op, axis, ndim });
    }

    Ok(resolved as usize)
}

pub(crate) fn ensure_same_shape(op: &'static str, lhs: &Tensor, rhs: &Tensor) -> Result<()> {
    if lhs.dims() != rhs.dims() {
        return Err(TensorErr::ShapeMismatch {
            op,
            lhs: lhs.shape(),
            rhs: rhs.shape(),
        });
    }

    Ok(())
}
