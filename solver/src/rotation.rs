use tensor::{
    Tensor,
    ndarray::{Array2, arr2},
};

use crate::{Result, SolverErr};

/// The axis of an elementary rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// The axes in the order their rotations are chained.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// The elementary rotation matrix of `angle` around this axis.
    fn matrix(self, angle: f32) -> Array2<f32> {
        let (sin, cos) = angle.sin_cos();
        arr2(&match self {
            Axis::X => [[1., 0., 0.], [0., cos, -sin], [0., sin, cos]],
            Axis::Y => [[cos, 0., sin], [0., 1., 0.], [-sin, 0., cos]],
            Axis::Z => [[cos, -sin, 0.], [sin, cos, 0.], [0., 0., 1.]],
        })
    }

    /// The derivative of [`Axis::matrix`] with respect to the angle.
    fn derivative(self, angle: f32) -> Array2<f32> {
        let (sin, cos) = angle.sin_cos();
        arr2(&match self {
            Axis::X => [[0., 0., 0.], [0., -sin, -cos], [0., cos, -sin]],
            Axis::Y => [[-sin, 0., cos], [0., 0., 0.], [-cos, 0., -sin]],
            Axis::Z => [[-sin, -cos, 0.], [cos, -sin, 0.], [0., 0., 0.]],
        })
    }
}

/// Builds the `[3, 3]` rotation of a scalar `angle` around `axis`.
///
/// The backward procedure contracts the incoming gradient with the derivative of the matrix, so
/// the angle receives a single scalar contribution.
///
/// # Returns
/// An error if `angle` is not zero-dimensional.
pub fn rotation(axis: Axis, angle: &Tensor) -> Result<Tensor> {
    if angle.ndim() != 0 {
        return Err(SolverErr::InvalidInput {
            expected: "a scalar angle",
            shape: angle.shape(),
        });
    }

    Ok(elementary_rotation(axis, angle)?)
}

pub(crate) fn elementary_rotation(axis: Axis, angle: &Tensor) -> tensor::Result<Tensor> {
    let theta = angle.item()?;
    let matrix = Tensor::from_array(axis.matrix(theta));
    if !angle.needs_grad() {
        return Ok(matrix);
    }

    let angle = angle.clone();
    let derivative = Tensor::from_array(axis.derivative(theta));
    Ok(matrix.with_backward(move |grad| {
        let downstream = grad.mul(&derivative)?.sum_all().detach();
        angle.backward(downstream)
    }))
}
