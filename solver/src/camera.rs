use tensor::{Tensor, ndarray::Array2};

use crate::{
    Result, SolverErr,
    rotation::{Axis, elementary_rotation},
};

/// Builds the rotation matrix `Rz * Ry * Rx` of a `[3]` vector of Euler angles.
///
/// Each angle feeds a single elementary rotation, their contributions are merged into one
/// gradient for `angles`.
pub fn rotation_matrix(angles: &Tensor) -> Result<Tensor> {
    if angles.dims() != [3] {
        return Err(SolverErr::InvalidInput {
            expected: "three Euler angles",
            shape: angles.shape(),
        });
    }

    Ok(angles.accum_grad(|angles| {
        let mut matrix = Tensor::from_array(Array2::<f32>::eye(3));
        for (i, axis) in Axis::ALL.into_iter().enumerate() {
            let angle = angles.slice(0, i, i + 1)?.reshape(&[])?;
            matrix = elementary_rotation(axis, &angle)?.matmul(&matrix)?;
        }
        Ok(matrix)
    })?)
}

/// Projects a batch of 3D points through a pinhole camera.
///
/// Every point is rotated, translated, divided by its negated depth and finally shifted by the
/// post-translation.
///
/// # Arguments
/// * `rotation` - The `[3, 3]` rotation matrix.
/// * `translation` - The `[3]` camera translation.
/// * `post_translation` - The `[2]` image plane offset.
/// * `points` - The `[N, 3]` points.
///
/// # Returns
/// The `[N, 2]` projected points.
pub fn project(
    rotation: &Tensor,
    translation: &Tensor,
    post_translation: &Tensor,
    points: &Tensor,
) -> Result<Tensor> {
    let n = match points.dims() {
        [n, 3] => *n,
        _ => {
            return Err(SolverErr::InvalidInput {
                expected: "an [N, 3] point batch",
                shape: points.shape(),
            });
        }
    };

    let rotated = rotation.matmul(&points.transpose()?)?.transpose()?;
    let moved = rotated.add(&translation.unsqueeze(0)?.repeat(0, n)?)?;
    let projected = divide_by_depth(&moved)?;

    Ok(projected.add(&post_translation.unsqueeze(0)?.repeat(0, n)?)?)
}

/// Maps `[N, 3]` camera space points to `(-x / z, -y / z)`.
///
/// # Returns
/// A `NumericDegeneracy` error if some point lies exactly on the camera plane.
pub fn divide_by_depth(coords: &Tensor) -> Result<Tensor> {
    if coords.ndim() != 2 || coords.dims()[1] != 3 {
        return Err(SolverErr::InvalidInput {
            expected: "an [N, 3] coordinate batch",
            shape: coords.shape(),
        });
    }

    if let Some(i) = coords.values().chunks(3).position(|p| p[2] == 0.) {
        return Err(SolverErr::NumericDegeneracy {
            reason: format!("point {i} has zero depth"),
        });
    }

    Ok(coords.accum_grad(|input| {
        let xy = input.slice(1, 0, 2)?;
        let scales = input.slice(1, 2, 3)?.pow(-1.).scale(-1.).repeat(1, 2)?;
        xy.mul(&scales)
    })?)
}
