use std::rc::Rc;

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, Slice};

use super::{resolve_axis, unary_grad};
use crate::{
    error::{Result, TensorErr},
    shape::{Dim, Shape},
    tensor::Tensor,
};

impl Tensor {
    /// Reinterprets the elements of this tensor with new dimensions, sharing its data.
    pub fn reshape(&self, dims: &[usize]) -> Result<Tensor> {
        let request: Vec<Dim> = dims.iter().copied().map(Dim::Fixed).collect();
        self.reshape_infer(&request)
    }

    /// Like [`Tensor::reshape`], where a single [`Dim::Infer`] entry is computed from the
    /// element count.
    pub fn reshape_infer(&self, dims: &[Dim]) -> Result<Tensor> {
        let shape = Shape::infer(dims, self.numel())?;
        let data = self
            .shared_data()
            .into_shape_with_order(IxDyn(shape.dims()))?;

        let original = self.dims().to_vec();
        let backward = unary_grad(self, move |g| g.reshape(&original));
        Ok(Tensor::from_shared(data, backward))
    }

    /// Transposes a matrix, or every matrix of a batch of matrices.
    pub fn transpose(&self) -> Result<Tensor> {
        let data = match self.ndim() {
            2 => self.view().reversed_axes().to_owned(),
            3 => self.view().permuted_axes(IxDyn(&[0, 2, 1])).to_owned(),
            _ => {
                return Err(TensorErr::InvalidShape {
                    op: "transpose",
                    shape: self.shape(),
                    reason: "expected a 2D or 3D tensor",
                });
            }
        };

        let backward = unary_grad(self, |g| g.transpose());
        Ok(Tensor::from_parts(data, backward))
    }

    /// Inserts a dimension of size one at `axis`.
    ///
    /// Negative values count from the end of the resulting shape.
    pub fn unsqueeze(&self, axis: isize) -> Result<Tensor> {
        let axis = resolve_axis("unsqueeze", axis, self.ndim() + 1)?;
        let mut dims = self.dims().to_vec();
        dims.insert(axis, 1);
        self.reshape(&dims)
    }

    /// Tiles this tensor `reps` times along `axis`.
    ///
    /// The backward procedure sums the gradient over the repetitions.
    pub fn repeat(&self, axis: usize, reps: usize) -> Result<Tensor> {
        if axis >= self.ndim() {
            return Err(TensorErr::AxisOutOfRange {
                op: "repeat",
                axis: axis as isize,
                ndim: self.ndim(),
            });
        }

        let data = if reps == 0 {
            let mut dims = self.dims().to_vec();
            dims[axis] = 0;
            ArrayD::zeros(IxDyn(&dims))
        } else {
            let view = self.view();
            let copies: Vec<ArrayViewD<'_, f32>> = (0..reps).map(|_| view.clone()).collect();
            ndarray::concatenate(Axis(axis), &copies)?
        };

        let dims = self.dims().to_vec();
        let backward = unary_grad(self, move |g| {
            let mut extended = dims[..axis].to_vec();
            extended.push(reps);
            extended.extend_from_slice(&dims[axis..]);
            g.reshape(&extended)?.sum(axis as isize)
        });
        Ok(Tensor::from_parts(data, backward))
    }

    /// Takes the elements `start..end` along `axis`.
    ///
    /// # Arguments
    /// * `axis` - The axis to slice, negative values count from the last dimension.
    /// * `start` - The first index kept.
    /// * `end` - One past the last index kept.
    pub fn slice(&self, axis: isize, start: usize, end: usize) -> Result<Tensor> {
        let axis = resolve_axis("slice", axis, self.ndim())?;
        let len = self.dims()[axis];
        if start > end || end > len {
            return Err(TensorErr::InvalidRange { start, end, len });
        }

        let data = self
            .view()
            .slice_axis(Axis(axis), Slice::from(start..end))
            .to_owned();

        let dims = self.dims().to_vec();
        let backward = unary_grad(self, move |g| {
            let mut full = ArrayD::zeros(IxDyn(&dims));
            full.slice_axis_mut(Axis(axis), Slice::from(start..end))
                .assign(&g.view());
            Ok(Tensor::from(full))
        });
        Ok(Tensor::from_parts(data, backward))
    }

    /// Joins tensors along `axis`. All other dimensions must match.
    pub fn cat(tensors: &[Tensor], axis: usize) -> Result<Tensor> {
        let Some(first) = tensors.first() else {
            return Err(TensorErr::Empty { op: "cat" });
        };
        if axis >= first.ndim() {
            return Err(TensorErr::AxisOutOfRange {
                op: "cat",
                axis: axis as isize,
                ndim: first.ndim(),
            });
        }

        for other in &tensors[1..] {
            let compatible = other.ndim() == first.ndim()
                && first
                    .dims()
                    .iter()
                    .zip(other.dims())
                    .enumerate()
                    .all(|(i, (a, b))| i == axis || a == b);

            if !compatible {
                return Err(TensorErr::ShapeMismatch {
                    op: "cat",
                    lhs: first.shape(),
                    rhs: other.shape(),
                });
            }
        }

        let views: Vec<ArrayViewD<'_, f32>> = tensors.iter().map(Tensor::view).collect();
        let data = ndarray::concatenate(Axis(axis), &views)?;

        if !tensors.iter().any(Tensor::needs_grad) {
            return Ok(Tensor::from_parts(data, None));
        }

        let parts: Vec<_> = tensors
            .iter()
            .map(|t| (t.dims()[axis], t.grad_fn()))
            .collect();

        let backward = move |grad: Tensor| -> Result<()> {
            let mut offset = 0;
            for (n, upstream) in &parts {
                if let Some(upstream) = upstream {
                    upstream(grad.slice(axis as isize, offset, offset + n)?)?;
                }
                offset += n;
            }
            Ok(())
        };
        Ok(Tensor::from_parts(data, Some(Rc::new(backward))))
    }
}
