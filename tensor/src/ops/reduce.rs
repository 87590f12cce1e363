use ndarray::{ArrayD, Axis, IxDyn};

use super::{resolve_axis, unary_grad};
use crate::{error::Result, tensor::Tensor};

impl Tensor {
    /// Sums over `axis`, removing it from the shape.
    ///
    /// # Arguments
    /// * `axis` - The axis to reduce, negative values count from the last dimension.
    ///
    /// # Returns
    /// The reduced tensor, its backward broadcasts the gradient back over `axis`.
    pub fn sum(&self, axis: isize) -> Result<Tensor> {
        let axis = resolve_axis("sum", axis, self.ndim())?;
        let n = self.dims()[axis];

        let data = self.view().sum_axis(Axis(axis));
        let backward = unary_grad(self, move |g| g.unsqueeze(axis as isize)?.repeat(axis, n));
        Ok(Tensor::from_parts(data, backward))
    }

    /// Sums every element into a scalar.
    pub fn sum_all(&self) -> Tensor {
        let dims = self.dims().to_vec();
        let total = self.view().sum();

        let backward = unary_grad(self, move |g| Ok(Tensor::full(&dims, g.item()?)));
        Tensor::from_parts(ArrayD::from_elem(IxDyn(&[]), total), backward)
    }

    /// Averages over `axis`, removing it from the shape.
    pub fn mean(&self, axis: isize) -> Result<Tensor> {
        let resolved = resolve_axis("mean", axis, self.ndim())?;
        let n = self.dims()[resolved];
        Ok(self.sum(axis)?.scale(1. / n as f32))
    }

    /// Averages every element into a scalar.
    pub fn mean_all(&self) -> Tensor {
        self.sum_all().scale(1. / self.numel() as f32)
    }
}
