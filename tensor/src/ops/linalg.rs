use ndarray::{Array2, Ix2, linalg};

use super::binary_grad;
use crate::{
    error::{Result, TensorErr},
    tensor::Tensor,
};

impl Tensor {
    /// Multiplies two matrices, `[i, j] x [j, k] -> [i, k]`.
    ///
    /// # Returns
    /// A `ShapeMismatch` error unless both operands are matrices with matching inner dimensions.
    pub fn matmul(&self, other: &Tensor) -> Result<Tensor> {
        let (Ok(lhs), Ok(rhs)) = (
            self.view().into_dimensionality::<Ix2>(),
            other.view().into_dimensionality::<Ix2>(),
        ) else {
            return Err(self.mismatch("matmul", other));
        };
        if lhs.ncols() != rhs.nrows() {
            return Err(self.mismatch("matmul", other));
        }

        let mut product = Array2::zeros((lhs.nrows(), rhs.ncols()));
        linalg::general_mat_mul(1.0, &lhs, &rhs, 0.0, &mut product);

        let (lhs, rhs) = (self.detach(), other.detach());
        let backward = binary_grad(
            self,
            other,
            move |g| g.matmul(&rhs.transpose()?),
            move |g| lhs.transpose()?.matmul(g),
        );
        Ok(Tensor::from_parts(product.into_dyn(), backward))
    }

    /// Adds a bias vector to every row of a matrix.
    ///
    /// # Arguments
    /// * `bias` - A vector with as many elements as this matrix has columns.
    pub fn add_bias(&self, bias: &Tensor) -> Result<Tensor> {
        if self.ndim() != 2 || bias.ndim() != 1 || self.dims()[1] != bias.dims()[0] {
            return Err(self.mismatch("add_bias", bias));
        }

        self.add(&bias.unsqueeze(0)?.repeat(0, self.dims()[0])?)
    }

    fn mismatch(&self, op: &'static str, other: &Tensor) -> TensorErr {
        TensorErr::ShapeMismatch {
            op,
            lhs: self.shape(),
            rhs: other.shape(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ops::test_support::check_gradient, tensor};

    #[test]
    fn linear_layer_closed_form() {
        let (weight, weight_grad) = tensor![[1., 2., 3.], [4., 5., 6.]].track();
        let (bias, bias_grad) = tensor![-1., -3., -2.].track();
        let (input, input_grad) = tensor![[2., 4.]].track();

        let output = input.matmul(&weight).unwrap().add_bias(&bias).unwrap();
        assert_eq!(output, tensor![[17., 21., 28.]]);

        let loss = output.sum_all();
        assert_eq!(loss.item().unwrap(), 66.);
        loss.backward(Tensor::scalar(1.)).unwrap();

        let close = |a: Tensor, b: Tensor| {
            assert_eq!(a.dims(), b.dims());
            for (x, y) in a.to_vec().iter().zip(b.to_vec()) {
                assert!((x - y).abs() < 1e-5, "{a:?} != {b:?}");
            }
        };
        close(weight_grad.take().unwrap(), tensor![[2., 2., 2.], [4., 4., 4.]]);
        close(bias_grad.take().unwrap(), tensor![1., 1., 1.]);
        close(input_grad.take().unwrap(), tensor![[6., 15.]]);
    }

    #[test]
    fn matmul_rejects_incompatible_operands() {
        let a = tensor![[1., 2.], [3., 4.]];
        let err = a.matmul(&tensor![[1., 2., 3.]]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "shape mismatch in matmul: Shape(2, 2) and Shape(1, 3)"
        );
        assert!(a.matmul(&tensor![1., 2.]).is_err());
    }

    #[test]
    fn add_bias_requires_matching_columns() {
        let err = tensor![[1., 2.]].add_bias(&tensor![1., 2., 3.]).unwrap_err();
        assert!(matches!(err, TensorErr::ShapeMismatch { op: "add_bias", .. }));
    }

    #[test]
    fn matmul_gradients_match_finite_differences() {
        let other = tensor![[0.5, -1.], [0.25, 2.], [-0.75, 0.1]];
        let x = tensor![[0.3, -0.2, 0.9], [1.1, 0.4, -0.6]];

        check_gradient(|x| x.matmul(&other).unwrap().pow(2.).sum_all(), x.clone());
        check_gradient(|x| other.transpose().unwrap().matmul(&x.transpose().unwrap()).unwrap().sin().sum_all(), x);
    }
}
