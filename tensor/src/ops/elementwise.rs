use ndarray::{ArrayD, Zip};

use super::{binary_grad, ensure_same_shape, unary_grad};
use crate::{error::Result, tensor::Tensor};

fn zip_with<F>(op: &'static str, lhs: &Tensor, rhs: &Tensor, f: F) -> Result<ArrayD<f32>>
where
    F: Fn(f32, f32) -> f32,
{
    ensure_same_shape(op, lhs, rhs)?;
    Ok(Zip::from(lhs.view())
        .and(rhs.view())
        .map_collect(|&a, &b| f(a, b)))
}

impl Tensor {
    /// Element-wise sum of two tensors of the same shape.
    pub fn add(&self, other: &Tensor) -> Result<Tensor> {
        let data = zip_with("add", self, other, |a, b| a + b)?;
        let backward = binary_grad(self, other, |g| Ok(g.clone()), |g| Ok(g.clone()));
        Ok(Tensor::from_parts(data, backward))
    }

    /// Element-wise difference of two tensors of the same shape.
    pub fn sub(&self, other: &Tensor) -> Result<Tensor> {
        let data = zip_with("sub", self, other, |a, b| a - b)?;
        let backward = binary_grad(self, other, |g| Ok(g.clone()), |g| Ok(g.scale(-1.)));
        Ok(Tensor::from_parts(data, backward))
    }

    /// Element-wise product of two tensors of the same shape.
    pub fn mul(&self, other: &Tensor) -> Result<Tensor> {
        let data = zip_with("mul", self, other, |a, b| a * b)?;
        let (lhs, rhs) = (self.detach(), other.detach());
        let backward = binary_grad(self, other, move |g| g.mul(&rhs), move |g| g.mul(&lhs));
        Ok(Tensor::from_parts(data, backward))
    }

    /// Multiplies every element by `s`.
    pub fn scale(&self, s: f32) -> Tensor {
        let backward = unary_grad(self, move |g| Ok(g.scale(s)));
        Tensor::from_parts(self.view().mapv(|x| x * s), backward)
    }

    /// Adds `s` to every element.
    pub fn add_scalar(&self, s: f32) -> Tensor {
        let backward = unary_grad(self, |g| Ok(g.clone()));
        Tensor::from_parts(self.view().mapv(|x| x + s), backward)
    }

    /// Raises every element to the real power `p`.
    ///
    /// Division is expressed as `pow(-1.)` followed by a product.
    pub fn pow(&self, p: f32) -> Tensor {
        let input = self.detach();
        let backward = unary_grad(self, move |g| g.mul(&input.pow(p - 1.).scale(p)));
        Tensor::from_parts(self.view().mapv(|x| x.powf(p)), backward)
    }

    pub fn exp(&self) -> Tensor {
        let out = Tensor::from_parts(self.view().mapv(f32::exp), None);
        let saved = out.clone();
        match unary_grad(self, move |g| g.mul(&saved)) {
            Some(backward) => Tensor::from_shared(out.shared_data(), Some(backward)),
            None => out,
        }
    }

    pub fn sin(&self) -> Tensor {
        let input = self.detach();
        let backward = unary_grad(self, move |g| g.mul(&input.cos()));
        Tensor::from_parts(self.view().mapv(f32::sin), backward)
    }

    pub fn cos(&self) -> Tensor {
        let input = self.detach();
        let backward = unary_grad(self, move |g| Ok(g.mul(&input.sin())?.scale(-1.)));
        Tensor::from_parts(self.view().mapv(f32::cos), backward)
    }

    /// Clamps negative elements to zero. The gradient is dropped wherever the output is zero.
    pub fn relu(&self) -> Tensor {
        let out = self.view().mapv(|x| if x < 0. { 0. } else { x });
        let mask = Tensor::from_parts(out.mapv(|x| if x <= 0. { 0. } else { 1. }), None);
        let backward = unary_grad(self, move |g| g.mul(&mask));
        Tensor::from_parts(out, backward)
    }
}
