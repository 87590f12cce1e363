use tensor::{Dim, Tensor};

use super::{Conv2d, Linear};
use crate::Result;

/// A single stage of a [`Sequential`](crate::arch::Sequential) network.
#[derive(Clone, Debug)]
pub enum Layer {
    Linear(Linear),
    Conv2d(Conv2d),
    ReLU,
    /// Averages `[B, C, ...]` over every trailing dimension, producing `[B, C]`.
    AvgAndFlatten,
}

impl Layer {
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        match self {
            Layer::Linear(l) => l.forward(x),
            Layer::Conv2d(l) => l.forward(x),
            Layer::ReLU => Ok(x.relu()),
            Layer::AvgAndFlatten => {
                let dims = x.dims();
                let (b, c) = (dims.first().copied().unwrap_or(0), dims.get(1).copied().unwrap_or(0));
                let flat = x.reshape_infer(&[Dim::Fixed(b), Dim::Fixed(c), Dim::Infer])?;
                Ok(flat.mean(2)?)
            }
        }
    }
}
