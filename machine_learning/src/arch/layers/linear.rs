use tensor::Tensor;

use crate::{NnErr, ParamDict, Result};

/// A fully connected layer computing `x * W + b`.
#[derive(Clone, Debug)]
pub struct Linear {
    weight: Tensor,
    bias: Tensor,
}

impl Linear {
    /// Creates a new `Linear`.
    ///
    /// # Arguments
    /// * `weight` - The weights, `[in, out]`.
    /// * `bias` - The biases, `[out]`.
    ///
    /// # Returns
    /// A new `Linear` instance, or an error if the shapes don't agree.
    pub fn new(weight: Tensor, bias: Tensor) -> Result<Self> {
        if weight.ndim() != 2 || bias.ndim() != 1 || bias.dims()[0] != weight.dims()[1] {
            return Err(NnErr::ParamShape {
                name: "linear".to_string(),
                shape: weight.shape(),
                expected: format!("[in, {}] weights", bias.dims().first().unwrap_or(&0)),
            });
        }

        Ok(Self { weight, bias })
    }

    /// Builds the layer from the `{prefix}.weight` and `{prefix}.bias` parameters.
    pub fn from_params(params: &ParamDict, prefix: &str) -> Result<Self> {
        let weight = params.get(&format!("{prefix}.weight"))?.clone();
        let bias = params.get(&format!("{prefix}.bias"))?.clone();

        Self::new(weight, bias).map_err(|err| match err {
            NnErr::ParamShape { shape, expected, .. } => NnErr::ParamShape {
                name: format!("{prefix}.weight"),
                shape,
                expected,
            },
            err => err,
        })
    }

    pub fn in_features(&self) -> usize {
        self.weight.dims()[0]
    }

    pub fn out_features(&self) -> usize {
        self.weight.dims()[1]
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        Ok(x.matmul(&self.weight)?.add_bias(&self.bias)?)
    }
}
