use tensor::Tensor;

use crate::{NnErr, ParamDict, Result};

/// A 2D convolution over `[B, C, H, W]` batches, padded by one pixel on every side.
#[derive(Clone, Debug)]
pub struct Conv2d {
    weight: Tensor,
    bias: Tensor,
    stride: usize,
}

impl Conv2d {
    /// Creates a new `Conv2d`.
    ///
    /// # Arguments
    /// * `weight` - The kernels, `[C_out, C_in, kh, kw]`.
    /// * `bias` - The biases, `[C_out]`.
    /// * `stride` - The step between two applications of the kernels.
    pub fn new(weight: Tensor, bias: Tensor, stride: usize) -> Result<Self> {
        if weight.ndim() != 4 || bias.ndim() != 1 || bias.dims()[0] != weight.dims()[0] || stride == 0 {
            return Err(NnErr::ParamShape {
                name: "conv2d".to_string(),
                shape: weight.shape(),
                expected: format!("[{}, C_in, kh, kw] kernels", bias.dims().first().unwrap_or(&0)),
            });
        }

        Ok(Self {
            weight,
            bias,
            stride,
        })
    }

    /// Builds the layer from the `{prefix}.weight` and `{prefix}.bias` parameters.
    pub fn from_params(params: &ParamDict, prefix: &str, stride: usize) -> Result<Self> {
        let weight = params.get(&format!("{prefix}.weight"))?.clone();
        let bias = params.get(&format!("{prefix}.bias"))?.clone();
        Self::new(weight, bias, stride)
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        Ok(x.conv2d(&self.weight, &self.bias, self.stride)?)
    }
}
