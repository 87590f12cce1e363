use tensor::Tensor;

use super::layers::{Layer, Linear};
use crate::{ParamDict, Result};

/// A sequential model: the output of every layer is the input of the next one.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    /// Builds `Linear, ReLU, Linear` from the `{prefix}.0` and `{prefix}.2` parameters.
    pub fn mlp(params: &ParamDict, prefix: &str) -> Result<Self> {
        Ok(Self::new([
            Layer::Linear(Linear::from_params(params, &format!("{prefix}.0"))?),
            Layer::ReLU,
            Layer::Linear(Linear::from_params(params, &format!("{prefix}.2"))?),
        ]))
    }

    /// Makes a forward pass through the network.
    ///
    /// # Arguments
    /// * `x` - The input data.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let mut h = x.clone();
        for layer in &self.layers {
            h = layer.forward(&h)?;
        }

        Ok(h)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tensor::tensor;

    use super::*;

    #[test]
    fn mlp_reads_the_numbered_layers() {
        let mut params = ParamDict::new();
        params.insert("head.0.weight", tensor![[1., 0.], [0., 1.]]);
        params.insert("head.0.bias", tensor![0., -5.]);
        params.insert("head.2.weight", tensor![[2.], [3.]]);
        params.insert("head.2.bias", tensor![1.]);

        let mlp = Sequential::mlp(&params, "head").unwrap();
        assert_eq!(mlp.len(), 3);

        let out = mlp.forward(&tensor![[1., 2.], [4., 6.]]).unwrap();
        assert_eq!(out, tensor![[3.], [12.]]);
    }

    #[test]
    fn mlp_reports_missing_layers() {
        let err = Sequential::mlp(&ParamDict::new(), "head").unwrap_err();
        assert_eq!(err.to_string(), "the parameter head.0.weight is missing");
    }
}
