use std::path::Path;

use log::info;
use tensor::Tensor;

use super::{
    Sequential,
    layers::{Conv2d, Layer, Linear},
};
use crate::{NnErr, ParamDict, Result};

/// Classifies the aspect ratio of a flattened `[B, 3, 64, 64]` preview.
///
/// Four padded convolutions (strides 2, 2, 2 and 1) with ReLU activations, a global average pool
/// and a linear head produce one logit per ratio bucket.
#[derive(Clone, Debug)]
pub struct StretchModel {
    backbone: Sequential,
    ratios: Vec<f32>,
}

impl StretchModel {
    /// Builds the classifier from its parameters, stored with `[out, in]` matrices.
    pub fn new(params: ParamDict) -> Result<Self> {
        let params = params.with_transposed_weights()?;

        let head = Linear::from_params(&params, "layers.10")?;
        let ratios = params.get("ratios")?;
        if ratios.numel() != head.out_features() {
            return Err(NnErr::ParamShape {
                name: "ratios".to_string(),
                shape: ratios.shape(),
                expected: format!("{} buckets", head.out_features()),
            });
        }
        let ratios = ratios.to_vec();

        let backbone = Sequential::new([
            Layer::Conv2d(Conv2d::from_params(&params, "layers.0", 2)?),
            Layer::ReLU,
            Layer::Conv2d(Conv2d::from_params(&params, "layers.2", 2)?),
            Layer::ReLU,
            Layer::Conv2d(Conv2d::from_params(&params, "layers.4", 2)?),
            Layer::ReLU,
            Layer::Conv2d(Conv2d::from_params(&params, "layers.6", 1)?),
            Layer::ReLU,
            Layer::AvgAndFlatten,
            Layer::Linear(head),
        ]);

        Ok(Self { backbone, ratios })
    }

    /// Loads the classifier from a packed parameter resource.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let model = Self::new(ParamDict::load(path)?)?;
        info!(buckets = model.ratios.len(); "loaded stretch model from {}", path.display());
        Ok(model)
    }

    /// The ratio value of every bucket.
    pub fn ratios(&self) -> &[f32] {
        &self.ratios
    }

    /// Computes the bucket logits, `[B, buckets]`.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.backbone.forward(x)
    }

    /// Predicts one aspect ratio (height over width) per image of the batch.
    ///
    /// Every image picks the bucket with the largest logit, the first one on ties.
    pub fn predict(&self, x: &Tensor) -> Result<Vec<f32>> {
        let logits = self.forward(x)?;
        let buckets = self.ratios.len();

        logits
            .values()
            .chunks(buckets.max(1))
            .map(|row| {
                let best = row
                    .iter()
                    .enumerate()
                    .fold(0, |best, (i, &v)| if v > row[best] { i } else { best });
                self.ratios.get(best).copied().ok_or_else(|| NnErr::ParamShape {
                    name: "ratios".to_string(),
                    shape: tensor::Shape::new([buckets]),
                    expected: format!("at least {} buckets", best + 1),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::testing::random_stretch_params;

    const RATIOS: [f32; 5] = [0.5, 0.75, 1., 1.5, 2.];

    #[test]
    fn logits_have_one_column_per_bucket() {
        let model = StretchModel::new(random_stretch_params(4, &RATIOS, 1)).unwrap();
        let x = Tensor::randn(&[2, 3, 64, 64], &mut StdRng::seed_from_u64(2));

        let logits = model.forward(&x).unwrap();
        assert_eq!(logits.dims(), &[2, RATIOS.len()]);
    }

    #[test]
    fn predict_returns_the_argmax_ratio() {
        let model = StretchModel::new(random_stretch_params(4, &RATIOS, 5)).unwrap();
        let x = Tensor::randn(&[1, 3, 64, 64], &mut StdRng::seed_from_u64(6)).scale(0.5).add_scalar(0.5);

        let logits = model.forward(&x).unwrap().to_vec();
        let argmax = (0..logits.len())
            .fold(0, |best, i| if logits[i] > logits[best] { i } else { best });

        assert_eq!(model.predict(&x).unwrap(), vec![RATIOS[argmax]]);
    }

    #[test]
    fn ratio_count_must_match_the_head() {
        let mut params = random_stretch_params(4, &RATIOS, 1);
        params.insert("ratios", Tensor::ones(&[3]));

        let err = StretchModel::new(params).unwrap_err();
        assert!(matches!(err, NnErr::ParamShape { name, .. } if name == "ratios"));
    }
}
