use std::path::Path;

use log::info;
use tensor::{Dim, Tensor, TensorErr};

use super::{
    Sequential,
    layers::{Layer, Linear},
};
use crate::{NnErr, ParamDict, Result, diffusion::Denoiser};

/// The amount of frequency features per condition coordinate used by the shipped denoiser.
pub const DEFAULT_NUM_FEATS: usize = 30;

const MAX_PERIOD: f32 = 10000.;
const MAX_ARG: f32 = 1000.;

/// The noise prediction network of the diffusion sampler.
///
/// Three embedding heads (timestep, noisy state and condition) are summed, rescaled by `1/√3`
/// and passed through a ReLU backbone.
#[derive(Clone, Debug)]
pub struct DiffusionModel {
    d_model: usize,
    num_feats: usize,
    time_embed: Sequential,
    cond_embed: Sequential,
    input_embed: Sequential,
    backbone: Sequential,
}

impl DiffusionModel {
    /// Builds the denoiser from its parameters, stored with `[out, in]` matrices.
    ///
    /// # Arguments
    /// * `params` - The raw parameters.
    /// * `num_feats` - The amount of frequency features per condition coordinate.
    pub fn new(params: ParamDict, num_feats: usize) -> Result<Self> {
        let params = params.with_transposed_weights()?;

        let time_bias = params.get("time_embed.2.bias")?;
        let d_model = match time_bias.dims() {
            [d] => *d,
            _ => {
                return Err(NnErr::ParamShape {
                    name: "time_embed.2.bias".to_string(),
                    shape: time_bias.shape(),
                    expected: "a vector".to_string(),
                });
            }
        };

        Ok(Self {
            d_model,
            num_feats,
            time_embed: Sequential::mlp(&params, "time_embed")?,
            cond_embed: Sequential::mlp(&params, "cond_embed")?,
            input_embed: Sequential::mlp(&params, "input_embed")?,
            backbone: backbone(&params)?,
        })
    }

    /// Loads the denoiser from a packed parameter resource.
    pub fn load<P: AsRef<Path>>(path: P, num_feats: usize) -> Result<Self> {
        let path = path.as_ref();
        let model = Self::new(ParamDict::load(path)?, num_feats)?;
        info!(
            d_model = model.d_model,
            backbone_layers = model.backbone.len();
            "loaded diffusion model from {}",
            path.display()
        );
        Ok(model)
    }

    /// The width of the shared embedding space.
    pub fn d_model(&self) -> usize {
        self.d_model
    }

    /// Predicts the model output for a batch of noisy states.
    ///
    /// # Arguments
    /// * `x` - The noisy states, `[B, D]`.
    /// * `t` - The training timestep of every state, `[B]`.
    /// * `cond` - The conditioning coordinates, `[B, C]`.
    ///
    /// # Returns
    /// The backbone output, `[B, 2 * D]`, whose first half is the predicted noise.
    pub fn forward(&self, x: &Tensor, t: &Tensor, cond: &Tensor) -> Result<Tensor> {
        let time_emb = self.time_embed.forward(&timestep_embedding(t, self.d_model)?)?;
        let input_emb = self.input_embed.forward(x)?;
        let cond_emb = self
            .cond_embed
            .forward(&frequency_pos_embedding(cond, self.num_feats)?)?;

        let combined = time_emb
            .add(&input_emb)?
            .add(&cond_emb)?
            .scale(1. / 3f32.sqrt());
        self.backbone.forward(&combined)
    }
}

impl Denoiser for DiffusionModel {
    fn denoise(&self, x: &Tensor, t: &Tensor, cond: &Tensor) -> Result<Tensor> {
        self.forward(x, t, cond)
    }
}

/// Collects `backbone.0`, `backbone.2`, ... for as long as they are present, with a ReLU between
/// every pair of linear layers.
fn backbone(params: &ParamDict) -> Result<Sequential> {
    let mut layers = Vec::new();
    let mut index = 0;
    while params.contains(&format!("backbone.{index}.weight")) {
        if index > 0 {
            layers.push(Layer::ReLU);
        }
        layers.push(Layer::Linear(Linear::from_params(params, &format!("backbone.{index}"))?));
        index += 2;
    }

    if layers.is_empty() {
        return Err(NnErr::MissingParam {
            name: "backbone.0.weight".to_string(),
        });
    }

    Ok(Sequential::new(layers))
}

/// Sinusoidal embedding of a batch of timesteps.
///
/// # Arguments
/// * `timesteps` - The timesteps, `[B]`.
/// * `dim` - The embedding width; the first half holds cosines and the second half sines.
///
/// # Returns
/// The embeddings, `[B, dim]`.
pub fn timestep_embedding(timesteps: &Tensor, dim: usize) -> Result<Tensor> {
    let half = dim / 2;
    let batch = timesteps.numel();

    let freqs: Vec<f32> = (0..half)
        .map(|i| (i as f32 * (-MAX_PERIOD.ln() / half as f32)).exp())
        .collect();
    let freqs = Tensor::from_vec(freqs, &[1, half])?.repeat(0, batch)?;

    let args = timesteps
        .reshape_infer(&[Dim::Infer, Dim::Fixed(1)])?
        .repeat(1, half)?
        .mul(&freqs)?;

    Ok(Tensor::cat(&[args.cos(), args.sin()], 1)?)
}

/// Frequency positional embedding of a batch of coordinates.
///
/// Every coordinate is multiplied by `num_feats / 2` geometrically spaced coefficients in
/// `[1, 1000]`; the result is `[coords, cos(args), sin(args)]`.
///
/// # Arguments
/// * `coords` - The coordinates, `[B, C]`.
/// * `num_feats` - The amount of features per coordinate, zero disables the embedding.
///
/// # Returns
/// The embeddings, `[B, C * (1 + num_feats)]` for an even `num_feats`.
pub fn frequency_pos_embedding(coords: &Tensor, num_feats: usize) -> Result<Tensor> {
    if num_feats == 0 {
        return Ok(coords.clone());
    }

    let [batch, width] = *coords.dims() else {
        return Err(TensorErr::InvalidShape {
            op: "frequency_pos_embedding",
            shape: coords.shape(),
            reason: "expected [B, C] coordinates",
        }
        .into());
    };

    let half = num_feats / 2;
    let step = if half > 1 {
        MAX_ARG.ln() / (half - 1) as f32
    } else {
        0.
    };
    let coeffs: Vec<f32> = (0..half).map(|i| (i as f32 * step).exp()).collect();
    let coeffs = Tensor::from_vec(coeffs, &[1, 1, half])?
        .repeat(0, batch)?
        .repeat(1, width)?;

    let args = coords
        .unsqueeze(-1)?
        .repeat(2, half)?
        .mul(&coeffs)?
        .reshape_infer(&[Dim::Fixed(batch), Dim::Infer])?;

    Ok(Tensor::cat(&[coords.clone(), args.cos(), args.sin()], 1)?)
}
