#![cfg(test)]

use rand::{SeedableRng, rngs::StdRng};
use tensor::Tensor;

use crate::ParamDict;

/// Seeded random denoiser parameters in the stored `[out, in]` layout.
pub fn random_denoiser_params(d_model: usize, num_feats: usize, seed: u64) -> ParamDict {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut params = ParamDict::new();
    let mut linear = |name: &str, fan_in: usize, fan_out: usize| {
        let weight = Tensor::randn(&[fan_out, fan_in], &mut rng).scale(1. / (fan_in as f32).sqrt());
        params.insert(format!("{name}.weight"), weight);
        params.insert(format!("{name}.bias"), Tensor::randn(&[fan_out], &mut rng).scale(0.1));
    };

    linear("time_embed.0", d_model, d_model);
    linear("time_embed.2", d_model, d_model);
    linear("cond_embed.0", 8 * (1 + num_feats), d_model);
    linear("cond_embed.2", d_model, d_model);
    linear("input_embed.0", 13, d_model);
    linear("input_embed.2", d_model, d_model);
    linear("backbone.0", d_model, d_model);
    linear("backbone.2", d_model, d_model);
    linear("backbone.4", d_model, 26);
    params
}

/// Seeded random aspect-ratio classifier parameters in the stored layout.
pub fn random_stretch_params(channels: usize, ratios: &[f32], seed: u64) -> ParamDict {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut params = ParamDict::new();

    let mut in_channels = 3;
    for index in [0, 2, 4, 6] {
        let fan_in = in_channels * 9;
        let weight = Tensor::randn(&[channels, in_channels, 3, 3], &mut rng).scale(1. / (fan_in as f32).sqrt());
        params.insert(format!("layers.{index}.weight"), weight);
        params.insert(format!("layers.{index}.bias"), Tensor::randn(&[channels], &mut rng).scale(0.1));
        in_channels = channels;
    }

    let weight = Tensor::randn(&[ratios.len(), channels], &mut rng).scale(1. / (channels as f32).sqrt());
    params.insert("layers.10.weight", weight);
    params.insert("layers.10.bias", Tensor::randn(&[ratios.len()], &mut rng).scale(0.1));
    params.insert("ratios", Tensor::from_vec(ratios.to_vec(), &[ratios.len()]).unwrap());
    params
}
