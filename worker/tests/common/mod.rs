use std::{
    fs,
    path::{Path, PathBuf},
    process,
};

use machine_learning::ParamDict;
use rand::{SeedableRng, rngs::StdRng};
use tensor::Tensor;

pub const D_MODEL: usize = 16;
pub const NUM_FEATS: usize = 30;
pub const RATIOS: [f32; 4] = [0.5, 1., 1.5, 2.];

/// A fresh directory for the model resources of one test.
pub fn model_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("flatten-{name}-{}", process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn linear(params: &mut ParamDict, rng: &mut StdRng, name: &str, fan_in: usize, fan_out: usize) {
    let weight = Tensor::randn(&[fan_out, fan_in], rng).scale(1. / (fan_in as f32).sqrt());
    params.insert(format!("{name}.weight"), weight);
    params.insert(format!("{name}.bias"), Tensor::randn(&[fan_out], rng).scale(0.1));
}

/// Writes a seeded random denoiser to `dir/diffusion.bin`.
pub fn write_diffusion_model(dir: &Path, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut params = ParamDict::new();

    linear(&mut params, &mut rng, "time_embed.0", D_MODEL, D_MODEL);
    linear(&mut params, &mut rng, "time_embed.2", D_MODEL, D_MODEL);
    linear(&mut params, &mut rng, "cond_embed.0", 8 * (1 + NUM_FEATS), D_MODEL);
    linear(&mut params, &mut rng, "cond_embed.2", D_MODEL, D_MODEL);
    linear(&mut params, &mut rng, "input_embed.0", 13, D_MODEL);
    linear(&mut params, &mut rng, "input_embed.2", D_MODEL, D_MODEL);
    linear(&mut params, &mut rng, "backbone.0", D_MODEL, D_MODEL);
    linear(&mut params, &mut rng, "backbone.2", D_MODEL, 26);

    fs::write(dir.join("diffusion.bin"), params.to_bytes().unwrap()).unwrap();
}

/// Writes a seeded random aspect-ratio classifier to `dir/stretch.bin`.
pub fn write_stretch_model(dir: &Path, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut params = ParamDict::new();

    let channels = 4;
    let mut in_channels = 3;
    for index in [0, 2, 4, 6] {
        let fan_in = (in_channels * 9) as f32;
        let weight = Tensor::randn(&[channels, in_channels, 3, 3], &mut rng).scale(1. / fan_in.sqrt());
        params.insert(format!("layers.{index}.weight"), weight);
        params.insert(format!("layers.{index}.bias"), Tensor::randn(&[channels], &mut rng).scale(0.1));
        in_channels = channels;
    }
    linear(&mut params, &mut rng, "layers.10", channels, RATIOS.len());
    params.insert("ratios", Tensor::from_vec(RATIOS.to_vec(), &[RATIOS.len()]).unwrap());

    fs::write(dir.join("stretch.bin"), params.to_bytes().unwrap()).unwrap();
}
