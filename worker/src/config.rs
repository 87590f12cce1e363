use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use machine_learning::arch::DEFAULT_NUM_FEATS;
use serde::Deserialize;
use solver::{Adam, DEFAULT_LEARNING_RATE};

use crate::Result;

const DEFAULT_CANDIDATES: NonZeroUsize = NonZeroUsize::new(4).unwrap();
const DEFAULT_ITERATIONS: NonZeroUsize = NonZeroUsize::new(10_000).unwrap();
const DEFAULT_DIFFUSION_STEPS: NonZeroUsize = NonZeroUsize::new(32).unwrap();

/// Immutable execution bounds of the computation context.
///
/// Every field is optional in the JSON form and falls back to the production value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    candidates: NonZeroUsize,
    iterations: NonZeroUsize,
    step_size: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    diffusion_steps: NonZeroUsize,
    num_feats: usize,
    seed: Option<u64>,
    diffusion_model: PathBuf,
    stretch_model: PathBuf,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_CANDIDATES,
            iterations: DEFAULT_ITERATIONS,
            step_size: DEFAULT_LEARNING_RATE,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            diffusion_steps: DEFAULT_DIFFUSION_STEPS,
            num_feats: DEFAULT_NUM_FEATS,
            seed: None,
            diffusion_model: PathBuf::from("models/diffusion.bin"),
            stretch_model: PathBuf::from("models/stretch.bin"),
        }
    }
}

impl WorkerConfig {
    /// Reads a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses a configuration from a JSON document.
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Sets the amount of diffusion samples refined per solve.
    pub fn with_candidates(mut self, candidates: NonZeroUsize) -> Self {
        self.candidates = candidates;
        self
    }

    /// Sets the amount of optimizer steps per candidate.
    pub fn with_iterations(mut self, iterations: NonZeroUsize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Seeds the noise of the diffusion sampler.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Points both model resources at `dir`, keeping their file names.
    pub fn with_model_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        let dir = dir.as_ref();
        self.diffusion_model = dir.join("diffusion.bin");
        self.stretch_model = dir.join("stretch.bin");
        self
    }

    /// Sets the frequency feature count of the diffusion model's condition embedding.
    pub fn with_num_feats(mut self, num_feats: usize) -> Self {
        self.num_feats = num_feats;
        self
    }

    pub fn candidates(&self) -> usize {
        self.candidates.get()
    }

    pub fn iterations(&self) -> usize {
        self.iterations.get()
    }

    pub fn diffusion_steps(&self) -> usize {
        self.diffusion_steps.get()
    }

    pub fn num_feats(&self) -> usize {
        self.num_feats
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn diffusion_model(&self) -> &Path {
        &self.diffusion_model
    }

    pub fn stretch_model(&self) -> &Path {
        &self.stretch_model
    }

    /// Builds a fresh optimizer with the configured hyperparameters.
    pub fn optimizer(&self) -> Result<Adam> {
        Ok(Adam::new(self.step_size, self.beta1, self.beta2, self.epsilon)?)
    }
}
