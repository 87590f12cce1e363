use std::path::PathBuf;

use log::info;
use machine_learning::arch::{DiffusionModel, StretchModel};

use crate::{Result, config::WorkerConfig};

/// Lazily loaded networks, kept for the lifetime of the computation context.
///
/// Each model is read from disk on first use and never reloaded or mutated afterwards; a failed
/// load leaves the slot empty so the next request tries again.
#[derive(Debug)]
pub struct ModelCache {
    diffusion_path: PathBuf,
    stretch_path: PathBuf,
    num_feats: usize,
    diffusion: Option<DiffusionModel>,
    stretch: Option<StretchModel>,
}

impl ModelCache {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            diffusion_path: config.diffusion_model().to_path_buf(),
            stretch_path: config.stretch_model().to_path_buf(),
            num_feats: config.num_feats(),
            diffusion: None,
            stretch: None,
        }
    }

    /// Returns the denoiser, loading it on first use.
    pub fn diffusion(&mut self) -> Result<&DiffusionModel> {
        let model = match self.diffusion.take() {
            Some(model) => model,
            None => {
                info!("loading diffusion model from {}", self.diffusion_path.display());
                DiffusionModel::load(&self.diffusion_path, self.num_feats)?
            }
        };

        Ok(self.diffusion.insert(model))
    }

    /// Returns the aspect-ratio classifier, loading it on first use.
    pub fn stretch(&mut self) -> Result<&StretchModel> {
        let model = match self.stretch.take() {
            Some(model) => model,
            None => {
                info!("loading stretch model from {}", self.stretch_path.display());
                StretchModel::load(&self.stretch_path)?
            }
        };

        Ok(self.stretch.insert(model))
    }

    pub fn is_diffusion_loaded(&self) -> bool {
        self.diffusion.is_some()
    }

    pub fn is_stretch_loaded(&self) -> bool {
        self.stretch.is_some()
    }
}
