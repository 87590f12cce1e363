use crate::{NnErr, Result};

/// The amount of steps the shipped denoiser was trained with.
pub const TRAIN_STEPS: usize = 1024;

/// A noise schedule: the beta of every sampling step and the training timestep it stands for.
#[derive(Clone, Debug, PartialEq)]
pub struct Schedule {
    timestep_map: Vec<usize>,
    betas: Vec<f64>,
}

impl Schedule {
    /// Creates a new `Schedule`.
    ///
    /// # Returns
    /// An error if the lengths differ, the schedule is empty or some beta is outside `(0, 1]`.
    pub fn new(timestep_map: Vec<usize>, betas: Vec<f64>) -> Result<Self> {
        if timestep_map.is_empty() || timestep_map.len() != betas.len() {
            return Err(NnErr::InvalidSchedule {
                reason: format!(
                    "a schedule needs as many timesteps ({}) as betas ({})",
                    timestep_map.len(),
                    betas.len()
                ),
            });
        }
        if let Some(beta) = betas.iter().find(|&&b| !(b > 0. && b <= 1.)) {
            return Err(NnErr::InvalidSchedule {
                reason: format!("beta {beta} is outside (0, 1]"),
            });
        }

        Ok(Self {
            timestep_map,
            betas,
        })
    }

    /// Builds the linear schedule of `train_steps` steps respaced onto `sample_steps` steps.
    ///
    /// The betas grow linearly from `1e-4` to `2e-2`, both scaled by `1000 / train_steps`. The
    /// kept timesteps are evenly spread and rounded, and each respaced beta spans the whole
    /// interval since the previous kept timestep: `1 - ᾱ[t_i] / ᾱ[t_{i-1}]`.
    pub fn linear(train_steps: usize, sample_steps: usize) -> Self {
        let train_steps = train_steps.max(1);
        let sample_steps = sample_steps.clamp(1, train_steps);

        let scale = 1000. / train_steps as f64;
        let (start, end) = (1e-4 * scale, 2e-2 * scale);
        let span = (train_steps - 1).max(1) as f64;

        let mut alphas_cumprod = Vec::with_capacity(train_steps);
        let mut cumprod = 1.;
        for i in 0..train_steps {
            let beta = start + (end - start) * i as f64 / span;
            cumprod *= 1. - beta;
            alphas_cumprod.push(cumprod);
        }

        let stride = if sample_steps > 1 {
            (train_steps - 1) as f64 / (sample_steps - 1) as f64
        } else {
            0.
        };
        let timestep_map: Vec<usize> = (0..sample_steps)
            .map(|k| (k as f64 * stride).round() as usize)
            .collect();

        let mut last = 1.;
        let betas = timestep_map
            .iter()
            .map(|&t| {
                let beta = 1. - alphas_cumprod[t] / last;
                last = alphas_cumprod[t];
                beta
            })
            .collect();

        Self {
            timestep_map,
            betas,
        }
    }

    /// The 32 step schedule used by the solver.
    pub fn linear_32() -> Self {
        Self::linear(TRAIN_STEPS, 32)
    }

    /// The 128 step schedule.
    pub fn linear_128() -> Self {
        Self::linear(TRAIN_STEPS, 128)
    }

    pub fn len(&self) -> usize {
        self.betas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.betas.is_empty()
    }

    pub fn betas(&self) -> &[f64] {
        &self.betas
    }

    /// The training timestep of every sampling step.
    pub fn timestep_map(&self) -> &[usize] {
        &self.timestep_map
    }
}
