use log::debug;
use tensor::Tensor;

use super::{Denoiser, Schedule};
use crate::{NnErr, Result};

/// The precomputed tables of a [`Schedule`] used by the DDIM reverse process.
#[derive(Clone, Debug)]
pub struct GaussianDiffusion {
    schedule: Schedule,
    alphas_cumprod: Vec<f64>,
    alphas_cumprod_prev: Vec<f64>,
    sqrt_recip_alphas_cumprod: Vec<f64>,
    sqrt_recipm1_alphas_cumprod: Vec<f64>,
}

impl GaussianDiffusion {
    /// Creates a new `GaussianDiffusion` over `schedule`.
    pub fn new(schedule: Schedule) -> Self {
        let steps = schedule.len();
        let mut alphas_cumprod = Vec::with_capacity(steps);
        let mut alphas_cumprod_prev = Vec::with_capacity(steps);
        let mut sqrt_recip_alphas_cumprod = Vec::with_capacity(steps);
        let mut sqrt_recipm1_alphas_cumprod = Vec::with_capacity(steps);

        let mut cumprod = 1.;
        for beta in schedule.betas() {
            alphas_cumprod_prev.push(cumprod);
            cumprod *= 1. - beta;
            alphas_cumprod.push(cumprod);
            sqrt_recip_alphas_cumprod.push((1. / cumprod).sqrt());
            sqrt_recipm1_alphas_cumprod.push((1. / cumprod - 1.).sqrt());
        }

        Self {
            schedule,
            alphas_cumprod,
            alphas_cumprod_prev,
            sqrt_recip_alphas_cumprod,
            sqrt_recipm1_alphas_cumprod,
        }
    }

    pub fn linear_32() -> Self {
        Self::new(Schedule::linear_32())
    }

    pub fn linear_128() -> Self {
        Self::new(Schedule::linear_128())
    }

    /// The amount of denoising steps of a full sample.
    pub fn num_steps(&self) -> usize {
        self.alphas_cumprod.len()
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn alphas_cumprod(&self) -> &[f64] {
        &self.alphas_cumprod
    }

    pub fn alphas_cumprod_prev(&self) -> &[f64] {
        &self.alphas_cumprod_prev
    }

    /// Takes one deterministic DDIM step from sampling step `t` to `t - 1`.
    ///
    /// # Arguments
    /// * `model` - The noise predictor.
    /// * `x` - The current states, `[B, D]`.
    /// * `t` - The sampling step, an index into the schedule.
    /// * `cond` - The conditioning input, `[B, C]`.
    ///
    /// # Returns
    /// The states at the previous step, `[B, D]`.
    pub fn ddim_step<M>(&self, model: &M, x: &Tensor, t: usize, cond: &Tensor) -> Result<Tensor>
    where
        M: Denoiser + ?Sized,
    {
        let steps = self.num_steps();
        let (Some(&timestep), Some(&alpha_bar_prev)) = (
            self.schedule.timestep_map().get(t),
            self.alphas_cumprod_prev.get(t),
        ) else {
            return Err(NnErr::TimestepOutOfRange { t, steps });
        };

        let batch = x.dims().first().copied().unwrap_or(0);
        let ts = Tensor::from_vec(vec![timestep as f32], &[1])?.repeat(0, batch)?;

        let out = model.denoise(x, &ts, cond)?;
        let width = out.dims().get(1).copied().unwrap_or(0);
        let eps = out.slice(1, 0, width / 2)?;

        let pred_x0 = x
            .scale(self.sqrt_recip_alphas_cumprod[t] as f32)
            .sub(&eps.scale(self.sqrt_recipm1_alphas_cumprod[t] as f32))?;

        Ok(pred_x0
            .scale(alpha_bar_prev.sqrt() as f32)
            .add(&eps.scale((1. - alpha_bar_prev).sqrt() as f32))?)
    }

    /// Runs the full reverse process from `noise`, from the last sampling step down to zero.
    ///
    /// No gradient flows through the loop: the inputs are detached first.
    pub fn ddim_sample<M>(&self, model: &M, noise: &Tensor, cond: &Tensor) -> Result<Tensor>
    where
        M: Denoiser + ?Sized,
    {
        let cond = cond.detach();
        let mut x = noise.detach();

        for t in (0..self.num_steps()).rev() {
            x = self.ddim_step(model, &x, t, &cond)?.detach();
        }

        debug!(steps = self.num_steps(), batch = x.dims().first().copied().unwrap_or(0); "sampled");
        Ok(x)
    }
}
