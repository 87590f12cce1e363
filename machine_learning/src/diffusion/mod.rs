//! Deterministic DDIM sampling over a respaced linear noise schedule.

mod sampler;
mod schedule;

pub use sampler::GaussianDiffusion;
pub use schedule::{Schedule, TRAIN_STEPS};

use tensor::Tensor;

use crate::Result;

/// A network predicting the noise of a batch of diffused states.
pub trait Denoiser {
    /// Runs the network.
    ///
    /// # Arguments
    /// * `x` - The noisy states, `[B, D]`.
    /// * `t` - The training timestep of every state, `[B]`.
    /// * `cond` - The conditioning input, `[B, C]`.
    ///
    /// # Returns
    /// A `[B, 2 * D]` output whose first `D` columns are the predicted noise.
    fn denoise(&self, x: &Tensor, t: &Tensor, cond: &Tensor) -> Result<Tensor>;
}
