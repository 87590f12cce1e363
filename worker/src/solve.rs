use log::{debug, info, warn};
use machine_learning::diffusion::{Denoiser, GaussianDiffusion};
use rand::Rng;
use solver::{FLAT_LEN, PerspectiveSolution, SolverErr};
use tensor::Tensor;

use crate::{Result, WorkerErr, config::WorkerConfig};

/// Four consecutive corners of the observed rectangle, normalized to `[0, 1]`.
pub type Corners = [[f32; 2]; 4];

/// The winning candidate of a solve.
#[derive(Clone, Debug)]
pub struct Solved {
    pub solution: PerspectiveSolution,
    pub candidate: usize,
    pub initial_loss: f32,
    pub final_loss: f32,
}

/// Converts the corners into the `[4, 2]` tensor the solver fits.
///
/// # Returns
/// An error if some coordinate is not finite.
pub fn corners_tensor(corners: &Corners) -> Result<Tensor> {
    if corners.iter().flatten().any(|c| !c.is_finite()) {
        return Err(WorkerErr::InvalidRequest {
            reason: format!("corners must be finite, got {corners:?}"),
        });
    }

    let values = corners.iter().flatten().copied().collect();
    Ok(Tensor::from_vec(values, &[4, 2])?)
}

/// Draws `count` candidate solutions from the diffusion model, conditioned on `corners`.
pub fn sample_candidates<M, R>(
    model: &M,
    diffusion: &GaussianDiffusion,
    corners: &Tensor,
    count: usize,
    rng: &mut R,
) -> Result<Vec<PerspectiveSolution>>
where
    M: Denoiser + ?Sized,
    R: Rng + ?Sized,
{
    let noise = Tensor::randn(&[count, FLAT_LEN], rng);
    let cond = corners.reshape(&[1, 8])?.repeat(0, count)?;
    let samples = diffusion.ddim_sample(model, &noise, &cond)?;

    (0..count)
        .map(|i| {
            let row = samples.slice(0, i, i + 1)?.reshape(&[FLAT_LEN])?;
            Ok(PerspectiveSolution::from_flat_vec(&row)?)
        })
        .collect()
}

/// Refines every candidate in turn and keeps the one with the lowest final loss.
///
/// Ties keep the earliest candidate. A candidate whose refinement degenerates numerically is
/// discarded; any other failure ends the solve.
///
/// # Arguments
/// * `candidates` - The initial solutions.
/// * `corners` - The observed corners, `[4, 2]`.
/// * `config` - The refinement budget and optimizer hyperparameters.
/// * `status` - Receives a progress message before every refinement.
///
/// # Returns
/// The best refined candidate, or `AllCandidatesDegenerate` if none survived.
pub fn select_best<F>(
    candidates: Vec<PerspectiveSolution>,
    corners: &Tensor,
    config: &WorkerConfig,
    mut status: F,
) -> Result<Solved>
where
    F: FnMut(String),
{
    let total = candidates.len();
    let mut best: Option<Solved> = None;

    for (i, candidate) in candidates.into_iter().enumerate() {
        status(format!("Refining solution {}/{total}...", i + 1));

        let mut optimizer = config.optimizer()?;
        let refined = match candidate.iterate(corners, config.iterations(), &mut optimizer) {
            Ok(refined) => refined,
            Err(SolverErr::NumericDegeneracy { reason }) => {
                warn!(candidate = i; "discarding candidate: {reason}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        debug!(
            candidate = i,
            initial_loss = refined.initial_loss,
            final_loss = refined.final_loss;
            "refined candidate"
        );

        if best.as_ref().is_none_or(|b| refined.final_loss < b.final_loss) {
            best = Some(Solved {
                solution: refined.solution,
                candidate: i,
                initial_loss: refined.initial_loss,
                final_loss: refined.final_loss,
            });
        }
    }

    let best = best.ok_or(WorkerErr::AllCandidatesDegenerate { candidates: total })?;
    info!(candidate = best.candidate, final_loss = best.final_loss; "selected candidate");
    Ok(best)
}
