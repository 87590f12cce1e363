use std::thread::{self, JoinHandle};

use log::{debug, info, warn};
use machine_learning::diffusion::{GaussianDiffusion, Schedule, TRAIN_STEPS};
use rand::{SeedableRng, rngs::StdRng};
use solver::PerspectiveSolution;
use tensor::{Tensor, ndarray::ArrayD};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::{
    Result, WorkerErr,
    config::WorkerConfig,
    export::export_png,
    models::ModelCache,
    pixels::RgbaSource,
    protocol::{Event, Method, Request, Response},
    solve::{Corners, corners_tensor, sample_candidates, select_best},
};

/// Owns the networks, the sampler and the noise source, and runs requests one at a time.
#[derive(Debug)]
pub struct ComputeContext {
    config: WorkerConfig,
    models: ModelCache,
    diffusion: GaussianDiffusion,
    rng: StdRng,
}

impl ComputeContext {
    /// Creates a context with no model loaded yet.
    ///
    /// The sampler noise is seeded from the configuration when it carries a seed, and from the
    /// operating system otherwise.
    pub fn new(config: WorkerConfig) -> Self {
        let rng = match config.seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            models: ModelCache::new(&config),
            diffusion: GaussianDiffusion::new(Schedule::linear(
                TRAIN_STEPS,
                config.diffusion_steps(),
            )),
            config,
            rng,
        }
    }

    pub fn models(&self) -> &ModelCache {
        &self.models
    }

    /// Runs `request` to completion.
    ///
    /// # Arguments
    /// * `request` - The work to do.
    /// * `emit` - Receives the status events of the request and then its terminal event.
    pub fn handle<F>(&mut self, request: Request, mut emit: F)
    where
        F: FnMut(Event),
    {
        let Request { id, method } = request;
        info!(id = id; "handling {}", method.name());

        let mut status = |message: String| emit(Event::Status { id, message });
        let result = match method {
            Method::Solve { corners } => self.solve(&corners, &mut status),
            Method::PredictStretch { image } => self.predict_stretch(image, &mut status),
            Method::ExportImage {
                solution,
                source,
                aspect_ratio,
                side_length,
            } => Self::export_image(&solution, &source, aspect_ratio, side_length),
        };

        match result {
            Ok(data) => {
                info!(id = id; "request done");
                emit(Event::Data { id, data });
            }
            Err(e) => {
                warn!(id = id; "request failed: {e}");
                emit(Event::Error {
                    id,
                    message: e.to_string(),
                });
            }
        }
    }

    fn solve(&mut self, corners: &Corners, status: &mut dyn FnMut(String)) -> Result<Response> {
        let target = corners_tensor(corners)?;

        status("Loading diffusion model...".to_string());
        let model = self.models.diffusion()?;

        status("Sampling diffusion model...".to_string());
        let candidates = sample_candidates(
            model,
            &self.diffusion,
            &target,
            self.config.candidates(),
            &mut self.rng,
        )?;

        let solved = select_best(candidates, &target, &self.config, status)?;
        Ok(Response::Solution {
            values: solved.solution.to_flat_vec()?.to_vec(),
            candidate: solved.candidate,
            initial_loss: solved.initial_loss,
            final_loss: solved.final_loss,
        })
    }

    fn predict_stretch(
        &mut self,
        image: ArrayD<f32>,
        status: &mut dyn FnMut(String),
    ) -> Result<Response> {
        let image = Tensor::from(image);
        if image.ndim() != 4 || image.dims()[0] != 1 {
            return Err(WorkerErr::InvalidRequest {
                reason: format!("expected a single [1, 3, H, W] preview, got {}", image.shape()),
            });
        }

        status("Loading aspect ratio model...".to_string());
        let model = self.models.stretch()?;

        status("Predicting aspect ratio...".to_string());
        let ratios = model.predict(&image)?;
        debug!(buckets = model.ratios().len(); "predicted {ratios:?}");

        ratios
            .first()
            .copied()
            .map(Response::Stretch)
            .ok_or_else(|| WorkerErr::InvalidRequest {
                reason: "the aspect ratio model has no buckets".to_string(),
            })
    }

    fn export_image(
        solution: &[f32],
        source: &RgbaSource,
        aspect_ratio: f32,
        side_length: u32,
    ) -> Result<Response> {
        let solution = PerspectiveSolution::from_slice(solution)?;
        Ok(Response::Png(export_png(source, &solution, aspect_ratio, side_length)?))
    }

    /// Starts a context on a dedicated thread that serves requests until the request channel
    /// closes.
    ///
    /// The context is built on that thread, since the networks it caches are not `Send`.
    ///
    /// # Returns
    /// The request sender, the event receiver and the thread's handle.
    pub fn spawn(
        config: WorkerConfig,
    ) -> Result<(
        UnboundedSender<Request>,
        UnboundedReceiver<Event>,
        JoinHandle<()>,
    )> {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<Request>();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let handle = thread::Builder::new()
            .name("flatten-compute".to_string())
            .spawn(move || {
                let mut context = Self::new(config);
                while let Some(request) = request_rx.blocking_recv() {
                    context.handle(request, |event| {
                        if event_tx.send(event).is_err() {
                            debug!("event receiver dropped");
                        }
                    });
                }
                info!("request channel closed, stopping");
            })?;

        Ok((request_tx, event_rx, handle))
    }
}
