use std::{sync::Arc, thread::JoinHandle};

use log::{debug, warn};
use solver::PerspectiveSolution;
use tensor::Tensor;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::{
    Result, WorkerErr,
    config::WorkerConfig,
    context::ComputeContext,
    pixels::RgbaSource,
    protocol::{Event, Method, Request, Response},
    solve::{Corners, Solved},
};

/// The caller's side of the computation context.
///
/// Requests are numbered in increasing order and awaited one at a time; events that belong to
/// any other request are dropped.
#[derive(Debug)]
pub struct ModelClient {
    requests: UnboundedSender<Request>,
    events: UnboundedReceiver<Event>,
    next_id: u64,
    handle: JoinHandle<()>,
}

impl ModelClient {
    /// Starts a computation context configured by `config` on its own thread.
    pub fn spawn(config: WorkerConfig) -> Result<Self> {
        let (requests, events, handle) = ComputeContext::spawn(config)?;

        Ok(Self {
            requests,
            events,
            next_id: 0,
            handle,
        })
    }

    /// Recovers the perspective of the rectangle whose consecutive corners are `corners`.
    ///
    /// # Arguments
    /// * `corners` - Four points in `[0, 1]²`.
    /// * `status` - Receives every progress message of the solve.
    ///
    /// # Returns
    /// The best refined candidate.
    pub async fn solve<F>(&mut self, corners: Corners, status: F) -> Result<Solved>
    where
        F: FnMut(&str),
    {
        let (id, response) = self.call(Method::Solve { corners }, status).await?;
        match response {
            Response::Solution {
                values,
                candidate,
                initial_loss,
                final_loss,
            } => Ok(Solved {
                solution: PerspectiveSolution::from_slice(&values)?,
                candidate,
                initial_loss,
                final_loss,
            }),
            other => Err(unexpected(id, &other)),
        }
    }

    /// Predicts the aspect ratio, height over width, of a `[1, 3, 64, 64]` preview.
    pub async fn predict_stretch<F>(&mut self, preview: &Tensor, status: F) -> Result<f32>
    where
        F: FnMut(&str),
    {
        let image = preview.view().to_owned();
        let (id, response) = self.call(Method::PredictStretch { image }, status).await?;
        match response {
            Response::Stretch(ratio) => Ok(ratio),
            other => Err(unexpected(id, &other)),
        }
    }

    /// Renders the flattened rectangle as a PNG whose longest side is `side_length`.
    pub async fn export_image<F>(
        &mut self,
        solution: &PerspectiveSolution,
        source: Arc<RgbaSource>,
        aspect_ratio: f32,
        side_length: u32,
        status: F,
    ) -> Result<Vec<u8>>
    where
        F: FnMut(&str),
    {
        let method = Method::ExportImage {
            solution: solution.to_flat_vec()?.to_vec(),
            source,
            aspect_ratio,
            side_length,
        };

        let (id, response) = self.call(method, status).await?;
        match response {
            Response::Png(bytes) => Ok(bytes),
            other => Err(unexpected(id, &other)),
        }
    }

    /// Closes the request channel and waits for the computation thread to finish.
    pub fn shutdown(self) -> Result<()> {
        let Self {
            requests, handle, ..
        } = self;
        drop(requests);

        handle.join().map_err(|_| WorkerErr::Disconnected)
    }

    async fn call<F>(&mut self, method: Method, mut status: F) -> Result<(u64, Response)>
    where
        F: FnMut(&str),
    {
        let id = self.next_id;
        self.next_id += 1;

        debug!(id = id; "sending {}", method.name());
        self.requests
            .send(Request { id, method })
            .map_err(|_| WorkerErr::Disconnected)?;

        loop {
            let event = self.events.recv().await.ok_or(WorkerErr::Disconnected)?;
            if event.id() != id {
                warn!(id = event.id(), current = id; "dropping event of another request");
                continue;
            }

            match event {
                Event::Status { message, .. } => status(&message),
                Event::Data { data, .. } => return Ok((id, data)),
                Event::Error { message, .. } => return Err(WorkerErr::Remote { id, message }),
            }
        }
    }
}

fn unexpected(id: u64, response: &Response) -> WorkerErr {
    let got = match response {
        Response::Solution { .. } => "solution",
        Response::Stretch(_) => "stretch",
        Response::Png(_) => "png",
    };
    WorkerErr::UnexpectedResponse { id, got }
}
