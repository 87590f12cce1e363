use std::sync::Arc;

use tensor::ndarray::ArrayD;

use crate::{pixels::RgbaSource, solve::Corners};

/// A unit of work for the computation context.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: u64,
    pub method: Method,
}

/// What a request asks the computation context to do.
///
/// Payloads are plain data so requests can cross the thread boundary.
#[derive(Debug, Clone)]
pub enum Method {
    /// Recovers the perspective of the rectangle with the given corners.
    Solve { corners: Corners },
    /// Predicts the aspect ratio of a `[1, 3, 64, 64]` preview.
    PredictStretch { image: ArrayD<f32> },
    /// Renders the flattened rectangle of `solution` out of `source` as PNG.
    ExportImage {
        solution: Vec<f32>,
        source: Arc<RgbaSource>,
        aspect_ratio: f32,
        side_length: u32,
    },
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Method::Solve { .. } => "solve",
            Method::PredictStretch { .. } => "predict_stretch",
            Method::ExportImage { .. } => "export_image",
        }
    }
}

/// Everything the computation context reports back, keyed by request id.
///
/// A request yields any number of `Status` events followed by exactly one `Data` or `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Status { id: u64, message: String },
    Data { id: u64, data: Response },
    Error { id: u64, message: String },
}

impl Event {
    pub fn id(&self) -> u64 {
        match self {
            Event::Status { id, .. } | Event::Data { id, .. } | Event::Error { id, .. } => *id,
        }
    }

    /// Whether this is the last event of its request.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Event::Status { .. })
    }
}

/// The successful outcome of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Solution {
        values: Vec<f32>,
        candidate: usize,
        initial_loss: f32,
        final_loss: f32,
    },
    Stretch(f32),
    Png(Vec<u8>),
}
