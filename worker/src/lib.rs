//! The computation context of the flattening engine and its message-passing client.
//!
//! All numeric work (diffusion sampling, candidate refinement, aspect-ratio prediction and
//! export rendering) runs on one dedicated thread owned by a [`context::ComputeContext`]. Callers
//! talk to it through a [`ModelClient`], which numbers requests and forwards their progress.

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod export;
pub mod models;
pub mod pixels;
pub mod protocol;
pub mod solve;

pub use client::ModelClient;
pub use config::WorkerConfig;
pub use error::{Result, WorkerErr};
