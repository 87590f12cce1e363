//! Fits a pinhole camera model of a planar rectangle to four observed corners.
//!
//! A [`PerspectiveSolution`] describes the rectangle and the camera; its projection error against
//! the observed corners is differentiated through the tensor graph and minimized with [`Adam`].

pub mod adam;
pub mod camera;
mod error;
pub mod rotation;
pub mod solution;

pub use adam::{Adam, DEFAULT_LEARNING_RATE};
pub use error::{Result, SolverErr};
pub use solution::{FLAT_LEN, Field, PerspectiveSolution, Projector, Refinement};
