pub mod arch;
pub mod diffusion;
pub mod error;
pub mod params;
mod testing;

pub use error::{NnErr, Result};
pub use params::ParamDict;
