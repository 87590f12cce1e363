mod denoiser;
pub mod layers;
mod sequential;
mod stretch;

pub use denoiser::{DEFAULT_NUM_FEATS, DiffusionModel, frequency_pos_embedding, timestep_embedding};
pub use sequential::Sequential;
pub use stretch::StretchModel;
