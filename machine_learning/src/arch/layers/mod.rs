mod conv2d;
mod layer;
mod linear;

pub use conv2d::Conv2d;
pub use layer::Layer;
pub use linear::Linear;
