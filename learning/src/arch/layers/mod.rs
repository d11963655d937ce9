mod dense;
mod layer;
mod normalization;

pub use dense::Dense;
pub use layer::Layer;
pub use normalization::Normalization;
