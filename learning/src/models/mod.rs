//! Ready made `Model` implementations.

mod keras;
mod linear_regression;

pub use keras::{KerasModel, from_keras_model};
pub use linear_regression::LinearRegression;
