mod dtype;
pub mod error;
mod structure;
mod tensor;
pub mod type_analysis;
pub mod type_conversions;
mod types;
mod value;

pub use dtype::DType;
pub use error::{CoreErr, Result};
pub use structure::Struct;
pub use tensor::Tensor;
pub use type_analysis::{TensorCount, count_tensors_in_type};
pub use type_conversions::type_from_tensors;
pub use types::{Placement, StructType, TensorShape, TensorType, Type};
pub use value::Value;
