use std::{
    error::Error,
    fmt::{self, Display},
};

use crate::DType;

/// The result type used across the core value and type modules.
pub type Result<T> = std::result::Result<T, CoreErr>;

/// Failures produced while validating tensors, values and types.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreErr {
    DTypeMismatch {
        what: &'static str,
        got: DType,
        expected: DType,
    },
    ShapeMismatch {
        what: &'static str,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    NotAStruct {
        what: &'static str,
    },
    NotATensor {
        what: &'static str,
    },
    StructureMismatch {
        what: &'static str,
    },
    MissingField {
        name: String,
    },
    Unsupported {
        op: &'static str,
        dtype: DType,
    },
}

impl Display for CoreErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreErr::DTypeMismatch {
                what,
                got,
                expected,
            } => write!(f, "dtype mismatch for {what}: got {got}, expected {expected}"),
            CoreErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "shape mismatch for {what}: got {got:?}, expected {expected:?}"
            ),
            CoreErr::NotAStruct { what } => write!(f, "expected a structure for {what}"),
            CoreErr::NotATensor { what } => write!(f, "expected a tensor for {what}"),
            CoreErr::StructureMismatch { what } => {
                write!(f, "structures differ in names or length for {what}")
            }
            CoreErr::MissingField { name } => write!(f, "the structure has no field `{name}`"),
            CoreErr::Unsupported { op, dtype } => {
                write!(f, "operation `{op}` is not supported for {dtype} tensors")
            }
        }
    }
}

impl Error for CoreErr {}
