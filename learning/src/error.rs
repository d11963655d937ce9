use std::{
    error::Error,
    fmt::{self, Display},
};

use fed_core::{CoreErr, TensorType, Type};

/// The result type used in the entire learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The learning module's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum MlErr {
    Core(CoreErr),
    TypeMismatch {
        what: &'static str,
        expected: &'static str,
    },
    MissingField {
        name: String,
    },
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    WeightsStructureMismatch {
        what: &'static str,
        idx: usize,
        got: TensorType,
        expected: TensorType,
    },
    InvalidInputSpec(&'static str),
    BatchMismatch {
        slot: &'static str,
        got: Type,
        expected: Type,
    },
    MetricKeysMismatch {
        reported: Vec<String>,
        finalizers: Vec<String>,
    },
    Aggregation(String),
    ModelConstruction(String),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::Core(e) => write!(f, "{e}"),
            MlErr::TypeMismatch { what, expected } => {
                write!(f, "type mismatch for {what}: expected {expected}")
            }
            MlErr::MissingField { name } => write!(f, "missing field `{name}`"),
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "size mismatch for {what}: got {got}, expected {expected}"
            ),
            MlErr::WeightsStructureMismatch {
                what,
                idx,
                got,
                expected,
            } => write!(
                f,
                "{what} weight {idx} has type {got} but the target variable is {expected}"
            ),
            MlErr::InvalidInputSpec(msg) => write!(f, "invalid input spec: {msg}"),
            MlErr::BatchMismatch {
                slot,
                got,
                expected,
            } => write!(
                f,
                "batch slot `{slot}` has type {got}, not compatible with {expected}"
            ),
            MlErr::MetricKeysMismatch {
                reported,
                finalizers,
            } => write!(
                f,
                "metric names {reported:?} differ from finalizer names {finalizers:?}"
            ),
            MlErr::Aggregation(msg) => write!(f, "aggregation failed: {msg}"),
            MlErr::ModelConstruction(msg) => write!(f, "failed to construct model: {msg}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Core(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CoreErr> for MlErr {
    fn from(value: CoreErr) -> Self {
        Self::Core(value)
    }
}
