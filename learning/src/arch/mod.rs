//! A small keras-like network stack whose weights live in `Variable`s.

mod activation;
pub mod layers;
pub mod loss;
mod sequential;

use fed_core::{Tensor, Value};
use ndarray::{ArrayView2, Ix2};

use crate::{MlErr, Result};

pub use activation::ActFn;
pub use sequential::Sequential;

/// How a forward pass treats the running statistics of its layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Normalizes with the running statistics.
    Inference,
    /// Normalizes with the batch statistics and leaves the running ones as they are.
    Frozen,
    /// Normalizes with the batch statistics and folds them into the running ones.
    Training,
}

impl Mode {
    fn uses_batch_stats(self) -> bool {
        !matches!(self, Mode::Inference)
    }
}

/// Views a `float32` tensor as a matrix.
pub(crate) fn as_matrix<'a>(
    tensor: &'a Tensor,
    what: &'static str,
) -> Result<ArrayView2<'a, f32>> {
    let view = tensor.as_f32().ok_or(MlErr::TypeMismatch {
        what,
        expected: "float32 elements",
    })?;

    let ndim = view.ndim();
    view.into_dimensionality::<Ix2>()
        .map_err(|_| MlErr::SizeMismatch {
            what,
            got: ndim,
            expected: 2,
        })
}

/// Views a value holding a single `float32` tensor as a matrix.
pub(crate) fn value_as_matrix<'a>(
    value: &'a Value,
    what: &'static str,
) -> Result<ArrayView2<'a, f32>> {
    as_matrix(value.try_tensor(what)?, what)
}
