use std::{fmt, sync::Arc};

use fed_core::{DType, Tensor, TensorType};
use ndarray::{ArrayViewD, ArrayViewMutD};
use parking_lot::RwLock;

use crate::{MlErr, Result, graph};

struct Inner {
    name: String,
    value: RwLock<Tensor>,
}

/// A shared handle over a mutable tensor.
///
/// Clones alias the same storage. The dtype and shape are fixed at creation, every write
/// is checked against them.
#[derive(Clone)]
pub struct Variable {
    inner: Arc<Inner>,
}

impl Variable {
    /// Creates a new `Variable` and registers it with the active construction graph.
    ///
    /// # Arguments
    /// * `name` - A human readable name.
    /// * `initial` - The initial value, it fixes the dtype and shape.
    ///
    /// # Returns
    /// A new `Variable` instance.
    pub fn new(name: impl Into<String>, initial: Tensor) -> Self {
        let var = Self {
            inner: Arc::new(Inner {
                name: name.into(),
                value: RwLock::new(initial),
            }),
        };

        graph::register(&var);
        var
    }

    /// Creates a zero-initialized `Variable`.
    pub fn zeros(name: impl Into<String>, dtype: DType, shape: &[usize]) -> Self {
        Self::new(name, Tensor::zeros(dtype, shape))
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn dtype(&self) -> DType {
        self.inner.value.read().dtype()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.inner.value.read().shape().to_vec()
    }

    pub fn tensor_type(&self) -> TensorType {
        self.inner.value.read().tensor_type()
    }

    /// Returns a copy of the current value.
    pub fn read(&self) -> Tensor {
        self.inner.value.read().clone()
    }

    /// Runs `f` over the current value without copying it.
    pub fn with_value<R>(&self, f: impl FnOnce(&Tensor) -> R) -> R {
        f(&self.inner.value.read())
    }

    /// Overwrites the value.
    ///
    /// # Errors
    /// Returns `MlErr` if `value` has another dtype or shape.
    pub fn assign(&self, value: &Tensor) -> Result<()> {
        self.inner.value.write().assign(value)?;
        Ok(())
    }

    /// Adds `value` onto the current value.
    ///
    /// # Errors
    /// Returns `MlErr` if `value` has another dtype or shape.
    pub fn assign_add(&self, value: &Tensor) -> Result<()> {
        self.inner.value.write().add_assign(value)?;
        Ok(())
    }

    /// Fills the value with zeros.
    pub fn reset(&self) {
        let mut value = self.inner.value.write();
        *value = Tensor::zeros(value.dtype(), value.shape());
    }

    /// Runs `f` over a read-only `f32` view of the value.
    ///
    /// # Errors
    /// Returns `MlErr::TypeMismatch` if the variable does not hold `f32` elements.
    pub fn read_f32<R>(&self, f: impl FnOnce(ArrayViewD<'_, f32>) -> R) -> Result<R> {
        let value = self.inner.value.read();
        let view = value.as_f32().ok_or(MlErr::TypeMismatch {
            what: "variable",
            expected: "float32 elements",
        })?;

        Ok(f(view))
    }

    /// Runs `f` over a mutable `f32` view of the value, the shape cannot change.
    ///
    /// # Errors
    /// Returns `MlErr::TypeMismatch` if the variable does not hold `f32` elements.
    pub fn update_f32<R>(&self, f: impl FnOnce(ArrayViewMutD<'_, f32>) -> R) -> Result<R> {
        let mut value = self.inner.value.write();
        let array = value.as_f32_mut().ok_or(MlErr::TypeMismatch {
            what: "variable",
            expected: "float32 elements",
        })?;

        Ok(f(array.view_mut()))
    }

    /// Whether both handles alias the same storage.
    pub fn ptr_eq(&self, other: &Variable) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("name", &self.inner.name)
            .field("type", &self.tensor_type().to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_alias_storage() {
        let a = Variable::zeros("a", DType::F32, &[2]);
        let b = a.clone();
        b.update_f32(|mut v| v.fill(3.0)).unwrap();

        assert!(a.ptr_eq(&b));
        assert_eq!(a.read_f32(|v| v.sum()).unwrap(), 6.0);
    }

    #[test]
    fn assign_keeps_shape_fixed() {
        let v = Variable::zeros("v", DType::F32, &[2]);
        assert!(v.assign(&Tensor::zeros(DType::F32, &[3])).is_err());
        assert!(v.assign(&Tensor::zeros(DType::I32, &[2])).is_err());
        assert_eq!(v.shape(), vec![2]);
    }

    #[test]
    fn typed_access_checks_dtype() {
        let v = Variable::new("n", Tensor::from(1i64));
        assert_eq!(
            v.read_f32(|_| ()),
            Err(MlErr::TypeMismatch {
                what: "variable",
                expected: "float32 elements",
            })
        );
    }

    #[test]
    fn reset_zeroes_value() {
        let v = Variable::new("n", Tensor::from(5i64));
        v.assign_add(&Tensor::from(2i64)).unwrap();
        assert_eq!(v.read(), Tensor::from(7i64));

        v.reset();
        assert_eq!(v.read(), Tensor::from(0i64));
    }
}
