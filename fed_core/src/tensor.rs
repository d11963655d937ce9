use ndarray::{ArrayD, ArrayViewD, IxDyn, arr0};

use crate::{CoreErr, DType, Result, TensorShape, TensorType};

/// An owned n-dimensional array of a single element type.
#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
}

macro_rules! dispatch {
    ($self:expr, $arr:ident => $body:expr) => {
        match $self {
            Tensor::F32($arr) => $body,
            Tensor::F64($arr) => $body,
            Tensor::I32($arr) => $body,
            Tensor::I64($arr) => $body,
        }
    };
}

macro_rules! impl_typed {
    ($variant:ident, $ty:ty, $view:ident, $view_mut:ident) => {
        impl From<ArrayD<$ty>> for Tensor {
            fn from(value: ArrayD<$ty>) -> Self {
                Tensor::$variant(value)
            }
        }

        impl From<$ty> for Tensor {
            fn from(value: $ty) -> Self {
                Tensor::$variant(arr0(value).into_dyn())
            }
        }

        impl Tensor {
            /// Returns a view of the elements if this tensor holds that element type.
            pub fn $view(&self) -> Option<ArrayViewD<'_, $ty>> {
                match self {
                    Tensor::$variant(a) => Some(a.view()),
                    _ => None,
                }
            }

            /// Returns the inner array mutably if this tensor holds that element type.
            pub fn $view_mut(&mut self) -> Option<&mut ArrayD<$ty>> {
                match self {
                    Tensor::$variant(a) => Some(a),
                    _ => None,
                }
            }
        }
    };
}

impl_typed!(F32, f32, as_f32, as_f32_mut);
impl_typed!(F64, f64, as_f64, as_f64_mut);
impl_typed!(I32, i32, as_i32, as_i32_mut);
impl_typed!(I64, i64, as_i64, as_i64_mut);

impl Tensor {
    /// Creates a zero-filled tensor.
    ///
    /// # Arguments
    /// * `dtype` - The element type.
    /// * `shape` - The concrete shape.
    ///
    /// # Returns
    /// A new `Tensor` instance.
    pub fn zeros(dtype: DType, shape: &[usize]) -> Self {
        let dim = IxDyn(shape);

        match dtype {
            DType::F32 => Tensor::F32(ArrayD::zeros(dim)),
            DType::F64 => Tensor::F64(ArrayD::zeros(dim)),
            DType::I32 => Tensor::I32(ArrayD::zeros(dim)),
            DType::I64 => Tensor::I64(ArrayD::zeros(dim)),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Tensor::F32(_) => DType::F32,
            Tensor::F64(_) => DType::F64,
            Tensor::I32(_) => DType::I32,
            Tensor::I64(_) => DType::I64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        dispatch!(self, a => a.shape())
    }

    /// Returns the amount of elements in the tensor.
    pub fn len(&self) -> usize {
        dispatch!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the fully defined type of this tensor.
    pub fn tensor_type(&self) -> TensorType {
        TensorType::new(self.dtype(), TensorShape::from(self.shape()))
    }

    /// Returns the only element of a single element tensor widened to `f64`.
    pub fn scalar_f64(&self) -> Option<f64> {
        if self.len() != 1 {
            return None;
        }

        match self {
            Tensor::F32(a) => a.first().map(|&v| v as f64),
            Tensor::F64(a) => a.first().copied(),
            Tensor::I32(a) => a.first().map(|&v| v as f64),
            Tensor::I64(a) => a.first().map(|&v| v as f64),
        }
    }

    /// Overwrites the elements of this tensor with the ones of `other`.
    ///
    /// # Errors
    /// Returns `CoreErr` if the element types or the shapes differ.
    pub fn assign(&mut self, other: &Tensor) -> Result<()> {
        self.check_shape("assign", other)?;

        match (self, other) {
            (Tensor::F32(a), Tensor::F32(b)) => a.assign(b),
            (Tensor::F64(a), Tensor::F64(b)) => a.assign(b),
            (Tensor::I32(a), Tensor::I32(b)) => a.assign(b),
            (Tensor::I64(a), Tensor::I64(b)) => a.assign(b),
            (a, b) => {
                return Err(CoreErr::DTypeMismatch {
                    what: "assign",
                    got: b.dtype(),
                    expected: a.dtype(),
                });
            }
        }

        Ok(())
    }

    /// Adds `other` onto this tensor element-wise.
    ///
    /// # Errors
    /// Returns `CoreErr` if the element types or the shapes differ.
    pub fn add_assign(&mut self, other: &Tensor) -> Result<()> {
        self.check_shape("add", other)?;

        match (self, other) {
            (Tensor::F32(a), Tensor::F32(b)) => *a += b,
            (Tensor::F64(a), Tensor::F64(b)) => *a += b,
            (Tensor::I32(a), Tensor::I32(b)) => *a += b,
            (Tensor::I64(a), Tensor::I64(b)) => *a += b,
            (a, b) => {
                return Err(CoreErr::DTypeMismatch {
                    what: "add",
                    got: b.dtype(),
                    expected: a.dtype(),
                });
            }
        }

        Ok(())
    }

    /// Multiplies every element by `factor`. Only defined for floating point tensors.
    pub fn scale(&mut self, factor: f64) -> Result<()> {
        match self {
            Tensor::F32(a) => a.mapv_inplace(|v| v * factor as f32),
            Tensor::F64(a) => a.mapv_inplace(|v| v * factor),
            other => {
                return Err(CoreErr::Unsupported {
                    op: "scale",
                    dtype: other.dtype(),
                });
            }
        }

        Ok(())
    }

    fn check_shape(&self, what: &'static str, other: &Tensor) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(CoreErr::ShapeMismatch {
                what,
                got: other.shape().to_vec(),
                expected: self.shape().to_vec(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn};

    use super::*;

    #[test]
    fn zeros_has_requested_type() {
        let t = Tensor::zeros(DType::I64, &[2, 3]);
        assert_eq!(t.dtype(), DType::I64);
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.len(), 6);
    }

    #[test]
    fn assign_copies_elements() {
        let mut a = Tensor::zeros(DType::F32, &[2]);
        let b = Tensor::from(ArrayD::from_shape_vec(IxDyn(&[2]), vec![1.0f32, 2.0]).unwrap());
        a.assign(&b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn assign_rejects_other_dtype() {
        let mut a = Tensor::zeros(DType::F32, &[2]);
        let b = Tensor::zeros(DType::I32, &[2]);
        let err = a.assign(&b).unwrap_err();
        assert!(matches!(err, CoreErr::DTypeMismatch { .. }));
    }

    #[test]
    fn assign_rejects_other_shape() {
        let mut a = Tensor::zeros(DType::F32, &[2]);
        let b = Tensor::zeros(DType::F32, &[3]);
        let err = a.assign(&b).unwrap_err();
        assert_eq!(
            err,
            CoreErr::ShapeMismatch {
                what: "assign",
                got: vec![3],
                expected: vec![2],
            }
        );
    }

    #[test]
    fn add_then_scale() {
        let mut a = Tensor::from(2.0f32);
        a.add_assign(&Tensor::from(4.0f32)).unwrap();
        a.scale(0.5).unwrap();
        assert_eq!(a.scalar_f64(), Some(3.0));
    }

    #[test]
    fn scale_is_float_only() {
        let mut a = Tensor::from(2i32);
        assert!(matches!(
            a.scale(2.0),
            Err(CoreErr::Unsupported { op: "scale", .. })
        ));
    }
}
