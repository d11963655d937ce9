//! Inference of distributed types from concrete values.

use crate::{Type, Value};

/// Infers the type of a nested structure of tensors.
///
/// Tensor leaves map to fully defined tensor types, structures keep their names and order.
pub fn type_from_tensors(value: &Value) -> Type {
    match value {
        Value::Tensor(t) => Type::Tensor(t.tensor_type()),
        Value::Struct(s) => Type::Struct(s.map(type_from_tensors)),
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn};

    use super::*;
    use crate::{DType, Struct, Tensor, TensorShape};

    #[test]
    fn infers_nested_types() {
        let value = Value::named([
            (
                "w",
                Value::from(Tensor::from(ArrayD::<f32>::zeros(IxDyn(&[2, 1])))),
            ),
            ("n", Value::unnamed([Value::from(Tensor::from(3i64))])),
        ]);

        let expected = Type::Struct(Struct::named([
            ("w", Type::tensor(DType::F32, [2, 1])),
            (
                "n",
                Type::Struct(Struct::unnamed([Type::tensor(
                    DType::I64,
                    TensorShape::scalar(),
                )])),
            ),
        ]));

        assert_eq!(type_from_tensors(&value), expected);
    }
}
