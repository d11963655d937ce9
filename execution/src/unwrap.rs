use fed_core::{Struct, Tensor, Value};

/// A computation result converted to plain host values.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    F32(f32),
    F64(f64),
    I32(i32),
    I64(i64),
    /// A tensor of rank one or more.
    Array(Tensor),
    /// An unnamed structure.
    List(Vec<HostValue>),
    /// A structure with at least one named element, names are kept.
    Struct(Struct<HostValue>),
}

impl HostValue {
    /// Returns the value as `f64` if it is a scalar.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            HostValue::F32(v) => Some(v as f64),
            HostValue::F64(v) => Some(v),
            HostValue::I32(v) => Some(v as f64),
            HostValue::I64(v) => Some(v as f64),
            _ => None,
        }
    }
}

/// Converts a computation result into host values.
///
/// Rank zero tensors become scalars of the matching kind, other tensors are kept as arrays.
/// Unnamed structures become lists, structures with names keep them.
///
/// # Arguments
/// * `value` - The value to convert.
///
/// # Returns
/// The converted `HostValue`.
pub fn unwrap(value: Value) -> HostValue {
    match value {
        Value::Tensor(tensor) => unwrap_tensor(tensor),
        Value::Struct(s) if s.has_names() => HostValue::Struct(Struct::new(
            s.into_elements()
                .into_iter()
                .map(|(name, v)| (name, unwrap(v))),
        )),
        Value::Struct(s) => HostValue::List(s.into_values().into_iter().map(unwrap).collect()),
    }
}

fn unwrap_tensor(tensor: Tensor) -> HostValue {
    if !tensor.shape().is_empty() {
        return HostValue::Array(tensor);
    }

    let scalar = match &tensor {
        Tensor::F32(a) => a.first().copied().map(HostValue::F32),
        Tensor::F64(a) => a.first().copied().map(HostValue::F64),
        Tensor::I32(a) => a.first().copied().map(HostValue::I32),
        Tensor::I64(a) => a.first().copied().map(HostValue::I64),
    };

    scalar.unwrap_or(HostValue::Array(tensor))
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn scalars_keep_their_kind() {
        assert_eq!(unwrap(Value::from(Tensor::from(1.5f32))), HostValue::F32(1.5));
        assert_eq!(unwrap(Value::from(Tensor::from(2.5f64))), HostValue::F64(2.5));
        assert_eq!(unwrap(Value::from(Tensor::from(3i32))), HostValue::I32(3));
        assert_eq!(unwrap(Value::from(Tensor::from(4i64))), HostValue::I64(4));
    }

    #[test]
    fn arrays_stay_arrays() {
        let tensor = Tensor::from(array![1.0f32].into_dyn());
        assert_eq!(unwrap(Value::from(tensor.clone())), HostValue::Array(tensor));
    }

    #[test]
    fn named_structures_keep_names() {
        let value = Value::named([("a", Value::from(Tensor::from(1i32)))]);
        let HostValue::Struct(s) = unwrap(value) else {
            panic!("expected a structure");
        };
        assert_eq!(s.get("a"), Some(&HostValue::I32(1)));
    }
}
