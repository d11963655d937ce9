use crate::{CoreErr, Result, Struct, Tensor};

/// A nested structure of tensors.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Tensor(Tensor),
    Struct(Struct<Value>),
}

impl Value {
    /// Builds a struct value whose elements are all named.
    pub fn named<I, S>(elements: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Value::Struct(Struct::named(elements))
    }

    /// Builds a struct value whose elements are unnamed.
    pub fn unnamed<I>(elements: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Value::Struct(Struct::unnamed(elements))
    }

    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Value::Tensor(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Struct<Value>> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the inner tensor or a `NotATensor` error mentioning `what`.
    pub fn try_tensor(&self, what: &'static str) -> Result<&Tensor> {
        self.as_tensor().ok_or(CoreErr::NotATensor { what })
    }

    /// Returns the inner structure or a `NotAStruct` error mentioning `what`.
    pub fn try_struct(&self, what: &'static str) -> Result<&Struct<Value>> {
        self.as_struct().ok_or(CoreErr::NotAStruct { what })
    }

    /// Looks up a named field of a struct value.
    pub fn field(&self, name: &str) -> Result<&Value> {
        self.try_struct("field access")?
            .get(name)
            .ok_or_else(|| CoreErr::MissingField {
                name: name.to_string(),
            })
    }

    /// Iterates every tensor leaf in depth-first order.
    pub fn leaves(&self) -> Vec<&Tensor> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Tensor>) {
        match self {
            Value::Tensor(t) => out.push(t),
            Value::Struct(s) => s.values().for_each(|v| v.collect_leaves(out)),
        }
    }

    /// Adds `other` onto this value leaf by leaf, both must share the same structure.
    pub fn add_assign(&mut self, other: &Value) -> Result<()> {
        match (self, other) {
            (Value::Tensor(a), Value::Tensor(b)) => a.add_assign(b),
            (Value::Struct(a), Value::Struct(b)) => {
                if !a.same_names(b) {
                    return Err(CoreErr::StructureMismatch { what: "add" });
                }

                a.values_mut()
                    .zip(b.values())
                    .try_for_each(|(a, b)| a.add_assign(b))
            }
            (Value::Tensor(_), Value::Struct(_)) => Err(CoreErr::NotATensor { what: "add" }),
            (Value::Struct(_), Value::Tensor(_)) => Err(CoreErr::NotAStruct { what: "add" }),
        }
    }

    /// Multiplies every leaf by `factor`.
    pub fn scale(&mut self, factor: f64) -> Result<()> {
        match self {
            Value::Tensor(t) => t.scale(factor),
            Value::Struct(s) => s.values_mut().try_for_each(|v| v.scale(factor)),
        }
    }
}

impl From<Tensor> for Value {
    fn from(value: Tensor) -> Self {
        Value::Tensor(value)
    }
}

impl From<Struct<Value>> for Value {
    fn from(value: Struct<Value>) -> Self {
        Value::Struct(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_reports_missing_names() {
        let v = Value::named([("a", Value::from(Tensor::from(1.0f32)))]);
        assert!(v.field("a").is_ok());
        assert_eq!(
            v.field("b"),
            Err(CoreErr::MissingField {
                name: "b".to_string()
            })
        );
    }

    #[test]
    fn add_assign_walks_structure() {
        let mut a = Value::named([
            ("n", Value::from(Tensor::from(2i64))),
            ("l", Value::from(Tensor::from(1.5f32))),
        ]);
        let b = a.clone();
        a.add_assign(&b).unwrap();
        assert_eq!(a.field("n").unwrap(), &Value::from(Tensor::from(4i64)));
        assert_eq!(a.field("l").unwrap(), &Value::from(Tensor::from(3.0f32)));
    }

    #[test]
    fn leaves_are_depth_first() {
        let v = Value::unnamed([
            Value::from(Tensor::from(1i32)),
            Value::unnamed([Value::from(Tensor::from(2i32))]),
            Value::from(Tensor::from(3i32)),
        ]);
        let leaves: Vec<f64> = v.leaves().iter().filter_map(|t| t.scalar_f64()).collect();
        assert_eq!(leaves, [1.0, 2.0, 3.0]);
    }
}
