use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::{DType, Struct};

/// A tensor shape where each dimension may be undefined.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TensorShape(Vec<Option<usize>>);

impl TensorShape {
    pub fn new(dims: Vec<Option<usize>>) -> Self {
        Self(dims)
    }

    /// The shape of a scalar.
    pub fn scalar() -> Self {
        Self(Vec::new())
    }

    /// A shape with an undefined leading batch dimension followed by `rest`.
    pub fn with_batch(rest: &[usize]) -> Self {
        let mut dims = Vec::with_capacity(rest.len() + 1);
        dims.push(None);
        dims.extend(rest.iter().copied().map(Some));
        Self(dims)
    }

    pub fn dims(&self) -> &[Option<usize>] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Returns the amount of elements, `None` if any dimension is undefined.
    pub fn num_elements(&self) -> Option<usize> {
        self.0.iter().copied().product()
    }

    /// Whether a concrete shape fits this one.
    pub fn is_compatible_with(&self, shape: &[usize]) -> bool {
        self.0.len() == shape.len()
            && self
                .0
                .iter()
                .zip(shape)
                .all(|(dim, &n)| dim.is_none_or(|d| d == n))
    }

    /// Whether every shape accepted by `other` is accepted by this one.
    pub fn is_assignable_from(&self, other: &TensorShape) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().zip(&other.0).all(|(a, b)| match (a, b) {
                (None, _) => true,
                (Some(a), Some(b)) => a == b,
                (Some(_), None) => false,
            })
    }
}

impl From<&[usize]> for TensorShape {
    fn from(value: &[usize]) -> Self {
        Self(value.iter().copied().map(Some).collect())
    }
}

impl<const N: usize> From<[usize; N]> for TensorShape {
    fn from(value: [usize; N]) -> Self {
        Self::from(&value[..])
    }
}

impl Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }

        let dims: Vec<String> = self
            .0
            .iter()
            .map(|d| d.map_or_else(|| "?".to_string(), |d| d.to_string()))
            .collect();

        write!(f, "[{}]", dims.join(","))
    }
}

/// The type of a single tensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorType {
    pub dtype: DType,
    pub shape: TensorShape,
}

impl TensorType {
    pub fn new(dtype: DType, shape: impl Into<TensorShape>) -> Self {
        Self {
            dtype,
            shape: shape.into(),
        }
    }

    pub fn scalar(dtype: DType) -> Self {
        Self::new(dtype, TensorShape::scalar())
    }
}

impl Display for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.dtype, self.shape)
    }
}

/// Where a federated value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Clients,
    Server,
}

impl Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Clients => write!(f, "CLIENTS"),
            Placement::Server => write!(f, "SERVER"),
        }
    }
}

pub type StructType = Struct<Type>;

/// The distributed type of a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    Tensor(TensorType),
    Struct(StructType),
    Federated {
        member: Box<Type>,
        placement: Placement,
        all_equal: bool,
    },
}

impl Type {
    pub fn tensor(dtype: DType, shape: impl Into<TensorShape>) -> Self {
        Type::Tensor(TensorType::new(dtype, shape))
    }

    /// A member type placed at the clients, one value per client.
    pub fn at_clients(member: Type) -> Self {
        Type::Federated {
            member: Box::new(member),
            placement: Placement::Clients,
            all_equal: false,
        }
    }

    /// A member type placed at the server.
    pub fn at_server(member: Type) -> Self {
        Type::Federated {
            member: Box::new(member),
            placement: Placement::Server,
            all_equal: true,
        }
    }

    pub fn as_tensor(&self) -> Option<&TensorType> {
        match self {
            Type::Tensor(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructType> {
        match self {
            Type::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Looks up a named field of a struct type.
    pub fn field(&self, name: &str) -> Option<&Type> {
        self.as_struct().and_then(|s| s.get(name))
    }

    /// Whether this type contains a federated type anywhere.
    pub fn contains_federated(&self) -> bool {
        match self {
            Type::Tensor(_) => false,
            Type::Struct(s) => s.values().any(Type::contains_federated),
            Type::Federated { .. } => true,
        }
    }

    /// Whether every value of `other` is also a value of this type.
    pub fn is_assignable_from(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Tensor(a), Type::Tensor(b)) => {
                a.dtype == b.dtype && a.shape.is_assignable_from(&b.shape)
            }
            (Type::Struct(a), Type::Struct(b)) => {
                a.same_names(b)
                    && a.values()
                        .zip(b.values())
                        .all(|(a, b)| a.is_assignable_from(b))
            }
            (
                Type::Federated {
                    member: a,
                    placement: pa,
                    all_equal: ea,
                },
                Type::Federated {
                    member: b,
                    placement: pb,
                    all_equal: eb,
                },
            ) => pa == pb && (ea == eb || !ea) && a.is_assignable_from(b),
            _ => false,
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Tensor(t) => write!(f, "{t}"),
            Type::Struct(s) => {
                let elements: Vec<String> = s
                    .iter_elements()
                    .map(|(name, ty)| match name {
                        Some(name) => format!("{name}={ty}"),
                        None => ty.to_string(),
                    })
                    .collect();

                write!(f, "<{}>", elements.join(","))
            }
            Type::Federated {
                member,
                placement,
                all_equal,
            } => {
                if *all_equal {
                    write!(f, "{member}@{placement}")
                } else {
                    write!(f, "{{{member}}}@{placement}")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_elements_requires_defined_shape() {
        assert_eq!(TensorShape::from([2, 3]).num_elements(), Some(6));
        assert_eq!(TensorShape::scalar().num_elements(), Some(1));
        assert_eq!(TensorShape::with_batch(&[3]).num_elements(), None);
    }

    #[test]
    fn batch_shape_accepts_any_batch_size() {
        let shape = TensorShape::with_batch(&[2]);
        assert!(shape.is_compatible_with(&[7, 2]));
        assert!(!shape.is_compatible_with(&[7, 3]));
        assert!(!shape.is_compatible_with(&[2]));
    }

    #[test]
    fn display_is_compact() {
        let ty = Type::Struct(Struct::named([
            ("a", Type::tensor(DType::F32, TensorShape::with_batch(&[2]))),
            ("b", Type::tensor(DType::I64, TensorShape::scalar())),
        ]));

        assert_eq!(ty.to_string(), "<a=float32[?,2],b=int64>");
        assert_eq!(
            Type::at_clients(ty.clone()).to_string(),
            "{<a=float32[?,2],b=int64>}@CLIENTS"
        );
        assert_eq!(
            Type::at_server(Type::tensor(DType::F32, TensorShape::scalar())).to_string(),
            "float32@SERVER"
        );
    }

    #[test]
    fn assignability_follows_undefined_dims() {
        let spec = Type::tensor(DType::F32, TensorShape::with_batch(&[2]));
        let concrete = Type::tensor(DType::F32, [5, 2]);
        assert!(spec.is_assignable_from(&concrete));
        assert!(!concrete.is_assignable_from(&spec));
        assert!(!spec.is_assignable_from(&Type::tensor(DType::F64, [5, 2])));
    }

    #[test]
    fn serializes_to_json() {
        let ty = Type::Struct(Struct::named([("w", Type::tensor(DType::F32, [2]))]));
        let json = serde_json::to_string(&ty).unwrap();
        let back: Type = serde_json::from_str(&json).unwrap();
        assert_eq!(ty, back);
    }
}
