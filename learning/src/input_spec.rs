use fed_core::{Type, Value, type_from_tensors};

use crate::{MlErr, Result};

/// Name of the features slot of a named input spec.
pub const MODEL_ARG_NAME: &str = "x";
/// Name of the labels slot of a named input spec.
pub const MODEL_LABEL_NAME: &str = "y";

/// The type of the batches a model consumes in `forward_pass`.
///
/// Either a mapping with exactly the `x` and `y` slots or a two element ordered structure
/// with features first and labels second. Every tensor carries a leading batch dimension,
/// which is usually left undefined.
#[derive(Debug, Clone, PartialEq)]
pub enum InputSpec {
    Named { x: Type, y: Type },
    Ordered(Type, Type),
}

impl InputSpec {
    /// Creates a mapping spec with `x` and `y` slots.
    ///
    /// # Errors
    /// Returns `MlErr::InvalidInputSpec` if a tensor lacks a batch dimension or a federated
    /// type is used.
    pub fn named(x: Type, y: Type) -> Result<Self> {
        validate(&x)?;
        validate(&y)?;
        Ok(Self::Named { x, y })
    }

    /// Creates an ordered `(features, labels)` spec.
    ///
    /// # Errors
    /// Same as `InputSpec::named`.
    pub fn ordered(x: Type, y: Type) -> Result<Self> {
        validate(&x)?;
        validate(&y)?;
        Ok(Self::Ordered(x, y))
    }

    /// Interprets a two element struct type as an input spec.
    pub fn from_type(ty: &Type) -> Result<Self> {
        let s = ty
            .as_struct()
            .ok_or(MlErr::InvalidInputSpec("expected a two element structure"))?;

        if s.len() != 2 {
            return Err(MlErr::InvalidInputSpec("expected exactly two elements"));
        }

        if !s.has_names() {
            return Self::ordered(s[0].clone(), s[1].clone());
        }

        match (s.get(MODEL_ARG_NAME), s.get(MODEL_LABEL_NAME)) {
            (Some(x), Some(y)) => Self::named(x.clone(), y.clone()),
            _ => Err(MlErr::InvalidInputSpec(
                "a named spec must have exactly the `x` and `y` slots",
            )),
        }
    }

    /// The type of the features, the input of `predict_on_batch`.
    pub fn features(&self) -> &Type {
        match self {
            InputSpec::Named { x, .. } | InputSpec::Ordered(x, _) => x,
        }
    }

    /// The type of the labels.
    pub fn labels(&self) -> &Type {
        match self {
            InputSpec::Named { y, .. } | InputSpec::Ordered(_, y) => y,
        }
    }

    /// Returns the spec as a struct type.
    pub fn to_type(&self) -> Type {
        match self {
            InputSpec::Named { x, y } => Type::Struct(fed_core::Struct::named([
                (MODEL_ARG_NAME, x.clone()),
                (MODEL_LABEL_NAME, y.clone()),
            ])),
            InputSpec::Ordered(x, y) => {
                Type::Struct(fed_core::Struct::unnamed([x.clone(), y.clone()]))
            }
        }
    }

    /// Checks that the features of a prediction input match the spec.
    pub fn check_features(&self, x: &Value) -> Result<()> {
        check_slot(MODEL_ARG_NAME, self.features(), x)
    }

    /// Checks that both slots of `batch` match the spec and hold the same amount of rows.
    ///
    /// # Errors
    /// Returns `MlErr::BatchMismatch` naming the first slot that does not match and
    /// `MlErr::SizeMismatch` if a tensor's leading dimension differs from the features'.
    pub fn check_batch(&self, batch: &Batch) -> Result<()> {
        check_slot(MODEL_ARG_NAME, self.features(), &batch.x)?;
        check_slot(MODEL_LABEL_NAME, self.labels(), &batch.y)?;

        let Some(rows) = batch.batch_size() else {
            return Ok(());
        };

        let leading = |v: &Value| -> Vec<usize> {
            v.leaves()
                .iter()
                .filter_map(|t| t.shape().first().copied())
                .collect()
        };

        for (what, value) in [("batch features", &batch.x), ("batch labels", &batch.y)] {
            if let Some(got) = leading(value).into_iter().find(|&n| n != rows) {
                return Err(MlErr::SizeMismatch {
                    what,
                    got,
                    expected: rows,
                });
            }
        }

        Ok(())
    }
}

fn validate(ty: &Type) -> Result<()> {
    match ty {
        Type::Tensor(t) if t.shape.rank() == 0 => Err(MlErr::InvalidInputSpec(
            "every tensor needs a leading batch dimension",
        )),
        Type::Tensor(_) => Ok(()),
        Type::Struct(s) => s.values().try_for_each(validate),
        Type::Federated { .. } => Err(MlErr::InvalidInputSpec(
            "federated types cannot describe a batch",
        )),
    }
}

fn check_slot(slot: &'static str, expected: &Type, value: &Value) -> Result<()> {
    let got = type_from_tensors(value);
    if !expected.is_assignable_from(&got) {
        return Err(MlErr::BatchMismatch {
            slot,
            got,
            expected: expected.clone(),
        });
    }

    Ok(())
}

/// A batch of features and labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub x: Value,
    pub y: Value,
}

impl Batch {
    pub fn new(x: impl Into<Value>, y: impl Into<Value>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
        }
    }

    /// Splits a two element batch value into features and labels following `spec`.
    ///
    /// # Errors
    /// Returns `MlErr` if `value` is not a structure with the slots `spec` describes.
    pub fn from_value(value: Value, spec: &InputSpec) -> Result<Self> {
        let Value::Struct(s) = value else {
            return Err(MlErr::TypeMismatch {
                what: "batch",
                expected: "a two element structure",
            });
        };

        if s.len() != 2 {
            return Err(MlErr::SizeMismatch {
                what: "batch elements",
                got: s.len(),
                expected: 2,
            });
        }

        let mut elements = s.into_elements();
        let batch = match spec {
            InputSpec::Ordered(..) => {
                let y = elements.pop().map(|(_, v)| v);
                let x = elements.pop().map(|(_, v)| v);
                x.zip(y).map(|(x, y)| Self { x, y })
            }
            InputSpec::Named { .. } => {
                let mut take = |name: &str| {
                    let idx = elements
                        .iter()
                        .position(|(n, _)| n.as_deref() == Some(name))?;
                    Some(elements.swap_remove(idx).1)
                };

                let x = take(MODEL_ARG_NAME);
                let y = take(MODEL_LABEL_NAME);
                x.zip(y).map(|(x, y)| Self { x, y })
            }
        };

        let batch = batch.ok_or(MlErr::MissingField {
            name: format!("{MODEL_ARG_NAME}/{MODEL_LABEL_NAME}"),
        })?;

        spec.check_batch(&batch)?;
        Ok(batch)
    }

    /// Returns the leading dimension of the first features tensor.
    pub fn batch_size(&self) -> Option<usize> {
        self.x.leaves().first().and_then(|t| t.shape().first().copied())
    }
}

#[cfg(test)]
mod tests {
    use fed_core::{DType, Struct, Tensor, TensorShape};
    use ndarray::{ArrayD, IxDyn};

    use super::*;

    fn spec() -> InputSpec {
        InputSpec::named(
            Type::tensor(DType::F32, TensorShape::with_batch(&[2])),
            Type::tensor(DType::F32, TensorShape::with_batch(&[1])),
        )
        .unwrap()
    }

    fn zeros(shape: &[usize]) -> Value {
        Value::from(Tensor::from(ArrayD::<f32>::zeros(IxDyn(shape))))
    }

    #[test]
    fn rejects_scalar_slots() {
        let err = InputSpec::named(
            Type::tensor(DType::F32, TensorShape::scalar()),
            Type::tensor(DType::F32, TensorShape::with_batch(&[])),
        )
        .unwrap_err();

        assert!(matches!(err, MlErr::InvalidInputSpec(_)));
    }

    #[test]
    fn from_type_requires_x_and_y() {
        let x = Type::tensor(DType::F32, TensorShape::with_batch(&[2]));
        let bad = Type::Struct(Struct::named([("a", x.clone()), ("y", x.clone())]));
        assert!(InputSpec::from_type(&bad).is_err());

        let ordered = Type::Struct(Struct::unnamed([x.clone(), x.clone()]));
        assert!(matches!(
            InputSpec::from_type(&ordered),
            Ok(InputSpec::Ordered(..))
        ));

        assert_eq!(InputSpec::from_type(&spec().to_type()), Ok(spec()));
    }

    #[test]
    fn batch_from_named_value() {
        let value = Value::named([("y", zeros(&[4, 1])), ("x", zeros(&[4, 2]))]);
        let batch = Batch::from_value(value, &spec()).unwrap();
        assert_eq!(batch.batch_size(), Some(4));
        assert_eq!(batch.x, zeros(&[4, 2]));
    }

    #[test]
    fn labels_must_have_as_many_rows_as_features() {
        for rows in [2, 1] {
            let batch = Batch::new(zeros(&[3, 2]), zeros(&[rows, 1]));
            let err = spec().check_batch(&batch).unwrap_err();
            assert_eq!(
                err,
                MlErr::SizeMismatch {
                    what: "batch labels",
                    got: rows,
                    expected: 3,
                }
            );
        }
    }

    #[test]
    fn batch_with_wrong_feature_width_is_rejected() {
        let value = Value::named([("x", zeros(&[4, 3])), ("y", zeros(&[4, 1]))]);
        let err = Batch::from_value(value, &spec()).unwrap_err();
        assert!(matches!(err, MlErr::BatchMismatch { slot: "x", .. }));
    }
}
