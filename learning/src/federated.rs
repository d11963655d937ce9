//! Cross-participant aggregation of `Model::report_local_outputs`.

use std::fmt::{self, Display};

use fed_core::{Struct, Type, Value};
use log::debug;

use crate::{MlErr, Result};

/// How a single output leaf is reduced across participants.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    Sum,
    Mean,
    /// A mean weighted by the named top-level scalar field of each participant's outputs.
    WeightedMean { weight: String },
}

/// Aggregations following the structure of the local outputs.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationSpec {
    Leaf(Aggregation),
    Struct(Struct<AggregationSpec>),
}

impl From<Aggregation> for AggregationSpec {
    fn from(value: Aggregation) -> Self {
        AggregationSpec::Leaf(value)
    }
}

/// The parameter and result types of a federated computation.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputationSignature {
    pub parameter: Type,
    pub result: Type,
}

impl Display for ComputationSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} -> {})", self.parameter, self.result)
    }
}

/// Aggregates per-participant local outputs into server side results.
///
/// The computation takes the clients-placed local outputs and produces a structure with the
/// same names where every field is placed at the server.
#[derive(Debug, Clone, PartialEq)]
pub struct FederatedOutputComputation {
    spec: Struct<AggregationSpec>,
}

impl FederatedOutputComputation {
    pub fn new(spec: Struct<AggregationSpec>) -> Self {
        Self { spec }
    }

    /// Creates a computation from `(field, aggregation)` pairs over flat outputs.
    pub fn from_leaves<I, S>(leaves: I) -> Self
    where
        I: IntoIterator<Item = (S, Aggregation)>,
        S: Into<String>,
    {
        Self::new(Struct::named(
            leaves
                .into_iter()
                .map(|(name, agg)| (name, AggregationSpec::Leaf(agg))),
        ))
    }

    pub fn spec(&self) -> &Struct<AggregationSpec> {
        &self.spec
    }

    /// Computes the signature of this computation for the given local outputs type.
    ///
    /// # Errors
    /// Returns `MlErr` if `local_outputs` does not follow the aggregation structure or a mean
    /// is requested over integer tensors.
    pub fn type_signature(&self, local_outputs: &Type) -> Result<ComputationSignature> {
        let s = local_outputs.as_struct().ok_or(MlErr::TypeMismatch {
            what: "local outputs",
            expected: "a structure",
        })?;

        let result = self
            .spec
            .iter_elements()
            .map(|(name, spec)| {
                let name = name.unwrap_or_default();
                let member = s.get(name).ok_or_else(|| MlErr::MissingField {
                    name: name.to_string(),
                })?;

                Ok((name.to_string(), Type::at_server(result_type(spec, member)?)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ComputationSignature {
            parameter: Type::at_clients(local_outputs.clone()),
            result: Type::Struct(Struct::named(result)),
        })
    }

    /// Evaluates the aggregation over the outputs reported by every participant.
    ///
    /// # Errors
    /// Returns `MlErr` if there are no participants or their outputs do not follow the
    /// aggregation structure.
    pub fn aggregate(&self, participants: &[Value]) -> Result<Value> {
        if participants.is_empty() {
            return Err(MlErr::Aggregation("there are no participants".to_string()));
        }

        let mut fields = Vec::with_capacity(self.spec.len());
        for (name, spec) in self.spec.iter_elements() {
            let name = name.unwrap_or_default();
            let values = participants
                .iter()
                .map(|p| p.field(name))
                .collect::<fed_core::Result<Vec<_>>>()?;

            fields.push((name.to_string(), reduce(spec, &values, participants)?));
        }

        debug!(
            participants = participants.len(),
            fields = fields.len();
            "aggregated local outputs"
        );
        Ok(Value::named(fields))
    }
}

fn result_type(spec: &AggregationSpec, member: &Type) -> Result<Type> {
    match (spec, member) {
        (AggregationSpec::Leaf(Aggregation::Sum), member) => Ok(member.clone()),
        (AggregationSpec::Leaf(_), Type::Tensor(t)) if !t.dtype.is_floating() => Err(
            MlErr::Aggregation(format!("cannot average {t} tensors")),
        ),
        (AggregationSpec::Leaf(_), member) => Ok(member.clone()),
        (AggregationSpec::Struct(specs), Type::Struct(members)) => {
            let fields = specs
                .iter_elements()
                .map(|(name, spec)| {
                    let name = name.unwrap_or_default();
                    let member = members.get(name).ok_or_else(|| MlErr::MissingField {
                        name: name.to_string(),
                    })?;

                    Ok((name.to_string(), result_type(spec, member)?))
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(Type::Struct(Struct::named(fields)))
        }
        (AggregationSpec::Struct(_), _) => Err(MlErr::TypeMismatch {
            what: "local outputs",
            expected: "a structure",
        }),
    }
}

fn reduce(spec: &AggregationSpec, values: &[&Value], participants: &[Value]) -> Result<Value> {
    match spec {
        AggregationSpec::Leaf(Aggregation::Sum) => {
            sum(values.iter().map(|&v| (v, 1.0)), false)
        }
        AggregationSpec::Leaf(Aggregation::Mean) => {
            let mut mean = sum(values.iter().map(|&v| (v, 1.0)), false)?;
            mean.scale(1.0 / values.len() as f64)?;
            Ok(mean)
        }
        AggregationSpec::Leaf(Aggregation::WeightedMean { weight }) => {
            let weights = participants
                .iter()
                .map(|p| {
                    let w = p.field(weight)?.try_tensor("weight")?;
                    w.scalar_f64().ok_or(MlErr::SizeMismatch {
                        what: "weight",
                        got: w.len(),
                        expected: 1,
                    })
                })
                .collect::<Result<Vec<f64>>>()?;

            let total: f64 = weights.iter().sum();
            let mut mean = sum(values.iter().copied().zip(weights), true)?;
            mean.scale(if total == 0.0 { 0.0 } else { 1.0 / total })?;
            Ok(mean)
        }
        AggregationSpec::Struct(specs) => {
            let mut fields = Vec::with_capacity(specs.len());
            for (name, spec) in specs.iter_elements() {
                let name = name.unwrap_or_default();
                let children = values
                    .iter()
                    .map(|v| v.field(name))
                    .collect::<fed_core::Result<Vec<_>>>()?;

                fields.push((name.to_string(), reduce(spec, &children, participants)?));
            }

            Ok(Value::named(fields))
        }
    }
}

fn sum<'a, I>(mut weighted: I, scale: bool) -> Result<Value>
where
    I: Iterator<Item = (&'a Value, f64)>,
{
    let (first, w) = weighted
        .next()
        .ok_or_else(|| MlErr::Aggregation("there are no participants".to_string()))?;

    let mut acc = first.clone();
    if scale {
        acc.scale(w)?;
    }

    for (value, w) in weighted {
        if scale {
            let mut value = value.clone();
            value.scale(w)?;
            acc.add_assign(&value)?;
        } else {
            acc.add_assign(value)?;
        }
    }

    Ok(acc)
}

#[cfg(test)]
mod tests {
    use fed_core::{DType, Tensor, TensorShape};

    use super::*;

    fn outputs(num_examples: i64, loss: f32) -> Value {
        Value::named([
            ("num_examples", Value::from(Tensor::from(num_examples))),
            ("loss", Value::from(Tensor::from(loss))),
        ])
    }

    fn computation() -> FederatedOutputComputation {
        FederatedOutputComputation::from_leaves([
            ("num_examples", Aggregation::Sum),
            (
                "loss",
                Aggregation::WeightedMean {
                    weight: "num_examples".to_string(),
                },
            ),
        ])
    }

    #[test]
    fn weighted_mean_uses_named_weight() {
        let result = computation()
            .aggregate(&[outputs(1, 1.0), outputs(3, 5.0)])
            .unwrap();

        assert_eq!(
            result.field("num_examples").unwrap(),
            &Value::from(Tensor::from(4i64))
        );
        assert_eq!(
            result.field("loss").unwrap(),
            &Value::from(Tensor::from(4.0f32))
        );
    }

    #[test]
    fn plain_mean_and_nested_structs() {
        let stats = Struct::named([("m", AggregationSpec::from(Aggregation::Mean))]);
        let spec = FederatedOutputComputation::new(Struct::named([(
            "stats",
            AggregationSpec::Struct(stats),
        )]));
        let client = |m: f32| {
            let stats = Value::named([("m", Value::from(Tensor::from(m)))]);
            Value::named([("stats", stats)])
        };

        let result = spec.aggregate(&[client(1.0), client(3.0)]).unwrap();
        let m = result.field("stats").unwrap().field("m").unwrap();
        assert_eq!(m, &Value::from(Tensor::from(2.0f32)));
    }

    #[test]
    fn signature_places_results_at_server() {
        let local = Type::Struct(Struct::named([
            ("num_examples", Type::tensor(DType::I64, TensorShape::scalar())),
            ("loss", Type::tensor(DType::F32, TensorShape::scalar())),
        ]));

        let signature = computation().type_signature(&local).unwrap();
        assert_eq!(
            signature.to_string(),
            "({<num_examples=int64,loss=float32>}@CLIENTS -> <num_examples=int64@SERVER,loss=float32@SERVER>)"
        );
    }

    #[test]
    fn mean_over_integers_is_rejected() {
        let local = Type::Struct(Struct::named([(
            "n",
            Type::tensor(DType::I64, TensorShape::scalar()),
        )]));
        let comp = FederatedOutputComputation::from_leaves([("n", Aggregation::Mean)]);
        assert!(matches!(comp.type_signature(&local), Err(MlErr::Aggregation(_))));
    }

    #[test]
    fn no_participants_is_an_error() {
        assert!(computation().aggregate(&[]).is_err());
    }
}
