//! Metric accumulators, finalizers and their cross-participant aggregation.

mod mean;
mod sum;

use std::{collections::BTreeSet, sync::Arc};

use fed_core::{Struct, Tensor, Value};
use log::debug;
use rayon::prelude::*;

use crate::{MlErr, Result, Variable};

pub use mean::MeanMetric;
pub use sum::SumMetric;

/// Turns a metric's unfinalized value into its final value.
pub type Finalizer = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// Metric names to finalizers.
pub type MetricFinalizers = Struct<Finalizer>;

/// A metric whose state lives in local variables.
pub trait Metric: Send + Sync {
    fn name(&self) -> &str;

    /// The local variables holding the metric state.
    fn variables(&self) -> Vec<Variable>;

    /// The state as it is reported before finalization.
    fn unfinalized(&self) -> Value;

    fn finalizer(&self) -> Finalizer;

    /// Zeroes the metric state.
    fn reset(&self) {
        self.variables().iter().for_each(Variable::reset);
    }
}

/// Wraps a function as a `Finalizer`.
pub fn finalizer<F>(f: F) -> Finalizer
where
    F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A finalizer dividing the first element of `[total, count]` by the second, zero when the
/// count is zero.
pub fn divide_no_nan() -> Finalizer {
    finalizer(|value| {
        let s = value.try_struct("divide_no_nan")?;
        let total = scalar_at(s, 0)?;
        let count = scalar_at(s, 1)?;
        let result = if count == 0.0 { 0.0 } else { total / count };
        Ok(Value::from(Tensor::from(result as f32)))
    })
}

/// A finalizer returning the first element of a single element structure.
pub fn first() -> Finalizer {
    finalizer(|value| {
        let s = value.try_struct("first")?;
        s.get_index(0).cloned().ok_or(MlErr::SizeMismatch {
            what: "unfinalized metric",
            got: 0,
            expected: 1,
        })
    })
}

fn scalar_at(s: &Struct<Value>, idx: usize) -> Result<f64> {
    let tensor = s
        .get_index(idx)
        .ok_or(MlErr::SizeMismatch {
            what: "unfinalized metric",
            got: s.len(),
            expected: idx + 1,
        })?
        .try_tensor("unfinalized metric")?;

    tensor.scalar_f64().ok_or(MlErr::SizeMismatch {
        what: "unfinalized metric element",
        got: tensor.len(),
        expected: 1,
    })
}

/// Checks that both mappings carry exactly the same metric names, each one once.
///
/// # Errors
/// Returns `MlErr::MetricKeysMismatch` listing both key sets otherwise.
pub fn check_metric_keys(
    unfinalized: &Struct<Value>,
    finalizers: &MetricFinalizers,
) -> Result<()> {
    let reported: BTreeSet<&str> = unfinalized.names().collect();
    let expected: BTreeSet<&str> = finalizers.names().collect();

    if reported != expected
        || reported.len() != unfinalized.len()
        || expected.len() != finalizers.len()
    {
        return Err(MlErr::MetricKeysMismatch {
            reported: unfinalized.names().map(String::from).collect(),
            finalizers: finalizers.names().map(String::from).collect(),
        });
    }

    Ok(())
}

/// Applies each metric's finalizer to its unfinalized value.
///
/// # Returns
/// The final metrics, in the order of `unfinalized`.
pub fn finalize_metrics(
    unfinalized: &Struct<Value>,
    finalizers: &MetricFinalizers,
) -> Result<Struct<Value>> {
    check_metric_keys(unfinalized, finalizers)?;

    unfinalized
        .iter_elements()
        .map(|(name, value)| {
            let name = name.unwrap_or_default();
            let finalizer = finalizers.get(name).ok_or_else(|| MlErr::MissingField {
                name: name.to_string(),
            })?;

            Ok((name.to_string(), finalizer(value)?))
        })
        .collect::<Result<Vec<_>>>()
        .map(Struct::named)
}

/// Sums every participant's unfinalized metrics and finalizes the sum.
///
/// # Arguments
/// * `participants` - The unfinalized metrics reported by each participant.
/// * `finalizers` - The finalizers shared by every participant.
///
/// # Errors
/// Returns `MlErr` if there are no participants, the keys differ or the values cannot be
/// summed.
pub fn sum_then_finalize(
    participants: &[Struct<Value>],
    finalizers: &MetricFinalizers,
) -> Result<Struct<Value>> {
    participants
        .iter()
        .try_for_each(|metrics| check_metric_keys(metrics, finalizers))?;

    let summed = participants
        .par_iter()
        .map(|metrics| Ok::<_, MlErr>(Value::Struct(metrics.clone())))
        .try_reduce_with(|mut acc, other| {
            acc.add_assign(&other)?;
            Ok(acc)
        })
        .ok_or_else(|| MlErr::Aggregation("there are no participants".to_string()))??;

    debug!(participants = participants.len(); "summed unfinalized metrics");

    let Value::Struct(summed) = summed else {
        return Err(MlErr::TypeMismatch {
            what: "summed metrics",
            expected: "a structure",
        });
    };

    finalize_metrics(&summed, finalizers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(total: f32, count: i64) -> Struct<Value> {
        Struct::named([
            (
                "loss",
                Value::unnamed([
                    Value::from(Tensor::from(total)),
                    Value::from(Tensor::from(count)),
                ]),
            ),
            ("num_examples", Value::unnamed([Value::from(Tensor::from(count))])),
        ])
    }

    fn finalizers() -> MetricFinalizers {
        Struct::named([("loss", divide_no_nan()), ("num_examples", first())])
    }

    #[test]
    fn divide_no_nan_handles_zero_count() {
        let finalized = finalize_metrics(&metrics(3.0, 0), &finalizers()).unwrap();
        assert_eq!(finalized.get("loss"), Some(&Value::from(Tensor::from(0.0f32))));
    }

    #[test]
    fn finalize_keeps_reported_order() {
        let finalized = finalize_metrics(&metrics(3.0, 2), &finalizers()).unwrap();
        assert_eq!(finalized.names().collect::<Vec<_>>(), ["loss", "num_examples"]);
        assert_eq!(finalized.get("loss"), Some(&Value::from(Tensor::from(1.5f32))));
        assert_eq!(
            finalized.get("num_examples"),
            Some(&Value::from(Tensor::from(2i64)))
        );
    }

    #[test]
    fn mismatched_keys_are_rejected() {
        let finalizers: MetricFinalizers = Struct::named([("loss", divide_no_nan())]);
        let err = finalize_metrics(&metrics(1.0, 1), &finalizers).unwrap_err();
        assert!(matches!(err, MlErr::MetricKeysMismatch { .. }));
    }

    #[test]
    fn sum_then_finalize_weights_by_count() {
        let participants = [metrics(2.0, 1), metrics(10.0, 3)];
        let finalized = sum_then_finalize(&participants, &finalizers()).unwrap();
        assert_eq!(finalized.get("loss"), Some(&Value::from(Tensor::from(3.0f32))));
        assert_eq!(
            finalized.get("num_examples"),
            Some(&Value::from(Tensor::from(4i64)))
        );
    }

    #[test]
    fn duplicate_finalizer_names_are_rejected() {
        let duplicated = Struct::named([
            ("loss", divide_no_nan()),
            ("num_examples", first()),
            ("loss", divide_no_nan()),
        ]);

        let err = check_metric_keys(&metrics(1.0, 1), &duplicated).unwrap_err();
        assert!(matches!(err, MlErr::MetricKeysMismatch { .. }));
    }

    #[test]
    fn sum_then_finalize_needs_participants() {
        let err = sum_then_finalize(&[], &finalizers()).unwrap_err();
        assert!(matches!(err, MlErr::Aggregation(_)));
    }
}
