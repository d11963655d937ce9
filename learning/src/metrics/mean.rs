use fed_core::{DType, Tensor, Value};

use super::{Finalizer, Metric, divide_no_nan};
use crate::{Result, Variable};

/// A weighted mean kept as a running `total` and `count`.
pub struct MeanMetric {
    name: String,
    total: Variable,
    count: Variable,
}

impl MeanMetric {
    /// Creates a new `MeanMetric` with both accumulators at zero.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();

        Self {
            total: Variable::zeros(format!("{name}/total"), DType::F32, &[]),
            count: Variable::zeros(format!("{name}/count"), DType::F32, &[]),
            name,
        }
    }

    /// Accumulates `value` with the given `weight`.
    pub fn update(&self, value: f32, weight: f32) -> Result<()> {
        self.total.assign_add(&Tensor::from(value * weight))?;
        self.count.assign_add(&Tensor::from(weight))
    }

    /// Returns the current mean, zero if nothing was accumulated.
    pub fn result(&self) -> Result<f32> {
        let total = self.total.read_f32(|t| t.sum())?;
        let count = self.count.read_f32(|c| c.sum())?;
        Ok(if count == 0.0 { 0.0 } else { total / count })
    }
}

impl Metric for MeanMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn variables(&self) -> Vec<Variable> {
        vec![self.total.clone(), self.count.clone()]
    }

    fn unfinalized(&self) -> Value {
        Value::unnamed([
            Value::from(self.total.read()),
            Value::from(self.count.read()),
        ])
    }

    fn finalizer(&self) -> Finalizer {
        divide_no_nan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_mean() {
        let m = MeanMetric::new("loss");
        m.update(1.0, 1.0).unwrap();
        m.update(4.0, 3.0).unwrap();
        assert_eq!(m.result().unwrap(), 13.0 / 4.0);

        let finalized = m.finalizer()(&m.unfinalized()).unwrap();
        assert_eq!(finalized, Value::from(Tensor::from(13.0f32 / 4.0)));
    }

    #[test]
    fn reset_clears_state() {
        let m = MeanMetric::new("loss");
        m.update(2.0, 1.0).unwrap();
        m.reset();
        assert_eq!(m.result().unwrap(), 0.0);
        assert_eq!(m.variables().len(), 2);
    }
}
