use fed_core::{DType, Tensor, Value};

use super::{Finalizer, Metric, first};
use crate::{Result, Variable};

/// A running scalar sum.
pub struct SumMetric {
    name: String,
    sum: Variable,
}

impl SumMetric {
    /// Creates a new `SumMetric` of the given element type.
    pub fn new(name: impl Into<String>, dtype: DType) -> Self {
        let name = name.into();

        Self {
            sum: Variable::zeros(format!("{name}/sum"), dtype, &[]),
            name,
        }
    }

    /// Adds `value` to the sum, it must be a scalar of the metric's dtype.
    pub fn update(&self, value: &Tensor) -> Result<()> {
        self.sum.assign_add(value)
    }

    pub fn result(&self) -> Tensor {
        self.sum.read()
    }
}

impl Metric for SumMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn variables(&self) -> Vec<Variable> {
        vec![self.sum.clone()]
    }

    fn unfinalized(&self) -> Value {
        Value::unnamed([Value::from(self.sum.read())])
    }

    fn finalizer(&self) -> Finalizer {
        first()
    }
}
