use fed_core::{DType, Struct, Tensor, TensorShape, Type, Value};
use ndarray::{Array2, Ix2};

use crate::{
    Batch, BatchOutput, InputSpec, MlErr, Model, Result, Variable,
    arch::value_as_matrix,
    federated::{Aggregation, FederatedOutputComputation},
    metrics::{MetricFinalizers, divide_no_nan, first},
};

/// A linear regression `y = x · a + b + c` over `feature_dim` features.
///
/// `a` and `b` are trained, `c` is an extra non-trainable bias so that every weight kind is
/// present. The local variables count examples and batches and sum the loss.
pub struct LinearRegression {
    feature_dim: usize,
    trainable: Vec<Variable>,
    non_trainable: Vec<Variable>,
    local: Vec<Variable>,
    input_spec: InputSpec,
}

impl LinearRegression {
    /// Creates a new `LinearRegression` with every variable at zero.
    ///
    /// # Errors
    /// Returns `MlErr::ModelConstruction` if `feature_dim` is zero.
    pub fn new(feature_dim: usize) -> Result<Self> {
        if feature_dim == 0 {
            return Err(MlErr::ModelConstruction(
                "a linear regression needs at least one feature".to_string(),
            ));
        }

        let input_spec = InputSpec::named(
            Type::tensor(DType::F32, TensorShape::with_batch(&[feature_dim])),
            Type::tensor(DType::F32, TensorShape::with_batch(&[1])),
        )?;

        Ok(Self {
            feature_dim,
            trainable: vec![
                Variable::zeros("a", DType::F32, &[feature_dim, 1]),
                Variable::zeros("b", DType::F32, &[1]),
            ],
            non_trainable: vec![Variable::zeros("c", DType::F32, &[1])],
            local: vec![
                Variable::zeros("num_examples", DType::I64, &[]),
                Variable::zeros("num_batches", DType::I64, &[]),
                Variable::zeros("loss_sum", DType::F32, &[]),
            ],
            input_spec,
        })
    }

    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    /// Zeroes the local variables.
    pub fn reset_local_variables(&self) {
        self.local.iter().for_each(Variable::reset);
    }

    fn num_examples(&self) -> &Variable {
        &self.local[0]
    }

    fn num_batches(&self) -> &Variable {
        &self.local[1]
    }

    fn loss_sum(&self) -> &Variable {
        &self.local[2]
    }

    fn mean_loss(&self) -> Result<f32> {
        let n = scalar(self.num_examples());
        let total = self.loss_sum().read_f32(|s| s.sum())?;
        Ok(if n == 0.0 { 0.0 } else { total / n as f32 })
    }

    fn predict(&self, x: &Value) -> Result<Array2<f32>> {
        self.input_spec.check_features(x)?;
        let x = value_as_matrix(x, "features")?;

        let mut predictions = self.trainable[0].read_f32(|a| {
            a.into_dimensionality::<Ix2>()
                .map(|a| x.dot(&a))
                .map_err(|_| MlErr::TypeMismatch {
                    what: "a",
                    expected: "a matrix",
                })
        })??;

        let bias = self.trainable[1].read_f32(|b| b.sum())?
            + self.non_trainable[0].read_f32(|c| c.sum())?;
        predictions += bias;
        Ok(predictions)
    }
}

fn scalar(var: &Variable) -> f64 {
    var.with_value(|t| t.scalar_f64().unwrap_or_default())
}

impl Model for LinearRegression {
    fn trainable_variables(&self) -> &[Variable] {
        &self.trainable
    }

    fn non_trainable_variables(&self) -> &[Variable] {
        &self.non_trainable
    }

    fn local_variables(&self) -> &[Variable] {
        &self.local
    }

    fn input_spec(&self) -> &InputSpec {
        &self.input_spec
    }

    fn forward_pass(&self, batch: &Batch, _training: bool) -> Result<BatchOutput> {
        self.input_spec.check_batch(batch)?;

        let predictions = self.predict(&batch.x)?;
        let y = value_as_matrix(&batch.y, "labels")?;
        let num_examples = predictions.nrows();

        let loss = (&predictions - &y)
            .mapv(|d| 0.5 * d * d)
            .mean()
            .unwrap_or_default();

        self.num_examples().assign_add(&Tensor::from(num_examples as i64))?;
        self.num_batches().assign_add(&Tensor::from(1i64))?;
        self.loss_sum()
            .assign_add(&Tensor::from(loss * num_examples as f32))?;

        Ok(BatchOutput::new(
            Some(loss),
            Some(Tensor::from(predictions.into_dyn())),
            Some(num_examples),
        ))
    }

    fn predict_on_batch(&self, x: &Value, _training: bool) -> Result<Tensor> {
        Ok(Tensor::from(self.predict(x)?.into_dyn()))
    }

    fn report_local_outputs(&self) -> Result<Value> {
        Ok(Value::named([
            ("num_examples", Value::from(self.num_examples().read())),
            ("num_batches", Value::from(self.num_batches().read())),
            ("loss", Value::from(Tensor::from(self.mean_loss()?))),
        ]))
    }

    fn federated_output_computation(&self) -> Option<FederatedOutputComputation> {
        Some(FederatedOutputComputation::from_leaves([
            ("num_examples", Aggregation::Sum),
            ("num_batches", Aggregation::Sum),
            (
                "loss",
                Aggregation::WeightedMean {
                    weight: "num_examples".to_string(),
                },
            ),
        ]))
    }

    fn report_local_unfinalized_metrics(&self) -> Result<Struct<Value>> {
        Ok(Struct::named([
            (
                "loss",
                Value::unnamed([
                    Value::from(self.loss_sum().read()),
                    Value::from(self.num_examples().read()),
                ]),
            ),
            (
                "num_examples",
                Value::unnamed([Value::from(self.num_examples().read())]),
            ),
        ]))
    }

    fn metric_finalizers(&self) -> MetricFinalizers {
        Struct::named([("loss", divide_no_nan()), ("num_examples", first())])
    }
}
