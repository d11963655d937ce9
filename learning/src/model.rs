use fed_core::{Struct, Tensor, Value};

use crate::{
    Batch, InputSpec, Result, Variable, federated::FederatedOutputComputation,
    metrics::MetricFinalizers,
};

/// The output of a single `Model::forward_pass`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutput {
    loss: Option<f32>,
    predictions: Option<Tensor>,
    num_examples: Option<usize>,
}

impl BatchOutput {
    /// Creates a new `BatchOutput`.
    ///
    /// # Args
    /// * `loss` - The mean loss over the batch, the sum of them if there are many losses.
    /// * `predictions` - The predictions, its first dimension is the batch size.
    /// * `num_examples` - The amount of examples in the batch.
    pub fn new(
        loss: Option<f32>,
        predictions: Option<Tensor>,
        num_examples: Option<usize>,
    ) -> Self {
        Self {
            loss,
            predictions,
            num_examples,
        }
    }

    pub fn loss(&self) -> Option<f32> {
        self.loss
    }

    pub fn predictions(&self) -> Option<&Tensor> {
        self.predictions.as_ref()
    }

    pub fn num_examples(&self) -> Option<usize> {
        self.num_examples
    }
}

/// A model taking part in federated training and evaluation.
///
/// A model works on three disjoint sets of variables:
/// - trainable variables, updated by gradient based optimization,
/// - non-trainable variables, part of the weights but not learned (e.g. running statistics),
/// - local variables, per participant accumulators such as metric totals.
///
/// Trainable and non-trainable variables travel between participants as `ModelWeights`,
/// local variables never leave the process. Every variable is created when the model is
/// built, callers initialize them before use.
///
/// Each method must behave as a pure function of the batch and the variables: the engine
/// driving the model may trace and invoke them any number of times.
pub trait Model {
    fn trainable_variables(&self) -> &[Variable];

    fn non_trainable_variables(&self) -> &[Variable];

    fn local_variables(&self) -> &[Variable];

    /// The type of the batches accepted by `forward_pass`.
    fn input_spec(&self) -> &InputSpec;

    /// Runs the forward pass over a batch matching `input_spec`.
    ///
    /// Must not modify trainable or non-trainable variables, may update local variables.
    /// The returned `loss` must be set if the model is trained with a gradient method.
    ///
    /// # Errors
    /// Returns `MlErr` if the batch does not match the model.
    fn forward_pass(&self, batch: &Batch, training: bool) -> Result<BatchOutput>;

    /// Computes predictions for the features slot of a batch.
    ///
    /// With `training == false` no variable may change. With `training == true`
    /// non-trainable statistics may be updated, trainable variables never are.
    ///
    /// # Errors
    /// Returns `MlErr` if the features do not match the model.
    fn predict_on_batch(&self, x: &Value, training: bool) -> Result<Tensor>;

    /// Returns the values accumulated over every `forward_pass` since the locals were reset.
    fn report_local_outputs(&self) -> Result<Value>;

    /// Describes how `report_local_outputs` is aggregated across participants, `None` if it
    /// is not.
    fn federated_output_computation(&self) -> Option<FederatedOutputComputation>;

    /// Returns each metric's unfinalized value, keyed by the same names as
    /// `metric_finalizers`.
    fn report_local_unfinalized_metrics(&self) -> Result<Struct<Value>>;

    /// Returns each metric's finalizer, keyed by the same names as
    /// `report_local_unfinalized_metrics`.
    fn metric_finalizers(&self) -> MetricFinalizers;
}
