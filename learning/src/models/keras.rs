use fed_core::{DType, Struct, Tensor, Type, Value};
use log::debug;

use crate::{
    Batch, BatchOutput, InputSpec, MlErr, Model, Result, Variable,
    arch::{Mode, Sequential, loss::LossFn, value_as_matrix},
    federated::{Aggregation, FederatedOutputComputation},
    metrics::{MeanMetric, Metric, MetricFinalizers, SumMetric},
};

const NUM_EXAMPLES: &str = "num_examples";

/// A `Sequential` network paired with a loss, exposed as a `Model`.
///
/// The loss is tracked as a weighted mean over examples and the examples are counted, both
/// in local variables.
pub struct KerasModel<L> {
    net: Sequential,
    loss_fn: L,
    input_spec: InputSpec,
    trainable: Vec<Variable>,
    non_trainable: Vec<Variable>,
    local: Vec<Variable>,
    loss: MeanMetric,
    num_examples: SumMetric,
}

/// Wraps a network and a loss as a `Model`.
///
/// # Arguments
/// * `net` - The network computing the predictions.
/// * `loss_fn` - The loss between predictions and labels.
/// * `input_spec` - The batch type, its features and labels must be `float32` matrices whose
///   widths match the network's input and output.
///
/// # Errors
/// Returns `MlErr::ModelConstruction` if `input_spec` does not fit the network or the loss
/// is named like the examples counter.
pub fn from_keras_model<L: LossFn>(
    net: Sequential,
    loss_fn: L,
    input_spec: InputSpec,
) -> Result<KerasModel<L>> {
    check_slot("features", input_spec.features(), net.input_dim())?;
    check_slot("labels", input_spec.labels(), net.output_dim())?;

    if loss_fn.name() == NUM_EXAMPLES {
        return Err(MlErr::ModelConstruction(format!(
            "the loss cannot be named `{NUM_EXAMPLES}`"
        )));
    }

    let loss = MeanMetric::new(loss_fn.name());
    let num_examples = SumMetric::new(NUM_EXAMPLES, DType::I64);
    let local = loss
        .variables()
        .into_iter()
        .chain(num_examples.variables())
        .collect();

    let model = KerasModel {
        trainable: net.trainable_variables(),
        non_trainable: net.non_trainable_variables(),
        local,
        net,
        loss_fn,
        input_spec,
        loss,
        num_examples,
    };

    debug!(
        trainable = model.trainable.len(),
        non_trainable = model.non_trainable.len();
        "wrapped sequential network"
    );
    Ok(model)
}

fn check_slot(what: &str, ty: &Type, width: usize) -> Result<()> {
    let fits = ty.as_tensor().is_some_and(|t| {
        t.dtype == DType::F32 && t.shape.rank() == 2 && t.shape.dims()[1] == Some(width)
    });

    if !fits {
        return Err(MlErr::ModelConstruction(format!(
            "the {what} must be float32[?,{width}], got {ty}"
        )));
    }

    Ok(())
}

impl<L: LossFn> KerasModel<L> {
    pub fn net(&self) -> &Sequential {
        &self.net
    }

    /// Zeroes every metric.
    pub fn reset_metrics(&self) {
        self.metrics().iter().for_each(|m| m.reset());
    }

    fn metrics(&self) -> [&dyn Metric; 2] {
        [&self.loss, &self.num_examples]
    }
}

impl<L: LossFn> Model for KerasModel<L> {
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

    fn forward_pass(&self, batch: &Batch, training: bool) -> Result<BatchOutput> {
        self.input_spec.check_batch(batch)?;

        let x = value_as_matrix(&batch.x, "features")?;
        let y = value_as_matrix(&batch.y, "labels")?;
        // the running statistics are weights, a forward pass must not move them
        let mode = if training { Mode::Frozen } else { Mode::Inference };
        let predictions = self.net.forward(x, mode)?;
        let num_examples = predictions.nrows();

        let loss = self.loss_fn.loss(predictions.view(), y);
        self.loss.update(loss, num_examples as f32)?;
        self.num_examples.update(&Tensor::from(num_examples as i64))?;

        Ok(BatchOutput::new(
            Some(loss),
            Some(Tensor::from(predictions.into_dyn())),
            Some(num_examples),
        ))
    }

    fn predict_on_batch(&self, x: &Value, training: bool) -> Result<Tensor> {
        self.input_spec.check_features(x)?;
        let x = value_as_matrix(x, "features")?;
        let mode = if training { Mode::Training } else { Mode::Inference };
        Ok(Tensor::from(self.net.forward(x, mode)?.into_dyn()))
    }

    fn report_local_outputs(&self) -> Result<Value> {
        Ok(Value::named([
            (self.loss.name(), Value::from(Tensor::from(self.loss.result()?))),
            (NUM_EXAMPLES, Value::from(self.num_examples.result())),
        ]))
    }

    fn federated_output_computation(&self) -> Option<FederatedOutputComputation> {
        Some(FederatedOutputComputation::from_leaves([
            (
                self.loss.name(),
                Aggregation::WeightedMean {
                    weight: NUM_EXAMPLES.to_string(),
                },
            ),
            (NUM_EXAMPLES, Aggregation::Sum),
        ]))
    }

    fn report_local_unfinalized_metrics(&self) -> Result<Struct<Value>> {
        Ok(Struct::named(
            self.metrics().map(|m| (m.name().to_string(), m.unfinalized())),
        ))
    }

    fn metric_finalizers(&self) -> MetricFinalizers {
        Struct::named(self.metrics().map(|m| (m.name().to_string(), m.finalizer())))
    }
}
