use ndarray::ArrayView2;

/// A loss reducing a batch of predictions and labels to a scalar.
pub trait LossFn: Send + Sync {
    /// Name under which the loss is reported as a metric.
    fn name(&self) -> &'static str {
        "loss"
    }

    /// The mean loss over the batch.
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32;
}
