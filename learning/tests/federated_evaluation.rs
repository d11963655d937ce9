use fed_core::{Tensor, Value, type_from_tensors};
use learning::{
    Batch, Model, ModelWeights, graph, metrics::sum_then_finalize, models::LinearRegression,
};
use ndarray::array;

fn client_batch(scale: f32, rows: usize) -> Batch {
    let x = ndarray::Array2::from_shape_fn((rows, 2), |(i, j)| scale * (i + j) as f32);
    let y = ndarray::Array2::from_elem((rows, 1), scale);
    Batch::new(Tensor::from(x.into_dyn()), Tensor::from(y.into_dyn()))
}

#[test]
fn clients_evaluate_broadcast_weights() {
    let server = LinearRegression::new(2).unwrap();
    ModelWeights::new(
        vec![
            Tensor::from(array![[0.5f32], [0.5]].into_dyn()),
            Tensor::from(array![0.0f32].into_dyn()),
        ],
        vec![Tensor::from(array![1.0f32].into_dyn())],
    )
    .assign_weights_to(&server)
    .unwrap();

    let broadcast = ModelWeights::from_model(&server).snapshot();

    let mut outputs = Vec::new();
    let mut metrics = Vec::new();
    let mut per_client_loss = Vec::new();
    for (scale, rows) in [(1.0, 2), (2.0, 3), (0.5, 5)] {
        let client = graph::scoped(|| LinearRegression::new(2)).unwrap();
        broadcast.assign_weights_to(&client).unwrap();

        let out = client.forward_pass(&client_batch(scale, rows), false).unwrap();
        per_client_loss.push((out.loss().unwrap(), rows));
        outputs.push(client.report_local_outputs().unwrap());
        metrics.push(client.report_local_unfinalized_metrics().unwrap());
    }

    let computation = server.federated_output_computation().unwrap();
    let signature = computation
        .type_signature(&type_from_tensors(&outputs[0]))
        .unwrap();
    assert!(signature.parameter.contains_federated());

    let aggregated = computation.aggregate(&outputs).unwrap();
    assert_eq!(
        aggregated.field("num_examples").unwrap(),
        &Value::from(Tensor::from(10i64))
    );
    assert_eq!(
        aggregated.field("num_batches").unwrap(),
        &Value::from(Tensor::from(3i64))
    );

    let total: f32 = per_client_loss.iter().map(|(l, n)| l * *n as f32).sum();
    let expected = total / 10.0;
    let loss = aggregated.field("loss").unwrap().as_tensor().unwrap();
    assert!((loss.scalar_f64().unwrap() as f32 - expected).abs() < 1e-5);

    let finalized = sum_then_finalize(&metrics, &server.metric_finalizers()).unwrap();
    let finalized_loss = finalized.get("loss").unwrap().as_tensor().unwrap();
    assert!((finalized_loss.scalar_f64().unwrap() as f32 - expected).abs() < 1e-5);
    assert_eq!(
        finalized.get("num_examples"),
        Some(&Value::from(Tensor::from(10i64)))
    );
}
