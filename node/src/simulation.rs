//! A federated evaluation of a linear regression across simulated clients.

use anyhow::{Context, Result, anyhow};
use execution::{ExecutionErr, HostValue, RetryableError, is_retryable_error, unwrap};
use fed_core::{DType, Struct, Tensor, Value};
use learning::{
    Batch, Model, ModelWeights, graph, metrics::sum_then_finalize, models::LinearRegression,
};
use log::{debug, info, warn};
use ndarray::{Array2, ArrayD, Axis};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::task::JoinError;

use crate::config::NodeConfig;

/// The server side results of an evaluation round.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// How many clients reported back.
    pub participants: usize,
    /// The aggregated local outputs.
    pub outputs: HostValue,
    /// The finalized metrics.
    pub metrics: HostValue,
}

struct ClientReport {
    outputs: Value,
    metrics: Struct<Value>,
}

/// Evaluates freshly initialized server weights on every client and aggregates the results.
///
/// Each client builds its own model inside a construction scope on a blocking task, loads
/// the broadcast weights and runs inference over its local data. Failed clients are left
/// out of the aggregation.
///
/// # Errors
/// Fails if the server model cannot be built or no client reports back.
pub async fn evaluate(config: &NodeConfig) -> Result<Report> {
    let seed = config.seed.unwrap_or_else(|| rand::rng().random());
    let mut rng = StdRng::seed_from_u64(seed);
    let dim = config.feature_dim.get();

    let server = LinearRegression::new(dim)?;
    let broadcast = ModelWeights::new(
        vec![random_tensor(&mut rng, &[dim, 1]), random_tensor(&mut rng, &[1])],
        vec![Tensor::zeros(DType::F32, &[1])],
    );
    broadcast.assign_weights_to(&server)?;

    info!(
        seed = seed,
        clients = config.clients.get(),
        parameters = dim + 1;
        "starting federated evaluation"
    );

    let handles: Vec<_> = (0..config.clients.get())
        .map(|id| {
            let weights = broadcast.clone();
            let config = config.clone();
            let client_seed = seed.wrapping_add(id as u64 + 1);
            tokio::task::spawn_blocking(move || run_client(id, &weights, &config, client_seed))
        })
        .collect();

    let mut outputs = Vec::with_capacity(handles.len());
    let mut metrics = Vec::with_capacity(handles.len());
    for (id, handle) in handles.into_iter().enumerate() {
        match client_outcome(handle.await) {
            Ok(report) => {
                outputs.push(report.outputs);
                metrics.push(report.metrics);
            }
            Err(e) => {
                warn!(client = id, retryable = is_retryable_error(&e); "client dropped: {e}");
            }
        }
    }

    if outputs.is_empty() {
        return Err(anyhow!("no client reported back"));
    }

    let computation = server
        .federated_output_computation()
        .context("the model has no federated output computation")?;
    let aggregated = computation.aggregate(&outputs)?;
    let finalized = sum_then_finalize(&metrics, &server.metric_finalizers())?;

    let report = Report {
        participants: outputs.len(),
        outputs: unwrap(aggregated),
        metrics: unwrap(Value::Struct(finalized)),
    };

    info!(participants = report.participants; "federated evaluation done");
    Ok(report)
}

/// Classifies how a client task ended.
///
/// A cancelled task may be run again, a model error or a panic may not.
fn client_outcome<T>(
    joined: std::result::Result<learning::Result<T>, JoinError>,
) -> std::result::Result<T, ExecutionErr> {
    match joined {
        Ok(Ok(report)) => Ok(report),
        Ok(Err(e)) => Err(ExecutionErr::Fatal(e.to_string())),
        Err(e) if e.is_cancelled() => Err(RetryableError::new(e.to_string()).into()),
        Err(e) => Err(ExecutionErr::Fatal(format!("client task panicked: {e}"))),
    }
}

fn run_client(
    id: usize,
    weights: &ModelWeights<Tensor>,
    config: &NodeConfig,
    seed: u64,
) -> learning::Result<ClientReport> {
    graph::scoped(|| -> learning::Result<ClientReport> {
        let model = LinearRegression::new(config.feature_dim.get())?;
        weights.assign_weights_to(&model)?;

        let mut rng = StdRng::seed_from_u64(seed);
        let mut remaining = config.examples_per_client.get();
        while remaining > 0 {
            let rows = remaining.min(config.batch_size.get());
            model.forward_pass(&client_batch(&mut rng, rows, model.feature_dim()), false)?;
            remaining -= rows;
        }

        debug!(client = id; "client evaluated its data");
        Ok(ClientReport {
            outputs: model.report_local_outputs()?,
            metrics: model.report_local_unfinalized_metrics()?,
        })
    })
}

fn random_tensor<R: Rng>(rng: &mut R, shape: &[usize]) -> Tensor {
    let values = ArrayD::from_shape_fn(shape, |_| rng.random_range(-1.0f32..1.0));
    Tensor::from(values)
}

/// A batch whose labels are the sum of the features plus noise.
fn client_batch<R: Rng>(rng: &mut R, rows: usize, dim: usize) -> Batch {
    let x = Array2::from_shape_fn((rows, dim), |_| rng.random_range(-1.0f32..1.0));
    let y = x
        .sum_axis(Axis(1))
        .mapv(|v| v + rng.random_range(-0.1f32..0.1))
        .insert_axis(Axis(1));

    Batch::new(Tensor::from(x.into_dyn()), Tensor::from(y.into_dyn()))
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;

    fn config(clients: usize, examples: usize) -> NodeConfig {
        NodeConfig {
            clients: NonZeroUsize::new(clients).unwrap(),
            examples_per_client: NonZeroUsize::new(examples).unwrap(),
            seed: Some(42),
            ..NodeConfig::default()
        }
    }

    fn field<'a>(value: &'a HostValue, name: &str) -> &'a HostValue {
        let HostValue::Struct(s) = value else {
            panic!("expected a structure");
        };
        s.get(name).unwrap()
    }

    #[tokio::test]
    async fn every_client_is_aggregated() {
        let report = evaluate(&config(3, 10)).await.unwrap();

        assert_eq!(report.participants, 3);
        assert_eq!(field(&report.outputs, "num_examples"), &HostValue::I64(30));
        // 10 examples in batches of 16 is a single batch per client
        assert_eq!(field(&report.outputs, "num_batches"), &HostValue::I64(3));
        assert_eq!(field(&report.metrics, "num_examples"), &HostValue::I64(30));

        let loss = field(&report.outputs, "loss").as_f64().unwrap();
        let metric = field(&report.metrics, "loss").as_f64().unwrap();
        assert!((loss - metric).abs() < 1e-4);
    }

    #[tokio::test]
    async fn seeded_runs_repeat() {
        let a = evaluate(&config(2, 20)).await.unwrap();
        let b = evaluate(&config(2, 20)).await.unwrap();

        assert_eq!(a.outputs, b.outputs);
        let loss = |r: &Report| field(&r.metrics, "loss").as_f64().unwrap();
        assert!((loss(&a) - loss(&b)).abs() < 1e-5);
    }

    #[tokio::test]
    async fn failed_clients_are_classified() {
        let cancelled = tokio::spawn(std::future::pending::<learning::Result<()>>());
        cancelled.abort();
        let err = client_outcome(cancelled.await).unwrap_err();
        assert!(is_retryable_error(&err));

        let panicked = tokio::task::spawn_blocking(|| -> learning::Result<()> {
            panic!("client crashed");
        });
        let err = client_outcome(panicked.await).unwrap_err();
        assert!(matches!(err, ExecutionErr::Fatal(_)));
        assert!(!is_retryable_error(&err));

        let failed = Ok(LinearRegression::new(0).map(|_| ()));
        let err = client_outcome(failed).unwrap_err();
        assert!(matches!(err, ExecutionErr::Fatal(_)));
    }

    #[test]
    fn clients_leave_no_graph_residue() {
        graph::reset_default_graph();
        let weights = ModelWeights::new(
            vec![Tensor::zeros(DType::F32, &[3, 1]), Tensor::zeros(DType::F32, &[1])],
            vec![Tensor::zeros(DType::F32, &[1])],
        );

        run_client(0, &weights, &config(1, 5), 1).unwrap();
        assert_eq!(graph::default_graph_variable_count(), 0);
    }
}
