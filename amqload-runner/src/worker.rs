//! Worker scheduling for a load-test run.
//!
//! Many independent workers run in parallel, each owning one sampler
//! (and through it one channel); the connection manager is the shared
//! singleton they all draw channels from. A failed sample is recorded
//! and the worker moves on: setup failures surface as failed samples,
//! never as crashed siblings. The manager is shut down exactly once,
//! after every worker has finished.

use crate::report::Report;
use amqload_client::{ConnectionManager, ConsumeSampler, PublishSampler, Sample, Sampler};
use amqload_core::config::SampleMode;
use amqload_core::{LoadTestConfig, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::warn;

/// Drive the configured workload to completion and aggregate the results.
///
/// # Errors
/// Infallible in the current shape (per-sample failures are folded into
/// the report); kept fallible for the caller's composition with config
/// loading.
pub async fn run(config: LoadTestConfig) -> Result<Report> {
    let manager = Arc::new(ConnectionManager::new(config.broker.clone()));
    let (sample_tx, mut sample_rx) = mpsc::unbounded_channel();
    let started = Instant::now();

    let workers = config.run.workers.max(1);
    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let sampler = build_sampler(&config, &manager);
        let sample_tx = sample_tx.clone();
        let iterations = config.run.iterations;
        handles.push(tokio::spawn(drive_worker(worker_id, sampler, iterations, sample_tx)));
    }
    drop(sample_tx);

    let mut samples = Vec::new();
    while let Some(sample) = sample_rx.recv().await {
        samples.push(sample);
    }
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "worker task panicked");
        }
    }

    // Worker channels are gone with their samplers; one connection close
    // cascades over anything left.
    manager.shutdown().await;

    Ok(Report::from_samples(&samples, started.elapsed()))
}

fn build_sampler(config: &LoadTestConfig, manager: &Arc<ConnectionManager>) -> Sampler {
    match config.run.mode {
        SampleMode::Publish => Sampler::Publish(PublishSampler::new(
            Arc::clone(manager),
            config.topology.clone(),
            config.run.payload_bytes,
        )),
        SampleMode::Consume => {
            Sampler::Consume(ConsumeSampler::new(Arc::clone(manager), config.topology.clone()))
        }
    }
}

async fn drive_worker(
    worker_id: usize,
    mut sampler: Sampler,
    iterations: u64,
    sample_tx: mpsc::UnboundedSender<Sample>,
) {
    for iteration in 0..iterations {
        let sample = match sampler.sample().await {
            Ok(sample) => sample,
            Err(e) => {
                warn!(worker_id, iteration, error = %e, "sample failed");
                Sample { elapsed: Duration::ZERO, bytes: 0, error: Some(e.to_string()) }
            }
        };
        if sample_tx.send(sample).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amqload_core::config::RunSettings;

    // Runs against no broker: every sample fails to connect, but the run
    // itself completes, every iteration is accounted for, and shutdown on
    // the never-connected manager is a no-op.
    #[tokio::test]
    async fn workers_survive_connection_failures() {
        let config = LoadTestConfig {
            broker: amqload_core::BrokerSettings {
                // Unroutable per RFC 5737; connect attempts fail fast or
                // time out within the configured 100ms.
                hosts: "192.0.2.1".into(),
                timeout_ms: 100,
                ..Default::default()
            },
            run: RunSettings { workers: 2, iterations: 3, ..Default::default() },
            ..Default::default()
        };

        let report = run(config).await.unwrap();
        assert_eq!(report.total, 6);
        assert_eq!(report.failed, 6);
    }
}
