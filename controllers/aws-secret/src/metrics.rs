//! Prometheus metrics for reconciliations.

use crate::error::ControllerError;
use crate::reconciler::Outcome;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;

/// Reconciliation metrics, registered on their own registry
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    reconciliations: IntCounterVec,
    errors: IntCounterVec,
    duration: Histogram,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create and register all metrics on a fresh registry
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();

        let reconciliations = IntCounterVec::new(
            Opts::new(
                "aws_secret_reconciliations_total",
                "Successful AWSSecret reconciliations by outcome",
            ),
            &["outcome"],
        )?;
        let errors = IntCounterVec::new(
            Opts::new(
                "aws_secret_reconcile_errors_total",
                "Failed AWSSecret reconciliations by error kind",
            ),
            &["kind"],
        )?;
        let duration = Histogram::with_opts(
            HistogramOpts::new(
                "aws_secret_reconcile_duration_seconds",
                "Time taken by one AWSSecret reconciliation",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;

        registry.register(Box::new(reconciliations.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            reconciliations,
            errors,
            duration,
        })
    }

    /// Record one finished reconciliation
    pub fn observe(&self, result: Result<Outcome, &ControllerError>, elapsed: Duration) {
        match result {
            Ok(outcome) => self
                .reconciliations
                .with_label_values(&[outcome.as_str()])
                .inc(),
            Err(err) => self.errors.with_label_values(&[err.kind()]).inc(),
        }
        self.duration.observe(elapsed.as_secs_f64());
    }

    /// Text exposition of all metrics
    pub fn render(&self) -> Result<String, ControllerError> {
        Ok(TextEncoder::new().encode_to_string(&self.registry.gather())?)
    }
}
