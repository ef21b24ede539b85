//! # Application State Management
//!
//! This module holds the state shared by every HTTP request handler: the loaded
//! configuration and the process-wide metrics.
//!
//! ## Key Rust Concepts:
//!
//! ### Arc (Atomically Reference Counted)
//! - **Purpose**: Allows multiple parts of the program to safely share ownership of data
//! - **Why needed**: actix-web runs one App instance per worker thread, and each
//!   instance gets its own clone of `AppState`. The clones must point at the same data.
//!
//! ### RwLock (Reader-Writer Lock)
//! - **Purpose**: Allows multiple readers OR one writer at a time
//! - **Used for**: Metrics only. The configuration never changes after startup,
//!   so it sits behind a plain `Arc` and needs no lock at all.
//!
//! ## Lock poisoning:
//! A panic while holding the metrics lock would poison it. Counters are still
//! meaningful after such a panic, so the accessors recover the guard instead of
//! propagating the poison to every later request.

use crate::audio::{CombinationOutcome, TargetFormat};
use crate::config::AppConfig;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

/// The main application state that's shared across all HTTP request handlers.
///
/// ## Rust Concepts:
/// - **#[derive(Debug, Clone)]**: Cloning only bumps the `Arc` reference counts
/// - **Instant**: A point in time (for measuring uptime)
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration, read-only after startup
    pub config: Arc<AppConfig>,

    /// Performance metrics, updated by the middleware and the convert handler
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started. Instant is Copy, so no Arc needed.
    pub start_time: Instant,
}

/// Metrics collected across all HTTP requests.
///
/// ## Why these metrics matter:
/// - **request_count / error_count**: Load and reliability at a glance
/// - **endpoint_metrics**: Per-endpoint latency and error rate
/// - **conversion_metrics**: Per-combination encode results. Failed encodes are
///   dropped from the response, so this is the only place they show up besides the logs.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of 4xx/5xx responses since server start
    pub error_count: u64,

    /// Key: endpoint name (e.g., "POST /convert")
    pub endpoint_metrics: HashMap<String, EndpointMetric>,

    /// Key: combination name (e.g., "mp3@16")
    pub conversion_metrics: HashMap<String, ConversionMetric>,
}

/// Detailed performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,

    /// Total time spent processing all requests to this endpoint (milliseconds)
    pub total_duration_ms: u64,

    pub error_count: u64,
}

/// Outcome counters for one format/depth combination.
#[derive(Debug, Default, Clone)]
pub struct ConversionMetric {
    pub succeeded: u64,
    pub failed: u64,

    /// Total bytes of encoded output produced
    pub output_bytes: u64,
}

impl AppState {
    /// Create a new AppState with the given configuration.
    ///
    /// ## What this does:
    /// 1. Wraps the config in an Arc for cheap sharing between workers
    /// 2. Creates empty metrics behind Arc<RwLock<>>
    /// 3. Records the current time as the server start time
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// Borrow the configuration. No lock, it is immutable.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn read_metrics(&self) -> RwLockReadGuard<'_, AppMetrics> {
        self.metrics.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_metrics(&self) -> RwLockWriteGuard<'_, AppMetrics> {
        self.metrics.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        self.write_metrics().request_count += 1;
    }

    /// Increment the total error counter (any 4xx or 5xx response).
    pub fn increment_error_count(&self) {
        self.write_metrics().error_count += 1;
    }

    /// Record detailed metrics for a specific endpoint.
    ///
    /// ## Parameters:
    /// - **endpoint**: The API endpoint (e.g., "GET /health", "POST /convert")
    /// - **duration_ms**: How long the request took to process (in milliseconds)
    /// - **is_error**: Whether this request resulted in an error
    ///
    /// ## HashMap operations:
    /// `.entry().or_default()` creates a zeroed metric the first time an endpoint is seen.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.write_metrics();
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Record the outcome of every combination of one conversion request.
    ///
    /// All outcomes are recorded under a single write lock so a `/metrics`
    /// snapshot never sees half a request.
    pub fn record_conversions(&self, outcomes: &[CombinationOutcome]) {
        let mut metrics = self.write_metrics();
        for outcome in outcomes {
            let metric = metrics
                .conversion_metrics
                .entry(outcome.combination.to_string())
                .or_default();
            match &outcome.outcome {
                Ok(bytes) => {
                    metric.succeeded += 1;
                    metric.output_bytes += bytes.len() as u64;
                }
                Err(_) => metric.failed += 1,
            }
        }
    }

    /// Get a snapshot of current metrics (used for the /metrics endpoint).
    ///
    /// ## Why a snapshot:
    /// Cloning releases the read lock before the response is serialized, so
    /// requests updating metrics aren't blocked by a slow client.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.read_metrics().clone()
    }

    /// Get server uptime in seconds. No locking needed: start_time never changes.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Total failed encodes for one output format, across all depths.
    pub fn failed_conversions_for(&self, format: TargetFormat) -> u64 {
        let prefix = format!("{}@", format);
        self.read_metrics()
            .conversion_metrics
            .iter()
            .filter(|(name, _)| name.starts_with(&prefix))
            .map(|(_, metric)| metric.failed)
            .sum()
    }
}

impl EndpointMetric {
    /// Calculate the average response time for this endpoint.
    ///
    /// ## Formula:
    /// Average = Total Duration ÷ Number of Requests (0.0 before the first request)
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error rate as a fraction between 0.0 and 1.0.
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

impl ConversionMetric {
    pub fn attempted(&self) -> u64 {
        self.succeeded + self.failed
    }
}
