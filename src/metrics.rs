//! Performance metrics and statistics tracking for the prediction service.

use crate::types::prediction::PredictionResult;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for the inference service
pub struct PredictionMetrics {
    /// Total single-model predictions served
    pub predictions_served: AtomicU64,
    /// Total multi-model comparisons served
    pub comparisons_served: AtomicU64,
    /// Predictions classified parasitized
    pub parasitized_detected: AtomicU64,
    /// Per-model inference times (in microseconds)
    model_times: RwLock<HashMap<String, Vec<u64>>>,
    /// Model agreement percentages from comparison calls
    agreements: RwLock<Vec<f64>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PredictionMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            predictions_served: AtomicU64::new(0),
            comparisons_served: AtomicU64::new(0),
            parasitized_detected: AtomicU64::new(0),
            model_times: RwLock::new(HashMap::new()),
            agreements: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a served single-model prediction
    pub fn record_prediction(&self, result: &PredictionResult) {
        self.predictions_served.fetch_add(1, Ordering::Relaxed);
        if result.is_parasitized {
            self.parasitized_detected.fetch_add(1, Ordering::Relaxed);
        }
        self.record_model_time(
            &result.model_id,
            Duration::from_secs_f64(result.inference_time_ms / 1000.0),
        );
    }

    /// Record a served multi-model comparison
    pub fn record_comparison(&self, per_model: &[PredictionResult], agreement_percentage: f64) {
        self.comparisons_served.fetch_add(1, Ordering::Relaxed);
        for result in per_model {
            self.record_model_time(
                &result.model_id,
                Duration::from_secs_f64(result.inference_time_ms / 1000.0),
            );
        }

        if let Ok(mut agreements) = self.agreements.write() {
            agreements.push(agreement_percentage);
            if agreements.len() > 1000 {
                agreements.drain(0..500);
            }
        }
    }

    /// Record one model's inference time
    fn record_model_time(&self, model_id: &str, duration: Duration) {
        if let Ok(mut times) = self.model_times.write() {
            let model_times = times.entry(model_id.to_string()).or_default();
            model_times.push(duration.as_micros() as u64);
            // Keep only last 1000 per model
            if model_times.len() > 1000 {
                model_times.drain(0..500);
            }
        }
    }

    /// Get per-model inference statistics
    pub fn get_model_stats(&self) -> HashMap<String, ModelStats> {
        let Ok(times) = self.model_times.read() else {
            return HashMap::new();
        };
        let mut stats = HashMap::new();

        for (model, model_times) in times.iter() {
            if model_times.is_empty() {
                continue;
            }

            let mut sorted: Vec<u64> = model_times.clone();
            sorted.sort();

            let sum: u64 = sorted.iter().sum();
            let count = sorted.len();

            stats.insert(
                model.clone(),
                ModelStats {
                    calls: count as u64,
                    mean_us: sum / count as u64,
                    p50_us: sorted[count / 2],
                    p99_us: sorted[(count as f64 * 0.99) as usize],
                },
            );
        }

        stats
    }

    /// Get average model agreement across comparison calls
    pub fn get_avg_agreement(&self) -> f64 {
        let Ok(agreements) = self.agreements.read() else {
            return 0.0;
        };
        if agreements.is_empty() {
            return 0.0;
        }
        agreements.iter().sum::<f64>() / agreements.len() as f64
    }

    /// Get current throughput (predictions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions_served.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let predictions = self.predictions_served.load(Ordering::Relaxed);
        let comparisons = self.comparisons_served.load(Ordering::Relaxed);
        let parasitized = self.parasitized_detected.load(Ordering::Relaxed);
        let positive_rate = if predictions > 0 {
            parasitized as f64 / predictions as f64 * 100.0
        } else {
            0.0
        };

        info!(
            predictions,
            comparisons,
            parasitized,
            positive_rate = format!("{positive_rate:.1}%"),
            throughput = format!("{:.2}/s", self.get_throughput()),
            avg_agreement = format!("{:.1}%", self.get_avg_agreement()),
            "Metrics summary"
        );

        for (model, stats) in self.get_model_stats() {
            info!(
                model = %model,
                calls = stats.calls,
                mean_us = stats.mean_us,
                p50_us = stats.p50_us,
                p99_us = stats.p99_us,
                "Model inference times"
            );
        }
    }
}

impl Default for PredictionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Model-specific inference statistics
#[derive(Debug)]
pub struct ModelStats {
    pub calls: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p99_us: u64,
}

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: std::sync::Arc<PredictionMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: std::sync::Arc<PredictionMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
