//! Progress tracking and callbacks for registration workflows.
//!
//! Every iteration produces an [`EnergyRecord`]; the tracker stamps it with
//! timing information and fans it out to the registered callbacks.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::IterationPhase;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Energy terms of one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyRecord {
    /// Index of the scale level.
    pub level: usize,
    /// Iteration within the level.
    pub iteration: usize,
    pub phase: IterationPhase,
    /// Intensity mismatch term.
    pub matching: f64,
    /// Velocity penalty term, zero without `sigma_regularization`.
    pub regularization: f64,
}

impl EnergyRecord {
    pub fn total(&self) -> f64 {
        self.matching + self.regularization
    }
}

/// Progress information for registration iterations.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub record: EnergyRecord,
    /// Total number of iterations of the level.
    pub total_iterations: Option<usize>,
    /// Time elapsed since start.
    pub elapsed: Duration,
    /// Estimated remaining time for the level.
    pub estimated_remaining: Option<Duration>,
}

impl ProgressInfo {
    /// Create new progress information.
    pub fn new(record: EnergyRecord, total_iterations: Option<usize>, elapsed: Duration) -> Self {
        Self {
            record,
            total_iterations,
            elapsed,
            estimated_remaining: None,
        }
    }

    /// Calculate progress percentage within the level.
    pub fn progress_percent(&self) -> Option<f64> {
        self.total_iterations
            .filter(|&total| total > 0)
            .map(|total| ((self.record.iteration + 1) as f64 / total as f64) * 100.0)
    }

    /// Calculate estimated remaining time.
    pub fn calculate_remaining(&mut self, level_elapsed: Duration) {
        if let Some(total) = self.total_iterations {
            let done = self.record.iteration + 1;
            let avg_time_per_iter = level_elapsed.as_secs_f64() / done as f64;
            let remaining_iters = total.saturating_sub(done);
            self.estimated_remaining = Some(Duration::from_secs_f64(
                avg_time_per_iter * remaining_iters as f64,
            ));
        }
    }
}

/// Progress callback trait for monitoring registration progress.
pub trait ProgressCallback: Send + Sync {
    /// Called at each iteration with progress information.
    fn on_progress(&self, info: &ProgressInfo);

    /// Called when registration starts.
    fn on_start(&self) {}

    /// Called when a scale level starts.
    fn on_level_start(&self, _level: usize, _shape: &[usize]) {}

    /// Called when registration completes successfully.
    fn on_complete(&self, _elapsed: Duration, _final_record: Option<&EnergyRecord>) {}

    /// Called when registration fails.
    fn on_error(&self, _error: &str) {}
}

/// Console progress callback that logs to tracing.
#[derive(Debug, Clone)]
pub struct ConsoleProgressCallback {
    /// Log interval (iterations).
    pub log_interval: usize,
}

impl Default for ConsoleProgressCallback {
    fn default() -> Self {
        Self { log_interval: 50 }
    }
}

impl ConsoleProgressCallback {
    /// Create a new console progress callback.
    pub fn new(log_interval: usize) -> Self {
        Self {
            log_interval: log_interval.max(1),
        }
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        let record = &info.record;
        let last = info.total_iterations == Some(record.iteration + 1);
        if record.iteration % self.log_interval == 0 || last {
            let remaining = info
                .estimated_remaining
                .map(|d| format!("{:.2}s", d.as_secs_f64()))
                .unwrap_or_else(|| "N/A".to_string());

            tracing::info!(
                "Level {} iter {}/{} ({:.1}%) {:?} | E: {:.6} (match {:.6}, reg {:.6}) | Elapsed: {:.2}s | ETA: {}",
                record.level,
                record.iteration + 1,
                info.total_iterations.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string()),
                info.progress_percent().unwrap_or(0.0),
                record.phase,
                record.total(),
                record.matching,
                record.regularization,
                info.elapsed.as_secs_f64(),
                remaining
            );
        }
    }

    fn on_start(&self) {
        tracing::info!("Registration started");
    }

    fn on_level_start(&self, level: usize, shape: &[usize]) {
        tracing::info!("Starting level {} with grid {:?}", level, shape);
    }

    fn on_complete(&self, elapsed: Duration, final_record: Option<&EnergyRecord>) {
        match final_record {
            Some(record) => tracing::info!(
                "Registration completed in {:.2}s with final energy: {:.6}",
                elapsed.as_secs_f64(),
                record.total()
            ),
            None => tracing::info!("Registration completed in {:.2}s", elapsed.as_secs_f64()),
        }
    }

    fn on_error(&self, error: &str) {
        tracing::error!("Registration failed: {}", error);
    }
}

/// History callback that records all progress information.
#[derive(Debug, Clone, Default)]
pub struct HistoryCallback {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl HistoryCallback {
    /// Create a new history callback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the recorded history.
    pub fn get_history(&self) -> Vec<ProgressInfo> {
        lock(&self.history).clone()
    }

    /// Clear the history.
    pub fn clear(&self) {
        lock(&self.history).clear();
    }
}

impl ProgressCallback for HistoryCallback {
    fn on_progress(&self, info: &ProgressInfo) {
        lock(&self.history).push(info.clone());
    }
}

/// Progress tracker that manages multiple callbacks.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    callbacks: Vec<Arc<dyn ProgressCallback>>,
    start_time: Arc<Mutex<Option<Instant>>>,
    level_start: Arc<Mutex<Option<Instant>>>,
}

impl ProgressTracker {
    /// Create a new progress tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callback.
    pub fn add_callback(&mut self, callback: Arc<dyn ProgressCallback>) {
        self.callbacks.push(callback);
    }

    /// Add a callback, builder style.
    pub fn with_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.add_callback(callback);
        self
    }

    /// Start tracking.
    pub fn start(&self) {
        *lock(&self.start_time) = Some(Instant::now());
        for callback in &self.callbacks {
            callback.on_start();
        }
    }

    /// Mark the start of a scale level.
    pub fn start_level(&self, level: usize, shape: &[usize]) {
        *lock(&self.level_start) = Some(Instant::now());
        for callback in &self.callbacks {
            callback.on_level_start(level, shape);
        }
    }

    fn elapsed(&self) -> Duration {
        lock(&self.start_time).map(|t| t.elapsed()).unwrap_or(Duration::ZERO)
    }

    /// Report one iteration.
    pub fn update(&self, record: EnergyRecord, total_iterations: Option<usize>) {
        if self.callbacks.is_empty() {
            return;
        }
        let level_elapsed = lock(&self.level_start)
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO);
        let mut info = ProgressInfo::new(record, total_iterations, self.elapsed());
        info.calculate_remaining(level_elapsed);

        for callback in &self.callbacks {
            callback.on_progress(&info);
        }
    }

    /// Complete tracking.
    pub fn complete(&self, final_record: Option<&EnergyRecord>) {
        let elapsed = self.elapsed();
        for callback in &self.callbacks {
            callback.on_complete(elapsed, final_record);
        }
    }

    /// Report error.
    pub fn error(&self, error: &str) {
        for callback in &self.callbacks {
            callback.on_error(error);
        }
    }
}
