//! Parallel file processing using Rayon.
//!
//! # Design
//!
//! - `WorkerScaler` picks the pool size: a user override, or CPU count
//!   times two clamped to [1, 16], never more than there are files
//! - `ParallelExecutor` runs one task per file on a dedicated pool and
//!   collects results in input order
//! - Progress is reported via `ProgressReporter` callback

use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Configuration for worker scaling.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Minimum number of workers
    pub min_workers: usize,
    /// Maximum number of auto-scaled workers
    pub max_workers: usize,
    /// Workers per CPU when auto-scaling
    pub per_cpu: usize,
    /// User override for worker count (takes precedence)
    pub user_override: Option<usize>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            min_workers: 1,
            max_workers: 16,
            per_cpu: 2,
            user_override: None,
        }
    }
}

/// Calculates the worker count from system resources and file count.
#[derive(Debug)]
pub struct WorkerScaler {
    config: WorkerConfig,
}

impl WorkerScaler {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    /// Scaler honoring an optional user override.
    pub fn with_override(user_override: Option<usize>) -> Self {
        Self::new(WorkerConfig {
            user_override,
            ..WorkerConfig::default()
        })
    }

    /// Worker count for `file_count` files on this machine.
    pub fn calculate_workers(&self, file_count: usize) -> usize {
        let cpu_count = std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(4);
        self.calculate_for_cpus(file_count, cpu_count)
    }

    fn calculate_for_cpus(&self, file_count: usize, cpu_count: usize) -> usize {
        // Provider calls are I/O bound, so the user may go past the CPU bound
        let wanted = match self.config.user_override {
            Some(count) => count.max(1),
            None => (cpu_count * self.config.per_cpu)
                .clamp(self.config.min_workers.max(1), self.config.max_workers.max(1)),
        };
        wanted.min(file_count.max(1))
    }
}

/// Progress reporter for parallel processing.
///
/// Thread-safe progress tracking using atomic operations.
pub struct ProgressReporter {
    completed: Arc<AtomicUsize>,
    total: usize,
    callback: Option<Box<dyn Fn(usize, usize) + Send + Sync>>,
}

impl ProgressReporter {
    pub fn new(total: usize) -> Self {
        Self {
            completed: Arc::new(AtomicUsize::new(0)),
            total,
            callback: None,
        }
    }

    /// Create a progress reporter with a callback receiving (completed, total).
    pub fn with_callback<F>(total: usize, callback: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        Self {
            completed: Arc::new(AtomicUsize::new(0)),
            total,
            callback: Some(Box::new(callback)),
        }
    }

    /// Report that one more item has completed.
    ///
    /// Returns the new count of completed items.
    pub fn report_progress(&self) -> usize {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(ref callback) = self.callback {
            callback(completed, self.total);
        }

        completed
    }

    /// Get current progress (completed, total).
    pub fn get_progress(&self) -> (usize, usize) {
        (self.completed.load(Ordering::SeqCst), self.total)
    }
}

/// Runs one task per item on a bounded pool.
pub struct ParallelExecutor {
    worker_count: usize,
}

impl ParallelExecutor {
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count: worker_count.max(1),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Apply `task` to every item, returning results in input order.
    ///
    /// A single worker or a single item runs on the calling thread.
    pub fn execute<T, R, F>(&self, items: Vec<T>, progress: &ProgressReporter, task: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        if items.len() <= 1 || self.worker_count == 1 {
            return run_sequential(items, progress, &task);
        }

        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_count)
            .thread_name(|i| format!("codelens-worker-{}", i))
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create thread pool, processing sequentially");
                return run_sequential(items, progress, &task);
            }
        };

        pool.install(|| {
            items
                .into_par_iter()
                .map(|item| {
                    let result = task(item);
                    progress.report_progress();
                    result
                })
                .collect()
        })
    }
}

fn run_sequential<T, R, F>(items: Vec<T>, progress: &ProgressReporter, task: &F) -> Vec<R>
where
    F: Fn(T) -> R,
{
    items
        .into_iter()
        .map(|item| {
            let result = task(item);
            progress.report_progress();
            result
        })
        .collect()
}
