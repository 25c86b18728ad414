//! Worker pool configuration for per-file fan-out
//!
//! Each split run owns a local Rayon pool instead of configuring the global
//! one, so several runs (or tests) in one process do not interfere.

use crate::errors::{Result, SplitError};
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Configuration for parallel processing
#[derive(Debug, Clone, Default)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    pub fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
        }
    }

    /// Worker count: the configured value, or one per CPU core
    pub fn threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Builds a dedicated pool with [`Self::threads`] workers
    pub fn build_pool(&self) -> Result<ThreadPool> {
        let threads = self.threads();
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("split-worker-{}", i))
            .build()
            .map_err(|e| {
                SplitError::ThreadPool(format!(
                    "Failed to initialize thread pool with {} threads: {}",
                    threads, e
                ))
            })
    }
}

/// Get information about the parallel processing environment
pub fn get_parallel_info() -> ParallelInfo {
    ParallelInfo {
        available_cores: num_cpus::get(),
        available_parallelism: std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(1),
    }
}

/// Information about the parallel processing environment
#[derive(Debug, Clone)]
pub struct ParallelInfo {
    pub available_cores: usize,
    pub available_parallelism: usize,
}
