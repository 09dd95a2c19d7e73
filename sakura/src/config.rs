//! Runtime configuration.

use crate::report::{DEFAULT_SEPARATOR_WIDTH, MAX_SEPARATOR_WIDTH};

/// Default size of the worker pool.
pub const DEFAULT_WORKER_COUNT: usize = 6;

/// Tunables of a [`crate::runtime::SakuraRuntime`].
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of worker threads draining the subtree queue.
    pub workers: usize,
    /// Width of the separator line printed before each output block.
    pub separator_width: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKER_COUNT,
            separator_width: DEFAULT_SEPARATOR_WIDTH,
        }
    }
}

impl RuntimeConfig {
    /// Sets the worker count, keeping at least one worker.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Sets the separator width, clamped to the hard cap.
    pub fn with_separator_width(mut self, width: usize) -> Self {
        self.separator_width = width.min(MAX_SEPARATOR_WIDTH).max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.workers, DEFAULT_WORKER_COUNT);
        assert_eq!(config.separator_width, DEFAULT_SEPARATOR_WIDTH);
    }

    #[test]
    fn test_builder_clamps_values() {
        let config = RuntimeConfig::default()
            .with_workers(0)
            .with_separator_width(10_000);
        assert_eq!(config.workers, 1);
        assert_eq!(config.separator_width, MAX_SEPARATOR_WIDTH);
    }
}
