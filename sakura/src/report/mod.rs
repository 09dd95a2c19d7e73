//! Output sink for executed blossom blocks.
//!
//! The interpreter reports one block per executed blossom or group. Blocks
//! must appear atomically even when several workers print at once, so the
//! console implementation serializes writes under a mutex and prefixes each
//! block with a separator line sized to the terminal width.

use std::io::Write;
use std::sync::Mutex;

/// Widest separator line ever drawn, to keep CI logs readable.
pub const MAX_SEPARATOR_WIDTH: usize = 300;

/// Fallback width when the host does not supply one.
pub const DEFAULT_SEPARATOR_WIDTH: usize = 80;

/// Receives finished output blocks from the interpreter.
///
/// Implementations must be `Send + Sync`; `print` is called concurrently
/// from worker threads and two calls must never interleave their bytes.
pub trait Reporter: Send + Sync {
    fn print(&self, block: &str);
}

/// Writes blocks to stdout, one separator line before each block.
pub struct ConsoleReporter {
    width: usize,
    lock: Mutex<()>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::with_width(DEFAULT_SEPARATOR_WIDTH)
    }

    /// Separator width, clamped to [`MAX_SEPARATOR_WIDTH`].
    pub fn with_width(width: usize) -> Self {
        Self {
            width: width.min(MAX_SEPARATOR_WIDTH).max(1),
            lock: Mutex::new(()),
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for ConsoleReporter {
    fn print(&self, block: &str) {
        let _guard = self.lock.lock().unwrap();
        let separator = "=".repeat(self.width);
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}\n\n{}\n", separator, block);
    }
}

/// Discards all output. Useful for hosts that only care about results.
pub struct NullReporter;

impl Reporter for NullReporter {
    fn print(&self, _block: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_width_is_clamped() {
        let reporter = ConsoleReporter::with_width(10_000);
        assert_eq!(reporter.width, MAX_SEPARATOR_WIDTH);

        let reporter = ConsoleReporter::with_width(0);
        assert_eq!(reporter.width, 1);
    }

    #[test]
    fn test_null_reporter_is_shareable() {
        let reporter: Arc<dyn Reporter> = Arc::new(NullReporter);
        let clone = Arc::clone(&reporter);
        std::thread::spawn(move || clone.print("from thread"))
            .join()
            .unwrap();
        reporter.print("from main");
    }
}
