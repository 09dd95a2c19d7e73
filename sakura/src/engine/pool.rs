//! Fixed-size worker pool draining the subtree queue.
//!
//! Workers are plain OS threads started with the runtime and joined when it
//! drops. Each loop iteration checks the shutdown flag, waits briefly for
//! work and hands a dequeued object to the interpreter. Blossom handlers may
//! block inside a worker; progress is still guaranteed because spawning
//! threads pump the queue while they wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use super::interpreter::Interpreter;
use super::queue::SubtreeQueue;

/// How long a worker waits for work before rechecking the shutdown flag.
const DEQUEUE_WAIT: Duration = Duration::from_millis(100);

pub(crate) struct WorkerPool {
    shutdown: Arc<AtomicBool>,
    queue: Arc<SubtreeQueue>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `worker_count` named workers, at least one.
    pub fn start(
        worker_count: usize,
        queue: Arc<SubtreeQueue>,
        interpreter: Arc<Interpreter>,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let count = worker_count.max(1);
        debug!(workers = count, "starting worker pool");

        let handles = (0..count)
            .map(|i| {
                let queue = Arc::clone(&queue);
                let interpreter = Arc::clone(&interpreter);
                let shutdown = Arc::clone(&shutdown);
                thread::Builder::new()
                    .name(format!("sakura-worker-{}", i))
                    .spawn(move || worker_loop(queue, interpreter, shutdown))
                    .expect("Failed to spawn sakura worker thread")
            })
            .collect();

        Self {
            shutdown,
            queue,
            handles,
        }
    }
}

fn worker_loop(
    queue: Arc<SubtreeQueue>,
    interpreter: Arc<Interpreter>,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        if let Some(object) = queue.dequeue_timeout(DEQUEUE_WAIT) {
            interpreter.process_object(object);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.queue.notify_all();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        debug!("worker pool stopped");
    }
}
