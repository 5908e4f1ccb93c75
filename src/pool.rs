//! Shared concurrency primitives used by both scan phases.
//!
//! [`WorkerPool`] is a bounded set of reusable threads with fork/join
//! semantics: every unit of work spawned inside [`WorkerPool::scope`] has
//! finished by the time `scope` returns, and a thread blocked on the join
//! executes queued work instead of idling. [`Collector`] is the append-only,
//! lock-guarded list the workers report into.

use rayon::{Scope, ThreadPool, ThreadPoolBuilder};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::error::Result;

/// Bounded pool of worker threads
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// Build a pool with `threads` workers, or one per available core when unset
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let threads = threads
            .filter(|n| *n > 0)
            .unwrap_or_else(default_parallelism);

        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("gitsweep-worker-{}", i))
            .build()?;

        debug!("Worker pool started with {} threads", threads);
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `op` and block until everything it spawned has completed
    pub fn scope<'scope, OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce(&Scope<'scope>) -> R + Send,
        R: Send,
    {
        self.pool.scope(op)
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Append-only list shared between workers.
///
/// Insertion order follows lock acquisition and carries no meaning.
#[derive(Debug)]
pub struct Collector<T> {
    items: Mutex<Vec<T>>,
}

impl<T> Collector<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn push(&self, item: T) {
        // A panicking worker cannot leave a half-pushed Vec behind.
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item);
    }

    /// Take ownership of everything collected
    pub fn into_inner(self) -> Vec<T> {
        self.items
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for Collector<T> {
    fn default() -> Self {
        Self::new()
    }
}
