// Copyright 2026 The parbatch developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A pooled executor for batch jobs, and the process-wide default pool.

use crate::error::RejectedError;
use crate::macros::{log_debug, log_error, log_warn};
use crate::util::{Job, Status};
use crossbeam_utils::CachePadded;
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;

/// Hard cap on the default pool size, to avoid oversubscription on very
/// large machines.
const MAX_DEFAULT_POOL_SIZE: usize = 100;

/// Number of worker threads to spawn in an executor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadCount {
    /// Spawn [`default_max_pool_size()`] threads.
    Default,
    /// Spawn the number of threads returned by
    /// [`std::thread::available_parallelism()`].
    AvailableParallelism,
    /// Spawn the given number of threads.
    Count(NonZeroUsize),
}

impl TryFrom<usize> for ThreadCount {
    type Error = <NonZeroUsize as TryFrom<usize>>::Error;

    fn try_from(thread_count: usize) -> Result<Self, Self::Error> {
        let count = NonZeroUsize::try_from(thread_count)?;
        Ok(ThreadCount::Count(count))
    }
}

/// Returns the pool size used by [`ThreadCount::Default`]: the available
/// parallelism plus one, capped at 100 threads.
pub fn default_max_pool_size() -> usize {
    let parallelism: usize = std::thread::available_parallelism()
        .expect("Getting the available parallelism failed")
        .into();
    (parallelism + 1).min(MAX_DEFAULT_POOL_SIZE)
}

/// A builder for [`Executor`].
pub struct ExecutorBuilder {
    /// Number of worker threads to spawn in the pool.
    pub num_threads: ThreadCount,
    /// Base name given to the pool's worker threads.
    pub name: String,
}

impl Default for ExecutorBuilder {
    fn default() -> Self {
        Self {
            num_threads: ThreadCount::Default,
            name: "parbatch".to_owned(),
        }
    }
}

impl ExecutorBuilder {
    /// Spawns an executor.
    ///
    /// ```
    /// # use parbatch::{ExecutorBuilder, ThreadCount};
    /// let executor = ExecutorBuilder {
    ///     num_threads: ThreadCount::try_from(4).unwrap(),
    ///     name: "my-pool".to_owned(),
    /// }
    /// .build();
    /// assert_eq!(executor.num_threads(), 4);
    /// ```
    pub fn build(&self) -> Executor {
        Executor::new(self)
    }
}

/// State of the shared job queue.
struct QueueState {
    /// Jobs waiting to be picked up by a worker thread.
    jobs: VecDeque<Job>,
    /// Whether the executor was shut down.
    shut_down: bool,
}

/// Context shared between the executor handle and its worker threads.
struct Shared {
    /// Job queue and shutdown flag, guarded by the condition variable the
    /// workers block on.
    queue: Status<QueueState>,
    /// Lock-free mirror of the shutdown flag, for cheap queries.
    shut_down: CachePadded<AtomicBool>,
}

/// A fixed-size pool of worker threads that independent batch jobs are
/// submitted to.
///
/// Every parallel operation accepts an executor; most callers use the
/// shared [`default_executor()`] pool. After [`shutdown()`](Self::shutdown)
/// new submissions are rejected, but jobs already queued still run and the
/// worker threads exit once the queue drains.
pub struct Executor {
    /// Context shared with the worker threads.
    shared: Arc<Shared>,
    /// Handles to the worker threads, joined on drop.
    threads: Vec<JoinHandle<()>>,
}

impl Executor {
    /// Creates a new executor using the given parameters.
    fn new(builder: &ExecutorBuilder) -> Self {
        let num_threads: usize = match builder.num_threads {
            ThreadCount::Default => default_max_pool_size(),
            ThreadCount::AvailableParallelism => std::thread::available_parallelism()
                .expect("Getting the available parallelism failed")
                .into(),
            ThreadCount::Count(count) => count.into(),
        };

        let shared = Arc::new(Shared {
            queue: Status::new(QueueState {
                jobs: VecDeque::new(),
                shut_down: false,
            }),
            shut_down: CachePadded::new(AtomicBool::new(false)),
        });

        let threads = (0..num_threads)
            .map(|id| {
                let shared = shared.clone();
                std::thread::Builder::new()
                    .name(format!("{}-{id}", builder.name))
                    .spawn(move || worker_loop(id, &shared))
                    .expect("Spawning a worker thread failed")
            })
            .collect();
        log_debug!("[executor] Spawned {num_threads} worker threads");

        Self { shared, threads }
    }

    /// Returns the number of worker threads that have been spawned in this
    /// pool.
    pub fn num_threads(&self) -> usize {
        self.threads.len()
    }

    /// Returns whether [`shutdown()`](Self::shutdown) was called.
    pub fn is_shut_down(&self) -> bool {
        self.shared.shut_down.load(Ordering::SeqCst)
    }

    /// Shuts the executor down.
    ///
    /// Subsequent submissions are rejected. Jobs already queued still run;
    /// the worker threads exit once the queue drains.
    pub fn shutdown(&self) {
        log_debug!("[executor] Shutting down");
        self.shared.shut_down.store(true, Ordering::SeqCst);
        self.shared
            .queue
            .update_notify_all(|state| state.shut_down = true);
    }

    /// Submits a job for execution on the pool.
    ///
    /// A rejected job is dropped without running.
    pub(crate) fn submit(&self, job: Job) -> Result<(), RejectedError> {
        self.shared.queue.update_notify_one(|state| {
            if state.shut_down {
                log_warn!("[executor] Rejecting a job submitted after shutdown");
                return Err(RejectedError);
            }
            state.jobs.push_back(job);
            Ok(())
        })
    }
}

impl Drop for Executor {
    /// Shuts down and joins all the worker threads in the pool.
    #[allow(clippy::unused_enumerate_index)]
    fn drop(&mut self) {
        self.shutdown();
        log_debug!("[executor] Joining worker threads...");
        for (_i, t) in self.threads.drain(..).enumerate() {
            let result = t.join();
            match result {
                Ok(_) => log_debug!("[executor] Thread {_i} joined with result: {result:?}"),
                Err(_) => log_error!("[executor] Thread {_i} joined with result: {result:?}"),
            }
        }
        log_debug!("[executor] Joined worker threads.");
    }
}

/// Main function run by each worker thread.
fn worker_loop(_id: usize, shared: &Shared) {
    loop {
        let mut guard = shared
            .queue
            .wait_while(|state| state.jobs.is_empty() && !state.shut_down);
        match guard.jobs.pop_front() {
            Some(job) => {
                drop(guard);
                log_debug!("[worker {_id}] Picked up a job");
                // A panicking job must not take down its worker thread. The
                // batch runner also catches panics, to re-raise them on the
                // calling thread.
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| job.run()));
                if result.is_err() {
                    log_error!("[worker {_id}] A job panicked");
                }
            }
            // Queue drained after shutdown.
            None => break,
        }
    }
    log_debug!("[worker {_id}] Exiting");
}

/// The process-wide shared executor.
static DEFAULT_EXECUTOR: OnceLock<Executor> = OnceLock::new();

/// Returns the process-wide shared executor, creating it on first use with
/// [`ThreadCount::Default`] threads.
///
/// The default executor is shared by every parallel operation that is not
/// given an explicit executor. It lives until an explicit
/// [`shutdown_default_executor()`] call; it is never torn down implicitly.
pub fn default_executor() -> &'static Executor {
    DEFAULT_EXECUTOR.get_or_init(|| ExecutorBuilder::default().build())
}

/// Shuts down the process-wide executor, if it was ever created.
///
/// After this call, operations relying on the default executor fail with
/// [`ParallelError::Rejected`](crate::ParallelError::Rejected) unless they
/// stay on the sequential path.
pub fn shutdown_default_executor() {
    if let Some(executor) = DEFAULT_EXECUTOR.get() {
        executor.shutdown();
    }
}
