// Copyright 2026 The parbatch developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The fan-out / barrier / combine core shared by every parallel
//! operation.

use crate::combine::{CombineMode, Combiner};
use crate::error::ParallelError;
use crate::executor::Executor;
use crate::macros::log_debug;
use crate::source::{BatchSource, IndexedBatchSource};
use crate::task::{
    BatchProcedure, IndexedBatchProcedure, IndexedProcedureFactory, ProcedureFactory,
};
use crate::util::Job;
use crossbeam_utils::sync::WaitGroup;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Mutex;

/// A completion barrier that is waited on no matter how the runner's
/// frame exits.
///
/// Every submitted job holds one guard. The runner waits on the barrier
/// before returning; the `Drop` impl repeats the wait so that an unwind
/// past the fan-out loop also blocks until every job has released its
/// guard. This is what makes the lifetime erasure in [`Job::erased`]
/// sound.
struct CompletionBarrier(Option<WaitGroup>);

impl CompletionBarrier {
    fn new() -> Self {
        Self(Some(WaitGroup::new()))
    }

    /// Returns a guard to be held by one job.
    fn task_guard(&self) -> WaitGroup {
        self.0.as_ref().unwrap().clone()
    }

    /// Blocks until every guard has been dropped.
    fn wait(mut self) {
        if let Some(barrier) = self.0.take() {
            barrier.wait();
        }
    }
}

impl Drop for CompletionBarrier {
    fn drop(&mut self) {
        if let Some(barrier) = self.0.take() {
            barrier.wait();
        }
    }
}

/// Runs one procedure per batch on the executor, waits for all batches to
/// finish, then feeds the procedures to the combiner.
///
/// `batch_count` must be non-zero and negotiated with the source. If any
/// batch panics, the first captured payload is re-raised here once every
/// in-flight batch has finished, and the combiner is never fed. If the
/// executor rejects a submission, the batches already submitted are
/// awaited and [`ParallelError::Rejected`] is returned.
pub(crate) fn execute_and_combine<'a, S, F, C>(
    source: &'a S,
    factory: &'a F,
    combiner: &mut C,
    batch_count: usize,
    executor: &Executor,
) -> Result<(), ParallelError>
where
    S: BatchSource + ?Sized,
    F: ProcedureFactory<S::Item> + Sync,
    C: Combiner<F::Procedure<'a>>,
{
    let run_batch = |index: usize, batch_count: usize| {
        let mut procedure = factory.create();
        source.for_each_in_batch(index, batch_count, |item| procedure.apply(item));
        procedure
    };
    run_and_combine(&run_batch, combiner, batch_count, executor)
}

/// Like [`execute_and_combine`], with each procedure observing element
/// positions.
pub(crate) fn execute_indexed_and_combine<'a, S, F, C>(
    source: &'a S,
    factory: &'a F,
    combiner: &mut C,
    batch_count: usize,
    executor: &Executor,
) -> Result<(), ParallelError>
where
    S: IndexedBatchSource + ?Sized,
    F: IndexedProcedureFactory<S::Item> + Sync,
    C: Combiner<F::Procedure<'a>>,
{
    let run_batch = |index: usize, batch_count: usize| {
        let mut procedure = factory.create();
        source.for_each_in_batch_with_index(index, batch_count, |i, item| {
            procedure.apply_with_index(i, item)
        });
        procedure
    };
    run_and_combine(&run_batch, combiner, batch_count, executor)
}

/// The shared fan-out / barrier / combine loop.
///
/// `run_batch(index, batch_count)` processes one whole batch and returns
/// its finished procedure; it is called once per batch, on a worker
/// thread.
fn run_and_combine<P, W, C>(
    run_batch: &W,
    combiner: &mut C,
    batch_count: usize,
    executor: &Executor,
) -> Result<(), ParallelError>
where
    P: Send,
    W: Fn(usize, usize) -> P + Sync,
    C: Combiner<P>,
{
    log_debug!("[runner] Fanning out {batch_count} batches");

    // One slot per batch when order matters, a single append-only list
    // otherwise.
    let ordered_slots: Vec<Mutex<Option<P>>> = if combiner.allow_reordered() {
        Vec::new()
    } else {
        (0..batch_count).map(|_| Mutex::new(None)).collect()
    };
    let completed: Mutex<Vec<P>> = Mutex::new(Vec::with_capacity(batch_count));
    let panic_payload: Mutex<Option<Box<dyn Any + Send>>> = Mutex::new(None);

    let barrier = CompletionBarrier::new();
    let mut rejected = false;
    for index in 0..batch_count {
        let guard = barrier.task_guard();
        let ordered_slots = &ordered_slots;
        let completed = &completed;
        let panic_payload = &panic_payload;
        let job = Box::new(move || {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| run_batch(index, batch_count)));
            match result {
                Ok(procedure) => {
                    if ordered_slots.is_empty() {
                        completed.lock().unwrap().push(procedure);
                    } else {
                        *ordered_slots[index].lock().unwrap() = Some(procedure);
                    }
                }
                Err(payload) => {
                    let mut slot = panic_payload.lock().unwrap();
                    if slot.is_none() {
                        *slot = Some(payload);
                    }
                }
            }
            // The guard is released by dropping it, whether the batch
            // succeeded or panicked.
            drop(guard);
        });
        // SAFETY: this frame blocks on the barrier until every guard is
        // dropped, both on the normal path (the explicit wait below) and
        // when it unwinds (the barrier's Drop impl waits too). A submitted
        // job drops its guard when it finishes; a rejected job is dropped
        // unrun by the executor, which also drops the guard. The borrows
        // of run_batch and the local mutexes therefore outlive every job.
        let job = unsafe { Job::erased(job) };
        if executor.submit(job).is_err() {
            rejected = true;
            break;
        }
    }
    barrier.wait();

    if let Some(payload) = panic_payload.into_inner().unwrap() {
        std::panic::resume_unwind(payload);
    }
    if rejected {
        return Err(crate::error::RejectedError.into());
    }

    let procedures: Vec<P> = if combiner.allow_reordered() {
        completed.into_inner().unwrap()
    } else {
        ordered_slots
            .into_iter()
            .map(|slot| slot.into_inner().unwrap().unwrap())
            .collect()
    };
    match combiner.mode() {
        CombineMode::OneAtATime => {
            for procedure in procedures {
                combiner.combine_one(procedure);
            }
        }
        CombineMode::AllAtOnce => combiner.combine_all(procedures),
    }
    Ok(())
}
