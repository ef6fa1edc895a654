// Copyright 2026 The parbatch developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The named parallel operations, and the generic batching primitive they
//! are built on.
//!
//! Each operation comes in two forms. The default form uses
//! [`DEFAULT_MIN_FORK_SIZE`], an automatic task count and the process-wide
//! [`default_executor()`]. The `_with` form takes an explicit batch size
//! and executor; the batch size doubles as the minimum fork size, so a
//! source smaller than one batch is processed sequentially. The collecting
//! operations additionally come in `_into` forms that append to a
//! caller-supplied target instead of returning a fresh `Vec`.

use crate::combine::{CombineMode, Combiner, CountCombiner, ListCombiner, PassThruCombiner};
use crate::error::ParallelError;
use crate::executor::{default_executor, default_max_pool_size, Executor};
use crate::macros::log_debug;
use crate::multimap::SyncMultimap;
use crate::runner::{execute_and_combine, execute_indexed_and_combine};
use crate::source::{BatchSource, IndexedBatchSource};
use crate::task::{
    BatchProcedure, CountProcedureFactory, FilterNotProcedureFactory, FilterProcedureFactory,
    FlatTransformProcedureFactory, IndexedBatchProcedure, IndexedProcedureFactory,
    MultimapPutProcedureFactory, PassThruIndexedProcedureFactory, PassThruProcedureFactory,
    ProcedureFactory, TransformIfProcedureFactory, TransformProcedureFactory,
};
use std::hash::Hash;

/// Sources smaller than this are processed sequentially by the default
/// forms, since thread handoff overhead dominates for small inputs.
pub const DEFAULT_MIN_FORK_SIZE: usize = 10_000;

/// Tasks requested per pool thread, to smooth over uneven batch costs.
const TASK_RATIO: usize = 2;

/// Returns the task count used by the default forms: two tasks per thread
/// of a default-sized pool.
pub fn default_task_count() -> usize {
    default_max_pool_size() * TASK_RATIO
}

/// Derives a task count from a source size and a batch size, at least 2.
fn calculate_task_count(size: usize, batch_size: usize) -> usize {
    (size / batch_size).max(2)
}

/// Expected number of elements per batch, used to presize procedure
/// collections.
fn batch_capacity(size: usize, task_count: usize) -> usize {
    size / task_count.max(1)
}

fn check_batch_size(batch_size: usize) -> Result<(), ParallelError> {
    if batch_size == 0 {
        return Err(ParallelError::InvalidBatchSize);
    }
    Ok(())
}

/// The generic batching primitive every named operation is built on.
///
/// Splits the source into at most `task_count` batches, runs one procedure
/// per batch on the executor, and feeds the finished procedures to the
/// combiner. Sources smaller than `min_fork_size`, and calls with a task
/// count of 0 or 1, are processed sequentially on the calling thread
/// without touching the executor. An empty source is a no-op.
///
/// A panic in any batch is re-raised here with its original payload once
/// all in-flight batches have finished.
pub fn for_each_in_batches<'a, S, F, C>(
    source: &'a S,
    factory: &'a F,
    combiner: &mut C,
    min_fork_size: usize,
    task_count: usize,
    executor: &Executor,
) -> Result<(), ParallelError>
where
    S: BatchSource + ?Sized,
    F: ProcedureFactory<S::Item> + Sync,
    C: Combiner<F::Procedure<'a>>,
{
    let size = source.size();
    if size == 0 {
        return Ok(());
    }
    if size < min_fork_size || task_count <= 1 {
        log_debug!("[iterate] Size {size} below fork threshold, running sequentially");
        let mut procedure = factory.create();
        source.for_each(|item| procedure.apply(item));
        match combiner.mode() {
            CombineMode::OneAtATime => combiner.combine_one(procedure),
            CombineMode::AllAtOnce => combiner.combine_all(vec![procedure]),
        }
        return Ok(());
    }
    let batch_count = source.negotiated_batch_count(task_count);
    execute_and_combine(source, factory, combiner, batch_count, executor)
}

/// Like [`for_each_in_batches()`], with each procedure observing element
/// positions. Requires a random-access source.
pub fn for_each_with_index_in_batches<'a, S, F, C>(
    source: &'a S,
    factory: &'a F,
    combiner: &mut C,
    min_fork_size: usize,
    task_count: usize,
    executor: &Executor,
) -> Result<(), ParallelError>
where
    S: IndexedBatchSource + ?Sized,
    F: IndexedProcedureFactory<S::Item> + Sync,
    C: Combiner<F::Procedure<'a>>,
{
    let size = source.size();
    if size == 0 {
        return Ok(());
    }
    if size < min_fork_size || task_count <= 1 {
        log_debug!("[iterate] Size {size} below fork threshold, running sequentially");
        let mut procedure = factory.create();
        source.for_each_with_index(|i, item| procedure.apply_with_index(i, item));
        match combiner.mode() {
            CombineMode::OneAtATime => combiner.combine_one(procedure),
            CombineMode::AllAtOnce => combiner.combine_all(vec![procedure]),
        }
        return Ok(());
    }
    let batch_count = source.negotiated_batch_count(task_count);
    execute_indexed_and_combine(source, factory, combiner, batch_count, executor)
}

/// Applies `action` to every element of `source` in parallel.
///
/// `action` runs concurrently from several threads and observes elements
/// in no particular order.
pub fn for_each<S, A>(source: &S, action: A) -> Result<(), ParallelError>
where
    S: BatchSource + ?Sized,
    A: Fn(&S::Item) + Sync,
{
    let size = source.size();
    let task_count = default_task_count().max(size / DEFAULT_MIN_FORK_SIZE);
    let factory = PassThruProcedureFactory::new(action);
    for_each_in_batches(
        source,
        &factory,
        &mut PassThruCombiner,
        DEFAULT_MIN_FORK_SIZE,
        task_count,
        default_executor(),
    )
}

/// Like [`for_each()`], with an explicit batch size and executor.
pub fn for_each_with<S, A>(
    source: &S,
    action: A,
    batch_size: usize,
    executor: &Executor,
) -> Result<(), ParallelError>
where
    S: BatchSource + ?Sized,
    A: Fn(&S::Item) + Sync,
{
    check_batch_size(batch_size)?;
    let task_count = calculate_task_count(source.size(), batch_size);
    let factory = PassThruProcedureFactory::new(action);
    for_each_in_batches(
        source,
        &factory,
        &mut PassThruCombiner,
        batch_size,
        task_count,
        executor,
    )
}

/// Applies `action` to every element of `source` and its position in
/// parallel.
///
/// Like [`for_each()`], but `action` also receives each element's index in
/// the whole source, so it requires a random-access source.
pub fn for_each_with_index<S, A>(source: &S, action: A) -> Result<(), ParallelError>
where
    S: IndexedBatchSource + ?Sized,
    A: Fn(usize, &S::Item) + Sync,
{
    let size = source.size();
    let task_count = default_task_count().max(size / DEFAULT_MIN_FORK_SIZE);
    let factory = PassThruIndexedProcedureFactory::new(action);
    for_each_with_index_in_batches(
        source,
        &factory,
        &mut PassThruCombiner,
        DEFAULT_MIN_FORK_SIZE,
        task_count,
        default_executor(),
    )
}

/// Like [`for_each_with_index()`], with an explicit batch size and
/// executor.
pub fn for_each_with_index_with<S, A>(
    source: &S,
    action: A,
    batch_size: usize,
    executor: &Executor,
) -> Result<(), ParallelError>
where
    S: IndexedBatchSource + ?Sized,
    A: Fn(usize, &S::Item) + Sync,
{
    check_batch_size(batch_size)?;
    let task_count = calculate_task_count(source.size(), batch_size);
    let factory = PassThruIndexedProcedureFactory::new(action);
    for_each_with_index_in_batches(
        source,
        &factory,
        &mut PassThruCombiner,
        batch_size,
        task_count,
        executor,
    )
}

/// Returns the elements of `source` matching `predicate`.
///
/// With `allow_reordered` set to false, the result is in source order,
/// identical to a sequential filter.
pub fn filter<S, P>(
    source: &S,
    predicate: P,
    allow_reordered: bool,
) -> Result<Vec<S::Item>, ParallelError>
where
    S: BatchSource + ?Sized,
    S::Item: Clone + Send,
    P: Fn(&S::Item) -> bool + Sync,
{
    let mut result = Vec::new();
    filter_into(source, predicate, allow_reordered, &mut result)?;
    Ok(result)
}

/// Like [`filter()`], with an explicit batch size and executor.
pub fn filter_with<S, P>(
    source: &S,
    predicate: P,
    allow_reordered: bool,
    batch_size: usize,
    executor: &Executor,
) -> Result<Vec<S::Item>, ParallelError>
where
    S: BatchSource + ?Sized,
    S::Item: Clone + Send,
    P: Fn(&S::Item) -> bool + Sync,
{
    let mut result = Vec::new();
    filter_into_with(
        source,
        predicate,
        allow_reordered,
        &mut result,
        batch_size,
        executor,
    )?;
    Ok(result)
}

/// Like [`filter()`], appending the matches to a caller-supplied target.
///
/// Elements already in `target` stay in place. On error, `target` is left
/// unchanged.
pub fn filter_into<S, P>(
    source: &S,
    predicate: P,
    allow_reordered: bool,
    target: &mut Vec<S::Item>,
) -> Result<(), ParallelError>
where
    S: BatchSource + ?Sized,
    S::Item: Clone + Send,
    P: Fn(&S::Item) -> bool + Sync,
{
    filter_in_batches(
        source,
        predicate,
        allow_reordered,
        target,
        DEFAULT_MIN_FORK_SIZE,
        default_task_count(),
        default_executor(),
    )
}

/// Like [`filter_into()`], with an explicit batch size and executor.
pub fn filter_into_with<S, P>(
    source: &S,
    predicate: P,
    allow_reordered: bool,
    target: &mut Vec<S::Item>,
    batch_size: usize,
    executor: &Executor,
) -> Result<(), ParallelError>
where
    S: BatchSource + ?Sized,
    S::Item: Clone + Send,
    P: Fn(&S::Item) -> bool + Sync,
{
    check_batch_size(batch_size)?;
    let task_count = calculate_task_count(source.size(), batch_size);
    filter_in_batches(
        source,
        predicate,
        allow_reordered,
        target,
        batch_size,
        task_count,
        executor,
    )
}

fn filter_in_batches<S, P>(
    source: &S,
    predicate: P,
    allow_reordered: bool,
    target: &mut Vec<S::Item>,
    min_fork_size: usize,
    task_count: usize,
    executor: &Executor,
) -> Result<(), ParallelError>
where
    S: BatchSource + ?Sized,
    S::Item: Clone + Send,
    P: Fn(&S::Item) -> bool + Sync,
{
    let factory = FilterProcedureFactory::new(predicate, batch_capacity(source.size(), task_count));
    let mut combiner = ListCombiner::appending_to(std::mem::take(target), allow_reordered);
    let result = for_each_in_batches(
        source,
        &factory,
        &mut combiner,
        min_fork_size,
        task_count,
        executor,
    );
    // On error the combiner was never fed, so this restores the target.
    *target = combiner.into_result();
    result
}

/// Returns the elements of `source` rejected by `predicate`.
pub fn filter_not<S, P>(
    source: &S,
    predicate: P,
    allow_reordered: bool,
) -> Result<Vec<S::Item>, ParallelError>
where
    S: BatchSource + ?Sized,
    S::Item: Clone + Send,
    P: Fn(&S::Item) -> bool + Sync,
{
    let mut result = Vec::new();
    filter_not_into(source, predicate, allow_reordered, &mut result)?;
    Ok(result)
}

/// Like [`filter_not()`], with an explicit batch size and executor.
pub fn filter_not_with<S, P>(
    source: &S,
    predicate: P,
    allow_reordered: bool,
    batch_size: usize,
    executor: &Executor,
) -> Result<Vec<S::Item>, ParallelError>
where
    S: BatchSource + ?Sized,
    S::Item: Clone + Send,
    P: Fn(&S::Item) -> bool + Sync,
{
    let mut result = Vec::new();
    filter_not_into_with(
        source,
        predicate,
        allow_reordered,
        &mut result,
        batch_size,
        executor,
    )?;
    Ok(result)
}

/// Like [`filter_not()`], appending the rejected elements to a
/// caller-supplied target.
pub fn filter_not_into<S, P>(
    source: &S,
    predicate: P,
    allow_reordered: bool,
    target: &mut Vec<S::Item>,
) -> Result<(), ParallelError>
where
    S: BatchSource + ?Sized,
    S::Item: Clone + Send,
    P: Fn(&S::Item) -> bool + Sync,
{
    filter_not_in_batches(
        source,
        predicate,
        allow_reordered,
        target,
        DEFAULT_MIN_FORK_SIZE,
        default_task_count(),
        default_executor(),
    )
}

/// Like [`filter_not_into()`], with an explicit batch size and executor.
pub fn filter_not_into_with<S, P>(
    source: &S,
    predicate: P,
    allow_reordered: bool,
    target: &mut Vec<S::Item>,
    batch_size: usize,
    executor: &Executor,
) -> Result<(), ParallelError>
where
    S: BatchSource + ?Sized,
    S::Item: Clone + Send,
    P: Fn(&S::Item) -> bool + Sync,
{
    check_batch_size(batch_size)?;
    let task_count = calculate_task_count(source.size(), batch_size);
    filter_not_in_batches(
        source,
        predicate,
        allow_reordered,
        target,
        batch_size,
        task_count,
        executor,
    )
}

fn filter_not_in_batches<S, P>(
    source: &S,
    predicate: P,
    allow_reordered: bool,
    target: &mut Vec<S::Item>,
    min_fork_size: usize,
    task_count: usize,
    executor: &Executor,
) -> Result<(), ParallelError>
where
    S: BatchSource + ?Sized,
    S::Item: Clone + Send,
    P: Fn(&S::Item) -> bool + Sync,
{
    let factory =
        FilterNotProcedureFactory::new(predicate, batch_capacity(source.size(), task_count));
    let mut combiner = ListCombiner::appending_to(std::mem::take(target), allow_reordered);
    let result = for_each_in_batches(
        source,
        &factory,
        &mut combiner,
        min_fork_size,
        task_count,
        executor,
    );
    *target = combiner.into_result();
    result
}

/// Maps every element of `source` through `function`.
///
/// With `allow_reordered` set to false, the result is in source order,
/// identical to a sequential map.
pub fn transform<S, V, F>(
    source: &S,
    function: F,
    allow_reordered: bool,
) -> Result<Vec<V>, ParallelError>
where
    S: BatchSource + ?Sized,
    V: Send,
    F: Fn(&S::Item) -> V + Sync,
{
    let mut result = Vec::new();
    transform_into(source, function, allow_reordered, &mut result)?;
    Ok(result)
}

/// Like [`transform()`], with an explicit batch size and executor.
pub fn transform_with<S, V, F>(
    source: &S,
    function: F,
    allow_reordered: bool,
    batch_size: usize,
    executor: &Executor,
) -> Result<Vec<V>, ParallelError>
where
    S: BatchSource + ?Sized,
    V: Send,
    F: Fn(&S::Item) -> V + Sync,
{
    let mut result = Vec::new();
    transform_into_with(
        source,
        function,
        allow_reordered,
        &mut result,
        batch_size,
        executor,
    )?;
    Ok(result)
}

/// Like [`transform()`], appending the outputs to a caller-supplied
/// target.
pub fn transform_into<S, V, F>(
    source: &S,
    function: F,
    allow_reordered: bool,
    target: &mut Vec<V>,
) -> Result<(), ParallelError>
where
    S: BatchSource + ?Sized,
    V: Send,
    F: Fn(&S::Item) -> V + Sync,
{
    transform_in_batches(
        source,
        function,
        allow_reordered,
        target,
        DEFAULT_MIN_FORK_SIZE,
        default_task_count(),
        default_executor(),
    )
}

/// Like [`transform_into()`], with an explicit batch size and executor.
pub fn transform_into_with<S, V, F>(
    source: &S,
    function: F,
    allow_reordered: bool,
    target: &mut Vec<V>,
    batch_size: usize,
    executor: &Executor,
) -> Result<(), ParallelError>
where
    S: BatchSource + ?Sized,
    V: Send,
    F: Fn(&S::Item) -> V + Sync,
{
    check_batch_size(batch_size)?;
    let task_count = calculate_task_count(source.size(), batch_size);
    transform_in_batches(
        source,
        function,
        allow_reordered,
        target,
        batch_size,
        task_count,
        executor,
    )
}

fn transform_in_batches<S, V, F>(
    source: &S,
    function: F,
    allow_reordered: bool,
    target: &mut Vec<V>,
    min_fork_size: usize,
    task_count: usize,
    executor: &Executor,
) -> Result<(), ParallelError>
where
    S: BatchSource + ?Sized,
    V: Send,
    F: Fn(&S::Item) -> V + Sync,
{
    let factory =
        TransformProcedureFactory::new(function, batch_capacity(source.size(), task_count));
    // A transform emits exactly one output per element, so with a fresh
    // target the combiner presizes the result by receiving all partials
    // at once. With a non-empty target it appends in feed order instead.
    let mut combiner = if target.is_empty() {
        ListCombiner::all_at_once(allow_reordered)
    } else {
        ListCombiner::appending_to(std::mem::take(target), allow_reordered)
    };
    let result = for_each_in_batches(
        source,
        &factory,
        &mut combiner,
        min_fork_size,
        task_count,
        executor,
    );
    *target = combiner.into_result();
    result
}

/// Maps the elements of `source` matching `predicate` through `function`.
pub fn transform_if<S, V, F, P>(
    source: &S,
    function: F,
    predicate: P,
    allow_reordered: bool,
) -> Result<Vec<V>, ParallelError>
where
    S: BatchSource + ?Sized,
    V: Send,
    F: Fn(&S::Item) -> V + Sync,
    P: Fn(&S::Item) -> bool + Sync,
{
    let mut result = Vec::new();
    transform_if_into(source, function, predicate, allow_reordered, &mut result)?;
    Ok(result)
}

/// Like [`transform_if()`], with an explicit batch size and executor.
pub fn transform_if_with<S, V, F, P>(
    source: &S,
    function: F,
    predicate: P,
    allow_reordered: bool,
    batch_size: usize,
    executor: &Executor,
) -> Result<Vec<V>, ParallelError>
where
    S: BatchSource + ?Sized,
    V: Send,
    F: Fn(&S::Item) -> V + Sync,
    P: Fn(&S::Item) -> bool + Sync,
{
    let mut result = Vec::new();
    transform_if_into_with(
        source,
        function,
        predicate,
        allow_reordered,
        &mut result,
        batch_size,
        executor,
    )?;
    Ok(result)
}

/// Like [`transform_if()`], appending the outputs to a caller-supplied
/// target.
pub fn transform_if_into<S, V, F, P>(
    source: &S,
    function: F,
    predicate: P,
    allow_reordered: bool,
    target: &mut Vec<V>,
) -> Result<(), ParallelError>
where
    S: BatchSource + ?Sized,
    V: Send,
    F: Fn(&S::Item) -> V + Sync,
    P: Fn(&S::Item) -> bool + Sync,
{
    transform_if_in_batches(
        source,
        function,
        predicate,
        allow_reordered,
        target,
        DEFAULT_MIN_FORK_SIZE,
        default_task_count(),
        default_executor(),
    )
}

/// Like [`transform_if_into()`], with an explicit batch size and
/// executor.
pub fn transform_if_into_with<S, V, F, P>(
    source: &S,
    function: F,
    predicate: P,
    allow_reordered: bool,
    target: &mut Vec<V>,
    batch_size: usize,
    executor: &Executor,
) -> Result<(), ParallelError>
where
    S: BatchSource + ?Sized,
    V: Send,
    F: Fn(&S::Item) -> V + Sync,
    P: Fn(&S::Item) -> bool + Sync,
{
    check_batch_size(batch_size)?;
    let task_count = calculate_task_count(source.size(), batch_size);
    transform_if_in_batches(
        source,
        function,
        predicate,
        allow_reordered,
        target,
        batch_size,
        task_count,
        executor,
    )
}

#[allow(clippy::too_many_arguments)]
fn transform_if_in_batches<S, V, F, P>(
    source: &S,
    function: F,
    predicate: P,
    allow_reordered: bool,
    target: &mut Vec<V>,
    min_fork_size: usize,
    task_count: usize,
    executor: &Executor,
) -> Result<(), ParallelError>
where
    S: BatchSource + ?Sized,
    V: Send,
    F: Fn(&S::Item) -> V + Sync,
    P: Fn(&S::Item) -> bool + Sync,
{
    let factory = TransformIfProcedureFactory::new(
        function,
        predicate,
        batch_capacity(source.size(), task_count),
    );
    let mut combiner = ListCombiner::appending_to(std::mem::take(target), allow_reordered);
    let result = for_each_in_batches(
        source,
        &factory,
        &mut combiner,
        min_fork_size,
        task_count,
        executor,
    );
    *target = combiner.into_result();
    result
}

/// Maps every element of `source` to an iterable through `function` and
/// flattens the outputs.
pub fn flat_transform<S, I, F>(
    source: &S,
    function: F,
    allow_reordered: bool,
) -> Result<Vec<I::Item>, ParallelError>
where
    S: BatchSource + ?Sized,
    I: IntoIterator,
    I::Item: Send,
    F: Fn(&S::Item) -> I + Sync,
{
    let mut result = Vec::new();
    flat_transform_into(source, function, allow_reordered, &mut result)?;
    Ok(result)
}

/// Like [`flat_transform()`], with an explicit batch size and executor.
pub fn flat_transform_with<S, I, F>(
    source: &S,
    function: F,
    allow_reordered: bool,
    batch_size: usize,
    executor: &Executor,
) -> Result<Vec<I::Item>, ParallelError>
where
    S: BatchSource + ?Sized,
    I: IntoIterator,
    I::Item: Send,
    F: Fn(&S::Item) -> I + Sync,
{
    let mut result = Vec::new();
    flat_transform_into_with(
        source,
        function,
        allow_reordered,
        &mut result,
        batch_size,
        executor,
    )?;
    Ok(result)
}

/// Like [`flat_transform()`], appending the flattened outputs to a
/// caller-supplied target.
pub fn flat_transform_into<S, I, F>(
    source: &S,
    function: F,
    allow_reordered: bool,
    target: &mut Vec<I::Item>,
) -> Result<(), ParallelError>
where
    S: BatchSource + ?Sized,
    I: IntoIterator,
    I::Item: Send,
    F: Fn(&S::Item) -> I + Sync,
{
    flat_transform_in_batches(
        source,
        function,
        allow_reordered,
        target,
        DEFAULT_MIN_FORK_SIZE,
        default_task_count(),
        default_executor(),
    )
}

/// Like [`flat_transform_into()`], with an explicit batch size and
/// executor.
pub fn flat_transform_into_with<S, I, F>(
    source: &S,
    function: F,
    allow_reordered: bool,
    target: &mut Vec<I::Item>,
    batch_size: usize,
    executor: &Executor,
) -> Result<(), ParallelError>
where
    S: BatchSource + ?Sized,
    I: IntoIterator,
    I::Item: Send,
    F: Fn(&S::Item) -> I + Sync,
{
    check_batch_size(batch_size)?;
    let task_count = calculate_task_count(source.size(), batch_size);
    flat_transform_in_batches(
        source,
        function,
        allow_reordered,
        target,
        batch_size,
        task_count,
        executor,
    )
}

fn flat_transform_in_batches<S, I, F>(
    source: &S,
    function: F,
    allow_reordered: bool,
    target: &mut Vec<I::Item>,
    min_fork_size: usize,
    task_count: usize,
    executor: &Executor,
) -> Result<(), ParallelError>
where
    S: BatchSource + ?Sized,
    I: IntoIterator,
    I::Item: Send,
    F: Fn(&S::Item) -> I + Sync,
{
    let factory =
        FlatTransformProcedureFactory::new(function, batch_capacity(source.size(), task_count));
    let mut combiner = ListCombiner::appending_to(std::mem::take(target), allow_reordered);
    let result = for_each_in_batches(
        source,
        &factory,
        &mut combiner,
        min_fork_size,
        task_count,
        executor,
    );
    *target = combiner.into_result();
    result
}

/// Counts the elements of `source` matching `predicate`.
pub fn count<S, P>(source: &S, predicate: P) -> Result<usize, ParallelError>
where
    S: BatchSource + ?Sized,
    P: Fn(&S::Item) -> bool + Sync,
{
    count_in_batches(
        source,
        predicate,
        DEFAULT_MIN_FORK_SIZE,
        default_task_count(),
        default_executor(),
    )
}

/// Like [`count()`], with an explicit batch size and executor.
pub fn count_with<S, P>(
    source: &S,
    predicate: P,
    batch_size: usize,
    executor: &Executor,
) -> Result<usize, ParallelError>
where
    S: BatchSource + ?Sized,
    P: Fn(&S::Item) -> bool + Sync,
{
    check_batch_size(batch_size)?;
    let task_count = calculate_task_count(source.size(), batch_size);
    count_in_batches(source, predicate, batch_size, task_count, executor)
}

fn count_in_batches<S, P>(
    source: &S,
    predicate: P,
    min_fork_size: usize,
    task_count: usize,
    executor: &Executor,
) -> Result<usize, ParallelError>
where
    S: BatchSource + ?Sized,
    P: Fn(&S::Item) -> bool + Sync,
{
    let factory = CountProcedureFactory::new(predicate);
    let mut combiner = CountCombiner::new();
    for_each_in_batches(
        source,
        &factory,
        &mut combiner,
        min_fork_size,
        task_count,
        executor,
    )?;
    Ok(combiner.count())
}

/// Groups every element of `source` under the key computed by `function`.
///
/// Values under one key keep their relative batch order; the interleaving
/// between batches is unspecified.
pub fn group_by<S, K, G>(
    source: &S,
    function: G,
) -> Result<SyncMultimap<K, S::Item>, ParallelError>
where
    S: BatchSource + ?Sized,
    S::Item: Clone + Send,
    K: Eq + Hash + Send + Sync,
    G: Fn(&S::Item) -> K + Sync,
{
    let multimap = SyncMultimap::new();
    group_by_into(
        source,
        function,
        &multimap,
        DEFAULT_MIN_FORK_SIZE,
        default_task_count(),
        default_executor(),
    )?;
    Ok(multimap)
}

/// Like [`group_by()`], with an explicit batch size and executor.
pub fn group_by_with<S, K, G>(
    source: &S,
    function: G,
    batch_size: usize,
    executor: &Executor,
) -> Result<SyncMultimap<K, S::Item>, ParallelError>
where
    S: BatchSource + ?Sized,
    S::Item: Clone + Send,
    K: Eq + Hash + Send + Sync,
    G: Fn(&S::Item) -> K + Sync,
{
    check_batch_size(batch_size)?;
    let task_count = calculate_task_count(source.size(), batch_size);
    let multimap = SyncMultimap::new();
    group_by_into(source, function, &multimap, batch_size, task_count, executor)?;
    Ok(multimap)
}

/// Groups into a caller-supplied multimap, allowing several sources to be
/// merged into one grouping.
pub fn group_by_into<S, K, G>(
    source: &S,
    function: G,
    multimap: &SyncMultimap<K, S::Item>,
    min_fork_size: usize,
    task_count: usize,
    executor: &Executor,
) -> Result<(), ParallelError>
where
    S: BatchSource + ?Sized,
    S::Item: Clone + Send,
    K: Eq + Hash + Send + Sync,
    G: Fn(&S::Item) -> K + Sync,
{
    let factory = MultimapPutProcedureFactory::new(multimap, function);
    for_each_in_batches(
        source,
        &factory,
        &mut PassThruCombiner,
        min_fork_size,
        task_count,
        executor,
    )
}
