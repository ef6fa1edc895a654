// Copyright 2026 The parbatch developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![doc = include_str!("../README.md")]
#![forbid(missing_docs)]

mod macros;
mod runner;
mod util;

pub mod combine;
pub mod error;
pub mod executor;
pub mod iterate;
pub mod multimap;
pub mod source;
pub mod task;

pub use combine::{CombineMode, Combiner};
pub use error::{ParallelError, RejectedError};
pub use executor::{
    default_executor, default_max_pool_size, shutdown_default_executor, Executor, ExecutorBuilder,
    ThreadCount,
};
pub use iterate::{
    count, count_with, default_task_count, filter, filter_into, filter_into_with, filter_not,
    filter_not_into, filter_not_into_with, filter_not_with, filter_with, flat_transform,
    flat_transform_into, flat_transform_into_with, flat_transform_with, for_each,
    for_each_in_batches, for_each_with, for_each_with_index, for_each_with_index_in_batches,
    for_each_with_index_with, group_by, group_by_into, group_by_with, transform, transform_if,
    transform_if_into, transform_if_into_with, transform_if_with, transform_into,
    transform_into_with, transform_with, DEFAULT_MIN_FORK_SIZE,
};
pub use multimap::SyncMultimap;
pub use source::{BatchSource, IndexedBatchSource};

#[cfg(test)]
mod test {
    use super::*;
    use crate::combine::ListCombiner;
    use crate::source::test_sources::BucketList;
    use crate::task::FilterProcedureFactory;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    macro_rules! expand_tests {
        ( $allow_reordered:expr, ) => {};
        ( $allow_reordered:expr, $case:ident, $( $others:tt )* ) => {
            #[test]
            fn $case() {
                $crate::test::$case($allow_reordered);
            }

            expand_tests!($allow_reordered, $($others)*);
        };
        ( $allow_reordered:expr, $case:ident => fail($msg:expr), $( $others:tt )* ) => {
            #[test]
            #[should_panic(expected = $msg)]
            fn $case() {
                $crate::test::$case($allow_reordered);
            }

            expand_tests!($allow_reordered, $($others)*);
        };
    }

    macro_rules! ordering_tests {
        ( $mod:ident, $allow_reordered:expr, $( $tests:tt )* ) => {
            mod $mod {
                use super::*;

                expand_tests!($allow_reordered, $($tests)*);
            }
        };
    }

    macro_rules! all_ordering_tests {
        ( $mod:ident, $allow_reordered:expr ) => {
            ordering_tests!(
                $mod,
                $allow_reordered,
                test_filter_keeps_evens,
                test_filter_matches_sequential,
                test_filter_not_matches_sequential,
                test_transform_matches_sequential,
                test_transform_if_matches_sequential,
                test_flat_transform_matches_sequential,
                test_filter_bucketed_source,
                test_filter_one_panic => fail("boom"),
                test_transform_one_panic => fail("boom"),
            );
        };
    }

    all_ordering_tests!(ordered, false);
    all_ordering_tests!(reordered, true);

    fn test_executor() -> Executor {
        ExecutorBuilder {
            num_threads: ThreadCount::try_from(4).unwrap(),
            name: "lib-test".to_owned(),
        }
        .build()
    }

    fn random_input(len: usize) -> Vec<u64> {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        (0..len).map(|_| rng.random_range(0..1_000)).collect()
    }

    /// Sorts when reordered combining was allowed, so that results can be
    /// compared against the sequential equivalent.
    fn normalized<T: Ord>(mut result: Vec<T>, allow_reordered: bool) -> Vec<T> {
        if allow_reordered {
            result.sort_unstable();
        }
        result
    }

    fn test_filter_keeps_evens(allow_reordered: bool) {
        let executor = test_executor();
        let input: Vec<u64> = (1..=100).collect();
        let result = filter_with(&input, |x| x % 2 == 0, allow_reordered, 10, &executor).unwrap();
        let expected: Vec<u64> = (1..=100).filter(|x| x % 2 == 0).collect();
        assert_eq!(normalized(result, allow_reordered), expected);
    }

    fn test_filter_matches_sequential(allow_reordered: bool) {
        let executor = test_executor();
        let input = random_input(5_000);
        let result = filter_with(&input, |x| x % 3 == 0, allow_reordered, 100, &executor).unwrap();
        let expected: Vec<u64> = input.iter().filter(|x| *x % 3 == 0).copied().collect();
        assert_eq!(
            normalized(result, allow_reordered),
            normalized(expected, allow_reordered)
        );
    }

    fn test_filter_not_matches_sequential(allow_reordered: bool) {
        let executor = test_executor();
        let input = random_input(5_000);
        let result =
            filter_not_with(&input, |x| x % 3 == 0, allow_reordered, 100, &executor).unwrap();
        let expected: Vec<u64> = input.iter().filter(|x| *x % 3 != 0).copied().collect();
        assert_eq!(
            normalized(result, allow_reordered),
            normalized(expected, allow_reordered)
        );
    }

    fn test_transform_matches_sequential(allow_reordered: bool) {
        let executor = test_executor();
        let input = random_input(5_000);
        let result =
            transform_with(&input, |x| x * 2 + 1, allow_reordered, 100, &executor).unwrap();
        let expected: Vec<u64> = input.iter().map(|x| x * 2 + 1).collect();
        assert_eq!(
            normalized(result, allow_reordered),
            normalized(expected, allow_reordered)
        );
    }

    fn test_transform_if_matches_sequential(allow_reordered: bool) {
        let executor = test_executor();
        let input = random_input(5_000);
        let result = transform_if_with(
            &input,
            |x| x + 1,
            |x| x % 2 == 0,
            allow_reordered,
            100,
            &executor,
        )
        .unwrap();
        let expected: Vec<u64> = input
            .iter()
            .filter(|x| *x % 2 == 0)
            .map(|x| x + 1)
            .collect();
        assert_eq!(
            normalized(result, allow_reordered),
            normalized(expected, allow_reordered)
        );
    }

    fn test_flat_transform_matches_sequential(allow_reordered: bool) {
        let executor = test_executor();
        let input = random_input(2_000);
        let result = flat_transform_with(
            &input,
            |x| vec![*x, *x + 1_000_000],
            allow_reordered,
            100,
            &executor,
        )
        .unwrap();
        let expected: Vec<u64> = input
            .iter()
            .flat_map(|x| vec![*x, *x + 1_000_000])
            .collect();
        assert_eq!(
            normalized(result, allow_reordered),
            normalized(expected, allow_reordered)
        );
    }

    fn test_filter_bucketed_source(allow_reordered: bool) {
        let executor = test_executor();
        let buckets: Vec<Vec<u64>> = (0..20).map(|b| (b * 10..(b + 1) * 10).collect()).collect();
        let source = BucketList::new(buckets);
        let result = filter_with(&source, |x| x % 2 == 0, allow_reordered, 10, &executor).unwrap();
        let expected: Vec<u64> = (0..200).filter(|x| x % 2 == 0).collect();
        assert_eq!(normalized(result, allow_reordered), expected);
    }

    fn test_filter_one_panic(allow_reordered: bool) {
        let executor = test_executor();
        let input: Vec<u64> = (0..1_000).collect();
        let _ = filter_with(
            &input,
            |x| {
                if *x == 500 {
                    panic!("boom");
                }
                true
            },
            allow_reordered,
            100,
            &executor,
        );
    }

    fn test_transform_one_panic(allow_reordered: bool) {
        let executor = test_executor();
        let input: Vec<u64> = (0..1_000).collect();
        let _ = transform_with(
            &input,
            |x| {
                if *x == 500 {
                    panic!("boom");
                }
                *x
            },
            allow_reordered,
            100,
            &executor,
        );
    }

    #[test]
    fn filter_evens_with_four_tasks() {
        let executor = test_executor();
        let input: Vec<u64> = (1..=100).collect();
        let factory = FilterProcedureFactory::new(|x: &u64| x % 2 == 0, 25);
        let mut combiner = ListCombiner::new(false);
        for_each_in_batches(&input, &factory, &mut combiner, 10, 4, &executor).unwrap();
        let expected: Vec<u64> = (1..=50).map(|x| x * 2).collect();
        assert_eq!(combiner.into_result(), expected);
    }

    #[test]
    fn for_each_visits_every_element_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let executor = test_executor();
        let input: Vec<usize> = (0..1_000).collect();
        let visits: Vec<AtomicUsize> = (0..1_000).map(|_| AtomicUsize::new(0)).collect();
        for_each_with(
            &input,
            |i| {
                visits[*i].fetch_add(1, Ordering::SeqCst);
            },
            50,
            &executor,
        )
        .unwrap();
        assert!(visits.iter().all(|v| v.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn for_each_with_index_observes_positions() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let executor = test_executor();
        let input: Vec<u64> = (0..1_000).map(|x| x * 7).collect();
        let visits: Vec<AtomicUsize> = (0..1_000).map(|_| AtomicUsize::new(0)).collect();
        for_each_with_index_with(
            &input,
            |i, x| {
                assert_eq!(*x, i as u64 * 7);
                visits[i].fetch_add(1, Ordering::SeqCst);
            },
            50,
            &executor,
        )
        .unwrap();
        assert!(visits.iter().all(|v| v.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn for_each_with_index_small_source_is_sequential() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let executor = test_executor();
        executor.shutdown();
        // Success proves the small source stayed on the calling thread.
        let input: Vec<u64> = (10..15).collect();
        let sum = AtomicUsize::new(0);
        for_each_with_index_with(
            &input,
            |i, x| {
                assert_eq!(*x, i as u64 + 10);
                sum.fetch_add(i, Ordering::SeqCst);
            },
            100,
            &executor,
        )
        .unwrap();
        assert_eq!(sum.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn into_forms_append_after_existing_elements() {
        let executor = test_executor();
        let input: Vec<u64> = (1..=100).collect();

        let mut kept = vec![900, 901];
        filter_into_with(&input, |x| x % 2 == 0, false, &mut kept, 10, &executor).unwrap();
        let mut expected = vec![900, 901];
        expected.extend((1..=100).filter(|x| x % 2 == 0));
        assert_eq!(kept, expected);

        let mut mapped = vec![0u64];
        transform_into_with(&input, |x| x * 10, false, &mut mapped, 10, &executor).unwrap();
        let mut expected = vec![0u64];
        expected.extend((1..=100).map(|x| x * 10));
        assert_eq!(mapped, expected);

        let mut flattened = vec![42u64];
        flat_transform_into_with(&input, |x| [*x, *x], false, &mut flattened, 10, &executor)
            .unwrap();
        let mut expected = vec![42u64];
        expected.extend((1..=100).flat_map(|x| [x, x]));
        assert_eq!(flattened, expected);
    }

    #[test]
    fn failed_into_leaves_the_target_unchanged() {
        let executor = test_executor();
        executor.shutdown();
        let input: Vec<u64> = (0..1_000).collect();
        let mut target = vec![7u64, 8, 9];
        assert_eq!(
            filter_into_with(&input, |_| true, false, &mut target, 10, &executor),
            Err(ParallelError::Rejected(RejectedError))
        );
        assert_eq!(target, vec![7, 8, 9]);
        assert_eq!(
            transform_into_with(&input, |x| *x, false, &mut target, 0, &executor),
            Err(ParallelError::InvalidBatchSize)
        );
        assert_eq!(target, vec![7, 8, 9]);
    }

    #[test]
    fn count_matches_sequential_across_batch_sizes() {
        let executor = test_executor();
        let input: Vec<u64> = (1..=20).collect();
        for batch_size in 1..=25 {
            let result = count_with(&input, |x| *x > 15, batch_size, &executor).unwrap();
            assert_eq!(result, 5, "batch_size = {batch_size}");
        }
    }

    #[test]
    fn group_by_groups_under_computed_keys() {
        let executor = test_executor();
        let input: Vec<u64> = (1..=50).collect();
        let multimap = group_by_with(&input, |x| x % 3, 10, &executor).unwrap();
        assert_eq!(multimap.key_count(), 3);
        assert_eq!(multimap.total_size(), 50);
        for key in 0..3u64 {
            let mut values = multimap
                .with_values(&key, |values| values.to_vec())
                .unwrap();
            values.sort_unstable();
            let expected: Vec<u64> = (1..=50).filter(|x| x % 3 == key).collect();
            assert_eq!(values, expected, "key = {key}");
        }
    }

    #[test]
    fn group_by_into_merges_several_sources() {
        let executor = test_executor();
        let first: Vec<u64> = (0..100).collect();
        let second: Vec<u64> = (100..150).collect();
        let multimap = SyncMultimap::new();
        group_by_into(&first, |x| x % 2, &multimap, 10, 4, &executor).unwrap();
        group_by_into(&second, |x| x % 2, &multimap, 10, 4, &executor).unwrap();
        assert_eq!(multimap.key_count(), 2);
        assert_eq!(multimap.total_size(), 150);
    }

    #[test]
    fn empty_source_is_a_no_op() {
        let executor = test_executor();
        executor.shutdown();
        // A shut-down executor rejects everything, so success proves the
        // empty source never reached it.
        let input: Vec<u64> = Vec::new();
        assert_eq!(filter_with(&input, |_| true, false, 10, &executor), Ok(vec![]));
        assert_eq!(
            transform_with(&input, |x| *x, false, 10, &executor),
            Ok(vec![])
        );
        assert_eq!(count_with(&input, |_| true, 10, &executor), Ok(0));
        assert_eq!(for_each_with(&input, |_| (), 10, &executor), Ok(()));
        let multimap = group_by_with(&input, |x| *x, 10, &executor).unwrap();
        assert!(multimap.is_empty());
    }

    #[test]
    fn small_source_runs_sequentially() {
        let executor = test_executor();
        executor.shutdown();
        // Success proves the small source stayed on the calling thread.
        let input = vec![
            "alpha".to_owned(),
            "beta".to_owned(),
            "gamma".to_owned(),
            "delta".to_owned(),
            "epsilon".to_owned(),
        ];
        let result = transform_with(&input, |s| s.to_uppercase(), false, 100, &executor).unwrap();
        let expected: Vec<String> = input.iter().map(|s| s.to_uppercase()).collect();
        assert_eq!(result, expected);
    }

    #[test]
    fn task_count_of_zero_runs_sequentially() {
        let executor = test_executor();
        executor.shutdown();
        let input: Vec<u64> = (0..100).collect();
        let factory = FilterProcedureFactory::new(|x: &u64| x % 2 == 0, 100);
        let mut combiner = ListCombiner::new(false);
        for_each_in_batches(&input, &factory, &mut combiner, 10, 0, &executor).unwrap();
        let expected: Vec<u64> = (0..100).filter(|x| x % 2 == 0).collect();
        assert_eq!(combiner.into_result(), expected);
    }

    #[test]
    fn zero_batch_size_is_an_error() {
        let executor = test_executor();
        let input: Vec<u64> = (0..10).collect();
        assert_eq!(
            filter_with(&input, |_| true, false, 0, &executor),
            Err(ParallelError::InvalidBatchSize)
        );
        assert_eq!(
            transform_with(&input, |x| *x, false, 0, &executor),
            Err(ParallelError::InvalidBatchSize)
        );
        assert_eq!(
            count_with(&input, |_| true, 0, &executor),
            Err(ParallelError::InvalidBatchSize)
        );
        assert_eq!(
            for_each_with(&input, |_| (), 0, &executor),
            Err(ParallelError::InvalidBatchSize)
        );
    }

    #[test]
    fn shut_down_executor_rejects_large_sources() {
        let executor = test_executor();
        executor.shutdown();
        let input: Vec<u64> = (0..1_000).collect();
        assert_eq!(
            filter_with(&input, |_| true, false, 10, &executor),
            Err(ParallelError::Rejected(RejectedError))
        );
    }

    #[test]
    fn default_form_handles_small_sources() {
        // Below the fork threshold the default form never touches the
        // shared pool.
        let input: Vec<u64> = (1..=100).collect();
        let result = filter(&input, |x| x % 2 == 0, false).unwrap();
        let expected: Vec<u64> = (1..=100).filter(|x| x % 2 == 0).collect();
        assert_eq!(result, expected);
    }

    #[test]
    fn default_form_handles_large_sources() {
        let input: Vec<u64> = (0..3 * DEFAULT_MIN_FORK_SIZE as u64).collect();
        let result = count(&input, |x| x % 2 == 0).unwrap();
        assert_eq!(result, input.len() / 2);
    }
}
