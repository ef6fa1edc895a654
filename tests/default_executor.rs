// Copyright 2026 The parbatch developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Lifecycle of the process-wide default executor. This lives in its own
//! test binary because shutting the shared pool down is irreversible for
//! the whole process.

use parbatch::{
    count, filter, shutdown_default_executor, ParallelError, RejectedError, DEFAULT_MIN_FORK_SIZE,
};

#[test]
fn default_executor_lifecycle() {
    let input: Vec<u64> = (0..2 * DEFAULT_MIN_FORK_SIZE as u64).collect();

    // Large enough to fork onto the shared pool.
    let evens = count(&input, |x| x % 2 == 0).unwrap();
    assert_eq!(evens, input.len() / 2);

    shutdown_default_executor();

    // Forking operations are now rejected.
    assert_eq!(
        count(&input, |x| x % 2 == 0),
        Err(ParallelError::Rejected(RejectedError))
    );

    // Small sources stay on the calling thread and still succeed.
    let small: Vec<u64> = (1..=10).collect();
    let result = filter(&small, |x| x % 2 == 0, false).unwrap();
    assert_eq!(result, vec![2, 4, 6, 8, 10]);

    // Shutting down twice is harmless.
    shutdown_default_executor();
}
