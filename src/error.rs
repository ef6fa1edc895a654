// Copyright 2026 The parbatch developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error types reported by parallel operations.

use thiserror::Error;

/// Error returned when submitting work to an executor that has been shut
/// down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("executor is shut down and rejects new work")]
pub struct RejectedError;

/// Errors surfaced to the caller of a parallel operation.
///
/// These cover precondition violations and scheduling failures, both of
/// which are detected before any result is produced. A panic raised while
/// processing an element is not an error value: it is re-raised on the
/// calling thread with its original payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParallelError {
    /// The requested batch size was zero.
    #[error("batch size must be non-zero")]
    InvalidBatchSize,
    /// The executor rejected a batch submission.
    #[error(transparent)]
    Rejected(#[from] RejectedError),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejected_converts_to_parallel_error() {
        let error: ParallelError = RejectedError.into();
        assert_eq!(error, ParallelError::Rejected(RejectedError));
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            ParallelError::InvalidBatchSize.to_string(),
            "batch size must be non-zero"
        );
        assert_eq!(
            ParallelError::Rejected(RejectedError).to_string(),
            "executor is shut down and rejects new work"
        );
    }
}
