// Copyright 2026 The parbatch developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Combiners, which merge per-batch procedures into a final result after
//! the barrier.

use crate::task::{CountProcedure, PartialResult};

/// How a [`Combiner`] wants to receive the finished procedures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CombineMode {
    /// Feed procedures through [`Combiner::combine_one`], one per call.
    OneAtATime,
    /// Feed all procedures through a single [`Combiner::combine_all`]
    /// call, letting the combiner inspect the whole set up front.
    AllAtOnce,
}

/// Merges finished per-batch procedures into a final result.
///
/// Combining always happens on the calling thread, after every batch has
/// completed. A combiner that tolerates procedures arriving in batch
/// completion order rather than source order returns `true` from
/// [`allow_reordered()`](Self::allow_reordered), which lets the runner
/// skip the order-restoring bookkeeping.
pub trait Combiner<P> {
    /// Returns how this combiner wants to receive procedures.
    fn mode(&self) -> CombineMode {
        CombineMode::OneAtATime
    }

    /// Returns whether procedures may be fed in batch completion order.
    fn allow_reordered(&self) -> bool {
        false
    }

    /// Merges one finished procedure.
    fn combine_one(&mut self, procedure: P);

    /// Merges all finished procedures.
    ///
    /// Only called when [`mode()`](Self::mode) is
    /// [`CombineMode::AllAtOnce`]. The default forwards to
    /// [`combine_one()`](Self::combine_one) in order.
    fn combine_all(&mut self, procedures: Vec<P>) {
        for procedure in procedures {
            self.combine_one(procedure);
        }
    }
}

/// A combiner for procedures that need no merging, such as side-effecting
/// visitors and procedures writing into a shared container.
pub struct PassThruCombiner;

impl<P> Combiner<P> for PassThruCombiner {
    fn allow_reordered(&self) -> bool {
        true
    }

    fn combine_one(&mut self, _procedure: P) {}
}

/// Concatenates the partial lists of collecting procedures.
pub struct ListCombiner<P: PartialResult> {
    result: Vec<P::Output>,
    mode: CombineMode,
    allow_reordered: bool,
}

impl<P: PartialResult> ListCombiner<P> {
    /// Creates a combiner that appends partial lists one at a time.
    pub fn new(allow_reordered: bool) -> Self {
        Self {
            result: Vec::new(),
            mode: CombineMode::OneAtATime,
            allow_reordered,
        }
    }

    /// Creates a combiner that receives all procedures at once and
    /// presizes the result to their combined length.
    pub fn all_at_once(allow_reordered: bool) -> Self {
        Self {
            result: Vec::new(),
            mode: CombineMode::AllAtOnce,
            allow_reordered,
        }
    }

    /// Creates a combiner that appends partial lists to an existing
    /// collection. Elements already in `target` stay in place.
    pub fn appending_to(target: Vec<P::Output>, allow_reordered: bool) -> Self {
        Self {
            result: target,
            mode: CombineMode::OneAtATime,
            allow_reordered,
        }
    }

    /// Consumes the combiner and returns the concatenated result.
    pub fn into_result(self) -> Vec<P::Output> {
        self.result
    }
}

impl<P: PartialResult> Combiner<P> for ListCombiner<P> {
    fn mode(&self) -> CombineMode {
        self.mode
    }

    fn allow_reordered(&self) -> bool {
        self.allow_reordered
    }

    fn combine_one(&mut self, procedure: P) {
        self.result.extend(procedure.into_partial());
    }

    fn combine_all(&mut self, procedures: Vec<P>) {
        let partials: Vec<Vec<P::Output>> = procedures
            .into_iter()
            .map(PartialResult::into_partial)
            .collect();
        self.result.reserve(partials.iter().map(Vec::len).sum());
        for partial in partials {
            self.result.extend(partial);
        }
    }
}

/// Sums the tallies of [`CountProcedure`]s.
///
/// Addition commutes, so reordered combining is always allowed.
pub struct CountCombiner {
    count: usize,
}

impl CountCombiner {
    /// Creates a combiner with a zero tally.
    pub fn new() -> Self {
        Self { count: 0 }
    }

    /// Returns the combined tally.
    pub fn count(&self) -> usize {
        self.count
    }
}

impl Default for CountCombiner {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ?Sized> Combiner<CountProcedure<'_, P>> for CountCombiner {
    fn allow_reordered(&self) -> bool {
        true
    }

    fn combine_one(&mut self, procedure: CountProcedure<'_, P>) {
        self.count += procedure.count();
    }
}
