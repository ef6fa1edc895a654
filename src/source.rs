// Copyright 2026 The parbatch developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Sources that parallel operations iterate over, and how they split into
//! batches.

/// A collection that can be visited in contiguous batches.
///
/// Flat sources such as slices split into `batch_count` ranges of
/// near-equal length. Sources with internal structure can override
/// [`negotiated_batch_count()`](Self::negotiated_batch_count) to expose
/// their natural batches instead, in which case fewer batches than
/// requested may run.
pub trait BatchSource: Sync {
    /// The type of elements in this source.
    type Item: Sync;

    /// Returns the number of elements in this source.
    fn size(&self) -> usize;

    /// Returns whether this source has no elements.
    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Returns the number of batches this source actually splits into when
    /// asked for `task_count` batches.
    ///
    /// The result is at most `task_count` and at most
    /// [`size()`](Self::size), so that no batch is empty.
    fn negotiated_batch_count(&self, task_count: usize) -> usize {
        self.size().min(task_count)
    }

    /// Visits every element of the batch at `index`, in source order.
    ///
    /// `batch_count` must be a value returned by
    /// [`negotiated_batch_count()`](Self::negotiated_batch_count), and
    /// `index` must be smaller than it. Taken together over all indices,
    /// the batches visit each element exactly once.
    fn for_each_in_batch(&self, index: usize, batch_count: usize, f: impl FnMut(&Self::Item));

    /// Visits every element of this source, in source order.
    fn for_each(&self, f: impl FnMut(&Self::Item)) {
        if !self.is_empty() {
            self.for_each_in_batch(0, 1, f);
        }
    }
}

/// A batch source whose elements have stable positions.
///
/// Each batch knows the offset it starts at, so a procedure can observe
/// every element together with its index in the whole source. Only
/// random-access sources can provide this; bucketed sources have no
/// meaningful per-element position.
pub trait IndexedBatchSource: BatchSource {
    /// Visits every element of the batch at `index` together with its
    /// position in the whole source.
    ///
    /// Same contract as
    /// [`for_each_in_batch()`](BatchSource::for_each_in_batch), with the
    /// position passed as the first argument of `f`.
    fn for_each_in_batch_with_index(
        &self,
        index: usize,
        batch_count: usize,
        f: impl FnMut(usize, &Self::Item),
    );

    /// Visits every element of this source with its position, in source
    /// order.
    fn for_each_with_index(&self, f: impl FnMut(usize, &Self::Item)) {
        if !self.is_empty() {
            self.for_each_in_batch_with_index(0, 1, f);
        }
    }
}

impl<T: Sync> BatchSource for [T] {
    type Item = T;

    fn size(&self) -> usize {
        self.len()
    }

    fn for_each_in_batch(&self, index: usize, batch_count: usize, mut f: impl FnMut(&T)) {
        // Proportional split: ranges differ in length by at most one, and
        // consecutive indices tile the slice exactly.
        let len = self.len();
        let start = (index * len) / batch_count;
        let end = ((index + 1) * len) / batch_count;
        for item in &self[start..end] {
            f(item);
        }
    }
}

impl<T: Sync> IndexedBatchSource for [T] {
    fn for_each_in_batch_with_index(
        &self,
        index: usize,
        batch_count: usize,
        mut f: impl FnMut(usize, &T),
    ) {
        let len = self.len();
        let start = (index * len) / batch_count;
        let end = ((index + 1) * len) / batch_count;
        for (offset, item) in self[start..end].iter().enumerate() {
            f(start + offset, item);
        }
    }
}

impl<T: Sync> BatchSource for Vec<T> {
    type Item = T;

    fn size(&self) -> usize {
        self.len()
    }

    fn negotiated_batch_count(&self, task_count: usize) -> usize {
        self.as_slice().negotiated_batch_count(task_count)
    }

    fn for_each_in_batch(&self, index: usize, batch_count: usize, f: impl FnMut(&T)) {
        self.as_slice().for_each_in_batch(index, batch_count, f)
    }
}

impl<T: Sync> IndexedBatchSource for Vec<T> {
    fn for_each_in_batch_with_index(
        &self,
        index: usize,
        batch_count: usize,
        f: impl FnMut(usize, &T),
    ) {
        self.as_slice()
            .for_each_in_batch_with_index(index, batch_count, f)
    }
}
