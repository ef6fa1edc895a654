// Copyright 2026 The parbatch developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Per-batch procedures and the factories that mint them.
//!
//! A procedure visits the elements of one batch and accumulates a private
//! partial result. The factory creates one fresh procedure per batch, so
//! concurrently running batches never share mutable state. After the
//! barrier, the combiner consumes the procedures to build the final result.

use crate::multimap::SyncMultimap;
use std::hash::Hash;
use std::marker::PhantomData;

/// A stateful visitor applied to every element of one batch.
pub trait BatchProcedure<T> {
    /// Processes one element.
    fn apply(&mut self, item: &T);
}

/// A factory creating one [`BatchProcedure`] per batch.
///
/// The factory itself is shared across worker threads; the procedures it
/// creates are not.
pub trait ProcedureFactory<T> {
    /// The type of procedures created by this factory.
    type Procedure<'a>: BatchProcedure<T> + Send + 'a
    where
        Self: 'a,
        T: 'a;

    /// Creates a fresh procedure for one batch.
    fn create<'a>(&'a self) -> Self::Procedure<'a>
    where
        T: 'a;
}

/// A stateful visitor applied to every element of one batch together with
/// the element's position in the whole source.
pub trait IndexedBatchProcedure<T> {
    /// Processes one element at position `index`.
    fn apply_with_index(&mut self, index: usize, item: &T);
}

/// A factory creating one [`IndexedBatchProcedure`] per batch.
pub trait IndexedProcedureFactory<T> {
    /// The type of procedures created by this factory.
    type Procedure<'a>: IndexedBatchProcedure<T> + Send + 'a
    where
        Self: 'a,
        T: 'a;

    /// Creates a fresh procedure for one batch.
    fn create<'a>(&'a self) -> Self::Procedure<'a>
    where
        T: 'a;
}

/// A procedure whose accumulated state is a list of output elements.
pub trait PartialResult {
    /// The type of output elements.
    type Output;

    /// Consumes the procedure and returns its partial result.
    fn into_partial(self) -> Vec<Self::Output>;
}

/// Applies a side-effecting action to each element, accumulating nothing.
pub struct PassThruProcedure<'a, A: ?Sized> {
    action: &'a A,
}

impl<T, A: Fn(&T) + ?Sized> BatchProcedure<T> for PassThruProcedure<'_, A> {
    fn apply(&mut self, item: &T) {
        (self.action)(item)
    }
}

/// Factory for [`PassThruProcedure`].
pub struct PassThruProcedureFactory<A> {
    action: A,
}

impl<A> PassThruProcedureFactory<A> {
    /// Wraps a side-effecting action.
    pub fn new(action: A) -> Self {
        Self { action }
    }
}

impl<T, A: Fn(&T) + Sync> ProcedureFactory<T> for PassThruProcedureFactory<A> {
    type Procedure<'a>
        = PassThruProcedure<'a, A>
    where
        Self: 'a,
        T: 'a;

    fn create<'a>(&'a self) -> Self::Procedure<'a>
    where
        T: 'a,
    {
        PassThruProcedure {
            action: &self.action,
        }
    }
}

/// Applies a side-effecting action to each element and its position,
/// accumulating nothing.
pub struct PassThruIndexedProcedure<'a, A: ?Sized> {
    action: &'a A,
}

impl<T, A: Fn(usize, &T) + ?Sized> IndexedBatchProcedure<T> for PassThruIndexedProcedure<'_, A> {
    fn apply_with_index(&mut self, index: usize, item: &T) {
        (self.action)(index, item)
    }
}

/// Factory for [`PassThruIndexedProcedure`].
pub struct PassThruIndexedProcedureFactory<A> {
    action: A,
}

impl<A> PassThruIndexedProcedureFactory<A> {
    /// Wraps a side-effecting action taking an element and its position.
    pub fn new(action: A) -> Self {
        Self { action }
    }
}

impl<T, A: Fn(usize, &T) + Sync> IndexedProcedureFactory<T> for PassThruIndexedProcedureFactory<A> {
    type Procedure<'a>
        = PassThruIndexedProcedure<'a, A>
    where
        Self: 'a,
        T: 'a;

    fn create<'a>(&'a self) -> Self::Procedure<'a>
    where
        T: 'a,
    {
        PassThruIndexedProcedure {
            action: &self.action,
        }
    }
}

/// Collects the elements matching a predicate, in batch order.
pub struct FilterProcedure<'a, T, P: ?Sized> {
    predicate: &'a P,
    collection: Vec<T>,
}

impl<T: Clone + Send, P: Fn(&T) -> bool + ?Sized> BatchProcedure<T> for FilterProcedure<'_, T, P> {
    fn apply(&mut self, item: &T) {
        if (self.predicate)(item) {
            self.collection.push(item.clone());
        }
    }
}

impl<T, P: ?Sized> PartialResult for FilterProcedure<'_, T, P> {
    type Output = T;

    fn into_partial(self) -> Vec<T> {
        self.collection
    }
}

/// Factory for [`FilterProcedure`].
pub struct FilterProcedureFactory<P> {
    predicate: P,
    capacity: usize,
}

impl<P> FilterProcedureFactory<P> {
    /// Wraps a predicate; `capacity` is the expected batch size, used to
    /// presize each procedure's collection.
    pub fn new(predicate: P, capacity: usize) -> Self {
        Self {
            predicate,
            capacity,
        }
    }
}

impl<T: Clone + Send + Sync, P: Fn(&T) -> bool + Sync> ProcedureFactory<T>
    for FilterProcedureFactory<P>
{
    type Procedure<'a>
        = FilterProcedure<'a, T, P>
    where
        Self: 'a,
        T: 'a;

    fn create<'a>(&'a self) -> Self::Procedure<'a>
    where
        T: 'a,
    {
        FilterProcedure {
            predicate: &self.predicate,
            collection: Vec::with_capacity(self.capacity),
        }
    }
}

/// Collects the elements rejected by a predicate, in batch order.
pub struct FilterNotProcedure<'a, T, P: ?Sized> {
    predicate: &'a P,
    collection: Vec<T>,
}

impl<T: Clone + Send, P: Fn(&T) -> bool + ?Sized> BatchProcedure<T>
    for FilterNotProcedure<'_, T, P>
{
    fn apply(&mut self, item: &T) {
        if !(self.predicate)(item) {
            self.collection.push(item.clone());
        }
    }
}

impl<T, P: ?Sized> PartialResult for FilterNotProcedure<'_, T, P> {
    type Output = T;

    fn into_partial(self) -> Vec<T> {
        self.collection
    }
}

/// Factory for [`FilterNotProcedure`].
pub struct FilterNotProcedureFactory<P> {
    predicate: P,
    capacity: usize,
}

impl<P> FilterNotProcedureFactory<P> {
    /// Wraps a predicate; `capacity` is the expected batch size.
    pub fn new(predicate: P, capacity: usize) -> Self {
        Self {
            predicate,
            capacity,
        }
    }
}

impl<T: Clone + Send + Sync, P: Fn(&T) -> bool + Sync> ProcedureFactory<T>
    for FilterNotProcedureFactory<P>
{
    type Procedure<'a>
        = FilterNotProcedure<'a, T, P>
    where
        Self: 'a,
        T: 'a;

    fn create<'a>(&'a self) -> Self::Procedure<'a>
    where
        T: 'a,
    {
        FilterNotProcedure {
            predicate: &self.predicate,
            collection: Vec::with_capacity(self.capacity),
        }
    }
}

/// Maps each element through a function, collecting the outputs in batch
/// order.
pub struct TransformProcedure<'a, V, F: ?Sized> {
    function: &'a F,
    collection: Vec<V>,
}

impl<T, V: Send, F: Fn(&T) -> V + ?Sized> BatchProcedure<T> for TransformProcedure<'_, V, F> {
    fn apply(&mut self, item: &T) {
        self.collection.push((self.function)(item));
    }
}

impl<V, F: ?Sized> PartialResult for TransformProcedure<'_, V, F> {
    type Output = V;

    fn into_partial(self) -> Vec<V> {
        self.collection
    }
}

/// Factory for [`TransformProcedure`].
pub struct TransformProcedureFactory<V, F> {
    function: F,
    capacity: usize,
    _output: PhantomData<fn() -> V>,
}

impl<V, F> TransformProcedureFactory<V, F> {
    /// Wraps a mapping function; `capacity` is the expected batch size,
    /// which for a transform is also the exact output size.
    pub fn new(function: F, capacity: usize) -> Self {
        Self {
            function,
            capacity,
            _output: PhantomData,
        }
    }
}

impl<T: Sync, V: Send, F: Fn(&T) -> V + Sync> ProcedureFactory<T>
    for TransformProcedureFactory<V, F>
{
    type Procedure<'a>
        = TransformProcedure<'a, V, F>
    where
        Self: 'a,
        T: 'a;

    fn create<'a>(&'a self) -> Self::Procedure<'a>
    where
        T: 'a,
    {
        TransformProcedure {
            function: &self.function,
            collection: Vec::with_capacity(self.capacity),
        }
    }
}

/// Maps the elements matching a predicate, collecting the outputs in batch
/// order.
pub struct TransformIfProcedure<'a, V, F: ?Sized, P: ?Sized> {
    function: &'a F,
    predicate: &'a P,
    collection: Vec<V>,
}

impl<T, V: Send, F: Fn(&T) -> V + ?Sized, P: Fn(&T) -> bool + ?Sized> BatchProcedure<T>
    for TransformIfProcedure<'_, V, F, P>
{
    fn apply(&mut self, item: &T) {
        if (self.predicate)(item) {
            self.collection.push((self.function)(item));
        }
    }
}

impl<V, F: ?Sized, P: ?Sized> PartialResult for TransformIfProcedure<'_, V, F, P> {
    type Output = V;

    fn into_partial(self) -> Vec<V> {
        self.collection
    }
}

/// Factory for [`TransformIfProcedure`].
pub struct TransformIfProcedureFactory<V, F, P> {
    function: F,
    predicate: P,
    capacity: usize,
    _output: PhantomData<fn() -> V>,
}

impl<V, F, P> TransformIfProcedureFactory<V, F, P> {
    /// Wraps a predicate and a mapping function; `capacity` is the
    /// expected batch size.
    pub fn new(function: F, predicate: P, capacity: usize) -> Self {
        Self {
            function,
            predicate,
            capacity,
            _output: PhantomData,
        }
    }
}

impl<T: Sync, V: Send, F: Fn(&T) -> V + Sync, P: Fn(&T) -> bool + Sync> ProcedureFactory<T>
    for TransformIfProcedureFactory<V, F, P>
{
    type Procedure<'a>
        = TransformIfProcedure<'a, V, F, P>
    where
        Self: 'a,
        T: 'a;

    fn create<'a>(&'a self) -> Self::Procedure<'a>
    where
        T: 'a,
    {
        TransformIfProcedure {
            function: &self.function,
            predicate: &self.predicate,
            collection: Vec::with_capacity(self.capacity),
        }
    }
}

/// Maps each element to an iterable and flattens the outputs, in batch
/// order.
pub struct FlatTransformProcedure<'a, I: IntoIterator, F: ?Sized> {
    function: &'a F,
    collection: Vec<I::Item>,
}

impl<T, I: IntoIterator, F: Fn(&T) -> I + ?Sized> BatchProcedure<T>
    for FlatTransformProcedure<'_, I, F>
where
    I::Item: Send,
{
    fn apply(&mut self, item: &T) {
        self.collection.extend((self.function)(item));
    }
}

impl<I: IntoIterator, F: ?Sized> PartialResult for FlatTransformProcedure<'_, I, F> {
    type Output = I::Item;

    fn into_partial(self) -> Vec<I::Item> {
        self.collection
    }
}

/// Factory for [`FlatTransformProcedure`].
pub struct FlatTransformProcedureFactory<I, F> {
    function: F,
    capacity: usize,
    _output: PhantomData<fn() -> I>,
}

impl<I, F> FlatTransformProcedureFactory<I, F> {
    /// Wraps a function mapping each element to an iterable; `capacity` is
    /// the expected batch size, a lower bound on the output size.
    pub fn new(function: F, capacity: usize) -> Self {
        Self {
            function,
            capacity,
            _output: PhantomData,
        }
    }
}

impl<T: Sync, I: IntoIterator, F: Fn(&T) -> I + Sync> ProcedureFactory<T>
    for FlatTransformProcedureFactory<I, F>
where
    I::Item: Send,
{
    type Procedure<'a>
        = FlatTransformProcedure<'a, I, F>
    where
        Self: 'a,
        T: 'a;

    fn create<'a>(&'a self) -> Self::Procedure<'a>
    where
        T: 'a,
    {
        FlatTransformProcedure {
            function: &self.function,
            collection: Vec::with_capacity(self.capacity),
        }
    }
}

/// Counts the elements matching a predicate.
pub struct CountProcedure<'a, P: ?Sized> {
    predicate: &'a P,
    count: usize,
}

impl<P: ?Sized> CountProcedure<'_, P> {
    /// Returns the number of matching elements seen so far.
    pub fn count(&self) -> usize {
        self.count
    }
}

impl<T, P: Fn(&T) -> bool + ?Sized> BatchProcedure<T> for CountProcedure<'_, P> {
    fn apply(&mut self, item: &T) {
        if (self.predicate)(item) {
            self.count += 1;
        }
    }
}

/// Factory for [`CountProcedure`].
pub struct CountProcedureFactory<P> {
    predicate: P,
}

impl<P> CountProcedureFactory<P> {
    /// Wraps a predicate.
    pub fn new(predicate: P) -> Self {
        Self { predicate }
    }
}

impl<T: Sync, P: Fn(&T) -> bool + Sync> ProcedureFactory<T> for CountProcedureFactory<P> {
    type Procedure<'a>
        = CountProcedure<'a, P>
    where
        Self: 'a,
        T: 'a;

    fn create<'a>(&'a self) -> Self::Procedure<'a>
    where
        T: 'a,
    {
        CountProcedure {
            predicate: &self.predicate,
            count: 0,
        }
    }
}

/// Groups each element under a computed key, writing directly into a
/// shared [`SyncMultimap`].
///
/// Unlike the collecting procedures, this one accumulates no private
/// state: the multimap's internal lock is the synchronization point, so
/// the combine phase has nothing left to do.
pub struct MultimapPutProcedure<'a, K, V, G: ?Sized> {
    multimap: &'a SyncMultimap<K, V>,
    function: &'a G,
}

impl<K: Eq + Hash, V: Clone, G: Fn(&V) -> K + ?Sized> BatchProcedure<V>
    for MultimapPutProcedure<'_, K, V, G>
{
    fn apply(&mut self, item: &V) {
        self.multimap.put((self.function)(item), item.clone());
    }
}

/// Factory for [`MultimapPutProcedure`].
pub struct MultimapPutProcedureFactory<'m, K, V, G> {
    multimap: &'m SyncMultimap<K, V>,
    function: G,
}

impl<'m, K, V, G> MultimapPutProcedureFactory<'m, K, V, G> {
    /// Wraps a key function and the multimap to group into.
    pub fn new(multimap: &'m SyncMultimap<K, V>, function: G) -> Self {
        Self { multimap, function }
    }
}

impl<K, V, G> ProcedureFactory<V> for MultimapPutProcedureFactory<'_, K, V, G>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
    G: Fn(&V) -> K + Sync,
{
    type Procedure<'a>
        = MultimapPutProcedure<'a, K, V, G>
    where
        Self: 'a,
        V: 'a;

    fn create<'a>(&'a self) -> Self::Procedure<'a>
    where
        V: 'a,
    {
        MultimapPutProcedure {
            multimap: self.multimap,
            function: &self.function,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn apply_all<T>(procedure: &mut impl BatchProcedure<T>, items: &[T]) {
        for item in items {
            procedure.apply(item);
        }
    }

    #[test]
    fn filter_keeps_matching_elements() {
        let factory = FilterProcedureFactory::new(|x: &u64| x % 2 == 0, 4);
        let mut procedure = factory.create();
        apply_all(&mut procedure, &[1u64, 2, 3, 4, 5, 6]);
        assert_eq!(procedure.into_partial(), vec![2, 4, 6]);
    }

    #[test]
    fn filter_not_keeps_rejected_elements() {
        let factory = FilterNotProcedureFactory::new(|x: &u64| x % 2 == 0, 4);
        let mut procedure = factory.create();
        apply_all(&mut procedure, &[1u64, 2, 3, 4, 5, 6]);
        assert_eq!(procedure.into_partial(), vec![1, 3, 5]);
    }

    #[test]
    fn transform_maps_every_element() {
        let factory = TransformProcedureFactory::new(|x: &u64| x * 10, 4);
        let mut procedure = factory.create();
        apply_all(&mut procedure, &[1u64, 2, 3]);
        assert_eq!(procedure.into_partial(), vec![10, 20, 30]);
    }

    #[test]
    fn transform_if_maps_matching_elements() {
        let factory = TransformIfProcedureFactory::new(|x: &u64| x * 10, |x: &u64| x % 2 == 1, 4);
        let mut procedure = factory.create();
        apply_all(&mut procedure, &[1u64, 2, 3, 4]);
        assert_eq!(procedure.into_partial(), vec![10, 30]);
    }

    #[test]
    fn flat_transform_flattens_outputs() {
        let factory = FlatTransformProcedureFactory::new(|x: &u64| vec![*x, *x + 100], 4);
        let mut procedure = factory.create();
        apply_all(&mut procedure, &[1u64, 2]);
        assert_eq!(procedure.into_partial(), vec![1, 101, 2, 102]);
    }

    #[test]
    fn count_tallies_matching_elements() {
        let factory = CountProcedureFactory::new(|x: &u64| *x > 2);
        let mut procedure = factory.create();
        apply_all(&mut procedure, &[1u64, 2, 3, 4, 5]);
        assert_eq!(procedure.count(), 3);
    }

    #[test]
    fn indexed_pass_thru_sees_positions() {
        use std::sync::Mutex;
        let seen = Mutex::new(Vec::new());
        let factory =
            PassThruIndexedProcedureFactory::new(|i, x: &u64| seen.lock().unwrap().push((i, *x)));
        let mut procedure = factory.create();
        procedure.apply_with_index(3, &30);
        procedure.apply_with_index(4, &40);
        assert_eq!(*seen.lock().unwrap(), vec![(3, 30), (4, 40)]);
    }

    #[test]
    fn factories_mint_independent_procedures() {
        let factory = FilterProcedureFactory::new(|x: &u64| *x > 0, 4);
        let mut first = factory.create();
        let mut second = factory.create();
        first.apply(&1);
        second.apply(&2);
        assert_eq!(first.into_partial(), vec![1]);
        assert_eq!(second.into_partial(), vec![2]);
    }

    #[test]
    fn multimap_put_groups_under_keys() {
        let multimap = SyncMultimap::new();
        let factory = MultimapPutProcedureFactory::new(&multimap, |x: &u64| x % 3);
        let mut procedure = factory.create();
        apply_all(&mut procedure, &[0u64, 1, 2, 3, 4, 5]);
        assert_eq!(multimap.key_count(), 3);
        assert_eq!(multimap.with_values(&0, |values| values.to_vec()), Some(vec![0, 3]));
        assert_eq!(multimap.with_values(&1, |values| values.to_vec()), Some(vec![1, 4]));
        assert_eq!(multimap.with_values(&2, |values| values.to_vec()), Some(vec![2, 5]));
    }
}
