// MIT License
//
// Copyright (c) 2026 The stripemap Developers
//
// Permission is hereby granted, free of charge, to any person
// obtaining a copy of this software and associated documentation files
// (the "Software"), to deal in the Software without restriction,
// including without limitation the rights to use, copy, modify, merge,
// publish, distribute, sublicense, and/or sell copies of the Software,
// and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS
// BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN
// ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! A striped-lock hash map.


use std::{
    borrow::Borrow,
    hash::{BuildHasher, Hash},
    sync::atomic::Ordering,
};

use crate::common::bucket::{EntrySlot, Node};
use crate::common::table::Table;
use crate::error::Result;

/// Default hashing algorithm: [aHash], accelerated by AES-NI on x86
/// processors. It provides some resistance to DoS attacks, but not the
/// same level as `RandomState` from the standard library.
///
/// The hashing algorithm can be chosen on a per-map basis using the
/// `with_hasher` and `with_capacity_and_hasher` methods.
///
/// [aHash]: https://docs.rs/ahash
pub type DefaultHashBuilder = ahash::RandomState;

/// Striped-lock resizeable concurrent hash map with chained buckets.
///
/// The bucket array is partitioned into `n_threads * 7` virtual segments,
/// each guarded by its own mutex; writers in disjoint segments proceed
/// concurrently, while whole-table operations (bulk traversal, rehash,
/// map-reduce, clear) take every segment. Once the number of keys
/// crosses `max_load_factor * n_buckets`, a successful insert grows the
/// bucket array, migrating nodes in parallel on the map's worker pool.
///
/// Bucket counts are drawn from a doubling sequence of primes. The table
/// never shrinks, not even on [`clear`](HashMap::clear), which resets it
/// to the initial bucket count.
///
/// Key types must implement [`Hash`] and [`Eq`]. Operations that return
/// a value by copy require `V: Clone`, as values may be removed by other
/// threads at any moment; the handler-based operations ([`map`],
/// [`apply`], [`map_reduce`]) borrow the value under the segment lock
/// instead.
///
/// [`map`]: HashMap::map
/// [`apply`]: HashMap::apply
/// [`map_reduce`]: HashMap::map_reduce
pub struct HashMap<K, V, S = DefaultHashBuilder> {
    table: Table<K, V, S>,
}

impl<K, V> HashMap<K, V, DefaultHashBuilder> {
    /// Creates an empty `HashMap` with the initial bucket count and as
    /// many workers as the global rayon pool has threads.
    pub fn new() -> Self {
        Self::with_threads_capacity_and_hasher(
            rayon::current_num_threads(),
            0,
            DefaultHashBuilder::default(),
        )
    }

    /// Creates an empty `HashMap` with at least `capacity` buckets.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_threads_capacity_and_hasher(
            rayon::current_num_threads(),
            capacity,
            DefaultHashBuilder::default(),
        )
    }
}

impl<K, V, S> HashMap<K, V, S> {
    /// Creates an empty `HashMap` that uses `build_hasher` to hash keys.
    pub fn with_hasher(build_hasher: S) -> Self {
        Self::with_threads_capacity_and_hasher(rayon::current_num_threads(), 0, build_hasher)
    }

    /// Creates an empty `HashMap` with at least `capacity` buckets that
    /// uses `build_hasher` to hash keys.
    pub fn with_capacity_and_hasher(capacity: usize, build_hasher: S) -> Self {
        Self::with_threads_capacity_and_hasher(
            rayon::current_num_threads(),
            capacity,
            build_hasher,
        )
    }

    /// Creates an empty `HashMap` sized for `n_threads` workers, with at
    /// least `capacity` buckets, that uses `build_hasher` to hash keys.
    ///
    /// `n_threads` fixes the segment count (`n_threads * 7`), the number
    /// of map-reduce accumulators, and the size of the worker pool that
    /// drives bulk traversal and rehashing.
    ///
    /// # Panics
    ///
    /// Panics if `n_threads` is zero or `capacity` exceeds the supported
    /// table size.
    pub fn with_threads_capacity_and_hasher(
        n_threads: usize,
        capacity: usize,
        build_hasher: S,
    ) -> Self {
        Self {
            table: Table::with_threads_capacity_and_hasher(n_threads, capacity, build_hasher),
        }
    }

    /// Returns the number of buckets in the current table.
    pub fn n_buckets(&self) -> usize {
        self.table.n_buckets()
    }

    /// Returns the number of keys confirmed to be in the map.
    ///
    /// The count is kept by an atomic counter, so under concurrent
    /// modification it reflects the operations that have returned to
    /// their callers.
    pub fn n_keys(&self) -> usize {
        self.table.n_keys()
    }

    /// Returns the number of keys; equivalent to [`n_keys`](Self::n_keys).
    pub fn len(&self) -> usize {
        self.n_keys()
    }

    /// Returns true if this map contains no keys.
    pub fn is_empty(&self) -> bool {
        self.n_keys() == 0
    }

    /// Returns the ratio between the number of keys and the number of
    /// buckets.
    pub fn load_factor(&self) -> f64 {
        self.n_keys() as f64 / self.n_buckets() as f64
    }

    /// Returns the load factor beyond which an insert triggers an
    /// automatic rehash.
    pub fn max_load_factor(&self) -> f64 {
        self.table.max_load_factor()
    }

    /// Sets the load factor beyond which an insert triggers an automatic
    /// rehash.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMaxLoadFactor`](crate::Error::InvalidMaxLoadFactor)
    /// if `max_load_factor` is not a positive finite number.
    pub fn set_max_load_factor(&self, max_load_factor: f64) -> Result<()> {
        self.table.set_max_load_factor(max_load_factor)
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> HashMap<K, V, S> {
    /// Sets `key` to `value`, overwriting the previous value if there
    /// was one. Returns true if the key was newly inserted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityExceeded`](crate::Error::CapacityExceeded)
    /// if the insert pushed the load factor past its maximum and the
    /// resulting rehash target is unrepresentable. The insert itself has
    /// still taken effect.
    pub fn set(&self, key: K, value: V) -> Result<bool>
    where
        K: Send,
        V: Send,
        S: Sync,
    {
        let mut inserted = false;

        self.table.apply_entry(key, |entry| match entry {
            EntrySlot::Occupied(node) => node.value = value,
            EntrySlot::Vacant(slot, key) => {
                *slot = Some(Node::boxed(key, value));

                self.table.n_keys.fetch_add(1, Ordering::Relaxed);
                inserted = true;
            }
        });

        if inserted {
            self.table.grow_if_overloaded()?;
        }

        Ok(inserted)
    }

    /// Updates the value of `key` in place with `mutator`. If the key
    /// does not exist, it is first inserted with `V::default()`. Returns
    /// true if the key was newly inserted.
    ///
    /// The mutator runs under the key's segment lock; it must not touch
    /// this map.
    ///
    /// # Errors
    ///
    /// As [`set`](Self::set).
    pub fn set_with<F>(&self, key: K, mutator: F) -> Result<bool>
    where
        K: Send,
        V: Default + Send,
        S: Sync,
        F: FnOnce(&mut V),
    {
        self.set_with_default(key, mutator, V::default())
    }

    /// Updates the value of `key` in place with `mutator`. If the key
    /// does not exist, it is first inserted with `default_value`.
    /// Returns true if the key was newly inserted.
    ///
    /// # Errors
    ///
    /// As [`set`](Self::set).
    pub fn set_with_default<F>(&self, key: K, mutator: F, default_value: V) -> Result<bool>
    where
        K: Send,
        V: Send,
        S: Sync,
        F: FnOnce(&mut V),
    {
        let mut inserted = false;

        self.table.apply_entry(key, |entry| match entry {
            EntrySlot::Occupied(node) => mutator(&mut node.value),
            EntrySlot::Vacant(slot, key) => {
                let mut value = default_value;
                mutator(&mut value);
                *slot = Some(Node::boxed(key, value));

                self.table.n_keys.fetch_add(1, Ordering::Relaxed);
                inserted = true;
            }
        });

        if inserted {
            self.table.grow_if_overloaded()?;
        }

        Ok(inserted)
    }

    /// Removes `key`. Returns true if the key was present; removing an
    /// absent key is a no-op.
    pub fn unset<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut removed = false;

        self.table.apply_with_key(key, |slot| {
            if let Some(mut node) = slot.take() {
                *slot = node.next.take();

                self.table.n_keys.fetch_sub(1, Ordering::Relaxed);
                removed = true;
            }
        });

        removed
    }

    /// Tests whether `key` is in the map.
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut found = false;

        self.table
            .apply_with_key(key, |slot| found = slot.is_some());

        found
    }

    /// Returns a copy of the value of `key`, or `None` if the key is
    /// absent.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.map(key, |value| Some(value.clone()), None)
    }

    /// Returns a copy of the value of `key`, or `default_value` if the
    /// key is absent.
    pub fn get_copy_or<Q>(&self, key: &Q, default_value: V) -> V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.map(key, V::clone, default_value)
    }

    /// Returns `mapper` applied to the value of `key`, or
    /// `default_value` if the key is absent.
    ///
    /// The mapper runs under the key's segment lock; it must not touch
    /// this map.
    pub fn map<Q, W, F>(&self, key: &Q, mapper: F, default_value: W) -> W
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&V) -> W,
    {
        let mut result = default_value;

        self.table.apply_with_key(key, |slot| {
            if let Some(node) = slot {
                result = mapper(&node.value);
            }
        });

        result
    }

    /// Invokes `handler` on the value of `key`, if it exists.
    ///
    /// The handler runs under the key's segment lock; it must not touch
    /// this map.
    pub fn apply<Q, F>(&self, key: &Q, handler: F)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&V),
    {
        self.table.apply_with_key(key, |slot| {
            if let Some(node) = slot {
                handler(&node.value);
            }
        });
    }

    /// Invokes `handler` on every entry, in parallel on the map's worker
    /// pool.
    ///
    /// Every segment lock is held for the duration, so no writer runs
    /// concurrently with the traversal and no entry is observed half
    /// written. The handler must not touch this map.
    pub fn apply_all<F>(&self, handler: F)
    where
        K: Send,
        V: Send,
        F: Fn(&K, &V) + Sync,
    {
        self.table.apply_all(|slot| {
            if let Some(node) = slot {
                handler(&node.key, &node.value);
            }
        });
    }

    /// Maps every entry through `mapper` and folds the results with
    /// `reducer`, returning `default_value` if the map is empty.
    ///
    /// Entries are mapped in parallel into one accumulator per worker;
    /// the per-worker accumulators are then folded serially. The order
    /// in which mapped values meet the reducer is unspecified, so a
    /// non-commutative reducer produces an unspecified (but valid)
    /// result.
    pub fn map_reduce<W, M, R>(&self, mapper: M, reducer: R, default_value: W) -> W
    where
        K: Send,
        V: Send,
        W: Clone + Send,
        M: Fn(&K, &V) -> W + Sync,
        R: Fn(&mut W, W) + Sync,
    {
        self.table.map_reduce(mapper, reducer, default_value)
    }

    /// Grows the table so that it holds at least `min_buckets` buckets.
    /// Does nothing if the table is already at least that large; the
    /// table never shrinks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityExceeded`](crate::Error::CapacityExceeded)
    /// if no supported bucket count satisfies the request.
    pub fn reserve(&self, min_buckets: usize) -> Result<()>
    where
        K: Send,
        V: Send,
        S: Sync,
    {
        self.table.rehash(min_buckets)
    }

    /// Removes every entry, resetting the table to its initial bucket
    /// count.
    pub fn clear(&self) {
        self.table.clear();
    }
}

impl<K, V, S: Default> Default for HashMap<K, V, S> {
    fn default() -> Self {
        Self::with_threads_capacity_and_hasher(rayon::current_num_threads(), 0, S::default())
    }
}
