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

//! A striped-lock hash set.

use std::{
    borrow::Borrow,
    hash::{BuildHasher, Hash},
};

use crate::error::Result;
use crate::map::{DefaultHashBuilder, HashMap};

/// Striped-lock resizeable concurrent hash set.
///
/// A thin wrapper over [`HashMap`] with the unit type as its value;
/// segment locking, automatic rehashing, and the parallel bulk
/// operations behave exactly as they do for the map.
pub struct HashSet<T, S = DefaultHashBuilder> {
    map: HashMap<T, (), S>,
}

impl<T> HashSet<T, DefaultHashBuilder> {
    /// Creates an empty `HashSet` with the initial bucket count and as
    /// many workers as the global rayon pool has threads.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Creates an empty `HashSet` with at least `capacity` buckets.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
        }
    }
}

impl<T, S> HashSet<T, S> {
    /// Creates an empty `HashSet` that uses `build_hasher` to hash keys.
    pub fn with_hasher(build_hasher: S) -> Self {
        Self {
            map: HashMap::with_hasher(build_hasher),
        }
    }

    /// Creates an empty `HashSet` with at least `capacity` buckets that
    /// uses `build_hasher` to hash keys.
    pub fn with_capacity_and_hasher(capacity: usize, build_hasher: S) -> Self {
        Self {
            map: HashMap::with_capacity_and_hasher(capacity, build_hasher),
        }
    }

    /// Creates an empty `HashSet` sized for `n_threads` workers, with at
    /// least `capacity` buckets, that uses `build_hasher` to hash keys.
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
            map: HashMap::with_threads_capacity_and_hasher(n_threads, capacity, build_hasher),
        }
    }

    /// Returns the number of buckets in the current table.
    pub fn n_buckets(&self) -> usize {
        self.map.n_buckets()
    }

    /// Returns the number of keys confirmed to be in the set.
    pub fn n_keys(&self) -> usize {
        self.map.n_keys()
    }

    /// Returns the number of keys; equivalent to [`n_keys`](Self::n_keys).
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if this set contains no keys.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the ratio between the number of keys and the number of
    /// buckets.
    pub fn load_factor(&self) -> f64 {
        self.map.load_factor()
    }

    /// Returns the load factor beyond which an insert triggers an
    /// automatic rehash.
    pub fn max_load_factor(&self) -> f64 {
        self.map.max_load_factor()
    }

    /// Sets the load factor beyond which an insert triggers an automatic
    /// rehash.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMaxLoadFactor`](crate::Error::InvalidMaxLoadFactor)
    /// if `max_load_factor` is not a positive finite number.
    pub fn set_max_load_factor(&self, max_load_factor: f64) -> Result<()> {
        self.map.set_max_load_factor(max_load_factor)
    }
}

impl<T: Hash + Eq, S: BuildHasher> HashSet<T, S> {
    /// Adds `value` to the set. Returns true if it was not already
    /// present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityExceeded`](crate::Error::CapacityExceeded)
    /// if the insert pushed the load factor past its maximum and the
    /// resulting rehash target is unrepresentable.
    pub fn add(&self, value: T) -> Result<bool>
    where
        T: Send,
        S: Sync,
    {
        self.map.set(value, ())
    }

    /// Removes `value`. Returns true if it was present; removing an
    /// absent value is a no-op.
    pub fn remove<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.unset(value)
    }

    /// Tests whether `value` is in the set.
    pub fn has<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.has(value)
    }

    /// Invokes `handler` on every key, in parallel on the set's worker
    /// pool. The handler must not touch this set.
    pub fn apply_all<F>(&self, handler: F)
    where
        T: Send,
        F: Fn(&T) + Sync,
    {
        self.map.apply_all(move |key, _| handler(key));
    }

    /// Maps every key through `mapper` and folds the results with
    /// `reducer`, returning `default_value` if the set is empty.
    pub fn map_reduce<W, M, R>(&self, mapper: M, reducer: R, default_value: W) -> W
    where
        T: Send,
        W: Clone + Send,
        M: Fn(&T) -> W + Sync,
        R: Fn(&mut W, W) + Sync,
    {
        self.map
            .map_reduce(move |key, _| mapper(key), reducer, default_value)
    }

    /// Grows the table so that it holds at least `min_buckets` buckets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityExceeded`](crate::Error::CapacityExceeded)
    /// if no supported bucket count satisfies the request.
    pub fn reserve(&self, min_buckets: usize) -> Result<()>
    where
        T: Send,
        S: Sync,
    {
        self.map.reserve(min_buckets)
    }

    /// Removes every key, resetting the table to its initial bucket
    /// count.
    pub fn clear(&self) {
        self.map.clear();
    }
}

impl<T, S: Default> Default for HashSet<T, S> {
    fn default() -> Self {
        Self {
            map: HashMap::default(),
        }
    }
}
