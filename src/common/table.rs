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

use std::{
    borrow::Borrow,
    cell::UnsafeCell,
    hash::{BuildHasher, Hash},
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
};

use crossbeam_utils::CachePadded;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, MutexGuard};
use rayon::prelude::*;

use crate::common::bucket::{self, BucketArray, EntrySlot, Link};
use crate::error::{Error, Result};

pub(crate) const N_INITIAL_BUCKETS: usize = 11;
pub(crate) const DEFAULT_MAX_LOAD_FACTOR: f64 = 1.0;

// A small prime dilutes contention between buckets that map to the same
// segment.
const N_SEGMENTS_PER_THREAD: usize = 7;

// Roughly doubling sequence of primes; bucket counts are drawn from this
// table, or from the product of a table entry with OVERSIZE_FACTOR once a
// request outgrows the largest entry.
const BUCKET_COUNTS: [u64; 29] = [
    5,
    11,
    23,
    47,
    97,
    199,
    409,
    823,
    1741,
    3469,
    6949,
    14033,
    28411,
    57557,
    116731,
    236897,
    480881,
    976369,
    1982627,
    4026031,
    8175383,
    16601593,
    33712729,
    68460391,
    139022417,
    282312799,
    573292817,
    1164186217,
    2147483647,
];

const OVERSIZE_FACTOR: u64 = 817_504_253;

/// Returns the smallest supported bucket count that is at least
/// `requested`.
pub(crate) fn next_bucket_count(requested: usize) -> Result<usize> {
    const LAST: u64 = BUCKET_COUNTS[BUCKET_COUNTS.len() - 1];

    let mut remaining = requested as u64;
    let mut scale = 1;

    if remaining > LAST {
        remaining = remaining.div_ceil(OVERSIZE_FACTOR);
        scale = OVERSIZE_FACTOR;
    }

    if remaining > LAST {
        return Err(Error::CapacityExceeded { requested });
    }

    let index = BUCKET_COUNTS.partition_point(|&count| count < remaining);

    usize::try_from(scale * BUCKET_COUNTS[index]).map_err(|_| Error::CapacityExceeded { requested })
}

/// The shared engine behind the map and set facades: an array of chain
/// heads partitioned into independently lockable segments.
///
/// Two lock domains of equal length guard the engine. The primary domain
/// serializes access to the current bucket array; the rehashing domain
/// serializes access to the destination array while a rehash is
/// migrating nodes. A thread never waits on a primary lock while holding
/// a rehashing lock, so the domains cannot deadlock against each other.
pub(crate) struct Table<K, V, S> {
    buckets: UnsafeCell<BucketArray<K, V>>,
    n_buckets: AtomicUsize,
    pub(crate) n_keys: AtomicUsize,
    max_load_factor_bits: AtomicU64,
    segment_locks: Box<[CachePadded<Mutex<()>>]>,
    rehashing_segment_locks: Box<[CachePadded<Mutex<()>>]>,
    n_segments: usize,
    n_threads: usize,
    worker_pool: OnceCell<rayon::ThreadPool>,
    build_hasher: S,
}

// The bucket array is only touched under its lock discipline: a segment
// lock for single-key access, every segment lock for bulk access and the
// array swap. Nodes cross threads during rehash, hence K: Send + V: Send.
unsafe impl<K: Send, V: Send, S: Sync> Sync for Table<K, V, S> {}

impl<K, V, S> Table<K, V, S> {
    /// # Panics
    ///
    /// Panics if `n_threads` is zero or `capacity` exceeds the supported
    /// table size.
    pub(crate) fn with_threads_capacity_and_hasher(
        n_threads: usize,
        capacity: usize,
        build_hasher: S,
    ) -> Self {
        assert!(n_threads > 0);

        let n_buckets = match next_bucket_count(capacity.max(N_INITIAL_BUCKETS)) {
            Ok(count) => count,
            Err(_) => panic!("initial bucket count {capacity} exceeds the supported table size"),
        };

        let n_segments = n_threads * N_SEGMENTS_PER_THREAD;
        let segment_locks = (0..n_segments)
            .map(|_| CachePadded::new(Mutex::new(())))
            .collect();
        let rehashing_segment_locks = (0..n_segments)
            .map(|_| CachePadded::new(Mutex::new(())))
            .collect();

        Self {
            buckets: UnsafeCell::new(BucketArray::with_len(n_buckets)),
            n_buckets: AtomicUsize::new(n_buckets),
            n_keys: AtomicUsize::new(0),
            max_load_factor_bits: AtomicU64::new(DEFAULT_MAX_LOAD_FACTOR.to_bits()),
            segment_locks,
            rehashing_segment_locks,
            n_segments,
            n_threads,
            worker_pool: OnceCell::new(),
            build_hasher,
        }
    }

    pub(crate) fn n_buckets(&self) -> usize {
        self.n_buckets.load(Ordering::Acquire)
    }

    pub(crate) fn n_keys(&self) -> usize {
        self.n_keys.load(Ordering::Relaxed)
    }

    pub(crate) fn max_load_factor(&self) -> f64 {
        f64::from_bits(self.max_load_factor_bits.load(Ordering::Relaxed))
    }

    pub(crate) fn set_max_load_factor(&self, max_load_factor: f64) -> Result<()> {
        if !max_load_factor.is_finite() || max_load_factor <= 0.0 {
            return Err(Error::InvalidMaxLoadFactor(max_load_factor));
        }

        self.max_load_factor_bits
            .store(max_load_factor.to_bits(), Ordering::Relaxed);

        Ok(())
    }

    /// Acquires the primary segment lock covering the bucket `hash` maps
    /// to under the current table, and returns the bucket index.
    ///
    /// The bucket count is sampled before the lock is taken, so a rehash
    /// may swap tables in between; since the count only ever changes
    /// while every primary lock is held, re-reading it under the lock
    /// detects that race and the acquisition retries.
    fn lock_bucket(&self, hash: u64) -> (MutexGuard<'_, ()>, usize) {
        loop {
            let snapshot = self.n_buckets.load(Ordering::Acquire);
            let bucket_id = hash as usize % snapshot;
            let guard = self.segment_locks[bucket_id % self.n_segments].lock();

            if self.n_buckets.load(Ordering::Relaxed) == snapshot {
                return (guard, bucket_id);
            }
        }
    }

    fn lock_all_segments(&self) -> FullLock<'_> {
        FullLock {
            guards: self.segment_locks.iter().map(|lock| lock.lock()).collect(),
        }
    }

    /// Replaces the table with a fresh one of the initial bucket count,
    /// dropping every node.
    pub(crate) fn clear(&self) {
        let guards = self.lock_all_segments();

        unsafe {
            *self.buckets.get() = BucketArray::with_len(N_INITIAL_BUCKETS);
        }
        self.n_buckets.store(N_INITIAL_BUCKETS, Ordering::Release);
        self.n_keys.store(0, Ordering::Relaxed);

        drop(guards);
    }

    /// The worker pool that drives bulk traversal and rehash migration.
    ///
    /// Internal parallel loops run on their own pool rather than the
    /// caller's: a thread that holds every primary lock must not steal a
    /// pending caller task, since that task may itself block on a
    /// primary lock.
    fn worker_pool(&self) -> &rayon::ThreadPool {
        self.worker_pool.get_or_init(|| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(self.n_threads)
                .build()
                .expect("failed to spawn table worker pool")
        })
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> Table<K, V, S> {
    /// Resolves `key` to its bucket under the current table and invokes
    /// `handler` on the owning slot of the matching node, or on the
    /// trailing empty slot of the chain.
    pub(crate) fn apply_with_key<Q, F>(&self, key: &Q, handler: F)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&mut Link<K, V>),
    {
        let hash = bucket::hash(&self.build_hasher, key);
        let (guard, bucket_id) = self.lock_bucket(hash);

        let chain = unsafe { (*self.buckets.get()).chain_mut(bucket_id) };
        bucket::chain_apply_with_key(chain, key, handler);

        drop(guard);
    }

    /// As [`apply_with_key`](Self::apply_with_key), but takes the key by
    /// value so `handler` can insert.
    pub(crate) fn apply_entry<F>(&self, key: K, handler: F)
    where
        F: FnOnce(EntrySlot<'_, K, V>),
    {
        let hash = bucket::hash(&self.build_hasher, &key);
        let (guard, bucket_id) = self.lock_bucket(hash);

        let chain = unsafe { (*self.buckets.get()).chain_mut(bucket_id) };
        bucket::chain_apply_entry(chain, key, handler);

        drop(guard);
    }
}

impl<K: Send, V: Send, S> Table<K, V, S> {
    /// Invokes `handler` on the owning slot of every live node, in
    /// post-order within each chain, from a parallel loop over buckets.
    ///
    /// Holds every primary segment lock for the duration, excluding all
    /// single-key operators and any other bulk operator. `handler` must
    /// not acquire primary segment locks.
    pub(crate) fn apply_all<F>(&self, handler: F)
    where
        F: Fn(&mut Link<K, V>) + Sync,
    {
        let guards = self.lock_all_segments();

        let array = unsafe { &*self.buckets.get() };
        self.worker_pool().install(|| {
            (0..array.len()).into_par_iter().for_each(|bucket_id| {
                let chain = unsafe { array.chain_mut(bucket_id) };
                bucket::chain_apply_post_order(chain, &handler);
            });
        });

        drop(guards);
    }

    /// Folds every live entry into a single value using per-worker
    /// accumulators fed from the bulk traversal, then reduces the
    /// accumulators serially.
    pub(crate) fn map_reduce<W, M, R>(&self, mapper: M, reducer: R, default: W) -> W
    where
        W: Clone + Send,
        M: Fn(&K, &V) -> W + Sync,
        R: Fn(&mut W, W) + Sync,
    {
        let accumulators: Vec<CachePadded<Mutex<W>>> = (0..self.n_threads)
            .map(|_| CachePadded::new(Mutex::new(default.clone())))
            .collect();

        self.apply_all(|slot| {
            if let Some(node) = slot {
                let mapped = mapper(&node.key, &node.value);
                let worker = rayon::current_thread_index().unwrap_or(0) % accumulators.len();

                let mut accumulator = accumulators[worker].lock();
                reducer(&mut *accumulator, mapped);
            }
        });

        let mut reduced = default;

        for accumulator in accumulators {
            reducer(&mut reduced, accumulator.into_inner().into_inner());
        }

        reduced
    }
}

impl<K: Hash + Eq + Send, V: Send, S: BuildHasher + Sync> Table<K, V, S> {
    /// Grows the table so that it holds at least `requested` buckets,
    /// migrating every node into a fresh bucket array. Never shrinks.
    ///
    /// The migration runs in parallel over source buckets while every
    /// primary lock is held; contention on destination buckets is
    /// serialized through the independent rehashing lock domain. Using
    /// the primary domain for both would self-deadlock.
    pub(crate) fn rehash(&self, requested: usize) -> Result<()> {
        let target = next_bucket_count(requested)?;
        let guards = self.lock_all_segments();

        if target <= self.n_buckets.load(Ordering::Relaxed) {
            return Ok(());
        }

        let destination = BucketArray::with_len(target);
        let source = unsafe { &*self.buckets.get() };
        let destination_ref = &destination;

        self.worker_pool().install(|| {
            (0..source.len()).into_par_iter().for_each(|bucket_id| {
                let chain = unsafe { source.chain_mut(bucket_id) };

                bucket::chain_apply_post_order(chain, &|slot: &mut Link<K, V>| {
                    let Some(mut node) = slot.take() else {
                        return;
                    };

                    // The post-order walk has already drained the tail.
                    node.next = None;

                    let new_bucket =
                        bucket::hash(&self.build_hasher, &node.key) as usize % target;
                    let segment = new_bucket % self.n_segments;

                    let lock = self.rehashing_segment_locks[segment].lock();
                    let destination_chain = unsafe { destination_ref.chain_mut(new_bucket) };
                    bucket::chain_reinsert(destination_chain, node);
                    drop(lock);
                });
            });
        });

        unsafe {
            *self.buckets.get() = destination;
        }
        self.n_buckets.store(target, Ordering::Release);

        drop(guards);

        Ok(())
    }

    /// Advisory load-factor check run after an insert created a node.
    ///
    /// The counters are sampled without a lock; a stale sample at worst
    /// triggers a rehash that observes the table already large enough
    /// under the full-segment lock and returns.
    pub(crate) fn grow_if_overloaded(&self) -> Result<()> {
        let n_keys = self.n_keys.load(Ordering::Relaxed);
        let n_buckets = self.n_buckets.load(Ordering::Relaxed);
        let max_load_factor = self.max_load_factor();

        if n_keys as f64 >= n_buckets as f64 * max_load_factor {
            self.rehash((n_keys as f64 / max_load_factor).ceil() as usize)?;
        }

        Ok(())
    }
}

/// Holds every primary segment lock; releases in reverse acquisition
/// order on drop, including during unwinding.
struct FullLock<'a> {
    guards: Vec<MutexGuard<'a, ()>>,
}

impl Drop for FullLock<'_> {
    fn drop(&mut self) {
        while self.guards.pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_counts_come_from_the_prime_table() {
        assert_eq!(next_bucket_count(0), Ok(5));
        assert_eq!(next_bucket_count(1), Ok(5));
        assert_eq!(next_bucket_count(5), Ok(5));
        assert_eq!(next_bucket_count(6), Ok(11));
        assert_eq!(next_bucket_count(11), Ok(11));
        assert_eq!(next_bucket_count(12), Ok(23));
        assert_eq!(next_bucket_count(97), Ok(97));
        assert_eq!(next_bucket_count(100), Ok(199));
        assert_eq!(next_bucket_count(1_000_000), Ok(1_982_627));
        assert_eq!(next_bucket_count(2_147_483_647), Ok(2_147_483_647));
    }

    #[test]
    fn oversize_requests_scale_the_largest_prime() {
        let requested = 3_000_000_000;
        let count = next_bucket_count(requested).unwrap();

        assert!(count >= requested);
        assert_eq!(count % OVERSIZE_FACTOR as usize, 0);
    }

    #[test]
    fn unsatisfiable_requests_are_rejected() {
        assert_eq!(
            next_bucket_count(usize::MAX),
            Err(Error::CapacityExceeded {
                requested: usize::MAX
            })
        );
    }

    #[test]
    fn returned_counts_never_undershoot() {
        for requested in (0..10_000_000).step_by(99_991) {
            assert!(next_bucket_count(requested).unwrap() >= requested);
        }
    }

    #[test]
    fn every_node_lives_in_its_home_bucket() {
        let table: Table<i32, i32, ahash::RandomState> =
            Table::with_threads_capacity_and_hasher(2, 0, ahash::RandomState::new());

        for key in 0..500 {
            table.apply_entry(key, |entry| {
                if let EntrySlot::Vacant(slot, key) = entry {
                    *slot = Some(bucket::Node::boxed(key, key));
                    table.n_keys.fetch_add(1, Ordering::Relaxed);
                }
            });
        }

        table.rehash(1000).unwrap();

        let n_buckets = table.n_buckets();
        let mut live_nodes = 0;

        for bucket_id in 0..n_buckets {
            // Exclusive access: no other thread touches the table here.
            let mut chain = unsafe { &*(*table.buckets.get()).chain_mut(bucket_id) };

            while let Some(node) = chain {
                let home = bucket::hash(&table.build_hasher, &node.key) as usize % n_buckets;
                assert_eq!(home, bucket_id);

                live_nodes += 1;
                chain = &node.next;
            }
        }

        assert_eq!(live_nodes, table.n_keys());
        assert_eq!(live_nodes, 500);
    }
}
