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

//! Striped-lock resizeable concurrent hash map and set.
//!
//! The containers in this crate partition their bucket array into
//! virtual segments, each guarded by its own mutex, so writers that land
//! in different segments never contend. Whole-table operations — bulk
//! traversal, map-reduce, and the automatic rehash that keeps the load
//! factor bounded — take every segment lock and then fan out across a
//! worker pool, with rehash migration serialized through a second,
//! independent lock domain.
//!
//! The design follows the segment-per-lock approach of striped hash
//! tables rather than lock-free schemes: every blocking point is a plain
//! mutex acquisition, and operations on the same key are totally ordered
//! by the segment lock that covers it.

pub mod error;
pub mod map;
pub mod reduce;
pub mod set;

mod common;

pub use error::{Error, Result};
pub use map::{DefaultHashBuilder, HashMap};
pub use set::HashSet;

#[cfg(test)]
mod tests {
    use super::*;

    use std::{
        sync::{Arc, Barrier},
        thread::{self, JoinHandle},
    };

    #[test]
    fn map_concurrent_insertion() {
        const MAX_VALUE: i32 = 512;
        const NUM_THREADS: usize = 64;
        const MAX_INSERTED_VALUE: i32 = (NUM_THREADS as i32) * MAX_VALUE;

        let map = Arc::new(HashMap::with_capacity(MAX_INSERTED_VALUE as usize));
        let barrier = Arc::new(Barrier::new(NUM_THREADS));

        let threads: Vec<_> = (0..NUM_THREADS)
            .map(|i| {
                let map = map.clone();
                let barrier = barrier.clone();

                thread::spawn(move || {
                    barrier.wait();

                    for j in (0..MAX_VALUE).map(|j| j + (i as i32 * MAX_VALUE)) {
                        assert_eq!(map.set(j, j), Ok(true));
                    }
                })
            })
            .collect();

        for result in threads.into_iter().map(|t| t.join()) {
            assert!(result.is_ok());
        }

        assert_eq!(map.n_keys(), MAX_INSERTED_VALUE as usize);

        for i in 0..MAX_INSERTED_VALUE {
            assert_eq!(map.get(&i), Some(i));
        }
    }

    #[test]
    fn map_concurrent_growth() {
        const MAX_VALUE: i32 = 512;
        const NUM_THREADS: usize = 64;
        const MAX_INSERTED_VALUE: i32 = (NUM_THREADS as i32) * MAX_VALUE;

        let map = Arc::new(HashMap::new());
        let barrier = Arc::new(Barrier::new(NUM_THREADS));

        let threads: Vec<_> = (0..NUM_THREADS)
            .map(|i| {
                let map = map.clone();
                let barrier = barrier.clone();

                thread::spawn(move || {
                    barrier.wait();

                    for j in (0..MAX_VALUE).map(|j| j + (i as i32 * MAX_VALUE)) {
                        assert_eq!(map.set(j, j), Ok(true));
                    }
                })
            })
            .collect();

        for result in threads.into_iter().map(|t| t.join()) {
            assert!(result.is_ok());
        }

        assert_eq!(map.n_keys(), MAX_INSERTED_VALUE as usize);
        assert!(map.n_buckets() >= MAX_INSERTED_VALUE as usize);

        for i in 0..MAX_INSERTED_VALUE {
            assert_eq!(map.get(&i), Some(i));
        }
    }

    #[test]
    fn map_concurrent_insertion_and_removal() {
        const MAX_VALUE: i32 = 512;
        const NUM_THREADS: usize = 64;
        const MAX_INSERTED_VALUE: i32 = (NUM_THREADS as i32) * MAX_VALUE * 2;
        const INSERTED_MIDPOINT: i32 = MAX_INSERTED_VALUE / 2;

        let map = Arc::new(HashMap::with_capacity(MAX_INSERTED_VALUE as usize));

        for i in INSERTED_MIDPOINT..MAX_INSERTED_VALUE {
            assert_eq!(map.set(i, i), Ok(true));
        }

        let barrier = Arc::new(Barrier::new(NUM_THREADS * 2));

        let insert_threads: Vec<_> = (0..NUM_THREADS)
            .map(|i| {
                let map = map.clone();
                let barrier = barrier.clone();

                thread::spawn(move || {
                    barrier.wait();

                    for j in (0..MAX_VALUE).map(|j| j + (i as i32 * MAX_VALUE)) {
                        assert_eq!(map.set(j, j), Ok(true));
                    }
                })
            })
            .collect();

        let remove_threads: Vec<_> = (0..NUM_THREADS)
            .map(|i| {
                let map = map.clone();
                let barrier = barrier.clone();

                thread::spawn(move || {
                    barrier.wait();

                    for j in (0..MAX_VALUE).map(|j| INSERTED_MIDPOINT + j + (i as i32 * MAX_VALUE))
                    {
                        assert!(map.unset(&j));
                    }
                })
            })
            .collect();

        for result in insert_threads
            .into_iter()
            .chain(remove_threads.into_iter())
            .map(|t| t.join())
        {
            assert!(result.is_ok());
        }

        assert_eq!(map.n_keys(), INSERTED_MIDPOINT as usize);

        for i in 0..INSERTED_MIDPOINT {
            assert_eq!(map.get(&i), Some(i));
        }

        for i in INSERTED_MIDPOINT..MAX_INSERTED_VALUE {
            assert_eq!(map.get(&i), None);
        }
    }

    #[test]
    fn map_concurrent_updates_of_one_key_serialize() {
        const NUM_THREADS: usize = 64;
        const NUM_ROUNDS: usize = 256;

        let map = Arc::new(HashMap::new());
        let barrier = Arc::new(Barrier::new(NUM_THREADS));

        let threads: Vec<_> = (0..NUM_THREADS)
            .map(|i| {
                let map = map.clone();
                let barrier = barrier.clone();

                thread::spawn(move || {
                    barrier.wait();

                    for round in 0..NUM_ROUNDS {
                        if (i + round) % 2 == 0 {
                            map.set(0, i).unwrap();
                        } else {
                            map.unset(&0);
                        }
                    }
                })
            })
            .collect();

        for result in threads.into_iter().map(JoinHandle::join) {
            assert!(result.is_ok());
        }

        // Whatever interleaving happened, the end state must look like
        // some serialization of the operations: the counter agrees with
        // membership, and a bulk traversal agrees with the counter.
        let n_keys = map.n_keys();
        assert_eq!(n_keys, usize::from(map.has(&0)));
        assert_eq!(map.map_reduce(|_, _| 1, reduce::sum, 0), n_keys);
    }

    #[test]
    fn map_concurrent_in_place_mutation() {
        const MAX_VALUE: i32 = 512;
        const NUM_THREADS: usize = 64;

        let map = Arc::new(HashMap::new());

        let threads: Vec<_> = (0..NUM_THREADS)
            .map(|_| {
                let map = map.clone();

                thread::spawn(move || {
                    for j in 0..MAX_VALUE {
                        map.set_with(j, |count: &mut i32| *count += 1).unwrap();
                    }
                })
            })
            .collect();

        for result in threads.into_iter().map(JoinHandle::join) {
            assert!(result.is_ok());
        }

        assert_eq!(map.n_keys(), MAX_VALUE as usize);

        for i in 0..MAX_VALUE {
            assert_eq!(map.get(&i), Some(NUM_THREADS as i32));
        }
    }

    #[test]
    fn map_reduce_after_concurrent_insertion() {
        const MAX_VALUE: i64 = 512;
        const NUM_THREADS: usize = 16;
        const MAX_INSERTED_VALUE: i64 = (NUM_THREADS as i64) * MAX_VALUE;

        let map = Arc::new(HashMap::new());
        let barrier = Arc::new(Barrier::new(NUM_THREADS));

        let threads: Vec<_> = (0..NUM_THREADS)
            .map(|i| {
                let map = map.clone();
                let barrier = barrier.clone();

                thread::spawn(move || {
                    barrier.wait();

                    for j in (0..MAX_VALUE).map(|j| j + (i as i64 * MAX_VALUE)) {
                        map.set(j, j).unwrap();
                    }
                })
            })
            .collect();

        for result in threads.into_iter().map(JoinHandle::join) {
            assert!(result.is_ok());
        }

        let expected_sum = MAX_INSERTED_VALUE * (MAX_INSERTED_VALUE - 1) / 2;
        assert_eq!(map.map_reduce(|_, v| *v, reduce::sum, 0), expected_sum);
        assert_eq!(
            map.map_reduce(|_, v| *v, reduce::max, 0),
            MAX_INSERTED_VALUE - 1
        );
        assert_eq!(
            map.map_reduce(|_, _| 1usize, reduce::sum, 0),
            MAX_INSERTED_VALUE as usize
        );
    }

    #[test]
    fn map_reserve_preserves_entries_and_clear_drops_them() {
        let map = HashMap::new();

        map.reserve(1_000_000).unwrap();
        assert!(map.n_buckets() >= 1_000_000);

        for i in 0..100 {
            map.set(i, i * 2).unwrap();
        }

        for i in 0..100 {
            assert_eq!(map.get(&i), Some(i * 2));
        }

        map.clear();

        assert_eq!(map.n_keys(), 0);

        for i in 0..100 {
            assert!(!map.has(&i));
        }
    }

    #[test]
    fn set_concurrent_addition() {
        const MAX_VALUE: i32 = 512;
        const NUM_THREADS: usize = 64;
        const MAX_INSERTED_VALUE: i32 = (NUM_THREADS as i32) * MAX_VALUE;

        let set = Arc::new(HashSet::new());
        let barrier = Arc::new(Barrier::new(NUM_THREADS));

        let threads: Vec<_> = (0..NUM_THREADS)
            .map(|i| {
                let set = set.clone();
                let barrier = barrier.clone();

                thread::spawn(move || {
                    barrier.wait();

                    for j in (0..MAX_VALUE).map(|j| j + (i as i32 * MAX_VALUE)) {
                        assert_eq!(set.add(j), Ok(true));
                    }
                })
            })
            .collect();

        for result in threads.into_iter().map(JoinHandle::join) {
            assert!(result.is_ok());
        }

        assert_eq!(set.n_keys(), MAX_INSERTED_VALUE as usize);
        assert!(set.n_buckets() >= MAX_INSERTED_VALUE as usize);

        for i in 0..MAX_INSERTED_VALUE {
            assert!(set.has(&i));
        }
    }

    #[test]
    fn set_concurrent_overlapping_addition() {
        const MAX_VALUE: i32 = 512;
        const NUM_THREADS: usize = 64;

        let set = Arc::new(HashSet::new());

        let threads: Vec<_> = (0..NUM_THREADS)
            .map(|_| {
                let set = set.clone();

                thread::spawn(move || {
                    for j in 0..MAX_VALUE {
                        set.add(j).unwrap();
                    }
                })
            })
            .collect();

        for result in threads.into_iter().map(JoinHandle::join) {
            assert!(result.is_ok());
        }

        assert_eq!(set.n_keys(), MAX_VALUE as usize);

        for i in 0..MAX_VALUE {
            assert!(set.has(&i));
        }
    }
}
