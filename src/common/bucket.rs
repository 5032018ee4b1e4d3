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
    hash::{BuildHasher, Hash, Hasher},
};

pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) next: Link<K, V>,
}

/// An owning chain slot: either a bucket head or a node's `next` field.
pub(crate) type Link<K, V> = Option<Box<Node<K, V>>>;

impl<K, V> Node<K, V> {
    pub(crate) fn boxed(key: K, value: V) -> Box<Self> {
        Box::new(Self {
            key,
            value,
            next: None,
        })
    }
}

impl<K, V> Drop for Node<K, V> {
    fn drop(&mut self) {
        // Unlink iteratively so that dropping a long chain cannot recurse
        // once per node.
        let mut next = self.next.take();

        while let Some(mut node) = next {
            next = node.next.take();
        }
    }
}

/// The owning slot a key resolves to within a chain.
pub(crate) enum EntrySlot<'a, K, V> {
    /// The node that holds the key.
    Occupied(&'a mut Node<K, V>),
    /// The empty slot at the end of the chain, with the key handed back.
    Vacant(&'a mut Link<K, V>, K),
}

/// Walks the chain rooted at `slot` and invokes `handler` on the owning
/// slot of the node matching `key`, or on the trailing empty slot if no
/// node matches.
pub(crate) fn chain_apply_with_key<'a, K, V, Q, F>(slot: &'a mut Link<K, V>, key: &Q, handler: F)
where
    K: Borrow<Q>,
    Q: Eq + ?Sized,
    F: FnOnce(&'a mut Link<K, V>),
{
    let recurse = matches!(slot, Some(node) if node.key.borrow() != key);

    if recurse {
        match slot {
            Some(node) => chain_apply_with_key(&mut node.next, key, handler),
            None => unreachable!(),
        }
    } else {
        handler(slot)
    }
}

/// As [`chain_apply_with_key`], but takes the key by value so the handler
/// can construct a node from it when the walk ends at an empty slot.
pub(crate) fn chain_apply_entry<'a, K, V, F>(slot: &'a mut Link<K, V>, key: K, handler: F)
where
    K: Eq,
    F: FnOnce(EntrySlot<'a, K, V>),
{
    let recurse = matches!(slot, Some(node) if node.key != key);

    if recurse {
        match slot {
            Some(node) => chain_apply_entry(&mut node.next, key, handler),
            None => unreachable!(),
        }
    } else {
        match slot {
            Some(node) => handler(EntrySlot::Occupied(&mut **node)),
            None => handler(EntrySlot::Vacant(slot, key)),
        }
    }
}

/// Invokes `handler` on the owning slot of every node in the chain, in
/// post-order: the tail of a chain is visited before its owner. A handler
/// may therefore detach the node it is given without the walk ever
/// touching a slot it has already surrendered.
pub(crate) fn chain_apply_post_order<K, V, F>(slot: &mut Link<K, V>, handler: &F)
where
    F: Fn(&mut Link<K, V>),
{
    match slot {
        Some(node) => chain_apply_post_order(&mut node.next, handler),
        None => return,
    }

    handler(slot);
}

/// Links an already-detached node into the chain rooted at `slot`.
///
/// Keys are unique within a table, so when this is used to migrate nodes
/// the walk always ends at the trailing empty slot.
pub(crate) fn chain_reinsert<K, V>(slot: &mut Link<K, V>, node: Box<Node<K, V>>)
where
    K: Eq,
{
    match slot {
        Some(existing) if existing.key != node.key => chain_reinsert(&mut existing.next, node),
        _ => *slot = Some(node),
    }
}

/// A fixed-length array of chain heads.
///
/// Slots are interior-mutable so that disjoint buckets can be mutated
/// from multiple workers at once; every access goes through
/// [`chain_mut`](BucketArray::chain_mut) under the table's lock
/// discipline.
pub(crate) struct BucketArray<K, V> {
    chains: Box<[UnsafeCell<Link<K, V>>]>,
}

// Chain slots are only dereferenced while the segment lock covering them
// (or every lock of the owning domain) is held, which serializes access.
unsafe impl<K: Send, V: Send> Sync for BucketArray<K, V> {}

impl<K, V> BucketArray<K, V> {
    pub(crate) fn with_len(len: usize) -> Self {
        Self {
            chains: (0..len).map(|_| UnsafeCell::new(None)).collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.chains.len()
    }

    /// # Safety
    ///
    /// The caller must hold the lock covering `bucket_id` in the domain
    /// that guards this array, or every lock of that domain.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn chain_mut(&self, bucket_id: usize) -> &mut Link<K, V> {
        &mut *self.chains[bucket_id].get()
    }
}

pub(crate) fn hash<S: BuildHasher, Q: Hash + ?Sized>(build_hasher: &S, key: &Q) -> u64 {
    let mut hasher = build_hasher.build_hasher();
    key.hash(&mut hasher);

    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_keys(mut link: &Link<i32, i32>) -> Vec<i32> {
        let mut keys = Vec::new();

        while let Some(node) = link {
            keys.push(node.key);
            link = &node.next;
        }

        keys
    }

    #[test]
    fn apply_with_key_finds_matching_slot() {
        let mut head: Link<i32, i32> = None;

        for key in 0..4 {
            chain_apply_entry(&mut head, key, |entry| {
                if let EntrySlot::Vacant(slot, key) = entry {
                    *slot = Some(Node::boxed(key, key * 10));
                }
            });
        }

        chain_apply_with_key(&mut head, &2, |slot| {
            let node = slot.as_deref().unwrap();
            assert_eq!(node.value, 20);
        });

        chain_apply_with_key(&mut head, &7, |slot| assert!(slot.is_none()));
    }

    #[test]
    fn removal_relinks_the_chain() {
        let mut head: Link<i32, i32> = None;

        for key in 0..4 {
            chain_apply_entry(&mut head, key, |entry| {
                if let EntrySlot::Vacant(slot, key) = entry {
                    *slot = Some(Node::boxed(key, key));
                }
            });
        }

        chain_apply_with_key(&mut head, &1, |slot| {
            if let Some(mut node) = slot.take() {
                *slot = node.next.take();
            }
        });

        assert_eq!(collect_keys(&head), vec![0, 2, 3]);
    }

    #[test]
    fn post_order_visits_tail_first() {
        let mut head: Link<i32, i32> = None;

        for key in 0..4 {
            chain_apply_entry(&mut head, key, |entry| {
                if let EntrySlot::Vacant(slot, key) = entry {
                    *slot = Some(Node::boxed(key, key));
                }
            });
        }

        // Detaching every visited node must drain the chain completely.
        let drained = std::sync::Mutex::new(Vec::new());
        chain_apply_post_order(&mut head, &|slot: &mut Link<i32, i32>| {
            if let Some(mut node) = slot.take() {
                node.next = None;
                drained.lock().unwrap().push(node.key);
            }
        });

        assert!(head.is_none());
        assert_eq!(drained.into_inner().unwrap(), vec![3, 2, 1, 0]);
    }

    #[test]
    fn long_chains_drop_without_overflowing() {
        let mut head: Link<i32, i32> = None;

        for key in 0..100_000 {
            let mut node = Node::boxed(key, key);
            node.next = head.take();
            head = Some(node);
        }
    }
}
