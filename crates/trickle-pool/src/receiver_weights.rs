//! Order-preserving receiver → weight mapping with self-compacting enumeration.
//!
//! The set is a singly linked list threaded through a `HashMap`. The list
//! head plays the role of the root sentinel, [`Next::End`] terminates the
//! list, and an id absent from the map has never been linked (or has been
//! compacted away). Writes are O(1) and never walk the list:
//!
//! - a never-linked id is inserted directly after the root,
//! - a linked id (even one whose weight was zeroed) is updated in place.
//!
//! Zero-weight nodes stay linked until the next [`iter_compact`] passes over
//! them, which unlinks and drops them. Reads are therefore also compactions.
//!
//! [`iter_compact`]: ReceiverWeights::iter_compact

use std::collections::HashMap;

use trickle_core::types::AccountId;

/// Pointer to the following node of the list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Next {
    End,
    Node(AccountId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Link {
    next: Next,
    weight: u32,
}

/// Weighted receiver set of a single sender.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiverWeights {
    head: Next,
    links: HashMap<AccountId, Link>,
}

impl Default for ReceiverWeights {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiverWeights {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            head: Next::End,
            links: HashMap::new(),
        }
    }

    /// Set the weight of `receiver`, returning the previous weight.
    ///
    /// Zero removes the receiver logically; its node is reclaimed by the next
    /// compacting enumeration. Setting zero on a never-linked receiver is a no-op.
    pub fn set_weight(&mut self, receiver: AccountId, weight: u32) -> u32 {
        if let Some(link) = self.links.get_mut(&receiver) {
            return std::mem::replace(&mut link.weight, weight);
        }
        if weight == 0 {
            return 0;
        }
        self.links.insert(
            receiver,
            Link {
                next: self.head,
                weight,
            },
        );
        self.head = Next::Node(receiver);
        0
    }

    /// Current weight of `receiver` (0 if absent or removed).
    pub fn weight(&self, receiver: &AccountId) -> u32 {
        self.links.get(receiver).map_or(0, |l| l.weight)
    }

    /// Number of nodes still linked, including zero-weight ones not yet compacted.
    pub fn linked_len(&self) -> usize {
        self.links.len()
    }

    /// Enumerate live receivers in list order, unlinking every zero-weight
    /// node passed on the way.
    ///
    /// The iterator is lazy: dropping it early leaves the unvisited tail as is.
    pub fn iter_compact(&mut self) -> CompactingIter<'_> {
        let cursor = self.head;
        CompactingIter {
            list: self,
            prev: None,
            cursor,
        }
    }
}

/// Compacting iterator returned by [`ReceiverWeights::iter_compact`].
pub struct CompactingIter<'a> {
    list: &'a mut ReceiverWeights,
    /// Last live node yielded; `None` means the root.
    prev: Option<AccountId>,
    cursor: Next,
}

impl Iterator for CompactingIter<'_> {
    type Item = (AccountId, u32);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Next::Node(id) = self.cursor else {
                return None;
            };
            let link = *self.list.links.get(&id)?;
            self.cursor = link.next;
            if link.weight > 0 {
                self.prev = Some(id);
                return Some((id, link.weight));
            }
            match self.prev {
                None => self.list.head = link.next,
                Some(prev) => {
                    if let Some(prev_link) = self.list.links.get_mut(&prev) {
                        prev_link.next = link.next;
                    }
                }
            }
            self.list.links.remove(&id);
        }
    }
}
