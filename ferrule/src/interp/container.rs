//! Ordered-keyed container backing arrays, records and scopes
//!
//! Slots live in a `Vec` in insertion order; keyed slots are additionally
//! indexed by a hash table of `2^order` buckets holding slot positions.
//! Growing the table only rebuilds the buckets, so iteration order never
//! depends on the bucket layout.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use rustc_hash::FxHasher;

use super::compare;
use super::value::Value;

/// Bucket order of a fresh container (8 buckets)
pub const DEFAULT_ORDER: u32 = 3;

/// Hard ceiling on the bucket order
const MAX_ORDER: u32 = 30;

#[derive(Debug, Clone, PartialEq)]
enum Slot<T> {
    /// Tombstone left behind by `delete_index`/`delete_keyed`
    Vacant,
    Occupied { key: Option<Rc<str>>, value: T },
}

/// Insertion-ordered hash table with positional access
#[derive(Clone)]
pub struct OrderedMap<T> {
    slots: Vec<Slot<T>>,
    /// Slot positions of keyed entries, in slot order within each bucket
    buckets: Vec<Vec<usize>>,
    order: u32,
    keyed: usize,
    vacant: usize,
}

impl<T> OrderedMap<T> {
    /// Create an empty container with the default bucket order
    pub fn new() -> Self {
        Self::with_order(DEFAULT_ORDER)
    }

    /// Create an empty container with `2^order` buckets
    pub fn with_order(order: u32) -> Self {
        let order = order.min(MAX_ORDER);
        OrderedMap {
            slots: Vec::new(),
            buckets: empty_buckets(order),
            order,
            keyed: 0,
            vacant: 0,
        }
    }

    /// Number of positional slots, tombstones included
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of occupied slots
    pub fn live_len(&self) -> usize {
        self.slots.len() - self.vacant
    }

    pub fn vacant_count(&self) -> usize {
        self.vacant
    }

    pub fn keyed_len(&self) -> usize {
        self.keyed
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Add a value at the next position; returns its index
    pub fn append(&mut self, value: T) -> usize {
        self.slots.push(Slot::Occupied { key: None, value });
        self.slots.len() - 1
    }

    /// Insert or replace a keyed value.
    ///
    /// Replacing keeps the slot's original position. Returns the previous
    /// value when the key already existed.
    pub fn set_keyed(&mut self, key: &str, value: T) -> Option<T> {
        if let Some(index) = self.find(key) {
            if let Slot::Occupied { value: old, .. } = &mut self.slots[index] {
                return Some(std::mem::replace(old, value));
            }
        }
        if (self.keyed + 1) * 4 > self.buckets.len() * 3 && self.order < MAX_ORDER {
            self.grow();
        }
        let index = self.slots.len();
        self.slots.push(Slot::Occupied {
            key: Some(Rc::from(key)),
            value,
        });
        let bucket = self.bucket_of(key);
        self.buckets[bucket].push(index);
        self.keyed += 1;
        None
    }

    pub fn get_keyed(&self, key: &str) -> Option<&T> {
        let index = self.find(key)?;
        self.get(index)
    }

    pub fn get_keyed_mut(&mut self, key: &str) -> Option<&mut T> {
        let index = self.find(key)?;
        self.get_mut(index)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Position of a keyed slot
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.find(key)
    }

    /// Value at a position; `None` for tombstones and out-of-range indices
    pub fn get(&self, index: usize) -> Option<&T> {
        match self.slots.get(index)? {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Vacant => None,
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        match self.slots.get_mut(index)? {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Vacant => None,
        }
    }

    /// Key of the slot at a position, if it is keyed
    pub fn key_at(&self, index: usize) -> Option<&str> {
        match self.slots.get(index)? {
            Slot::Occupied { key, .. } => key.as_deref(),
            Slot::Vacant => None,
        }
    }

    /// Overwrite the value at a position, keeping its key.
    ///
    /// Writing into a tombstone revives it as an unkeyed slot. Returns
    /// `false` when the index is past the end.
    pub fn set(&mut self, index: usize, value: T) -> bool {
        let Some(slot) = self.slots.get_mut(index) else {
            return false;
        };
        match slot {
            Slot::Occupied { value: old, .. } => *old = value,
            Slot::Vacant => {
                *slot = Slot::Occupied { key: None, value };
                self.vacant -= 1;
            }
        }
        true
    }

    /// Tombstone the slot at a position without renumbering anything
    pub fn delete_index(&mut self, index: usize) -> Option<T> {
        let slot = self.slots.get_mut(index)?;
        let Slot::Occupied { key, value } = std::mem::replace(slot, Slot::Vacant) else {
            return None;
        };
        self.vacant += 1;
        if let Some(key) = key {
            let bucket = self.bucket_of(&key);
            self.buckets[bucket].retain(|&i| i != index);
            self.keyed -= 1;
        }
        Some(value)
    }

    /// Remove a key; its slot becomes a tombstone
    pub fn delete_keyed(&mut self, key: &str) -> Option<T> {
        let index = self.find(key)?;
        self.delete_index(index)
    }

    /// Drop tombstones and renumber, preserving relative order
    pub fn compact(&mut self) {
        if self.vacant == 0 {
            return;
        }
        self.slots.retain(|slot| matches!(slot, Slot::Occupied { .. }));
        self.vacant = 0;
        self.rebuild_buckets();
    }

    /// Occupied slots in order as `(index, key, value)`
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (usize, Option<&str>, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied { key, value } => Some((index, key.as_deref(), value)),
                Slot::Vacant => None,
            })
    }

    /// Every slot in order, tombstones as `None`
    pub fn slots(&self) -> impl Iterator<Item = Option<(Option<&str>, &T)>> {
        self.slots.iter().map(|slot| match slot {
            Slot::Occupied { key, value } => Some((key.as_deref(), value)),
            Slot::Vacant => None,
        })
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.iter().filter_map(|(_, key, _)| key)
    }

    /// Occupied values in insertion order
    pub fn values(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.iter().map(|(_, _, value)| value)
    }

    /// Same layout (keys, tombstones, order) with every value mapped
    pub fn map_values<U>(&self, mut f: impl FnMut(&T) -> U) -> OrderedMap<U> {
        let slots = self
            .slots
            .iter()
            .map(|slot| match slot {
                Slot::Occupied { key, value } => Slot::Occupied {
                    key: key.clone(),
                    value: f(value),
                },
                Slot::Vacant => Slot::Vacant,
            })
            .collect();
        let mut mapped = OrderedMap {
            slots,
            buckets: Vec::new(),
            order: self.order,
            keyed: self.keyed,
            vacant: self.vacant,
        };
        mapped.rebuild_buckets();
        mapped
    }

    /// Add an entry, keyed or positional
    pub fn insert_entry(&mut self, key: Option<&str>, value: T) {
        match key {
            Some(key) => {
                self.set_keyed(key, value);
            }
            None => {
                self.append(value);
            }
        }
    }

    fn find(&self, key: &str) -> Option<usize> {
        self.buckets[self.bucket_of(key)]
            .iter()
            .copied()
            .find(|&index| matches!(&self.slots[index], Slot::Occupied { key: Some(k), .. } if &**k == key))
    }

    fn bucket_of(&self, key: &str) -> usize {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        (hasher.finish() as usize) & (self.buckets.len() - 1)
    }

    fn grow(&mut self) {
        self.order += 1;
        tracing::trace!(order = self.order, keyed = self.keyed, "growing container");
        self.rebuild_buckets();
    }

    fn rebuild_buckets(&mut self) {
        self.buckets = empty_buckets(self.order);
        self.keyed = 0;
        for index in 0..self.slots.len() {
            if let Slot::Occupied { key: Some(key), .. } = &self.slots[index] {
                let bucket = self.bucket_of(key);
                self.buckets[bucket].push(index);
                self.keyed += 1;
            }
        }
    }
}

impl<T: Clone> OrderedMap<T> {
    /// Right-biased merge.
    ///
    /// Keys from later maps override earlier values in place; positional
    /// entries are appended in input order; tombstones are skipped.
    pub fn merge<'a>(maps: impl IntoIterator<Item = &'a OrderedMap<T>>) -> OrderedMap<T>
    where
        T: 'a,
    {
        let mut merged = OrderedMap::new();
        for map in maps {
            merged.extend_from(map);
        }
        merged
    }

    /// Merge another map into this one, right-biased
    pub fn extend_from(&mut self, other: &OrderedMap<T>) {
        for (_, key, value) in other.iter() {
            self.insert_entry(key, value.clone());
        }
    }

    /// New map with slots in reverse order; keys and tombstones travel with
    /// their slots
    pub fn reverse(&self) -> OrderedMap<T> {
        let mut reversed = OrderedMap {
            slots: self.slots.iter().rev().cloned().collect(),
            buckets: Vec::new(),
            order: self.order,
            keyed: 0,
            vacant: self.vacant,
        };
        reversed.rebuild_buckets();
        reversed
    }
}

impl OrderedMap<Value> {
    /// Value at a position, with tombstones and gaps reading as `void`
    pub fn value_at(&self, index: usize) -> Value {
        self.get(index).cloned().unwrap_or_default()
    }

    /// First position whose value is script-equal to `needle`
    pub fn search(&self, needle: &Value) -> Option<usize> {
        self.iter()
            .find(|(_, _, value)| compare::equal_values(value, needle))
            .map(|(index, _, _)| index)
    }
}

impl<T> Default for OrderedMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Equality ignores bucket layout: same slots in the same order
impl<T: PartialEq> PartialEq for OrderedMap<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots
    }
}

impl<T: fmt::Debug> fmt::Debug for OrderedMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.slots()).finish()
    }
}

impl<T> FromIterator<T> for OrderedMap<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut map = OrderedMap::new();
        for value in iter {
            map.append(value);
        }
        map
    }
}

impl<'k, T> FromIterator<(&'k str, T)> for OrderedMap<T> {
    fn from_iter<I: IntoIterator<Item = (&'k str, T)>>(iter: I) -> Self {
        let mut map = OrderedMap::new();
        for (key, value) in iter {
            map.set_keyed(key, value);
        }
        map
    }
}

fn empty_buckets(order: u32) -> Vec<Vec<usize>> {
    (0..1usize << order).map(|_| Vec::new()).collect()
}
