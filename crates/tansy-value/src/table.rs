//! Open-addressed hash table with tombstones (§4.5), used for both the
//! VM's `globals` table and the process-wide string intern pool.

use crate::heap::Heap;
use crate::object::ObjRef;
use crate::value::Value;

const MAX_LOAD_FACTOR: f64 = 0.75;
const MIN_CAPACITY: usize = 8;

#[derive(Clone, Copy, Debug)]
struct Entry {
    key: Option<ObjRef>,
    value: Value,
}

impl Default for Entry {
    fn default() -> Self {
        Entry { key: None, value: Value::Nil }
    }
}

impl Entry {
    fn is_empty(&self) -> bool {
        self.key.is_none() && self.value == Value::Nil
    }
}

/// An open-addressed map from interned strings to [`Value`]s.
///
/// `count` tracks occupied-or-tombstone slots; `tombstone_count` tracks how
/// many of those are tombstones, so `count - tombstone_count` is the
/// number of live entries (§3's Table invariant).
#[derive(Clone, Debug, Default)]
pub struct Table {
    entries: Vec<Entry>,
    count: usize,
    tombstone_count: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn live_count(&self) -> usize {
        self.count - self.tombstone_count
    }

    /// Inserts `value` under `key`, growing the table first if this
    /// insertion would exceed the 0.75 load factor target. Returns `true`
    /// if `key` was not previously present (an "isNew" insert).
    pub fn set(&mut self, heap: &Heap, key: ObjRef, value: Value) -> bool {
        if self.entries.is_empty() || (self.count + 1) as f64 > self.entries.len() as f64 * MAX_LOAD_FACTOR {
            self.grow(heap);
        }
        let hash = heap.string_hash(key);
        let idx = find_slot(&self.entries, hash, |k| k == key);
        let entry = &mut self.entries[idx];
        let is_new = entry.key.is_none();
        if is_new && entry.is_empty() {
            self.count += 1;
        } else if is_new {
            // Reusing a tombstone slot: still a new key, but the slot was
            // already counted in `count`.
        }
        entry.key = Some(key);
        entry.value = value;
        is_new
    }

    /// Looks up `key`; tombstones are skipped over, empty slots terminate
    /// the probe.
    pub fn get(&self, heap: &Heap, key: ObjRef) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }
        let hash = heap.string_hash(key);
        let idx = find_slot(&self.entries, hash, |k| k == key);
        self.entries[idx].key.map(|_| self.entries[idx].value)
    }

    /// Marks `key`'s slot as a tombstone so later probes past it still
    /// find entries placed further down the chain. Returns whether `key`
    /// was present.
    pub fn delete(&mut self, heap: &Heap, key: ObjRef) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let hash = heap.string_hash(key);
        let idx = find_slot(&self.entries, hash, |k| k == key);
        if self.entries[idx].key.is_none() {
            return false;
        }
        self.entries[idx] = Entry { key: None, value: Value::Bool(true) };
        self.tombstone_count += 1;
        true
    }

    /// Probes for an existing interned string with identical bytes,
    /// comparing hash and content rather than identity (there is no
    /// `ObjRef` yet for the candidate bytes) -- `tableFindString` in §4.5.
    pub fn find_string(&self, heap: &Heap, bytes: &[u8], hash: u32) -> Option<ObjRef> {
        if self.entries.is_empty() {
            return None;
        }
        let capacity = self.entries.len();
        let mut index = (hash as usize) % capacity;
        loop {
            let entry = &self.entries[index];
            match entry.key {
                None if entry.is_empty() => return None,
                None => {} // tombstone, keep probing
                Some(k) => {
                    let s = heap.get_string(k);
                    if s.hash == hash && s.as_bytes() == bytes {
                        return Some(k);
                    }
                }
            }
            index = (index + 1) % capacity;
        }
    }

    fn grow(&mut self, heap: &Heap) {
        let new_capacity = if self.entries.is_empty() { MIN_CAPACITY } else { self.entries.len() * 2 };
        let mut new_entries = vec![Entry::default(); new_capacity];
        let mut live = 0;
        for entry in &self.entries {
            if let Some(k) = entry.key {
                let hash = heap.string_hash(k);
                let idx = find_slot(&new_entries, hash, |kk| kk == k);
                new_entries[idx] = Entry { key: Some(k), value: entry.value };
                live += 1;
            }
        }
        self.entries = new_entries;
        self.count = live;
        self.tombstone_count = 0;
    }

    /// Iterates live `(key, value)` pairs, used by the VM's global lookup
    /// failure path to build nothing extra -- mostly useful for tests.
    pub fn iter(&self) -> impl Iterator<Item = (ObjRef, Value)> + '_ {
        self.entries.iter().filter_map(|e| e.key.map(|k| (k, e.value)))
    }
}

fn find_slot(entries: &[Entry], hash: u32, matches: impl Fn(ObjRef) -> bool) -> usize {
    let capacity = entries.len();
    let mut index = (hash as usize) % capacity;
    let mut tombstone: Option<usize> = None;
    loop {
        let entry = &entries[index];
        match entry.key {
            None if entry.is_empty() => return tombstone.unwrap_or(index),
            None => {
                if tombstone.is_none() {
                    tombstone = Some(index);
                }
            }
            Some(k) => {
                if matches(k) {
                    return index;
                }
            }
        }
        index = (index + 1) % capacity;
    }
}
