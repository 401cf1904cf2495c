//! Mapping records and the slab that owns them.
//!
//! A mapping is the single physical record for one `(primary, secondary)`
//! pair. Both collision trees point at it by handle and never copy it, so an
//! update through either side is immediately visible from the other.

use std::hash::Hash;
use std::ops::{Index, IndexMut};

use crate::forest::NIL;

pub(crate) const PRIMARY: usize = 0;
pub(crate) const SECONDARY: usize = 1;

#[derive(Clone, Debug)]
pub(crate) struct Mapping<P, S> {
    pub(crate) primary: P,
    pub(crate) secondary: S,
    /// Cached `hash_one` of each side's key, indexed by `PRIMARY`/`SECONDARY`.
    pub(crate) hashes: [u64; 2],
    /// Tree node standing for this mapping on each side.
    pub(crate) nodes: [u32; 2],
    /// Iteration chain: previous entry (towards the head).
    pub(crate) up: u32,
    /// Iteration chain: next entry (towards the tail).
    pub(crate) down: u32,
}

/// Slab of mappings addressed by stable `u32` handles.
#[derive(Clone, Debug)]
pub(crate) struct Mappings<P, S> {
    slots: Vec<Option<Mapping<P, S>>>,
    vacant: Vec<u32>,
}

impl<P, S> Mappings<P, S> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            vacant: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, mapping: Mapping<P, S>) -> u32 {
        match self.vacant.pop() {
            Some(idx) => {
                self.slots[idx as usize] = Some(mapping);
                idx
            }
            None => {
                let idx = self.slots.len() as u32;
                debug_assert_ne!(idx, NIL);
                self.slots.push(Some(mapping));
                idx
            }
        }
    }

    pub(crate) fn remove(&mut self, idx: u32) -> Mapping<P, S> {
        let mapping = self.slots[idx as usize]
            .take()
            .expect("removed mapping handle must be live");
        self.vacant.push(idx);
        mapping
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.vacant.clear();
    }
}

impl<P, S> Index<u32> for Mappings<P, S> {
    type Output = Mapping<P, S>;

    #[inline]
    fn index(&self, idx: u32) -> &Self::Output {
        self.slots[idx as usize]
            .as_ref()
            .expect("mapping handle must be live")
    }
}

impl<P, S> IndexMut<u32> for Mappings<P, S> {
    #[inline]
    fn index_mut(&mut self, idx: u32) -> &mut Self::Output {
        self.slots[idx as usize]
            .as_mut()
            .expect("mapping handle must be live")
    }
}

/// Which key of a mapping is being looked up by.
///
/// `Forward` treats the primary key as the key and the secondary as the
/// value; `Reverse` swaps them. Generic code written against this trait is
/// shared between the map and its inverse view.
pub(crate) trait Role<P, S> {
    /// Side index of the key (`PRIMARY` or `SECONDARY`).
    const KEY: usize;
    /// Side index of the value.
    const VALUE: usize = 1 - Self::KEY;

    type Key: Hash + Ord;
    type Value: Hash + Ord;

    fn key(m: &Mapping<P, S>) -> &Self::Key;
    fn value(m: &Mapping<P, S>) -> &Self::Value;
    fn value_mut(m: &mut Mapping<P, S>) -> &mut Self::Value;
    fn join(key: Self::Key, value: Self::Value) -> (P, S);
    fn split(pair: (P, S)) -> (Self::Key, Self::Value);
}

pub(crate) struct Forward;
pub(crate) struct Reverse;

impl<P: Hash + Ord, S: Hash + Ord> Role<P, S> for Forward {
    const KEY: usize = PRIMARY;

    type Key = P;
    type Value = S;

    #[inline]
    fn key(m: &Mapping<P, S>) -> &P {
        &m.primary
    }

    #[inline]
    fn value(m: &Mapping<P, S>) -> &S {
        &m.secondary
    }

    #[inline]
    fn value_mut(m: &mut Mapping<P, S>) -> &mut S {
        &mut m.secondary
    }

    #[inline]
    fn join(key: P, value: S) -> (P, S) {
        (key, value)
    }

    #[inline]
    fn split(pair: (P, S)) -> (P, S) {
        pair
    }
}

impl<P: Hash + Ord, S: Hash + Ord> Role<P, S> for Reverse {
    const KEY: usize = SECONDARY;

    type Key = S;
    type Value = P;

    #[inline]
    fn key(m: &Mapping<P, S>) -> &S {
        &m.secondary
    }

    #[inline]
    fn value(m: &Mapping<P, S>) -> &P {
        &m.primary
    }

    #[inline]
    fn value_mut(m: &mut Mapping<P, S>) -> &mut P {
        &mut m.primary
    }

    #[inline]
    fn join(key: S, value: P) -> (P, S) {
        (value, key)
    }

    #[inline]
    fn split(pair: (P, S)) -> (S, P) {
        (pair.1, pair.0)
    }
}
