//! Iteration over the insertion-order chain.
//!
//! Borrowing iterators ([`Iter`], [`Keys`], [`Values`], [`InverseIter`]) hold a
//! shared borrow of the map, so no structural change can happen while they are
//! alive. [`Cursor`] and [`InverseCursor`] hold no borrow at all and instead
//! check the map's modification count on every step.

use std::hash::{BuildHasher, Hash};
use std::iter::FusedIterator;

use crate::error::{Error, Result};
use crate::forest::NIL;
use crate::mapping::Mappings;
use crate::DualKeyedMap;

/// Pairs of a [`DualKeyedMap`] in insertion order.
pub struct Iter<'a, P, S> {
    mappings: &'a Mappings<P, S>,
    next: u32,
    remaining: usize,
}

impl<'a, P, S> Iter<'a, P, S> {
    pub(crate) fn new(mappings: &'a Mappings<P, S>, head: u32, len: usize) -> Self {
        Self {
            mappings,
            next: head,
            remaining: len,
        }
    }
}

impl<P, S> Clone for Iter<'_, P, S> {
    fn clone(&self) -> Self {
        Self {
            mappings: self.mappings,
            next: self.next,
            remaining: self.remaining,
        }
    }
}

impl<'a, P, S> Iterator for Iter<'a, P, S> {
    type Item = (&'a P, &'a S);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == NIL {
            return None;
        }
        let mappings: &'a Mappings<P, S> = self.mappings;
        let m = &mappings[self.next];
        self.next = m.down;
        self.remaining -= 1;
        Some((&m.primary, &m.secondary))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<P, S> ExactSizeIterator for Iter<'_, P, S> {}
impl<P, S> FusedIterator for Iter<'_, P, S> {}

/// Primary keys in insertion order.
pub struct Keys<'a, P, S> {
    inner: Iter<'a, P, S>,
}

impl<'a, P, S> Keys<'a, P, S> {
    pub(crate) fn new(inner: Iter<'a, P, S>) -> Self {
        Self { inner }
    }
}

impl<'a, P, S> Iterator for Keys<'a, P, S> {
    type Item = &'a P;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(p, _)| p)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<P, S> ExactSizeIterator for Keys<'_, P, S> {}
impl<P, S> FusedIterator for Keys<'_, P, S> {}

/// Secondary keys in insertion order.
pub struct Values<'a, P, S> {
    inner: Iter<'a, P, S>,
}

impl<'a, P, S> Values<'a, P, S> {
    pub(crate) fn new(inner: Iter<'a, P, S>) -> Self {
        Self { inner }
    }
}

impl<'a, P, S> Iterator for Values<'a, P, S> {
    type Item = &'a S;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, s)| s)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<P, S> ExactSizeIterator for Values<'_, P, S> {}
impl<P, S> FusedIterator for Values<'_, P, S> {}

/// `(secondary, primary)` pairs in insertion order.
pub struct InverseIter<'a, P, S> {
    inner: Iter<'a, P, S>,
}

impl<'a, P, S> InverseIter<'a, P, S> {
    pub(crate) fn new(inner: Iter<'a, P, S>) -> Self {
        Self { inner }
    }
}

impl<'a, P, S> Iterator for InverseIter<'a, P, S> {
    type Item = (&'a S, &'a P);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(p, s)| (s, p))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<P, S> ExactSizeIterator for InverseIter<'_, P, S> {}
impl<P, S> FusedIterator for InverseIter<'_, P, S> {}

/// Owning iterator over `(primary, secondary)` pairs in insertion order.
pub struct IntoIter<P, S> {
    mappings: Mappings<P, S>,
    next: u32,
    remaining: usize,
}

impl<P, S> IntoIter<P, S> {
    pub(crate) fn new(mappings: Mappings<P, S>, head: u32, len: usize) -> Self {
        Self {
            mappings,
            next: head,
            remaining: len,
        }
    }
}

impl<P, S> Iterator for IntoIter<P, S> {
    type Item = (P, S);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next == NIL {
            return None;
        }
        let m = self.mappings.remove(self.next);
        self.next = m.down;
        self.remaining -= 1;
        Some((m.primary, m.secondary))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<P, S> ExactSizeIterator for IntoIter<P, S> {}
impl<P, S> FusedIterator for IntoIter<P, S> {}

// =============================================================================
// Fail-fast cursors
// =============================================================================

/// Detached, fail-fast position in a map's insertion order.
///
/// A cursor records the map's modification count when created and after each
/// of its own removals. Every `next`/`remove` first compares that record with
/// the map's live count and fails with [`Error::ConcurrentModification`] on
/// mismatch. The cursor must only be used with the map that created it.
#[derive(Clone, Debug)]
pub struct Cursor {
    next: u32,
    last: u32,
    expected: u64,
    iterated: usize,
}

impl Cursor {
    pub(crate) fn new(head: u32, mods: u64) -> Self {
        Self {
            next: head,
            last: NIL,
            expected: mods,
            iterated: 0,
        }
    }

    /// Whether a further `next` would yield a pair, as of the last step.
    pub fn has_next(&self) -> bool {
        self.next != NIL
    }

    /// Number of pairs yielded so far, removed ones included.
    pub fn iterated(&self) -> usize {
        self.iterated
    }

    fn check<P, S, H>(&self, map: &DualKeyedMap<P, S, H>) -> Result<()> {
        if map.mods == self.expected {
            Ok(())
        } else {
            Err(Error::ConcurrentModification {
                expected: self.expected,
                actual: map.mods,
            })
        }
    }

    pub fn next<'a, P, S, H>(&mut self, map: &'a DualKeyedMap<P, S, H>) -> Result<(&'a P, &'a S)> {
        self.check(map)?;
        if self.next == NIL {
            return Err(Error::NoSuchElement);
        }
        let m = &map.mappings[self.next];
        self.last = self.next;
        self.next = m.down;
        self.iterated += 1;
        Ok((&m.primary, &m.secondary))
    }

    /// Removes the pair returned by the preceding `next`.
    pub fn remove<P, S, H>(&mut self, map: &mut DualKeyedMap<P, S, H>) -> Result<(P, S)>
    where
        P: Hash + Ord,
        S: Hash + Ord,
        H: BuildHasher,
    {
        self.check(map)?;
        if self.last == NIL {
            return Err(Error::InvalidState("remove() requires a preceding next()"));
        }
        let mapping = map.unlink(self.last);
        self.last = NIL;
        self.expected = map.mods;
        Ok((mapping.primary, mapping.secondary))
    }
}

/// [`Cursor`] yielding `(secondary, primary)` pairs.
#[derive(Clone, Debug)]
pub struct InverseCursor {
    inner: Cursor,
}

impl InverseCursor {
    pub(crate) fn new(inner: Cursor) -> Self {
        Self { inner }
    }

    pub fn has_next(&self) -> bool {
        self.inner.has_next()
    }

    pub fn iterated(&self) -> usize {
        self.inner.iterated()
    }

    pub fn next<'a, P, S, H>(&mut self, map: &'a DualKeyedMap<P, S, H>) -> Result<(&'a S, &'a P)> {
        self.inner.next(map).map(|(p, s)| (s, p))
    }

    pub fn remove<P, S, H>(&mut self, map: &mut DualKeyedMap<P, S, H>) -> Result<(S, P)>
    where
        P: Hash + Ord,
        S: Hash + Ord,
        H: BuildHasher,
    {
        self.inner.remove(map).map(|(p, s)| (s, p))
    }
}
