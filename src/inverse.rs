//! Role-swapped facades: secondary keys become keys, primary keys values.
//!
//! Both views work directly on the owning map's tables; nothing is copied.

use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

use crate::error::{Error, Result};
use crate::iter::{InverseCursor, InverseIter, Keys, Values};
use crate::mapping::Reverse;
use crate::DualKeyedMap;

const NO_INVERSE_VALUES: &str = "inverse values(); use keys() on the primary map";
const NO_INVERSE_ENTRIES: &str = "inverse entries(); use iter() on the primary map";

/// Read-only view of a [`DualKeyedMap`] keyed by its secondary keys.
pub struct Inverse<'a, P, S, H = RandomState> {
    map: &'a DualKeyedMap<P, S, H>,
}

impl<P, S, H> Clone for Inverse<'_, P, S, H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P, S, H> Copy for Inverse<'_, P, S, H> {}

impl<'a, P, S, H> Inverse<'a, P, S, H> {
    pub(crate) fn new(map: &'a DualKeyedMap<P, S, H>) -> Self {
        Self { map }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Secondary keys in insertion order.
    pub fn keys(&self) -> Values<'a, P, S> {
        self.map.values()
    }

    /// `(secondary, primary)` pairs in insertion order.
    pub fn iter(&self) -> InverseIter<'a, P, S> {
        InverseIter::new(self.map.iter())
    }

    /// Not offered by the inverse view; always [`Error::Unsupported`].
    pub fn values(&self) -> Result<Keys<'a, P, S>> {
        Err(Error::Unsupported(NO_INVERSE_VALUES))
    }

    /// Not offered by the inverse view; always [`Error::Unsupported`].
    pub fn entries(&self) -> Result<InverseIter<'a, P, S>> {
        Err(Error::Unsupported(NO_INVERSE_ENTRIES))
    }

    pub fn cursor(&self) -> InverseCursor {
        InverseCursor::new(self.map.cursor())
    }

    /// The map this view was taken from.
    pub fn inverse(self) -> &'a DualKeyedMap<P, S, H> {
        self.map
    }
}

impl<'a, P, S, H> Inverse<'a, P, S, H>
where
    P: Hash + Ord,
    S: Hash + Ord,
    H: BuildHasher,
{
    pub fn get<Q>(&self, key: &Q) -> Option<&'a P>
    where
        S: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.map.get_by_value(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        S: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.map.contains_value(key)
    }

    pub fn contains_value<Q>(&self, value: &Q) -> bool
    where
        P: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.map.contains_key(value)
    }
}

impl<P, S, H> std::fmt::Debug for Inverse<'_, P, S, H>
where
    P: std::fmt::Debug,
    S: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Mutable view of a [`DualKeyedMap`] keyed by its secondary keys.
pub struct InverseMut<'a, P, S, H = RandomState> {
    map: &'a mut DualKeyedMap<P, S, H>,
}

impl<'a, P, S, H> InverseMut<'a, P, S, H> {
    pub(crate) fn new(map: &'a mut DualKeyedMap<P, S, H>) -> Self {
        Self { map }
    }

    pub fn as_inverse(&self) -> Inverse<'_, P, S, H> {
        Inverse::new(self.map)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn keys(&self) -> Values<'_, P, S> {
        self.map.values()
    }

    pub fn iter(&self) -> InverseIter<'_, P, S> {
        InverseIter::new(self.map.iter())
    }

    /// Not offered by the inverse view; always [`Error::Unsupported`].
    pub fn values(&self) -> Result<Keys<'_, P, S>> {
        Err(Error::Unsupported(NO_INVERSE_VALUES))
    }

    /// Not offered by the inverse view; always [`Error::Unsupported`].
    pub fn entries(&self) -> Result<InverseIter<'_, P, S>> {
        Err(Error::Unsupported(NO_INVERSE_ENTRIES))
    }

    pub fn cursor(&self) -> InverseCursor {
        InverseCursor::new(self.map.cursor())
    }

    /// The map this view was taken from.
    pub fn inverse(self) -> &'a mut DualKeyedMap<P, S, H> {
        self.map
    }
}

impl<P, S, H> InverseMut<'_, P, S, H>
where
    P: Hash + Ord,
    S: Hash + Ord,
    H: BuildHasher,
{
    pub fn get<Q>(&self, key: &Q) -> Option<&P>
    where
        S: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.map.get_by_value(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        S: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.map.contains_value(key)
    }

    pub fn contains_value<Q>(&self, value: &Q) -> bool
    where
        P: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.map.contains_key(value)
    }

    /// Binds `secondary` to `primary`; the mirror image of
    /// [`DualKeyedMap::insert`]. Returns the primary previously bound to
    /// `secondary`.
    ///
    /// # Panics
    ///
    /// If growing the tables overflows or fails to allocate.
    pub fn insert(&mut self, secondary: S, primary: P) -> Option<P> {
        match self.try_insert(secondary, primary) {
            Ok(previous) => previous,
            Err(err) => panic!("{err}"),
        }
    }

    pub fn try_insert(&mut self, secondary: S, primary: P) -> Result<Option<P>> {
        self.map.insert_as::<Reverse>(secondary, primary)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<P>
    where
        S: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.map.remove_by_value(key)
    }

    pub fn remove_by_value<Q>(&mut self, value: &Q) -> Option<S>
    where
        P: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.map.remove(value)
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn compact(&mut self) -> usize {
        self.map.compact()
    }

    pub fn try_compact(&mut self) -> Result<usize> {
        self.map.try_compact()
    }
}

impl<P, S, H> std::fmt::Debug for InverseMut<'_, P, S, H>
where
    P: std::fmt::Debug,
    S: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
