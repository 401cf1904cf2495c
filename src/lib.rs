//! # avl-bimap
//!
//! A bijective hash map: every primary key maps to exactly one secondary key
//! and vice versa, and either side can be used to look up the other.
//!
//! Two hash tables of equal size index the same set of mappings, one by
//! primary key and one by secondary key. Each bucket is an AVL tree rather
//! than a chain, which bounds the cost of a lookup in a crowded bucket at
//! O(log k). A doubly linked chain threads every mapping in insertion order
//! and drives iteration, growth and compaction.
//!
//! ## Example
//!
//! ```rust
//! use avl_bimap::DualKeyedMap;
//!
//! let mut map: DualKeyedMap<u32, &str> = DualKeyedMap::new();
//! map.insert(1, "a");
//! map.insert(2, "b");
//!
//! assert_eq!(map.get(&1), Some(&"a"));
//! assert_eq!(map.get_by_value(&"b"), Some(&2));
//!
//! // Re-binding a key moves its secondary value; the old one is gone.
//! assert_eq!(map.insert(1, "z"), Some("a"));
//! assert_eq!(map.get_by_value(&"a"), None);
//!
//! let keys: Vec<_> = map.keys().copied().collect();
//! assert_eq!(keys, [1, 2]);
//! ```
//!
//! Keys on both sides must be `Hash + Ord`, and must not change their hash or
//! ordering while stored. The map is not synchronized.

mod error;
mod forest;
mod inverse;
mod iter;
mod mapping;

pub use error::{Error, Result};
pub use inverse::{Inverse, InverseMut};
pub use iter::{Cursor, IntoIter, InverseCursor, InverseIter, Iter, Keys, Values};

use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

use forest::{Forest, NIL};
use mapping::{Forward, Mapping, Mappings, Reverse, Role, PRIMARY, SECONDARY};

// =============================================================================
// Configuration
// =============================================================================

/// Smallest bucket count either table ever has.
pub const MIN_BUCKETS: usize = 8;
/// Smallest accepted maximum load factor; lower requests are raised to it.
pub const MIN_LOAD_FACTOR: f32 = 0.2;

const DEFAULT_BUCKETS: usize = 16;
const DEFAULT_LOAD_FACTOR: f32 = 0.75;
/// Handles are `u32` with `NIL` reserved.
const MAX_ENTRIES: usize = (u32::MAX - 1) as usize;

/// Construction parameters for a [`DualKeyedMap`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Requested bucket count; rounded up to a power of two, at least
    /// [`MIN_BUCKETS`].
    pub initial_capacity: usize,
    /// Load (`len / buckets`) above which the tables double. Raised to
    /// [`MIN_LOAD_FACTOR`] if lower; must be finite.
    pub max_load_factor: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_BUCKETS,
            max_load_factor: DEFAULT_LOAD_FACTOR,
        }
    }
}

/// Smallest power-of-two bucket count that holds `len` entries within
/// `max_load_factor`.
fn buckets_for(len: usize, max_load_factor: f32) -> Option<usize> {
    let needed = (len as f64 / f64::from(max_load_factor)).ceil() as usize;
    needed.max(MIN_BUCKETS).checked_next_power_of_two()
}

// =============================================================================
// DualKeyedMap
// =============================================================================

/// A bijective map between primary keys `P` and secondary keys `S`.
///
/// Features:
/// - Lookup, insertion and removal from either side
/// - AVL collision trees per bucket
/// - Insertion-ordered iteration, stable across in-place updates
/// - Fail-fast [`Cursor`]s that allow removal during traversal
#[derive(Clone)]
pub struct DualKeyedMap<P, S, H = RandomState> {
    mappings: Mappings<P, S>,
    /// Indexed by `PRIMARY` / `SECONDARY`; always the same bucket count.
    forests: [Forest; 2],
    head: u32,
    tail: u32,
    len: usize,
    mask: usize,
    max_load_factor: f32,
    /// Bumped on every structural change; cursors compare against it.
    mods: u64,
    hasher: H,
}

impl<P, S> DualKeyedMap<P, S, RandomState> {
    pub fn new() -> Self {
        Self::with_config_and_hasher(Config::default(), RandomState::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_load_factor(capacity, DEFAULT_LOAD_FACTOR)
    }

    /// # Panics
    ///
    /// If `max_load_factor` is not finite or `capacity` cannot be rounded up
    /// to a power of two.
    pub fn with_capacity_and_load_factor(capacity: usize, max_load_factor: f32) -> Self {
        let config = Config {
            initial_capacity: capacity,
            max_load_factor,
        };
        Self::with_config_and_hasher(config, RandomState::new())
    }

    pub fn try_with_config(config: Config) -> Result<Self> {
        Self::try_with_config_and_hasher(config, RandomState::new())
    }
}

impl<P, S, H> DualKeyedMap<P, S, H> {
    pub fn try_with_config_and_hasher(config: Config, hasher: H) -> Result<Self> {
        if !config.max_load_factor.is_finite() {
            return Err(Error::InvalidArgument("maximum load factor must be finite"));
        }
        let max_load_factor = config.max_load_factor.max(MIN_LOAD_FACTOR);
        let buckets = config
            .initial_capacity
            .max(MIN_BUCKETS)
            .checked_next_power_of_two()
            .ok_or(Error::CapacityOverflow)?;

        Ok(Self {
            mappings: Mappings::new(),
            forests: [
                Forest::try_with_buckets(buckets)?,
                Forest::try_with_buckets(buckets)?,
            ],
            head: NIL,
            tail: NIL,
            len: 0,
            mask: buckets - 1,
            max_load_factor,
            mods: 0,
            hasher,
        })
    }

    /// # Panics
    ///
    /// On any error [`try_with_config_and_hasher`](Self::try_with_config_and_hasher)
    /// would return.
    pub fn with_config_and_hasher(config: Config, hasher: H) -> Self {
        match Self::try_with_config_and_hasher(config, hasher) {
            Ok(map) => map,
            Err(err) => panic!("{err}"),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current bucket count of each table.
    #[inline]
    pub fn buckets(&self) -> usize {
        self.mask + 1
    }

    /// Current `len / buckets`.
    pub fn load_factor(&self) -> f32 {
        self.len as f32 / self.buckets() as f32
    }

    pub fn max_load_factor(&self) -> f32 {
        self.max_load_factor
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Pairs in insertion order.
    pub fn iter(&self) -> Iter<'_, P, S> {
        Iter::new(&self.mappings, self.head, self.len)
    }

    /// Primary keys in insertion order.
    pub fn keys(&self) -> Keys<'_, P, S> {
        Keys::new(self.iter())
    }

    /// Secondary keys in insertion order.
    pub fn values(&self) -> Values<'_, P, S> {
        Values::new(self.iter())
    }

    /// Role-swapped read-only view over the same tables.
    pub fn inverse(&self) -> Inverse<'_, P, S, H> {
        Inverse::new(self)
    }

    /// Role-swapped mutable view over the same tables.
    pub fn inverse_mut(&mut self) -> InverseMut<'_, P, S, H> {
        InverseMut::new(self)
    }

    /// A fail-fast cursor positioned before the first pair.
    ///
    /// The cursor holds no borrow of the map; any structural change made
    /// other than through the cursor itself makes its next step fail with
    /// [`Error::ConcurrentModification`].
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.head, self.mods)
    }
}

impl<P, S, H> DualKeyedMap<P, S, H>
where
    P: Hash + Ord,
    S: Hash + Ord,
    H: BuildHasher,
{
    pub fn get<Q>(&self, key: &Q) -> Option<&S>
    where
        P: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.find::<Forward, Q>(key)
            .map(|m| &self.mappings[m].secondary)
    }

    pub fn get_by_value<Q>(&self, value: &Q) -> Option<&P>
    where
        S: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.find::<Reverse, Q>(value)
            .map(|m| &self.mappings[m].primary)
    }

    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&P, &S)>
    where
        P: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.find::<Forward, Q>(key).map(|m| {
            let mapping = &self.mappings[m];
            (&mapping.primary, &mapping.secondary)
        })
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        P: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.find::<Forward, Q>(key).is_some()
    }

    pub fn contains_value<Q>(&self, value: &Q) -> bool
    where
        S: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.find::<Reverse, Q>(value).is_some()
    }

    /// Binds `primary` to `secondary`.
    ///
    /// Returns the secondary previously bound to `primary`, or `secondary`
    /// itself if the pair was already present. Any other primary bound to
    /// `secondary` is removed first.
    ///
    /// # Panics
    ///
    /// If growing the tables overflows or fails to allocate; see
    /// [`try_insert`](Self::try_insert).
    pub fn insert(&mut self, primary: P, secondary: S) -> Option<S> {
        match self.try_insert(primary, secondary) {
            Ok(previous) => previous,
            Err(err) => panic!("{err}"),
        }
    }

    /// Like [`insert`](Self::insert), but reports growth failure instead of
    /// panicking. On error the map is unchanged.
    pub fn try_insert(&mut self, primary: P, secondary: S) -> Result<Option<S>> {
        self.insert_as::<Forward>(primary, secondary)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<S>
    where
        P: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.remove_as::<Forward, Q>(key).map(|(_, secondary)| secondary)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(P, S)>
    where
        P: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.remove_as::<Forward, Q>(key)
    }

    pub fn remove_by_value<Q>(&mut self, value: &Q) -> Option<P>
    where
        S: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.remove_as::<Reverse, Q>(value).map(|(_, primary)| primary)
    }

    /// Drops every pair, keeping the current bucket count.
    pub fn clear(&mut self) {
        let dropped = self.len;

        // Every occupied bucket holds at least one chained mapping, so
        // vacating the buckets of chained mappings empties both tables.
        let mut m = self.head;
        while m != NIL {
            let mapping = &self.mappings[m];
            for side in [PRIMARY, SECONDARY] {
                let bucket = mapping.hashes[side] as usize & self.mask;
                self.forests[side].vacate(bucket);
            }
            m = mapping.down;
        }

        for forest in &mut self.forests {
            forest.clear_nodes();
        }
        self.mappings.clear();
        self.head = NIL;
        self.tail = NIL;
        self.len = 0;
        self.mods += dropped as u64;

        tracing::debug!(dropped, "cleared map");
    }

    /// Shrinks both tables to the smallest power-of-two bucket count that
    /// keeps the load within the maximum. Returns the resulting bucket count.
    ///
    /// # Panics
    ///
    /// If the smaller tables cannot be allocated; see
    /// [`try_compact`](Self::try_compact).
    pub fn compact(&mut self) -> usize {
        match self.try_compact() {
            Ok(buckets) => buckets,
            Err(err) => panic!("{err}"),
        }
    }

    /// Like [`compact`](Self::compact), but reports allocation failure
    /// instead of panicking. On error the current tables are kept.
    ///
    /// A compaction that changes the bucket count invalidates cursors.
    pub fn try_compact(&mut self) -> Result<usize> {
        let target = buckets_for(self.len, self.max_load_factor).ok_or(Error::CapacityOverflow)?;
        self.rebucket(target)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    #[inline]
    fn bucket(&self, hash: u64) -> usize {
        hash as usize & self.mask
    }

    /// Handle of the mapping whose `R::Key` equals `key`.
    fn find<R, Q>(&self, key: &Q) -> Option<u32>
    where
        R: Role<P, S>,
        R::Key: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.find_hashed::<R, Q>(key, self.hasher.hash_one(key))
    }

    fn find_hashed<R, Q>(&self, key: &Q, hash: u64) -> Option<u32>
    where
        R: Role<P, S>,
        R::Key: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        let mappings = &self.mappings;
        let forest = &self.forests[R::KEY];
        forest
            .find(self.bucket(hash), |m| {
                key.cmp(<R::Key as Borrow<Q>>::borrow(R::key(&mappings[m])))
            })
            .map(|node| forest.mapping(node))
    }

    /// Handle of the mapping whose `R::Value` equals `value`.
    fn find_value<R: Role<P, S>>(&self, value: &R::Value, hash: u64) -> Option<u32> {
        let mappings = &self.mappings;
        let forest = &self.forests[R::VALUE];
        forest
            .find(self.bucket(hash), |m| value.cmp(R::value(&mappings[m])))
            .map(|node| forest.mapping(node))
    }

    /// Re-derives the node standing for mapping `m` on `side` by hashing and
    /// searching, accepting only a node that references `m` itself.
    fn locate(&self, side: usize, m: u32) -> Option<u32> {
        let mappings = &self.mappings;
        let target = &mappings[m];
        let bucket = self.bucket(target.hashes[side]);
        let forest = &self.forests[side];
        let node = if side == PRIMARY {
            forest.find(bucket, |other| target.primary.cmp(&mappings[other].primary))
        } else {
            forest.find(bucket, |other| target.secondary.cmp(&mappings[other].secondary))
        }?;
        (forest.mapping(node) == m).then_some(node)
    }

    /// Inserts mapping `m`'s node into `side`'s tree at its cached hash.
    fn link(&mut self, side: usize, m: u32) {
        let mappings = &self.mappings;
        let target = &mappings[m];
        let bucket = target.hashes[side] as usize & self.mask;
        let node = target.nodes[side];
        let forest = &mut self.forests[side];
        if side == PRIMARY {
            forest.attach(bucket, node, |other| target.primary.cmp(&mappings[other].primary));
        } else {
            forest.attach(bucket, node, |other| target.secondary.cmp(&mappings[other].secondary));
        }
    }

    /// Detaches mapping `m` from `side`'s tree, fixing the back-pointer of any
    /// mapping moved by the removal. Returns the freed node.
    fn unlink_side(&mut self, side: usize, m: u32) -> u32 {
        let node = self.mappings[m].nodes[side];
        debug_assert_eq!(self.locate(side, m), Some(node));
        let bucket = self.bucket(self.mappings[m].hashes[side]);
        let detached = self.forests[side].detach(bucket, node);
        if let Some((moved, to)) = detached.moved {
            self.mappings[moved].nodes[side] = to;
        }
        detached.node
    }

    /// Removes mapping `m` from both trees and the iteration chain.
    fn unlink(&mut self, m: u32) -> Mapping<P, S> {
        for side in [PRIMARY, SECONDARY] {
            let node = self.unlink_side(side, m);
            self.forests[side].release(node);
        }

        let (up, down) = (self.mappings[m].up, self.mappings[m].down);
        if up == NIL {
            self.head = down;
        } else {
            self.mappings[up].down = down;
        }
        if down == NIL {
            self.tail = up;
        } else {
            self.mappings[down].up = up;
        }

        self.len -= 1;
        self.mods += 1;
        self.mappings.remove(m)
    }

    /// Moves every node into fresh tables of `buckets` buckets, walking the
    /// iteration chain once and reusing cached hashes. Both tables are
    /// allocated before anything is touched.
    fn relink(&mut self, buckets: usize) -> Result<()> {
        let primary = Forest::try_roots(buckets)?;
        let secondary = Forest::try_roots(buckets)?;

        tracing::debug!(
            from = self.buckets(),
            to = buckets,
            len = self.len,
            "relinking collision tables"
        );

        self.forests[PRIMARY].replace_roots(primary);
        self.forests[SECONDARY].replace_roots(secondary);
        self.mask = buckets - 1;

        let mut m = self.head;
        while m != NIL {
            for side in [PRIMARY, SECONDARY] {
                let node = self.mappings[m].nodes[side];
                self.forests[side].reset(node);
                self.link(side, m);
            }
            m = self.mappings[m].down;
        }
        Ok(())
    }

    /// Relinks into `buckets` buckets unless already there, counting the
    /// change as structural.
    fn rebucket(&mut self, buckets: usize) -> Result<usize> {
        if buckets != self.buckets() {
            if let Err(err) = self.relink(buckets) {
                tracing::warn!(%err, buckets = self.buckets(), "keeping current tables");
                return Err(err);
            }
            self.mods += 1;
        }
        Ok(self.buckets())
    }

    /// Makes room for one more mapping, doubling the tables if the load
    /// would otherwise exceed the maximum.
    fn reserve_one(&mut self) -> Result<()> {
        if self.len >= MAX_ENTRIES {
            return Err(Error::CapacityOverflow);
        }
        let buckets = self.buckets();
        if (self.len + 1) as f64 > f64::from(self.max_load_factor) * buckets as f64 {
            let doubled = buckets.checked_mul(2).ok_or(Error::CapacityOverflow)?;
            self.relink(doubled)?;
        }
        Ok(())
    }

    fn insert_as<R: Role<P, S>>(&mut self, key: R::Key, value: R::Value) -> Result<Option<R::Value>> {
        let key_hash = self.hasher.hash_one(&key);
        let value_hash = self.hasher.hash_one(&value);
        let existing = self.find_hashed::<R, R::Key>(&key, key_hash);

        if let Some(m) = existing {
            if *R::value(&self.mappings[m]) == value {
                return Ok(Some(value));
            }
        }

        // Another key holding `value` would break the bijection. Evicting it
        // keeps `len` unchanged, so only a brand-new pair may grow the tables.
        let holder = self.find_value::<R>(&value, value_hash);
        if existing.is_none() && holder.is_none() {
            self.reserve_one()?;
        }
        if let Some(holder) = holder {
            self.unlink(holder);
        }

        if let Some(m) = existing {
            // Only the value side's tree position depends on the value; the
            // key side and the chain position stay as they are.
            let side = R::VALUE;
            let node = self.unlink_side(side, m);
            let old = std::mem::replace(R::value_mut(&mut self.mappings[m]), value);
            self.mappings[m].hashes[side] = value_hash;
            self.mappings[m].nodes[side] = node;
            self.forests[side].reuse(node, m);
            self.link(side, m);
            return Ok(Some(old));
        }

        let (primary, secondary) = R::join(key, value);
        let mut hashes = [0; 2];
        hashes[R::KEY] = key_hash;
        hashes[R::VALUE] = value_hash;
        let m = self.mappings.insert(Mapping {
            primary,
            secondary,
            hashes,
            nodes: [NIL; 2],
            up: self.tail,
            down: NIL,
        });
        for side in [PRIMARY, SECONDARY] {
            let node = self.forests[side].alloc(m);
            self.mappings[m].nodes[side] = node;
            self.link(side, m);
        }

        if self.tail == NIL {
            self.head = m;
        } else {
            self.mappings[self.tail].down = m;
        }
        self.tail = m;
        self.len += 1;
        self.mods += 1;
        Ok(None)
    }

    fn remove_as<R, Q>(&mut self, key: &Q) -> Option<(R::Key, R::Value)>
    where
        R: Role<P, S>,
        R::Key: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        let m = self.find::<R, Q>(key)?;
        let mapping = self.unlink(m);
        Some(R::split((mapping.primary, mapping.secondary)))
    }
}

impl<P, S, H: Default> Default for DualKeyedMap<P, S, H> {
    fn default() -> Self {
        Self::with_config_and_hasher(Config::default(), H::default())
    }
}

impl<P, S, H> std::fmt::Debug for DualKeyedMap<P, S, H>
where
    P: std::fmt::Debug,
    S: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<P, S, H> PartialEq for DualKeyedMap<P, S, H>
where
    P: Hash + Ord,
    S: Hash + Ord,
    H: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().all(|(p, s)| other.get(p) == Some(s))
    }
}

impl<P, S, H> Eq for DualKeyedMap<P, S, H>
where
    P: Hash + Ord,
    S: Hash + Ord,
    H: BuildHasher,
{
}

impl<P, S, H> Extend<(P, S)> for DualKeyedMap<P, S, H>
where
    P: Hash + Ord,
    S: Hash + Ord,
    H: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (P, S)>>(&mut self, iter: I) {
        for (primary, secondary) in iter {
            self.insert(primary, secondary);
        }
    }
}

impl<P, S, H> FromIterator<(P, S)> for DualKeyedMap<P, S, H>
where
    P: Hash + Ord,
    S: Hash + Ord,
    H: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (P, S)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<'a, P, S, H> IntoIterator for &'a DualKeyedMap<P, S, H> {
    type Item = (&'a P, &'a S);
    type IntoIter = Iter<'a, P, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<P, S, H> IntoIterator for DualKeyedMap<P, S, H> {
    type Item = (P, S);
    type IntoIter = IntoIter<P, S>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter::new(self.mappings, self.head, self.len)
    }
}


#[cfg(test)]
mod proptests;
