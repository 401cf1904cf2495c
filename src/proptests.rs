use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::HashSet;
use std::hash::Hasher;

/// Hashes everything to 0, forcing every key into bucket 0.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Collide;

pub(crate) struct ZeroHasher;

impl Hasher for ZeroHasher {
    fn finish(&self) -> u64 {
        0
    }

    fn write(&mut self, _bytes: &[u8]) {}
}

impl BuildHasher for Collide {
    type Hasher = ZeroHasher;

    fn build_hasher(&self) -> ZeroHasher {
        ZeroHasher
    }
}

pub(crate) fn validate_map<P, S, H>(map: &DualKeyedMap<P, S, H>)
where
    P: Hash + Ord,
    S: Hash + Ord,
    H: BuildHasher,
{
    let buckets = map.buckets();
    assert!(buckets.is_power_of_two(), "bucket count must be a power of two");
    assert!(buckets >= MIN_BUCKETS);
    for forest in &map.forests {
        assert_eq!(forest.buckets(), buckets, "both tables must share a bucket count");
        assert_eq!(forest.len(), map.len, "one node per mapping per side");
    }

    // Iteration chain: consistent back links, exactly `len` entries.
    let mut chained = Vec::new();
    let mut prev = NIL;
    let mut m = map.head;
    while m != NIL {
        let mapping = &map.mappings[m];
        assert_eq!(mapping.up, prev, "chain back link of mapping {m}");
        chained.push(m);
        prev = m;
        m = mapping.down;
    }
    assert_eq!(prev, map.tail, "chain tail");
    assert_eq!(chained.len(), map.len, "chain length must match len");

    // Every bucket: AVL shape, BST order, correct placement, back-pointers.
    let mut seen = [HashSet::new(), HashSet::new()];
    for side in [PRIMARY, SECONDARY] {
        let forest = &map.forests[side];
        for bucket in 0..buckets {
            let in_order = forest.audit(bucket);
            for (i, &(node, m)) in in_order.iter().enumerate() {
                let mapping = &map.mappings[m];
                assert_eq!(
                    mapping.hashes[side] as usize & map.mask,
                    bucket,
                    "mapping {m} in the wrong bucket"
                );
                assert_eq!(mapping.nodes[side], node, "back-pointer of mapping {m}");
                assert_eq!(map.locate(side, m), Some(node), "identity lookup of mapping {m}");
                assert!(seen[side].insert(m), "mapping {m} reachable twice");
                if i > 0 {
                    let before = &map.mappings[in_order[i - 1].1];
                    if side == PRIMARY {
                        assert!(before.primary < mapping.primary, "primary order in bucket {bucket}");
                    } else {
                        assert!(before.secondary < mapping.secondary, "secondary order in bucket {bucket}");
                    }
                }
            }
        }
        assert_eq!(seen[side].len(), map.len);
    }

    // Cached hashes are current.
    for &m in &chained {
        let mapping = &map.mappings[m];
        assert_eq!(mapping.hashes[PRIMARY], map.hasher.hash_one(&mapping.primary));
        assert_eq!(mapping.hashes[SECONDARY], map.hasher.hash_one(&mapping.secondary));
    }

    assert!(map.len == 0 || map.load_factor() <= map.max_load_factor() + f32::EPSILON);
}

/// Reference bijection: pairs in insertion order, linear scans.
#[derive(Default)]
struct Model {
    pairs: Vec<(u16, u16)>,
}

impl Model {
    fn position(&self, f: impl Fn(&(u16, u16)) -> bool) -> Option<usize> {
        self.pairs.iter().position(f)
    }

    fn insert(&mut self, p: u16, s: u16) -> Option<u16> {
        if let Some(i) = self.position(|e| e.0 == p) {
            if self.pairs[i].1 == s {
                return Some(s);
            }
        }
        if let Some(j) = self.position(|e| e.1 == s) {
            self.pairs.remove(j);
        }
        match self.position(|e| e.0 == p) {
            Some(i) => Some(std::mem::replace(&mut self.pairs[i].1, s)),
            None => {
                self.pairs.push((p, s));
                None
            }
        }
    }

    fn insert_inverse(&mut self, s: u16, p: u16) -> Option<u16> {
        if let Some(i) = self.position(|e| e.1 == s) {
            if self.pairs[i].0 == p {
                return Some(p);
            }
        }
        if let Some(j) = self.position(|e| e.0 == p) {
            self.pairs.remove(j);
        }
        match self.position(|e| e.1 == s) {
            Some(i) => Some(std::mem::replace(&mut self.pairs[i].0, p)),
            None => {
                self.pairs.push((p, s));
                None
            }
        }
    }

    fn remove(&mut self, p: u16) -> Option<u16> {
        let i = self.position(|e| e.0 == p)?;
        Some(self.pairs.remove(i).1)
    }

    fn remove_by_value(&mut self, s: u16) -> Option<u16> {
        let i = self.position(|e| e.1 == s)?;
        Some(self.pairs.remove(i).0)
    }

    fn get(&self, p: u16) -> Option<u16> {
        self.position(|e| e.0 == p).map(|i| self.pairs[i].1)
    }

    fn get_by_value(&self, s: u16) -> Option<u16> {
        self.position(|e| e.1 == s).map(|i| self.pairs[i].0)
    }
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 20)]
    Insert(
        #[proptest(strategy = "0u16..96")] u16,
        #[proptest(strategy = "0u16..96")] u16,
    ),
    #[proptest(weight = 10)]
    InsertInverse(
        #[proptest(strategy = "0u16..96")] u16,
        #[proptest(strategy = "0u16..96")] u16,
    ),
    #[proptest(weight = 8)]
    Remove(#[proptest(strategy = "0u16..96")] u16),
    #[proptest(weight = 8)]
    RemoveByValue(#[proptest(strategy = "0u16..96")] u16),
    #[proptest(weight = 8)]
    Get(#[proptest(strategy = "0u16..96")] u16),
    #[proptest(weight = 2)]
    Compact,
    #[proptest(weight = 1)]
    Clear,
}

fn run_ops<H: BuildHasher>(map: &mut DualKeyedMap<u16, u16, H>, ops: Vec<Op>) -> Result<(), TestCaseError> {
    let mut model = Model::default();

    for op in ops {
        match op {
            Op::Insert(p, s) => {
                prop_assert_eq!(map.insert(p, s), model.insert(p, s));
            }
            Op::InsertInverse(s, p) => {
                prop_assert_eq!(map.inverse_mut().insert(s, p), model.insert_inverse(s, p));
            }
            Op::Remove(p) => {
                prop_assert_eq!(map.remove(&p), model.remove(p));
            }
            Op::RemoveByValue(s) => {
                prop_assert_eq!(map.remove_by_value(&s), model.remove_by_value(s));
            }
            Op::Get(k) => {
                prop_assert_eq!(map.get(&k).copied(), model.get(k));
                prop_assert_eq!(map.get_by_value(&k).copied(), model.get_by_value(k));
            }
            Op::Compact => {
                map.compact();
            }
            Op::Clear => {
                map.clear();
                model.pairs.clear();
            }
        }

        prop_assert_eq!(map.len(), model.pairs.len());
        validate_map(map);
    }

    let got: Vec<(u16, u16)> = map.iter().map(|(p, s)| (*p, *s)).collect();
    prop_assert_eq!(got, model.pairs);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in prop::collection::vec(any::<Op>(), 0..=400)) {
        let mut map: DualKeyedMap<u16, u16> = DualKeyedMap::with_capacity(8);
        run_ops(&mut map, ops)?;
    }

    #[test]
    fn prop_equivalence_single_bucket(ops in prop::collection::vec(any::<Op>(), 0..=400)) {
        let mut map: DualKeyedMap<u16, u16, Collide> =
            DualKeyedMap::with_config_and_hasher(Config::default(), Collide);
        run_ops(&mut map, ops)?;
    }

    #[test]
    fn prop_cursor_removal_matches_retain(
        pairs in prop::collection::vec((0u16..200, 0u16..200), 0..=150),
        modulus in 2u16..5,
    ) {
        let mut map: DualKeyedMap<u16, u16> = pairs.into_iter().collect();
        let mut expected: Vec<(u16, u16)> = map.iter().map(|(p, s)| (*p, *s)).collect();
        expected.retain(|(p, _)| p % modulus != 0);

        let mut cursor = map.cursor();
        while cursor.has_next() {
            let (p, _) = cursor.next(&map).unwrap();
            if p % modulus == 0 {
                cursor.remove(&mut map).unwrap();
            }
        }

        let got: Vec<(u16, u16)> = map.iter().map(|(p, s)| (*p, *s)).collect();
        prop_assert_eq!(got, expected);
        validate_map(&map);
    }
}

/// Calls `f` with every ordering of the distinct `keys`, lexicographically.
fn each_ordering(keys: &[u32], mut f: impl FnMut(&[u32])) {
    let mut order = keys.to_vec();
    order.sort_unstable();
    loop {
        f(&order);
        let Some(pivot) = order.windows(2).rposition(|w| w[0] < w[1]) else {
            return;
        };
        let pivot_key = order[pivot];
        let swap = order
            .iter()
            .rposition(|&k| k > pivot_key)
            .expect("a larger key follows the pivot");
        order.swap(pivot, swap);
        order[pivot + 1..].reverse();
    }
}

#[test]
fn exhaustive_insert_order_single_bucket() {
    let mut orderings = 0;
    each_ordering(&[5, 1, 9, 3, 7, 2], |perm| {
        orderings += 1;
        let mut m: DualKeyedMap<u32, u32, Collide> =
            DualKeyedMap::with_config_and_hasher(Config::default(), Collide);
        for (i, k) in perm.iter().enumerate() {
            assert_eq!(m.insert(*k, 100 + i as u32), None);
        }
        validate_map(&m);
        let order: Vec<u32> = m.keys().copied().collect();
        assert_eq!(order, perm);
    });
    assert_eq!(orderings, 720);
}

#[test]
fn exhaustive_remove_order_single_bucket() {
    let keys = [5u32, 1, 9, 3, 7, 2];

    // Insert in a fixed order, then remove in all permutations.
    let mut base: DualKeyedMap<u32, u32, Collide> =
        DualKeyedMap::with_config_and_hasher(Config::default(), Collide);
    for k in &keys {
        base.insert(*k, k * 10);
    }

    each_ordering(&keys, |perm| {
        let mut m = base.clone();
        for &k in perm {
            assert_eq!(m.remove(&k), Some(k * 10));
            assert!(!m.contains_value(&(k * 10)));
            validate_map(&m);
        }
        assert!(m.is_empty());
        assert_eq!(m.head, NIL);
    });
}
