//! Collision trees.
//!
//! Every bucket of a side's table is the root of an independent AVL tree. All
//! trees of one side are threaded through a single node arena addressed by
//! `u32` handles, so rotations and relinking never invalidate a handle held
//! somewhere else. Nodes carry only a mapping handle; keys are reached through
//! the `probe` callbacks, which keeps this module oblivious to key types.

use std::cmp::Ordering;
use std::collections::TryReserveError;

/// Absent link.
pub(crate) const NIL: u32 = u32::MAX;

#[derive(Clone, Copy, Debug)]
struct Node {
    mapping: u32,
    parent: u32,
    left: u32,
    right: u32,
    height: u8,
}

impl Node {
    #[inline]
    fn leaf(mapping: u32) -> Self {
        Self {
            mapping,
            parent: NIL,
            left: NIL,
            right: NIL,
            height: 1,
        }
    }
}

/// Outcome of [`Forest::detach`].
#[derive(Debug)]
pub(crate) struct Detached {
    /// Node physically unlinked from the tree. Its mapping field is stale.
    pub(crate) node: u32,
    /// Set when a two-child removal copied the in-order successor's mapping
    /// into the removed node: `(mapping, node now standing for it)`.
    pub(crate) moved: Option<(u32, u32)>,
}

/// One side's bucket table plus the arena its collision trees live in.
#[derive(Clone, Debug)]
pub(crate) struct Forest {
    nodes: Vec<Node>,
    vacant: Vec<u32>,
    roots: Vec<u32>,
}

impl Forest {
    pub(crate) fn try_with_buckets(buckets: usize) -> Result<Self, TryReserveError> {
        Ok(Self {
            nodes: Vec::new(),
            vacant: Vec::new(),
            roots: Self::try_roots(buckets)?,
        })
    }

    /// Allocates an empty bucket table without touching any forest.
    pub(crate) fn try_roots(buckets: usize) -> Result<Vec<u32>, TryReserveError> {
        let mut roots = Vec::new();
        roots.try_reserve_exact(buckets)?;
        roots.resize(buckets, NIL);
        Ok(roots)
    }

    #[inline]
    pub(crate) fn mapping(&self, node: u32) -> u32 {
        self.nodes[node as usize].mapping
    }

    /// Allocates a lone leaf standing for `mapping`. Not yet in any tree.
    pub(crate) fn alloc(&mut self, mapping: u32) -> u32 {
        match self.vacant.pop() {
            Some(node) => {
                self.nodes[node as usize] = Node::leaf(mapping);
                node
            }
            None => {
                let node = self.nodes.len() as u32;
                self.nodes.push(Node::leaf(mapping));
                node
            }
        }
    }

    pub(crate) fn release(&mut self, node: u32) {
        self.vacant.push(node);
    }

    /// Rebinds a detached node to `mapping` as a lone leaf.
    pub(crate) fn reuse(&mut self, node: u32, mapping: u32) {
        self.nodes[node as usize] = Node::leaf(mapping);
    }

    /// Drops `node`'s tree links, keeping its mapping.
    pub(crate) fn reset(&mut self, node: u32) {
        let mapping = self.mapping(node);
        self.reuse(node, mapping);
    }

    pub(crate) fn replace_roots(&mut self, roots: Vec<u32>) -> Vec<u32> {
        std::mem::replace(&mut self.roots, roots)
    }

    pub(crate) fn vacate(&mut self, bucket: usize) {
        self.roots[bucket] = NIL;
    }

    /// Forgets every node. Bucket slots must already have been vacated.
    pub(crate) fn clear_nodes(&mut self) {
        self.nodes.clear();
        self.vacant.clear();
    }

    /// Descends `bucket`'s tree. `probe` receives the mapping handle of each
    /// visited node and orders the sought key against it.
    pub(crate) fn find(&self, bucket: usize, mut probe: impl FnMut(u32) -> Ordering) -> Option<u32> {
        let mut cur = self.roots[bucket];
        while cur != NIL {
            let node = &self.nodes[cur as usize];
            cur = match probe(node.mapping) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(cur),
            };
        }
        None
    }

    /// Inserts the lone leaf `node` into `bucket`'s tree and rebalances.
    ///
    /// `probe` orders the new key against the mapping at each visited node.
    /// The key must not already be present in the tree.
    pub(crate) fn attach(&mut self, bucket: usize, node: u32, mut probe: impl FnMut(u32) -> Ordering) {
        let mut parent = self.roots[bucket];
        if parent == NIL {
            self.roots[bucket] = node;
            return;
        }

        loop {
            let p = self.nodes[parent as usize];
            let ord = probe(p.mapping);
            debug_assert_ne!(ord, Ordering::Equal, "duplicate key in collision tree");
            let next = if ord == Ordering::Less { p.left } else { p.right };
            if next == NIL {
                if ord == Ordering::Less {
                    self.nodes[parent as usize].left = node;
                } else {
                    self.nodes[parent as usize].right = node;
                }
                break;
            }
            parent = next;
        }

        self.nodes[node as usize].parent = parent;
        self.retrace(bucket, parent, true);
    }

    /// Unlinks `node` from `bucket`'s tree and rebalances every ancestor.
    ///
    /// A node with two children is not moved: it takes over its in-order
    /// successor's mapping and the successor, which has at most one child, is
    /// unlinked instead. The caller owns the returned node and must either
    /// [`release`](Self::release) or [`reuse`](Self::reuse) it.
    pub(crate) fn detach(&mut self, bucket: usize, node: u32) -> Detached {
        let n = self.nodes[node as usize];
        let (target, moved) = if n.left != NIL && n.right != NIL {
            let mut succ = n.right;
            while self.nodes[succ as usize].left != NIL {
                succ = self.nodes[succ as usize].left;
            }
            let mapping = self.nodes[succ as usize].mapping;
            self.nodes[node as usize].mapping = mapping;
            (succ, Some((mapping, node)))
        } else {
            (node, None)
        };

        let t = self.nodes[target as usize];
        let child = if t.left != NIL { t.left } else { t.right };
        if child != NIL {
            self.nodes[child as usize].parent = t.parent;
        }
        self.replace_child(bucket, t.parent, target, child);
        self.retrace(bucket, t.parent, false);

        Detached { node: target, moved }
    }

    // =========================================================================
    // Balancing
    // =========================================================================

    #[inline]
    fn height(&self, node: u32) -> i32 {
        if node == NIL {
            0
        } else {
            i32::from(self.nodes[node as usize].height)
        }
    }

    #[inline]
    fn balance(&self, node: u32) -> i32 {
        let n = &self.nodes[node as usize];
        self.height(n.left) - self.height(n.right)
    }

    #[inline]
    fn update_height(&mut self, node: u32) {
        let n = self.nodes[node as usize];
        let h = 1 + self.height(n.left).max(self.height(n.right));
        self.nodes[node as usize].height = h as u8;
    }

    fn replace_child(&mut self, bucket: usize, parent: u32, old: u32, new: u32) {
        if parent == NIL {
            self.roots[bucket] = new;
        } else if self.nodes[parent as usize].left == old {
            self.nodes[parent as usize].left = new;
        } else {
            debug_assert_eq!(self.nodes[parent as usize].right, old);
            self.nodes[parent as usize].right = new;
        }
    }

    fn rotate_left(&mut self, bucket: usize, x: u32) -> u32 {
        let y = self.nodes[x as usize].right;
        let inner = self.nodes[y as usize].left;
        let parent = self.nodes[x as usize].parent;

        self.nodes[x as usize].right = inner;
        if inner != NIL {
            self.nodes[inner as usize].parent = x;
        }
        self.nodes[y as usize].left = x;
        self.nodes[x as usize].parent = y;
        self.nodes[y as usize].parent = parent;
        self.replace_child(bucket, parent, x, y);

        self.update_height(x);
        self.update_height(y);
        y
    }

    fn rotate_right(&mut self, bucket: usize, x: u32) -> u32 {
        let y = self.nodes[x as usize].left;
        let inner = self.nodes[y as usize].right;
        let parent = self.nodes[x as usize].parent;

        self.nodes[x as usize].left = inner;
        if inner != NIL {
            self.nodes[inner as usize].parent = x;
        }
        self.nodes[y as usize].right = x;
        self.nodes[x as usize].parent = y;
        self.nodes[y as usize].parent = parent;
        self.replace_child(bucket, parent, x, y);

        self.update_height(x);
        self.update_height(y);
        y
    }

    /// Refreshes `node`'s height and rotates if it is out of balance.
    /// Returns the root of the subtree that replaced `node`.
    fn rebalance(&mut self, bucket: usize, node: u32) -> u32 {
        self.update_height(node);
        let balance = self.balance(node);
        if balance > 1 {
            let left = self.nodes[node as usize].left;
            if self.balance(left) < 0 {
                self.rotate_left(bucket, left);
            }
            self.rotate_right(bucket, node)
        } else if balance < -1 {
            let right = self.nodes[node as usize].right;
            if self.balance(right) > 0 {
                self.rotate_right(bucket, right);
            }
            self.rotate_left(bucket, node)
        } else {
            node
        }
    }

    /// Walks from `node` to the root via parent links, rebalancing each level.
    /// After an insertion the walk stops at the first subtree whose height is
    /// unchanged; after a removal it always reaches the root.
    fn retrace(&mut self, bucket: usize, mut node: u32, insertion: bool) {
        while node != NIL {
            let before = self.nodes[node as usize].height;
            let top = self.rebalance(bucket, node);
            if insertion && self.nodes[top as usize].height == before {
                break;
            }
            node = self.nodes[top as usize].parent;
        }
    }
}

#[cfg(test)]
impl Forest {
    /// Walks `bucket`'s tree asserting parent links, cached heights and AVL
    /// balance. Returns `(node, mapping)` pairs in key order.
    pub(crate) fn audit(&self, bucket: usize) -> Vec<(u32, u32)> {
        fn walk(f: &Forest, node: u32, parent: u32, out: &mut Vec<(u32, u32)>) -> i32 {
            if node == NIL {
                return 0;
            }
            let n = f.nodes[node as usize];
            assert_eq!(n.parent, parent, "parent link of node {node}");
            let lh = walk(f, n.left, node, out);
            out.push((node, n.mapping));
            let rh = walk(f, n.right, node, out);
            assert!((lh - rh).abs() <= 1, "AVL imbalance {} at node {node}", lh - rh);
            assert_eq!(i32::from(n.height), 1 + lh.max(rh), "cached height of node {node}");
            1 + lh.max(rh)
        }

        let mut out = Vec::new();
        walk(self, self.roots[bucket], NIL, &mut out);
        out
    }

    pub(crate) fn buckets(&self) -> usize {
        self.roots.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len() - self.vacant.len()
    }

    pub(crate) fn depth(&self, bucket: usize) -> i32 {
        self.height(self.roots[bucket])
    }
}
