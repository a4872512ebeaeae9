//! A self-balancing dynamic AABB tree.
//!
//! Nodes live in a flat arena and refer to each other by index.
//! Removed nodes go to a free list and get reused by later insertions.

use std::collections::HashMap;

use super::{check_expansion, refreshed_aabb, BroadPhase, BroadPhaseParams, BroadPhasePair};
use crate::{
    collision::{ColliderKey, ColliderRef, AABB},
    error::CollisionError,
    math as m,
};

//
// Internal types
//

#[derive(Clone, Copy, Debug)]
struct Node {
    aabb: AABB,
    parent: Option<usize>,
    /// Zero for leaves.
    height: usize,
    kind: NodeKind,
}

#[derive(Clone, Copy, Debug)]
enum NodeKind {
    Branch { left: usize, right: usize },
    Leaf { key: ColliderKey, tested: bool },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl Side {
    fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// A "call stack" for efficient recursion through the tree.
#[derive(Clone, Debug, Default)]
struct Stack(Vec<usize>);

//
// The tree itself
//

/// A broad phase built on a binary tree of AABBs, kept balanced AVL-style.
///
/// Insertion descends towards the spot that grows the total perimeter of the tree the least.
#[derive(Clone, Debug)]
pub struct DynamicTree {
    nodes: Vec<Node>,
    free: Vec<usize>,
    root: Option<usize>,
    leaves: HashMap<ColliderKey, usize>,
    params: BroadPhaseParams,
    /// Single stack that is kept around so that we don't need to
    /// allocate a separate one for every traversal.
    shared_stack: Stack,
}

impl Default for DynamicTree {
    fn default() -> Self {
        Self::build(BroadPhaseParams::default())
    }
}

impl DynamicTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: BroadPhaseParams) -> Result<Self, CollisionError> {
        params.validate()?;
        Ok(Self::build(params))
    }

    fn build(params: BroadPhaseParams) -> Self {
        Self {
            nodes: Vec::with_capacity(2 * params.initial_capacity),
            free: Vec::new(),
            root: None,
            leaves: HashMap::with_capacity(params.initial_capacity),
            params,
            shared_stack: Stack::default(),
        }
    }

    /// Height of the root node. Empty trees and single leaves have height 0.
    pub fn height(&self) -> usize {
        self.root.map(|r| self.nodes[r].height).unwrap_or(0)
    }

    /// Lazily iterate over every collider whose proxy overlaps `aabb`.
    pub fn query_aabb(&mut self, aabb: AABB) -> AabbIter<'_> {
        let next_node = self
            .root
            .filter(|&root| self.nodes[root].aabb.overlaps(&aabb));
        AabbIter {
            aabb,
            stack: &mut self.shared_stack,
            nodes: &self.nodes,
            next_node,
        }
    }

    /// Check the structural invariants of the tree:
    /// parent links, heights, AVL balance, exact AABB unions and the leaf map.
    pub fn validate(&self) -> bool {
        match self.root {
            None => self.leaves.is_empty(),
            Some(root) => {
                self.nodes[root].parent.is_none()
                    && self.validate_subtree(root) == Some(self.leaves.len())
            }
        }
    }

    /// Number of leaves below `idx`, or `None` if something is wrong down there.
    fn validate_subtree(&self, idx: usize) -> Option<usize> {
        let node = &self.nodes[idx];
        match node.kind {
            NodeKind::Leaf { key, .. } => {
                (node.height == 0 && self.leaves.get(&key) == Some(&idx)).then_some(1)
            }
            NodeKind::Branch { left, right } => {
                let (l, r) = (&self.nodes[left], &self.nodes[right]);
                let links_ok = l.parent == Some(idx) && r.parent == Some(idx);
                let height_ok = node.height == 1 + l.height.max(r.height);
                let balanced = l.height.abs_diff(r.height) <= 1;
                let aabb_ok = node.aabb == l.aabb.union(&r.aabb);
                if !(links_ok && height_ok && balanced && aabb_ok) {
                    return None;
                }
                Some(self.validate_subtree(left)? + self.validate_subtree(right)?)
            }
        }
    }

    //
    // arena management
    //

    fn allocate(&mut self, node: Node) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn child(&self, idx: usize, side: Side) -> usize {
        match (self.nodes[idx].kind, side) {
            (NodeKind::Branch { left, .. }, Side::Left) => left,
            (NodeKind::Branch { right, .. }, Side::Right) => right,
            (NodeKind::Leaf { .. }, _) => unreachable!("Leaves have no children"),
        }
    }

    fn set_child(&mut self, idx: usize, side: Side, child: usize) {
        if let NodeKind::Branch { left, right } = &mut self.nodes[idx].kind {
            match side {
                Side::Left => *left = child,
                Side::Right => *right = child,
            }
        }
    }

    fn replace_child(&mut self, parent: usize, old: usize, new: usize) {
        if let NodeKind::Branch { left, right } = &mut self.nodes[parent].kind {
            if *left == old {
                *left = new;
            } else if *right == old {
                *right = new;
            }
        }
    }

    /// Recompute height and AABB of a node from its children.
    fn refit(&mut self, idx: usize) {
        if let NodeKind::Branch { left, right } = self.nodes[idx].kind {
            let (l, r) = (self.nodes[left], self.nodes[right]);
            self.nodes[idx].height = 1 + l.height.max(r.height);
            self.nodes[idx].aabb = l.aabb.union(&r.aabb);
        }
    }

    //
    // structural changes
    //

    fn insert_leaf(&mut self, leaf: usize) {
        let Some(root) = self.root else {
            self.nodes[leaf].parent = None;
            self.root = Some(leaf);
            return;
        };

        // find the cheapest sibling for the new leaf
        let leaf_aabb = self.nodes[leaf].aabb;
        let mut sibling = root;
        while let NodeKind::Branch { left, right } = self.nodes[sibling].kind {
            let perimeter = self.nodes[sibling].aabb.perimeter();
            let union_perimeter = self.nodes[sibling].aabb.union(&leaf_aabb).perimeter();
            // cost of pairing the leaf with this node under a new parent
            let cost = 2.0 * union_perimeter;
            // growth that every ancestor has to pay if we go deeper
            let descend_cost = 2.0 * (union_perimeter - perimeter);

            let child_cost = |child: usize| {
                let node = &self.nodes[child];
                let union_perimeter = node.aabb.union(&leaf_aabb).perimeter();
                match node.kind {
                    NodeKind::Leaf { .. } => union_perimeter + descend_cost,
                    NodeKind::Branch { .. } => {
                        union_perimeter - node.aabb.perimeter() + descend_cost
                    }
                }
            };
            let cost_left = child_cost(left);
            let cost_right = child_cost(right);

            if cost < cost_left && cost < cost_right {
                break;
            }
            sibling = if cost_left < cost_right { left } else { right };
        }

        let old_parent = self.nodes[sibling].parent;
        let new_parent = self.allocate(Node {
            aabb: self.nodes[sibling].aabb.union(&leaf_aabb),
            parent: old_parent,
            height: self.nodes[sibling].height + 1,
            kind: NodeKind::Branch {
                left: sibling,
                right: leaf,
            },
        });
        self.nodes[sibling].parent = Some(new_parent);
        self.nodes[leaf].parent = Some(new_parent);
        match old_parent {
            Some(p) => self.replace_child(p, sibling, new_parent),
            None => self.root = Some(new_parent),
        }

        self.rebalance_from(Some(new_parent));
    }

    /// Detach a leaf from the tree without freeing it.
    fn remove_leaf(&mut self, leaf: usize) {
        if self.root == Some(leaf) {
            self.root = None;
            return;
        }
        let Some(parent) = self.nodes[leaf].parent else {
            return;
        };
        let sibling = match self.nodes[parent].kind {
            NodeKind::Branch { left, right } => {
                if left == leaf {
                    right
                } else {
                    left
                }
            }
            NodeKind::Leaf { .. } => unreachable!("A leaf's parent is always a branch"),
        };

        // the sibling takes the parent's place
        let grandparent = self.nodes[parent].parent;
        self.nodes[sibling].parent = grandparent;
        match grandparent {
            Some(g) => self.replace_child(g, parent, sibling),
            None => self.root = Some(sibling),
        }
        self.free.push(parent);
        self.nodes[leaf].parent = None;

        self.rebalance_from(grandparent);
    }

    /// Walk from a node up to the root, balancing and refitting every node on the way.
    fn rebalance_from(&mut self, start: Option<usize>) {
        let mut curr = start;
        while let Some(idx) = curr {
            let idx = self.balance(idx);
            curr = self.nodes[idx].parent;
        }
    }

    /// Balance the subtree rooted at `a`, returning the index of its new root.
    /// The returned node is always refitted.
    fn balance(&mut self, a: usize) -> usize {
        let NodeKind::Branch { left, right } = self.nodes[a].kind else {
            return a;
        };
        let left_height = self.nodes[left].height;
        let right_height = self.nodes[right].height;
        if right_height > left_height + 1 {
            self.rotate(a, Side::Right)
        } else if left_height > right_height + 1 {
            self.rotate(a, Side::Left)
        } else {
            self.refit(a);
            a
        }
    }

    /// Promote the child of `a` on the taller side into `a`'s place.
    ///
    /// The taller grandchild stays with the promoted node and the shorter one
    /// moves under `a`, which is then balanced again in case it leans the other way.
    fn rotate(&mut self, a: usize, taller: Side) -> usize {
        let c = self.child(a, taller);
        let (f, g) = match self.nodes[c].kind {
            NodeKind::Branch { left, right } => (left, right),
            NodeKind::Leaf { .. } => unreachable!("Only branches are tall enough to rotate"),
        };

        let parent = self.nodes[a].parent;
        self.nodes[c].parent = parent;
        match parent {
            Some(p) => self.replace_child(p, a, c),
            None => self.root = Some(c),
        }

        let (keep, moved) = if self.nodes[f].height >= self.nodes[g].height {
            (f, g)
        } else {
            (g, f)
        };
        self.set_child(c, taller, keep);
        self.set_child(c, taller.opposite(), a);
        self.nodes[a].parent = Some(c);
        self.set_child(a, taller, moved);
        self.nodes[moved].parent = Some(a);

        self.balance(a);
        self.refit(c);
        c
    }

    fn reinsert(&mut self, leaf: usize, aabb: AABB) {
        self.remove_leaf(leaf);
        self.nodes[leaf].aabb = aabb;
        self.insert_leaf(leaf);
    }

    //
    // pair detection
    //

    /// Find every untested leaf overlapping the given one
    /// with a stackless traversal that climbs back up through parent links.
    fn detect_leaf(&self, query_leaf: usize, pairs: &mut Vec<BroadPhasePair>) {
        let query = self.nodes[query_leaf];
        let NodeKind::Leaf { key: query_key, .. } = query.kind else {
            return;
        };

        let mut curr = self.root;
        // whether the subtree at `curr` has been fully handled
        let mut done = false;
        while let Some(idx) = curr {
            if done {
                let Some(parent) = self.nodes[idx].parent else {
                    break;
                };
                match self.nodes[parent].kind {
                    NodeKind::Branch { left, right } if left == idx => {
                        curr = Some(right);
                        done = false;
                    }
                    _ => curr = Some(parent),
                }
                continue;
            }

            let node = &self.nodes[idx];
            if node.aabb.overlaps(&query.aabb) {
                match node.kind {
                    NodeKind::Branch { left, .. } => {
                        curr = Some(left);
                        continue;
                    }
                    NodeKind::Leaf { key, tested } => {
                        if !tested && idx != query_leaf {
                            pairs.push(BroadPhasePair::new(query_key, key));
                        }
                    }
                }
            }
            done = true;
        }
    }

    fn set_tested(&mut self, leaf: usize, value: bool) {
        if let NodeKind::Leaf { tested, .. } = &mut self.nodes[leaf].kind {
            *tested = value;
        }
    }
}

impl BroadPhase for DynamicTree {
    fn add(&mut self, coll: ColliderRef<'_>) {
        let aabb = coll.collider.aabb().expanded(self.params.aabb_expansion);
        if let Some(&leaf) = self.leaves.get(&coll.key) {
            self.reinsert(leaf, aabb);
            return;
        }
        let leaf = self.allocate(Node {
            aabb,
            parent: None,
            height: 0,
            kind: NodeKind::Leaf {
                key: coll.key,
                tested: false,
            },
        });
        self.leaves.insert(coll.key, leaf);
        self.insert_leaf(leaf);
    }

    fn remove(&mut self, key: ColliderKey) -> bool {
        match self.leaves.remove(&key) {
            Some(leaf) => {
                self.remove_leaf(leaf);
                self.free.push(leaf);
                true
            }
            None => false,
        }
    }

    fn update(&mut self, coll: ColliderRef<'_>) {
        let Some(&leaf) = self.leaves.get(&coll.key) else {
            self.add(coll);
            return;
        };
        if let Some(aabb) =
            refreshed_aabb(&self.nodes[leaf].aabb, coll.collider, self.params.aabb_expansion)
        {
            self.reinsert(leaf, aabb);
        }
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.leaves.clear();
        self.root = None;
    }

    fn aabb(&self, key: ColliderKey) -> Option<AABB> {
        self.leaves.get(&key).map(|&leaf| self.nodes[leaf].aabb)
    }

    fn len(&self) -> usize {
        self.leaves.len()
    }

    fn detect(&mut self) -> Vec<BroadPhasePair> {
        tracy_span!("DynamicTree::detect");

        let leaf_nodes: Vec<usize> = self.leaves.values().copied().collect();
        for &leaf in &leaf_nodes {
            self.set_tested(leaf, false);
        }
        let mut pairs = Vec::with_capacity(self.params.pair_capacity(leaf_nodes.len()));
        for &leaf in &leaf_nodes {
            self.detect_leaf(leaf, &mut pairs);
            self.set_tested(leaf, true);
        }
        pairs
    }

    fn detect_aabb(&mut self, aabb: &AABB) -> Vec<ColliderKey> {
        let mut found = Vec::with_capacity(self.params.query_capacity(self.leaves.len()));
        found.extend(self.query_aabb(*aabb));
        found
    }

    fn shift_coordinates(&mut self, shift: m::Vec2) {
        for node in &mut self.nodes {
            node.aabb = node.aabb.translated(shift);
        }
    }

    fn aabb_expansion(&self) -> f64 {
        self.params.aabb_expansion
    }

    fn set_aabb_expansion(&mut self, expansion: f64) -> Result<(), CollisionError> {
        self.params.aabb_expansion = check_expansion(expansion)?;
        Ok(())
    }
}

//
// Iterators
//

/// An iterator that yields every collider whose proxy may intersect with a given AABB.
#[derive(Debug)]
pub struct AabbIter<'a> {
    aabb: AABB,
    stack: &'a mut Stack,
    nodes: &'a [Node],
    next_node: Option<usize>,
}

impl<'a> Iterator for AabbIter<'a> {
    type Item = ColliderKey;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let next_node = self.next_node?;

            match self.nodes[next_node].kind {
                NodeKind::Branch { left, right } => {
                    match (
                        self.aabb.overlaps(&self.nodes[left].aabb),
                        self.aabb.overlaps(&self.nodes[right].aabb),
                    ) {
                        (true, true) => {
                            // need to visit both children, push to stack to return to later
                            self.stack.0.push(right);
                            self.next_node = Some(left);
                        }
                        (true, false) => {
                            self.next_node = Some(left);
                        }
                        (false, true) => {
                            self.next_node = Some(right);
                        }
                        (false, false) => {
                            // nothing below this, return back up the stack
                            self.next_node = self.stack.0.pop();
                        }
                    }
                }
                NodeKind::Leaf { key, .. } => {
                    self.next_node = self.stack.0.pop();
                    return Some(key);
                }
            }
        }
    }
}

impl<'a> Drop for AabbIter<'a> {
    fn drop(&mut self) {
        // clear the stack on drop; it may not be empty
        // if the iteration didn't finish
        self.stack.0.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        collision::{Collider, ColliderSet, ColliderShape},
        math::PoseBuilder,
    };
    use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

    /// Circles on a jittered grid, far enough apart that none overlap.
    fn scattered_circles(count: usize, rng: &mut StdRng) -> ColliderSet {
        let mut set = ColliderSet::new();
        let columns = 40;
        for i in 0..count {
            let pos = [
                (i % columns) as f64 * 3.0 + rng.gen_range(-0.4..0.4),
                (i / columns) as f64 * 3.0 + rng.gen_range(-0.4..0.4),
            ];
            let shape = ColliderShape::new_circle(rng.gen_range(0.3..1.0)).unwrap();
            set.insert(Collider::single(shape, PoseBuilder::new().with_position(pos)));
        }
        set
    }

    #[test]
    fn thousand_inserts_and_removals() {
        let mut rng = StdRng::seed_from_u64(1000);
        let set = scattered_circles(1000, &mut rng);
        let mut tree = DynamicTree::new();

        for coll in set.iter() {
            tree.add(coll);
            assert!(tree.validate());
        }
        assert_eq!(tree.len(), 1000);
        // a balanced tree of 1000 leaves
        assert!(tree.height() >= 10 && tree.height() <= 15, "{}", tree.height());
        // the jittered grid keeps the shapes apart, but fattened boxes never touch either
        assert!(tree.detect().is_empty());

        let mut keys: Vec<ColliderKey> = set.iter().map(|c| c.key).collect();
        keys.shuffle(&mut rng);
        for key in keys {
            assert!(tree.remove(key));
            assert!(tree.validate());
        }
        assert!(tree.root.is_none());
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.height(), 0);
    }

    #[test]
    fn stays_balanced_under_updates() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut set = scattered_circles(200, &mut rng);
        let mut tree = DynamicTree::new();
        for coll in set.iter() {
            tree.add(coll);
        }
        for _ in 0..10 {
            for (_, coll) in set.iter_mut() {
                coll.pose.translation +=
                    m::Vec2::new(rng.gen_range(-2.0..2.0), rng.gen_range(-2.0..2.0));
            }
            for coll in set.iter() {
                tree.update(coll);
            }
            assert!(tree.validate());
        }
    }

    #[test]
    fn sorted_input_stays_balanced() {
        // inserting along a line is the worst case for an unbalanced tree
        let mut set = ColliderSet::new();
        let shape = ColliderShape::new_rect(0.5, 0.5).unwrap();
        for i in 0..256 {
            set.insert(Collider::single(
                shape.clone(),
                PoseBuilder::new().with_position([i as f64, 0.0]),
            ));
        }
        let mut tree = DynamicTree::new();
        for coll in set.iter() {
            tree.add(coll);
        }
        assert!(tree.validate());
        assert!(tree.height() <= 12, "{}", tree.height());
    }

    #[test]
    fn nodes_are_reused() {
        let mut rng = StdRng::seed_from_u64(9);
        let set = scattered_circles(20, &mut rng);
        let mut tree = DynamicTree::new();
        for coll in set.iter() {
            tree.add(coll);
        }
        let node_count = tree.nodes.len();
        for coll in set.iter() {
            tree.remove(coll.key);
        }
        for coll in set.iter() {
            tree.add(coll);
        }
        assert_eq!(tree.nodes.len(), node_count);
        assert!(tree.validate());
    }

    #[test]
    fn abandoned_query_leaves_clean_stack() {
        let mut rng = StdRng::seed_from_u64(5);
        let set = scattered_circles(100, &mut rng);
        let mut tree = DynamicTree::new();
        for coll in set.iter() {
            tree.add(coll);
        }
        let everything = AABB::new(m::Vec2::new(-10.0, -10.0), m::Vec2::new(200.0, 200.0)).unwrap();
        let first_two: Vec<ColliderKey> = tree.query_aabb(everything).take(2).collect();
        assert_eq!(first_two.len(), 2);
        assert!(tree.shared_stack.0.is_empty());
        assert_eq!(tree.query_aabb(everything).count(), 100);
    }
}
