use std::collections::BTreeMap;

use log::{debug, trace};
use slotmap::SlotMap;

use super::tree_node::{LeafHandle, NodeKey, NodeKind, TreeNode};
use super::{BodySource, BroadPhase, CandidatePair, Gizmo, GizmoKind, QueryStats};
use crate::collision::AABB;
use crate::error::{CollisionError, Result};

/// Default fat-box margin, in world units on each side.
pub const DEFAULT_MARGIN: f64 = 0.2;

/// Dynamic bounding-volume tree over the bodies' tight boxes.
///
/// Leaves store a fat box (tight box plus `margin`) so that small motions do
/// not touch the tree structure. A leaf is only re-inserted once its body
/// leaves the fat box. Branch boxes always equal the merge of their
/// children's fat boxes.
///
/// Every insertion and removal rebalances the path back to the root with
/// height-driven rotations, so [`DynamicAabbTree::height`] stays logarithmic
/// even when bodies arrive in spatial order.
#[derive(Debug, Clone)]
pub struct DynamicAabbTree {
    nodes: SlotMap<NodeKey, TreeNode>,
    root: Option<NodeKey>,
    /// Body index -> leaf. Ordered so that refits run in body order.
    leaves: BTreeMap<usize, NodeKey>,
    margin: f64,
    initialized: bool,
    stats: QueryStats,
}

impl Default for DynamicAabbTree {
    fn default() -> Self {
        Self::new(DEFAULT_MARGIN)
    }
}

impl DynamicAabbTree {
    pub fn new(margin: f64) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root: None,
            leaves: BTreeMap::new(),
            margin: margin.max(0.0),
            initialized: false,
            stats: QueryStats::default(),
        }
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// Number of tracked bodies.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn root(&self) -> Option<NodeKey> {
        self.root
    }

    /// Number of node levels: 0 when empty, 1 for a lone leaf.
    pub fn height(&self) -> usize {
        self.root.map_or(0, |root| self.nodes[root].height)
    }

    /// The leaf node behind a handle, or `None` for stale handles and branches.
    pub fn leaf(&self, handle: LeafHandle) -> Option<&TreeNode> {
        self.nodes.get(handle).filter(|node| node.is_leaf())
    }

    pub fn leaf_of(&self, body: usize) -> Option<LeafHandle> {
        self.leaves.get(&body).copied()
    }

    pub fn node(&self, key: NodeKey) -> Option<&TreeNode> {
        self.nodes.get(key)
    }

    /// Counters from the last call to `candidate_pairs`.
    pub fn last_query_stats(&self) -> QueryStats {
        self.stats
    }

    /// Bulk-inserts every body of the source not yet tracked.
    pub fn init(&mut self, bodies: &dyn BodySource) {
        for index in 0..bodies.body_count() {
            if self.leaves.contains_key(&index) {
                continue;
            }
            if let Some(body) = bodies.body(index) {
                self.add(index, body.calculate_aabb());
            }
        }
        self.initialized = true;
        debug!("AABB tree initialized with {} leaves", self.leaves.len());
    }

    /// Adds a leaf for `body` bounded by `tight`. A body that is already
    /// tracked has its old leaf replaced.
    pub fn add(&mut self, body: usize, tight: AABB) -> LeafHandle {
        if let Some(old) = self.leaves.remove(&body) {
            self.unlink(old);
            self.nodes.remove(old);
        }

        let leaf = self.nodes.insert(TreeNode::leaf(body, tight, self.margin));
        self.leaves.insert(body, leaf);
        self.insert_leaf(leaf);
        trace!("Added leaf for body {} (tree height {})", body, self.height());
        leaf
    }

    /// Removes a leaf and splices its sibling into the parent's place.
    pub fn remove(&mut self, handle: LeafHandle) -> Result<()> {
        let body = self
            .leaf(handle)
            .and_then(TreeNode::body)
            .ok_or(CollisionError::InvalidHandle)?;

        self.unlink(handle);
        self.nodes.remove(handle);
        self.leaves.remove(&body);
        trace!("Removed leaf for body {}", body);
        Ok(())
    }

    /// Refreshes every leaf's tight box and re-inserts the leaves that moved
    /// out of their fat box. Returns how many leaves were invalid.
    pub fn update(&mut self, bodies: &dyn BodySource) -> Result<usize> {
        let mut tights = Vec::with_capacity(self.leaves.len());
        for (&body, &leaf) in &self.leaves {
            let rigid_body = bodies.body(body).ok_or(CollisionError::UnknownBody(body))?;
            tights.push((leaf, body, rigid_body.calculate_aabb()));
        }

        let mut invalid = Vec::new();
        for (leaf, body, tight) in tights {
            let node = &mut self.nodes[leaf];
            node.kind = NodeKind::Leaf { body, tight };
            if !node.is_valid() {
                invalid.push(leaf);
            }
        }

        for &leaf in &invalid {
            self.unlink(leaf);
            let node = &mut self.nodes[leaf];
            if let Some(tight) = node.tight() {
                node.fat = tight.inflate(self.margin);
            }
            self.insert_leaf(leaf);
        }

        Ok(invalid.len())
    }

    /// Returns every pair of bodies whose tight boxes overlap.
    ///
    /// Initializes the tree on first use, refits it against the current
    /// geometry, then walks it comparing each subtree against its sibling.
    pub fn candidate_pairs(&mut self, bodies: &dyn BodySource) -> Result<Vec<CandidatePair>> {
        if !self.initialized {
            self.init(bodies);
        }
        let invalid_nodes = self.update(bodies)?;

        for node in self.nodes.values_mut() {
            node.crossed = false;
        }

        let mut pairs = Vec::new();
        if let Some(children) = self.root.and_then(|root| self.nodes[root].children()) {
            self.compute_pairs(children[0], children[1], &mut pairs);
        }

        self.stats = QueryStats {
            invalid_nodes,
            potential_pairs: pairs.len(),
        };
        debug!(
            "Broad phase: {} invalid nodes, {} potential pairs",
            invalid_nodes,
            pairs.len()
        );
        Ok(pairs)
    }

    /// Fat branch boxes, fat leaf boxes and tight leaf boxes, in arena order.
    pub fn gizmos(&self) -> Vec<Gizmo> {
        let mut gizmos = Vec::with_capacity(self.nodes.len() + self.leaves.len());
        for node in self.nodes.values() {
            match node.kind {
                NodeKind::Branch { .. } => gizmos.push(Gizmo {
                    aabb: node.fat,
                    kind: GizmoKind::FatBranch,
                }),
                NodeKind::Leaf { tight, .. } => {
                    gizmos.push(Gizmo {
                        aabb: node.fat,
                        kind: GizmoKind::FatLeaf,
                    });
                    gizmos.push(Gizmo {
                        aabb: tight,
                        kind: GizmoKind::TightLeaf,
                    });
                }
            }
        }
        gizmos
    }

    /// Verifies the structural invariants, reporting the first violation.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let Some(root) = self.root else {
            if self.nodes.is_empty() && self.leaves.is_empty() {
                return Ok(());
            }
            return Err(format!(
                "empty tree still holds {} nodes and {} leaves",
                self.nodes.len(),
                self.leaves.len()
            ));
        };

        if self.nodes[root].parent.is_some() {
            return Err("root has a parent".to_string());
        }
        let expected_nodes = 2 * self.leaves.len() - 1;
        if self.nodes.len() != expected_nodes {
            return Err(format!(
                "{} nodes for {} leaves, expected {}",
                self.nodes.len(),
                self.leaves.len(),
                expected_nodes
            ));
        }

        let mut reached_leaves = 0;
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            let node = self.nodes.get(key).ok_or_else(|| format!("dangling key {:?}", key))?;
            match node.kind {
                NodeKind::Leaf { body, tight } => {
                    reached_leaves += 1;
                    if self.leaves.get(&body) != Some(&key) {
                        return Err(format!("leaf for body {} missing from the body map", body));
                    }
                    if !node.fat.contains(&tight) {
                        return Err(format!("leaf for body {} has a tight box outside its fat box", body));
                    }
                }
                NodeKind::Branch { children } => {
                    for child in children {
                        let child_node = self
                            .nodes
                            .get(child)
                            .ok_or_else(|| format!("dangling child {:?}", child))?;
                        if child_node.parent != Some(key) {
                            return Err(format!("child {:?} does not point back to {:?}", child, key));
                        }
                        stack.push(child);
                    }
                    let merged = self.nodes[children[0]].fat.merge(&self.nodes[children[1]].fat);
                    if node.fat != merged {
                        return Err(format!("branch {:?} box is not the merge of its children", key));
                    }
                    let (h0, h1) = (self.nodes[children[0]].height, self.nodes[children[1]].height);
                    if node.height != 1 + h0.max(h1) {
                        return Err(format!("branch {:?} has a stale height {}", key, node.height));
                    }
                    if h0.abs_diff(h1) > 1 {
                        return Err(format!("branch {:?} is unbalanced ({} vs {})", key, h0, h1));
                    }
                }
            }
        }

        if reached_leaves != self.leaves.len() {
            return Err(format!(
                "{} leaves reachable from the root, {} tracked",
                reached_leaves,
                self.leaves.len()
            ));
        }
        Ok(())
    }

    fn insert_leaf(&mut self, leaf: NodeKey) {
        match self.root {
            None => {
                self.nodes[leaf].parent = None;
                self.root = Some(leaf);
            }
            Some(root) => self.insert_node(root, leaf),
        }
    }

    /// Descends from `root` along the cheapest path and splits the leaf it
    /// lands on into a branch holding `node` (child 0) and that leaf (child 1).
    fn insert_node(&mut self, root: NodeKey, node: NodeKey) {
        let fat = self.nodes[node].fat;
        let mut target = root;
        while let NodeKind::Branch { children } = self.nodes[target].kind {
            let cost0 = self.insertion_cost(children[0], &fat);
            let cost1 = self.insertion_cost(children[1], &fat);
            target = if cost1 < cost0 { children[1] } else { children[0] };
        }

        let parent = self.nodes[target].parent;
        let merged = fat.merge(&self.nodes[target].fat);
        let height = 1 + self.nodes[target].height;
        let branch = self.nodes.insert(TreeNode::branch(parent, [node, target], merged, height));
        self.nodes[node].parent = Some(branch);
        self.nodes[target].parent = Some(branch);
        match parent {
            None => self.root = Some(branch),
            Some(parent) => {
                self.replace_child(parent, target, branch);
                self.refit_upwards(parent);
            }
        }
    }

    /// Area growth of `key`'s box if it had to hold `fat` as well.
    fn insertion_cost(&self, key: NodeKey, fat: &AABB) -> f64 {
        let current = self.nodes[key].fat;
        current.merge(fat).area() - current.area()
    }

    /// Detaches a node from the tree without freeing it. Its sibling takes the
    /// parent's place and the parent is freed.
    fn unlink(&mut self, key: NodeKey) {
        let Some(parent) = self.nodes[key].parent else {
            if self.root == Some(key) {
                self.root = None;
            }
            return;
        };

        let sibling = match self.nodes[parent].kind {
            NodeKind::Branch { children } if children[0] == key => children[1],
            NodeKind::Branch { children } => children[0],
            NodeKind::Leaf { .. } => return,
        };
        let grandparent = self.nodes[parent].parent;
        self.nodes[sibling].parent = grandparent;
        match grandparent {
            None => self.root = Some(sibling),
            Some(grandparent) => {
                self.replace_child(grandparent, parent, sibling);
                self.refit_upwards(grandparent);
            }
        }
        self.nodes.remove(parent);
        self.nodes[key].parent = None;
    }

    fn replace_child(&mut self, parent: NodeKey, old: NodeKey, new: NodeKey) {
        if let NodeKind::Branch { children } = &mut self.nodes[parent].kind {
            for child in children.iter_mut() {
                if *child == old {
                    *child = new;
                }
            }
        }
    }

    fn refit(&mut self, key: NodeKey) {
        let kind = self.nodes[key].kind;
        if let NodeKind::Branch { children: [c0, c1] } = kind {
            let fat = self.nodes[c0].fat.merge(&self.nodes[c1].fat);
            let height = 1 + self.nodes[c0].height.max(self.nodes[c1].height);
            let node = &mut self.nodes[key];
            node.fat = fat;
            node.height = height;
        }
    }

    /// Rebalances and refits every branch from `start` up to the root.
    fn refit_upwards(&mut self, start: NodeKey) {
        let mut current = Some(start);
        while let Some(key) = current {
            let key = self.balance(key);
            self.refit(key);
            current = self.nodes[key].parent;
        }
    }

    /// Rotates when `key`'s children differ in height by more than one.
    /// Returns the node that now stands in `key`'s place.
    fn balance(&mut self, key: NodeKey) -> NodeKey {
        let NodeKind::Branch { children: [b, c] } = self.nodes[key].kind else {
            return key;
        };
        let (hb, hc) = (self.nodes[b].height, self.nodes[c].height);
        if hc > hb + 1 {
            self.rotate_up(key, 1)
        } else if hb > hc + 1 {
            self.rotate_up(key, 0)
        } else {
            key
        }
    }

    /// Lifts the child in `slot` of `key` into `key`'s place. The lifted node
    /// keeps its taller child and hands the shorter one down to `key`.
    fn rotate_up(&mut self, key: NodeKey, slot: usize) -> NodeKey {
        let Some(children) = self.nodes[key].children() else {
            return key;
        };
        let lifted = children[slot];
        let Some([f, g]) = self.nodes[lifted].children() else {
            return key;
        };
        let (keep, give) = if self.nodes[f].height > self.nodes[g].height {
            (f, g)
        } else {
            (g, f)
        };

        let parent = self.nodes[key].parent;
        self.nodes[lifted].parent = parent;
        match parent {
            None => self.root = Some(lifted),
            Some(parent) => self.replace_child(parent, key, lifted),
        }

        self.nodes[lifted].kind = NodeKind::Branch { children: [key, keep] };
        self.nodes[key].parent = Some(lifted);
        if let NodeKind::Branch { children } = &mut self.nodes[key].kind {
            children[slot] = give;
        }
        self.nodes[give].parent = Some(key);

        self.refit(key);
        self.refit(lifted);
        trace!("Rotated tree, new subtree height {}", self.nodes[lifted].height);
        lifted
    }

    /// Compares each of a branch's children against the other, once per query.
    fn cross_children(&mut self, key: NodeKey, pairs: &mut Vec<CandidatePair>) {
        let node = &mut self.nodes[key];
        if node.crossed {
            return;
        }
        node.crossed = true;
        let kind = node.kind;
        if let NodeKind::Branch { children } = kind {
            self.compute_pairs(children[0], children[1], pairs);
        }
    }

    fn compute_pairs(&mut self, n0: NodeKey, n1: NodeKey, pairs: &mut Vec<CandidatePair>) {
        let kind0 = self.nodes[n0].kind;
        let kind1 = self.nodes[n1].kind;

        match (kind0, kind1) {
            (NodeKind::Leaf { body: a, tight: t0 }, NodeKind::Leaf { body: b, tight: t1 }) => {
                if t0.collides(&t1) {
                    pairs.push(CandidatePair::new(a, b));
                }
            }
            (NodeKind::Leaf { .. }, NodeKind::Branch { children }) => {
                self.cross_children(n1, pairs);
                if self.nodes[n0].fat.collides(&self.nodes[n1].fat) {
                    self.compute_pairs(n0, children[0], pairs);
                    self.compute_pairs(n0, children[1], pairs);
                }
            }
            (NodeKind::Branch { children }, NodeKind::Leaf { .. }) => {
                self.cross_children(n0, pairs);
                if self.nodes[n0].fat.collides(&self.nodes[n1].fat) {
                    self.compute_pairs(children[0], n1, pairs);
                    self.compute_pairs(children[1], n1, pairs);
                }
            }
            (NodeKind::Branch { children: c0 }, NodeKind::Branch { children: c1 }) => {
                self.cross_children(n0, pairs);
                self.cross_children(n1, pairs);
                if self.nodes[n0].fat.collides(&self.nodes[n1].fat) {
                    self.compute_pairs(c0[0], c1[0], pairs);
                    self.compute_pairs(c0[0], c1[1], pairs);
                    self.compute_pairs(c0[1], c1[0], pairs);
                    self.compute_pairs(c0[1], c1[1], pairs);
                }
            }
        }
    }
}

impl BroadPhase for DynamicAabbTree {
    fn init(&mut self, bodies: &dyn BodySource) -> Result<()> {
        DynamicAabbTree::init(self, bodies);
        Ok(())
    }

    fn insert(&mut self, body: usize, bodies: &dyn BodySource) -> Result<()> {
        let tight = bodies
            .body(body)
            .ok_or(CollisionError::UnknownBody(body))?
            .calculate_aabb();
        self.add(body, tight);
        Ok(())
    }

    fn remove(&mut self, body: usize) -> Result<()> {
        let handle = self.leaf_of(body).ok_or(CollisionError::InvalidHandle)?;
        DynamicAabbTree::remove(self, handle)
    }

    fn candidate_pairs(&mut self, bodies: &dyn BodySource) -> Result<Vec<CandidatePair>> {
        DynamicAabbTree::candidate_pairs(self, bodies)
    }

    fn gizmos(&self) -> Vec<Gizmo> {
        DynamicAabbTree::gizmos(self)
    }

    fn last_query_stats(&self) -> QueryStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broad_phase::BruteForce;
    use crate::math::Vec2;
    use crate::objects::RigidBody;
    use crate::shapes::Polygon;
    use std::collections::BTreeSet;

    fn square_body(size: f64, x: f64, y: f64) -> RigidBody {
        RigidBody::new(1.0, Polygon::square(size).unwrap()).with_position(Vec2::new(x, y))
    }

    fn aabb(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> AABB {
        AABB::new(Vec2::new(min_x, min_y), Vec2::new(max_x, max_y))
    }

    /// Small deterministic generator so scenes are reproducible.
    struct Lcg(u64);

    impl Lcg {
        fn next_f64(&mut self) -> f64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (self.0 >> 11) as f64 / (1u64 << 53) as f64
        }

        fn range(&mut self, lo: f64, hi: f64) -> f64 {
            lo + (hi - lo) * self.next_f64()
        }
    }

    fn scattered_bodies(count: usize, seed: u64) -> Vec<RigidBody> {
        let mut rng = Lcg(seed);
        (0..count)
            .map(|_| {
                let size = rng.range(0.5, 2.0);
                let sides = 3 + (rng.next_f64() * 5.0) as usize;
                let shape = Polygon::regular(size, sides).unwrap();
                RigidBody {
                    position: Vec2::new(rng.range(-15.0, 15.0), rng.range(-15.0, 15.0)),
                    rotation: rng.range(0.0, std::f64::consts::TAU),
                    ..RigidBody::new(1.0, shape)
                }
            })
            .collect()
    }

    fn as_set(pairs: &[CandidatePair]) -> BTreeSet<CandidatePair> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_empty_tree_has_no_pairs() {
        let mut tree = DynamicAabbTree::default();
        let bodies: Vec<RigidBody> = Vec::new();
        assert!(tree.candidate_pairs(&bodies).unwrap().is_empty());
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn test_single_leaf_has_no_pairs() {
        let mut tree = DynamicAabbTree::default();
        let bodies = vec![square_body(1.0, 0.0, 0.0)];
        assert!(tree.candidate_pairs(&bodies).unwrap().is_empty());
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn test_add_builds_branch_with_new_leaf_first() {
        let mut tree = DynamicAabbTree::new(0.2);
        let first = tree.add(0, aabb(0.0, 0.0, 1.0, 1.0));
        let second = tree.add(1, aabb(5.0, 0.0, 6.0, 1.0));

        let root = tree.root().unwrap();
        assert_eq!(tree.node(root).unwrap().children(), Some([second, first]));
        let expected = aabb(0.0, 0.0, 1.0, 1.0).inflate(0.2).merge(&aabb(5.0, 0.0, 6.0, 1.0).inflate(0.2));
        assert_eq!(tree.node(root).unwrap().fat, expected);
        assert_eq!(tree.leaf(first).unwrap().parent, Some(root));
        assert_eq!(tree.height(), 2);
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn test_insert_descends_into_cheaper_child() {
        let mut tree = DynamicAabbTree::new(0.0);
        let left = tree.add(0, aabb(0.0, 0.0, 1.0, 1.0));
        let right = tree.add(1, aabb(10.0, 0.0, 11.0, 1.0));
        let near_right = tree.add(2, aabb(11.0, 0.0, 12.0, 1.0));

        // The new leaf pairs up with the right-hand leaf, not the left one.
        let parent = tree.leaf(near_right).unwrap().parent.unwrap();
        assert_eq!(tree.node(parent).unwrap().children(), Some([near_right, right]));
        assert_ne!(tree.leaf(left).unwrap().parent, Some(parent));
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn test_remove_promotes_sibling_and_refits() {
        let mut tree = DynamicAabbTree::new(0.0);
        let a = tree.add(0, aabb(0.0, 0.0, 1.0, 1.0));
        let b = tree.add(1, aabb(10.0, 0.0, 11.0, 1.0));
        let c = tree.add(2, aabb(11.0, 0.0, 12.0, 1.0));

        tree.remove(c).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.check_invariants(), Ok(()));
        let root = tree.root().unwrap();
        assert_eq!(tree.node(root).unwrap().fat, aabb(0.0, 0.0, 11.0, 1.0));

        tree.remove(a).unwrap();
        assert_eq!(tree.root(), Some(b));
        assert_eq!(tree.leaf(b).unwrap().parent, None);

        tree.remove(b).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.root(), None);
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn test_row_insertion_rotates_instead_of_chaining() {
        let mut tree = DynamicAabbTree::new(0.0);
        let l0 = tree.add(0, aabb(0.0, 0.0, 1.0, 1.0));
        let l1 = tree.add(1, aabb(10.0, 0.0, 11.0, 1.0));
        let l2 = tree.add(2, aabb(20.0, 0.0, 21.0, 1.0));
        assert_eq!(tree.height(), 3);
        let l3 = tree.add(3, aabb(30.0, 0.0, 31.0, 1.0));

        // Without the rotation this would be a four-level chain.
        assert_eq!(tree.height(), 3);
        let low = tree.leaf(l0).unwrap().parent.unwrap();
        let high = tree.leaf(l3).unwrap().parent.unwrap();
        assert_eq!(tree.node(low).unwrap().children(), Some([l1, l0]));
        assert_eq!(tree.node(high).unwrap().children(), Some([l3, l2]));
        let root = tree.root().unwrap();
        assert_eq!(tree.node(root).unwrap().children(), Some([low, high]));
        assert_eq!(tree.node(root).unwrap().fat, aabb(0.0, 0.0, 31.0, 1.0));
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn test_long_row_keeps_logarithmic_height() {
        let count: usize = 4000;
        let bodies: Vec<RigidBody> = (0..count).map(|i| square_body(1.0, i as f64, 0.0)).collect();
        let mut tree = DynamicAabbTree::default();
        tree.init(&bodies);

        let log2 = (usize::BITS - count.leading_zeros()) as usize;
        assert!(tree.height() <= 2 * log2, "height {} for {} leaves", tree.height(), count);
        assert_eq!(tree.check_invariants(), Ok(()));

        // Neighbours touch edge to edge.
        let pairs = tree.candidate_pairs(&bodies).unwrap();
        let expected: BTreeSet<CandidatePair> = (1..count).map(|i| CandidatePair::new(i - 1, i)).collect();
        assert_eq!(as_set(&pairs), expected);

        // Removing every other leaf keeps the tree balanced.
        for body in (0..count).step_by(2) {
            let handle = tree.leaf_of(body).unwrap();
            tree.remove(handle).unwrap();
        }
        assert_eq!(tree.len(), count / 2);
        assert!(tree.height() <= 2 * log2);
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn test_remove_twice_is_invalid_handle() {
        let mut tree = DynamicAabbTree::default();
        let a = tree.add(0, aabb(0.0, 0.0, 1.0, 1.0));
        tree.add(1, aabb(3.0, 0.0, 4.0, 1.0));

        assert_eq!(tree.remove(a), Ok(()));
        assert_eq!(tree.remove(a), Err(CollisionError::InvalidHandle));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn test_remove_branch_key_is_invalid_handle() {
        let mut tree = DynamicAabbTree::default();
        tree.add(0, aabb(0.0, 0.0, 1.0, 1.0));
        tree.add(1, aabb(3.0, 0.0, 4.0, 1.0));
        let root = tree.root().unwrap();

        assert_eq!(tree.remove(root), Err(CollisionError::InvalidHandle));
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn test_re_adding_a_body_replaces_its_leaf() {
        let mut tree = DynamicAabbTree::default();
        let old = tree.add(0, aabb(0.0, 0.0, 1.0, 1.0));
        tree.add(1, aabb(3.0, 0.0, 4.0, 1.0));
        let new = tree.add(0, aabb(8.0, 0.0, 9.0, 1.0));

        assert_ne!(old, new);
        assert!(tree.leaf(old).is_none());
        assert_eq!(tree.leaf_of(0), Some(new));
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn test_update_reinserts_only_escaped_leaves() {
        let mut bodies = vec![
            square_body(1.0, 0.0, 0.0),
            square_body(1.0, 5.0, 0.0),
            square_body(1.0, 10.0, 0.0),
        ];
        let mut tree = DynamicAabbTree::new(0.2);
        tree.init(&bodies);

        // Within the margin: nothing to do.
        bodies[0].position.x += 0.1;
        assert_eq!(tree.update(&bodies), Ok(0));

        // Past the margin: one re-insertion.
        bodies[2].position.x -= 3.0;
        let before = tree.leaf_of(2);
        assert_eq!(tree.update(&bodies), Ok(1));
        assert_eq!(tree.leaf_of(2), before);
        let leaf = tree.leaf(before.unwrap()).unwrap();
        assert_eq!(leaf.fat, bodies[2].calculate_aabb().inflate(0.2));
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn test_update_refattens_lone_root() {
        let mut bodies = vec![square_body(1.0, 0.0, 0.0)];
        let mut tree = DynamicAabbTree::new(0.2);
        tree.init(&bodies);
        bodies[0].position = Vec2::new(20.0, 20.0);

        assert_eq!(tree.update(&bodies), Ok(1));
        let root = tree.root().unwrap();
        assert_eq!(tree.node(root).unwrap().fat, bodies[0].calculate_aabb().inflate(0.2));
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn test_update_with_missing_body_fails() {
        let bodies = vec![square_body(1.0, 0.0, 0.0), square_body(1.0, 3.0, 0.0)];
        let mut tree = DynamicAabbTree::default();
        tree.init(&bodies);

        let fewer = vec![bodies[0].clone()];
        assert_eq!(tree.update(&fewer), Err(CollisionError::UnknownBody(1)));
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn test_candidate_pairs_finds_touching_boxes() {
        let bodies = vec![
            square_body(2.0, 0.0, 0.0),
            square_body(2.0, 1.5, 0.0),
            square_body(2.0, 20.0, 0.0),
            square_body(2.0, 22.0, 0.0),
        ];
        let mut tree = DynamicAabbTree::default();
        let pairs = tree.candidate_pairs(&bodies).unwrap();

        assert_eq!(
            as_set(&pairs),
            BTreeSet::from([CandidatePair::new(0, 1), CandidatePair::new(2, 3)])
        );
        assert_eq!(pairs.len(), 2);
        assert_eq!(tree.last_query_stats().potential_pairs, 2);
        assert_eq!(tree.last_query_stats().invalid_nodes, 0);
    }

    #[test]
    fn test_fat_overlap_alone_is_not_a_pair() {
        // Tight boxes 0.3 apart, fat boxes overlapping.
        let bodies = vec![square_body(1.0, 0.0, 0.0), square_body(1.0, 1.3, 0.0)];
        let mut tree = DynamicAabbTree::new(0.2);
        assert!(tree.candidate_pairs(&bodies).unwrap().is_empty());
    }

    #[test]
    fn test_pairs_match_brute_force_over_frames() {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut bodies = scattered_bodies(60, 7);
        let mut rng = Lcg(99);
        let velocities: Vec<Vec2> = (0..bodies.len())
            .map(|_| Vec2::new(rng.range(-1.0, 1.0), rng.range(-1.0, 1.0)))
            .collect();

        let mut tree = DynamicAabbTree::new(0.2);
        let mut brute = BruteForce::default();

        for _frame in 0..25 {
            let tree_pairs = tree.candidate_pairs(&bodies).unwrap();
            let brute_pairs = BroadPhase::candidate_pairs(&mut brute, &bodies).unwrap();

            let tree_set = as_set(&tree_pairs);
            assert_eq!(tree_set.len(), tree_pairs.len(), "duplicate pairs reported");
            assert!(tree_pairs.iter().all(|p| p.a < p.b));
            assert_eq!(tree_set, as_set(&brute_pairs));
            assert_eq!(tree.check_invariants(), Ok(()));

            for (body, velocity) in bodies.iter_mut().zip(&velocities) {
                body.position += *velocity * 0.3;
                body.rotation += 0.05;
            }
        }
    }

    #[test]
    fn test_invariants_hold_through_add_remove_sequence() {
        let bodies = scattered_bodies(40, 3);
        let mut tree = DynamicAabbTree::new(0.2);
        let handles: Vec<LeafHandle> = bodies
            .iter()
            .enumerate()
            .map(|(i, body)| tree.add(i, body.calculate_aabb()))
            .collect();
        assert_eq!(tree.check_invariants(), Ok(()));

        for (i, handle) in handles.iter().enumerate() {
            if i % 3 == 0 {
                tree.remove(*handle).unwrap();
                assert_eq!(tree.check_invariants(), Ok(()));
            }
        }
        assert_eq!(tree.len(), 40 - 14);

        // Bring a few back.
        for i in (0..40).step_by(6) {
            tree.add(i, bodies[i].calculate_aabb());
            assert_eq!(tree.check_invariants(), Ok(()));
        }
        assert!(tree.height() <= tree.len());
    }

    #[test]
    fn test_gizmos_cover_every_node() {
        let bodies = vec![
            square_body(1.0, 0.0, 0.0),
            square_body(1.0, 3.0, 0.0),
            square_body(1.0, 6.0, 0.0),
        ];
        let mut tree = DynamicAabbTree::default();
        tree.init(&bodies);
        let gizmos = tree.gizmos();

        let count = |kind: GizmoKind| gizmos.iter().filter(|g| g.kind == kind).count();
        assert_eq!(count(GizmoKind::FatBranch), 2);
        assert_eq!(count(GizmoKind::FatLeaf), 3);
        assert_eq!(count(GizmoKind::TightLeaf), 3);
    }

    #[test]
    fn test_trait_remove_by_body() {
        let bodies = vec![square_body(1.0, 0.0, 0.0), square_body(1.0, 0.5, 0.0)];
        let mut tree = DynamicAabbTree::default();
        BroadPhase::init(&mut tree, &bodies).unwrap();
        BroadPhase::remove(&mut tree, 0).unwrap();
        assert_eq!(BroadPhase::remove(&mut tree, 0), Err(CollisionError::InvalidHandle));
        assert!(tree.candidate_pairs(&bodies).unwrap().is_empty());
        BroadPhase::insert(&mut tree, 0, &bodies).unwrap();
        assert_eq!(tree.candidate_pairs(&bodies).unwrap(), vec![CandidatePair::new(0, 1)]);
        assert_eq!(
            BroadPhase::insert(&mut tree, 9, &bodies),
            Err(CollisionError::UnknownBody(9))
        );
    }
}
