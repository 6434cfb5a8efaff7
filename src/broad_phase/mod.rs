//! Broad phase: cheap bounding-box culling that turns a set of bodies into a
//! short list of pairs worth handing to the narrow phase.

pub mod aabb_tree;
pub mod brute_force;
pub mod tree_node;

pub use aabb_tree::DynamicAabbTree;
pub use brute_force::BruteForce;
pub use tree_node::{LeafHandle, NodeKey, NodeKind, TreeNode};

use crate::collision::AABB;
use crate::error::Result;
use crate::objects::RigidBody;

/// Read access to the bodies a broad phase tracks, by index.
pub trait BodySource {
    fn body_count(&self) -> usize;
    fn body(&self, index: usize) -> Option<&RigidBody>;
}

impl BodySource for [RigidBody] {
    fn body_count(&self) -> usize {
        self.len()
    }

    fn body(&self, index: usize) -> Option<&RigidBody> {
        self.get(index)
    }
}

impl BodySource for Vec<RigidBody> {
    fn body_count(&self) -> usize {
        self.len()
    }

    fn body(&self, index: usize) -> Option<&RigidBody> {
        self.get(index)
    }
}

/// Unordered pair of body indices, stored with `a < b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CandidatePair {
    pub a: usize,
    pub b: usize,
}

impl CandidatePair {
    pub fn new(first: usize, second: usize) -> Self {
        if first <= second {
            Self { a: first, b: second }
        } else {
            Self { a: second, b: first }
        }
    }
}

/// What a debug box represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GizmoKind {
    FatBranch,
    FatLeaf,
    TightLeaf,
}

/// A box an external renderer may draw to visualize the broad phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gizmo {
    pub aabb: AABB,
    pub kind: GizmoKind,
}

/// Counters from the most recent pair query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryStats {
    /// Leaves whose fat box no longer held their tight box.
    pub invalid_nodes: usize,
    /// Candidate pairs handed to the narrow phase.
    pub potential_pairs: usize,
}

/// Broad-phase strategy used by the host.
pub trait BroadPhase {
    /// Starts tracking every body the source holds. Already tracked bodies are skipped.
    fn init(&mut self, bodies: &dyn BodySource) -> Result<()>;

    /// Starts tracking one body.
    fn insert(&mut self, body: usize, bodies: &dyn BodySource) -> Result<()>;

    /// Stops tracking one body.
    fn remove(&mut self, body: usize) -> Result<()>;

    /// Refreshes bounding boxes from the current geometry and returns every
    /// pair whose tight boxes overlap, each pair once.
    fn candidate_pairs(&mut self, bodies: &dyn BodySource) -> Result<Vec<CandidatePair>>;

    /// Boxes describing the current state, for debug drawing.
    fn gizmos(&self) -> Vec<Gizmo>;

    fn last_query_stats(&self) -> QueryStats;
}
