use slotmap::new_key_type;

use crate::collision::AABB;

new_key_type! {
    /// Stable arena key of a tree node.
    pub struct NodeKey;
}

/// Handle returned when a body enters the tree. Names its leaf node.
pub type LeafHandle = NodeKey;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    /// Bounds one body. `tight` is refreshed every query.
    Leaf { body: usize, tight: AABB },
    Branch { children: [NodeKey; 2] },
}

/// One node of the dynamic AABB tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub parent: Option<NodeKey>,
    /// For leaves: the tight box plus margin. For branches: the merge of both children.
    pub fat: AABB,
    /// Set once this branch's children have been compared in the current query.
    pub crossed: bool,
    /// Levels in this subtree: 1 for a leaf.
    pub height: usize,
    pub kind: NodeKind,
}

impl TreeNode {
    pub(crate) fn leaf(body: usize, tight: AABB, margin: f64) -> Self {
        Self {
            parent: None,
            fat: tight.inflate(margin),
            crossed: false,
            height: 1,
            kind: NodeKind::Leaf { body, tight },
        }
    }

    pub(crate) fn branch(parent: Option<NodeKey>, children: [NodeKey; 2], fat: AABB, height: usize) -> Self {
        Self {
            parent,
            fat,
            crossed: false,
            height,
            kind: NodeKind::Branch { children },
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    pub fn children(&self) -> Option<[NodeKey; 2]> {
        match self.kind {
            NodeKind::Branch { children } => Some(children),
            NodeKind::Leaf { .. } => None,
        }
    }

    pub fn body(&self) -> Option<usize> {
        match self.kind {
            NodeKind::Leaf { body, .. } => Some(body),
            NodeKind::Branch { .. } => None,
        }
    }

    pub fn tight(&self) -> Option<AABB> {
        match self.kind {
            NodeKind::Leaf { tight, .. } => Some(tight),
            NodeKind::Branch { .. } => None,
        }
    }

    /// A leaf is valid while its fat box still holds its tight box.
    pub fn is_valid(&self) -> bool {
        match self.kind {
            NodeKind::Leaf { tight, .. } => self.fat.contains(&tight),
            NodeKind::Branch { .. } => true,
        }
    }
}
