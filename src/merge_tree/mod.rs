//! A small segment tree which owns the partial length indexes and drives them the same way a
//! collaborative editor does: remote operations arrive in sequence order, get applied to the
//! leaves, and every block on the path to the root is updated (or rebuilt, if its structure
//! changed).
//!
//! This tree only stores lengths, not content.

mod segment;
mod clients;
mod tree;
mod check;
#[cfg(any(test, feature = "rand"))]
pub mod gen_random;
#[cfg(test)]
mod fuzzer;

use crate::{BranchId, ClientId, Seq};
use crate::options::PartialLengthOptions;
use crate::partial_lengths::PartialLengths;

pub use segment::{RemovalInfo, Segment};
pub use clients::ClientTable;
pub use tree::MergeTree;

/// Read-only resolvers the index needs from the tree while it builds and updates.
pub trait TreeContext {
    /// Which branch a client's operations belong to.
    fn branch_id(&self, client_id: ClientId) -> BranchId;

    /// The highest branch the local replica maintains. Every index carries this many downstream
    /// branches.
    fn local_branch_id(&self) -> BranchId;

    /// The removal of `segment` as seen from `branch_id`, if it has been removed there.
    fn removal_info<'a>(&self, branch_id: BranchId, seg_branch_id: BranchId, segment: &'a Segment) -> Option<&'a RemovalInfo> {
        segment.removal_info(branch_id, seg_branch_id)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CollabWindow {
    /// Every client has acknowledged everything up to here. Entries at or below this are folded
    /// into base lengths.
    pub min_seq: Seq,
    /// The most recently sequenced operation.
    pub current_seq: Seq,
    pub options: PartialLengthOptions,
}

impl CollabWindow {
    pub fn new(options: PartialLengthOptions) -> Self {
        Self { min_seq: 0, current_seq: 0, options }
    }
}

impl Default for CollabWindow {
    fn default() -> Self {
        Self::new(PartialLengthOptions::default())
    }
}

#[derive(Debug, Clone)]
pub enum MergeNode {
    Leaf(Segment),
    Block(MergeBlock),
}

impl MergeNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self, MergeNode::Leaf(_))
    }

    pub fn as_leaf(&self) -> Option<&Segment> {
        match self {
            MergeNode::Leaf(segment) => Some(segment),
            MergeNode::Block(_) => None,
        }
    }

    pub fn as_leaf_mut(&mut self) -> Option<&mut Segment> {
        match self {
            MergeNode::Leaf(segment) => Some(segment),
            MergeNode::Block(_) => None,
        }
    }

    pub fn as_block(&self) -> Option<&MergeBlock> {
        match self {
            MergeNode::Block(block) => Some(block),
            MergeNode::Leaf(_) => None,
        }
    }
}

/// An interior node. Children can be any mix of segments and blocks.
#[derive(Debug, Clone, Default)]
pub struct MergeBlock {
    pub children: Vec<MergeNode>,
    /// Cached index over the children. `None` until the block is first built.
    pub(crate) partial_lengths: Option<PartialLengths>,
}

impl MergeBlock {
    pub fn new(children: Vec<MergeNode>) -> Self {
        Self { children, partial_lengths: None }
    }

    pub fn child_count(&self) -> usize { self.children.len() }

    /// The block's cached index. Panics if the block was never built - children must always be
    /// built before their parents.
    pub fn partial_lengths(&self) -> &PartialLengths {
        self.partial_lengths.as_ref()
            .expect("Block has no partial lengths. Children must be built before their parent")
    }

    /// Replace the cached index with one combined from the children.
    pub fn rebuild_lengths<C: TreeContext>(&mut self, ctx: &C, window: &CollabWindow, recur: bool) {
        let partial_lengths = PartialLengths::combine(ctx, self, window, recur);
        self.partial_lengths = Some(partial_lengths);
    }

    /// Update the cached index for one new operation which landed in this subtree.
    pub fn update_lengths<C: TreeContext>(&mut self, ctx: &C, seq: Seq, client_id: ClientId, window: &CollabWindow) {
        let MergeBlock { children, partial_lengths } = self;
        partial_lengths.as_mut()
            .expect("Cannot update a block which was never built")
            .update(ctx, children, seq, client_id, window);
    }

    /// Compact this block's index and every index below it.
    pub fn zamboni_recursive(&mut self, window: &CollabWindow) {
        for child in self.children.iter_mut() {
            if let MergeNode::Block(child) = child {
                child.zamboni_recursive(window);
            }
        }
        if let Some(partial_lengths) = self.partial_lengths.as_mut() {
            partial_lengths.zamboni(window);
        }
    }

    /// Number of segments in this subtree.
    pub fn leaf_count(&self) -> usize {
        self.children.iter().map(|child| match child {
            MergeNode::Leaf(_) => 1,
            MergeNode::Block(block) => block.leaf_count(),
        }).sum()
    }

    pub fn iter_leaves<'a>(&'a self) -> Box<dyn Iterator<Item=&'a Segment> + 'a> {
        Box::new(self.children.iter().flat_map(|child| -> Box<dyn Iterator<Item=&'a Segment> + 'a> {
            match child {
                MergeNode::Leaf(segment) => Box::new(std::iter::once(segment)),
                MergeNode::Block(block) => block.iter_leaves(),
            }
        }))
    }
}
