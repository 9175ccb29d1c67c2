use tracing::{debug, warn};
use crate::{BranchId, ClientId, Seq};
use crate::options::PartialLengthOptions;
use crate::merge_tree::{ClientTable, CollabWindow, MergeBlock, MergeNode, Segment, TreeContext};
use crate::merge_tree::segment::MarkResult;

#[cfg(debug_assertions)]
pub(crate) const MAX_CHILDREN: usize = 4;
#[cfg(not(debug_assertions))]
pub(crate) const MAX_CHILDREN: usize = 8;

/// A length-only document shared by a set of collaborating clients.
///
/// Operations must be applied in sequence order, and every operation names the view it was
/// made against: the author and the last seq the author had seen (`ref_seq`). Positions are
/// resolved in that view.
#[derive(Debug, Clone)]
pub struct MergeTree {
    pub root: MergeBlock,
    pub clients: ClientTable,
    pub window: CollabWindow,
}

#[derive(Debug, Clone, Copy)]
struct Op {
    client_id: ClientId,
    ref_seq: Seq,
    seq: Seq,
}

/// How an edit changed a block, so its parent knows how to refresh its own index.
#[derive(Debug, Default)]
struct Outcome {
    changed: bool,
    /// An older entry changed somewhere below, so ancestors must rebuild rather than update.
    overlap: bool,
    /// The block overflowed. This is its new right sibling.
    split: Option<MergeBlock>,
}

/// Can `client_id` see `segment` at `ref_seq`? This ignores the cached indexes entirely.
pub(crate) fn segment_visible<C: TreeContext>(ctx: &C, segment: &Segment, ref_seq: Seq, client_id: ClientId) -> bool {
    let branch_id = ctx.branch_id(client_id);
    let seg_branch = ctx.branch_id(segment.client_id);
    if seg_branch > branch_id { return false; }

    let inserted = segment.seq.map_or(false, |seq| seq <= ref_seq || segment.client_id == client_id);
    if !inserted { return false; }

    let removed = ctx.removal_info(branch_id, seg_branch, segment).map_or(false, |removal| {
        removal.removed_seq.map_or(false, |seq| seq <= ref_seq || removal.removed_by(client_id))
    });
    !removed
}

fn node_len<C: TreeContext>(ctx: &C, node: &MergeNode, op: Op) -> usize {
    match node {
        MergeNode::Leaf(segment) => {
            if segment_visible(ctx, segment, op.ref_seq, op.client_id) { segment.cached_length } else { 0 }
        }
        MergeNode::Block(block) => {
            let len = block.partial_lengths().get_partial_length(ctx, op.ref_seq, op.client_id);
            debug_assert!(len >= 0, "Negative block length {}", len);
            len as usize
        }
    }
}

fn refresh<C: TreeContext>(block: &mut MergeBlock, ctx: &C, window: &CollabWindow, op: Op, structural: bool, overlap: bool) -> Outcome {
    if block.children.len() > MAX_CHILDREN {
        let mut right = MergeBlock::new(block.children.split_off(block.children.len() / 2));
        block.rebuild_lengths(ctx, window, false);
        right.rebuild_lengths(ctx, window, false);
        debug!(seq = op.seq, left = block.children.len(), right = right.children.len(), "split block");
        return Outcome { changed: true, overlap, split: Some(right) };
    }

    if structural || overlap {
        block.rebuild_lengths(ctx, window, false);
    } else {
        block.update_lengths(ctx, op.seq, op.client_id, window);
    }
    Outcome { changed: true, overlap, split: None }
}

enum InsertAt {
    /// Before the child at this index (or at the end).
    Before(usize),
    /// Inside the leaf at this index, at an offset.
    SplitLeaf(usize, usize),
    /// Somewhere inside the child block at this index.
    Child(usize, usize),
}

fn insert_rec<C: TreeContext>(block: &mut MergeBlock, ctx: &C, window: &CollabWindow, op: Op, pos: usize, len: usize) -> Outcome {
    let mut pos = pos;
    let mut target = None;
    for (idx, child) in block.children.iter().enumerate() {
        if pos == 0 && child.is_leaf() {
            target = Some(InsertAt::Before(idx));
            break;
        }
        let child_len = node_len(ctx, child, op);
        if pos < child_len {
            target = Some(match child {
                MergeNode::Leaf(_) => InsertAt::SplitLeaf(idx, pos),
                MergeNode::Block(_) => InsertAt::Child(idx, pos),
            });
            break;
        }
        pos -= child_len;
    }
    let target = target.unwrap_or_else(|| {
        assert_eq!(pos, 0, "Insert position is past the end of the document");
        InsertAt::Before(block.children.len())
    });

    let new_leaf = MergeNode::Leaf(Segment::new(op.client_id, Some(op.seq), len));
    match target {
        InsertAt::Before(idx) => {
            block.children.insert(idx, new_leaf);
            refresh(block, ctx, window, op, true, false)
        }
        InsertAt::SplitLeaf(idx, offset) => {
            if let MergeNode::Leaf(segment) = &mut block.children[idx] {
                let rest = segment.split_at(offset);
                block.children.splice(idx + 1..idx + 1, [new_leaf, MergeNode::Leaf(rest)]);
            }
            refresh(block, ctx, window, op, true, false)
        }
        InsertAt::Child(idx, pos) => {
            let MergeNode::Block(child) = &mut block.children[idx] else { unreachable!() };
            let child_outcome = insert_rec(child, ctx, window, op, pos, len);
            let structural = child_outcome.split.is_some();
            if let Some(split) = child_outcome.split {
                block.children.insert(idx + 1, MergeNode::Block(split));
            }
            refresh(block, ctx, window, op, structural, child_outcome.overlap)
        }
    }
}

/// Mark a segment removed in the remover's branch and every branch downstream of it.
fn mark_segment<C: TreeContext>(ctx: &C, segment: &mut Segment, op: Op) -> MarkResult {
    let branch_id = ctx.branch_id(op.client_id);
    let seg_branch = ctx.branch_id(segment.client_id);
    (branch_id..=ctx.local_branch_id())
        .map(|b| segment.mark_removed(b, seg_branch, op.seq, op.client_id))
        .fold(MarkResult::Duplicate, Ord::max)
}

/// Remove `start..end` (in the op's view) from this subtree.
fn remove_rec<C: TreeContext>(block: &mut MergeBlock, ctx: &C, window: &CollabWindow, op: Op, start: usize, end: usize) -> Outcome {
    let mut structural = false;
    let mut changed = false;
    let mut overlap = false;

    // Positions here are all in the view before this op is applied.
    let mut offset = 0;
    let mut idx = 0;
    while idx < block.children.len() && offset < end {
        let child_len = node_len(ctx, &block.children[idx], op);
        let child_end = offset + child_len;
        if child_len == 0 || child_end <= start {
            offset = child_end;
            idx += 1;
            continue;
        }

        if let MergeNode::Leaf(segment) = &mut block.children[idx] {
            if start > offset {
                // Keep the start of this segment and look at the rest next time around.
                let rest = segment.split_at(start - offset);
                block.children.insert(idx + 1, MergeNode::Leaf(rest));
                structural = true;
                offset = start;
                idx += 1;
                continue;
            }
            if child_end > end {
                let rest = segment.split_at(end - offset);
                block.children.insert(idx + 1, MergeNode::Leaf(rest));
                structural = true;
            }
        }

        match &mut block.children[idx] {
            MergeNode::Leaf(segment) => {
                offset += segment.cached_length;
                match mark_segment(ctx, segment, op) {
                    MarkResult::Duplicate => {
                        warn!(seq = op.seq, client_id = op.client_id, "client removed the same segment twice");
                    }
                    MarkResult::Removed => { changed = true; }
                    MarkResult::Overlap => {
                        changed = true;
                        overlap = true;
                    }
                }
            }
            MergeNode::Block(child) => {
                let child_outcome = remove_rec(child, ctx, window, op,
                    start.saturating_sub(offset), (end - offset).min(child_len));
                changed |= child_outcome.changed;
                overlap |= child_outcome.overlap;
                if let Some(split) = child_outcome.split {
                    // The split half was already visited by the recursive call.
                    block.children.insert(idx + 1, MergeNode::Block(split));
                    structural = true;
                    idx += 1;
                }
                offset = child_end;
            }
        }
        idx += 1;
    }

    if !changed && !structural { return Outcome::default(); }
    refresh(block, ctx, window, op, structural, overlap)
}

impl MergeTree {
    /// Create an empty document. Clients can edit branch 0 up to `local_branch_id`.
    pub fn new(local_branch_id: BranchId) -> Self {
        Self::with_options(local_branch_id, PartialLengthOptions::default())
    }

    pub fn with_options(local_branch_id: BranchId, options: PartialLengthOptions) -> Self {
        let clients = ClientTable::new(local_branch_id);
        let window = CollabWindow::new(options);
        let mut root = MergeBlock::new(vec![]);
        root.rebuild_lengths(&clients, &window, false);
        Self { root, clients, window }
    }

    /// Accept an operation at `seq`. Returns false if the op is stale and should be dropped.
    fn start_op(&mut self, client_id: ClientId, ref_seq: Seq, seq: Seq) -> bool {
        if seq <= self.window.current_seq {
            warn!(seq, current_seq = self.window.current_seq, "ignoring operation with a non-increasing seq");
            return false;
        }
        assert!(ref_seq >= self.window.min_seq,
            "Operation at seq {} references seq {} from before the window (min seq {})", seq, ref_seq, self.window.min_seq);
        assert!(ref_seq < seq, "Operation at seq {} references its own future ({})", seq, ref_seq);
        assert!((client_id as usize) < self.clients.len(), "Unknown client {}", client_id);

        self.window.current_seq = seq;
        true
    }

    fn finish_op(&mut self, outcome: Outcome, seq: Seq) {
        if outcome.overlap {
            debug!(seq, "rebuilt path after an overlapping remove");
        }
        if let Some(split) = outcome.split {
            let old_root = std::mem::take(&mut self.root);
            self.root = MergeBlock::new(vec![MergeNode::Block(old_root), MergeNode::Block(split)]);
            self.root.rebuild_lengths(&self.clients, &self.window, false);
            debug!(seq, "split root");
        }
    }

    /// Insert `len` items authored by `client_id` at `pos`, as seen at `ref_seq`.
    pub fn insert(&mut self, client_id: ClientId, ref_seq: Seq, seq: Seq, pos: usize, len: usize) {
        if !self.start_op(client_id, ref_seq, seq) || len == 0 { return; }

        let op = Op { client_id, ref_seq, seq };
        let MergeTree { root, clients, window } = self;
        let outcome = insert_rec(root, &*clients, &*window, op, pos, len);
        self.finish_op(outcome, seq);
    }

    /// Remove the range `start..end`, as seen by `client_id` at `ref_seq`.
    pub fn remove(&mut self, client_id: ClientId, ref_seq: Seq, seq: Seq, start: usize, end: usize) {
        assert!(start <= end, "Invalid range {}..{}", start, end);
        if !self.start_op(client_id, ref_seq, seq) || start == end { return; }

        let op = Op { client_id, ref_seq, seq };
        let doc_len = self.get_length(ref_seq, client_id);
        assert!(end <= doc_len, "Range {}..{} is past the end of the document ({})", start, end, doc_len);

        let MergeTree { root, clients, window } = self;
        let outcome = remove_rec(root, &*clients, &*window, op, start, end);
        self.finish_op(outcome, seq);
    }

    /// Advance the collaboration window. Every index is compacted against the new minimum
    /// when compaction is enabled.
    pub fn set_min_seq(&mut self, min_seq: Seq) {
        if min_seq < self.window.min_seq {
            warn!(min_seq, current_min_seq = self.window.min_seq, "ignoring min seq regression");
            return;
        }
        assert!(min_seq <= self.window.current_seq,
            "Min seq {} is past the current seq {}", min_seq, self.window.current_seq);

        self.window.min_seq = min_seq;
        if self.window.options.zamboni {
            self.root.zamboni_recursive(&self.window);
        }
    }

    /// Recompute every cached index from the leaves.
    pub fn rebuild(&mut self) {
        self.root.rebuild_lengths(&self.clients, &self.window, true);
    }

    /// Document length seen by `client_id` at `ref_seq`.
    pub fn get_length(&self, ref_seq: Seq, client_id: ClientId) -> usize {
        let len = self.root.partial_lengths().get_partial_length(&self.clients, ref_seq, client_id);
        debug_assert!(len >= 0);
        len as usize
    }

    pub fn segment_count(&self) -> usize {
        self.root.partial_lengths().segment_count
    }

    pub fn print_stats(&self) {
        self.root.partial_lengths().print_stats("root");
    }
}
