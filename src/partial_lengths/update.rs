use tracing::trace;
use crate::{BranchId, ClientId, Seq};
use crate::merge_tree::{CollabWindow, MergeNode, TreeContext};
use crate::partial_lengths::PartialLengths;

impl PartialLengths {
    /// Account for a single newly sequenced operation at `seq` somewhere in this block's subtree.
    ///
    /// This assumes `seq` is the latest sequence number, the block's structure hasn't changed and
    /// any interior children touched by the operation have already been updated.
    pub fn update<C: TreeContext>(&mut self, ctx: &C, children: &[MergeNode], seq: Seq, client_id: ClientId, window: &CollabWindow) {
        let seg_branch = ctx.branch_id(client_id);
        let local_branch = ctx.local_branch_id();
        assert_eq!(self.downstream.len(), local_branch as usize,
            "Index maintains {} downstream branches, expected {}", self.downstream.len(), local_branch);

        if seg_branch == 0 {
            self.update_branch(ctx, 0, children, seq, client_id, window);
        }
        for branch_id in seg_branch.max(1)..=local_branch {
            self.downstream[branch_id as usize - 1].update_branch(ctx, branch_id, children, seq, client_id, window);
        }

        if seg_branch > 0 {
            // Upstream branches can't see the op, but it may still have split a segment.
            self.segment_count = count_segments(children, 0);
            for branch_id in 1..seg_branch {
                self.downstream[branch_id as usize - 1].segment_count = count_segments(children, branch_id);
            }
        }
    }

    pub fn update_branch<C: TreeContext>(&mut self, ctx: &C, branch_id: BranchId, children: &[MergeNode], seq: Seq, client_id: ClientId, window: &CollabWindow) {
        let mut seq_seglen = 0;

        // Compute the length delta for seq across the children.
        for child in children {
            match child {
                MergeNode::Block(child) => {
                    let branch_partials = child.partial_lengths().partial_lengths_for_branch(branch_id);
                    if let Some(entry) = branch_partials.partial_lengths.get_seq(seq) {
                        seq_seglen += entry.seglen;
                    }
                }
                MergeNode::Leaf(segment) => {
                    let seg_branch = ctx.branch_id(segment.client_id);
                    if seg_branch > branch_id { continue; }

                    let removed_seq = ctx.removal_info(branch_id, seg_branch, segment)
                        .and_then(|removal| removal.removed_seq);
                    let len = segment.cached_length as isize;

                    if segment.seq == Some(seq) {
                        if removed_seq != Some(seq) {
                            seq_seglen += len;
                        }
                    } else if removed_seq == Some(seq) {
                        seq_seglen -= len;
                    }
                }
            }
        }
        self.segment_count = count_segments(children, branch_id);

        self.partial_lengths.add_seq(seq, seq_seglen, client_id);
        let idx = client_id as usize;
        if self.client_seq_numbers.len() <= idx {
            self.client_seq_numbers.resize_with(idx + 1, Default::default);
        }
        self.client_seq_numbers[idx].add_seq(seq, seq_seglen, client_id);

        trace!(branch_id, seq, seq_seglen, "updated block");

        if window.options.zamboni {
            self.compact_branch(window.min_seq);
        }
    }
}

fn count_segments(children: &[MergeNode], branch_id: BranchId) -> usize {
    children.iter().map(|child| match child {
        MergeNode::Block(child) => child.partial_lengths().partial_lengths_for_branch(branch_id).segment_count,
        MergeNode::Leaf(_) => 1,
    }).sum()
}
