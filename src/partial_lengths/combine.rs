use std::mem::replace;
use tracing::trace;
use crate::{BranchId, Seq};
use crate::merge_tree::{CollabWindow, MergeBlock, MergeNode, TreeContext};
use crate::partial_lengths::{PartialLengths, PartialSequenceLength};

impl PartialLengths {
    /// Build a branch index from the direct leaf children of a block. Interior children are
    /// ignored here.
    pub fn from_leaves<C: TreeContext>(ctx: &C, branch_id: BranchId, children: &[MergeNode], window: &CollabWindow) -> PartialLengths {
        let mut combined = PartialLengths::new(window.min_seq);
        let min_seq = window.min_seq;
        let seq_leq_min = |seq: Option<Seq>| seq.map_or(false, |seq| seq <= min_seq);

        for segment in children.iter().filter_map(MergeNode::as_leaf) {
            combined.segment_count += 1;

            let seg_branch = ctx.branch_id(segment.client_id);
            if seg_branch > branch_id { continue; }

            let len = segment.cached_length as isize;
            if seq_leq_min(segment.seq) {
                combined.min_length += len;
            } else if let Some(seq) = segment.seq {
                combined.partial_lengths.insert_segment(seq, len, segment.client_id, &[]);
            }

            if let Some(removal) = ctx.removal_info(branch_id, seg_branch, segment) {
                if seq_leq_min(removal.removed_seq) {
                    combined.min_length -= len;
                } else if let Some(removed_seq) = removal.removed_seq {
                    combined.partial_lengths.insert_segment(removed_seq, -len,
                        removal.removed_client_id, &removal.removed_client_overlap);
                }
            }
        }

        combined.partial_lengths.accumulate_lengths();
        combined.fill_client_projections();
        combined
    }

    /// Combine the partial lengths of a block's children into an index for the block, for every
    /// branch the local replica maintains.
    ///
    /// With `recur`, every interior descendant is rebuilt first. Otherwise each interior child is
    /// assumed to already have up to date partial lengths.
    pub fn combine<C: TreeContext>(ctx: &C, block: &mut MergeBlock, window: &CollabWindow, recur: bool) -> PartialLengths {
        if recur {
            for child in block.children.iter_mut() {
                if let MergeNode::Block(child) = child {
                    child.rebuild_lengths(ctx, window, true);
                }
            }
        }

        let block = &*block;
        let mut top = Self::combine_branch(ctx, block, window, 0);
        top.downstream = (1..=ctx.local_branch_id())
            .map(|branch_id| Self::combine_branch(ctx, block, window, branch_id))
            .collect();
        top
    }

    /// Combine the children of `block` into a single branch's index. Interior children must
    /// already have their partial lengths.
    pub fn combine_branch<C: TreeContext>(ctx: &C, block: &MergeBlock, window: &CollabWindow, branch_id: BranchId) -> PartialLengths {
        let mut combined = Self::from_leaves(ctx, branch_id, &block.children, window);

        if block.children.iter().any(|child| !child.is_leaf()) {
            // The leaf summary joins the merge as one more child.
            let leaf_partials = if combined.partial_lengths.is_empty() { None } else {
                Some(replace(&mut combined, PartialLengths::new(window.min_seq)))
            };

            let mut child_partials: Vec<&PartialLengths> = block.children.iter()
                .filter_map(MergeNode::as_block)
                .map(|child| child.partial_lengths().partial_lengths_for_branch(branch_id))
                .collect();
            child_partials.extend(leaf_partials.as_ref());

            combined.merge_children(&child_partials);
        }

        trace!(branch_id, entries = combined.partial_lengths.len(), min_length = combined.min_length, "combined block");

        if window.options.zamboni {
            combined.compact_branch(window.min_seq);
        }
        combined
    }

    /// k-way merge of the children's (sorted) entry lists.
    fn merge_children(&mut self, children: &[&PartialLengths]) {
        let mut indices = vec![0; children.len()];
        for child in children {
            self.min_length += child.min_length;
            self.segment_count += child.segment_count;
        }

        loop {
            let mut earliest: Option<(usize, &PartialSequenceLength)> = None;
            for (k, child) in children.iter().enumerate() {
                if let Some(entry) = child.partial_lengths.0.get(indices[k]) {
                    if earliest.map_or(true, |(_, e)| entry.seq < e.seq) {
                        earliest = Some((k, entry));
                    }
                }
            }

            let Some((k, entry)) = earliest else { break; };
            self.add_next(entry);
            indices[k] += 1;
        }

        self.fill_client_projections();
    }

    fn add_next(&mut self, next: &PartialSequenceLength) {
        let prev = self.partial_lengths.0.last_mut();
        let prev_len = match prev {
            Some(prev) if prev.seq == next.seq => {
                prev.seglen += next.seglen;
                prev.len += next.seglen;
                prev.combine_overlap(next);
                return;
            }
            Some(prev) => prev.len,
            None => 0,
        };

        self.partial_lengths.push(PartialSequenceLength {
            seq: next.seq,
            len: prev_len + next.seglen,
            seglen: next.seglen,
            client_id: next.client_id,
            overlap: next.overlap.clone(),
        });
    }
}

#[cfg(test)]
mod test {
    use crate::merge_tree::{ClientTable, MergeBlock, MergeNode, Segment};
    use crate::options::PartialLengthOptions;
    use super::*;

    fn window(min_seq: Seq) -> CollabWindow {
        let mut w = CollabWindow::new(PartialLengthOptions::compact());
        w.min_seq = min_seq;
        w.current_seq = 100;
        w
    }

    fn leaf(client: u32, seq: Seq, len: usize) -> MergeNode {
        MergeNode::Leaf(Segment::new(client, Some(seq), len))
    }

    #[test]
    fn k_way_merge_coalesces_same_seq() {
        let mut clients = ClientTable::new(0);
        let a = clients.get_or_create_client_id("a", 0);
        let b = clients.get_or_create_client_id("b", 0);

        // The same op at seq 3 touched both children.
        let mut block = MergeBlock::new(vec![
            MergeNode::Block(MergeBlock::new(vec![leaf(a, 1, 2), leaf(b, 3, 1)])),
            MergeNode::Block(MergeBlock::new(vec![leaf(b, 3, 4), leaf(a, 5, 1)])),
            leaf(a, 2, 7),
        ]);
        let pl = PartialLengths::combine(&clients, &mut block, &window(0), true);

        let entries: Vec<(Seq, isize, isize)> = pl.partial_lengths.iter().map(|e| (e.seq, e.seglen, e.len)).collect();
        assert_eq!(entries, vec![(1, 2, 2), (2, 7, 9), (3, 5, 14), (5, 1, 15)]);
        assert_eq!(pl.segment_count, 5);

        let b_seqs: Vec<(Seq, isize)> = pl.client_seq_numbers(b).unwrap().iter().map(|e| (e.seq, e.len)).collect();
        assert_eq!(b_seqs, vec![(3, 5)]);

        pl.dbg_check();
    }

    #[test]
    fn merge_folds_child_bases() {
        let mut clients = ClientTable::new(0);
        let a = clients.get_or_create_client_id("a", 0);

        let mut block = MergeBlock::new(vec![
            MergeNode::Block(MergeBlock::new(vec![leaf(a, 1, 2), leaf(a, 6, 1)])),
            MergeNode::Block(MergeBlock::new(vec![leaf(a, 2, 4)])),
        ]);
        let pl = PartialLengths::combine(&clients, &mut block, &window(3), true);
        assert_eq!(pl.min_length, 6);
        assert_eq!(pl.partial_lengths.len(), 1);
        assert_eq!(pl.get_branch_partial_length(6, a), 7);
    }

    #[test]
    fn downstream_branch_sees_its_own_segments() {
        let mut clients = ClientTable::new(1);
        let a = clients.get_or_create_client_id("a", 0);
        let f = clients.get_or_create_client_id("fork", 1);

        let mut block = MergeBlock::new(vec![leaf(a, 1, 3), leaf(f, 2, 5)]);
        let pl = PartialLengths::combine(&clients, &mut block, &window(0), false);

        assert_eq!(pl.downstream().len(), 1);
        // Branch 0 never sees the fork's insert.
        assert_eq!(pl.get_partial_length(&clients, 2, a), 3);
        assert_eq!(pl.get_partial_length(&clients, 2, f), 8);
        assert_eq!(pl.partial_lengths_for_branch(1).partial_lengths.len(), 2);
    }

    #[test]
    fn pending_segments_contribute_nothing() {
        let mut clients = ClientTable::new(0);
        let a = clients.get_or_create_client_id("a", 0);
        let mut block = MergeBlock::new(vec![
            leaf(a, 1, 3),
            MergeNode::Leaf(Segment::new(a, None, 10)),
        ]);
        let pl = PartialLengths::combine(&clients, &mut block, &window(0), false);
        assert_eq!(pl.partial_lengths.len(), 1);
        assert_eq!(pl.segment_count, 2);
        assert_eq!(pl.get_branch_partial_length(1, a), 3);
    }
}
