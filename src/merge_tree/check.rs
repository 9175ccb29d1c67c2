use crate::{ClientId, Seq};
use crate::merge_tree::{MergeBlock, MergeNode, MergeTree, TreeContext};
use crate::merge_tree::tree::{MAX_CHILDREN, segment_visible};

impl MergeBlock {
    fn dbg_check_rec<C: TreeContext>(&self, ctx: &C, is_root: bool) {
        assert!(self.children.len() <= MAX_CHILDREN, "Block has {} children", self.children.len());
        if !is_root { assert!(!self.children.is_empty(), "Empty non-root block"); }

        let pl = self.partial_lengths();
        pl.dbg_check();
        assert_eq!(pl.downstream().len(), ctx.local_branch_id() as usize);

        let leaf_count = self.leaf_count();
        assert_eq!(pl.segment_count, leaf_count, "Branch 0 segment count is wrong");
        for (i, downstream) in pl.downstream().iter().enumerate() {
            assert_eq!(downstream.segment_count, leaf_count, "Branch {} segment count is wrong", i + 1);
        }

        for child in self.children.iter() {
            match child {
                MergeNode::Leaf(segment) => assert!(segment.cached_length > 0, "Empty segment"),
                MergeNode::Block(block) => block.dbg_check_rec(ctx, false),
            }
        }
    }

    /// Visible length of this subtree, by scanning every leaf.
    fn brute_force_len<C: TreeContext>(&self, ctx: &C, ref_seq: Seq, client_id: ClientId) -> usize {
        self.iter_leaves()
            .filter(|segment| segment_visible(ctx, segment, ref_seq, client_id))
            .map(|segment| segment.cached_length)
            .sum()
    }

    fn dbg_check_view_rec<C: TreeContext>(&self, ctx: &C, ref_seq: Seq, client_id: ClientId) {
        let expected = self.brute_force_len(ctx, ref_seq, client_id) as isize;
        let actual = self.partial_lengths().get_partial_length(ctx, ref_seq, client_id);
        assert_eq!(expected, actual, "Block length for client {} at seq {} disagrees with its leaves", client_id, ref_seq);

        for child in self.children.iter() {
            if let MergeNode::Block(block) = child {
                block.dbg_check_view_rec(ctx, ref_seq, client_id);
            }
        }
    }
}

fn diff_blocks(expected: &MergeBlock, actual: &MergeBlock) {
    if let Err(err) = expected.partial_lengths().diff(actual.partial_lengths()) {
        panic!("Cached index differs from a rebuild: {}\nexpected: {}\nactual: {}",
            err, expected.partial_lengths(), actual.partial_lengths());
    }
    for (e, a) in expected.children.iter().zip(actual.children.iter()) {
        if let (MergeNode::Block(e), MergeNode::Block(a)) = (e, a) {
            diff_blocks(e, a);
        }
    }
}

impl MergeTree {
    /// Check the tree's structure and every cached index. Panics if something is wrong.
    ///
    /// This is public for integration tests. Don't depend on it.
    #[allow(unused)]
    pub fn dbg_check(&self) {
        self.root.dbg_check_rec(&self.clients, true);
        assert!(self.window.min_seq <= self.window.current_seq);
    }

    /// Check that every block's cached length agrees with a scan of its leaves, for a single
    /// view.
    #[allow(unused)]
    pub fn dbg_check_view(&self, ref_seq: Seq, client_id: ClientId) {
        self.root.dbg_check_view_rec(&self.clients, ref_seq, client_id);
    }

    /// Check that the incrementally maintained indexes match ones built from scratch.
    ///
    /// Both sides are compacted against the current window first. Compaction is invisible to
    /// queries, but it changes how the entries are stored.
    #[allow(unused)]
    pub fn dbg_check_rebuild(&self) {
        let mut expected = self.root.clone();
        expected.rebuild_lengths(&self.clients, &self.window, true);
        expected.zamboni_recursive(&self.window);

        let mut actual = self.root.clone();
        actual.zamboni_recursive(&self.window);

        diff_blocks(&expected, &actual);
    }
}
