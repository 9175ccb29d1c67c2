use std::io::Write;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use crate::{BranchId, ClientId, Seq};
use crate::options::PartialLengthOptions;
use crate::merge_tree::MergeTree;
use crate::merge_tree::gen_random::{make_random_trace, SimTrace};

/// A seed wrapper which prints out the seed on panic. drop() is called during unwinding so we
/// can see the seed which crashed things.
struct Seed(u64);
impl Drop for Seed {
    fn drop(&mut self) {
        if std::thread::panicking() {
            eprintln!("*** CRASHED ON SEED {} ***", self.0);
            drop(std::io::stderr().flush());
        }
    }
}

fn check_views(tree: &MergeTree, refs: &[Option<Seq>]) {
    for (client_id, ref_seq) in refs.iter().enumerate() {
        let client_id = client_id as ClientId;
        if let Some(ref_seq) = ref_seq {
            tree.dbg_check_view(*ref_seq, client_id);
        }
        tree.dbg_check_view(tree.window.current_seq, client_id);
    }
}

fn replay_checked(trace: &SimTrace, options: PartialLengthOptions) -> MergeTree {
    let mut tree = trace.new_tree(options);
    let mut refs: Vec<Option<Seq>> = vec![None; trace.clients.len()];

    for op in trace.ops.iter() {
        op.apply(&mut tree);
        if let Some((client_id, ref_seq)) = op.view() {
            refs[client_id as usize] = Some(ref_seq);
        }

        tree.dbg_check();
        tree.dbg_check_rebuild();
        check_views(&tree, &refs);
    }
    tree
}

fn fuzz_tree(seed: u64, num_clients: usize, local_branch_id: BranchId, steps: usize) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let trace = make_random_trace(&mut rng, num_clients, local_branch_id, steps);
    replay_checked(&trace, PartialLengthOptions::compact());
}

#[test]
fn fuzz_once() {
    fuzz_tree(123, 3, 0, 200);
}

#[test]
fn fuzz_many() {
    for seed in 0..40 {
        let s = Seed(seed);
        fuzz_tree(s.0, 3 + (seed % 2) as usize, 0, 200);
    }
}

#[test]
fn fuzz_with_downstream_branches() {
    for seed in 0..30 {
        let s = Seed(seed);
        fuzz_tree(s.0, 4, 1 + (seed % 2) as BranchId, 200);
    }
}

#[test]
fn fuzz_without_compaction() {
    for seed in 0..20 {
        let s = Seed(seed);
        let mut rng = SmallRng::seed_from_u64(s.0);
        let trace = make_random_trace(&mut rng, 4, 1, 150);
        replay_checked(&trace, PartialLengthOptions::keep_history());
    }
}

#[test]
fn compaction_is_invisible_to_queries() {
    for seed in 0..30 {
        let s = Seed(seed);
        let mut rng = SmallRng::seed_from_u64(s.0);
        let trace = make_random_trace(&mut rng, 4, 1, 250);

        let compacted = trace.replay(PartialLengthOptions::compact());
        let full = trace.replay(PartialLengthOptions::keep_history());
        assert_eq!(compacted.window.min_seq, full.window.min_seq);
        assert_eq!(compacted.window.current_seq, full.window.current_seq);

        // Some of these views never existed (a client behind its own removes), so compare the
        // raw signed lengths.
        let (a, b) = (compacted.root.partial_lengths(), full.root.partial_lengths());
        for client_id in 0..trace.clients.len() as ClientId {
            for ref_seq in compacted.window.min_seq..=compacted.window.current_seq {
                assert_eq!(a.get_partial_length(&compacted.clients, ref_seq, client_id),
                    b.get_partial_length(&full.clients, ref_seq, client_id),
                    "Client {} at seq {}", client_id, ref_seq);
            }
        }

        // Keeping history should leave more entries lying around, never fewer.
        assert!(full.root.partial_lengths().entry_count() >= compacted.root.partial_lengths().entry_count());
    }
}
