//! Random collaborative editing traces, for fuzzing and benchmarking.

use rand::Rng;
use rand::rngs::SmallRng;
use smartstring::alias::String as SmartString;
use crate::{BranchId, ClientId, Seq};
use crate::options::PartialLengthOptions;
use crate::merge_tree::MergeTree;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TraceOp {
    Insert { client_id: ClientId, ref_seq: Seq, seq: Seq, pos: usize, len: usize },
    Remove { client_id: ClientId, ref_seq: Seq, seq: Seq, start: usize, end: usize },
    MinSeq(Seq),
}

impl TraceOp {
    pub fn apply(&self, tree: &mut MergeTree) {
        match *self {
            TraceOp::Insert { client_id, ref_seq, seq, pos, len } => tree.insert(client_id, ref_seq, seq, pos, len),
            TraceOp::Remove { client_id, ref_seq, seq, start, end } => tree.remove(client_id, ref_seq, seq, start, end),
            TraceOp::MinSeq(min_seq) => tree.set_min_seq(min_seq),
        }
    }

    /// The author and view of a sequenced op.
    pub fn view(&self) -> Option<(ClientId, Seq)> {
        match *self {
            TraceOp::Insert { client_id, ref_seq, .. } | TraceOp::Remove { client_id, ref_seq, .. } => Some((client_id, ref_seq)),
            TraceOp::MinSeq(_) => None,
        }
    }
}

/// A sequenced stream of operations from a set of clients, in the order the server sequenced
/// them.
#[derive(Debug, Clone)]
pub struct SimTrace {
    pub local_branch_id: BranchId,
    /// Client names and branches. Client ids are positions in this list.
    pub clients: Vec<(SmartString, BranchId)>,
    pub ops: Vec<TraceOp>,
}

impl SimTrace {
    /// An empty tree with all of this trace's clients registered.
    pub fn new_tree(&self, options: PartialLengthOptions) -> MergeTree {
        let mut tree = MergeTree::with_options(self.local_branch_id, options);
        for (name, branch_id) in self.clients.iter() {
            tree.clients.get_or_create_client_id(name, *branch_id);
        }
        tree
    }

    pub fn replay(&self, options: PartialLengthOptions) -> MergeTree {
        let mut tree = self.new_tree(options);
        for op in self.ops.iter() {
            op.apply(&mut tree);
        }
        tree
    }

    pub fn num_sequenced(&self) -> usize {
        self.ops.iter().filter(|op| op.view().is_some()).count()
    }
}

/// Generate a trace of `steps` sequenced ops. Clients lag behind the server by random amounts,
/// so plenty of operations are concurrent (including racing removes of the same content).
pub fn make_random_trace(rng: &mut SmallRng, num_clients: usize, local_branch_id: BranchId, steps: usize) -> SimTrace {
    assert!(num_clients > 0);
    let clients: Vec<(SmartString, BranchId)> = (0..num_clients).map(|i| {
        let branch_id = if i == 0 { 0 } else { rng.gen_range(0..=local_branch_id) };
        (SmartString::from(format!("client{}", i)), branch_id)
    }).collect();

    let mut trace = SimTrace { local_branch_id, clients, ops: vec![] };
    let mut tree = trace.new_tree(PartialLengthOptions::default());
    let mut refs: Vec<Seq> = vec![0; num_clients];

    for seq in 1..=steps as Seq {
        let client = rng.gen_range(0..num_clients);
        if rng.gen_bool(0.6) {
            // Catch up with everything sequenced so far.
            refs[client] = seq - 1;
        }
        let client_id = client as ClientId;
        let ref_seq = refs[client];

        let doc_len = tree.get_length(ref_seq, client_id);
        let insert_weight = if doc_len < 100 { 0.55 } else { 0.45 };
        let op = if doc_len == 0 || rng.gen_bool(insert_weight) {
            let pos = rng.gen_range(0..=doc_len);
            let len = rng.gen_range(1..5);
            TraceOp::Insert { client_id, ref_seq, seq, pos, len }
        } else {
            let start = rng.gen_range(0..doc_len);
            let span = rng.gen_range(1..=usize::min(10, doc_len - start));
            TraceOp::Remove { client_id, ref_seq, seq, start, end: start + span }
        };
        op.apply(&mut tree);
        trace.ops.push(op);

        if rng.gen_bool(0.15) {
            // Every client has seen at least its own last ref.
            let min_seq = refs.iter().copied().min().unwrap_or(0);
            if min_seq > tree.window.min_seq {
                let op = TraceOp::MinSeq(min_seq);
                op.apply(&mut tree);
                trace.ops.push(op);
            }
        }
    }

    trace
}
