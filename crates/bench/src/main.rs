// Benchmarks for the partial length index, driven by randomly generated collaborative editing
// traces. Run with cargo run --release -p bench.

use criterion::{black_box, Criterion, BenchmarkId, Throughput};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use partial_lengths::PartialLengthOptions;
use partial_lengths::merge_tree::gen_random::{make_random_trace, SimTrace};

// (clients, local branch, ops)
const TRACES: &[(usize, u32, usize)] = &[(3, 0, 2000), (8, 0, 10000), (4, 1, 5000)];

fn trace_name(num_clients: usize, local_branch_id: u32, steps: usize) -> String {
    format!("c{num_clients}_b{local_branch_id}_{steps}")
}

fn make_trace(num_clients: usize, local_branch_id: u32, steps: usize) -> SimTrace {
    let mut rng = SmallRng::seed_from_u64(321);
    make_random_trace(&mut rng, num_clients, local_branch_id, steps)
}

fn apply_benchmarks(c: &mut Criterion) {
    for &(num_clients, local_branch_id, steps) in TRACES {
        let mut group = c.benchmark_group("partial_lengths");
        let name = trace_name(num_clients, local_branch_id, steps);
        let trace = make_trace(num_clients, local_branch_id, steps);
        group.throughput(Throughput::Elements(trace.num_sequenced() as u64));

        // Every op updates (or rebuilds) each block on its path.
        group.bench_function(BenchmarkId::new("apply", &name), |b| {
            b.iter(|| {
                let tree = trace.replay(PartialLengthOptions::compact());
                black_box(tree.segment_count());
            })
        });

        group.bench_function(BenchmarkId::new("apply_keep_history", &name), |b| {
            b.iter(|| {
                let tree = trace.replay(PartialLengthOptions::keep_history());
                black_box(tree.segment_count());
            })
        });

        group.finish();
    }
}

fn rebuild_benchmarks(c: &mut Criterion) {
    for &(num_clients, local_branch_id, steps) in TRACES {
        let mut group = c.benchmark_group("partial_lengths");
        let name = trace_name(num_clients, local_branch_id, steps);
        let trace = make_trace(num_clients, local_branch_id, steps);
        let tree = trace.replay(PartialLengthOptions::compact());
        group.throughput(Throughput::Elements(tree.segment_count() as u64));

        group.bench_function(BenchmarkId::new("rebuild", &name), |b| {
            b.iter(|| {
                let mut tree = tree.clone();
                tree.rebuild();
                black_box(tree.segment_count());
            })
        });

        group.finish();
    }
}

fn query_benchmarks(c: &mut Criterion) {
    for &(num_clients, local_branch_id, steps) in TRACES {
        let mut group = c.benchmark_group("partial_lengths");
        let name = trace_name(num_clients, local_branch_id, steps);
        let trace = make_trace(num_clients, local_branch_id, steps);
        let tree = trace.replay(PartialLengthOptions::keep_history());
        let (min_seq, current_seq) = (tree.window.min_seq, tree.window.current_seq);
        group.throughput(Throughput::Elements((current_seq - min_seq + 1) * num_clients as u64));

        let root = tree.root.partial_lengths();
        group.bench_function(BenchmarkId::new("query", &name), |b| {
            b.iter(|| {
                let mut total: isize = 0;
                for client_id in 0..num_clients as u32 {
                    for ref_seq in min_seq..=current_seq {
                        total += root.get_partial_length(&tree.clients, ref_seq, client_id);
                    }
                }
                black_box(total);
            })
        });

        group.finish();
    }
}

fn main() {
    let mut c = Criterion::default()
        .configure_from_args();

    apply_benchmarks(&mut c);
    rebuild_benchmarks(&mut c);
    query_benchmarks(&mut c);
    c.final_summary();
}
