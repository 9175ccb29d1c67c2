use partial_lengths::PartialLengthOptions;
use partial_lengths::merge_tree::{MergeTree, TreeContext};

fn check(tree: &MergeTree) {
    tree.dbg_check();
    tree.dbg_check_rebuild();
}

#[test]
fn typing_session() {
    let mut tree = MergeTree::new(0);
    let a = tree.clients.get_or_create_client_id("alice", 0);
    let b = tree.clients.get_or_create_client_id("bob", 0);

    let mut seq = 0;
    for i in 0..30 {
        seq += 1;
        // Both clients type at the end of their own view, lagging one op behind.
        let (client, ref_seq) = if i % 2 == 0 { (a, seq - 1) } else { (b, seq.max(2) - 2) };
        let pos = tree.get_length(ref_seq, client);
        tree.insert(client, ref_seq, seq, pos, 1);
        check(&tree);
    }
    assert_eq!(tree.get_length(seq, a), 30);
    assert_eq!(tree.segment_count(), 30);

    seq += 1;
    tree.remove(a, seq - 1, seq, 5, 25);
    assert_eq!(tree.get_length(seq, b), 10);
    assert_eq!(tree.get_length(seq - 1, b), 30);
    check(&tree);

    tree.set_min_seq(seq);
    assert_eq!(tree.get_length(seq, b), 10);
    check(&tree);
    tree.dbg_check_view(seq, a);
}

#[test]
fn branch_views_include_upstream_content() {
    let mut tree = MergeTree::new(2);
    let main = tree.clients.get_or_create_client_id("main", 0);
    let mid = tree.clients.get_or_create_client_id("mid", 1);
    let top = tree.clients.get_or_create_client_id("top", 2);
    assert_eq!(tree.clients.branch_id(top), 2);

    tree.insert(main, 0, 1, 0, 4);
    tree.insert(mid, 1, 2, 0, 3);
    tree.insert(top, 2, 3, 0, 2);

    // Each branch sees its own content and everything upstream of it.
    assert_eq!(tree.get_length(3, main), 4);
    assert_eq!(tree.get_length(3, mid), 7);
    assert_eq!(tree.get_length(3, top), 9);

    let root = tree.root.partial_lengths();
    assert_eq!(root.downstream().len(), 2);
    assert_eq!(root.partial_lengths_for_branch(1).get_branch_partial_length(3, mid), 7);

    // A remove from the middle branch is visible downstream, but not upstream.
    tree.remove(mid, 3, 4, 0, 7);
    assert_eq!(tree.get_length(4, main), 4);
    assert_eq!(tree.get_length(4, mid), 0);
    assert_eq!(tree.get_length(4, top), 2);
    check(&tree);
    for client in [main, mid, top] {
        tree.dbg_check_view(4, client);
    }
}

#[test]
fn racing_removes() {
    let mut tree = MergeTree::with_options(0, PartialLengthOptions::compact());
    let a = tree.clients.get_or_create_client_id("a", 0);
    let b = tree.clients.get_or_create_client_id("b", 0);
    let c = tree.clients.get_or_create_client_id("c", 0);

    tree.insert(a, 0, 1, 0, 10);
    tree.remove(b, 1, 2, 0, 6);
    tree.remove(c, 1, 3, 2, 8);
    tree.remove(a, 1, 4, 0, 10);
    check(&tree);

    for client in [a, b, c] {
        assert_eq!(tree.get_length(4, client), 0);
        tree.dbg_check_view(1, client);
    }
    assert_eq!(tree.get_length(1, b), 4);
    assert_eq!(tree.get_length(1, c), 4);
    assert_eq!(tree.get_length(2, c), 2);

    let root = tree.root.partial_lengths();
    let overlapped = root.partial_lengths.iter()
        .find(|entry| entry.overlap.is_some())
        .expect("racing removes should leave an overlap entry");
    assert_eq!(overlapped.seq, 2);
    assert!(root.cli_latest(a).is_some());
    assert_eq!(root.cli_latest_leq(b, 1), None);
}

#[test]
fn min_seq_compacts_every_block() {
    let mut tree = MergeTree::with_options(0, PartialLengthOptions::compact());
    let a = tree.clients.get_or_create_client_id("a", 0);
    for seq in 1..=50 {
        tree.insert(a, seq - 1, seq, 0, 1);
    }
    assert!(tree.root.partial_lengths().entry_count() > 0);

    tree.set_min_seq(50);
    assert_eq!(tree.root.partial_lengths().entry_count(), 0);
    assert_eq!(tree.root.partial_lengths().min_length, 50);
    assert_eq!(tree.get_length(50, a), 50);
    check(&tree);
}

#[test]
fn rebuild_is_stable() {
    let mut tree = MergeTree::new(1);
    let a = tree.clients.get_or_create_client_id("a", 0);
    let f = tree.clients.get_or_create_client_id("f", 1);
    tree.insert(a, 0, 1, 0, 8);
    tree.insert(f, 0, 2, 0, 8);
    tree.remove(a, 1, 3, 2, 6);

    let before = tree.root.partial_lengths().clone();
    tree.rebuild();
    assert!(before.compare(tree.root.partial_lengths()));
    assert_eq!(before.to_string(), tree.root.partial_lengths().to_string());
}
