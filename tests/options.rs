// The compaction default is process-wide, so it gets a test binary to itself.

use partial_lengths::PartialLengthOptions;
use partial_lengths::merge_tree::MergeTree;
use partial_lengths::options::{set_zamboni_enabled, zamboni_enabled};

#[test]
fn global_default_controls_compaction() {
    assert!(zamboni_enabled());
    assert!(PartialLengthOptions::default().is_zamboni());

    set_zamboni_enabled(false);
    let mut tree = MergeTree::new(0);
    assert!(!tree.window.options.is_zamboni());

    let a = tree.clients.get_or_create_client_id("a", 0);
    for seq in 1..=10 {
        tree.insert(a, seq - 1, seq, 0, 2);
    }
    tree.set_min_seq(10);
    // Nothing is folded away until the next rebuild.
    assert!(tree.root.partial_lengths().entry_count() > 0);
    assert_eq!(tree.get_length(10, a), 20);

    tree.rebuild();
    assert_eq!(tree.root.partial_lengths().partial_lengths.len(), 0);
    assert_eq!(tree.get_length(10, a), 20);

    set_zamboni_enabled(true);
    assert!(MergeTree::new(0).window.options.is_zamboni());
}
