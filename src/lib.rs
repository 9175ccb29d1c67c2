//! This crate implements the partial length index used by collaborative merge trees.
//!
//! A merge tree stores a document as a tree of segments. Every segment remembers which client
//! inserted it and at which sequence number, and (if it was removed) who removed it and when.
//! Different clients see different versions of the document at any moment: a client which sent
//! an operation at reference sequence number 10 hasn't seen anything sequenced after 10 yet, except
//! for its own edits.
//!
//! To find a position in the document from some client's point of view, the tree needs to know
//! how long each subtree is *as seen by that client*. Scanning every leaf would be O(n). Instead,
//! every interior block caches a [`PartialLengths`] index which answers
//! "how long is this subtree, as seen by client C at sequence number S" by binary searching a
//! short list of per-sequence length deltas.
//!
//! The index has a few moving parts:
//!
//! - A sorted list of `(seq, seglen, len)` entries for every operation which touched the subtree
//!   inside the collaboration window. `len` is the running sum of `seglen`.
//! - A per-client projection of the same list, used to add back a client's own edits which were
//!   sequenced after the point the client is querying from.
//! - A base length (`min_length`) absorbing everything at or below the window's minimum sequence
//!   number. Entries older than that are folded in and dropped ("zamboni").
//! - One extra index per downstream branch the local replica maintains.
//!
//! Indexes are rebuilt from a block's children with [`PartialLengths::combine`] whenever the
//! block's structure changes, and updated in place with [`PartialLengths::update`] when a single
//! new operation lands inside the block.
//!
//! ## Example
//!
//! ```
//! use partial_lengths::merge_tree::MergeTree;
//!
//! let mut tree = MergeTree::new(0);
//! let fred = tree.clients.get_or_create_client_id("fred", 0);
//! let george = tree.clients.get_or_create_client_id("george", 0);
//!
//! tree.insert(fred, 0, 1, 0, 5); // fred inserts 5 characters at seq 1.
//! tree.insert(george, 0, 2, 0, 3); // Concurrently george inserts 3 characters at seq 2.
//!
//! // Fred hasn't seen george's insert yet.
//! assert_eq!(tree.get_length(1, fred), 5);
//! // George always sees their own insert.
//! assert_eq!(tree.get_length(0, george), 3);
//! assert_eq!(tree.get_length(2, fred), 8);
//! ```

#![allow(clippy::module_inception)]

pub mod options;
pub mod overlap;
pub mod partial_lengths;
pub mod merge_tree;

pub use options::PartialLengthOptions;
pub use overlap::{OverlapClient, OverlapClients};
pub use partial_lengths::{IndexMismatch, PartialLengthList, PartialLengths, PartialSequenceLength};

/// Sequence numbers are assigned by the ordering service. They're globally unique and
/// monotonically increasing. Operations which haven't been sequenced yet are represented with
/// `Option<Seq>::None`.
pub type Seq = u64;

/// Dense handle for a collaborating client, issued by the session layer.
pub type ClientId = u32;

/// Branch 0 is the main replicated branch. Branches 1..N are downstream views.
pub type BranchId = u32;
