//! The partial length index cached on every merge block.
//!
//! Each [`PartialLengths`] summarizes one branch's view of a subtree. The branch 0 index owns
//! one more index per downstream branch the local replica maintains.

mod record;
mod combine;
mod update;
mod check;

use std::error::Error;
use std::fmt::{Display, Formatter};
use humansize::{DECIMAL, format_size};
use tracing::trace;
use crate::{BranchId, ClientId, Seq};
use crate::merge_tree::{CollabWindow, TreeContext};

pub use record::{PartialLengthList, PartialSequenceLength};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PartialLengths {
    /// Base length. Everything at or below the window's minimum sequence number is folded in
    /// here.
    pub min_length: isize,
    /// Number of leaf segments summarized by this index.
    pub segment_count: usize,
    /// Entries for each seq in the collaboration window which changed this subtree.
    pub partial_lengths: PartialLengthList,
    /// Per-client projections, indexed by client id. Each list only contains entries for
    /// operations the client authored (or raced to remove).
    pub(crate) client_seq_numbers: Vec<PartialLengthList>,
    /// Index for branch i+1 at position i. Only populated on the branch 0 index.
    pub(crate) downstream: Vec<PartialLengths>,
    /// The watermark this index was last compacted against.
    pub min_seq: Seq,
}

impl PartialLengths {
    pub fn new(min_seq: Seq) -> Self {
        Self {
            min_seq,
            ..Default::default()
        }
    }

    /// The index used to answer queries for `branch_id`.
    pub fn partial_lengths_for_branch(&self, branch_id: BranchId) -> &PartialLengths {
        if branch_id == 0 { self }
        else {
            self.downstream.get(branch_id as usize - 1)
                .unwrap_or_else(|| panic!("Branch {} is not maintained by this index", branch_id))
        }
    }

    pub fn downstream(&self) -> &[PartialLengths] {
        &self.downstream
    }

    pub fn client_seq_numbers(&self, client_id: ClientId) -> Option<&PartialLengthList> {
        self.client_seq_numbers.get(client_id as usize)
    }

    /// Index of the latest entry in the client's projection.
    pub fn cli_latest(&self, client_id: ClientId) -> Option<usize> {
        self.client_seq_numbers(client_id)
            .and_then(|list| list.len().checked_sub(1))
    }

    /// Index of the latest entry in the client's projection at or before `ref_seq`.
    pub fn cli_latest_leq(&self, client_id: ClientId, ref_seq: Seq) -> Option<usize> {
        self.client_seq_numbers(client_id)
            .and_then(|list| list.latest_leq(ref_seq))
    }

    /// The length of this subtree as seen by `client_id` at `ref_seq`, resolving which branch
    /// the client lives on.
    pub fn get_partial_length<C: TreeContext>(&self, ctx: &C, ref_seq: Seq, client_id: ClientId) -> isize {
        let branch_id = ctx.branch_id(client_id);
        self.partial_lengths_for_branch(branch_id)
            .get_branch_partial_length(ref_seq, client_id)
    }

    /// The length of this subtree in this branch, as seen by `client_id` at `ref_seq`.
    ///
    /// Everything sequenced at or before `ref_seq` counts. The client's own later operations
    /// count too, since the client applied them locally before they were sequenced.
    pub fn get_branch_partial_length(&self, ref_seq: Seq, client_id: ClientId) -> isize {
        let mut p_len = self.min_length;
        let cli_seqs = self.client_seq_numbers(client_id);
        let cli_latest = cli_seqs.and_then(|list| list.last());

        if let Some(seq_index) = self.partial_lengths.latest_leq(ref_seq) {
            p_len += self.partial_lengths[seq_index].len;

            if let (Some(cli_seqs), Some(cli_latest)) = (cli_seqs, cli_latest) {
                if cli_latest.seq > ref_seq {
                    // Add the client's edits after ref_seq, without double counting the ones
                    // already included above.
                    p_len += cli_latest.len - cli_seqs.len_at(ref_seq);
                }
            }
        } else if let Some(cli_latest) = cli_latest {
            p_len += cli_latest.len;
        }

        p_len
    }

    pub fn add_client_seq_number(&mut self, client_id: ClientId, seq: Seq, seglen: isize) {
        add_client_seq_number(&mut self.client_seq_numbers, client_id, seq, seglen);
    }

    /// Record a (fully coalesced) entry in the projections of its author and overlap clients.
    pub fn add_client_seq_number_from_partial(&mut self, partial: &PartialSequenceLength) {
        add_client_seq_number_from_partial(&mut self.client_seq_numbers, partial);
    }

    /// Populate the per-client projections from scratch out of `partial_lengths`.
    fn fill_client_projections(&mut self) {
        debug_assert!(self.client_seq_numbers.iter().all(|list| list.is_empty()));
        let Self { partial_lengths, client_seq_numbers, .. } = self;
        for partial in partial_lengths.iter() {
            add_client_seq_number_from_partial(client_seq_numbers, partial);
        }
    }

    /// Fold this branch's entries at or below `min_seq` into the base length.
    pub(crate) fn compact_branch(&mut self, min_seq: Seq) {
        let folded = self.partial_lengths.copy_down(min_seq);
        self.min_length += folded;
        for cli_partials in self.client_seq_numbers.iter_mut() {
            cli_partials.copy_down(min_seq);
        }
        self.min_seq = min_seq;
        trace!(min_seq, folded, remaining = self.partial_lengths.len(), "zamboni");
    }

    /// Clear away partial sums for sequence numbers earlier than the current window, on this
    /// branch and every downstream branch.
    pub fn zamboni(&mut self, window: &CollabWindow) {
        self.compact_branch(window.min_seq);
        for downstream in self.downstream.iter_mut() {
            downstream.compact_branch(window.min_seq);
        }
    }

    /// Number of entries stored across every list in this index, including downstream branches.
    pub fn entry_count(&self) -> usize {
        self.partial_lengths.len()
            + self.client_seq_numbers.iter().map(|list| list.len()).sum::<usize>()
            + self.downstream.iter().map(|d| d.entry_count()).sum::<usize>()
    }

    pub fn print_stats(&self, name: &str) {
        let size = std::mem::size_of::<PartialSequenceLength>();
        let entries = self.entry_count();
        println!("-------- {} partial lengths --------", name);
        println!("branches: {}", self.downstream.len() + 1);
        println!("number of {} byte entries: {}", size, entries);
        println!("(used size: {})", format_size(entries * size, DECIMAL));
    }

    /// Deep comparison of two indexes. Returns the first difference found.
    ///
    /// The watermark isn't compared, only the lengths it produces.
    pub fn diff(&self, other: &PartialLengths) -> Result<(), IndexMismatch> {
        self.diff_branch(other, 0)?;

        if self.downstream.len() != other.downstream.len() {
            return Err(IndexMismatch::DownstreamCount {
                expected: self.downstream.len(),
                actual: other.downstream.len(),
            });
        }
        for (i, (a, b)) in self.downstream.iter().zip(other.downstream.iter()).enumerate() {
            a.diff_branch(b, i as BranchId + 1)?;
        }
        Ok(())
    }

    fn diff_branch(&self, other: &PartialLengths, branch: BranchId) -> Result<(), IndexMismatch> {
        if self.min_length != other.min_length {
            return Err(IndexMismatch::MinLength { branch, expected: self.min_length, actual: other.min_length });
        }
        if self.segment_count != other.segment_count {
            return Err(IndexMismatch::SegmentCount { branch, expected: self.segment_count, actual: other.segment_count });
        }
        diff_lists(&self.partial_lengths, &other.partial_lengths, branch, None)?;

        // Missing and empty client lists are equivalent.
        let num_clients = self.client_seq_numbers.len().max(other.client_seq_numbers.len());
        let empty = PartialLengthList::new();
        for client in 0..num_clients {
            let a = self.client_seq_numbers.get(client).unwrap_or(&empty);
            let b = other.client_seq_numbers.get(client).unwrap_or(&empty);
            diff_lists(a, b, branch, Some(client as ClientId))?;
        }
        Ok(())
    }

    pub fn compare(&self, other: &PartialLengths) -> bool {
        self.diff(other).is_ok()
    }

    pub fn branch_to_string(&self, glc: Option<&dyn Fn(ClientId) -> String>, branch_id: BranchId) -> String {
        let mut buf = String::new();
        for partial in self.partial_lengths.iter() {
            buf.push_str(&format!("({},{}) ", partial.seq, partial.len));
        }
        for (client_id, cli_partials) in self.client_seq_numbers.iter().enumerate() {
            if cli_partials.is_empty() { continue; }
            let name = match glc {
                Some(glc) => glc(client_id as ClientId),
                None => client_id.to_string(),
            };
            buf.push_str(&format!("Client {}[", name));
            for partial in cli_partials.iter() {
                buf.push_str(&format!("({},{})", partial.seq, partial.len));
            }
            buf.push(']');
        }
        format!("Br {}, min(seq {}): {}; sc: {};{}", branch_id, self.min_seq, self.min_length, self.segment_count, buf)
    }

    /// Render this index and its downstream branches, one branch per line.
    pub fn to_string_with(&self, glc: Option<&dyn Fn(ClientId) -> String>, indent: usize) -> String {
        let mut buf = self.branch_to_string(glc, 0);
        for (i, downstream) in self.downstream.iter().enumerate() {
            buf.push('\n');
            buf.push_str(&" ".repeat(indent));
            buf.push_str(&downstream.branch_to_string(glc, i as BranchId + 1));
        }
        buf
    }
}

impl Display for PartialLengths {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_string_with(None, 0))
    }
}

fn add_client_seq_number(lists: &mut Vec<PartialLengthList>, client_id: ClientId, seq: Seq, seglen: isize) {
    let idx = client_id as usize;
    if lists.len() <= idx {
        lists.resize_with(idx + 1, PartialLengthList::new);
    }
    let cli = &mut lists[idx];
    let prev_len = cli.last().map_or(0, |last| last.len);
    cli.push(PartialSequenceLength {
        seq,
        len: prev_len + seglen,
        seglen,
        client_id,
        overlap: None,
    });
}

// Assumes the entry's seq is already coalesced.
fn add_client_seq_number_from_partial(lists: &mut Vec<PartialLengthList>, partial: &PartialSequenceLength) {
    add_client_seq_number(lists, partial.client_id, partial.seq, partial.seglen);
    if let Some(overlap) = &partial.overlap {
        for oc in overlap.iter() {
            add_client_seq_number(lists, oc.client_id, partial.seq, oc.seglen);
        }
    }
}

fn diff_lists(a: &PartialLengthList, b: &PartialLengthList, branch: BranchId, client: Option<ClientId>) -> Result<(), IndexMismatch> {
    if a.len() != b.len() {
        return Err(IndexMismatch::EntryCount { branch, client, expected: a.len(), actual: b.len() });
    }
    for (index, (a, b)) in a.iter().zip(b.iter()).enumerate() {
        if a != b {
            return Err(IndexMismatch::Entry { branch, client, index, seq: a.seq });
        }
    }
    Ok(())
}

/// A difference found when comparing two indexes. `client` is `None` for the branch-wide list.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
#[non_exhaustive]
pub enum IndexMismatch {
    MinLength { branch: BranchId, expected: isize, actual: isize },
    SegmentCount { branch: BranchId, expected: usize, actual: usize },
    EntryCount { branch: BranchId, client: Option<ClientId>, expected: usize, actual: usize },
    Entry { branch: BranchId, client: Option<ClientId>, index: usize, seq: Seq },
    DownstreamCount { expected: usize, actual: usize },
}

impl Display for IndexMismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "IndexMismatch {:?}", self)
    }
}

impl Error for IndexMismatch {}
