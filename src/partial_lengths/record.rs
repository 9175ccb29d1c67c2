use std::ops::Index;
use crate::{ClientId, Seq};
use crate::overlap::OverlapClients;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The length contributed by all operations up to and including `seq`.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PartialSequenceLength {
    pub seq: Seq,
    /// Cumulative length as of `seq`, relative to the owning index's base length.
    pub len: isize,
    /// Length delta contributed exactly at `seq`. Negative for removals.
    pub seglen: isize,
    /// The client which authored the operation at `seq`.
    pub client_id: ClientId,
    /// Other clients which concurrently removed the same content at `seq`.
    pub overlap: Option<OverlapClients>,
}

impl PartialSequenceLength {
    pub fn new(seq: Seq, seglen: isize, client_id: ClientId) -> Self {
        Self { seq, len: 0, seglen, client_id, overlap: None }
    }

    /// Fold the overlap clients of `other` (which landed on the same seq) into this entry.
    pub(crate) fn combine_overlap(&mut self, other: &PartialSequenceLength) {
        match (&mut self.overlap, &other.overlap) {
            (Some(mine), Some(theirs)) => mine.merge_from(theirs),
            (None, Some(theirs)) => self.overlap = Some(theirs.clone()),
            (_, None) => {}
        }
    }
}

/// A record set: entries strictly ascending by `seq`.
///
/// While an index is being built from leaves the `len` fields are meaningless. They're filled in
/// by a single sweep once all the leaves have been visited.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct PartialLengthList(pub(crate) Vec<PartialSequenceLength>);

impl PartialLengthList {
    pub fn new() -> Self { Self(Vec::new()) }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn iter(&self) -> std::slice::Iter<'_, PartialSequenceLength> { self.0.iter() }

    pub fn last(&self) -> Option<&PartialSequenceLength> { self.0.last() }

    pub fn as_slice(&self) -> &[PartialSequenceLength] { &self.0 }

    /// Index of the entry with the greatest seq <= key, if any.
    pub fn latest_leq(&self, key: Seq) -> Option<usize> {
        self.0.partition_point(|e| e.seq <= key).checked_sub(1)
    }

    /// The entry for exactly `seq`, if there is one.
    pub fn get_seq(&self, seq: Seq) -> Option<&PartialSequenceLength> {
        self.latest_leq(seq)
            .map(|idx| &self.0[idx])
            .filter(|e| e.seq == seq)
    }

    /// Cumulative length of the latest entry at or before `seq`, or 0.
    pub fn len_at(&self, seq: Seq) -> isize {
        self.latest_leq(seq).map_or(0, |idx| self.0[idx].len)
    }

    pub(crate) fn push(&mut self, entry: PartialSequenceLength) {
        debug_assert!(self.0.last().map_or(true, |last| last.seq < entry.seq));
        self.0.push(entry);
    }

    /// Record a delta at `seq` in a list which is still being built (so `len` isn't maintained).
    ///
    /// Changes landing on the same seq coalesce into a single entry. Anything else is inserted at
    /// its sorted position.
    pub(crate) fn insert_segment(&mut self, seq: Seq, seglen: isize, client_id: ClientId, overlap_clients: &[ClientId]) {
        let idx = self.0.partition_point(|e| e.seq < seq);

        if let Some(existing) = self.0.get_mut(idx).filter(|e| e.seq == seq) {
            existing.seglen += seglen;
            if !overlap_clients.is_empty() {
                match &mut existing.overlap {
                    Some(overlap) => overlap.accumulate(overlap_clients, seglen),
                    None => existing.overlap = Some(OverlapClients::from_clients(overlap_clients, seglen)),
                }
            }
        } else {
            let mut entry = PartialSequenceLength::new(seq, seglen, client_id);
            if !overlap_clients.is_empty() {
                entry.overlap = Some(OverlapClients::from_clients(overlap_clients, seglen));
            }
            self.0.insert(idx, entry);
        }
    }

    /// Turn per-seq deltas into running sums.
    pub(crate) fn accumulate_lengths(&mut self) {
        let mut prev_len = 0;
        for entry in self.0.iter_mut() {
            entry.len = prev_len + entry.seglen;
            prev_len = entry.len;
        }
    }

    /// Set the delta at `seq` to `seglen`, creating the entry if needed. `seglen` is the full
    /// recomputed delta for `seq`, so calling this again for the same seq replaces rather than
    /// adds. Accumulating here would count the op twice whenever a block is updated again.
    ///
    /// `seq` must be the most recently sequenced operation, so the entry always ends up last.
    pub(crate) fn add_seq(&mut self, seq: Seq, seglen: isize, client_id: ClientId) {
        let penult_len = match self.latest_leq(seq) {
            Some(idx) if self.0[idx].seq == seq => {
                assert_eq!(idx, self.0.len() - 1, "Cannot update seq {} behind the latest entry", seq);
                let entry = &mut self.0[idx];
                assert_eq!(entry.client_id, client_id,
                    "Entry for seq {} was authored by client {}, not {}", seq, entry.client_id, client_id);
                entry.seglen = seglen;
                idx.checked_sub(1).map(|prev| self.0[prev].len)
            }
            Some(idx) => {
                assert_eq!(idx, self.0.len() - 1, "Seq {} added out of order", seq);
                let prev_len = self.0[idx].len;
                self.0.push(PartialSequenceLength::new(seq, seglen, client_id));
                Some(prev_len)
            }
            None => {
                assert!(self.0.is_empty(), "Seq {} added out of order", seq);
                self.0.push(PartialSequenceLength::new(seq, seglen, client_id));
                None
            }
        };

        if let Some(last) = self.0.last_mut() {
            last.len = last.seglen + penult_len.unwrap_or(0);
        }
    }

    /// Drop every entry at or below `min_seq`, rebasing the rest. Returns the cumulative length
    /// which was dropped.
    pub(crate) fn copy_down(&mut self, min_seq: Seq) -> isize {
        let Some(mindex) = self.latest_leq(min_seq) else { return 0; };

        let min_length = self.0[mindex].len;
        self.0.drain(..=mindex);
        for entry in self.0.iter_mut() {
            entry.len -= min_length;
        }
        min_length
    }
}

impl Index<usize> for PartialLengthList {
    type Output = PartialSequenceLength;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<'a> IntoIterator for &'a PartialLengthList {
    type Item = &'a PartialSequenceLength;
    type IntoIter = std::slice::Iter<'a, PartialSequenceLength>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn list_of(entries: &[(Seq, isize)]) -> PartialLengthList {
        let mut list = PartialLengthList::new();
        for &(seq, seglen) in entries {
            list.insert_segment(seq, seglen, 0, &[]);
        }
        list.accumulate_lengths();
        list
    }

    fn pairs(list: &PartialLengthList) -> Vec<(Seq, isize)> {
        list.iter().map(|e| (e.seq, e.len)).collect()
    }

    #[test]
    fn latest_leq_edges() {
        let empty = PartialLengthList::new();
        assert_eq!(empty.latest_leq(100), None);

        let list = list_of(&[(10, 5), (11, 3), (12, 2)]);
        assert_eq!(list.latest_leq(9), None);
        assert_eq!(list.latest_leq(10), Some(0));
        assert_eq!(list.latest_leq(11), Some(1));
        assert_eq!(list.latest_leq(1000), Some(2));
        assert_eq!(list.len_at(11), 8);
        assert_eq!(list.len_at(0), 0);
    }

    #[test]
    fn insert_segment_sorts_and_coalesces() {
        let mut list = PartialLengthList::new();
        list.insert_segment(12, 2, 0, &[]);
        list.insert_segment(10, 5, 0, &[]);
        list.insert_segment(12, 4, 1, &[]);
        list.insert_segment(11, 3, 0, &[]);
        list.accumulate_lengths();

        let seqs: Vec<Seq> = list.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![10, 11, 12]);
        let last = list.last().unwrap();
        assert_eq!(last.seglen, 6);
        // The first writer at a seq names the entry.
        assert_eq!(last.client_id, 0);
        assert_eq!(pairs(&list), vec![(10, 5), (11, 8), (12, 14)]);
    }

    #[test]
    fn insert_segment_accumulates_overlap() {
        let mut list = PartialLengthList::new();
        list.insert_segment(20, -4, 1, &[2, 3]);
        list.insert_segment(20, -2, 1, &[3]);

        assert_eq!(list.len(), 1);
        let entry = &list[0];
        assert_eq!(entry.seglen, -6);
        let overlap = entry.overlap.as_ref().unwrap();
        assert_eq!(overlap.get(2).unwrap().seglen, -4);
        assert_eq!(overlap.get(3).unwrap().seglen, -6);
    }

    #[test]
    fn add_seq_replaces_latest() {
        let mut list = list_of(&[(1, 5)]);
        list.add_seq(2, 3, 0);
        assert_eq!(pairs(&list), vec![(1, 5), (2, 8)]);

        // Recomputing the same seq replaces the delta.
        list.add_seq(2, 7, 0);
        assert_eq!(pairs(&list), vec![(1, 5), (2, 12)]);
        assert_eq!(list.len(), 2);

        let mut fresh = PartialLengthList::new();
        fresh.add_seq(4, -2, 3);
        assert_eq!(pairs(&fresh), vec![(4, -2)]);
    }

    #[test]
    #[should_panic]
    fn add_seq_rejects_other_author() {
        let mut list = PartialLengthList::new();
        list.add_seq(4, 2, 1);
        list.add_seq(4, 2, 2);
    }

    #[test]
    #[should_panic]
    fn add_seq_rejects_old_seq() {
        let mut list = list_of(&[(5, 1), (8, 1)]);
        list.add_seq(6, 1, 0);
    }

    #[test]
    fn copy_down_rebases() {
        let mut list = list_of(&[(10, 5), (11, 3), (12, 2)]);
        assert_eq!(list.copy_down(9), 0);
        assert_eq!(list.len(), 3);

        assert_eq!(list.copy_down(11), 8);
        assert_eq!(pairs(&list), vec![(12, 2)]);

        assert_eq!(list.copy_down(100), 2);
        assert!(list.is_empty());
    }
}
