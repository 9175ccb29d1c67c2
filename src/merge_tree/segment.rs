use smallvec::SmallVec;
use crate::{BranchId, ClientId, Seq};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RemovalInfo {
    /// `None` while the removal is still pending locally.
    pub removed_seq: Option<Seq>,
    pub removed_client_id: ClientId,
    /// Other clients whose concurrent removes hit this segment after it was already removed.
    pub removed_client_overlap: SmallVec<[ClientId; 2]>,
}

impl RemovalInfo {
    pub fn new(removed_seq: Seq, removed_client_id: ClientId) -> Self {
        Self {
            removed_seq: Some(removed_seq),
            removed_client_id,
            removed_client_overlap: SmallVec::new(),
        }
    }

    /// Did this client remove the segment (either first, or by racing)?
    pub fn removed_by(&self, client_id: ClientId) -> bool {
        self.removed_client_id == client_id || self.removed_client_overlap.contains(&client_id)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub(crate) enum MarkResult {
    /// The client already removed this segment.
    Duplicate,
    Removed,
    /// Someone else removed it first. The client was added to the overlap set.
    Overlap,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Segment {
    pub client_id: ClientId,
    /// `None` for an insert which hasn't been sequenced yet.
    pub seq: Option<Seq>,
    pub cached_length: usize,
    /// The removal seen by the segment's own branch (and any lower branch).
    pub removal: Option<RemovalInfo>,
    /// Removals seen by downstream branches above the segment's own branch. Entry i is for
    /// branch i+1.
    pub(crate) branch_removals: Vec<Option<RemovalInfo>>,
}

impl Segment {
    pub fn new(client_id: ClientId, seq: Option<Seq>, cached_length: usize) -> Self {
        Self {
            client_id,
            seq,
            cached_length,
            removal: None,
            branch_removals: Vec::new(),
        }
    }

    pub fn removal_info(&self, branch_id: BranchId, seg_branch_id: BranchId) -> Option<&RemovalInfo> {
        if branch_id > seg_branch_id {
            self.branch_removals.get(branch_id as usize - 1)?.as_ref()
        } else {
            self.removal.as_ref()
        }
    }

    fn removal_slot_mut(&mut self, branch_id: BranchId, seg_branch_id: BranchId) -> &mut Option<RemovalInfo> {
        if branch_id > seg_branch_id {
            let idx = branch_id as usize - 1;
            if self.branch_removals.len() <= idx {
                self.branch_removals.resize(idx + 1, None);
            }
            &mut self.branch_removals[idx]
        } else {
            &mut self.removal
        }
    }

    /// Mark this segment removed at `seq` in the view of `branch_id`.
    pub(crate) fn mark_removed(&mut self, branch_id: BranchId, seg_branch_id: BranchId, seq: Seq, client_id: ClientId) -> MarkResult {
        let slot = self.removal_slot_mut(branch_id, seg_branch_id);
        match slot {
            None => {
                *slot = Some(RemovalInfo::new(seq, client_id));
                MarkResult::Removed
            }
            Some(removal) if removal.removed_by(client_id) => MarkResult::Duplicate,
            Some(removal) => {
                removal.removed_client_overlap.push(client_id);
                MarkResult::Overlap
            }
        }
    }

    /// Split the segment at `offset`, keeping the first half here and returning the rest. Both
    /// halves keep the insert and removal info.
    pub(crate) fn split_at(&mut self, offset: usize) -> Segment {
        assert!(offset > 0 && offset < self.cached_length, "Invalid split offset {} in segment of length {}", offset, self.cached_length);
        let mut rest = self.clone();
        rest.cached_length = self.cached_length - offset;
        self.cached_length = offset;
        rest
    }
}
