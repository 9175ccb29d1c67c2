use crate::ClientId;
use crate::partial_lengths::{PartialLengthList, PartialLengths};

impl PartialLengthList {
    /// Entries are strictly ascending by seq, and each cumulative length is the previous
    /// cumulative length plus this entry's delta.
    pub(crate) fn check(&self) {
        let mut prev: Option<(u64, isize)> = None;
        for entry in self.iter() {
            match prev {
                Some((prev_seq, prev_len)) => {
                    assert!(prev_seq < entry.seq, "Entries out of order: {} then {}", prev_seq, entry.seq);
                    assert_eq!(entry.len, prev_len + entry.seglen, "Bad cumulative length at seq {}", entry.seq);
                }
                None => {
                    assert_eq!(entry.len, entry.seglen, "First entry (seq {}) isn't relative to the base", entry.seq);
                }
            }
            prev = Some((entry.seq, entry.len));
        }
    }
}

impl PartialLengths {
    /// Check the internal consistency of the index. Panics if anything is wrong.
    ///
    /// This is public for integration tests. Don't depend on it.
    #[allow(unused)]
    pub fn dbg_check(&self) {
        self.partial_lengths.check();

        for (client_id, list) in self.client_seq_numbers.iter().enumerate() {
            list.check();
            assert!(list.iter().all(|e| e.client_id == client_id as ClientId));
            assert!(list.iter().all(|e| e.overlap.is_none()));

            // Every client entry shadows an entry in the branch-wide list.
            for entry in list.iter() {
                assert!(self.partial_lengths.get_seq(entry.seq).is_some(),
                    "Client {} has seq {} missing from the branch list", client_id, entry.seq);
            }
        }

        for entry in self.partial_lengths.iter() {
            if let Some(overlap) = &entry.overlap {
                assert!(!overlap.is_empty());
            }
        }

        for downstream in self.downstream.iter() {
            assert!(downstream.downstream.is_empty(), "Downstream branches can't have their own branches");
            downstream.dbg_check();
        }
    }
}
