//! When several clients concurrently delete the same content, only the first delete to be
//! sequenced actually removes it. The others "overlap" - but from each of those clients' own point
//! of view the content is gone too. This map records, for one removal entry, which other clients
//! raced to remove it and how much length each of them removed.

use smallvec::SmallVec;
use crate::ClientId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OverlapClient {
    pub client_id: ClientId,
    /// Signed length delta. Removals are negative.
    pub seglen: isize,
}

/// An ordered map from client id to [`OverlapClient`]. Overlaps almost always involve one or two
/// clients, so this is just a sorted inline vector.
///
/// Entries are kept sorted by client id and never removed.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct OverlapClients(SmallVec<[OverlapClient; 2]>);

impl OverlapClients {
    pub fn new() -> Self { Self::default() }

    /// Every named client removed `seglen` worth of content.
    pub fn from_clients(client_ids: &[ClientId], seglen: isize) -> Self {
        let mut result = Self::new();
        for &client_id in client_ids {
            result.put(client_id, OverlapClient { client_id, seglen });
        }
        result
    }

    fn find(&self, client_id: ClientId) -> Result<usize, usize> {
        self.0.binary_search_by_key(&client_id, |c| c.client_id)
    }

    pub fn get(&self, client_id: ClientId) -> Option<&OverlapClient> {
        self.find(client_id).ok().map(|idx| &self.0[idx])
    }

    pub fn get_mut(&mut self, client_id: ClientId) -> Option<&mut OverlapClient> {
        self.find(client_id).ok().map(|idx| &mut self.0[idx])
    }

    /// Insert or replace.
    pub fn put(&mut self, client_id: ClientId, entry: OverlapClient) {
        debug_assert_eq!(client_id, entry.client_id);
        match self.find(client_id) {
            Ok(idx) => { self.0[idx] = entry; }
            Err(idx) => { self.0.insert(idx, entry); }
        }
    }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Iterate in client id order.
    pub fn iter(&self) -> std::slice::Iter<'_, OverlapClient> {
        self.0.iter()
    }

    /// Visit every entry in client id order, allowing values to be modified in place.
    pub fn for_each_mut<F: FnMut(&mut OverlapClient)>(&mut self, f: F) {
        self.0.iter_mut().for_each(f);
    }

    /// Add `seglen` to each named client, inserting clients we haven't seen yet.
    pub fn accumulate(&mut self, client_ids: &[ClientId], seglen: isize) {
        for &client_id in client_ids {
            if let Some(existing) = self.get_mut(client_id) {
                existing.seglen += seglen;
            } else {
                self.put(client_id, OverlapClient { client_id, seglen });
            }
        }
    }

    /// Sum another overlap set into this one.
    pub fn merge_from(&mut self, other: &OverlapClients) {
        for entry in other.iter() {
            if let Some(existing) = self.get_mut(entry.client_id) {
                existing.seglen += entry.seglen;
            } else {
                self.put(entry.client_id, *entry);
            }
        }
    }
}

impl<'a> IntoIterator for &'a OverlapClients {
    type Item = &'a OverlapClient;
    type IntoIter = std::slice::Iter<'a, OverlapClient>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
