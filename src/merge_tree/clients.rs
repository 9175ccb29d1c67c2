use smartstring::alias::String as SmartString;
use crate::{BranchId, ClientId};
use crate::merge_tree::TreeContext;

#[derive(Clone, Debug, Eq, PartialEq)]
struct ClientData {
    name: SmartString,
    branch_id: BranchId,
}

/// Assigns dense ids to named clients and remembers which branch each client edits.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientTable {
    client_data: Vec<ClientData>,
    local_branch_id: BranchId,
}

impl ClientTable {
    pub fn new(local_branch_id: BranchId) -> Self {
        Self {
            client_data: Vec::new(),
            local_branch_id,
        }
    }

    pub fn get_client_id(&self, name: &str) -> Option<ClientId> {
        self.client_data.iter()
            .position(|client_data| client_data.name == name)
            .map(|id| id as ClientId)
    }

    /// Look up a client by name, registering it on `branch_id` if it's new. The branch of an
    /// existing client never changes.
    pub fn get_or_create_client_id(&mut self, name: &str, branch_id: BranchId) -> ClientId {
        if name == "ROOT" { panic!("Client name ROOT is reserved"); }
        assert!(branch_id <= self.local_branch_id,
            "Branch {} is past the local branch {}", branch_id, self.local_branch_id);

        if let Some(id) = self.get_client_id(name) {
            id
        } else {
            self.client_data.push(ClientData {
                name: SmartString::from(name),
                branch_id,
            });
            (self.client_data.len() - 1) as ClientId
        }
    }

    pub fn get_client_name(&self, client_id: ClientId) -> &str {
        self.client_data[client_id as usize].name.as_str()
    }

    pub fn len(&self) -> usize {
        self.client_data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.client_data.is_empty()
    }
}

impl TreeContext for ClientTable {
    fn branch_id(&self, client_id: ClientId) -> BranchId {
        self.client_data[client_id as usize].branch_id
    }

    fn local_branch_id(&self) -> BranchId {
        self.local_branch_id
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ids_are_dense_and_stable() {
        let mut clients = ClientTable::new(1);
        assert_eq!(clients.get_or_create_client_id("seph", 0), 0);
        assert_eq!(clients.get_or_create_client_id("mike", 1), 1);
        assert_eq!(clients.get_or_create_client_id("seph", 1), 0);
        assert_eq!(clients.branch_id(0), 0);
        assert_eq!(clients.branch_id(1), 1);
        assert_eq!(clients.get_client_name(1), "mike");
        assert_eq!(clients.get_client_id("nobody"), None);
    }

    #[test]
    #[should_panic]
    fn root_is_reserved() {
        ClientTable::new(0).get_or_create_client_id("ROOT", 0);
    }

    #[test]
    #[should_panic]
    fn branch_must_be_maintained() {
        ClientTable::new(0).get_or_create_client_id("fork", 1);
    }
}
