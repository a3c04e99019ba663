//! Client table: admitted chat clients and their display names.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use crate::wire::ClientId;

/// Record of an admitted chat client.
#[derive(Debug, Clone)]
pub struct ClientRecord {
    /// The client's id.
    pub client_id: ClientId,

    /// Source IP the client joined from.
    pub ip: IpAddr,

    /// The client's message port, as carried in its join request.
    pub client_port: u16,

    /// Display name assigned at admission, never rewritten.
    pub display_name: String,
}

impl ClientRecord {
    /// Address replies and fanout datagrams are sent to.
    pub fn client_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.client_port)
    }
}

/// Set of admitted chat clients keyed by client id. All mutation funnels
/// through the node's single driver loop, so admissions are serialized and
/// concurrent joins cannot collide on a name.
#[derive(Debug, Default)]
pub struct ClientTable {
    clients: HashMap<ClientId, ClientRecord>,

    /// Total admissions this leader term. Names come from this counter
    /// rather than the live population, so a name freed by a leave is never
    /// handed out again within the term.
    admitted: usize,
}

impl ClientTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a client, assigning `"Client N"` on first join. Returns the
    /// record and whether the client was newly admitted; a repeated join
    /// keeps the originally assigned name.
    pub fn admit(
        &mut self,
        client_id: ClientId,
        ip: IpAddr,
        client_port: u16,
    ) -> (&ClientRecord, bool) {
        let is_new = !self.clients.contains_key(&client_id);
        if is_new {
            self.admitted += 1;
            self.clients.insert(
                client_id.clone(),
                ClientRecord {
                    client_id: client_id.clone(),
                    ip,
                    client_port,
                    display_name: format!("Client {}", self.admitted),
                },
            );
        }
        (&self.clients[&client_id], is_new)
    }

    /// Removes a client, returning its record if it was present.
    pub fn release(&mut self, client_id: &ClientId) -> Option<ClientRecord> {
        self.clients.remove(client_id)
    }

    /// Looks up a client by id.
    pub fn get(&self, client_id: &ClientId) -> Option<&ClientRecord> {
        self.clients.get(client_id)
    }

    /// Iterates over all admitted clients, for fanout.
    pub fn iter(&self) -> impl Iterator<Item = &ClientRecord> {
        self.clients.values()
    }

    /// Number of admitted clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// True if no clients are admitted.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Drops all records and restarts naming; called at the boundary of a
    /// leader term (client sessions do not survive leader transitions).
    pub fn clear(&mut self) {
        self.clients.clear();
        self.admitted = 0;
    }
}
