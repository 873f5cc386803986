//! Controller sessions and the per-node ordered set holding them.

use crate::data_plane::writer::{StreamWriterSink, WriterSink};
use crate::observability::fields;
use crate::proto::p4runtime::StreamMessageResponse;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};

/// One controller's identity for a node, plus the stream it is reached on.
#[derive(Clone)]
pub struct ControllerSession {
    connection_id: u64,
    election_id: u128,
    origin: String,
    stream: StreamWriterSink,
}

impl ControllerSession {
    pub fn new(
        connection_id: u64,
        election_id: u128,
        origin: &str,
        stream: StreamWriterSink,
    ) -> Self {
        Self {
            connection_id,
            election_id,
            origin: origin.to_string(),
            stream,
        }
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    pub fn election_id(&self) -> u128 {
        self.election_id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn name(&self) -> String {
        fields::controller_name(self.connection_id, self.election_id, &self.origin)
    }

    /// Writes straight to the controller's stream.
    pub fn notify(&self, response: &StreamMessageResponse) -> bool {
        self.stream.write(response)
    }
}

impl Debug for ControllerSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerSession")
            .field("connection_id", &self.connection_id)
            .field("election_id", &self.election_id)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Sessions of one node keyed by descending election id. The first entry is
/// the master.
#[derive(Debug, Default)]
pub(crate) struct NodeControllers {
    by_election_id: BTreeMap<Reverse<u128>, ControllerSession>,
}

impl NodeControllers {
    pub(crate) fn master(&self) -> Option<&ControllerSession> {
        self.by_election_id.values().next()
    }

    pub(crate) fn is_master(&self, connection_id: u64) -> bool {
        self.master()
            .map(|master| master.connection_id() == connection_id)
            .unwrap_or(false)
    }

    pub(crate) fn find(&self, connection_id: u64) -> Option<&ControllerSession> {
        self.by_election_id
            .values()
            .find(|session| session.connection_id() == connection_id)
    }

    /// Session currently keyed under `election_id`, if any.
    pub(crate) fn holder_of(&self, election_id: u128) -> Option<&ControllerSession> {
        self.by_election_id.get(&Reverse(election_id))
    }

    /// Caller guarantees the election id is not held by another connection.
    pub(crate) fn insert(&mut self, session: ControllerSession) {
        self.by_election_id
            .insert(Reverse(session.election_id()), session);
    }

    pub(crate) fn remove_connection(&mut self, connection_id: u64) -> Option<ControllerSession> {
        let key = self
            .find(connection_id)
            .map(|session| Reverse(session.election_id()))?;
        self.by_election_id.remove(&key)
    }

    /// Sessions in mastership order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &ControllerSession> {
        self.by_election_id.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_election_id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{ControllerSession, NodeControllers};
    use crate::data_plane::writer::StreamWriterSink;

    fn session(connection_id: u64, election_id: u128) -> ControllerSession {
        ControllerSession::new(
            connection_id,
            election_id,
            "ipv4:127.0.0.1:50000",
            StreamWriterSink::detached(),
        )
    }

    #[test]
    fn highest_election_id_is_master() {
        let mut node = NodeControllers::default();
        node.insert(session(1, 5));
        node.insert(session(2, 9));
        node.insert(session(3, 7));

        assert_eq!(node.master().map(|m| m.connection_id()), Some(2));
        assert!(node.is_master(2));
        assert!(!node.is_master(1));
        let order: Vec<u128> = node.iter().map(|s| s.election_id()).collect();
        assert_eq!(order, vec![9, 7, 5]);
    }

    #[test]
    fn remove_connection_promotes_next_highest() {
        let mut node = NodeControllers::default();
        node.insert(session(1, 5));
        node.insert(session(2, 9));

        let removed = node.remove_connection(2).expect("registered");
        assert_eq!(removed.election_id(), 9);
        assert!(node.is_master(1));
        assert!(node.remove_connection(2).is_none());
        assert_eq!(node.len(), 1);
    }

    #[test]
    fn holder_of_finds_by_election_id() {
        let mut node = NodeControllers::default();
        node.insert(session(4, 12));

        assert_eq!(node.holder_of(12).map(|s| s.connection_id()), Some(4));
        assert!(node.holder_of(13).is_none());
        assert!(!NodeControllers::default().is_master(4));
    }

    #[test]
    fn name_lists_identity() {
        assert_eq!(
            session(3, 77).name(),
            "(connection_id: 3, election_id: 77, uri: ipv4:127.0.0.1:50000)"
        );
    }
}
