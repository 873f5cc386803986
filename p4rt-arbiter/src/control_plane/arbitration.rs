//! Mastership state machine shared by every controller stream.

use crate::backend::ForwardingBackend;
use crate::config::P4RuntimeConfig;
use crate::control_plane::connection_ids::ConnectionIds;
use crate::control_plane::controller::{ControllerSession, NodeControllers};
use crate::control_plane::notification::notice_for;
use crate::data_plane::response_paths::ResponsePaths;
use crate::data_plane::writer::StreamWriterSink;
use crate::observability::{events, fields};
use crate::status::{ErrorCode, Status};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const ARBITRATION_REGISTRY_TAG: &str = "ArbitrationRegistry:";
const ARBITRATION_REGISTRY_FN_ADD_OR_MODIFY_TAG: &str = "add_or_modify():";
const COMPONENT: &str = "arbitration";

/// Controller sessions of every node plus the live connection ids. Guarded as
/// a whole by one lock so a mastership change and its broadcast are atomic.
pub(crate) struct ControllerTable {
    nodes: HashMap<u64, NodeControllers>,
    connection_ids: ConnectionIds,
}

impl ControllerTable {
    pub(crate) fn new(max_connections: usize) -> Self {
        Self {
            nodes: HashMap::new(),
            connection_ids: ConnectionIds::new(max_connections),
        }
    }

    pub(crate) fn master_of(&self, node_id: u64) -> Option<&ControllerSession> {
        self.nodes.get(&node_id).and_then(NodeControllers::master)
    }
}

/// Tracks which controller is master for each node.
///
/// Lock order is the controller table first, then the response paths. The
/// per-node receivers only ever take the controller table for reading.
pub struct ArbitrationRegistry {
    controllers: Arc<RwLock<ControllerTable>>,
    response_paths: ResponsePaths,
    backend: Arc<dyn ForwardingBackend>,
    max_controllers_per_node: usize,
    response_channel_capacity: usize,
}

impl ArbitrationRegistry {
    pub fn new(config: &P4RuntimeConfig, backend: Arc<dyn ForwardingBackend>) -> Self {
        Self {
            controllers: Arc::new(RwLock::new(ControllerTable::new(
                config.max_num_controller_connections,
            ))),
            response_paths: ResponsePaths::default(),
            backend,
            max_controllers_per_node: config.max_num_controllers_per_node,
            response_channel_capacity: config.response_channel_capacity,
        }
    }

    pub fn allocate_connection_id(&self) -> Result<u64, Status> {
        let id = self.controllers.write().connection_ids.allocate();
        match &id {
            Ok(connection_id) => debug!(
                event = events::CONNECTION_ID_ALLOCATED,
                component = COMPONENT,
                connection_id,
                "allocated connection id"
            ),
            Err(status) => warn!(
                event = events::CONNECTION_ID_EXHAUSTED,
                component = COMPONENT,
                %status,
                "no connection id available"
            ),
        }
        id
    }

    /// Registers or re-arbitrates `connection_id` on `node_id` and announces
    /// the resulting mastership.
    ///
    /// `election_id` must be nonzero. Notifications are written while the
    /// table lock is held so no other arbitration can interleave between
    /// picking the master and announcing it.
    pub fn add_or_modify(
        &self,
        node_id: u64,
        connection_id: u64,
        election_id: u128,
        origin: &str,
        stream: StreamWriterSink,
    ) -> Result<(), Status> {
        let mut table = self.controllers.write();

        if !table.nodes.contains_key(&node_id) {
            self.response_paths.open(
                node_id,
                self.response_channel_capacity,
                &self.backend,
                &self.controllers,
            )?;
            table.nodes.insert(node_id, NodeControllers::default());
        }
        let Some(node) = table.nodes.get_mut(&node_id) else {
            return Err(Status::fail_with_code(
                ErrorCode::Internal,
                format!("Controllers for node {node_id} vanished."),
            ));
        };

        let was_master = node.is_master(connection_id);
        let previous_master = node.master().map(ControllerSession::connection_id);

        if node.find(connection_id).is_none() && node.len() >= self.max_controllers_per_node {
            warn!(
                event = events::CONTROLLER_REJECTED,
                component = COMPONENT,
                node_id,
                connection_id,
                reason = "controller_limit",
                "too many controllers for node"
            );
            return Err(Status::fail_with_code(
                ErrorCode::NoResource,
                format!(
                    "Cannot have more than {} controllers for node (aka device) with ID {node_id}.",
                    self.max_controllers_per_node
                ),
            ));
        }

        if let Some(holder) = node
            .holder_of(election_id)
            .filter(|holder| holder.connection_id() != connection_id)
        {
            warn!(
                event = events::CONTROLLER_REJECTED,
                component = COMPONENT,
                node_id,
                connection_id,
                reason = "duplicate_election_id",
                "election id already in use"
            );
            return Err(Status::fail_with_code(
                ErrorCode::InvalidParam,
                format!(
                    "Election ID {election_id} is already used by connection {} for node (aka device) with ID {node_id}.",
                    holder.connection_id()
                ),
            ));
        }

        node.remove_connection(connection_id);
        let session = ControllerSession::new(connection_id, election_id, origin, stream);
        let name = session.name();
        node.insert(session);

        let Some(master) = node.master() else {
            return Err(Status::fail_with_code(
                ErrorCode::Internal,
                format!("No master for node {node_id} after registration."),
            ));
        };
        let master_connection_id = master.connection_id();
        let master_election_id = master.election_id();
        let is_master = master_connection_id == connection_id;

        if is_master || was_master {
            for session in node.iter() {
                let notice = notice_for(
                    node_id,
                    master_election_id,
                    session.connection_id() == master_connection_id,
                );
                if !session.notify(&notice) {
                    return Err(Status::fail_with_code(
                        ErrorCode::Internal,
                        format!("Failed to write to a stream for node {node_id}."),
                    ));
                }
            }
        } else {
            debug!("{ARBITRATION_REGISTRY_TAG}{ARBITRATION_REGISTRY_FN_ADD_OR_MODIFY_TAG} unicasting slave notice to connection {connection_id}");
            let notice = notice_for(node_id, master_election_id, false);
            let delivered = node
                .find(connection_id)
                .map(|session| session.notify(&notice))
                .unwrap_or(false);
            if !delivered {
                return Err(Status::fail_with_code(
                    ErrorCode::Internal,
                    format!("Failed to write to a stream for node {node_id}."),
                ));
            }
        }

        info!(
            event = events::CONTROLLER_CONNECTED,
            component = COMPONENT,
            node_id,
            connection_id,
            election_id = %fields::format_election_id(election_id),
            role = fields::role(is_master),
            "Controller {name} is connected as {} for node (aka device) with ID {node_id}.",
            fields::role(is_master)
        );
        if previous_master != Some(master_connection_id) {
            info!(
                event = events::MASTER_CHANGED,
                component = COMPONENT,
                node_id,
                connection_id = master_connection_id,
                election_id = %fields::format_election_id(master_election_id),
                "mastership changed"
            );
        }

        Ok(())
    }

    /// Drops `connection_id` from `node_id` and releases the id. If the
    /// master left, survivors learn the new master on a best-effort basis.
    pub fn remove(&self, node_id: u64, connection_id: u64) {
        let mut table = self.controllers.write();
        table.connection_ids.release(connection_id);

        let Some(node) = table.nodes.get_mut(&node_id) else {
            return;
        };
        let was_master = node.is_master(connection_id);
        let Some(removed) = node.remove_connection(connection_id) else {
            return;
        };
        let name = removed.name();
        let role = fields::role(was_master);

        let Some(master) = node.master() else {
            info!(
                event = events::NODE_ORPHANED,
                component = COMPONENT,
                node_id,
                connection_id,
                "Controller {name} which was {role} for node (aka device) with ID {node_id} is disconnected. The node is now orphan."
            );
            return;
        };

        if !was_master {
            info!(
                event = events::CONTROLLER_DISCONNECTED,
                component = COMPONENT,
                node_id,
                connection_id,
                "Controller {name} which was {role} for node (aka device) with ID {node_id} is disconnected."
            );
            return;
        }

        let master_connection_id = master.connection_id();
        let master_election_id = master.election_id();
        info!(
            event = events::MASTER_CHANGED,
            component = COMPONENT,
            node_id,
            connection_id = master_connection_id,
            election_id = %fields::format_election_id(master_election_id),
            "Controller {name} which was MASTER for node (aka device) with ID {node_id} is disconnected. New master is {}.",
            master.name()
        );
        for session in node.iter() {
            let notice = notice_for(
                node_id,
                master_election_id,
                session.connection_id() == master_connection_id,
            );
            if !session.notify(&notice) {
                warn!(
                    event = events::NOTIFICATION_FAILED,
                    component = COMPONENT,
                    node_id,
                    connection_id = session.connection_id(),
                    "unable to announce new master"
                );
            }
        }
    }

    /// The origin is accepted for a future identity check but not compared.
    pub fn is_write_permitted(&self, node_id: u64, election_id: u128, _origin: &str) -> bool {
        self.controllers
            .read()
            .master_of(node_id)
            .map(|master| master.election_id() == election_id)
            .unwrap_or(false)
    }

    pub fn is_master(&self, node_id: u64, connection_id: u64) -> bool {
        self.controllers
            .read()
            .master_of(node_id)
            .map(|master| master.connection_id() == connection_id)
            .unwrap_or(false)
    }

    pub fn master_election_id(&self, node_id: u64) -> Option<u128> {
        self.controllers
            .read()
            .master_of(node_id)
            .map(ControllerSession::election_id)
    }

    pub fn controller_count(&self, node_id: u64) -> usize {
        self.controllers
            .read()
            .nodes
            .get(&node_id)
            .map(NodeControllers::len)
            .unwrap_or(0)
    }

    pub fn connection_count(&self) -> usize {
        self.controllers.read().connection_ids.len()
    }

    /// Whether a response channel and receiver exist for `node_id`.
    pub fn has_response_path(&self, node_id: u64) -> bool {
        self.response_paths.contains(node_id)
    }

    /// Forgets every controller, then stops all receivers.
    ///
    /// Connection ids stay reserved. They are only released by
    /// [`Self::remove`], so an id is never reissued while the stream loop
    /// holding it is still running.
    pub fn teardown(&self) {
        self.controllers.write().nodes.clear();
        self.response_paths.close_all(&self.backend);
    }
}
