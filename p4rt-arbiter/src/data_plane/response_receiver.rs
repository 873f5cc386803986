//! Per-node receiver that relays backend responses to the current master.

use crate::channel::{ChannelReader, INFINITE};
use crate::control_plane::arbitration::ControllerTable;
use crate::observability::events;
use crate::proto::p4runtime::StreamMessageResponse;
use crate::runtime::worker_runtime::spawn_worker;
use parking_lot::RwLock;
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "response_receiver";

pub(crate) fn spawn_response_receiver(
    node_id: u64,
    reader: ChannelReader<StreamMessageResponse>,
    controllers: Arc<RwLock<ControllerTable>>,
) -> io::Result<JoinHandle<()>> {
    spawn_worker(format!("p4rt-rx-{node_id}"), move || {
        receive_responses(node_id, reader, &controllers)
    })
}

/// Drains the node's response channel until it is closed.
pub(crate) fn receive_responses(
    node_id: u64,
    reader: ChannelReader<StreamMessageResponse>,
    controllers: &RwLock<ControllerTable>,
) {
    info!(
        event = events::RECEIVER_STARTED,
        component = COMPONENT,
        node_id,
        "response receiver started"
    );
    loop {
        match reader.read(INFINITE) {
            Ok(response) => forward_to_master(node_id, &response, controllers),
            Err(status) if status.is_cancelled() => break,
            Err(status) => {
                error!(
                    component = COMPONENT,
                    node_id,
                    %status,
                    "read with infinite timeout failed"
                );
            }
        }
    }
    info!(
        event = events::RECEIVER_STOPPED,
        component = COMPONENT,
        node_id,
        "response channel closed"
    );
}

/// Re-resolves the master for every message; mastership may have moved since
/// the response was queued.
pub(crate) fn forward_to_master(
    node_id: u64,
    response: &StreamMessageResponse,
    controllers: &RwLock<ControllerTable>,
) {
    if response.has_arbitration() {
        error!(
            event = events::RESPONSE_DROPPED,
            component = COMPONENT,
            node_id,
            reason = "arbitration_from_switch",
            "received MasterArbitrationUpdate from switch, dropping"
        );
        return;
    }

    let table = controllers.read();
    let Some(master) = table.master_of(node_id) else {
        debug!(
            event = events::RESPONSE_DROPPED,
            component = COMPONENT,
            node_id,
            reason = "no_master",
            "no master connected"
        );
        return;
    };

    if master.notify(response) {
        debug!(
            event = events::RESPONSE_FORWARDED,
            component = COMPONENT,
            node_id,
            connection_id = master.connection_id(),
            "forwarded response to master"
        );
    } else {
        warn!(
            event = events::RESPONSE_DROPPED,
            component = COMPONENT,
            node_id,
            connection_id = master.connection_id(),
            reason = "stream_write_failed",
            "unable to write response to master stream"
        );
    }
}
