//! Per-node response channels and the receiver threads draining them.

use crate::backend::ForwardingBackend;
use crate::channel::{Channel, ChannelReader, ChannelWriter};
use crate::control_plane::arbitration::ControllerTable;
use crate::data_plane::response_receiver::spawn_response_receiver;
use crate::data_plane::writer::{ChannelWriterSink, WriterSink};
use crate::observability::events;
use crate::proto::p4runtime::StreamMessageResponse;
use crate::runtime::backend_runtime::block_on_backend;
use crate::status::{ErrorCode, Status};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info};

const RESPONSE_PATHS_TAG: &str = "ResponsePaths:";
const RESPONSE_PATHS_FN_OPEN_TAG: &str = "open():";
const RESPONSE_PATHS_FN_CLOSE_ALL_TAG: &str = "close_all():";
const COMPONENT: &str = "response_paths";

struct ResponsePath {
    channel: Arc<Channel<StreamMessageResponse>>,
    receiver: JoinHandle<()>,
}

#[derive(Default)]
pub(crate) struct ResponsePaths {
    paths: Mutex<HashMap<u64, ResponsePath>>,
}

impl ResponsePaths {
    /// Creates the node's response channel, hands its writer to the backend and
    /// starts the receiver. Any failure undoes the earlier steps, so a later
    /// call for the same node starts from scratch.
    pub(crate) fn open(
        &self,
        node_id: u64,
        capacity: usize,
        backend: &Arc<dyn ForwardingBackend>,
        controllers: &Arc<RwLock<ControllerTable>>,
    ) -> Result<(), Status> {
        let mut paths = self.paths.lock();
        if paths.contains_key(&node_id) {
            return Ok(());
        }

        let channel = Channel::create(capacity);
        let (Some(writer), Some(reader)) = (
            ChannelWriter::create(&channel),
            ChannelReader::create(&channel),
        ) else {
            return Err(Status::fail_with_code(
                ErrorCode::Internal,
                format!("Response channel for node {node_id} closed before use."),
            ));
        };

        debug!("{RESPONSE_PATHS_TAG}{RESPONSE_PATHS_FN_OPEN_TAG} registering response writer for node {node_id}");
        let sink: Arc<dyn WriterSink<StreamMessageResponse>> =
            Arc::new(ChannelWriterSink::new(writer));
        if let Err(status) = block_on_backend(backend.register_response_writer(node_id, sink)) {
            channel.close();
            return Err(status);
        }

        let receiver = match spawn_response_receiver(node_id, reader, Arc::clone(controllers)) {
            Ok(receiver) => receiver,
            Err(e) => {
                error!(
                    event = events::RECEIVER_SPAWN_FAILED,
                    component = COMPONENT,
                    node_id,
                    err = %e,
                    "unable to spawn response receiver, rolling back"
                );
                if let Err(status) = block_on_backend(backend.unregister_response_writer(node_id)) {
                    error!("{RESPONSE_PATHS_TAG}{RESPONSE_PATHS_FN_OPEN_TAG} rollback unregister failed: {status}");
                }
                channel.close();
                return Err(Status::fail_with_code(
                    ErrorCode::Internal,
                    format!(
                        "Failed to create packet-in receiver thread for node {node_id} with error {e}."
                    ),
                ));
            }
        };

        paths.insert(node_id, ResponsePath { channel, receiver });
        Ok(())
    }

    pub(crate) fn contains(&self, node_id: u64) -> bool {
        self.paths.lock().contains_key(&node_id)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.paths.lock().len()
    }

    /// Unregisters every writer, closes every channel, then joins the
    /// receivers.
    ///
    /// The map lock is released before any of that: a receiver may be waiting
    /// on the controller table, whose writer may in turn be waiting in
    /// [`Self::open`].
    pub(crate) fn close_all(&self, backend: &Arc<dyn ForwardingBackend>) {
        let drained: Vec<(u64, ResponsePath)> = self.paths.lock().drain().collect();
        let mut receivers = Vec::with_capacity(drained.len());
        for (node_id, path) in drained {
            if let Err(status) = block_on_backend(backend.unregister_response_writer(node_id)) {
                error!("{RESPONSE_PATHS_TAG}{RESPONSE_PATHS_FN_CLOSE_ALL_TAG} unregister for node {node_id} failed: {status}");
            }
            path.channel.close();
            receivers.push((node_id, path.receiver));
        }
        for (node_id, receiver) in receivers {
            if receiver.join().is_err() {
                error!("{RESPONSE_PATHS_TAG}{RESPONSE_PATHS_FN_CLOSE_ALL_TAG} receiver for node {node_id} panicked");
            }
        }
        info!(
            event = events::TEARDOWN,
            component = COMPONENT,
            "response paths closed"
        );
    }
}
