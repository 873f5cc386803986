//! Protocol loop for one controller stream.

use crate::api::connection::StreamChannelConnection;
use crate::backend::ForwardingBackend;
use crate::control_plane::arbitration::ArbitrationRegistry;
use crate::data_plane::writer::StreamWriterSink;
use crate::observability::{events, fields};
use crate::proto::p4runtime::{
    election_id_of, stream_error, stream_message_request, stream_message_response,
    DigestListAckError, MasterArbitrationUpdate, PacketOutError, StreamMessageRequest,
};
use crate::runtime::backend_runtime::block_on_backend;
use crate::status::{ErrorCode, Status};
use std::sync::Arc;
use tracing::{debug, info, warn};

const STREAM_COORDINATOR_TAG: &str = "StreamCoordinator:";
const STREAM_COORDINATOR_FN_RUN_TAG: &str = "run():";
const COMPONENT: &str = "stream_coordinator";

/// Removes the stream's controller from the registry however the loop ends.
struct SessionGuard<'a> {
    registry: &'a ArbitrationRegistry,
    node_id: u64,
    connection_id: u64,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.registry.remove(self.node_id, self.connection_id);
        info!(
            event = events::STREAM_CLOSED,
            component = COMPONENT,
            node_id = self.node_id,
            connection_id = self.connection_id,
            "stream closed"
        );
    }
}

pub(crate) struct StreamCoordinator<'a> {
    registry: &'a ArbitrationRegistry,
    backend: &'a Arc<dyn ForwardingBackend>,
    connection: Arc<dyn StreamChannelConnection>,
}

impl<'a> StreamCoordinator<'a> {
    pub(crate) fn new(
        registry: &'a ArbitrationRegistry,
        backend: &'a Arc<dyn ForwardingBackend>,
        connection: Arc<dyn StreamChannelConnection>,
    ) -> Self {
        Self {
            registry,
            backend,
            connection,
        }
    }

    /// Serves the stream until the peer closes it or breaks the protocol.
    ///
    /// Arbitration errors end the stream; data-plane errors are reported in
    /// band and the loop carries on.
    pub(crate) fn run(&self) -> Result<(), Status> {
        let connection_id = self.registry.allocate_connection_id()?;
        let mut guard = SessionGuard {
            registry: self.registry,
            node_id: 0,
            connection_id,
        };
        let origin = self.connection.peer();
        let stream = StreamWriterSink::new(Arc::clone(&self.connection));
        info!(
            event = events::STREAM_OPENED,
            component = COMPONENT,
            connection_id,
            origin = origin.as_str(),
            "stream opened"
        );

        let result = self.serve(&mut guard.node_id, connection_id, &origin, &stream);
        if let Err(status) = &result {
            warn!(
                event = events::STREAM_PROTOCOL_ERROR,
                component = COMPONENT,
                node_id = guard.node_id,
                connection_id,
                %status,
                "terminating stream"
            );
        }
        result
    }

    fn serve(
        &self,
        node_id: &mut u64,
        connection_id: u64,
        origin: &str,
        stream: &StreamWriterSink,
    ) -> Result<(), Status> {
        while let Some(request) = self.connection.read() {
            debug!(
                "{STREAM_COORDINATOR_TAG}{STREAM_COORDINATOR_FN_RUN_TAG} connection {connection_id} sent {}",
                fields::request_kind(&request)
            );
            match &request.update {
                Some(stream_message_request::Update::Arbitration(update)) => {
                    self.arbitrate(node_id, connection_id, update, origin, stream)?
                }
                Some(stream_message_request::Update::Packet(_))
                | Some(stream_message_request::Update::DigestAck(_)) => {
                    self.handle_data_plane(*node_id, connection_id, &request)
                }
                None => {
                    return Err(Status::fail_with_code(
                        ErrorCode::InvalidParam,
                        "Need to specify either arbitration or packet.",
                    ))
                }
            }
        }
        Ok(())
    }

    fn arbitrate(
        &self,
        node_id: &mut u64,
        connection_id: u64,
        update: &MasterArbitrationUpdate,
        origin: &str,
        stream: &StreamWriterSink,
    ) -> Result<(), Status> {
        if update.device_id == 0 {
            return Err(Status::fail_with_code(
                ErrorCode::InvalidParam,
                "Invalid node (aka device) ID.",
            ));
        }
        if *node_id == 0 {
            *node_id = update.device_id;
        } else if *node_id != update.device_id {
            return Err(Status::fail_with_code(
                ErrorCode::InvalidParam,
                format!(
                    "Node (aka device) ID for this stream has changed. Was {}, now is {}.",
                    *node_id, update.device_id
                ),
            ));
        }

        let election_id = election_id_of(update.election_id.as_ref());
        if election_id == 0 {
            return Err(Status::fail_with_code(
                ErrorCode::InvalidParam,
                "Invalid election ID.",
            ));
        }

        self.registry
            .add_or_modify(*node_id, connection_id, election_id, origin, stream.clone())
    }

    /// Packet-outs and digest acks are only taken from the master. Anything
    /// refused is echoed back inside a stream error.
    fn handle_data_plane(
        &self,
        node_id: u64,
        connection_id: u64,
        request: &StreamMessageRequest,
    ) {
        let result = if self.registry.is_master(node_id, connection_id) {
            block_on_backend(self.backend.handle_stream_message(node_id, request))
        } else {
            Err(Status::fail_with_code(
                ErrorCode::PermissionDenied,
                format!("Controller with connection ID {connection_id} is not a master."),
            ))
        };
        let Err(status) = result else {
            return;
        };

        debug!(
            event = events::DATA_PLANE_REJECTED,
            component = COMPONENT,
            node_id,
            connection_id,
            kind = fields::request_kind(request),
            %status,
            "rejecting data-plane message"
        );
        let mut response = status.to_stream_error_response();
        if let Some(stream_message_response::Update::Error(error)) = response.update.as_mut() {
            error.details = match &request.update {
                Some(stream_message_request::Update::Packet(packet)) => {
                    Some(stream_error::Details::PacketOut(PacketOutError {
                        packet_out: Some(packet.clone()),
                    }))
                }
                Some(stream_message_request::Update::DigestAck(ack)) => {
                    Some(stream_error::Details::DigestListAck(DigestListAckError {
                        digest_list_ack: Some(ack.clone()),
                    }))
                }
                _ => None,
            };
        }
        // Best effort.
        let _ = self.connection.write(&response);
    }
}
