/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

use crate::api::connection::StreamChannelConnection;
use crate::backend::ForwardingBackend;
use crate::config::P4RuntimeConfig;
use crate::control_plane::arbitration::ArbitrationRegistry;
use crate::data_plane::stream_coordinator::StreamCoordinator;
use crate::data_plane::writer::WriterSink;
use crate::observability::events;
use crate::pipeline::config_store::ForwardingPipelineConfigStore;
use crate::proto::p4runtime::{
    election_id_of, get_forwarding_pipeline_config_request::ResponseType,
    set_forwarding_pipeline_config_request::Action, CapabilitiesResponse,
    ForwardingPipelineConfig, GetForwardingPipelineConfigRequest,
    GetForwardingPipelineConfigResponse, ReadRequest, ReadResponse,
    SetForwardingPipelineConfigRequest, SetForwardingPipelineConfigResponse, WriteRequest,
    WriteResponse, P4RUNTIME_API_VERSION,
};
use crate::runtime::backend_runtime::block_on_backend;
use crate::status::{ErrorCode, Status};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const P4RUNTIME_SERVICE_TAG: &str = "P4RuntimeService:";
const P4RUNTIME_SERVICE_FN_WRITE_TAG: &str = "write():";
const P4RUNTIME_SERVICE_FN_SET_PIPELINE_TAG: &str = "set_forwarding_pipeline_config():";
const COMPONENT: &str = "p4runtime_service";

/// P4Runtime front end for every node of the switch.
///
/// All calls are blocking. A transport runs [`Self::stream_channel`] on a
/// dedicated thread per controller stream.
pub struct P4RuntimeService {
    config: P4RuntimeConfig,
    backend: Arc<dyn ForwardingBackend>,
    registry: ArbitrationRegistry,
    pipeline_configs: ForwardingPipelineConfigStore,
}

impl P4RuntimeService {
    pub fn new(config: P4RuntimeConfig, backend: Arc<dyn ForwardingBackend>) -> Self {
        let registry = ArbitrationRegistry::new(&config, Arc::clone(&backend));
        let pipeline_configs =
            ForwardingPipelineConfigStore::new(config.forwarding_pipeline_configs_file.clone());
        Self {
            config,
            backend,
            registry,
            pipeline_configs,
        }
    }

    pub fn config(&self) -> &P4RuntimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &ArbitrationRegistry {
        &self.registry
    }

    /// Warm start: picks up the pipeline configs saved by a previous run.
    pub fn setup(&self) -> Result<(), Status> {
        debug!(
            "{P4RUNTIME_SERVICE_TAG} setup(): loading {}",
            self.pipeline_configs.path().display()
        );
        self.pipeline_configs.load()
    }

    /// Drops every controller, stops every response receiver and forgets the
    /// in-memory pipeline configs. The persisted file is left alone.
    pub fn teardown(&self) {
        self.registry.teardown();
        self.pipeline_configs.clear();
        info!(
            event = events::TEARDOWN,
            component = COMPONENT,
            "service torn down"
        );
    }

    pub fn write(&self, origin: &str, request: &WriteRequest) -> Result<WriteResponse, Status> {
        if request.updates.is_empty() {
            return Ok(WriteResponse {});
        }
        let node_id = request.device_id;
        let election_id = election_id_of(request.election_id.as_ref());
        check_ids(node_id, election_id, "Invalid election ID.")?;
        if !self.registry.is_write_permitted(node_id, election_id, origin) {
            warn!(
                event = events::WRITE_REJECTED,
                component = COMPONENT,
                node_id,
                origin,
                "write from non-master"
            );
            return Err(Status::fail_with_code(
                ErrorCode::PermissionDenied,
                "Write from non-master is not permitted.",
            ));
        }

        block_on_backend(self.backend.write(request)).map_err(|status| {
            error!("{P4RUNTIME_SERVICE_TAG}{P4RUNTIME_SERVICE_FN_WRITE_TAG} Failed to write forwarding entries to node {node_id}: {status}");
            status
        })?;
        Ok(WriteResponse {})
    }

    /// Streams matching entities into `sink`. Reads are open to every
    /// controller.
    pub fn read(
        &self,
        request: &ReadRequest,
        sink: &dyn WriterSink<ReadResponse>,
    ) -> Result<(), Status> {
        if request.entities.is_empty() {
            return Ok(());
        }
        if request.device_id == 0 {
            return Err(invalid_device_id());
        }
        block_on_backend(self.backend.read(request, sink))
    }

    pub fn set_forwarding_pipeline_config(
        &self,
        origin: &str,
        request: &SetForwardingPipelineConfigRequest,
    ) -> Result<SetForwardingPipelineConfigResponse, Status> {
        let node_id = request.device_id;
        let election_id = election_id_of(request.election_id.as_ref());
        check_ids(
            node_id,
            election_id,
            &format!("Invalid election ID for node {node_id}."),
        )?;
        if !self.registry.is_write_permitted(node_id, election_id, origin) {
            return Err(Status::fail_with_code(
                ErrorCode::PermissionDenied,
                format!(
                    "SetForwardingPipelineConfig from non-master is not permitted for node {node_id}."
                ),
            ));
        }

        let config = request.config.clone().unwrap_or_default();
        let result = match Action::try_from(request.action) {
            Ok(Action::Verify) => {
                block_on_backend(self.backend.verify_pipeline_config(node_id, &config))
            }
            Ok(action @ (Action::VerifyAndCommit | Action::VerifyAndSave)) => {
                self.apply_pipeline_config(node_id, action, config)
            }
            Ok(Action::Commit) => block_on_backend(self.backend.commit_pipeline_config(node_id)),
            Ok(Action::ReconcileAndCommit) => Err(Status::fail_with_code(
                ErrorCode::Unimplemented,
                "RECONCILE_AND_COMMIT action not supported yet",
            )),
            Ok(Action::Unspecified) | Err(_) => Err(Status::fail_with_code(
                ErrorCode::InvalidParam,
                format!("Invalid action passed for node {node_id}."),
            )),
        };

        result.map_err(|status| {
            error!("{P4RUNTIME_SERVICE_TAG}{P4RUNTIME_SERVICE_FN_SET_PIPELINE_TAG} Failed to set forwarding pipeline config for node {node_id}: {status}");
            status
        })?;
        Ok(SetForwardingPipelineConfigResponse {})
    }

    /// Pushes or saves under the store lock. The file is rewritten when the
    /// backend accepts the config (a pending reboot counts), and memory is
    /// only updated once the file write succeeded.
    fn apply_pipeline_config(
        &self,
        node_id: u64,
        action: Action,
        config: ForwardingPipelineConfig,
    ) -> Result<(), Status> {
        let mut store = self.pipeline_configs.lock();
        let applied = if action == Action::VerifyAndCommit {
            block_on_backend(self.backend.push_pipeline_config(node_id, &config))
        } else {
            block_on_backend(self.backend.save_pipeline_config(node_id, &config))
        };
        match applied {
            Ok(()) => {}
            Err(status) if status.error_code() == ErrorCode::RebootRequired => {
                warn!("{P4RUNTIME_SERVICE_TAG}{P4RUNTIME_SERVICE_FN_SET_PIPELINE_TAG} node {node_id}: {status}");
            }
            Err(status) => return Err(status),
        }
        store.replace(node_id, config)
    }

    pub fn get_forwarding_pipeline_config(
        &self,
        request: &GetForwardingPipelineConfigRequest,
    ) -> Result<GetForwardingPipelineConfigResponse, Status> {
        let node_id = request.device_id;
        if node_id == 0 {
            return Err(invalid_device_id());
        }
        let stored = self.pipeline_configs.get(node_id)?;
        let config = match ResponseType::try_from(request.response_type) {
            Ok(ResponseType::All) => stored,
            Ok(ResponseType::CookieOnly) => ForwardingPipelineConfig {
                cookie: stored.cookie,
                ..Default::default()
            },
            Ok(ResponseType::P4infoAndCookie) => ForwardingPipelineConfig {
                p4info: stored.p4info,
                cookie: stored.cookie,
                ..Default::default()
            },
            Ok(ResponseType::DeviceConfigAndCookie) => ForwardingPipelineConfig {
                p4_device_config: stored.p4_device_config,
                cookie: stored.cookie,
                ..Default::default()
            },
            Err(_) => {
                return Err(Status::fail_with_code(
                    ErrorCode::InvalidParam,
                    format!("Invalid action passed for node {node_id}."),
                ))
            }
        };
        Ok(GetForwardingPipelineConfigResponse {
            config: Some(config),
        })
    }

    pub fn capabilities(&self) -> CapabilitiesResponse {
        CapabilitiesResponse {
            p4runtime_api_version: P4RUNTIME_API_VERSION.to_string(),
        }
    }

    /// Serves one controller stream until it ends. Returns the status the
    /// transport should close the stream with.
    pub fn stream_channel(
        &self,
        connection: Arc<dyn StreamChannelConnection>,
    ) -> Result<(), Status> {
        StreamCoordinator::new(&self.registry, &self.backend, connection).run()
    }
}

fn invalid_device_id() -> Status {
    Status::fail_with_code(ErrorCode::InvalidParam, "Invalid device ID.")
}

fn check_ids(node_id: u64, election_id: u128, election_message: &str) -> Result<(), Status> {
    if node_id == 0 {
        return Err(invalid_device_id());
    }
    if election_id == 0 {
        return Err(Status::fail_with_code(
            ErrorCode::InvalidParam,
            election_message,
        ));
    }
    Ok(())
}
