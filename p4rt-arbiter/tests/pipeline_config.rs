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

use integration_test_utils::{
    init_logging, spawn_stream, BackendCall, RecordingBackend, ScriptedConnection,
};
use p4rt_arbiter::proto::p4runtime::{
    get_forwarding_pipeline_config_request::ResponseType,
    set_forwarding_pipeline_config_request::Action, Cookie, ForwardingPipelineConfig,
    GetForwardingPipelineConfigRequest, ReadRequest, ReadResponse,
    SetForwardingPipelineConfigRequest, StreamMessageRequest,
};
use p4rt_arbiter::{Code, ErrorCode, P4RuntimeConfig, P4RuntimeService, Status, WriterSink};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const NODE: u64 = 1;
const MASTER_ELECTION_ID: u128 = 20;
const ORIGIN: &str = "ipv4:10.0.0.1:1000";

/// Service with one connected master for `NODE`.
struct Fixture {
    backend: Arc<RecordingBackend>,
    service: Arc<P4RuntimeService>,
    master: Arc<ScriptedConnection>,
    stream: JoinHandle<Result<(), Status>>,
}

impl Fixture {
    fn new(path: &Path) -> Self {
        init_logging();
        let backend = RecordingBackend::new();
        let config = P4RuntimeConfig {
            forwarding_pipeline_configs_file: path.to_path_buf(),
            ..P4RuntimeConfig::default()
        };
        let service = Arc::new(P4RuntimeService::new(config, backend.clone()));
        service.setup().expect("setup");
        let master = ScriptedConnection::new(ORIGIN);
        let stream = spawn_stream(&service, &master);
        master.send(StreamMessageRequest::arbitration(NODE, MASTER_ELECTION_ID));
        master.wait_for_responses(1, Duration::from_secs(5));
        Self {
            backend,
            service,
            master,
            stream,
        }
    }

    fn set(
        &self,
        action: Action,
        config: Option<ForwardingPipelineConfig>,
    ) -> Result<(), Status> {
        self.service
            .set_forwarding_pipeline_config(
                ORIGIN,
                &SetForwardingPipelineConfigRequest {
                    device_id: NODE,
                    election_id: Some(MASTER_ELECTION_ID.into()),
                    action: action as i32,
                    config,
                },
            )
            .map(|_| ())
    }

    fn get(&self, response_type: ResponseType) -> Result<ForwardingPipelineConfig, Status> {
        self.service
            .get_forwarding_pipeline_config(&GetForwardingPipelineConfigRequest {
                device_id: NODE,
                response_type: response_type as i32,
            })
            .map(|response| response.config.unwrap_or_default())
    }

    fn close(self) {
        self.master.hang_up();
        self.stream
            .join()
            .expect("stream thread")
            .expect("clean close");
        self.service.teardown();
    }
}

fn pipeline(cookie: u64) -> ForwardingPipelineConfig {
    ForwardingPipelineConfig {
        p4info: b"p4info".to_vec(),
        p4_device_config: b"bin".to_vec(),
        cookie: Some(Cookie { cookie }),
    }
}

#[test]
fn verify_and_commit_persists_and_filters_on_get() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("pipeline_cfg.json");
    let fixture = Fixture::new(&path);

    fixture
        .set(Action::VerifyAndCommit, Some(pipeline(5)))
        .expect("commit accepted");
    assert!(fixture.backend.calls().contains(&BackendCall::Push {
        node_id: NODE,
        config: pipeline(5)
    }));
    assert!(path.exists());

    assert_eq!(fixture.get(ResponseType::All).expect("stored"), pipeline(5));
    assert_eq!(
        fixture.get(ResponseType::CookieOnly).expect("stored"),
        ForwardingPipelineConfig {
            cookie: Some(Cookie { cookie: 5 }),
            ..Default::default()
        }
    );
    let p4info_only = fixture.get(ResponseType::P4infoAndCookie).expect("stored");
    assert_eq!(p4info_only.p4info, b"p4info".to_vec());
    assert!(p4info_only.p4_device_config.is_empty());
    let device_only = fixture
        .get(ResponseType::DeviceConfigAndCookie)
        .expect("stored");
    assert!(device_only.p4info.is_empty());
    assert_eq!(device_only.p4_device_config, b"bin".to_vec());

    fixture.close();
}

#[test]
fn saved_config_survives_a_restart() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("pipeline_cfg.json");
    let fixture = Fixture::new(&path);
    fixture
        .set(Action::VerifyAndSave, Some(pipeline(9)))
        .expect("save accepted");
    assert!(fixture.backend.calls().contains(&BackendCall::Save {
        node_id: NODE,
        config: pipeline(9)
    }));
    fixture.close();

    let restarted = Fixture::new(&path);
    assert_eq!(restarted.get(ResponseType::All).expect("reloaded"), pipeline(9));
    restarted.close();
}

#[test]
fn reboot_required_still_persists() {
    let dir = tempfile::tempdir().expect("temp dir");
    let fixture = Fixture::new(&dir.path().join("pipeline_cfg.json"));
    fixture.backend.fail_next_pipeline_call(Status::fail_with_code(
        ErrorCode::RebootRequired,
        "reboot to apply",
    ));

    fixture
        .set(Action::VerifyAndCommit, Some(pipeline(3)))
        .expect("reboot-required is accepted");
    assert_eq!(fixture.get(ResponseType::All).expect("stored"), pipeline(3));
    fixture.close();
}

#[test]
fn backend_failure_keeps_previous_config() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("pipeline_cfg.json");
    let fixture = Fixture::new(&path);
    fixture
        .set(Action::VerifyAndCommit, Some(pipeline(1)))
        .expect("first commit");

    fixture
        .backend
        .fail_next_pipeline_call(Status::fail_with_code(ErrorCode::HardwareError, "asic"));
    let err = fixture
        .set(Action::VerifyAndCommit, Some(pipeline(2)))
        .unwrap_err();
    assert_eq!(err.code(), Code::Internal);
    assert_eq!(fixture.get(ResponseType::All).expect("stored"), pipeline(1));
    fixture.close();
}

#[test]
fn get_before_any_push_is_failed_precondition() {
    let dir = tempfile::tempdir().expect("temp dir");
    let fixture = Fixture::new(&dir.path().join("pipeline_cfg.json"));

    let err = fixture.get(ResponseType::All).unwrap_err();
    assert_eq!(err.code(), Code::FailedPrecondition);
    fixture.close();
}

#[test]
fn verify_and_commit_only_actions_touch_nothing_stored() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("pipeline_cfg.json");
    let fixture = Fixture::new(&path);

    fixture.set(Action::Verify, Some(pipeline(1))).expect("verify");
    fixture.set(Action::Commit, None).expect("commit");
    let calls = fixture.backend.calls();
    assert!(calls.contains(&BackendCall::Verify { node_id: NODE }));
    assert!(calls.contains(&BackendCall::Commit { node_id: NODE }));
    assert!(!path.exists());

    let err = fixture
        .set(Action::ReconcileAndCommit, Some(pipeline(1)))
        .unwrap_err();
    assert_eq!(err.code(), Code::Unimplemented);
    let err = fixture.set(Action::Unspecified, None).unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
    fixture.close();
}

#[test]
fn non_master_cannot_set_pipeline() {
    let dir = tempfile::tempdir().expect("temp dir");
    let fixture = Fixture::new(&dir.path().join("pipeline_cfg.json"));

    let err = fixture
        .service
        .set_forwarding_pipeline_config(
            ORIGIN,
            &SetForwardingPipelineConfigRequest {
                device_id: NODE,
                election_id: Some((MASTER_ELECTION_ID - 1).into()),
                action: Action::VerifyAndCommit as i32,
                config: Some(pipeline(1)),
            },
        )
        .unwrap_err();
    assert_eq!(err.code(), Code::PermissionDenied);
    assert_eq!(
        err.message(),
        "SetForwardingPipelineConfig from non-master is not permitted for node 1."
    );
    fixture.close();
}

struct CollectingSink(Mutex<Vec<ReadResponse>>);

impl WriterSink<ReadResponse> for CollectingSink {
    fn write(&self, msg: &ReadResponse) -> bool {
        self.0.lock().push(msg.clone());
        true
    }
}

#[test]
fn reads_stream_backend_entities_from_any_controller() {
    let dir = tempfile::tempdir().expect("temp dir");
    let fixture = Fixture::new(&dir.path().join("pipeline_cfg.json"));
    let entities = ReadResponse {
        entities: vec![b"entry".to_vec()],
    };
    fixture.backend.set_read_responses(vec![entities.clone()]);

    let sink = CollectingSink(Mutex::new(Vec::new()));
    fixture
        .service
        .read(
            &ReadRequest {
                device_id: NODE,
                entities: vec![Vec::new()],
            },
            &sink,
        )
        .expect("read");
    assert_eq!(*sink.0.lock(), vec![entities]);

    let err = fixture
        .service
        .read(
            &ReadRequest {
                device_id: 0,
                entities: vec![Vec::new()],
            },
            &sink,
        )
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
    fixture.close();
}
