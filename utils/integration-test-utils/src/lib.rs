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

//! Helpers shared by the `p4rt-arbiter` integration tests: a scripted
//! controller stream, a backend that records what it is asked to do, and
//! one-time logging setup.

use async_trait::async_trait;
use p4rt_arbiter::channel::{Channel, INFINITE};
use p4rt_arbiter::proto::p4runtime::{
    election_id_of, stream_message_response::Update, ForwardingPipelineConfig, ReadRequest,
    ReadResponse, StreamMessageRequest, StreamMessageResponse, WriteRequest,
};
use p4rt_arbiter::{
    ErrorCode, ForwardingBackend, P4RuntimeService, Status, StreamChannelConnection, WriterSink,
};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Installs a test-writer `fmt` subscriber honoring `RUST_LOG`, once per
/// process.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Controller stream driven by the test. Requests pushed with [`Self::send`]
/// are handed to the service in order; [`Self::hang_up`] ends the stream
/// after everything sent before it.
pub struct ScriptedConnection {
    peer: String,
    inbound: Arc<Channel<Option<StreamMessageRequest>>>,
    outbound: Mutex<Vec<StreamMessageResponse>>,
    outbound_grew: Condvar,
    broken: AtomicBool,
}

impl ScriptedConnection {
    pub fn new(peer: &str) -> Arc<Self> {
        Arc::new(Self {
            peer: peer.to_string(),
            inbound: Channel::create(64),
            outbound: Mutex::new(Vec::new()),
            outbound_grew: Condvar::new(),
            broken: AtomicBool::new(false),
        })
    }

    pub fn send(&self, request: StreamMessageRequest) {
        self.inbound
            .write(Some(request), INFINITE)
            .expect("scripted stream still open");
    }

    pub fn hang_up(&self) {
        // Closing outright would drop requests the service has not read yet.
        let _ = self.inbound.write(None, INFINITE);
    }

    /// Makes every later outbound write fail.
    pub fn break_outbound(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub fn responses(&self) -> Vec<StreamMessageResponse> {
        self.outbound.lock().clone()
    }

    /// Waits until at least `count` responses were written.
    pub fn wait_for_responses(
        &self,
        count: usize,
        timeout: Duration,
    ) -> Vec<StreamMessageResponse> {
        let deadline = Instant::now() + timeout;
        let mut outbound = self.outbound.lock();
        while outbound.len() < count {
            if self
                .outbound_grew
                .wait_until(&mut outbound, deadline)
                .timed_out()
            {
                break;
            }
        }
        outbound.clone()
    }

    /// `(master election id, status code)` of every arbitration notice
    /// written so far.
    pub fn arbitration_notices(&self) -> Vec<(u128, i32)> {
        self.outbound
            .lock()
            .iter()
            .filter_map(|response| match &response.update {
                Some(Update::Arbitration(update)) => Some((
                    election_id_of(update.election_id.as_ref()),
                    update.status.as_ref().map(|s| s.code).unwrap_or_default(),
                )),
                _ => None,
            })
            .collect()
    }
}

impl StreamChannelConnection for ScriptedConnection {
    fn peer(&self) -> String {
        self.peer.clone()
    }

    fn read(&self) -> Option<StreamMessageRequest> {
        match self.inbound.read(INFINITE) {
            Ok(Some(request)) => Some(request),
            Ok(None) => {
                self.inbound.close();
                None
            }
            Err(_) => None,
        }
    }

    fn write(&self, response: &StreamMessageResponse) -> bool {
        if self.broken.load(Ordering::SeqCst) {
            return false;
        }
        self.outbound.lock().push(response.clone());
        self.outbound_grew.notify_all();
        true
    }
}

/// Runs `service.stream_channel` for `connection` on its own thread, the
/// way a transport would.
pub fn spawn_stream(
    service: &Arc<P4RuntimeService>,
    connection: &Arc<ScriptedConnection>,
) -> JoinHandle<Result<(), Status>> {
    let service = Arc::clone(service);
    let connection: Arc<dyn StreamChannelConnection> = connection.clone();
    thread::spawn(move || service.stream_channel(connection))
}

/// One call observed by [`RecordingBackend`].
#[derive(Clone, Debug, PartialEq)]
pub enum BackendCall {
    Write { device_id: u64, updates: usize },
    Read { device_id: u64 },
    Verify { node_id: u64 },
    Push { node_id: u64, config: ForwardingPipelineConfig },
    Save { node_id: u64, config: ForwardingPipelineConfig },
    Commit { node_id: u64 },
    StreamMessage { node_id: u64, request: StreamMessageRequest },
    RegisterWriter { node_id: u64 },
    UnregisterWriter { node_id: u64 },
}

/// Backend recording every call. Failures can be scripted per operation.
#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<BackendCall>>,
    writers: Mutex<HashMap<u64, Arc<dyn WriterSink<StreamMessageResponse>>>>,
    read_responses: Mutex<Vec<ReadResponse>>,
    next_pipeline_error: Mutex<Option<Status>>,
    rejected_nodes: Mutex<Vec<u64>>,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    /// The next push or save fails with `status`.
    pub fn fail_next_pipeline_call(&self, status: Status) {
        *self.next_pipeline_error.lock() = Some(status);
    }

    /// Refuses response-writer registration for `node_id`.
    pub fn reject_node(&self, node_id: u64) {
        self.rejected_nodes.lock().push(node_id);
    }

    /// Entities returned by every read.
    pub fn set_read_responses(&self, responses: Vec<ReadResponse>) {
        *self.read_responses.lock() = responses;
    }

    /// Posts `response` as if the switch produced it for `node_id`.
    pub fn post_response(&self, node_id: u64, response: &StreamMessageResponse) -> bool {
        let writer = self.writers.lock().get(&node_id).cloned();
        writer
            .map(|writer| writer.write(response))
            .unwrap_or(false)
    }

    pub fn has_writer(&self, node_id: u64) -> bool {
        self.writers.lock().contains_key(&node_id)
    }

    fn record(&self, call: BackendCall) {
        debug!("RecordingBackend: {call:?}");
        self.calls.lock().push(call);
    }

    fn take_pipeline_error(&self) -> Result<(), Status> {
        match self.next_pipeline_error.lock().take() {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ForwardingBackend for RecordingBackend {
    async fn write(&self, request: &WriteRequest) -> Result<(), Status> {
        self.record(BackendCall::Write {
            device_id: request.device_id,
            updates: request.updates.len(),
        });
        Ok(())
    }

    async fn read(
        &self,
        request: &ReadRequest,
        sink: &dyn WriterSink<ReadResponse>,
    ) -> Result<(), Status> {
        self.record(BackendCall::Read {
            device_id: request.device_id,
        });
        let responses = self.read_responses.lock().clone();
        for response in &responses {
            if !sink.write(response) {
                return Err(Status::fail_with_code(
                    ErrorCode::Internal,
                    "Read response could not be delivered.",
                ));
            }
        }
        Ok(())
    }

    async fn verify_pipeline_config(
        &self,
        node_id: u64,
        _config: &ForwardingPipelineConfig,
    ) -> Result<(), Status> {
        self.record(BackendCall::Verify { node_id });
        Ok(())
    }

    async fn push_pipeline_config(
        &self,
        node_id: u64,
        config: &ForwardingPipelineConfig,
    ) -> Result<(), Status> {
        self.record(BackendCall::Push {
            node_id,
            config: config.clone(),
        });
        self.take_pipeline_error()
    }

    async fn save_pipeline_config(
        &self,
        node_id: u64,
        config: &ForwardingPipelineConfig,
    ) -> Result<(), Status> {
        self.record(BackendCall::Save {
            node_id,
            config: config.clone(),
        });
        self.take_pipeline_error()
    }

    async fn commit_pipeline_config(&self, node_id: u64) -> Result<(), Status> {
        self.record(BackendCall::Commit { node_id });
        Ok(())
    }

    async fn handle_stream_message(
        &self,
        node_id: u64,
        request: &StreamMessageRequest,
    ) -> Result<(), Status> {
        self.record(BackendCall::StreamMessage {
            node_id,
            request: request.clone(),
        });
        Ok(())
    }

    async fn register_response_writer(
        &self,
        node_id: u64,
        writer: Arc<dyn WriterSink<StreamMessageResponse>>,
    ) -> Result<(), Status> {
        if self.rejected_nodes.lock().contains(&node_id) {
            return Err(Status::fail_with_code(
                ErrorCode::InvalidParam,
                format!("Unknown node {node_id}."),
            ));
        }
        self.record(BackendCall::RegisterWriter { node_id });
        self.writers.lock().insert(node_id, writer);
        Ok(())
    }

    async fn unregister_response_writer(&self, node_id: u64) -> Result<(), Status> {
        self.record(BackendCall::UnregisterWriter { node_id });
        self.writers.lock().remove(&node_id);
        Ok(())
    }
}
