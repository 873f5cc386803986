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

//! Southbound seam to the switch-programming backend.
//!
//! The service only needs the backend's success/failure contract. Calls may
//! complete asynchronously; the blocking stream threads drive them through
//! the shared backend runtime.

use crate::data_plane::writer::WriterSink;
use crate::proto::p4runtime::{
    ForwardingPipelineConfig, ReadRequest, ReadResponse, StreamMessageRequest,
    StreamMessageResponse, WriteRequest,
};
use crate::status::Status;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait ForwardingBackend: Send + Sync {
    /// Applies forwarding-state updates from the master controller.
    async fn write(&self, request: &WriteRequest) -> Result<(), Status>;

    /// Streams every matching entity into `sink`.
    async fn read(
        &self,
        request: &ReadRequest,
        sink: &dyn WriterSink<ReadResponse>,
    ) -> Result<(), Status>;

    async fn verify_pipeline_config(
        &self,
        node_id: u64,
        config: &ForwardingPipelineConfig,
    ) -> Result<(), Status>;

    /// Verifies and applies the config right away.
    async fn push_pipeline_config(
        &self,
        node_id: u64,
        config: &ForwardingPipelineConfig,
    ) -> Result<(), Status>;

    /// Verifies and stages the config for a later commit.
    async fn save_pipeline_config(
        &self,
        node_id: u64,
        config: &ForwardingPipelineConfig,
    ) -> Result<(), Status>;

    async fn commit_pipeline_config(&self, node_id: u64) -> Result<(), Status>;

    /// Packet-out or digest-ack from the node's master.
    async fn handle_stream_message(
        &self,
        node_id: u64,
        request: &StreamMessageRequest,
    ) -> Result<(), Status>;

    /// Gives the backend the sink it posts packet-ins and digests for
    /// `node_id` into.
    async fn register_response_writer(
        &self,
        node_id: u64,
        writer: Arc<dyn WriterSink<StreamMessageResponse>>,
    ) -> Result<(), Status>;

    async fn unregister_response_writer(&self, node_id: u64) -> Result<(), Status>;
}

/// Backend that accepts every operation and produces nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopBackend;

#[async_trait]
impl ForwardingBackend for NoopBackend {
    async fn write(&self, _request: &WriteRequest) -> Result<(), Status> {
        Ok(())
    }

    async fn read(
        &self,
        _request: &ReadRequest,
        _sink: &dyn WriterSink<ReadResponse>,
    ) -> Result<(), Status> {
        Ok(())
    }

    async fn verify_pipeline_config(
        &self,
        _node_id: u64,
        _config: &ForwardingPipelineConfig,
    ) -> Result<(), Status> {
        Ok(())
    }

    async fn push_pipeline_config(
        &self,
        _node_id: u64,
        _config: &ForwardingPipelineConfig,
    ) -> Result<(), Status> {
        Ok(())
    }

    async fn save_pipeline_config(
        &self,
        _node_id: u64,
        _config: &ForwardingPipelineConfig,
    ) -> Result<(), Status> {
        Ok(())
    }

    async fn commit_pipeline_config(&self, _node_id: u64) -> Result<(), Status> {
        Ok(())
    }

    async fn handle_stream_message(
        &self,
        _node_id: u64,
        _request: &StreamMessageRequest,
    ) -> Result<(), Status> {
        Ok(())
    }

    async fn register_response_writer(
        &self,
        _node_id: u64,
        _writer: Arc<dyn WriterSink<StreamMessageResponse>>,
    ) -> Result<(), Status> {
        Ok(())
    }

    async fn unregister_response_writer(&self, _node_id: u64) -> Result<(), Status> {
        Ok(())
    }
}
