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

//! # p4rt-arbiter
//!
//! `p4rt-arbiter` is the controller-facing front end of a P4Runtime switch. It
//! lets several remote controllers program the switch's nodes while making sure
//! only one controller per node, the master, can change forwarding state.
//!
//! Typical usage is centered on [`P4RuntimeService`]: a transport hands every
//! unary RPC to the matching method and runs [`P4RuntimeService::stream_channel`]
//! on a dedicated thread for each bidirectional stream.
//!
//! ```
//! use p4rt_arbiter::{NoopBackend, P4RuntimeConfig, P4RuntimeService};
//! use p4rt_arbiter::proto::p4runtime::{WriteRequest, Update};
//! use std::sync::Arc;
//!
//! let service = P4RuntimeService::new(P4RuntimeConfig::default(), Arc::new(NoopBackend));
//!
//! // Nobody has won arbitration for node 1, so writes are refused.
//! let request = WriteRequest {
//!     device_id: 1,
//!     election_id: Some(7u128.into()),
//!     updates: vec![Update::default()],
//! };
//! let err = service.write("ipv4:10.0.0.1:50000", &request).unwrap_err();
//! assert_eq!(err.message(), "Write from non-master is not permitted.");
//!
//! service.teardown();
//! ```
//!
//! ## Mastership contract
//!
//! - Every stream gets the lowest free connection id, process wide.
//! - The first arbitration message latches the stream's node; the highest
//!   election id on a node is its master.
//! - When mastership moves, every controller of the node is told who the
//!   master is: the master with an OK status, the others with ALREADY_EXISTS.
//! - Packet-outs and digest acks from a non-master are echoed back as in-band
//!   stream errors; arbitration errors end the stream.
//!
//! ## Internal architecture map
//!
//! - Channel: bounded, closable FIFO with multi-channel select
//! - Control plane: controller sessions, connection ids, mastership state
//! - Data plane: writer sinks, per-node response receivers, stream loops
//! - Pipeline: forwarding-pipeline configs with file persistence
//! - Runtime: worker threads and the bridge into the async backend
//! - API facade: [`P4RuntimeService`] and the stream transport seam
//!
//! ## Observability model
//!
//! The crate uses `tracing` for logs/events.
//! Library code emits events and does not initialize a global subscriber.
//! Binaries and tests are responsible for one-time `tracing_subscriber`
//! initialization at process boundaries.

pub mod api;
pub use api::connection::StreamChannelConnection;
pub use api::service::P4RuntimeService;

mod backend;
pub use backend::{ForwardingBackend, NoopBackend};

pub mod channel;

mod config;
pub use config::P4RuntimeConfig;

mod control_plane;
pub use control_plane::arbitration::ArbitrationRegistry;
pub use control_plane::controller::ControllerSession;

mod data_plane;
pub use data_plane::writer::{ChannelWriterSink, StreamWriterSink, WriterSink};

#[doc(hidden)]
pub mod observability;
mod pipeline;
pub mod proto;
mod runtime;

mod status;
pub use status::{ok_rpc_status, Code, ErrorCode, Status};
