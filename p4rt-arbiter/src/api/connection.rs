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

//! Transport seam for the bidirectional stream RPC.

use crate::proto::p4runtime::{StreamMessageRequest, StreamMessageResponse};

/// One live bidirectional stream with a controller, as handed to the service
/// by whatever RPC transport hosts it.
///
/// Implementations must tolerate concurrent `write` calls from the stream's
/// own loop, the mastership broadcaster and the node's response receiver.
pub trait StreamChannelConnection: Send + Sync {
    /// Peer address, used as the controller's origin.
    fn peer(&self) -> String;

    /// Blocks for the next inbound message. `None` ends the stream.
    fn read(&self) -> Option<StreamMessageRequest>;

    /// Returns `false` if the message could not be handed to the transport.
    fn write(&self, response: &StreamMessageResponse) -> bool;
}
