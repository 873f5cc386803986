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

//! Wire messages.
//!
//! Only the part of `p4.v1` the arbiter touches is declared here, by hand, with
//! the upstream field tags so the encodings stay interchangeable with a
//! generated client. Table entities and P4Info blobs are carried as opaque
//! serialized bytes: the arbiter never looks inside them.

pub mod p4runtime;
pub mod pipeline;
pub mod rpc;
