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

//! Stable event names and field formatters shared by every `tracing` call site.
//!
//! Lifecycle events are emitted as `event = events::X` plus `component`,
//! `node_id`, `connection_id` and `election_id` fields so log scrapers can key
//! on them without parsing messages.

pub mod events;
pub mod fields;
