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

//! Service configuration.
//!
//! Values are read from a JSON5 document; every field is optional and falls
//! back to the built-in default.
//!
//! ```
//! use p4rt_arbiter::P4RuntimeConfig;
//!
//! let config = P4RuntimeConfig::from_json5_str(
//!     "{ max_num_controllers_per_node: 2, local_url: 'localhost:9559' }",
//! )
//! .unwrap();
//! assert_eq!(config.max_num_controllers_per_node, 2);
//! assert_eq!(config.max_num_controller_connections, 20);
//! ```

use crate::status::{ErrorCode, Status};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_EXTERNAL_URLS: &str = "0.0.0.0:28000,0.0.0.0:9339,0.0.0.0:9559";
pub const DEFAULT_LOCAL_URL: &str = "localhost:28000";
pub const DEFAULT_MAX_NUM_CONTROLLER_CONNECTIONS: usize = 20;
pub const DEFAULT_MAX_NUM_CONTROLLERS_PER_NODE: usize = 5;
pub const DEFAULT_RESPONSE_CHANNEL_CAPACITY: usize = 128;
pub const DEFAULT_FORWARDING_PIPELINE_CONFIGS_FILE: &str = "/var/run/p4server/pipeline_cfg.json";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct P4RuntimeConfig {
    /// Comma separated listen addresses for remote controllers.
    pub external_urls: String,
    /// Listen address reserved for local clients.
    pub local_url: String,
    pub keepalive_time_ms: u64,
    pub keepalive_timeout_ms: u64,
    pub keepalive_min_ping_interval_ms: u64,
    pub keepalive_permit_without_calls: bool,
    /// Zero leaves the transport default in place.
    pub max_recv_msg_size: usize,
    pub max_send_msg_size: usize,
    pub max_num_controller_connections: usize,
    pub max_num_controllers_per_node: usize,
    /// Depth of the per-node queue carrying backend responses to the master.
    pub response_channel_capacity: usize,
    pub forwarding_pipeline_configs_file: PathBuf,
}

impl Default for P4RuntimeConfig {
    fn default() -> Self {
        Self {
            external_urls: DEFAULT_EXTERNAL_URLS.to_string(),
            local_url: DEFAULT_LOCAL_URL.to_string(),
            keepalive_time_ms: 600_000,
            keepalive_timeout_ms: 20_000,
            keepalive_min_ping_interval_ms: 10_000,
            keepalive_permit_without_calls: true,
            max_recv_msg_size: 256 * 1024 * 1024,
            max_send_msg_size: 0,
            max_num_controller_connections: DEFAULT_MAX_NUM_CONTROLLER_CONNECTIONS,
            max_num_controllers_per_node: DEFAULT_MAX_NUM_CONTROLLERS_PER_NODE,
            response_channel_capacity: DEFAULT_RESPONSE_CHANNEL_CAPACITY,
            forwarding_pipeline_configs_file: PathBuf::from(
                DEFAULT_FORWARDING_PIPELINE_CONFIGS_FILE,
            ),
        }
    }
}

impl P4RuntimeConfig {
    pub fn from_json5_str(text: &str) -> Result<Self, Status> {
        let config: Self = json5::from_str(text).map_err(|e| {
            Status::fail_with_code(
                ErrorCode::InvalidParam,
                format!("Unable to parse configuration: {e}"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json5_file(path: impl AsRef<Path>) -> Result<Self, Status> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Status::fail_with_code(
                ErrorCode::InvalidParam,
                format!("Unable to read configuration {}: {e}", path.display()),
            )
        })?;
        Self::from_json5_str(&text)
    }

    pub fn validate(&self) -> Result<(), Status> {
        if self.max_num_controller_connections == 0 {
            return Err(Status::fail_with_code(
                ErrorCode::InvalidParam,
                "max_num_controller_connections must be positive.",
            ));
        }
        if self.max_num_controllers_per_node == 0 {
            return Err(Status::fail_with_code(
                ErrorCode::InvalidParam,
                "max_num_controllers_per_node must be positive.",
            ));
        }
        Ok(())
    }

    pub fn external_url_list(&self) -> Vec<&str> {
        self.external_urls
            .split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .collect()
    }
}
