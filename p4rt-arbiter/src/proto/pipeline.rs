//! Persisted pipeline configurations for every node.

use crate::proto::p4runtime::ForwardingPipelineConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardingPipelineConfigs {
    #[prost(btree_map = "uint64, message", tag = "1")]
    pub node_id_to_config: BTreeMap<u64, ForwardingPipelineConfig>,
}
