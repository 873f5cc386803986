//! Event-name constants.

pub const CONNECTION_ID_ALLOCATED: &str = "connection_id_allocated";
pub const CONNECTION_ID_EXHAUSTED: &str = "connection_id_exhausted";
pub const CONTROLLER_CONNECTED: &str = "controller_connected";
pub const CONTROLLER_REJECTED: &str = "controller_rejected";
pub const CONTROLLER_DISCONNECTED: &str = "controller_disconnected";
pub const MASTER_CHANGED: &str = "master_changed";
pub const NODE_ORPHANED: &str = "node_orphaned";
pub const NOTIFICATION_FAILED: &str = "notification_failed";

pub const RECEIVER_STARTED: &str = "response_receiver_started";
pub const RECEIVER_STOPPED: &str = "response_receiver_stopped";
pub const RECEIVER_SPAWN_FAILED: &str = "response_receiver_spawn_failed";
pub const RESPONSE_FORWARDED: &str = "response_forwarded";
pub const RESPONSE_DROPPED: &str = "response_dropped";

pub const STREAM_OPENED: &str = "stream_opened";
pub const STREAM_CLOSED: &str = "stream_closed";
pub const STREAM_PROTOCOL_ERROR: &str = "stream_protocol_error";
pub const DATA_PLANE_REJECTED: &str = "data_plane_rejected";

pub const WRITE_REJECTED: &str = "write_rejected";
pub const PIPELINE_CONFIG_SAVED: &str = "pipeline_config_saved";
pub const PIPELINE_CONFIG_LOADED: &str = "pipeline_config_loaded";
pub const TEARDOWN: &str = "teardown";
