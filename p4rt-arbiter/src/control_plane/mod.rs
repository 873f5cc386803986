//! Control-plane layer.
//!
//! Owns controller sessions, connection-id allocation and the per-node
//! mastership state machine. Mastership is derived from the ordering of each
//! node's sessions and is never stored separately.

pub(crate) mod arbitration;
pub(crate) mod connection_ids;
pub(crate) mod controller;
pub(crate) mod notification;
