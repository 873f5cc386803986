//! Data-plane layer.
//!
//! Moves messages between controllers and the backend: writer sinks, the
//! per-node response channels with their receiver threads, and the protocol
//! loop of each controller stream.

pub(crate) mod response_paths;
pub(crate) mod response_receiver;
pub(crate) mod stream_coordinator;
pub(crate) mod writer;
