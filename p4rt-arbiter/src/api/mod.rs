//! API facade layer.
//!
//! The RPC surface a transport binds to: one [`service::P4RuntimeService`]
//! per process, and one [`connection::StreamChannelConnection`] per open
//! controller stream.
//!
//! ```
//! use p4rt_arbiter::{NoopBackend, P4RuntimeConfig, P4RuntimeService};
//! use std::sync::Arc;
//!
//! let service = P4RuntimeService::new(P4RuntimeConfig::default(), Arc::new(NoopBackend));
//! assert_eq!(service.capabilities().p4runtime_api_version, "1.3.0");
//! service.teardown();
//! ```

pub mod connection;
pub mod service;
