//! Forwarding-pipeline configuration storage.

pub(crate) mod config_store;
