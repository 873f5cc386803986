//! Runtime integration layer.
//!
//! Keeps thread spawning and the bridge from blocking stream threads into the
//! async backend in one place, so the rest of the crate stays free of runtime
//! details.

pub(crate) mod backend_runtime;
pub(crate) mod worker_runtime;
