//! Runtime helper for spawning dedicated worker threads.

use std::io;
use std::thread::{self, JoinHandle};

/// Spawns a named OS thread running `body`. Spawn failures are returned to
/// the caller rather than panicking.
pub(crate) fn spawn_worker<F>(name: String, body: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new().name(name).spawn(body)
}
