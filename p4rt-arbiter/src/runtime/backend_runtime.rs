//! Bridge from blocking threads into async backend calls.

use lazy_static::lazy_static;
use std::future::Future;
use std::panic;
use std::thread;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use tokio::task;

const THREAD_NUM: usize = 4;

lazy_static! {
    static ref BACKEND_RUNTIME: Runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(THREAD_NUM)
        .thread_name("p4rt-backend")
        .enable_all()
        .build()
        .expect("Unable to create backend runtime");
}

/// Runs `future` to completion on the backend runtime, blocking the calling
/// thread. Safe to call from plain threads and from inside another runtime.
pub(crate) fn block_on_backend<F>(future: F) -> F::Output
where
    F: Future + Send,
    F::Output: Send,
{
    match Handle::try_current() {
        Err(_) => BACKEND_RUNTIME.block_on(future),
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            task::block_in_place(|| BACKEND_RUNTIME.block_on(future))
        }
        // A current-thread runtime cannot give up its worker, so hop to a
        // scoped thread that is outside any runtime context.
        Ok(_) => thread::scope(|scope| {
            scope
                .spawn(|| BACKEND_RUNTIME.block_on(future))
                .join()
                .unwrap_or_else(|payload| panic::resume_unwind(payload))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::block_on_backend;

    #[test]
    fn drives_future_from_plain_thread() {
        assert_eq!(block_on_backend(async { 40 + 2 }), 42);
    }

    #[tokio::test]
    async fn drives_future_from_current_thread_runtime() {
        assert_eq!(block_on_backend(async { "done" }), "done");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn drives_future_from_multi_thread_runtime() {
        assert_eq!(block_on_backend(async { 7u8 }), 7);
    }
}
