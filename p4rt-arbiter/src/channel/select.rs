//! Waiting on several channels at once.

use crate::channel::deadline_after;
use crate::status::{ErrorCode, Status};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

/// A channel that can take part in [`select`].
pub trait Selectable: Send + Sync {
    fn is_closed(&self) -> bool;

    /// Marks `index` ready right away if messages are queued, otherwise parks
    /// the registration until the next write or close. No-op once closed.
    #[doc(hidden)]
    fn select_register(&self, select_data: &Arc<SelectData>, index: usize);
}

struct SelectState {
    done: bool,
    ready: Vec<bool>,
    // Bumped on every resolution, including closes, so a waiter can tell it
    // missed a wakeup between its closure check and going to sleep.
    generation: u64,
}

/// Wait descriptor shared by one [`select`] call and every channel it is
/// registered with.
pub struct SelectData {
    state: Mutex<SelectState>,
    cond: Condvar,
}

impl SelectData {
    fn new(channels: usize) -> Self {
        Self {
            state: Mutex::new(SelectState {
                done: false,
                ready: vec![false; channels],
                generation: 0,
            }),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        self.state.lock().done
    }

    pub(crate) fn mark_ready(&self, index: usize) {
        self.resolve(index, true);
    }

    fn resolve(&self, index: usize, ready: bool) {
        let mut state = self.state.lock();
        if let Some(flag) = state.ready.get_mut(index) {
            *flag = ready;
        }
        state.done |= ready;
        state.generation += 1;
        self.cond.notify_one();
    }
}

/// A parked registration held in a channel's select list.
pub(crate) struct SelectRegistration {
    select_data: Arc<SelectData>,
    index: usize,
}

impl SelectRegistration {
    pub(crate) fn new(select_data: Arc<SelectData>, index: usize) -> Self {
        Self { select_data, index }
    }

    pub(crate) fn resolve(self, ready: bool) {
        self.select_data.resolve(self.index, ready);
    }

    /// False once the owning [`select`] call has returned.
    pub(crate) fn is_live(&self) -> bool {
        !self.select_data.is_done()
    }
}

/// Marks the descriptor done when [`select`] returns, whatever the outcome.
struct Retire<'a>(&'a SelectData);

impl Drop for Retire<'_> {
    fn drop(&mut self) {
        self.0.state.lock().done = true;
    }
}

/// Ready flags of a finished [`select`], in the order the channels were given.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectResult {
    ready: Vec<bool>,
}

impl SelectResult {
    pub fn is_ready(&self, index: usize) -> bool {
        self.ready.get(index).copied().unwrap_or(false)
    }

    pub fn ready_flags(&self) -> &[bool] {
        &self.ready
    }
}

/// Blocks until at least one of `channels` has a message queued, every one of
/// them is closed, or `timeout` elapses.
///
/// Fails with a cancelled status when all channels are closed and none is
/// ready, and with an entry-not-found status on timeout. The channels must
/// stay alive for the duration of the call, which the borrow guarantees.
pub fn select(channels: &[&dyn Selectable], timeout: Duration) -> Result<SelectResult, Status> {
    let select_data = Arc::new(SelectData::new(channels.len()));
    for (index, channel) in channels.iter().enumerate() {
        channel.select_register(&select_data, index);
    }
    let _retire = Retire(&select_data);

    let deadline = deadline_after(timeout);
    loop {
        let generation = {
            let state = select_data.state.lock();
            if state.done {
                return Ok(SelectResult {
                    ready: state.ready.clone(),
                });
            }
            state.generation
        };

        // Channel locks are taken outside the select lock; channels take the
        // two in the opposite order.
        if channels.iter().all(|channel| channel.is_closed()) {
            return Err(Status::fail_with_code(
                ErrorCode::Cancelled,
                "All selected Channels are closed.",
            ));
        }

        let mut state = select_data.state.lock();
        if state.done || state.generation != generation {
            continue;
        }
        match deadline {
            Some(deadline) => {
                let expired = select_data
                    .cond
                    .wait_until(&mut state, deadline)
                    .timed_out();
                if expired && !state.done {
                    return Err(Status::fail_with_code(
                        ErrorCode::EntryNotFound,
                        "Select did not succeed within timeout.",
                    ));
                }
            }
            None => select_data.cond.wait(&mut state),
        }
    }
}
