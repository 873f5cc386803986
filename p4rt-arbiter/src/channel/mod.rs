/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Bounded, closable FIFO channel shared between producer and consumer threads.
//!
//! A [`Channel`] is created behind an `Arc` and handed out through the narrowed
//! [`ChannelReader`] / [`ChannelWriter`] views. Every blocking call takes an
//! explicit timeout; [`INFINITE`] blocks until the operation succeeds or the
//! channel is closed. Closing is the only cancellation primitive: it is
//! permanent and wakes every blocked reader, writer and [`select`]or.
//!
//! ```
//! use p4rt_arbiter::channel::{Channel, ChannelReader, ChannelWriter, INFINITE};
//!
//! let channel = Channel::<u32>::create(4);
//! let writer = ChannelWriter::create(&channel).unwrap();
//! let reader = ChannelReader::create(&channel).unwrap();
//!
//! writer.write(1, INFINITE).unwrap();
//! writer.try_write(2).unwrap();
//! assert_eq!(reader.read(INFINITE).unwrap(), 1);
//! assert_eq!(reader.read_all().unwrap(), vec![2]);
//!
//! assert!(channel.close());
//! assert!(reader.try_read().unwrap_err().is_cancelled());
//! ```

mod endpoints;
mod select;

pub use endpoints::{ChannelReader, ChannelWriter};
pub use select::{select, SelectData, SelectResult, Selectable};

use crate::status::{ErrorCode, Status};
use parking_lot::{Condvar, Mutex, MutexGuard};
use select::SelectRegistration;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Timeout that never expires.
pub const INFINITE: Duration = Duration::MAX;

/// `None` when the timeout is too large to be represented, i.e. infinite.
pub(crate) fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

fn channel_closed() -> Status {
    Status::fail_with_code(ErrorCode::Cancelled, "Channel is closed.")
}

struct ChannelState<T> {
    queue: VecDeque<T>,
    closed: bool,
    select_list: Vec<SelectRegistration>,
}

pub struct Channel<T> {
    state: Mutex<ChannelState<T>>,
    max_depth: usize,
    // Readers waiting on an empty queue.
    cond_not_empty: Condvar,
    // Writers waiting on a full queue.
    cond_not_full: Condvar,
}

impl<T> Channel<T> {
    /// Creates a shared channel holding at most `max_depth` messages. A depth
    /// of zero is legal: every write then blocks until its timeout.
    pub fn create(max_depth: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ChannelState {
                queue: VecDeque::with_capacity(max_depth.min(1024)),
                closed: false,
                select_list: Vec::new(),
            }),
            max_depth,
            cond_not_empty: Condvar::new(),
            cond_not_full: Condvar::new(),
        })
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Closes the channel. Returns false if it was already closed.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        self.cond_not_full.notify_all();
        self.cond_not_empty.notify_all();
        Self::clear_select_list(&mut state, false);
        true
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Enqueues `t`, blocking up to `timeout` while the queue is full.
    pub fn write(&self, t: T, timeout: Duration) -> Result<(), Status> {
        let mut state = self.state.lock();
        self.check_write_state_and_block(&mut state, timeout)?;
        self.enqueue(&mut state, t);
        Ok(())
    }

    /// Enqueues `t` or fails immediately with a no-resource error if full.
    pub fn try_write(&self, t: T) -> Result<(), Status> {
        let mut state = self.state.lock();
        self.check_write_state(&state)?;
        self.enqueue(&mut state, t);
        Ok(())
    }

    /// Dequeues the oldest message, blocking up to `timeout` while empty.
    ///
    /// Closure wins over buffered data: once the channel is closed this fails
    /// even if messages remain queued.
    pub fn read(&self, timeout: Duration) -> Result<T, Status> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(channel_closed());
        }
        let deadline = deadline_after(timeout);
        while state.queue.is_empty() {
            let expired = self.wait(&self.cond_not_empty, &mut state, deadline);
            if state.closed {
                return Err(channel_closed());
            }
            if expired && state.queue.is_empty() {
                return Err(Status::fail_with_code(
                    ErrorCode::EntryNotFound,
                    "Read did not succeed within timeout due to empty Channel.",
                ));
            }
        }
        self.dequeue(&mut state)
    }

    pub fn try_read(&self) -> Result<T, Status> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(channel_closed());
        }
        if state.queue.is_empty() {
            return Err(Status::fail_with_code(
                ErrorCode::EntryNotFound,
                "Channel is empty.",
            ));
        }
        self.dequeue(&mut state)
    }

    /// Drains every queued message in FIFO order. An open but empty channel
    /// yields an empty vector; a closed channel is left untouched.
    pub fn read_all(&self) -> Result<Vec<T>, Status> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(channel_closed());
        }
        let drained: Vec<T> = state.queue.drain(..).collect();
        self.cond_not_full.notify_all();
        Ok(drained)
    }

    fn enqueue(&self, state: &mut MutexGuard<'_, ChannelState<T>>, t: T) {
        state.queue.push_back(t);
        self.cond_not_empty.notify_one();
        Self::clear_select_list(state, true);
    }

    fn dequeue(&self, state: &mut MutexGuard<'_, ChannelState<T>>) -> Result<T, Status> {
        let Some(t) = state.queue.pop_front() else {
            return Err(Status::fail_with_code(
                ErrorCode::Internal,
                "Channel queue emptied while its lock was held.",
            ));
        };
        self.cond_not_full.notify_one();
        Ok(t)
    }

    /// Returns true if the deadline passed. Spurious wakeups are left to the
    /// caller's predicate loop.
    fn wait(
        &self,
        cond: &Condvar,
        state: &mut MutexGuard<'_, ChannelState<T>>,
        deadline: Option<Instant>,
    ) -> bool {
        match deadline {
            Some(deadline) => cond.wait_until(state, deadline).timed_out(),
            None => {
                cond.wait(state);
                false
            }
        }
    }

    fn check_write_state_and_block(
        &self,
        state: &mut MutexGuard<'_, ChannelState<T>>,
        timeout: Duration,
    ) -> Result<(), Status> {
        if state.closed {
            return Err(channel_closed());
        }
        let deadline = deadline_after(timeout);
        while state.queue.len() == self.max_depth {
            let expired = self.wait(&self.cond_not_full, state, deadline);
            if state.closed {
                return Err(channel_closed());
            }
            if expired && state.queue.len() == self.max_depth {
                return Err(Status::fail_with_code(
                    ErrorCode::NoResource,
                    "Write did not succeed within timeout due to full Channel.",
                ));
            }
        }
        self.check_depth(state)
    }

    fn check_write_state(&self, state: &ChannelState<T>) -> Result<(), Status> {
        if state.closed {
            return Err(channel_closed());
        }
        if state.queue.len() == self.max_depth {
            return Err(Status::fail_with_code(
                ErrorCode::NoResource,
                "Channel is full.",
            ));
        }
        self.check_depth(state)
    }

    fn check_depth(&self, state: &ChannelState<T>) -> Result<(), Status> {
        if state.queue.len() > self.max_depth {
            return Err(Status::fail_with_code(
                ErrorCode::Internal,
                format!(
                    "Channel load {} exceeds max queue depth {}.",
                    state.queue.len(),
                    self.max_depth
                ),
            ));
        }
        Ok(())
    }

    fn clear_select_list(state: &mut ChannelState<T>, ready: bool) {
        for registration in state.select_list.drain(..) {
            registration.resolve(ready);
        }
    }
}

impl<T: Send> Selectable for Channel<T> {
    fn is_closed(&self) -> bool {
        Channel::is_closed(self)
    }

    fn select_register(&self, select_data: &Arc<SelectData>, index: usize) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        // Registrations of selects that already returned are dropped here.
        state.select_list.retain(SelectRegistration::is_live);
        if state.queue.is_empty() {
            if !select_data.is_done() {
                state
                    .select_list
                    .push(SelectRegistration::new(select_data.clone(), index));
            }
        } else {
            select_data.mark_ready(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Channel, INFINITE};
    use crate::channel::select;
    use crate::status::ErrorCode;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn read_preserves_write_order() {
        let channel = Channel::create(8);
        for value in 0..8 {
            channel.write(value, INFINITE).expect("space available");
        }

        let read: Vec<i32> = (0..8)
            .map(|_| channel.read(INFINITE).expect("message available"))
            .collect();
        assert_eq!(read, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn try_write_on_full_channel_fails_immediately() {
        let channel = Channel::create(1);
        channel.try_write("first").expect("space available");

        let err = channel.try_write("second").unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::NoResource);
    }

    #[test]
    fn zero_depth_channel_rejects_every_write() {
        let channel = Channel::create(0);

        let err = channel.try_write(1u8).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::NoResource);
        let err = channel.write(1u8, Duration::from_millis(5)).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::NoResource);
    }

    #[test]
    fn write_times_out_while_full() {
        let channel = Channel::create(1);
        channel.write(1u8, INFINITE).expect("space available");

        let started = Instant::now();
        let err = channel.write(2u8, Duration::from_millis(20)).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::NoResource);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn blocked_write_resumes_after_read() {
        let channel = Channel::create(1);
        channel.write(1u8, INFINITE).expect("space available");

        let writer = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || channel.write(2u8, INFINITE))
        };
        thread::sleep(Duration::from_millis(20));
        assert_eq!(channel.read(INFINITE).expect("first message"), 1);

        writer.join().expect("writer thread").expect("write unblocked");
        assert_eq!(channel.read(INFINITE).expect("second message"), 2);
    }

    #[test]
    fn read_times_out_on_empty_channel() {
        let channel = Channel::<u8>::create(1);

        let err = channel.read(Duration::from_millis(10)).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::EntryNotFound);
        let err = channel.try_read().unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::EntryNotFound);
    }

    #[test]
    fn close_is_idempotent_and_cancels_everything() {
        let channel = Channel::create(2);
        channel.write(1u8, INFINITE).expect("space available");

        assert!(channel.close());
        assert!(!channel.close());
        assert!(channel.is_closed());

        assert!(channel.read(INFINITE).unwrap_err().is_cancelled());
        assert!(channel.try_read().unwrap_err().is_cancelled());
        assert!(channel.write(2, INFINITE).unwrap_err().is_cancelled());
        assert!(channel.try_write(2).unwrap_err().is_cancelled());
    }

    #[test]
    fn close_wakes_blocked_reader_and_writer() {
        let empty = Channel::<u8>::create(1);
        let full = Channel::create(1);
        full.write(0u8, INFINITE).expect("space available");

        let reader = {
            let empty = Arc::clone(&empty);
            thread::spawn(move || empty.read(INFINITE))
        };
        let writer = {
            let full = Arc::clone(&full);
            thread::spawn(move || full.write(1u8, INFINITE))
        };
        thread::sleep(Duration::from_millis(20));
        empty.close();
        full.close();

        assert!(reader.join().expect("reader thread").unwrap_err().is_cancelled());
        assert!(writer.join().expect("writer thread").unwrap_err().is_cancelled());
    }

    #[test]
    fn read_all_drains_open_channel_in_order() {
        let channel = Channel::create(4);
        assert!(channel.read_all().expect("open channel").is_empty());

        for value in [3, 1, 2] {
            channel.try_write(value).expect("space available");
        }
        assert_eq!(channel.read_all().expect("open channel"), vec![3, 1, 2]);
        assert!(channel.try_read().is_err());
    }

    #[test]
    fn read_all_on_closed_channel_leaves_queue_alone() {
        let channel = Channel::create(4);
        channel.try_write(1u8).expect("space available");
        channel.close();

        assert!(channel.read_all().unwrap_err().is_cancelled());
        assert_eq!(channel.state.lock().queue.len(), 1);
    }

    #[test]
    fn finished_selects_do_not_pile_up_on_an_idle_channel() {
        let idle = Channel::<u8>::create(1);
        let busy = Channel::<u8>::create(1);

        for _ in 0..16 {
            let err = select(&[&*idle], Duration::from_millis(1)).unwrap_err();
            assert_eq!(err.error_code(), ErrorCode::EntryNotFound);
        }
        assert!(idle.state.lock().select_list.len() <= 1);

        for _ in 0..16 {
            busy.try_write(1).expect("space available");
            let result = select(&[&*idle, &*busy], INFINITE).expect("busy channel ready");
            assert!(result.is_ready(1));
            busy.try_read().expect("queued value");
        }
        assert!(idle.state.lock().select_list.len() <= 1);
    }
}
