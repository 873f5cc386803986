//! Read-only and write-only views over a shared [`Channel`].

use crate::channel::Channel;
use crate::status::Status;
use std::sync::Arc;
use std::time::Duration;

/// Consumer side of a channel.
pub struct ChannelReader<T> {
    channel: Arc<Channel<T>>,
}

impl<T> ChannelReader<T> {
    /// Returns `None` if the channel is already closed. Later closure is
    /// reported by the individual calls.
    pub fn create(channel: &Arc<Channel<T>>) -> Option<Self> {
        if channel.is_closed() {
            return None;
        }
        Some(Self {
            channel: Arc::clone(channel),
        })
    }

    pub fn read(&self, timeout: Duration) -> Result<T, Status> {
        self.channel.read(timeout)
    }

    pub fn try_read(&self) -> Result<T, Status> {
        self.channel.try_read()
    }

    pub fn read_all(&self) -> Result<Vec<T>, Status> {
        self.channel.read_all()
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }
}

/// Producer side of a channel.
pub struct ChannelWriter<T> {
    channel: Arc<Channel<T>>,
}

impl<T> ChannelWriter<T> {
    /// Returns `None` if the channel is already closed.
    pub fn create(channel: &Arc<Channel<T>>) -> Option<Self> {
        if channel.is_closed() {
            return None;
        }
        Some(Self {
            channel: Arc::clone(channel),
        })
    }

    pub fn write(&self, t: T, timeout: Duration) -> Result<(), Status> {
        self.channel.write(t, timeout)
    }

    pub fn try_write(&self, t: T) -> Result<(), Status> {
        self.channel.try_write(t)
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::{ChannelReader, ChannelWriter};
    use crate::channel::{Channel, INFINITE};

    #[test]
    fn views_cannot_be_created_on_closed_channel() {
        let channel = Channel::<u8>::create(1);
        channel.close();

        assert!(ChannelReader::create(&channel).is_none());
        assert!(ChannelWriter::create(&channel).is_none());
    }

    #[test]
    fn views_observe_closure_after_creation() {
        let channel = Channel::<u8>::create(1);
        let reader = ChannelReader::create(&channel).expect("open channel");
        let writer = ChannelWriter::create(&channel).expect("open channel");

        writer.write(1, INFINITE).expect("space available");
        assert_eq!(reader.try_read().expect("message queued"), 1);

        channel.close();
        assert!(reader.is_closed());
        assert!(writer.is_closed());
        assert!(writer.try_write(2).unwrap_err().is_cancelled());
        assert!(reader.read_all().unwrap_err().is_cancelled());
    }
}
