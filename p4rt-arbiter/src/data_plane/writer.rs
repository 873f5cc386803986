//! Message sinks used for fan-out to internal relays and external streams.

use crate::api::connection::StreamChannelConnection;
use crate::channel::{ChannelWriter, INFINITE};
use crate::proto::p4runtime::StreamMessageResponse;
use std::sync::Arc;
use tracing::{debug, warn};

const CHANNEL_WRITER_SINK_TAG: &str = "ChannelWriterSink:";
const STREAM_WRITER_SINK_TAG: &str = "StreamWriterSink:";
const WRITER_SINK_FN_WRITE_TAG: &str = "write():";

/// Delivers messages of type `T` somewhere. `true` means accepted.
pub trait WriterSink<T>: Send + Sync {
    fn write(&self, msg: &T) -> bool;
}

/// Sink feeding a bounded channel, blocking until there is room.
pub struct ChannelWriterSink<T> {
    writer: ChannelWriter<T>,
}

impl<T> ChannelWriterSink<T> {
    pub fn new(writer: ChannelWriter<T>) -> Self {
        Self { writer }
    }
}

impl<T: Clone + Send> WriterSink<T> for ChannelWriterSink<T> {
    fn write(&self, msg: &T) -> bool {
        match self.writer.write(msg.clone(), INFINITE) {
            Ok(()) => true,
            Err(status) => {
                warn!("{CHANNEL_WRITER_SINK_TAG}{WRITER_SINK_FN_WRITE_TAG} Failed to write message to channel: {status}");
                false
            }
        }
    }
}

/// Sink writing straight to a controller's stream.
#[derive(Clone, Default)]
pub struct StreamWriterSink {
    connection: Option<Arc<dyn StreamChannelConnection>>,
}

impl StreamWriterSink {
    pub fn new(connection: Arc<dyn StreamChannelConnection>) -> Self {
        Self {
            connection: Some(connection),
        }
    }

    /// A sink with nothing attached; every write is refused.
    pub fn detached() -> Self {
        Self { connection: None }
    }
}

impl WriterSink<StreamMessageResponse> for StreamWriterSink {
    fn write(&self, msg: &StreamMessageResponse) -> bool {
        let Some(connection) = self.connection.as_ref() else {
            debug!("{STREAM_WRITER_SINK_TAG}{WRITER_SINK_FN_WRITE_TAG} No stream attached");
            return false;
        };
        connection.write(msg)
    }
}
