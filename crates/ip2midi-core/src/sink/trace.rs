use super::{EventSink, SinkError};
use crate::translate::EventList;

/// Sink that logs each event at debug level.
#[derive(Debug, Default)]
pub struct TraceSink {
    delivered: u64,
}

impl EventSink for TraceSink {
    fn deliver(&mut self, events: &EventList) -> Result<(), SinkError> {
        for event in events.iter() {
            self.delivered += 1;
            tracing::debug!(seq = self.delivered, len = event.len(), event = ?event, "event");
        }
        Ok(())
    }

    fn close(self: Box<Self>) {
        tracing::debug!(delivered = self.delivered, "trace sink closed");
    }
}
