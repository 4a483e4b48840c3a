//! Output sinks for translated events.
//!
//! The capture thread delivers through an [`OutputPort`]; the lifecycle
//! controller disposes the port at teardown. Delivery after disposal is a
//! no-op, and delivery failures never reach the capture loop.

mod memory;
#[cfg(all(feature = "midi", unix))]
mod midi;
mod trace;

pub use memory::MemorySink;
#[cfg(all(feature = "midi", unix))]
pub use midi::VirtualMidiSink;
pub use trace::TraceSink;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::config::OutputConfig;
use crate::translate::EventList;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to create MIDI client '{client}': {message}")]
    Client { client: String, message: String },
    #[error("failed to create virtual MIDI port '{port}': {message}")]
    Port { port: String, message: String },
    #[error("failed to send event: {0}")]
    Send(String),
}

/// Destination for translated events.
pub trait EventSink {
    fn deliver(&mut self, events: &EventList) -> Result<(), SinkError>;

    /// Release the endpoint. Dropping the sink has the same effect.
    fn close(self: Box<Self>) {}
}

type SharedSink = Arc<Mutex<Option<Box<dyn EventSink + Send>>>>;

/// Shared handle to the output endpoint.
#[derive(Clone)]
pub struct OutputPort {
    sink: SharedSink,
}

impl OutputPort {
    pub fn new(sink: Box<dyn EventSink + Send>) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Some(sink))),
        }
    }

    /// Deliver events; returns whether the sink accepted them.
    pub fn deliver(&self, events: &EventList) -> bool {
        let mut guard = self.lock();
        let Some(sink) = guard.as_mut() else {
            return false;
        };
        match sink.deliver(events) {
            Ok(()) => true,
            Err(err) => {
                tracing::trace!(%err, "event delivery failed");
                false
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Close the endpoint. Later deliveries are no-ops.
    pub fn dispose(&self) {
        let sink = self.lock().take();
        if let Some(sink) = sink {
            sink.close();
            tracing::debug!("output endpoint disposed");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn EventSink + Send>>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for OutputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputPort").finish_non_exhaustive()
    }
}

/// Create the configured output endpoint: a virtual MIDI source when the
/// `midi` feature is enabled, otherwise a tracing sink.
pub fn open_sink(config: &OutputConfig) -> Result<Box<dyn EventSink + Send>, SinkError> {
    #[cfg(all(feature = "midi", unix))]
    {
        Ok(Box::new(VirtualMidiSink::open(config)?))
    }
    #[cfg(not(all(feature = "midi", unix)))]
    {
        tracing::warn!(
            port = %config.port_name,
            "built without MIDI support; events are logged instead"
        );
        Ok(Box::new(TraceSink::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::{EventSink, MemorySink, OutputPort, SinkError};
    use crate::translate::EventList;

    struct FailingSink;

    impl EventSink for FailingSink {
        fn deliver(&mut self, _events: &EventList) -> Result<(), SinkError> {
            Err(SinkError::Send("endpoint gone".to_string()))
        }
    }

    fn events(bytes: &[u8]) -> EventList {
        let mut list = EventList::with_capacity(16);
        list.push(bytes).unwrap();
        list
    }

    #[test]
    fn port_delivers_until_disposed() {
        let sink = MemorySink::default();
        let port = OutputPort::new(Box::new(sink.clone()));

        assert!(port.deliver(&events(&[0x90, 0x3c, 0x40])));
        port.dispose();
        assert!(!port.is_open());
        assert!(!port.deliver(&events(&[0x80, 0x3c, 0x00])));

        assert_eq!(sink.events(), vec![vec![0x90, 0x3c, 0x40]]);
        assert!(sink.is_closed());
    }

    #[test]
    fn delivery_failure_is_swallowed() {
        let port = OutputPort::new(Box::new(FailingSink));
        assert!(!port.deliver(&events(&[1])));
        assert!(port.is_open());
    }

    #[test]
    fn dispose_twice_is_harmless() {
        let port = OutputPort::new(Box::new(MemorySink::default()));
        port.dispose();
        port.dispose();
        assert!(!port.is_open());
    }
}
