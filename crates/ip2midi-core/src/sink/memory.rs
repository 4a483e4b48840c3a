use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::{EventSink, SinkError};
use crate::translate::EventList;

/// Sink that keeps delivered events in memory.
///
/// Clones share storage, so one clone can be handed to an [`super::OutputPort`]
/// while another inspects what was delivered.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<AtomicBool>,
}

impl MemorySink {
    pub fn events(&self) -> Vec<Vec<u8>> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl EventSink for MemorySink {
    fn deliver(&mut self, events: &EventList) -> Result<(), SinkError> {
        let mut stored = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        stored.extend(events.iter().map(<[u8]>::to_vec));
        Ok(())
    }

    fn close(self: Box<Self>) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
