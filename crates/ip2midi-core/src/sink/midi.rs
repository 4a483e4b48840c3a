//! Virtual MIDI source published through midir.

use midir::os::unix::VirtualOutput;
use midir::{MidiOutput, MidiOutputConnection};

use super::{EventSink, SinkError};
use crate::config::OutputConfig;
use crate::translate::EventList;

/// Host-visible virtual MIDI source.
///
/// Dropping the connection disposes both the port and its client.
pub struct VirtualMidiSink {
    conn: MidiOutputConnection,
}

impl VirtualMidiSink {
    pub fn open(config: &OutputConfig) -> Result<Self, SinkError> {
        let output = MidiOutput::new(&config.client_name).map_err(|e| SinkError::Client {
            client: config.client_name.clone(),
            message: e.to_string(),
        })?;
        let conn = output
            .create_virtual(&config.port_name)
            .map_err(|e| SinkError::Port {
                port: config.port_name.clone(),
                message: e.to_string(),
            })?;
        tracing::info!(
            client = %config.client_name,
            port = %config.port_name,
            "virtual MIDI source created"
        );
        Ok(Self { conn })
    }
}

impl EventSink for VirtualMidiSink {
    fn deliver(&mut self, events: &EventList) -> Result<(), SinkError> {
        for event in events.iter() {
            self.conn
                .send(event)
                .map_err(|e| SinkError::Send(e.to_string()))?;
        }
        Ok(())
    }

    fn close(self: Box<Self>) {
        let _client = self.conn.close();
    }
}
