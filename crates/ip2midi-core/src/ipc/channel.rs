use std::io::{self, ErrorKind, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::codec::{ForwardedMessage, decode_envelope, encode_envelope};
use super::error::IpcError;
use super::layout;

/// Helper-side end of the local message channel.
///
/// The capture thread sends through it; the control thread watches it for
/// invalidation and closes it at teardown. Send and close are serialized by
/// the writer lock, so a send either completes before the close or sees the
/// channel closed.
#[derive(Debug)]
pub struct Channel {
    name: String,
    writer: Mutex<Option<Writer>>,
    watcher: Mutex<Option<UnixStream>>,
    usable: AtomicBool,
}

/// Write half plus the unsent tail of a message cut short by a send timeout.
/// The tail goes out before anything else so the envelope framing survives.
#[derive(Debug)]
struct Writer {
    stream: UnixStream,
    pending: Vec<u8>,
}

impl Channel {
    /// Connect to the Unix socket named `name`.
    pub fn connect(name: &str) -> Result<Self, IpcError> {
        if name.is_empty() || name.contains('\0') {
            return Err(IpcError::InvalidName(name.to_string()));
        }
        let connect_err = |source: io::Error| IpcError::Connect {
            name: name.to_string(),
            source,
        };
        let stream = UnixStream::connect(name).map_err(connect_err)?;
        let watcher = stream.try_clone().map_err(connect_err)?;
        tracing::info!(channel = %name, "connected to parent channel");
        Ok(Self {
            name: name.to_string(),
            writer: Mutex::new(Some(Writer {
                stream,
                pending: Vec::new(),
            })),
            watcher: Mutex::new(Some(watcher)),
            usable: AtomicBool::new(true),
        })
    }

    pub fn is_usable(&self) -> bool {
        self.usable.load(Ordering::Acquire)
    }

    /// Bound how long a single send may block on a slow reader.
    pub fn set_send_timeout(&self, timeout: Option<Duration>) -> Result<(), IpcError> {
        if let Some(writer) = self.lock_writer().as_ref() {
            writer.stream.set_write_timeout(timeout)?;
        }
        Ok(())
    }

    /// Send one message.
    ///
    /// When the parent stops reading, the send times out and only this
    /// message is lost ([`IpcError::Stalled`]); the channel stays usable. A
    /// message already partly written is kept and finished on the next send.
    /// Any other write error closes the channel for good.
    pub fn send(&self, id: u32, body: &[u8]) -> Result<(), IpcError> {
        if !self.is_usable() {
            return Err(IpcError::Closed);
        }
        let header = encode_envelope(id, body.len())?;
        let mut guard = self.lock_writer();
        let Some(writer) = guard.as_mut() else {
            return Err(IpcError::Closed);
        };

        let result = writer.flush_pending().and_then(|()| {
            let mut written = 0;
            let sent = write_counted(&mut writer.stream, &header, &mut written)
                .and_then(|()| write_counted(&mut writer.stream, body, &mut written));
            match sent {
                Err(err) if is_stall(&err) && written > 0 => {
                    if written < header.len() {
                        writer.pending.extend_from_slice(&header[written..]);
                        writer.pending.extend_from_slice(body);
                    } else {
                        writer.pending.extend_from_slice(&body[written - header.len()..]);
                    }
                    Ok(())
                }
                other => other,
            }
        });

        match result {
            Ok(()) => Ok(()),
            Err(err) if is_stall(&err) => {
                tracing::trace!(channel = %self.name, id, "parent not reading; message dropped");
                Err(IpcError::Stalled)
            }
            Err(err) => {
                self.usable.store(false, Ordering::Release);
                guard.take();
                tracing::debug!(channel = %self.name, %err, "channel send failed; forwarding stopped");
                Err(err.into())
            }
        }
    }

    /// Block until the parent closes its end of the channel (or the channel
    /// is invalidated locally). Anything the parent writes is discarded.
    pub fn wait_for_invalidation(&self) {
        let Some(mut watcher) = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };
        let mut scratch = [0u8; 256];
        loop {
            match watcher.read(&mut scratch) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::debug!(%err, "channel watch ended with error");
                    break;
                }
            }
        }
        tracing::info!(channel = %self.name, "parent channel invalidated");
    }

    /// Close the channel. Idempotent.
    pub fn invalidate(&self) {
        self.usable.store(false, Ordering::Release);
        if let Some(writer) = self.lock_writer().take() {
            let _ = writer.stream.shutdown(Shutdown::Both);
        }
    }

    fn lock_writer(&self) -> MutexGuard<'_, Option<Writer>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Writer {
    fn flush_pending(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut written = 0;
        let result = write_counted(&mut self.stream, &self.pending, &mut written);
        self.pending.drain(..written);
        result
    }
}

/// `write_all` that reports how far it got before failing.
fn write_counted(stream: &mut UnixStream, buf: &[u8], written: &mut usize) -> io::Result<()> {
    let mut rest = buf;
    while !rest.is_empty() {
        match stream.write(rest) {
            Ok(0) => return Err(io::Error::from(ErrorKind::WriteZero)),
            Ok(n) => {
                *written += n;
                rest = &rest[n..];
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn is_stall(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// Parent-side listener. Removes its socket file when dropped.
#[derive(Debug)]
pub struct ChannelListener {
    listener: UnixListener,
    path: PathBuf,
}

impl ChannelListener {
    pub fn bind(path: &Path) -> Result<Self, IpcError> {
        let listener = UnixListener::bind(path).map_err(|source| IpcError::Bind {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn accept(&self) -> Result<ChannelReceiver, IpcError> {
        let (stream, _) = self.listener.accept()?;
        Ok(ChannelReceiver { stream })
    }
}

impl Drop for ChannelListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// One message as received from the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub id: u32,
    pub body: Vec<u8>,
}

impl Envelope {
    pub fn message(&self) -> Result<ForwardedMessage<'_>, IpcError> {
        ForwardedMessage::decode(&self.body)
    }
}

/// Parent-side end of an accepted channel connection.
#[derive(Debug)]
pub struct ChannelReceiver {
    stream: UnixStream,
}

impl ChannelReceiver {
    /// Receive the next message, or `None` once the helper has disconnected.
    pub fn recv(&mut self) -> Result<Option<Envelope>, IpcError> {
        let mut header = [0u8; layout::ENVELOPE_LEN];
        match self.stream.read_exact(&mut header) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        }
        let (id, len) = decode_envelope(&header)?;
        let mut body = vec![0u8; len];
        self.stream.read_exact(&mut body)?;
        Ok(Some(Envelope { id, body }))
    }

    pub fn set_recv_timeout(&self, timeout: Option<Duration>) -> Result<(), IpcError> {
        self.stream.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Close the connection, which the helper observes as invalidation.
    pub fn close(self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
