use std::sync::Arc;

use super::channel::Channel;
use super::codec::MessageBuffer;
use crate::source::CaptureMeta;

/// Forwards captured frames to the parent process.
///
/// Without a channel every call is a no-op. Message ids start at zero and
/// wrap at `u32::MAX`.
#[derive(Debug, Default)]
pub struct IpcForwarder {
    channel: Option<Arc<Channel>>,
    buffer: MessageBuffer,
    next_id: u32,
}

impl IpcForwarder {
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn attached(channel: Arc<Channel>) -> Self {
        Self {
            channel: Some(channel),
            ..Self::default()
        }
    }

    pub fn starting_at(mut self, id: u32) -> Self {
        self.next_id = id;
        self
    }

    pub fn is_attached(&self) -> bool {
        self.channel.is_some()
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Encode and send one frame. Returns whether the message was sent;
    /// failures are logged at trace level and otherwise ignored.
    pub fn forward(&mut self, meta: &CaptureMeta, frame: &[u8], provenance: &str) -> bool {
        let Some(channel) = self.channel.as_deref() else {
            return false;
        };
        if !channel.is_usable() {
            return false;
        }

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let body = self.buffer.encode(meta, frame, provenance);
        match channel.send(id, body) {
            Ok(()) => true,
            Err(err) => {
                tracing::trace!(id, %err, "dropping forwarded message");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::IpcForwarder;
    use crate::ipc::{Channel, ChannelListener};
    use crate::source::CaptureMeta;

    #[test]
    fn detached_forwarder_is_a_no_op() {
        let mut forwarder = IpcForwarder::detached();
        assert!(!forwarder.is_attached());
        assert!(!forwarder.forward(&CaptureMeta::full(0, 0, 1), &[1], "x"));
        assert_eq!(forwarder.next_id(), 0);
    }

    #[test]
    fn ids_increase_and_wrap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fwd.sock");
        let listener = ChannelListener::bind(&path).unwrap();
        let channel = Arc::new(Channel::connect(path.to_str().unwrap()).unwrap());
        let mut receiver = listener.accept().unwrap();

        let mut forwarder = IpcForwarder::attached(channel).starting_at(u32::MAX - 1);
        for _ in 0..3 {
            assert!(forwarder.forward(&CaptureMeta::full(0, 0, 2), &[1, 2], "p"));
        }

        let ids: Vec<u32> = (0..3)
            .map(|_| receiver.recv().unwrap().unwrap().id)
            .collect();
        assert_eq!(ids, vec![u32::MAX - 1, u32::MAX, 0]);
    }

    #[test]
    fn forward_after_invalidation_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fwd.sock");
        let listener = ChannelListener::bind(&path).unwrap();
        let channel = Arc::new(Channel::connect(path.to_str().unwrap()).unwrap());
        let _receiver = listener.accept().unwrap();

        let mut forwarder = IpcForwarder::attached(Arc::clone(&channel));
        channel.invalidate();
        assert!(!forwarder.forward(&CaptureMeta::full(0, 0, 1), &[1], "x"));
    }
}
