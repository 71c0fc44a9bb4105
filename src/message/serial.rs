use crate::error::{Error, Result};
use super::channel::ChannelCommunicator;
use super::comm::{Communicator, Envelope, Tag};

/// The communicator for a run with a single process. Every box is local, so
/// ghost exchanges never send messages; a message addressed to rank 0 is
/// looped back onto the inbound queue.
///
pub struct SerialCommunicator {
    inner: ChannelCommunicator,
}

impl SerialCommunicator {
    pub fn new() -> Self {
        let mut group = ChannelCommunicator::group(1);
        Self {
            inner: group.remove(0),
        }
    }
}

impl Default for SerialCommunicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send(&self, rank: usize, tag: Tag, message: &[u8]) -> Result<()> {
        if rank != 0 {
            return Err(Error::Config(format!("serial run has no rank {}", rank)));
        }
        self.inner.send(rank, tag, message)
    }

    fn recv(&self) -> Result<Envelope> {
        self.inner.recv()
    }

    fn requeue_recv(&self, envelope: Envelope) -> Result<()> {
        self.inner.requeue_recv(envelope)
    }
}
