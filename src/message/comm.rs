use serde::{Deserialize, Serialize};
use crate::error::Result;

/// Message tags are signed so that tag arithmetic over box indexes and
/// direction vectors stays in one integer type.
pub type Tag = i64;

/// A message received from a peer, along with the rank it came from and the
/// tag it was sent with. This is also the unit which is serialized onto the
/// wire by the TCP transport.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub source: usize,
    pub tag: Tag,
    pub data: Vec<u8>,
}

/// Interface for a group of processes that can exchange tagged messages. The
/// underlying transport can in principle be TCP, in-process channels, or a
/// higher level abstraction like MPI.
///
pub trait Communicator: Send + Sync {
    /// Must be implemented to return the rank of this process within the
    /// communicator.
    fn rank(&self) -> usize;

    /// Must be implemented to return the number of peer processes in this
    /// communicator.
    fn size(&self) -> usize;

    /// Must be implemented to send a message to a peer. This method must
    /// return immediately, in other words it is not allowed to block until a
    /// matching receive is posted. Messages sent from one rank to another
    /// must arrive in the order they were sent.
    fn send(&self, rank: usize, tag: Tag, message: &[u8]) -> Result<()>;

    /// Must be implemented to receive a message from any of the peers. This
    /// method is allowed to block until a message is ready to be received.
    fn recv(&self) -> Result<Envelope>;

    /// Put a received message back onto the inbound queue, because it is not
    /// yet needed. It will be returned again by a later call to `recv`.
    fn requeue_recv(&self, envelope: Envelope) -> Result<()>;
}
