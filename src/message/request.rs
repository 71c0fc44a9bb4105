use log::debug;
use crate::error::Result;
use super::comm::{Communicator, Envelope, Tag};

/// The state of one slot in a `RequestSet`.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Request {
    /// Nothing is pending in this slot.
    Inactive,
    /// A send was handed to the transport. Sends complete as soon as they
    /// are waited on, because the transport owns a copy of the message.
    Send,
    /// A receive from the given rank with the given tag.
    Recv { source: usize, tag: Tag },
}

/// A completed request. `data` holds the message for a receive, and is
/// `None` for a send.
///
#[derive(Debug)]
pub struct Completion {
    pub index: usize,
    pub data: Option<Vec<u8>>,
}

/// A fixed array of request slots, with MPI-like wait-any and wait-all
/// operations. Incoming messages are matched to pending receives by source
/// rank and tag. A message which matches no pending receive belongs to a
/// later round of communication; it is held aside and handed back to the
/// communicator by `finish`.
///
#[derive(Debug)]
pub struct RequestSet {
    requests: Vec<Request>,
    deferred: Vec<Envelope>,
}

impl RequestSet {
    pub fn new(len: usize) -> Self {
        Self {
            requests: vec![Request::Inactive; len],
            deferred: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Return the number of slots with a pending send or receive.
    pub fn num_active(&self) -> usize {
        self.requests.iter().filter(|r| **r != Request::Inactive).count()
    }

    pub fn post_send(&mut self, index: usize) {
        debug_assert_eq!(self.requests[index], Request::Inactive);
        self.requests[index] = Request::Send;
    }

    pub fn post_recv(&mut self, index: usize, source: usize, tag: Tag) {
        debug_assert_eq!(self.requests[index], Request::Inactive);
        self.requests[index] = Request::Recv { source, tag };
    }

    /// Complete one pending request, blocking on the communicator if only
    /// receives are left. Returns `None` once no request is pending.
    pub fn wait_any(&mut self, comm: &dyn Communicator) -> Result<Option<Completion>> {
        if let Some(index) = self.requests.iter().position(|r| *r == Request::Send) {
            self.requests[index] = Request::Inactive;
            return Ok(Some(Completion { index, data: None }));
        }
        if self.num_active() == 0 {
            return Ok(None);
        }
        loop {
            let envelope = comm.recv()?;

            match self.matching_recv(&envelope) {
                Some(index) => {
                    self.requests[index] = Request::Inactive;
                    return Ok(Some(Completion {
                        index,
                        data: Some(envelope.data),
                    }));
                }
                None => {
                    debug!("deferring message from {} with tag {}", envelope.source, envelope.tag);
                    self.deferred.push(envelope)
                }
            }
        }
    }

    /// Complete every pending request, returning the completions ordered by
    /// slot index.
    pub fn wait_all(&mut self, comm: &dyn Communicator) -> Result<Vec<Completion>> {
        let mut completed = Vec::with_capacity(self.num_active());

        while let Some(completion) = self.wait_any(comm)? {
            completed.push(completion)
        }
        completed.sort_by_key(|c| c.index);
        Ok(completed)
    }

    /// Return any held-aside messages to the communicator's inbound queue.
    pub fn finish(&mut self, comm: &dyn Communicator) -> Result<()> {
        for envelope in self.deferred.drain(..) {
            comm.requeue_recv(envelope)?
        }
        Ok(())
    }

    fn matching_recv(&self, envelope: &Envelope) -> Option<usize> {
        self.requests.iter().position(|r| match r {
            Request::Recv { source, tag } => *source == envelope.source && *tag == envelope.tag,
            _ => false,
        })
    }
}
