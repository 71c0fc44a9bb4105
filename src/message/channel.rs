use crossbeam_channel::{unbounded, Receiver, Sender};
use crate::error::{Error, Result};
use super::comm::{Communicator, Envelope, Tag};

/// A communicator for a group of ranks living in one process, typically one
/// thread per rank. Every rank owns an unbounded inbound queue, and holds a
/// sender to each of its peers' queues, so sends never block.
///
pub struct ChannelCommunicator {
    rank: usize,
    peers: Vec<Sender<Envelope>>,
    inbound: Receiver<Envelope>,
}

impl ChannelCommunicator {
    /// Create a fully connected group of `size` communicators. The returned
    /// vector is indexed by rank.
    pub fn group(size: usize) -> Vec<Self> {
        let (sinks, sources): (Vec<_>, Vec<_>) = (0..size).map(|_| unbounded()).unzip();

        sources
            .into_iter()
            .enumerate()
            .map(|(rank, inbound)| Self {
                rank,
                peers: sinks.clone(),
                inbound,
            })
            .collect()
    }
}

impl Communicator for ChannelCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn send(&self, rank: usize, tag: Tag, message: &[u8]) -> Result<()> {
        let sink = self
            .peers
            .get(rank)
            .ok_or_else(|| Error::Config(format!("no rank {} in a group of {}", rank, self.size())))?;
        sink.send(Envelope {
            source: self.rank,
            tag,
            data: message.to_vec(),
        })?;
        Ok(())
    }

    fn recv(&self) -> Result<Envelope> {
        Ok(self.inbound.recv()?)
    }

    fn requeue_recv(&self, envelope: Envelope) -> Result<()> {
        self.peers[self.rank].send(envelope)?;
        Ok(())
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::ChannelCommunicator;
    use crate::message::comm::Communicator;
    use std::thread;

    #[test]
    fn ring_of_threads_works() {
        let procs: Vec<_> = ChannelCommunicator::group(4)
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let dest = (comm.rank() + 1) % comm.size();
                    comm.send(dest, 10 + comm.rank() as i64, &[comm.rank() as u8]).unwrap();
                    let received = comm.recv().unwrap();
                    let expected = (comm.rank() + comm.size() - 1) % comm.size();
                    assert_eq!(received.source, expected);
                    assert_eq!(received.tag, 10 + expected as i64);
                    assert_eq!(received.data, vec![expected as u8]);
                })
            })
            .collect();

        for process in procs {
            process.join().unwrap()
        }
    }

    #[test]
    fn requeued_message_is_received_again() {
        let group = ChannelCommunicator::group(2);
        group[0].send(1, 5, b"early").unwrap();
        group[0].send(1, 6, b"later").unwrap();

        let first = group[1].recv().unwrap();
        assert_eq!(first.tag, 5);
        group[1].requeue_recv(first).unwrap();

        assert_eq!(group[1].recv().unwrap().tag, 6);
        assert_eq!(group[1].recv().unwrap().data, b"early".to_vec());
    }

    #[test]
    fn sending_to_a_missing_rank_fails() {
        let group = ChannelCommunicator::group(2);
        assert!(group[0].send(2, 0, &[]).is_err());
    }
}
