use std::collections::HashMap;
use std::io::prelude::*;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};

use crate::error::{Error, Result};
use super::backoff::{ExponentialBackoff, Retry};
use super::comm::{Communicator, Envelope, Tag};
use super::util;

const CXN_W_TIMEOUT: Duration = Duration::from_millis(5000);
const RETRY_WAIT: Duration = Duration::from_millis(50);
const RETRY_MAX_WAIT: Duration = Duration::from_millis(2000);
const CONNECT_ATTEMPTS: usize = 40;
const SEND_ATTEMPTS: usize = 3;

type Outbound = (usize, Envelope);




/**
 * Owns the helper threads of the TCP transport: one thread which delivers
 * outbound envelopes to peers in the order they were queued, and one thread
 * which accepts connections and spawns a reader for each. Frames on the wire
 * are a little-endian u64 byte count followed by a CBOR-encoded envelope.
 * The reader acknowledges each frame by echoing its byte count.
 *
 * A frame is delivered at most once. If a peer cannot be reached, or does
 * not acknowledge a frame it was sent, the sender thread stops, later sends
 * fail, and `shutdown` returns the error.
 */
pub struct TcpHost {
    listen_thread: Option<JoinHandle<()>>,
    send_thread: Option<JoinHandle<std::io::Result<()>>>,
}




// ============================================================================
impl TcpHost {

    /**
     * Bind this rank's listening address and start the helper threads.
     * Returns the host, the outbound queue, and both ends of the inbound
     * queue.
     */
    pub fn new(
        rank: usize,
        peers: Vec<SocketAddr>,
    ) -> Result<(Self, Sender<Outbound>, Sender<Envelope>, Receiver<Envelope>)> {
        let addr = *peers
            .get(rank)
            .ok_or_else(|| Error::Config(format!("rank {} has no peer address", rank)))?;
        let listener = TcpListener::bind(addr)?;
        Self::from_listener(rank, peers, listener)
    }

    /**
     * Start the helper threads on a listener which is already bound to this
     * rank's address.
     */
    pub fn from_listener(
        rank: usize,
        peers: Vec<SocketAddr>,
        listener: TcpListener,
    ) -> Result<(Self, Sender<Outbound>, Sender<Envelope>, Receiver<Envelope>)> {
        let addr = listener.local_addr()?;

        if peers.get(rank).map(|peer| peer.port()) != Some(addr.port()) {
            return Err(Error::Config(format!("rank {} is not listening on its peer address", rank)));
        }
        info!("rank {} listening on {}", rank, addr);

        let (send_sink, send_src) = unbounded();
        let (recv_sink, recv_src) = unbounded();
        let send_thread = Self::start_serial_sender(peers, send_src);
        let listen_thread = Self::start_listener(listener, recv_sink.clone());

        let host = TcpHost {
            send_thread: Some(send_thread),
            listen_thread: Some(listen_thread),
        };
        Ok((host, send_sink, recv_sink, recv_src))
    }

    /**
     * Wait for every queued outbound message to be delivered, and return the
     * error which stopped delivery if there was one. The outbound queue must
     * have been closed first, by dropping the communicator, unless delivery
     * has already failed. The listener thread is left running to serve peers
     * which are still sending.
     */
    pub fn shutdown(&mut self) -> Result<()> {
        self.listen_thread.take();

        if let Some(thread) = self.send_thread.take() {
            thread
                .join()
                .map_err(|_| Error::Disconnected("the TCP sender thread panicked".to_string()))??
        }
        Ok(())
    }

    fn start_serial_sender(peers: Vec<SocketAddr>, send_src: Receiver<Outbound>) -> JoinHandle<std::io::Result<()>> {
        thread::spawn(move || {
            let mut table: HashMap<usize, TcpStream> = HashMap::new();

            for (rank, envelope) in send_src {
                let mut frame = Vec::new();

                if let Err(e) = ciborium::ser::into_writer(&envelope, &mut frame) {
                    error!("failed to encode message with tag {}: {}", envelope.tag, e);
                    return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()));
                }
                if let Err(e) = Self::deliver(&mut table, peers[rank], rank, &frame) {
                    error!("giving up on messages to {}: {}", peers[rank], e);
                    return Err(e);
                }
            }
            Ok(())
        })
    }

    /**
     * Write one frame to a peer, reconnecting if the write fails, and wait
     * for its acknowledgement. Once the whole frame is written it is never
     * written again, so a missing acknowledgement is an error.
     */
    fn deliver(
        table: &mut HashMap<usize, TcpStream>,
        addr: SocketAddr,
        rank: usize,
        frame: &[u8],
    ) -> std::io::Result<()> {
        let mut attempt = 1;

        loop {
            if !table.contains_key(&rank) {
                table.insert(rank, Self::connect_with_retry(addr)?);
            }
            let client = table.get_mut(&rank).ok_or(std::io::ErrorKind::NotConnected)?;

            match util::write_frame(client, frame) {
                Ok(()) => break,
                Err(e) if attempt < SEND_ATTEMPTS => {
                    warn!("failed to send message to {}: {}", addr, e);
                    table.remove(&rank);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let client = table.get_mut(&rank).ok_or(std::io::ErrorKind::NotConnected)?;
        let ack = match util::read_u64(client) {
            Ok(ack) => ack,
            Err(e) => {
                table.remove(&rank);
                return Err(e);
            }
        };
        if ack != frame.len() as u64 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("sent {} bytes but the receiver acked {}", frame.len(), ack),
            ));
        }
        Ok(())
    }

    fn start_listener(listener: TcpListener, recv_sink: Sender<Envelope>) -> JoinHandle<()> {
        thread::spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => {
                        Self::handle_connection(stream, recv_sink.clone());
                    }
                    Err(e) => error!("failed to accept connection: {}", e),
                }
            }
        })
    }

    fn handle_connection(mut stream: TcpStream, recv_sink: Sender<Envelope>) -> JoinHandle<()> {
        let remote = stream.peer_addr().ok();
        debug!("receiving connection from {:?}", remote);

        thread::spawn(move || loop {
            let frame = match util::read_frame(&mut stream) {
                Ok(frame) => frame,
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return,
                Err(e) => {
                    error!("connection from {:?} failed: {}", remote, e);
                    return;
                }
            };
            let envelope: Envelope = match ciborium::de::from_reader(frame.as_slice()) {
                Ok(envelope) => envelope,
                Err(e) => {
                    error!("undecodable message from {:?}: {}", remote, e);
                    return;
                }
            };
            if recv_sink.send(envelope).is_err() {
                return;
            }
            if let Err(e) = stream.write_all(&(frame.len() as u64).to_le_bytes()) {
                error!("failed to ack message from {:?}: {}", remote, e);
                return;
            }
        })
    }

    fn connect_with_retry(addr: SocketAddr) -> std::io::Result<TcpStream> {
        let stream = ExponentialBackoff::new(RETRY_WAIT, RETRY_MAX_WAIT, 2)
            .take(CONNECT_ATTEMPTS)
            .retry(
                || TcpStream::connect(addr),
                |e, delay| debug!("connect to {} failed ({}), retrying in {:?}", addr, e, delay),
            )
            .unwrap_or_else(|| Err(std::io::ErrorKind::NotConnected.into()))?;

        stream.set_write_timeout(Some(CXN_W_TIMEOUT))?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}




/**
 * A communicator whose peers are reached over TCP. Sends are queued for the
 * host's sender thread and return immediately; receives block on the queue
 * fed by the host's reader threads. Messages to self skip the network.
 */
pub struct TcpCommunicator {
    rank: usize,
    num_peers: usize,
    send_sink: Sender<Outbound>,
    recv_sink: Sender<Envelope>,
    recv_src: Receiver<Envelope>,
}




// ============================================================================
impl TcpCommunicator {

    pub fn new(
        rank: usize,
        peers: Vec<SocketAddr>,
        send_sink: Sender<Outbound>,
        recv_sink: Sender<Envelope>,
        recv_src: Receiver<Envelope>,
    ) -> Self {
        Self {
            rank,
            num_peers: peers.len(),
            send_sink,
            recv_sink,
            recv_src,
        }
    }

    /**
     * Start a host for this rank and return it with a communicator attached
     * to it.
     */
    pub fn connect(rank: usize, peers: Vec<SocketAddr>) -> Result<(TcpHost, Self)> {
        let (host, send, recv_sink, receive) = TcpHost::new(rank, peers.clone())?;
        Ok((host, Self::new(rank, peers, send, recv_sink, receive)))
    }

    /**
     * Like `connect`, on a listener the caller has already bound to this
     * rank's address.
     */
    pub fn from_listener(rank: usize, peers: Vec<SocketAddr>, listener: TcpListener) -> Result<(TcpHost, Self)> {
        let (host, send, recv_sink, receive) = TcpHost::from_listener(rank, peers.clone(), listener)?;
        Ok((host, Self::new(rank, peers, send, recv_sink, receive)))
    }
}

impl Communicator for TcpCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.num_peers
    }

    fn send(&self, rank: usize, tag: Tag, message: &[u8]) -> Result<()> {
        if rank >= self.num_peers {
            return Err(Error::Config(format!("no rank {} among {} peers", rank, self.num_peers)));
        }
        let envelope = Envelope {
            source: self.rank,
            tag,
            data: message.to_vec(),
        };
        if rank == self.rank {
            self.recv_sink.send(envelope)?
        } else {
            self.send_sink
                .send((rank, envelope))
                .map_err(|_| Error::Disconnected(format!("delivery to rank {} has stopped after a transport failure", rank)))?
        }
        Ok(())
    }

    fn recv(&self) -> Result<Envelope> {
        Ok(self.recv_src.recv()?)
    }

    fn requeue_recv(&self, envelope: Envelope) -> Result<()> {
        self.recv_sink.send(envelope)?;
        Ok(())
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::TcpCommunicator;
    use crate::message::comm::{Communicator, Envelope};
    use crate::message::util;
    use std::net::{SocketAddr, TcpListener};
    use std::thread;

    fn bind_ranks(n: usize) -> (Vec<SocketAddr>, Vec<TcpListener>) {
        let listeners: Vec<_> = (0..n)
            .map(|_| TcpListener::bind("127.0.0.1:0").unwrap())
            .collect();
        (listeners.iter().map(|l| l.local_addr().unwrap()).collect(), listeners)
    }

    #[test]
    fn tagged_ring_over_tcp_works() {
        let (peers, listeners) = bind_ranks(3);
        let ranks: Vec<_> = listeners
            .into_iter()
            .enumerate()
            .map(|(rank, listener)| TcpCommunicator::from_listener(rank, peers.clone(), listener).unwrap())
            .collect();

        let procs: Vec<_> = ranks
            .into_iter()
            .map(|(mut host, comm)| {
                thread::spawn(move || {
                    let dest = (comm.rank() + 1) % comm.size();
                    comm.send(dest, 100 + comm.rank() as i64, &vec![7; 1000]).unwrap();
                    let received = comm.recv().unwrap();
                    let source = (comm.rank() + comm.size() - 1) % comm.size();
                    assert_eq!(received.source, source);
                    assert_eq!(received.tag, 100 + source as i64);
                    assert_eq!(received.data, vec![7; 1000]);
                    drop(comm);
                    host.shutdown().unwrap();
                })
            })
            .collect();

        for process in procs {
            process.join().unwrap()
        }
    }

    #[test]
    fn unacknowledged_frame_is_fatal_and_not_sent_twice() {
        let (peers, mut listeners) = bind_ranks(2);
        let peer = listeners.pop().unwrap();
        let own = listeners.pop().unwrap();
        let (mut host, comm) = TcpCommunicator::from_listener(0, peers, own).unwrap();

        comm.send(1, 5, b"halo").unwrap();
        let (mut stream, _) = peer.accept().unwrap();
        let frame = util::read_frame(&mut stream).unwrap();
        drop(stream);

        assert!(host.shutdown().is_err());
        assert!(comm.send(1, 6, b"halo").is_err());

        peer.set_nonblocking(true).unwrap();
        assert!(peer.accept().is_err());

        let envelope: Envelope = ciborium::de::from_reader(frame.as_slice()).unwrap();
        assert_eq!((envelope.source, envelope.tag, envelope.data), (0, 5, b"halo".to_vec()));
    }

    #[test]
    fn listener_must_be_bound_to_the_rank_address() {
        let (peers, mut listeners) = bind_ranks(2);
        let wrong = listeners.pop().unwrap();
        assert!(TcpCommunicator::from_listener(0, peers, wrong).is_err());
    }
}
