use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::thread;

use boxhalo::message::{Communicator, TcpCommunicator};
use log::info;
use simple_logger::SimpleLogger;

const NUM_RANKS: usize = 8;
const LAPS: i64 = 3;

fn peer(rank: usize) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8000 + rank as u16)
}

fn main() -> boxhalo::Result<()> {
    SimpleLogger::new().with_level(log::LevelFilter::Info).init().ok();

    let peers: Vec<_> = (0..NUM_RANKS).map(peer).collect();
    let mut ranks = Vec::new();

    for rank in 0..NUM_RANKS {
        ranks.push(TcpCommunicator::connect(rank, peers.clone())?);
    }

    let procs: Vec<_> = ranks
        .into_iter()
        .map(|(mut host, comm)| {
            thread::spawn(move || -> boxhalo::Result<()> {
                let next = (comm.rank() + 1) % comm.size();

                if comm.rank() == 0 {
                    comm.send(next, 0, b"token")?;
                }
                for lap in 0..LAPS {
                    let envelope = comm.recv()?;
                    info!("{} received token from {} on lap {}", comm.rank(), envelope.source, envelope.tag);

                    if comm.rank() != 0 || lap + 1 < LAPS {
                        let tag = if comm.rank() == 0 { lap + 1 } else { lap };
                        comm.send(next, tag, &envelope.data)?;
                    }
                }
                drop(comm);
                host.shutdown()
            })
        })
        .collect();

    for process in procs {
        process.join().expect("rank thread panicked")?;
    }
    Ok(())
}
