use std::net::SocketAddr;
use std::thread;
use std::time::Instant;

use boxhalo::config::{Adjacency, HaloConfig, TransportConfig};
use boxhalo::message::{ChannelCommunicator, TcpCommunicator};
use boxhalo::{BlockArray, Error, ExchangePattern, IndexVector, Layout, Periodicity, Region, Result, Topology, WaitDiscipline};
use clap::Parser;
use log::{error, info, warn};
use simple_logger::SimpleLogger;

const SENTINEL: f64 = -1.0;

#[derive(Clone, Debug, Parser)]
#[clap(version = "1.0", about = "Fill and verify the ghost cells of a distributed block array")]
struct Opts {
    #[clap(short = 'n', long, default_value = "64")]
    cells: i64,

    #[clap(short = 'b', long, default_value = "16")]
    box_size: i64,

    #[clap(short = 'g', long, default_value = "2")]
    ghost: i64,

    #[clap(short = 'd', long, default_value = "3")]
    dim: usize,

    #[clap(short = 'c', long, default_value = "1")]
    components: usize,

    /// Periodic axes, for example "xz"
    #[clap(short = 'p', long, default_value = "")]
    periodic: String,

    #[clap(long)]
    trim_corners: bool,

    #[clap(long)]
    barrier: bool,

    #[clap(short = 'i', long, default_value = "10")]
    iterations: usize,

    /// Number of ranks to run as threads of this process
    #[clap(short = 't', long, default_value = "1")]
    threads: usize,

    /// This process's rank, when ranks are processes connected over TCP
    #[clap(long)]
    rank: Option<usize>,

    #[clap(long, value_delimiter = ',')]
    peers: Vec<SocketAddr>,
}

impl Opts {
    fn halo_config(&self) -> HaloConfig {
        HaloConfig {
            periodic: "xyz".chars().take(self.dim).map(|axis| self.periodic.contains(axis)).collect(),
            trim: if self.trim_corners { vec![Adjacency::Corner] } else { Vec::new() },
            wait: if self.barrier { WaitDiscipline::Barrier } else { WaitDiscipline::Incremental },
            ..HaloConfig::default()
        }
    }

    fn transport_config(&self) -> TransportConfig {
        match self.rank {
            Some(rank) => TransportConfig::Tcp { rank, peers: self.peers.clone() },
            None if self.threads > 1 => TransportConfig::Threads { ranks: self.threads },
            None => TransportConfig::Serial,
        }
    }
}

fn cell_value<const DIM: usize>(index: IndexVector<DIM>, comp: usize, iteration: usize) -> f64 {
    let mut weights = IndexVector::<DIM>::ZERO;

    for axis in 0..DIM {
        weights[axis] = 1000i64.pow(axis as u32);
    }
    index.dot(&weights) as f64 + 0.5 * comp as f64 + 1e9 * iteration as f64
}

fn wrap<const DIM: usize>(index: IndexVector<DIM>, domain: Region<DIM>, periodic: Periodicity) -> IndexVector<DIM> {
    let mut wrapped = index;

    for axis in (0..DIM).filter(|axis| periodic.is_periodic(*axis)) {
        let n = domain.dimensions()[axis];
        wrapped[axis] = (index[axis] - domain.lo()[axis]).rem_euclid(n) + domain.lo()[axis];
    }
    wrapped
}

/// Count the ghost cells which do not hold the value of the cell they mirror.
fn count_mismatches<const DIM: usize>(
    array: &BlockArray<f64, DIM>,
    pattern: &ExchangePattern<DIM>,
    periodic: Periodicity,
    iteration: usize,
) -> usize {
    let domain = array.layout().problem_domain();
    let mut mismatches = 0;

    for motion in pattern.motions() {
        let block = &array[motion.local()];

        for index in &motion.region_recv() {
            for comp in pattern.start_comp()..pattern.end_comp() {
                let expected = cell_value(wrap(index, domain, periodic), comp, iteration);

                if block.get(index, comp) != expected {
                    mismatches += 1
                }
            }
        }
    }
    mismatches
}

fn simulate<const DIM: usize>(opts: &Opts, halo: &HaloConfig, topology: Topology) -> Result<usize> {
    let domain = Region::new(IndexVector::ZERO, IndexVector::splat(opts.cells - 1));
    let layout = Layout::new(domain, IndexVector::splat(opts.box_size), &topology)?;
    let mut array = BlockArray::<f64, DIM>::new(&layout, opts.components, opts.ghost);
    let mut pattern = halo.build_pattern(&array)?;
    let mut mismatches = 0;
    let mut seconds = 0.0;

    info!(
        "rank {}: {} local boxes, {} exchange items ({} remote)",
        topology.rank(),
        layout.local_size(),
        pattern.num_motion_items(),
        pattern.num_remote()
    );

    for iteration in 0..opts.iterations {
        array.set_val(SENTINEL);
        array.fill_with(|index, comp| cell_value(index, comp, iteration));

        let start = Instant::now();
        array.exchange(&mut pattern)?;
        seconds += start.elapsed().as_secs_f64();

        mismatches += count_mismatches(&array, &pattern, halo.periodicity(), iteration);
    }

    info!(
        "rank {}: {} exchanges, {:.3} ms per exchange, {} mismatched ghost values",
        topology.rank(),
        opts.iterations,
        1e3 * seconds / opts.iterations.max(1) as f64,
        mismatches
    );
    Ok(mismatches)
}

fn run_rank(opts: &Opts, halo: &HaloConfig, topology: Topology) -> Result<usize> {
    match opts.dim {
        2 => simulate::<2>(opts, halo, topology),
        3 => simulate::<3>(opts, halo, topology),
        d => Err(Error::Config(format!("dimension must be 2 or 3, not {}", d))),
    }
}

fn run(opts: &Opts) -> Result<usize> {
    let halo = opts.halo_config();
    let transport = opts.transport_config();
    transport.validate()?;

    match transport {
        TransportConfig::Serial => run_rank(opts, &halo, Topology::serial()),
        TransportConfig::Threads { ranks } => {
            let procs: Vec<_> = ChannelCommunicator::group(ranks)
                .into_iter()
                .map(|comm| {
                    let (opts, halo) = (opts.clone(), halo.clone());
                    thread::spawn(move || run_rank(&opts, &halo, Topology::new(comm)))
                })
                .collect();

            let mut total = 0;

            for process in procs {
                total += process
                    .join()
                    .map_err(|_| Error::Disconnected("a rank thread panicked".to_string()))??;
            }
            Ok(total)
        }
        TransportConfig::Tcp { rank, peers } => {
            let (mut host, comm) = TcpCommunicator::connect(rank, peers)?;
            let mismatches = run_rank(opts, &halo, Topology::new(comm))?;
            host.shutdown()?;
            Ok(mismatches)
        }
    }
}

fn main() {
    let opts = Opts::parse();

    if let Err(e) = SimpleLogger::new().with_level(log::LevelFilter::Info).init() {
        eprintln!("logger was not installed: {}", e);
    }
    info!("{:?}", opts);

    match run(&opts) {
        Ok(0) => info!("all ghost cells verified"),
        Ok(n) => {
            warn!("{} ghost values did not match their source cells", n);
            std::process::exit(2)
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1)
        }
    }
}
