use std::net::SocketAddr;
use std::str::FromStr;

use clap::Parser;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;

use wavefront::launch::local_ring;
use wavefront::message::comm::Communicator;
use wavefront::message::tcp::TcpCommunicator;
use wavefront::output::{CborResults, NoResults, ResultSink, TextResults};
use wavefront::problem::{Domain, InitialShape, Problem};
use wavefront::solver::{participate, SolverConfig};
use wavefront::stencil::Scheme;
use wavefront::stream::DEFAULT_BUFFER_SIZE;

#[derive(Clone, Copy, Debug)]
enum Format {
    Text,
    Cbor,
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Format::Text),
            "cbor" => Ok(Format::Cbor),
            _ => Err(format!("unknown output format '{}'", s)),
        }
    }
}

#[derive(Debug, Parser)]
#[clap(version, about = "Pipelined explicit solver for the 1D transport equation")]
struct Opts {
    /// Length of the spatial domain
    #[clap(long, default_value = "5")]
    length: f64,

    /// Total simulated time
    #[clap(long, default_value = "2.5")]
    duration: f64,

    #[clap(short = 'x', long, default_value = "5e-4")]
    space_step: f64,

    #[clap(short = 't', long, default_value = "5e-4")]
    time_step: f64,

    /// Propagation speed
    #[clap(short = 'a', long, default_value = "1")]
    speed: f64,

    /// upwind, rectangle or lax-friedrichs
    #[clap(short = 's', long, default_value = "upwind")]
    scheme: Scheme,

    /// Values per network batch
    #[clap(short = 'b', long, default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Number of in-process participants (ignored with --rank)
    #[clap(short = 'n', long, default_value = "1")]
    ranks: usize,

    /// Initial profile: cosine or pulse
    #[clap(long, default_value = "cosine")]
    shape: InitialShape,

    /// Prefix of the per-rank result files; nothing is written without it
    #[clap(short = 'o', long)]
    output: Option<String>,

    /// text or cbor
    #[clap(long, default_value = "text")]
    format: Format,

    /// Pin in-process participants to cores
    #[clap(long)]
    pin_threads: bool,

    /// Run a single participant over TCP with this rank
    #[clap(long, requires = "peers")]
    rank: Option<usize>,

    /// Comma separated addresses of all participants, in rank order
    #[clap(long, value_delimiter = ',')]
    peers: Vec<SocketAddr>,

    #[clap(long, default_value = "info")]
    log_level: String,
}

fn make_results(opts: &Opts, rank: usize) -> wavefront::Result<Box<dyn ResultSink + Send>> {
    Ok(match (&opts.output, opts.format) {
        (None, _) => Box::new(NoResults),
        (Some(prefix), Format::Text) => Box::new(TextResults::create(prefix, rank)?),
        (Some(prefix), Format::Cbor) => Box::new(CborResults::create(prefix, rank)?),
    })
}

fn run(opts: Opts) -> Result<(), Box<dyn std::error::Error>> {
    let level = LevelFilter::from_str(&opts.log_level).map_err(|_| format!("unknown log level '{}'", opts.log_level))?;
    SimpleLogger::new().with_level(level).init().map_err(|e| e.to_string())?;
    info!("{:?}", opts);

    let domain = Domain {
        length: opts.length,
        duration: opts.duration,
        space_step: opts.space_step,
        time_step: opts.time_step,
        speed: opts.speed,
    };
    let profile = opts.shape.profile(opts.length);
    let problem = Problem::homogeneous(domain, move |x| profile(x));
    let config = SolverConfig {
        scheme: opts.scheme,
        buffer_size: opts.buffer_size,
    };
    let start = std::time::Instant::now();

    match opts.rank {
        Some(rank) => {
            let comm = TcpCommunicator::bind(rank, opts.peers.clone())?;
            let mut results = make_results(&opts, rank)?;
            participate(&comm, &problem, &config, &mut results)?;
        }
        None => {
            local_ring(opts.ranks, opts.pin_threads, |comm| {
                let mut results = make_results(&opts, comm.rank())?;
                participate(comm, &problem, &config, &mut results)
            })?;
        }
    }
    info!("elapsed: {:.4}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn main() {
    if let Err(e) = run(Opts::parse()) {
        error!("{}", e);
        eprintln!("wavefront: {}", e);
        std::process::exit(1);
    }
}
