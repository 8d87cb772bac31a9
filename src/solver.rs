//! The pipelined solver. Every participant of the ring runs `participate`
//! with the same problem and configuration; the schedule tells each one,
//! per iteration, which layer to compute, where to read the previous layer
//! from, and where to forward the result.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::message::comm::Communicator;
use crate::output::{Header, ResultSink};
use crate::problem::Problem;
use crate::schedule::{Schedule, SinkRole, SourceRole};
use crate::stencil::{Binding, Scheme};
use crate::stream::{Discard, Downstream, LocalReplay, NetworkSink, NetworkSource, Sink, Upstream, DEFAULT_BUFFER_SIZE};
use crate::sweep::Sweep;




#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub scheme: Scheme,
    /// Number of values per network batch.
    pub buffer_size: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            scheme: Scheme::Upwind,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}




#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]

/**
 * Counters kept by one participant over a run.
 */
pub struct RunStats {
    pub layers: usize,
    pub sends: usize,
    pub receives: usize,
    /// Largest absolute value over the layers this participant computed.
    pub max_abs: f64,
}

impl RunStats {
    pub fn combine(self, other: Self) -> Self {
        Self {
            layers: self.layers + other.layers,
            sends: self.sends + other.sends,
            receives: self.receives + other.receives,
            max_abs: self.max_abs.max(other.max_abs),
        }
    }
}

fn try_combine(a: &[u8], b: &[u8]) -> Result<Vec<u8>> {
    let a: RunStats = rmp_serde::from_slice(a)?;
    let b: RunStats = rmp_serde::from_slice(b)?;
    Ok(rmp_serde::to_vec(&a.combine(b))?)
}

/// Reduction operator for encoded stats. An empty result makes the decode
/// on rank 0 fail, so the run still reports the error.
fn combine_encoded(a: Vec<u8>, b: Vec<u8>) -> Vec<u8> {
    try_combine(&a, &b).unwrap_or_else(|e| {
        warn!("could not combine run stats: {}", e);
        Vec::new()
    })
}




/**
 * What `participate` returns: this participant's counters, and on rank 0
 * the counters summed over the whole ring.
 */
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Report {
    pub stats: RunStats,
    pub total: Option<RunStats>,
}




/// Take part in a pipelined run over the given communicator. Rank 0 seeds
/// the initial layer; every completed layer is written to `results` by the
/// participant that computed it.
pub fn participate<C, R>(comm: &C, problem: &Problem, config: &SolverConfig, results: &mut R) -> Result<Report>
where
    C: Communicator + ?Sized,
    R: ResultSink + ?Sized,
{
    let domain = &problem.domain;
    domain.validate()?;

    if config.buffer_size == 0 {
        return Err(Error::InvalidConfig("the network buffer must hold at least one value".to_string()));
    }
    let (left, right) = config.scheme.strides();
    let layer_size = domain.layer_size();
    let layer_count = domain.layer_count();

    if layer_size < left + right + 1 {
        return Err(Error::InvalidConfig(format!(
            "{} points per layer is too few for the {} scheme",
            layer_size, config.scheme
        )));
    }
    let schedule = Schedule::new(comm.size(), layer_count)?;
    let rank = comm.rank();

    if rank == 0 {
        info!(
            "{} scheme, {} layers of {} points over {} participants (courant number {:.4})",
            config.scheme,
            layer_count,
            layer_size,
            comm.size(),
            domain.courant()
        );
        if config.scheme.is_courant_limited() && domain.courant() > 1.0 {
            warn!("courant number {} exceeds 1, the {} scheme is unstable", domain.courant(), config.scheme);
        }
    }

    results.put_header(&Header {
        space_step: domain.space_step,
        time_step: domain.time_step,
        layer_count: layer_count + 1,
        layer_size,
    })?;

    let mut previous = vec![0.0; layer_size];
    let mut current = vec![0.0; layer_size];
    let mut stats = RunStats::default();

    if rank == 0 {
        previous = problem.initial_layer();
        results.put_layer(0, &previous)?;
    }

    for iteration in 0..schedule.rounds() {
        let assignment = match schedule.assignment(iteration, rank) {
            Some(assignment) => assignment,
            None => break,
        };
        let k = assignment.layer;
        debug!("[{}] iteration {}: layer {} ({:?} -> {:?})", rank, iteration, k, assignment.source, assignment.sink);

        let stencil = config.scheme.bind(Binding {
            tau: domain.time_step,
            h: domain.space_step,
            speed: domain.speed,
            layer: k,
            forcing: &*problem.forcing,
        });
        let upstream = match assignment.source {
            SourceRole::Replay => Upstream::Replay(LocalReplay::new(&previous)),
            SourceRole::Pull(peer) => Upstream::Network(NetworkSource::new(comm, peer, config.buffer_size)),
        };
        let downstream = match assignment.sink {
            SinkRole::Discard => Downstream::Discard(Discard),
            SinkRole::Push(peer) => Downstream::Network(NetworkSink::new(comm, peer, config.buffer_size)),
        };
        let mut sweep = Sweep::new(stencil, upstream, downstream);

        // The left band is never reached by the stencil; it comes from the
        // boundary condition.
        let edge = (problem.left_edge)(domain.time(k));
        for value in &mut current[..left] {
            *value = edge;
            sweep.sink_mut().push(edge)?;
        }

        sweep.process(&mut current, left, layer_size - right)?;

        // Zero-gradient outflow on the right.
        let outflow = current[layer_size - right - 1];
        for value in &mut current[layer_size - right..] {
            *value = outflow;
            sweep.sink_mut().push(outflow)?;
        }
        sweep.sink_mut().flush()?;

        let (upstream, downstream) = sweep.into_parts();
        stats.receives += upstream.receives();
        stats.sends += downstream.sends();
        stats.layers += 1;
        stats.max_abs = current.iter().fold(stats.max_abs, |m, u| m.max(u.abs()));
        drop(upstream);

        results.put_layer(k, &current)?;
        std::mem::swap(&mut previous, &mut current);
    }
    results.finish()?;

    let total = comm
        .reduce(combine_encoded, rmp_serde::to_vec(&stats)?)?
        .map(|bytes| rmp_serde::from_slice::<RunStats>(&bytes))
        .transpose()?;

    if let Some(total) = &total {
        info!(
            "computed {} layers with {} batches sent and {} received, max |u| = {}",
            total.layers, total.sends, total.receives, total.max_abs
        );
    }
    Ok(Report { stats, total })
}




// ============================================================================
#[cfg(test)]
mod test {

    use std::collections::BTreeMap;
    use std::net::TcpListener;
    use std::thread;

    use super::{combine_encoded, participate, try_combine, Report, RunStats, SolverConfig};
    use crate::error::Error;
    use crate::launch::local_ring;
    use crate::message::tcp::TcpCommunicator;
    use crate::output::{MemoryResults, NoResults};
    use crate::problem::{Domain, InitialShape, Problem};
    use crate::stencil::Scheme;

    fn forced_problem() -> Problem {
        let domain = Domain {
            length: 1.0,
            duration: 0.2,
            space_step: 0.01,
            time_step: 0.005,
            speed: 1.0,
        };
        Problem::homogeneous(domain, |x| (-100.0 * (x - 0.3) * (x - 0.3)).exp())
            .with_left_edge(|t| 0.1 * (10.0 * t).sin())
            .with_forcing(|x, t| x.sin() * t.cos())
    }

    fn run(problem: &Problem, config: &SolverConfig, ring_size: usize) -> (BTreeMap<usize, Vec<f64>>, Vec<Report>) {
        let outcome = local_ring(ring_size, false, |comm| {
            let mut results = MemoryResults::default();
            let report = participate(comm, problem, config, &mut results)?;
            Ok((results, report))
        })
        .unwrap();
        let (results, reports): (Vec<_>, Vec<_>) = outcome.into_iter().unzip();
        (MemoryResults::merge(results), reports)
    }

    #[test]
    fn encoded_stats_combine_or_report_the_codec_error() {
        let a = RunStats { layers: 2, sends: 3, receives: 1, max_abs: 0.5 };
        let b = RunStats { layers: 1, sends: 0, receives: 4, max_abs: 2.0 };
        let encode = |s: &RunStats| rmp_serde::to_vec(s).unwrap();

        let combined: RunStats = rmp_serde::from_slice(&combine_encoded(encode(&a), encode(&b))).unwrap();
        assert_eq!(combined, RunStats { layers: 3, sends: 3, receives: 5, max_abs: 2.0 });

        assert!(matches!(try_combine(&[0xc1], &encode(&b)), Err(Error::Codec(_))));
        assert!(combine_encoded(vec![0xc1], encode(&b)).is_empty());
    }

    #[test]
    fn ring_size_does_not_change_the_solution() {
        let problem = forced_problem();

        for scheme in [Scheme::Upwind, Scheme::Rectangle, Scheme::LaxFriedrichs] {
            let serial = SolverConfig { scheme, buffer_size: 8 };
            let (expected, _) = run(&problem, &serial, 1);
            assert_eq!(expected.len(), problem.domain.layer_count() + 1);

            for ring_size in 2..6 {
                for buffer_size in [1, 3, 8, 64] {
                    let config = SolverConfig { scheme, buffer_size };
                    let (layers, _) = run(&problem, &config, ring_size);
                    assert_eq!(layers, expected, "{} scheme, {} participants, buffer {}", scheme, ring_size, buffer_size);
                }
            }
        }
    }

    #[test]
    fn ring_larger_than_the_layer_count_leaves_ranks_idle() {
        let problem = forced_problem();
        let short = Problem {
            domain: Domain { duration: 0.015, ..problem.domain },
            ..problem.clone()
        };
        let config = SolverConfig::default();
        let (expected, _) = run(&short, &config, 1);
        let (layers, reports) = run(&short, &config, 5);

        assert_eq!(layers, expected);
        assert_eq!(reports.iter().map(|r| r.stats.layers).collect::<Vec<_>>(), vec![1, 1, 1, 0, 0]);
    }

    #[test]
    fn layer_values_travel_in_short_final_batches() {
        let domain = Domain {
            length: 1.0,
            duration: 0.02,
            space_step: 0.1,
            time_step: 0.01,
            speed: 1.0,
        };
        let problem = Problem::homogeneous(domain, |x| x);
        assert_eq!(domain.layer_size(), 10);

        let config = SolverConfig { scheme: Scheme::Upwind, buffer_size: 3 };
        let (_, reports) = run(&problem, &config, 2);

        assert_eq!(reports[0].stats.sends, 4);
        assert_eq!(reports[0].stats.receives, 0);
        assert_eq!(reports[1].stats.sends, 0);
        assert_eq!(reports[1].stats.receives, 4);

        let total = reports[0].total.unwrap();
        assert_eq!(total.layers, 2);
        assert_eq!(total.sends, total.receives);
        assert!(reports[1].total.is_none());
    }

    #[test]
    fn upwind_pulse_moves_half_a_cell_in_one_step() {
        let domain = Domain {
            length: 5.0,
            duration: 1e-3,
            space_step: 2e-3,
            time_step: 1e-3,
            speed: 1.0,
        };
        let profile = InitialShape::Pulse.profile(domain.length);
        let problem = Problem::homogeneous(domain, move |x| profile(x));
        let (layers, _) = run(&problem, &SolverConfig::default(), 1);
        let (u0, u1) = (&layers[&0], &layers[&1]);

        let first = u0.iter().position(|&u| u == 1.0).unwrap();
        let last = u0.iter().rposition(|&u| u == 1.0).unwrap();

        for m in 1..u0.len() {
            assert_eq!(u1[m], 0.5 * u0[m] + 0.5 * u0[m - 1]);
        }
        assert_eq!(u1[first], 0.5);
        assert_eq!(u1[last + 1], 0.5);
        assert!(u1[first + 1..=last].iter().all(|&u| u == 1.0));
        assert!(u1[..first].iter().all(|&u| u == 0.0));
        assert!(u1[last + 2..].iter().all(|&u| u == 0.0));
    }

    #[test]
    fn upwind_is_monotone_below_unit_courant_number_only() {
        let domain = Domain {
            length: 2.0,
            duration: 0.5,
            space_step: 0.01,
            time_step: 0.005,
            speed: 1.0,
        };
        let profile = InitialShape::Pulse.profile(domain.length);
        let stable = Problem::homogeneous(domain, move |x| profile(x));
        let (_, reports) = run(&stable, &SolverConfig::default(), 3);
        assert!(reports[0].total.unwrap().max_abs <= 1.0);

        let unstable = Problem {
            domain: Domain { time_step: 0.015, ..domain },
            ..stable.clone()
        };
        assert!(unstable.domain.courant() > 1.0);
        let (_, reports) = run(&unstable, &SolverConfig::default(), 3);
        assert!(reports[0].total.unwrap().max_abs > 10.0);
    }

    #[test]
    fn invalid_configurations_are_reported() {
        let problem = forced_problem();
        let result = local_ring(2, false, |comm| {
            participate(comm, &problem, &SolverConfig { scheme: Scheme::Upwind, buffer_size: 0 }, &mut NoResults)
        });
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        let tiny = Problem {
            domain: Domain { length: 0.015, ..problem.domain },
            ..problem.clone()
        };
        let result = local_ring(1, false, |comm| {
            participate(comm, &tiny, &SolverConfig { scheme: Scheme::LaxFriedrichs, buffer_size: 8 }, &mut NoResults)
        });
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn tcp_ring_matches_the_serial_run() {
        let problem = forced_problem();
        let config = SolverConfig { scheme: Scheme::Rectangle, buffer_size: 5 };
        let (expected, _) = run(&problem, &config, 1);

        let listeners: Vec<_> = (0..3).map(|_| TcpListener::bind("127.0.0.1:0").unwrap()).collect();
        let peers: Vec<_> = listeners.iter().map(|l| l.local_addr().unwrap()).collect();
        let comms: Vec<_> = listeners
            .into_iter()
            .enumerate()
            .map(|(rank, listener)| TcpCommunicator::new(rank, listener, peers.clone()).unwrap())
            .collect();

        let parts: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|comm| {
                    let (problem, config) = (&problem, &config);
                    s.spawn(move || {
                        let mut results = MemoryResults::default();
                        participate(comm, problem, config, &mut results).unwrap();
                        results
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(MemoryResults::merge(parts), expected);
    }
}
