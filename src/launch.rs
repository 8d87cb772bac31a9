use std::thread;

use log::warn;

use crate::error::{Error, Result};
use crate::message::channel::ChannelCommunicator;
use crate::message::comm::Communicator;

/// Run one participant per thread over an in-process ring of the given
/// size, and return the participants' results in rank order. If
/// `pin_threads` is set, participant `r` is pinned to core `r` (modulo the
/// number of cores).
///
/// Each participant owns its communicator and drops it when it returns, so
/// a failing participant disconnects its neighbors instead of stalling
/// them. The error of the lowest failing rank is returned.
///
pub fn local_ring<T, F>(size: usize, pin_threads: bool, f: F) -> Result<Vec<T>>
where
    F: Fn(&ChannelCommunicator) -> Result<T> + Sync,
    T: Send,
{
    if size == 0 {
        return Err(Error::InvalidConfig("the ring needs at least one participant".to_string()));
    }
    let cores = if pin_threads {
        core_affinity::get_core_ids().unwrap_or_default()
    } else {
        Vec::new()
    };
    if pin_threads && cores.is_empty() {
        warn!("could not query core ids, participants will not be pinned");
    }

    let f = &f;
    let cores = &cores;

    thread::scope(|s| {
        let handles: Vec<_> = ChannelCommunicator::ring(size)
            .into_iter()
            .map(|comm| {
                s.spawn(move || {
                    if !cores.is_empty() {
                        core_affinity::set_for_current(cores[comm.rank() % cores.len()]);
                    }
                    f(&comm)
                })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(rank, handle)| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(Error::Transport(format!("participant {} panicked", rank))))
            })
            .collect()
    })
}
