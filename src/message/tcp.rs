use std::collections::{hash_map::Entry, HashMap};
use std::io::{self, prelude::*};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use super::backoff::{ExponentialBackoff, Retry};
use super::{comm::Communicator, util};
use crate::error::{Error, Result};

const RETRY_WAIT: Duration = Duration::from_millis(50);
const RETRY_MAX_WAIT: Duration = Duration::from_millis(2000);
const CONNECT_ATTEMPTS: usize = 40;
const MAX_FRAME_SIZE: usize = 1 << 30;

/// A message for the sender thread, with the channel on which it reports
/// whether the peer acknowledged.
type Outgoing = (usize, Vec<u8>, Sender<Result<()>>);

#[derive(Serialize, Deserialize)]
struct Envelope {
    source: usize,
    data: Vec<u8>,
}

/// A communicator whose peers are reached over TCP. Each rank listens on
/// its own address; outgoing messages go through a single sender thread
/// which connects to peers on first use and waits for an acknowledgement
/// of every frame. The acknowledgement is only written once the receiving
/// side has handed the message to its consumer, and `send` waits for the
/// sender thread's verdict, so it has rendezvous semantics just like the
/// in-process channels and reports delivery failures to its caller.
///
/// The listener thread lives until the process exits.
pub struct TcpCommunicator {
    rank: usize,
    peers: Vec<SocketAddr>,
    outbound: Option<Sender<Outgoing>>,
    inboxes: Vec<Receiver<Vec<u8>>>,
    send_thread: Option<JoinHandle<()>>,
}

impl TcpCommunicator {
    /// Bind the listening socket for this rank at `peers[rank]` and start
    /// the transport threads.
    pub fn bind(rank: usize, peers: Vec<SocketAddr>) -> Result<Self> {
        let addr = *peers
            .get(rank)
            .ok_or_else(|| Error::InvalidConfig(format!("rank {} has no address among {} peers", rank, peers.len())))?;
        Self::new(rank, TcpListener::bind(addr)?, peers)
    }

    /// Start the transport threads on an already bound listener. This lets
    /// callers bind ephemeral ports first and exchange the addresses after.
    pub fn new(rank: usize, listener: TcpListener, peers: Vec<SocketAddr>) -> Result<Self> {
        if rank >= peers.len() {
            return Err(Error::InvalidConfig(format!(
                "rank {} out of range for {} peers",
                rank,
                peers.len()
            )));
        }
        info!("[{}] listening on {}", rank, listener.local_addr()?);

        let (inbox_sinks, inboxes): (Vec<_>, Vec<_>) = peers.iter().map(|_| bounded(0)).unzip();
        Self::start_listener(rank, listener, inbox_sinks);

        let (outbound, outbound_src) = bounded(0);
        let send_thread = Self::start_serial_sender(rank, peers.clone(), outbound_src);

        Ok(Self {
            rank,
            peers,
            outbound: Some(outbound),
            inboxes,
            send_thread: Some(send_thread),
        })
    }

    fn start_serial_sender(
        rank: usize,
        peers: Vec<SocketAddr>,
        outbound_src: Receiver<Outgoing>,
    ) -> JoinHandle<()> {
        thread::spawn(move || {
            let mut table: HashMap<usize, TcpStream> = HashMap::new();

            for (dest, data, reply) in outbound_src {
                let result = Self::deliver(&mut table, rank, &peers, dest, data);

                if let Err(e) = &result {
                    error!("[{}] failed to send message to {}: {}", rank, peers[dest], e);
                    table.remove(&dest);
                }
                if reply.send(result).is_err() {
                    warn!("[{}] sender of a message to {} went away", rank, dest);
                }
            }
            debug!("[{}] sender shutting down", rank);
        })
    }

    fn deliver(
        table: &mut HashMap<usize, TcpStream>,
        rank: usize,
        peers: &[SocketAddr],
        dest: usize,
        data: Vec<u8>,
    ) -> Result<()> {
        let stream = match table.entry(dest) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(Self::connect_with_retry(peers[dest])?),
        };
        let frame = rmp_serde::to_vec(&Envelope { source: rank, data })?;
        util::write_frame(stream, &frame)?;

        let ack = util::read_usize(stream)?;
        if ack != frame.len() {
            return Err(Error::Transport(format!(
                "receiver acknowledged {} bytes but {} were sent",
                ack,
                frame.len()
            )));
        }
        Ok(())
    }

    fn start_listener(rank: usize, listener: TcpListener, inbox_sinks: Vec<Sender<Vec<u8>>>) {
        thread::spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => {
                        let sinks = inbox_sinks.clone();
                        thread::spawn(move || {
                            if let Err(e) = Self::handle_connection(stream, &sinks) {
                                warn!("[{}] connection closed: {}", rank, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("[{}] failed to accept connection: {}", rank, e);
                        break;
                    }
                }
            }
        });
    }

    fn handle_connection(mut stream: TcpStream, sinks: &[Sender<Vec<u8>>]) -> Result<()> {
        let remote = stream.peer_addr()?;
        info!("Receiving connection from {}", remote);
        stream.set_nodelay(true)?;

        loop {
            let size = match util::read_usize(&mut stream) {
                Ok(size) => size,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            if size > MAX_FRAME_SIZE {
                return Err(Error::Transport(format!(
                    "{} announced a frame of {} bytes, the limit is {}",
                    remote, size, MAX_FRAME_SIZE
                )));
            }
            let envelope: Envelope = rmp_serde::from_slice(&util::read_bytes_vec(&mut stream, size)?)?;

            sinks
                .get(envelope.source)
                .ok_or_else(|| Error::Transport(format!("{} claims unknown rank {}", remote, envelope.source)))?
                .send(envelope.data)
                .map_err(|_| Error::Transport("communicator was dropped".to_string()))?;

            stream.write_all(&size.to_le_bytes())?;
        }
    }

    fn connect_with_retry(addr: SocketAddr) -> Result<TcpStream> {
        let stream = ExponentialBackoff::new(RETRY_WAIT, RETRY_MAX_WAIT, 2)
            .take(CONNECT_ATTEMPTS)
            .retry(
                || TcpStream::connect(addr),
                |e, delay| {
                    debug!("connect to {} failed ({}), retrying in {:?}", addr, e, delay);
                    thread::sleep(delay)
                },
            )
            .unwrap_or_else(|| Err(io::Error::new(io::ErrorKind::Other, "no connection attempts")))
            .map_err(|e| Error::Transport(format!("could not connect to {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

impl Communicator for TcpCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn send(&self, rank: usize, message: Vec<u8>) -> Result<()> {
        if rank >= self.peers.len() {
            return Err(Error::Transport(format!("no peer with rank {}", rank)));
        }
        let stopped = || Error::Transport(format!("sender thread of rank {} has stopped", self.rank));
        let (reply, verdict) = bounded(1);

        self.outbound
            .as_ref()
            .ok_or_else(|| Error::Transport("communicator is shutting down".to_string()))?
            .send((rank, message, reply))
            .map_err(|_| stopped())?;
        verdict.recv().map_err(|_| stopped())?
    }

    fn recv(&self, rank: usize) -> Result<Vec<u8>> {
        self.inboxes
            .get(rank)
            .ok_or_else(|| Error::Transport(format!("no peer with rank {}", rank)))?
            .recv()
            .map_err(|_| Error::Transport(format!("listener of rank {} has stopped", self.rank)))
    }
}

impl Drop for TcpCommunicator {
    fn drop(&mut self) {
        self.outbound.take();

        if let Some(handle) = self.send_thread.take() {
            if handle.join().is_err() {
                error!("[{}] sender thread panicked", self.rank);
            }
        }
    }
}
