//! Lazy streams of layer values. A `Source` yields the previous layer one
//! value at a time and a `Sink` accepts the current layer one value at a
//! time, so the sweep does not know whether its neighbor values come from a
//! local buffer or from another participant over the ring.

use crate::error::{Error, Result};
use crate::message::comm::Communicator;

/// Number of values per network batch, unless configured otherwise.
pub const DEFAULT_BUFFER_SIZE: usize = 8;

/// Yields values of a finite, non-restartable sequence.
pub trait Source {
    fn pull(&mut self) -> Result<f64>;
}

/// Accepts values of a sequence, in order.
pub trait Sink {
    fn push(&mut self, value: f64) -> Result<()>;

    /// Deliver anything still buffered. Called once at the end of every
    /// layer; the default is a no-op for unbuffered sinks.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: Source + ?Sized> Source for &mut T {
    fn pull(&mut self) -> Result<f64> {
        (**self).pull()
    }
}

impl<T: Sink + ?Sized> Sink for &mut T {
    fn push(&mut self, value: f64) -> Result<()> {
        (**self).push(value)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Encode a batch of values for the wire.
pub fn encode_batch(values: &[f64]) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec(values)?)
}

/// Decode a batch of values received from the wire.
pub fn decode_batch(bytes: &[u8]) -> Result<Vec<f64>> {
    Ok(rmp_serde::from_slice(bytes)?)
}




/**
 * Replays a layer held in local memory.
 */
pub struct LocalReplay<'a> {
    data: &'a [f64],
    cursor: usize,
}

impl<'a> LocalReplay<'a> {
    pub fn new(data: &'a [f64]) -> Self {
        Self { data, cursor: 0 }
    }

    pub fn pulled(&self) -> usize {
        self.cursor
    }
}

impl<'a> Source for LocalReplay<'a> {
    fn pull(&mut self) -> Result<f64> {
        match self.data.get(self.cursor) {
            Some(&value) => {
                self.cursor += 1;
                Ok(value)
            }
            None => Err(Error::StreamExhausted { pulled: self.cursor }),
        }
    }
}




/**
 * Drops everything pushed to it.
 */
pub struct Discard;

impl Sink for Discard {
    fn push(&mut self, _value: f64) -> Result<()> {
        Ok(())
    }
}




/**
 * Keeps everything pushed to it, in order.
 */
#[derive(Default)]
pub struct Collect {
    pub values: Vec<f64>,
}

impl Sink for Collect {
    fn push(&mut self, value: f64) -> Result<()> {
        self.values.push(value);
        Ok(())
    }
}




/**
 * Pulls batches of values sent by one peer. A receive is issued only when
 * the current batch is used up; the batch length is whatever the peer sent,
 * which may be short at the end of a layer.
 */
pub struct NetworkSource<'c, C: ?Sized> {
    comm: &'c C,
    peer: usize,
    capacity: usize,
    batch: Vec<f64>,
    cursor: usize,
    receives: usize,
}

impl<'c, C: Communicator + ?Sized> NetworkSource<'c, C> {
    pub fn new(comm: &'c C, peer: usize, capacity: usize) -> Self {
        Self {
            comm,
            peer,
            capacity,
            batch: Vec::with_capacity(capacity),
            cursor: 0,
            receives: 0,
        }
    }

    /// Number of batches received so far.
    pub fn receives(&self) -> usize {
        self.receives
    }

    /// Length of the most recently received batch.
    pub fn batch_len(&self) -> usize {
        self.batch.len()
    }
}

impl<'c, C: Communicator + ?Sized> Source for NetworkSource<'c, C> {
    fn pull(&mut self) -> Result<f64> {
        if self.cursor == self.batch.len() {
            let batch = decode_batch(&self.comm.recv(self.peer)?)?;

            if batch.is_empty() || batch.len() > self.capacity {
                return Err(Error::MalformedBatch {
                    peer: self.peer,
                    count: batch.len(),
                    capacity: self.capacity,
                });
            }
            self.batch = batch;
            self.cursor = 0;
            self.receives += 1;
        }
        let value = self.batch[self.cursor];
        self.cursor += 1;
        Ok(value)
    }
}




/**
 * Accumulates pushed values and sends them to one peer whenever `capacity`
 * of them are pending. The send blocks until the peer accepts the batch.
 */
pub struct NetworkSink<'c, C: ?Sized> {
    comm: &'c C,
    peer: usize,
    capacity: usize,
    pending: Vec<f64>,
    sends: usize,
}

impl<'c, C: Communicator + ?Sized> NetworkSink<'c, C> {
    pub fn new(comm: &'c C, peer: usize, capacity: usize) -> Self {
        Self {
            comm,
            peer,
            capacity,
            pending: Vec::with_capacity(capacity),
            sends: 0,
        }
    }

    /// Number of batches sent so far.
    pub fn sends(&self) -> usize {
        self.sends
    }

    fn send_pending(&mut self) -> Result<()> {
        self.comm.send(self.peer, encode_batch(&self.pending)?)?;
        self.pending.clear();
        self.sends += 1;
        Ok(())
    }
}

impl<'c, C: Communicator + ?Sized> Sink for NetworkSink<'c, C> {
    fn push(&mut self, value: f64) -> Result<()> {
        self.pending.push(value);

        if self.pending.len() == self.capacity {
            self.send_pending()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            self.send_pending()?;
        }
        Ok(())
    }
}




/**
 * Where a participant reads the previous layer from in one iteration.
 */
pub enum Upstream<'a, C: ?Sized> {
    Replay(LocalReplay<'a>),
    Network(NetworkSource<'a, C>),
}

impl<'a, C: Communicator + ?Sized> Upstream<'a, C> {
    pub fn receives(&self) -> usize {
        match self {
            Upstream::Replay(_) => 0,
            Upstream::Network(source) => source.receives(),
        }
    }
}

impl<'a, C: Communicator + ?Sized> Source for Upstream<'a, C> {
    fn pull(&mut self) -> Result<f64> {
        match self {
            Upstream::Replay(source) => source.pull(),
            Upstream::Network(source) => source.pull(),
        }
    }
}




/**
 * Where a participant forwards the layer it computes in one iteration.
 */
pub enum Downstream<'a, C: ?Sized> {
    Discard(Discard),
    Network(NetworkSink<'a, C>),
}

impl<'a, C: Communicator + ?Sized> Downstream<'a, C> {
    pub fn sends(&self) -> usize {
        match self {
            Downstream::Discard(_) => 0,
            Downstream::Network(sink) => sink.sends(),
        }
    }
}

impl<'a, C: Communicator + ?Sized> Sink for Downstream<'a, C> {
    fn push(&mut self, value: f64) -> Result<()> {
        match self {
            Downstream::Discard(sink) => sink.push(value),
            Downstream::Network(sink) => sink.push(value),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self {
            Downstream::Discard(sink) => sink.flush(),
            Downstream::Network(sink) => sink.flush(),
        }
    }
}
