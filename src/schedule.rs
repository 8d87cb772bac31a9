//! The wavefront schedule of a ring of `P` participants computing `L` time
//! layers. Layers are dealt out in rounds of `P`; within a round, the
//! participants form a chain that starts at the *head*, which replays a
//! layer it holds locally, and ends at the *tail*, which forwards nothing.
//! Every other participant pulls the previous layer from its predecessor
//! while it is being computed, and pushes its own layer to its successor.
//!
//! The tail of one round is the head of the next: the layer it just
//! finished is exactly the one the next round starts from. The head moves
//! one rank backwards per round, so in steady state every participant is
//! busy with a different layer at once.
//!
//! Everything here is a pure function of (iteration, rank, ring size,
//! layer count).

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceRole {
    /// Replay the previous layer from local memory.
    Replay,
    /// Pull the previous layer from the given rank.
    Pull(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkRole {
    /// Drop the computed layer once it is stored locally.
    Discard,
    /// Push the computed layer to the given rank.
    Push(usize),
}

/// What one participant does in one iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Assignment {
    pub layer: usize,
    pub position: usize,
    pub source: SourceRole,
    pub sink: SinkRole,
}




#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Schedule {
    ring_size: usize,
    layers: usize,
}




// ============================================================================
impl Schedule {

    /// A schedule for `layers` layers after the initial one, over a ring of
    /// `ring_size` participants.
    pub fn new(ring_size: usize, layers: usize) -> Result<Self> {
        if ring_size == 0 {
            return Err(Error::InvalidConfig("the ring needs at least one participant".to_string()));
        }
        Ok(Self { ring_size, layers })
    }

    /// Number of iterations. The last one is partial when the ring size
    /// does not divide the layer count.
    pub fn rounds(&self) -> usize {
        (self.layers + self.ring_size - 1) / self.ring_size
    }

    /// Number of layers computed in the given iteration.
    pub fn active(&self, iteration: usize) -> usize {
        self.layers
            .saturating_sub(iteration * self.ring_size)
            .min(self.ring_size)
    }

    /// The rank that replays a local layer in the given iteration: `-i mod P`.
    pub fn head(&self, iteration: usize) -> usize {
        let p = self.ring_size;
        (p - iteration % p) % p
    }

    /// The rank that forwards nothing in the given iteration. This is the
    /// rank before the head, unless the iteration is partial, in which case
    /// it is the rank at the last active position.
    pub fn tail(&self, iteration: usize) -> usize {
        let p = self.ring_size;
        let active = self.active(iteration).max(1);
        (self.head(iteration) + active - 1) % p
    }

    /// Distance of a rank from the head of the chain, along the ring.
    pub fn position(&self, iteration: usize, rank: usize) -> usize {
        let p = self.ring_size;
        (rank + p - self.head(iteration)) % p
    }

    /// The iteration and rank which compute the given layer (`layer >= 1`).
    pub fn producer(&self, layer: usize) -> (usize, usize) {
        let iteration = (layer - 1) / self.ring_size;
        let position = (layer - 1) % self.ring_size;
        (iteration, (self.head(iteration) + position) % self.ring_size)
    }

    /// The work of one rank in one iteration, or `None` if it has no layer
    /// to compute.
    pub fn assignment(&self, iteration: usize, rank: usize) -> Option<Assignment> {
        let p = self.ring_size;

        if iteration >= self.rounds() || rank >= p {
            return None;
        }
        let position = self.position(iteration, rank);

        if position >= self.active(iteration) {
            return None;
        }
        let source = if rank == self.head(iteration) {
            SourceRole::Replay
        } else {
            SourceRole::Pull((rank + p - 1) % p)
        };
        let sink = if rank == self.tail(iteration) {
            SinkRole::Discard
        } else {
            SinkRole::Push((rank + 1) % p)
        };
        Some(Assignment {
            layer: iteration * p + position + 1,
            position,
            source,
            sink,
        })
    }
}
