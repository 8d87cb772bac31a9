use crossbeam_channel::{bounded, Receiver, Sender};

use super::comm::Communicator;
use crate::error::{Error, Result};

/// An in-process communicator in which every participant is a thread. Each
/// ordered pair of ranks has its own zero-capacity channel, so a `send`
/// completes only when the matching `recv` takes the message.
///
pub struct ChannelCommunicator {
    rank: usize,
    outboxes: Vec<Sender<Vec<u8>>>,
    inboxes: Vec<Receiver<Vec<u8>>>,
}

impl ChannelCommunicator {
    /// Create a fully connected group of the given size, one communicator
    /// per rank, in rank order.
    ///
    pub fn ring(size: usize) -> Vec<Self> {
        let mut outboxes: Vec<Vec<Sender<Vec<u8>>>> = (0..size).map(|_| Vec::with_capacity(size)).collect();
        let mut inboxes: Vec<Vec<Receiver<Vec<u8>>>> = (0..size).map(|_| Vec::with_capacity(size)).collect();

        for src in 0..size {
            for dst in 0..size {
                let (sender, receiver) = bounded(0);
                outboxes[src].push(sender);
                inboxes[dst].push(receiver);
            }
        }
        outboxes
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (outboxes, inboxes))| Self { rank, outboxes, inboxes })
            .collect()
    }
}

impl Communicator for ChannelCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.outboxes.len()
    }

    fn send(&self, rank: usize, message: Vec<u8>) -> Result<()> {
        self.outboxes
            .get(rank)
            .ok_or_else(|| Error::Transport(format!("no peer with rank {}", rank)))?
            .send(message)
            .map_err(|_| Error::Transport(format!("rank {} hung up before receiving from {}", rank, self.rank)))
    }

    fn recv(&self, rank: usize) -> Result<Vec<u8>> {
        self.inboxes
            .get(rank)
            .ok_or_else(|| Error::Transport(format!("no peer with rank {}", rank)))?
            .recv()
            .map_err(|_| Error::Transport(format!("rank {} hung up before sending to {}", rank, self.rank)))
    }
}
