use super::util;
use crate::error::Result;

/// Interface for a fixed group of processes that exchange messages over a
/// network. The underlying transport can in principle be in-process
/// channels, TCP, or a higher level abstraction like MPI.
///
pub trait Communicator {
    /// Must be implemented to return the rank of this process within the
    /// communicator.
    fn rank(&self) -> usize;

    /// Must be implemented to return the number of peers processes in this
    /// communicator.
    fn size(&self) -> usize;

    /// Must be implemented to send a message to a peer. This method blocks
    /// until the peer has taken the message, so a slow receiver throttles
    /// its sender.
    fn send(&self, rank: usize, message: Vec<u8>) -> Result<()>;

    /// Must be implemented to receive the next message sent by the given
    /// peer. Messages from one peer arrive in the order they were sent.
    fn recv(&self, rank: usize) -> Result<Vec<u8>>;

    /// The rank this process receives ring traffic from.
    fn predecessor(&self) -> usize {
        (self.rank() + self.size() - 1) % self.size()
    }

    /// The rank this process forwards ring traffic to.
    fn successor(&self) -> usize {
        (self.rank() + 1) % self.size()
    }

    /// Implements a binomial tree broadcast from the root node. The message
    /// buffer must be `Some` if this is the root node, and it must be `None`
    /// otherwise.
    ///
    fn broadcast(&self, value: Option<Vec<u8>>) -> Result<Vec<u8>> {
        let r = self.rank();
        let p = self.size();

        let value = match value {
            Some(value) => value,
            None => self.recv(r - util::lowest_bit(r))?,
        };
        for level in (0..util::ceil_log2(p)).rev() {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 && r + one < p {
                self.send(r + one, value.clone())?
            }
        }
        Ok(value)
    }

    /// Implements a binomial tree reduce. All ranks return `None` except for
    /// the root.
    ///
    fn reduce<F>(&self, f: F, mut value: Vec<u8>) -> Result<Option<Vec<u8>>>
    where
        F: Fn(Vec<u8>, Vec<u8>) -> Vec<u8>,
    {
        let r = self.rank();
        let p = self.size();

        for level in 0..util::ceil_log2(p) {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 {
                if r + one < p {
                    value = f(value, self.recv(r + one)?)
                }
            } else {
                self.send(r - one, value)?;
                return Ok(None);
            }
        }
        Ok(Some(value))
    }

    /// Implements an all-reduce (symmetric fold) operation over a commutative
    /// binary operator.
    ///
    fn all_reduce<F>(&self, f: F, value: Vec<u8>) -> Result<Vec<u8>>
    where
        F: Fn(Vec<u8>, Vec<u8>) -> Vec<u8>,
    {
        let reduced = self.reduce(f, value)?;
        self.broadcast(reduced)
    }
}
