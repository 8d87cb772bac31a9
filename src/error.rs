use std::error;
use std::fmt;
use std::io;

#[derive(Debug)]

/**
 * Errors raised while configuring or running the pipelined solver. None of
 * them are recoverable: a failure on any participant aborts the run.
 */
pub enum Error {
    StrideViolation {
        start: usize,
        end: usize,
        len: usize,
        left: usize,
        right: usize,
    },
    InvalidConfig(String),
    StreamExhausted { pulled: usize },
    MalformedBatch {
        peer: usize,
        count: usize,
        capacity: usize,
    },
    Transport(String),
    Codec(String),
    Io(io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;

        match self {
            StrideViolation { start, end, len, left, right } => write!(
                fmt,
                "sweep over [{}, {}) of a layer with {} points violates strides (left {}, right {})",
                start, end, len, left, right
            ),
            InvalidConfig(msg) => write!(fmt, "invalid configuration: {}", msg),
            StreamExhausted { pulled } => write!(fmt, "end of stream after {} values", pulled),
            MalformedBatch { peer, count, capacity } => write!(
                fmt,
                "malformed batch from rank {}: {} values (capacity {})",
                peer, count, capacity
            ),
            Transport(msg) => write!(fmt, "transport failure: {}", msg),
            Codec(msg) => write!(fmt, "codec failure: {}", msg),
            Io(e) => write!(fmt, "i/o failure: {}", e),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::Codec(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::Codec(e.to_string())
    }
}
