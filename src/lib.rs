//! Wavefront is a pipelined explicit solver for the one-dimensional
//! transport equation `u_t + a u_x = f(x, t)`. A fixed set of participants,
//! arranged in a logical ring, computes successive time layers at once:
//! while one participant is producing layer `k`, its successor is already
//! consuming those values to produce layer `k + 1`, and so on around the
//! ring. Values flow between participants as short batches over blocking
//! channels or TCP, which bounds how far any participant can run ahead of
//! its neighbors.
//!
//! The pieces, from the bottom up: difference schemes with explicit left
//! and right strides (`stencil`), lazy value streams which hide whether the
//! previous layer is local or remote (`stream`), a sliding-window sweep
//! which computes a layer in one forward pass over such a stream (`sweep`),
//! and the pure wavefront schedule telling each participant what to do in
//! each iteration (`schedule`), all tied together by `solver`.

pub mod error;
pub mod launch;
pub mod message;
pub mod output;
pub mod problem;
pub mod schedule;
pub mod solver;
pub mod stencil;
pub mod stream;
pub mod sweep;

pub use error::{Error, Result};
