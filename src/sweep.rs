//! The sliding-window sweep turns a point-wise stencil recurrence into a
//! single forward pass over a stream of previous-layer values. Only
//! `left + right + 1` previous values are held at any time, so the previous
//! layer never needs to be resident on the process computing the next one.

use crate::error::{Error, Result};
use crate::stencil::Stencil;
use crate::stream::{Sink, Source};




/**
 * A fixed-capacity ring buffer of previous-layer values. Once full, it holds
 * exactly `left + right + 1` values and `at(0)` is the value `left` places
 * from the oldest one.
 */
#[derive(Clone, Debug)]
pub struct Window {
    slots: Vec<f64>,
    front: usize,
    len: usize,
    left: usize,
}




// ============================================================================
impl Window {

    pub fn new(left: usize, right: usize) -> Self {
        Self {
            slots: vec![0.0; left + right + 1],
            front: 0,
            len: 0,
            left,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Append a value at the back. When the window is full the oldest value
    /// is evicted, so the length never exceeds the capacity.
    pub fn push(&mut self, value: f64) {
        let capacity = self.capacity();

        if self.len < capacity {
            self.slots[(self.front + self.len) % capacity] = value;
            self.len += 1;
        } else {
            self.slots[self.front] = value;
            self.front = (self.front + 1) % capacity;
        }
    }

    /// Return the value at the given offset from the aligned position. Valid
    /// offsets are `-left ..= right` on a full window.
    pub fn at(&self, offset: isize) -> f64 {
        let capacity = self.capacity() as isize;
        let index = self.front as isize + self.left as isize + offset;
        debug_assert!(self.is_full(), "window read before it was primed");
        debug_assert!(offset >= -(self.left as isize) && offset < capacity - self.left as isize);
        self.slots[index.rem_euclid(capacity) as usize]
    }
}




/**
 * Drives one layer computation: pulls previous-layer values from a
 * `Source`, evaluates a `Stencil` once per point, and pushes each result to
 * a `Sink`.
 */
pub struct Sweep<'f, S, K> {
    stencil: Stencil<'f>,
    source: S,
    sink: K,
}




// ============================================================================
impl<'f, S: Source, K: Sink> Sweep<'f, S, K> {

    pub fn new(stencil: Stencil<'f>, source: S, sink: K) -> Self {
        Self { stencil, source, sink }
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    pub fn into_parts(self) -> (S, K) {
        (self.source, self.sink)
    }

    /// Compute `layer[start..end]` in increasing index order, assuming
    /// `layer[..start]` already holds valid values. The source must yield
    /// the previous layer starting from index `start - left_stride`; exactly
    /// `end - start + left + right` values are pulled.
    pub fn process(&mut self, layer: &mut [f64], start: usize, end: usize) -> Result<()> {
        let left = self.stencil.left_stride();
        let right = self.stencil.right_stride();

        if start < left || start > end || end + right > layer.len() {
            return Err(Error::StrideViolation {
                start,
                end,
                len: layer.len(),
                left,
                right,
            });
        }
        if start == end {
            return Ok(());
        }

        let mut window = Window::new(left, right);

        while !window.is_full() {
            window.push(self.source.pull()?);
        }

        for i in start..end {
            debug_assert_eq!(window.len(), left + right + 1);
            let value = self.stencil.evaluate(&layer[..i], &window, i);
            layer[i] = value;
            self.sink.push(value)?;

            if i + 1 < end {
                window.push(self.source.pull()?);
            }
        }
        Ok(())
    }
}
