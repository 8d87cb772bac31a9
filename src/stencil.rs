//! Explicit finite-difference schemes for the transport equation
//! `u_t + a u_x = f(x, t)`. A scheme reads a window of the previous time
//! layer around the point being computed, and optionally the points of the
//! current layer to its left which the same sweep has already produced.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::sweep::Window;

/// A forcing (source term) function `f(x, t)`, shared between participants.
pub type Forcing = dyn Fn(f64, f64) -> f64 + Send + Sync;




#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]

/**
 * The closed set of difference schemes the solver knows about.
 */
pub enum Scheme {
    Upwind,
    Rectangle,
    LaxFriedrichs,
}




// ============================================================================
impl Scheme {

    /// The (left, right) strides of this scheme. These are fixed per scheme,
    /// so the orchestrator can size intervals before binding a stencil.
    pub fn strides(self) -> (usize, usize) {
        match self {
            Scheme::Upwind => (1, 0),
            Scheme::Rectangle => (1, 0),
            Scheme::LaxFriedrichs => (1, 1),
        }
    }

    /// Bind this scheme to the physical constants and the index of the layer
    /// it is going to produce.
    pub fn bind(self, binding: Binding<'_>) -> Stencil<'_> {
        match self {
            Scheme::Upwind => Stencil::Upwind(binding),
            Scheme::Rectangle => Stencil::Rectangle(binding),
            Scheme::LaxFriedrichs => Stencil::LaxFriedrichs(binding),
        }
    }

    /// Whether the scheme is only conditionally stable, with a Courant
    /// number bound of one.
    pub fn is_courant_limited(self) -> bool {
        !matches!(self, Scheme::Rectangle)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Upwind => write!(fmt, "upwind"),
            Scheme::Rectangle => write!(fmt, "rectangle"),
            Scheme::LaxFriedrichs => write!(fmt, "lax-friedrichs"),
        }
    }
}

impl FromStr for Scheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upwind" | "left-corner" => Ok(Scheme::Upwind),
            "rectangle" | "box" => Ok(Scheme::Rectangle),
            "lax-friedrichs" => Ok(Scheme::LaxFriedrichs),
            _ => Err(format!("unknown scheme '{}'", s)),
        }
    }
}




#[derive(Clone, Copy)]

/**
 * Everything a stencil needs besides the layer data: the time step `tau`,
 * the space step `h`, the propagation speed, the index of the layer being
 * produced, and the forcing function.
 */
pub struct Binding<'f> {
    pub tau: f64,
    pub h: f64,
    pub speed: f64,
    pub layer: usize,
    pub forcing: &'f Forcing,
}




// ============================================================================
impl<'f> Binding<'f> {

    pub fn courant(&self) -> f64 {
        self.tau * self.speed / self.h
    }

    /// Time coordinate of the previous layer, plus a fraction of a step.
    fn time(&self, fraction: f64) -> f64 {
        (self.layer as f64 - 1.0 + fraction) * self.tau
    }
}




/**
 * A scheme bound to one layer. `evaluate` is a pure function of the window
 * and of the already computed part of the current layer.
 */
pub enum Stencil<'f> {
    /// `u^{k+1}_m = (1 - c) u^k_m + c u^k_{m-1} + tau f(x_m, t_k)`
    Upwind(Binding<'f>),
    /// `u^{k+1}_m = (u^k_m - u^{k+1}_{m-1}) c1 + u^k_{m-1} + c2 f(x_{m+1/2}, t_{k+1/2})`
    Rectangle(Binding<'f>),
    /// `u^{k+1}_m = (u^k_{m+1} + u^k_{m-1}) / 2 - c (u^k_{m+1} - u^k_{m-1}) / 2 + tau f(x_m, t_k)`
    LaxFriedrichs(Binding<'f>),
}




// ============================================================================
impl<'f> Stencil<'f> {

    pub fn scheme(&self) -> Scheme {
        match self {
            Stencil::Upwind(_) => Scheme::Upwind,
            Stencil::Rectangle(_) => Scheme::Rectangle,
            Stencil::LaxFriedrichs(_) => Scheme::LaxFriedrichs,
        }
    }

    pub fn left_stride(&self) -> usize {
        self.scheme().strides().0
    }

    pub fn right_stride(&self) -> usize {
        self.scheme().strides().1
    }

    /// Compute the value of the current layer at index `m`. The slice
    /// `current` holds the current layer up to (not including) `m`, and the
    /// window is aligned so that offset zero is the previous layer at `m`.
    pub fn evaluate(&self, current: &[f64], previous: &Window, m: usize) -> f64 {
        match self {
            Stencil::Upwind(b) => {
                let c = b.courant();
                let x = m as f64 * b.h;
                (1.0 - c) * previous.at(0) + c * previous.at(-1) + b.tau * (b.forcing)(x, b.time(0.0))
            }
            Stencil::Rectangle(b) => {
                let at = b.speed * b.tau;
                let c1 = (b.h - at) / (b.h + at);
                let c2 = 2.0 * b.h * at / (b.h + at);
                let x = (m as f64 + 0.5) * b.h;
                (previous.at(0) - current[m - 1]) * c1 + previous.at(-1) + c2 * (b.forcing)(x, b.time(0.5))
            }
            Stencil::LaxFriedrichs(b) => {
                let c = b.courant();
                let x = m as f64 * b.h;
                let (ul, ur) = (previous.at(-1), previous.at(1));
                0.5 * (ur + ul) - 0.5 * c * (ur - ul) + b.tau * (b.forcing)(x, b.time(0.0))
            }
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{Binding, Scheme};
    use crate::sweep::Window;

    fn window(values: &[f64], left: usize, right: usize) -> Window {
        let mut window = Window::new(left, right);
        for &v in values {
            window.push(v);
        }
        window
    }

    #[test]
    fn upwind_is_a_convex_combination_at_unit_speed() {
        let zero = |_: f64, _: f64| 0.0;
        let stencil = Scheme::Upwind.bind(Binding { tau: 1e-3, h: 2e-3, speed: 1.0, layer: 1, forcing: &zero });
        let w = window(&[1.0, 0.0], 1, 0);
        assert_eq!(stencil.evaluate(&[0.0], &w, 1), 0.5);
        let w = window(&[0.0, 1.0], 1, 0);
        assert_eq!(stencil.evaluate(&[0.0], &w, 1), 0.5);
    }

    #[test]
    fn upwind_adds_forcing_at_previous_time() {
        let forcing = |x: f64, t: f64| x + 10.0 * t;
        let stencil = Scheme::Upwind.bind(Binding { tau: 0.5, h: 1.0, speed: 0.0, layer: 3, forcing: &forcing });
        let w = window(&[7.0, 2.0], 1, 0);
        // x = 4, t = (3 - 1) * 0.5
        assert_eq!(stencil.evaluate(&[0.0; 4], &w, 4), 2.0 + 0.5 * (4.0 + 10.0));
    }

    #[test]
    fn rectangle_reads_the_current_layer_neighbor() {
        let zero = |_: f64, _: f64| 0.0;
        let stencil = Scheme::Rectangle.bind(Binding { tau: 1.0, h: 3.0, speed: 1.0, layer: 1, forcing: &zero });
        let w = window(&[2.0, 5.0], 1, 0);
        // c1 = (3 - 1) / (3 + 1) = 0.5
        assert_eq!(stencil.evaluate(&[0.0, 1.0], &w, 2), (5.0 - 1.0) * 0.5 + 2.0);
        assert_eq!(stencil.evaluate(&[0.0, 3.0], &w, 2), (5.0 - 3.0) * 0.5 + 2.0);
    }

    #[test]
    fn lax_friedrichs_averages_its_neighbors() {
        let zero = |_: f64, _: f64| 0.0;
        let stencil = Scheme::LaxFriedrichs.bind(Binding { tau: 1.0, h: 1.0, speed: 0.0, layer: 1, forcing: &zero });
        let w = window(&[2.0, 100.0, 4.0], 1, 1);
        assert_eq!(stencil.evaluate(&[0.0], &w, 1), 3.0);
        assert_eq!(stencil.left_stride(), 1);
        assert_eq!(stencil.right_stride(), 1);
    }

    #[test]
    fn schemes_parse_from_their_display_names() {
        for scheme in [Scheme::Upwind, Scheme::Rectangle, Scheme::LaxFriedrichs] {
            assert_eq!(scheme.to_string().parse::<Scheme>(), Ok(scheme));
        }
        assert!("crank-nicolson".parse::<Scheme>().is_err());
    }
}
