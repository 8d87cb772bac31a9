use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::stencil::Forcing;

/// A function of one coordinate, shared between participants.
pub type Profile = dyn Fn(f64) -> f64 + Send + Sync;




#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]

/**
 * Extent and resolution of the space-time domain, and the propagation speed
 * of the transport equation.
 */
pub struct Domain {
    pub length: f64,
    pub duration: f64,
    pub space_step: f64,
    pub time_step: f64,
    pub speed: f64,
}




// ============================================================================
impl Domain {

    /// Number of layers after the initial one.
    pub fn layer_count(&self) -> usize {
        steps(self.duration, self.time_step)
    }

    /// Number of grid points per layer.
    pub fn layer_size(&self) -> usize {
        steps(self.length, self.space_step)
    }

    pub fn courant(&self) -> f64 {
        self.time_step * self.speed / self.space_step
    }

    pub fn position(&self, index: usize) -> f64 {
        index as f64 * self.space_step
    }

    pub fn time(&self, layer: usize) -> f64 {
        layer as f64 * self.time_step
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("length", self.length),
            ("duration", self.duration),
            ("space step", self.space_step),
            ("time step", self.time_step),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidConfig(format!("{} must be positive, got {}", name, value)));
            }
        }
        // Inflow is prescribed on the left edge only.
        if !(self.speed.is_finite() && self.speed >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "speed must be finite and non-negative, got {}",
                self.speed
            )));
        }
        Ok(())
    }
}

/// How many steps of size `step` fit in `extent`, forgiving a rounding
/// error in the last digit.
fn steps(extent: f64, step: f64) -> usize {
    (extent / step + 1e-9).floor() as usize
}




/**
 * A complete problem: the domain plus the initial profile `u(x, 0)`, the
 * left boundary value `u(0, t)`, and the forcing `f(x, t)`.
 */
#[derive(Clone)]
pub struct Problem {
    pub domain: Domain,
    pub initial: Arc<Profile>,
    pub left_edge: Arc<Profile>,
    pub forcing: Arc<Forcing>,
}




// ============================================================================
impl Problem {

    /// A problem with zero boundary value and zero forcing.
    pub fn homogeneous<F>(domain: Domain, initial: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Self {
            domain,
            initial: Arc::new(initial),
            left_edge: Arc::new(|_: f64| 0.0),
            forcing: Arc::new(|_: f64, _: f64| 0.0),
        }
    }

    pub fn with_left_edge<F>(mut self, left_edge: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        self.left_edge = Arc::new(left_edge);
        self
    }

    pub fn with_forcing<F>(mut self, forcing: F) -> Self
    where
        F: Fn(f64, f64) -> f64 + Send + Sync + 'static,
    {
        self.forcing = Arc::new(forcing);
        self
    }

    /// The layer at `t = 0`, sampled from the initial profile.
    pub fn initial_layer(&self) -> Vec<f64> {
        (0..self.domain.layer_size())
            .map(|i| (self.initial)(self.domain.position(i)))
            .collect()
    }
}

impl fmt::Debug for Problem {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("Problem").field("domain", &self.domain).finish()
    }
}




#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]

/**
 * Initial profiles offered on the command line, centered on the middle of
 * the domain.
 */
pub enum InitialShape {
    /// A squared cosine bump one sixth of the domain wide.
    Cosine,
    /// A rectangular pulse of unit height and width `0.1`.
    Pulse,
}




// ============================================================================
impl InitialShape {

    pub fn profile(self, length: f64) -> Arc<Profile> {
        let x0 = 0.5 * length;

        match self {
            InitialShape::Cosine => {
                let dx = length / 6.0;
                Arc::new(move |x: f64| {
                    if x < x0 - 0.5 * dx || x > x0 + 0.5 * dx {
                        0.0
                    } else {
                        (std::f64::consts::PI * (x - x0) / dx).cos().powi(2)
                    }
                })
            }
            InitialShape::Pulse => Arc::new(move |x: f64| if (x - x0).abs() < 0.05 { 1.0 } else { 0.0 }),
        }
    }
}

impl std::str::FromStr for InitialShape {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cosine" => Ok(InitialShape::Cosine),
            "pulse" => Ok(InitialShape::Pulse),
            _ => Err(format!("unknown initial shape '{}'", s)),
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{Domain, InitialShape, Problem};
    use crate::error::Error;

    fn domain() -> Domain {
        Domain {
            length: 5.0,
            duration: 1.0,
            space_step: 2e-3,
            time_step: 1e-3,
            speed: 1.0,
        }
    }

    #[test]
    fn layer_counts_survive_rounding() {
        assert_eq!(domain().layer_size(), 2500);
        assert_eq!(domain().layer_count(), 1000);
        assert_eq!(domain().courant(), 0.5);
    }

    #[test]
    fn non_positive_steps_are_rejected() {
        assert!(domain().validate().is_ok());
        assert!(Domain { space_step: 0.0, ..domain() }.validate().is_err());
        assert!(Domain { time_step: -1.0, ..domain() }.validate().is_err());
        assert!(Domain { speed: f64::NAN, ..domain() }.validate().is_err());
    }

    #[test]
    fn leftward_transport_is_rejected() {
        assert!(Domain { speed: 0.0, ..domain() }.validate().is_ok());
        assert!(matches!(
            Domain { speed: -2.0, ..domain() }.validate(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn pulse_profile_is_centered() {
        let profile = InitialShape::Pulse.profile(5.0);
        let problem = Problem::homogeneous(domain(), move |x| profile(x));
        let layer = problem.initial_layer();
        assert_eq!(layer.len(), 2500);
        assert_eq!(layer[1230], 1.0);
        assert_eq!(layer[1250], 1.0);
        assert_eq!(layer[1270], 1.0);
        assert_eq!(layer[1220], 0.0);
        assert_eq!(layer[1280], 0.0);
    }
}
