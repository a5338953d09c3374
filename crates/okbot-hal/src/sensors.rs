//! Read-only sensor surface: ultrasonic distance and the grayscale module.
//!
//! Sensors are read concurrently by the safety monitor, the autonomous loops,
//! and the status command, so the trait takes `&self` and must be `Sync`.

use okbot_types::{GrayscaleTriple, LineStatus, RobotConfig, RobotError};

pub trait Sensors: Send + Sync {
    /// Distance ahead in centimetres. Negative values mean the echo was not
    /// valid and must be ignored by the caller.
    fn read_distance(&self) -> Result<f32, RobotError>;

    fn read_grayscale(&self) -> Result<GrayscaleTriple, RobotError>;

    /// `true` when the triple indicates a drop-off under the car.
    fn is_cliff(&self, values: &GrayscaleTriple) -> bool;

    /// Which of the (left, centre, right) sensors currently sees the line.
    fn line_status(&self, values: &GrayscaleTriple) -> LineStatus;
}

/// Threshold classifier used by drivers that expose only raw values.
///
/// A value at or below its cliff reference means the surface is too far away
/// to reflect (a drop-off); a value at or below its line reference means the
/// sensor sits over a dark line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrayscaleReference {
    pub cliff: GrayscaleTriple,
    pub line: GrayscaleTriple,
}

impl GrayscaleReference {
    pub fn new(cliff: GrayscaleTriple, line: GrayscaleTriple) -> Self {
        Self { cliff, line }
    }

    /// Default line reference with the configured cliff reference.
    pub fn from_config(config: &RobotConfig) -> Self {
        Self {
            cliff: config.cliff_reference,
            ..Self::default()
        }
    }

    pub fn is_cliff(&self, values: &GrayscaleTriple) -> bool {
        values.iter().zip(self.cliff.iter()).any(|(v, r)| v <= r)
    }

    pub fn line_status(&self, values: &GrayscaleTriple) -> LineStatus {
        [
            values[0] <= self.line[0],
            values[1] <= self.line[1],
            values[2] <= self.line[2],
        ]
    }
}

impl Default for GrayscaleReference {
    fn default() -> Self {
        Self {
            cliff: [200, 200, 200],
            line: [1000, 1000, 1000],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_dark_channel_is_a_cliff() {
        let r = GrayscaleReference::default();
        assert!(!r.is_cliff(&[1500, 1500, 1500]));
        assert!(r.is_cliff(&[1500, 150, 1500]));
        assert!(r.is_cliff(&[200, 1500, 1500]));
    }

    #[test]
    fn configured_cliff_reference_moves_the_threshold() {
        let config = RobotConfig {
            cliff_reference: [600, 600, 600],
            ..RobotConfig::default()
        };
        let r = GrayscaleReference::from_config(&config);
        assert!(!GrayscaleReference::default().is_cliff(&[500, 1500, 1500]));
        assert!(r.is_cliff(&[500, 1500, 1500]));
        assert_eq!(r.line, GrayscaleReference::default().line);
    }

    #[test]
    fn line_status_is_per_channel() {
        let r = GrayscaleReference::default();
        assert_eq!(r.line_status(&[1500, 800, 1500]), [false, true, false]);
        assert_eq!(r.line_status(&[900, 1500, 1500]), [true, false, false]);
        assert_eq!(r.line_status(&[1500, 1500, 1500]), [false, false, false]);
    }
}
