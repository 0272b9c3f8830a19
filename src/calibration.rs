use crate::constants::{ADC_CEIL, PULSE_CEIL};
use crate::position::{Position, Range};
use crate::types::{Axis, Channels};
use std::error::Error;
use std::fmt;
use strum::IntoEnumIterator;

#[derive(Debug)]
pub enum CalibrationError {
    /// An input axis calibrated to a single point; it cannot be rescaled.
    DegenerateAxis { axis: Axis, value: u16 },
    /// A bound outside what the hardware can report or accept.
    OutOfDomain {
        axis: Axis,
        bound: u16,
        ceiling: u16,
    },
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationError::DegenerateAxis { axis, value } => {
                write!(
                    f,
                    "Axis {:?} is calibrated to the single value {}; the input span must be at least one count wide",
                    axis, value
                )
            }
            CalibrationError::OutOfDomain {
                axis,
                bound,
                ceiling,
            } => {
                write!(
                    f,
                    "Axis {:?} bound {} is outside the device domain 0..={}",
                    axis, bound, ceiling
                )
            }
        }
    }
}

impl Error for CalibrationError {}

/// Calibration for one leader/follower pair: which bus channel each joint
/// lives on, and the raw endpoint values measured at the two extremes of
/// travel. Endpoint pairs are stored in measurement order, so an axis whose
/// sensor runs backwards simply keeps its inverted pair and the map flips
/// direction with it.
#[derive(Debug, Clone)]
pub struct Calibration {
    pub leader_channels: Channels,
    pub follower_channels: Channels,
    pub leader_range: Range,
    pub follower_range: Range,
}

impl Calibration {
    /// Checks bounds against the device domains and rejects degenerate
    /// leader spans. A pinned follower axis is allowed; a pinned leader axis
    /// would make the rescale divide by zero.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        for axis in Axis::iter() {
            for bound in [
                self.leader_range.a.get(axis),
                self.leader_range.b.get(axis),
            ] {
                if bound > ADC_CEIL {
                    return Err(CalibrationError::OutOfDomain {
                        axis,
                        bound,
                        ceiling: ADC_CEIL,
                    });
                }
            }
            for bound in [
                self.follower_range.a.get(axis),
                self.follower_range.b.get(axis),
            ] {
                if bound > PULSE_CEIL {
                    return Err(CalibrationError::OutOfDomain {
                        axis,
                        bound,
                        ceiling: PULSE_CEIL,
                    });
                }
            }
            if self.leader_range.span_at(axis) == 0 {
                return Err(CalibrationError::DegenerateAxis {
                    axis,
                    value: self.leader_range.min_at(axis),
                });
            }
        }
        Ok(())
    }
}

impl Default for Calibration {
    /// Values measured on the reference pair of arms. Leader wrist and waist
    /// pots are mounted mirrored, hence their inverted pairs. The follower
    /// elbow range reaches below its normal working span so the stow
    /// waypoints stay inside it.
    fn default() -> Self {
        Calibration {
            leader_channels: Channels::new(1, 3, 4, 6),
            follower_channels: Channels::new(1, 3, 4, 6),
            leader_range: Range::new(
                Position::new(208, 900, 143, 874),
                Position::new(823, 150, 816, 110),
            ),
            follower_range: Range::new(
                Position::new(0, 800, 450, 620),
                Position::new(1050, 2300, 1450, 1582),
            ),
        }
    }
}

/// Pose the follower assumes before the first target arrives: gripper
/// relaxed open at its low stop, every other joint centered in its span.
pub fn rest_position(range: &Range) -> Position {
    let mut rest = Position::default();
    for axis in Axis::iter() {
        let value = match axis {
            Axis::Pinch => range.min_at(axis),
            _ => range.mid_at(axis),
        };
        rest.set(axis, value);
    }
    rest
}
