use crate::bus::ServoBus;
use crate::calibration::CalibrationError;
use crate::constants::DEFAULT_SAMPLES;
use crate::position::{clip, Position, Range};
use crate::types::{Axis, Channels};
use std::error::Error;
use strum::IntoEnumIterator;

/// The leader arm: four pots read over the bus, one per joint. Every reading
/// is averaged, clipped into the calibrated range, and cached, so the rest of
/// the pipeline only ever sees in-range values.
pub struct InputArm<B: ServoBus> {
    bus: B,
    channels: Channels,
    range: Range,
    current: Position,
    samples: u32,
}

impl<B: ServoBus> InputArm<B> {
    /// Rejects any axis calibrated to a single point; the affine map out of
    /// this range would otherwise divide by zero.
    pub fn new(bus: B, channels: Channels, range: Range) -> Result<Self, CalibrationError> {
        for axis in Axis::iter() {
            if range.span_at(axis) == 0 {
                return Err(CalibrationError::DegenerateAxis {
                    axis,
                    value: range.min_at(axis),
                });
            }
        }
        let mut current = Position::default();
        for axis in Axis::iter() {
            current.set(axis, range.mid_at(axis));
        }
        Ok(InputArm {
            bus,
            channels,
            range,
            current,
            samples: DEFAULT_SAMPLES,
        })
    }

    /// Readings per reported value. Higher counts smooth pot jitter at the
    /// cost of bus traffic.
    pub fn set_samples(&mut self, samples: u32) {
        self.samples = samples.max(1);
    }

    /// Last reported pose. Mid-range until the first read lands.
    pub fn position(&self) -> Position {
        self.current
    }

    pub fn range(&self) -> &Range {
        &self.range
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub async fn read_axis(&mut self, axis: Axis) -> Result<u16, Box<dyn Error + Send + Sync>> {
        let channel = self.channels.get(axis);
        let mut sum: u32 = 0;
        for _ in 0..self.samples {
            sum += self.bus.read_position(channel).await? as u32;
        }
        let averaged = (sum / self.samples) as u16;
        let clipped = clip(averaged, self.range.a.get(axis), self.range.b.get(axis));
        self.current.set(axis, clipped);
        Ok(clipped)
    }

    /// Refresh all four joints and report the clipped pose.
    pub async fn read(&mut self) -> Result<Position, Box<dyn Error + Send + Sync>> {
        for axis in Axis::iter() {
            self.read_axis(axis).await?;
        }
        Ok(self.current)
    }

    /// Cut drive on every joint so the operator can move the arm freely.
    pub async fn release_all(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        for axis in Axis::iter() {
            self.bus.release(self.channels.get(axis)).await?;
        }
        Ok(())
    }
}
