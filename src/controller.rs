use crate::bus::ServoBus;
use crate::calibration::rest_position;
use crate::clock::Clock;
use crate::constants::{PARK_SETTLE, PARK_WAYPOINTS};
use crate::endpoint::InputArm;
use crate::position::{linear_map, Position, Range};
use crate::sequence::Sequencer;
use crate::types::{Axis, Channels};
use std::cmp::Ordering;
use std::error::Error;
use std::sync::Arc;
use strum::IntoEnumIterator;
use strum_macros::Display;
use tokio::time::Duration;

/// How `step` closes the gap between the held position and the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Interpolation {
    /// Jump to the target in a single step.
    Immediate,
    /// One count per axis per step.
    UnitStep,
    /// Half the remaining distance per step, rounded up so it always lands.
    Proportional,
    /// Constant velocity sized so the move takes the requested duration.
    Timed,
}

#[derive(Debug, Clone, Copy, Default)]
struct TimedAxis {
    shadow: f64,
    rate: f64, // counts per millisecond, signed
}

/// The follower arm. Holds a current pose, a clipped target, and an
/// interpolation mode; every `step` advances current toward target and
/// flushes only the axes whose value actually changed since the last write.
pub struct OutputArm<B: ServoBus> {
    bus: B,
    channels: Channels,
    range: Range,
    current: Position,
    target: Position,
    last: Position,
    mode: Interpolation,
    timed: [TimedAxis; Axis::COUNT],
    last_tick: Duration,
    clock: Arc<dyn Clock>,
    on_mode_change: Option<Box<dyn Fn(Interpolation) + Send + Sync>>,
}

impl<B: ServoBus> OutputArm<B> {
    /// Starts at the rest pose with the target equal to it, in Immediate
    /// mode. Nothing is written until `attach` or the first `step` that
    /// changes an axis.
    pub fn new(bus: B, channels: Channels, range: Range, clock: Arc<dyn Clock>) -> Self {
        let rest = rest_position(&range);
        let mut arm = OutputArm {
            bus,
            channels,
            range,
            current: rest,
            target: rest,
            last: Position::default(),
            mode: Interpolation::Immediate,
            timed: [TimedAxis::default(); Axis::COUNT],
            last_tick: Duration::ZERO,
            clock,
            on_mode_change: None,
        };
        arm.seed_shadow();
        arm
    }

    pub fn current(&self) -> Position {
        self.current
    }

    pub fn target(&self) -> Position {
        self.target
    }

    pub fn mode(&self) -> Interpolation {
        self.mode
    }

    pub fn range(&self) -> &Range {
        &self.range
    }

    pub fn reached(&self) -> bool {
        self.current == self.target
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn clock_handle(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Registers a sink for mode transitions. Fires on every effective
    /// change, including the ones `park` makes on entry and exit.
    pub fn notify_mode_changes<F>(&mut self, callback: F)
    where
        F: Fn(Interpolation) + Send + Sync + 'static,
    {
        self.on_mode_change = Some(Box::new(callback));
    }

    pub fn set_mode(&mut self, mode: Interpolation) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        if mode == Interpolation::Timed {
            // Hold position until the next target supplies a velocity.
            self.seed_shadow();
        }
        if let Some(callback) = &self.on_mode_change {
            callback(mode);
        }
    }

    /// Sets the target, clipped into this arm's range. In Timed mode the
    /// move is re-planned from the current pose: a missing duration counts
    /// as zero, and durations under a millisecond are floored to one.
    pub fn set_target(&mut self, target: Position, duration: Option<Duration>) {
        self.target = target.clipped(&self.range);
        if self.mode == Interpolation::Timed {
            self.retime(duration.unwrap_or(Duration::ZERO));
        }
    }

    /// Retargets from the leader's pose, rescaled axis by axis from the
    /// leader's calibrated range into this arm's.
    pub fn map_from<S: ServoBus>(&mut self, leader: &InputArm<S>, duration: Option<Duration>) {
        let source = leader.position();
        let from = leader.range();
        let mut mapped = Position::default();
        for axis in Axis::iter() {
            mapped.set(
                axis,
                linear_map(
                    source.get(axis),
                    from.a.get(axis),
                    from.b.get(axis),
                    self.range.a.get(axis),
                    self.range.b.get(axis),
                ),
            );
        }
        self.set_target(mapped, duration);
    }

    fn seed_shadow(&mut self) {
        for axis in Axis::iter() {
            let slot = &mut self.timed[axis.index()];
            slot.shadow = self.current.get(axis) as f64;
            slot.rate = 0.0;
        }
        self.last_tick = self.clock.now();
    }

    fn retime(&mut self, duration: Duration) {
        let ms = (duration.as_millis() as f64).max(1.0);
        for axis in Axis::iter() {
            let slot = &mut self.timed[axis.index()];
            slot.shadow = self.current.get(axis) as f64;
            slot.rate = (self.target.get(axis) as f64 - slot.shadow) / ms;
        }
        self.last_tick = self.clock.now();
    }

    /// One interpolation tick: advance the held pose toward the target per
    /// the active mode, then write every axis whose value changed.
    pub async fn step(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let now = self.clock.now();
        let elapsed_ms = now.saturating_sub(self.last_tick).as_secs_f64() * 1000.0;
        self.last_tick = now;

        let mut next = self.current;
        match self.mode {
            Interpolation::Immediate => {
                next = self.target;
            }
            Interpolation::UnitStep => {
                for axis in Axis::iter() {
                    let here = self.current.get(axis);
                    next.set(
                        axis,
                        match self.target.get(axis).cmp(&here) {
                            Ordering::Greater => here + 1,
                            Ordering::Less => here - 1,
                            Ordering::Equal => here,
                        },
                    );
                }
            }
            Interpolation::Proportional => {
                for axis in Axis::iter() {
                    let here = self.current.get(axis) as i32;
                    let delta = self.target.get(axis) as i32 - here;
                    // Ceiling of half the gap, so a gap of one still closes.
                    let magnitude = (delta.abs() + 1) / 2;
                    next.set(axis, (here + magnitude * delta.signum()) as u16);
                }
            }
            Interpolation::Timed => {
                for axis in Axis::iter() {
                    let slot = &mut self.timed[axis.index()];
                    let want = self.target.get(axis) as f64;
                    slot.shadow += slot.rate * elapsed_ms;
                    let overran = (slot.rate > 0.0 && slot.shadow > want)
                        || (slot.rate < 0.0 && slot.shadow < want);
                    if overran {
                        slot.shadow = want;
                        slot.rate = 0.0;
                    }
                    // The shadow carries the fraction; the pose truncates.
                    next.set(axis, slot.shadow as u16);
                }
            }
        }

        self.current = next.clipped(&self.range);
        self.flush().await
    }

    async fn flush(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        for axis in Axis::iter() {
            let value = self.current.get(axis);
            if value != self.last.get(axis) {
                self.bus.move_to(self.channels.get(axis), value).await?;
                self.last.set(axis, value);
            }
        }
        Ok(())
    }

    /// Writes every axis unconditionally, energizing the servos and syncing
    /// the write-suppression state with the hardware.
    pub async fn attach(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        for axis in Axis::iter() {
            let value = self.current.get(axis);
            self.bus.move_to(self.channels.get(axis), value).await?;
            self.last.set(axis, value);
        }
        Ok(())
    }

    /// Cuts drive on every axis. The pose state is kept; `attach` restores
    /// the hold.
    pub async fn detach(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        for axis in Axis::iter() {
            self.bus.release(self.channels.get(axis)).await?;
        }
        Ok(())
    }

    /// Folds the arm into its stowed pose by walking the park waypoints in
    /// Immediate mode, settling at each one, then restores the prior mode.
    pub async fn park(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        log::debug!("Parking from {}", self.current);
        let previous = self.mode;
        self.set_mode(Interpolation::Immediate);
        self.attach().await?;
        Sequencer::new(PARK_SETTLE).run(self, &PARK_WAYPOINTS).await?;
        self.set_mode(previous);
        Ok(())
    }
}
