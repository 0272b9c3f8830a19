use crate::types::Axis;
use std::fmt;
use std::ops::{Add, Sub};
use strum::IntoEnumIterator;

/// One arm pose: a raw integer value per joint. Values are device units
/// (pot counts on the leader, pulse-width microseconds on the follower).
/// The type itself carries no bounds; each endpoint clips into its own
/// [`Range`] on every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub pinch: u16,
    pub wrist: u16,
    pub elbow: u16,
    pub waist: u16,
}

impl Position {
    pub const fn new(pinch: u16, wrist: u16, elbow: u16, waist: u16) -> Self {
        Position {
            pinch,
            wrist,
            elbow,
            waist,
        }
    }

    #[inline]
    pub fn get(&self, axis: Axis) -> u16 {
        match axis {
            Axis::Pinch => self.pinch,
            Axis::Wrist => self.wrist,
            Axis::Elbow => self.elbow,
            Axis::Waist => self.waist,
        }
    }

    #[inline]
    pub fn set(&mut self, axis: Axis, value: u16) {
        match axis {
            Axis::Pinch => self.pinch = value,
            Axis::Wrist => self.wrist = value,
            Axis::Elbow => self.elbow = value,
            Axis::Waist => self.waist = value,
        }
    }

    /// Largest per-axis distance to `other`. A UnitStep ramp finishes in
    /// exactly this many steps.
    pub fn max_delta(&self, other: &Position) -> u16 {
        let mut worst = 0u16;
        for axis in Axis::iter() {
            worst = worst.max(self.get(axis).abs_diff(other.get(axis)));
        }
        worst
    }

    /// Copy of `self` with every axis clamped into `range`.
    pub fn clipped(&self, range: &Range) -> Position {
        Position {
            pinch: clip(self.pinch, range.a.pinch, range.b.pinch),
            wrist: clip(self.wrist, range.a.wrist, range.b.wrist),
            elbow: clip(self.elbow, range.a.elbow, range.b.elbow),
            waist: clip(self.waist, range.a.waist, range.b.waist),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(pinch {} wrist {} elbow {} waist {})",
            self.pinch, self.wrist, self.elbow, self.waist
        )
    }
}

/// Field-wise saturating sum.
impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position {
            pinch: self.pinch.saturating_add(rhs.pinch),
            wrist: self.wrist.saturating_add(rhs.wrist),
            elbow: self.elbow.saturating_add(rhs.elbow),
            waist: self.waist.saturating_add(rhs.waist),
        }
    }
}

/// Field-wise difference, floored at zero per axis.
impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position {
            pinch: self.pinch.saturating_sub(rhs.pinch),
            wrist: self.wrist.saturating_sub(rhs.wrist),
            elbow: self.elbow.saturating_sub(rhs.elbow),
            waist: self.waist.saturating_sub(rhs.waist),
        }
    }
}

/// Clamp `value` into the span between `a` and `b`, whichever order they
/// arrive in. Total: every input maps to a value inside the span.
pub fn clip(value: u16, a: u16, b: u16) -> u16 {
    value.clamp(a.min(b), a.max(b))
}

/// Per-axis inclusive bounds for an endpoint. `a` and `b` carry no ordering
/// guarantee: a joint whose pot or horn runs backwards is calibrated with an
/// inverted pair, and the mapping in [`linear_map`] relies on that to flip
/// direction. Derive effective bounds through `min_at`/`max_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub a: Position,
    pub b: Position,
}

impl Range {
    pub const fn new(a: Position, b: Position) -> Self {
        Range { a, b }
    }

    #[inline]
    pub fn min_at(&self, axis: Axis) -> u16 {
        self.a.get(axis).min(self.b.get(axis))
    }

    #[inline]
    pub fn max_at(&self, axis: Axis) -> u16 {
        self.a.get(axis).max(self.b.get(axis))
    }

    /// Midpoint of the effective span, truncated.
    pub fn mid_at(&self, axis: Axis) -> u16 {
        let lo = self.min_at(axis);
        let hi = self.max_at(axis);
        lo + (hi - lo) / 2
    }

    /// Width of the effective span. Zero means the axis is pinned.
    pub fn span_at(&self, axis: Axis) -> u16 {
        self.max_at(axis) - self.min_at(axis)
    }

    pub fn contains(&self, pos: &Position) -> bool {
        for axis in Axis::iter() {
            let v = pos.get(axis);
            if v < self.min_at(axis) || v > self.max_at(axis) {
                return false;
            }
        }
        true
    }
}

/// Two-point affine rescale: `in_a` maps to `out_a`, `in_b` to `out_b`,
/// everything between proportionally, truncating toward zero. Inverted pairs
/// flip direction. All arithmetic runs in i64 so no intermediate can wrap;
/// the result saturates into the u16 domain before callers clip it into
/// their own range.
///
/// The input pair must be non-degenerate; calibration validation rejects
/// `in_a == in_b` before any endpoint is built.
pub fn linear_map(value: u16, in_a: u16, in_b: u16, out_a: u16, out_b: u16) -> u16 {
    let run = in_b as i64 - in_a as i64;
    debug_assert!(run != 0, "degenerate input span");
    let rise = out_b as i64 - out_a as i64;
    let mapped = (value as i64 - in_a as i64) * rise / run + out_a as i64;
    mapped.clamp(0, u16::MAX as i64) as u16
}
