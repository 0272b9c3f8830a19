use strum_macros::EnumIter;

/// The four joints of a mimic arm, gripper first, base last.
#[derive(Debug, EnumIter, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Axis {
    Pinch,
    Wrist,
    Elbow,
    Waist,
}

impl Axis {
    pub const COUNT: usize = 4;

    /// Stable slot for per-axis scratch arrays.
    pub fn index(self) -> usize {
        match self {
            Axis::Pinch => 0,
            Axis::Wrist => 1,
            Axis::Elbow => 2,
            Axis::Waist => 3,
        }
    }
}

/// Hardware channel ids for one arm box, one per axis. The leader and the
/// follower are wired independently, so each endpoint carries its own set.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Channels {
    pub pinch: u8,
    pub wrist: u8,
    pub elbow: u8,
    pub waist: u8,
}

impl Channels {
    pub const fn new(pinch: u8, wrist: u8, elbow: u8, waist: u8) -> Self {
        Channels {
            pinch,
            wrist,
            elbow,
            waist,
        }
    }

    pub fn get(&self, axis: Axis) -> u8 {
        match axis {
            Axis::Pinch => self.pinch,
            Axis::Wrist => self.wrist,
            Axis::Elbow => self.elbow,
            Axis::Waist => self.waist,
        }
    }
}
