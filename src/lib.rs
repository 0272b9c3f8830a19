mod bus;
mod buttons;
mod calibration;
mod clock;
mod constants;
mod controller;
mod endpoint;
mod position;
mod sequence;
mod transport;
mod types;

pub use bus::{HiBus, MockBus, ServoBus};
pub use buttons::{BusButton, ButtonInput, Gesture, GestureReader};
pub use calibration::{rest_position, Calibration, CalibrationError};
pub use clock::{Clock, FakeClock, SystemClock};
pub use controller::{Interpolation, OutputArm};
pub use endpoint::InputArm;
pub use position::{clip, linear_map, Position, Range};
pub use sequence::Sequencer;
pub use transport::{DeviceId, Transport, TransportError};
pub use types::{Axis, Channels};

// Re-export commonly used items
pub use constants::{BUTTON_CHANNEL, PARK_SETTLE, PARK_WAYPOINTS, PRODUCT_ID, VENDOR_ID};
