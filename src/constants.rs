use crate::position::Position;
use std::time::Duration;

pub const VENDOR_ID: u16 = 0x0483;
pub const PRODUCT_ID: u16 = 0x5750;
pub const SIGNATURE: u8 = 0x55;

// Command constants
pub const CMD_SERVO_MOVE: u8 = 0x03;
pub const CMD_GET_BATTERY_VOLTAGE: u8 = 0x0f;
pub const CMD_SERVO_STOP: u8 = 0x14;
pub const CMD_GET_SERVO_POSITION: u8 = 0x15;

// Device value domains. Follower channels take pulse widths in microseconds
// (0 means "output disabled" on the follower box, so it is a legal bound).
// Leader channels report 10-bit pot readings.
pub const PULSE_CEIL: u16 = 2500;
pub const ADC_CEIL: u16 = 1023;

// How many raw samples an input read averages per axis.
pub const DEFAULT_SAMPLES: u32 = 1;

// Stow sequence: lay the arm down across the top of the box, base last.
// Measured on the bench; do not reorder, the elbow must clear the lid.
pub const PARK_WAYPOINTS: [Position; 4] = [
    Position::new(1050, 2100, 1450, 1582),
    Position::new(1050, 2100, 1450, 620),
    Position::new(1050, 2100, 580, 620),
    Position::new(1050, 2300, 450, 620),
];
pub const PARK_SETTLE: Duration = Duration::from_millis(1000);

// Push-button gesture timing. Long-press and multi-tap windows are
// multiples of the debounce interval.
pub const DEBOUNCE: Duration = Duration::from_millis(36);
pub const LONG_PRESS: Duration = Duration::from_millis(36 * 20);
pub const MULTI_TAP: Duration = Duration::from_millis(36 * 7);

// The leader box exposes its pushbutton on a spare ADC channel.
pub const BUTTON_CHANNEL: u8 = 5;
pub const BUTTON_THRESHOLD: u16 = 512;
