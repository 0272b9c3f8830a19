use crate::constants::*;
use crate::transport::{DeviceId, Transport, TransportError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::error::Error;
use std::sync::Arc;

/// Servo-channel operations both arms rely on. The leader implementation
/// reports pot counts through `read_position`; the follower accepts pulse
/// widths through `move_to`. The motion engine only ever talks to this trait,
/// so tests swap in [`MockBus`] and the hardware never has to be present.
#[async_trait]
pub trait ServoBus: Send {
    async fn read_position(&mut self, channel: u8) -> Result<u16, Box<dyn Error + Send + Sync>>;
    async fn move_to(&mut self, channel: u8, value: u16) -> Result<(), Box<dyn Error + Send + Sync>>;
    /// Cut drive to a channel so the joint can be moved by hand.
    async fn release(&mut self, channel: u8) -> Result<(), Box<dyn Error + Send + Sync>>;
    async fn battery_voltage(&mut self) -> Result<f32, Box<dyn Error + Send + Sync>>;
}

/// Decode a single-servo position reply: `[count, id, lo, hi]`.
fn parse_position_reply(channel: u8, data: &[u8]) -> Result<u16, TransportError> {
    if data.len() < 4 {
        return Err(TransportError::InvalidResponse {
            expected_len: 4,
            actual_len: data.len(),
            raw_data: data.to_vec(),
        });
    }
    if data[1] != channel {
        return Err(TransportError::DeviceError(format!(
            "Position reply for servo {} while polling servo {}",
            data[1], channel
        )));
    }
    Ok(data[2] as u16 | ((data[3] as u16) << 8))
}

/// Bus backed by one Hiwonder controller board over USB HID or Bluetooth.
pub struct HiBus {
    transport: Transport,
}

impl HiBus {
    pub async fn open(id: &DeviceId) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(HiBus {
            transport: Transport::open(id).await?,
        })
    }
}

#[async_trait]
impl ServoBus for HiBus {
    async fn read_position(&mut self, channel: u8) -> Result<u16, Box<dyn Error + Send + Sync>> {
        self.transport
            .send(CMD_GET_SERVO_POSITION, &[1, channel])
            .await?;
        let data = self.transport.recv(CMD_GET_SERVO_POSITION).await?;
        Ok(parse_position_reply(channel, &data)?)
    }

    async fn move_to(&mut self, channel: u8, value: u16) -> Result<(), Box<dyn Error + Send + Sync>> {
        // Duration 0 lets the firmware slew at full speed; pacing is the
        // stepper's job, not the board's.
        let data = [
            1u8,
            0,
            0,
            channel,
            (value & 0xff) as u8,
            ((value & 0xff00) >> 8) as u8,
        ];
        self.transport.send(CMD_SERVO_MOVE, &data).await
    }

    async fn release(&mut self, channel: u8) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.transport.send(CMD_SERVO_STOP, &[1, channel]).await
    }

    async fn battery_voltage(&mut self) -> Result<f32, Box<dyn Error + Send + Sync>> {
        self.transport.send(CMD_GET_BATTERY_VOLTAGE, &[]).await?;
        let data = self.transport.recv(CMD_GET_BATTERY_VOLTAGE).await?;

        if data.len() >= 2 {
            Ok((data[0] as u16 | ((data[1] as u16) << 8)) as f32 / 1000.0)
        } else {
            Err("Invalid battery voltage data".into())
        }
    }
}

// One board, two owners: the leader endpoint polls joints while the gesture
// reader polls the button channel. Sharing goes through an async mutex so a
// read in flight is never interleaved with another command's reply.
#[async_trait]
impl<B: ServoBus> ServoBus for Arc<tokio::sync::Mutex<B>> {
    async fn read_position(&mut self, channel: u8) -> Result<u16, Box<dyn Error + Send + Sync>> {
        self.lock().await.read_position(channel).await
    }

    async fn move_to(&mut self, channel: u8, value: u16) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.lock().await.move_to(channel, value).await
    }

    async fn release(&mut self, channel: u8) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.lock().await.release(channel).await
    }

    async fn battery_voltage(&mut self) -> Result<f32, Box<dyn Error + Send + Sync>> {
        self.lock().await.battery_voltage().await
    }
}

/// In-memory bus double. Reads come from per-channel scripts (a queue of
/// one-shot values over a persistent fallback); writes and releases are
/// recorded for assertions.
#[derive(Default)]
pub struct MockBus {
    queued: HashMap<u8, VecDeque<u16>>,
    held: HashMap<u8, u16>,
    pub writes: Vec<(u8, u16)>,
    pub released: Vec<u8>,
    pub voltage: f32,
}

impl MockBus {
    pub fn new() -> Self {
        MockBus {
            voltage: 7.4,
            ..MockBus::default()
        }
    }

    /// Script one reading; consumed in FIFO order before any held value.
    pub fn queue_reading(&mut self, channel: u8, value: u16) {
        self.queued.entry(channel).or_default().push_back(value);
    }

    /// Value returned whenever the channel's queue is empty.
    pub fn set_reading(&mut self, channel: u8, value: u16) {
        self.held.insert(channel, value);
    }

    /// Every value written to `channel`, oldest first.
    pub fn writes_to(&self, channel: u8) -> Vec<u16> {
        self.writes
            .iter()
            .filter(|(ch, _)| *ch == channel)
            .map(|(_, value)| *value)
            .collect()
    }

    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }
}

#[async_trait]
impl ServoBus for MockBus {
    async fn read_position(&mut self, channel: u8) -> Result<u16, Box<dyn Error + Send + Sync>> {
        if let Some(value) = self.queued.get_mut(&channel).and_then(|q| q.pop_front()) {
            return Ok(value);
        }
        match self.held.get(&channel) {
            Some(&value) => Ok(value),
            None => Err(Box::new(TransportError::DeviceError(format!(
                "No reading scripted for channel {}",
                channel
            )))),
        }
    }

    async fn move_to(&mut self, channel: u8, value: u16) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.writes.push((channel, value));
        Ok(())
    }

    async fn release(&mut self, channel: u8) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.released.push(channel);
        Ok(())
    }

    async fn battery_voltage(&mut self) -> Result<f32, Box<dyn Error + Send + Sync>> {
        Ok(self.voltage)
    }
}
