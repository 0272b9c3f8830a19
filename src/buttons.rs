use crate::bus::ServoBus;
use crate::clock::Clock;
use crate::constants::{BUTTON_THRESHOLD, DEBOUNCE, LONG_PRESS, MULTI_TAP};
use async_trait::async_trait;
use std::error::Error;
use std::sync::Arc;

/// Instantaneous state of the trigger button, true while contact is closed.
#[async_trait]
pub trait ButtonInput: Send {
    async fn pressed(&mut self) -> Result<bool, Box<dyn Error + Send + Sync>>;
}

/// Button wired to a spare pot channel on the leader board, pulled high at
/// rest and shorted low when pressed.
pub struct BusButton<B: ServoBus> {
    bus: B,
    channel: u8,
}

impl<B: ServoBus> BusButton<B> {
    pub fn new(bus: B, channel: u8) -> Self {
        BusButton { bus, channel }
    }
}

#[async_trait]
impl<B: ServoBus> ButtonInput for BusButton<B> {
    async fn pressed(&mut self) -> Result<bool, Box<dyn Error + Send + Sync>> {
        Ok(self.bus.read_position(self.channel).await? < BUTTON_THRESHOLD)
    }
}

/// Tap-count and hold-length classification of one button press run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    SingleShort,
    SingleLong,
    DoubleShort,
    DoubleLong,
    TripleShort,
    TripleLong,
}

impl Gesture {
    pub fn is_long(self) -> bool {
        matches!(
            self,
            Gesture::SingleLong | Gesture::DoubleLong | Gesture::TripleLong
        )
    }
}

/// Debounces a button and classifies presses into [`Gesture`]s: up to three
/// taps, each run either short or long. While a long press stays held, every
/// `poll` keeps reporting the original gesture (a held `DoubleLong` does not
/// decay into `SingleLong`), and the release that ends it is swallowed so the
/// trailing partial hold never reads as a fresh short press.
pub struct GestureReader<I: ButtonInput> {
    input: I,
    clock: Arc<dyn Clock>,
    latched: Option<Gesture>,
}

impl<I: ButtonInput> GestureReader<I> {
    pub fn new(input: I, clock: Arc<dyn Clock>) -> Self {
        GestureReader {
            input,
            clock,
            latched: None,
        }
    }

    /// One classification pass. Returns immediately with `None` when the
    /// button is up; otherwise blocks through the gesture (multi-tap windows
    /// included) and reports it.
    pub async fn poll(&mut self) -> Result<Option<Gesture>, Box<dyn Error + Send + Sync>> {
        let gesture = self.classify().await?;
        match (gesture, self.latched) {
            (Some(current), Some(held)) if current.is_long() => Ok(Some(held)),
            (Some(current), None) if current.is_long() => {
                self.latched = Some(current);
                Ok(Some(current))
            }
            (_, Some(_)) => {
                self.latched = None;
                Ok(None)
            }
            (current, None) => Ok(current),
        }
    }

    async fn classify(&mut self) -> Result<Option<Gesture>, Box<dyn Error + Send + Sync>> {
        if !self.pressed_debounced().await? {
            return Ok(None);
        }
        if self.outlasts_long_window().await? {
            return Ok(Some(Gesture::SingleLong));
        }
        if !self.retap_within_window().await? {
            return Ok(Some(Gesture::SingleShort));
        }
        if self.outlasts_long_window().await? {
            return Ok(Some(Gesture::DoubleLong));
        }
        if !self.retap_within_window().await? {
            return Ok(Some(Gesture::DoubleShort));
        }
        if self.outlasts_long_window().await? {
            return Ok(Some(Gesture::TripleLong));
        }
        // Three taps is the ceiling; report on release without another window.
        Ok(Some(Gesture::TripleShort))
    }

    /// True once the contact has stayed closed for the debounce interval.
    async fn pressed_debounced(&mut self) -> Result<bool, Box<dyn Error + Send + Sync>> {
        let deadline = self.clock.now() + DEBOUNCE;
        while self.input.pressed().await? {
            if self.clock.now() >= deadline {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// True if the press currently in progress holds past the long-press
    /// window, false the moment it releases first.
    async fn outlasts_long_window(&mut self) -> Result<bool, Box<dyn Error + Send + Sync>> {
        let deadline = self.clock.now() + LONG_PRESS;
        while self.pressed_debounced().await? {
            if self.clock.now() >= deadline {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Watches for the next tap of a multi-tap run.
    async fn retap_within_window(&mut self) -> Result<bool, Box<dyn Error + Send + Sync>> {
        let deadline = self.clock.now() + MULTI_TAP;
        while self.clock.now() < deadline {
            if self.pressed_debounced().await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MockBus;
    use crate::clock::FakeClock;
    use tokio::time::Duration;

    struct ScriptedButton {
        clock: Arc<FakeClock>,
        intervals: Vec<(Duration, Duration)>,
    }

    #[async_trait]
    impl ButtonInput for ScriptedButton {
        async fn pressed(&mut self) -> Result<bool, Box<dyn Error + Send + Sync>> {
            let now = self.clock.now();
            Ok(self
                .intervals
                .iter()
                .any(|(from, to)| now >= *from && now < *to))
        }
    }

    fn reader(spans_ms: &[(u64, u64)]) -> GestureReader<ScriptedButton> {
        let clock = Arc::new(FakeClock::with_auto_tick(Duration::from_millis(4)));
        let intervals = spans_ms
            .iter()
            .map(|&(from, to)| (Duration::from_millis(from), Duration::from_millis(to)))
            .collect();
        let button = ScriptedButton {
            clock: clock.clone(),
            intervals,
        };
        GestureReader::new(button, clock)
    }

    /// Drains the reader until the line stays quiet, collecting gestures.
    /// Idle polls are cheap (two clock queries), so the quiet threshold is
    /// generous enough to ride out gaps between scripted presses.
    async fn drain(reader: &mut GestureReader<ScriptedButton>) -> Vec<Gesture> {
        let mut seen = Vec::new();
        let mut quiet = 0;
        while quiet < 60 {
            match reader.poll().await.unwrap() {
                Some(gesture) => {
                    seen.push(gesture);
                    quiet = 0;
                }
                None => quiet += 1,
            }
        }
        seen
    }

    #[tokio::test]
    async fn quiet_line_reports_nothing() {
        let mut reader = reader(&[]);
        assert_eq!(reader.poll().await.unwrap(), None);
        assert_eq!(reader.poll().await.unwrap(), None);
    }

    #[tokio::test]
    async fn single_short_press() {
        let mut reader = reader(&[(0, 100)]);
        assert_eq!(drain(&mut reader).await, vec![Gesture::SingleShort]);
    }

    #[tokio::test]
    async fn single_long_press() {
        let mut reader = reader(&[(0, 900)]);
        let seen = drain(&mut reader).await;
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|g| *g == Gesture::SingleLong));
    }

    #[tokio::test]
    async fn blip_shorter_than_debounce_is_ignored() {
        let mut reader = reader(&[(0, 20)]);
        assert_eq!(drain(&mut reader).await, vec![]);
    }

    #[tokio::test]
    async fn double_tap_within_the_window() {
        let mut reader = reader(&[(0, 100), (150, 250)]);
        assert_eq!(drain(&mut reader).await, vec![Gesture::DoubleShort]);
    }

    #[tokio::test]
    async fn taps_outside_the_window_are_separate_singles() {
        let mut reader = reader(&[(0, 100), (800, 900)]);
        assert_eq!(
            drain(&mut reader).await,
            vec![Gesture::SingleShort, Gesture::SingleShort]
        );
    }

    #[tokio::test]
    async fn triple_tap_reports_on_third_release() {
        let mut reader = reader(&[(0, 100), (150, 250), (300, 400)]);
        assert_eq!(drain(&mut reader).await, vec![Gesture::TripleShort]);
    }

    #[tokio::test]
    async fn triple_tap_held_goes_long() {
        let mut reader = reader(&[(0, 100), (150, 250), (300, 1300)]);
        let seen = drain(&mut reader).await;
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|g| *g == Gesture::TripleLong));
    }

    #[tokio::test]
    async fn held_double_long_keeps_its_tap_count() {
        let mut reader = reader(&[(0, 100), (150, 3000)]);
        let seen = drain(&mut reader).await;
        assert!(seen.len() >= 2, "expected hold repeats, got {:?}", seen);
        assert!(seen.iter().all(|g| *g == Gesture::DoubleLong));
    }

    #[tokio::test]
    async fn release_after_a_long_hold_never_reads_as_a_short() {
        let mut reader = reader(&[(0, 900)]);
        let seen = drain(&mut reader).await;
        assert!(seen.iter().all(|g| *g == Gesture::SingleLong));
    }

    #[tokio::test]
    async fn bus_button_reads_low_as_pressed() {
        let mut bus = MockBus::new();
        bus.set_reading(5, 12);
        let mut button = BusButton::new(bus, 5);
        assert!(button.pressed().await.unwrap());

        let mut bus = MockBus::new();
        bus.set_reading(5, 1015);
        let mut button = BusButton::new(bus, 5);
        assert!(!button.pressed().await.unwrap());
    }
}
