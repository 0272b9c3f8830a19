use crate::bus::ServoBus;
use crate::controller::OutputArm;
use crate::position::Position;
use std::error::Error;
use tokio::time::Duration;

/// Drives an arm through a fixed list of poses, giving the hardware a settle
/// window at each one. The window is enforced by polling the arm's own clock,
/// so steps keep flowing while the time passes and slower interpolation modes
/// still make progress.
pub struct Sequencer {
    settle: Duration,
}

impl Sequencer {
    pub fn new(settle: Duration) -> Self {
        Sequencer { settle }
    }

    pub async fn run<B: ServoBus>(
        &self,
        arm: &mut OutputArm<B>,
        waypoints: &[Position],
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let clock = arm.clock_handle();
        for (index, waypoint) in waypoints.iter().enumerate() {
            log::debug!("Waypoint {}/{}: {}", index + 1, waypoints.len(), waypoint);
            arm.set_target(*waypoint, Some(self.settle));
            let deadline = clock.now() + self.settle;
            loop {
                arm.step().await?;
                if clock.now() >= deadline {
                    break;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MockBus;
    use crate::clock::FakeClock;
    use crate::controller::Interpolation;
    use crate::position::Range;
    use crate::types::Channels;
    use std::sync::Arc;

    fn stage() -> (Arc<FakeClock>, OutputArm<MockBus>) {
        // Two clock queries per loop pass (one in step, one for the deadline
        // check), so a 10ms settle at a 1ms tick runs exactly 5 passes.
        let clock = Arc::new(FakeClock::with_auto_tick(Duration::from_millis(1)));
        let range = Range::new(
            Position::new(0, 800, 450, 620),
            Position::new(1050, 2300, 1450, 1582),
        );
        let arm = OutputArm::new(MockBus::new(), Channels::new(1, 3, 4, 6), range, clock.clone());
        (clock, arm)
    }

    #[tokio::test]
    async fn visits_waypoints_in_order_and_settles_at_each() {
        let (_clock, mut arm) = stage();
        arm.attach().await.unwrap();
        arm.bus_mut().clear_writes();

        let route = [
            Position::new(100, 900, 500, 700),
            Position::new(200, 900, 500, 700),
            Position::new(200, 1000, 500, 700),
        ];
        Sequencer::new(Duration::from_millis(10))
            .run(&mut arm, &route)
            .await
            .unwrap();

        assert_eq!(arm.bus().writes_to(1), vec![100, 200]);
        assert_eq!(arm.bus().writes_to(3), vec![900, 1000]);
        assert_eq!(arm.bus().writes_to(4), vec![500]);
        assert_eq!(arm.current(), route[2]);
    }

    #[tokio::test]
    async fn settle_window_keeps_stepping_slow_modes() {
        let (_clock, mut arm) = stage();
        arm.set_target(Position::new(0, 800, 450, 620), None);
        arm.step().await.unwrap();
        arm.set_mode(Interpolation::UnitStep);
        arm.bus_mut().clear_writes();

        // Five loop passes fit in the window; a four-count move finishes
        // inside it, one count per pass.
        Sequencer::new(Duration::from_millis(10))
            .run(&mut arm, &[Position::new(4, 800, 450, 620)])
            .await
            .unwrap();

        assert_eq!(arm.bus().writes_to(1), vec![1, 2, 3, 4]);
        assert!(arm.reached());
    }

    #[tokio::test]
    async fn empty_route_is_a_no_op() {
        let (_clock, mut arm) = stage();
        Sequencer::new(Duration::from_millis(10))
            .run(&mut arm, &[])
            .await
            .unwrap();
        assert!(arm.bus().writes.is_empty());
    }
}
