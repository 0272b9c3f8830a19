use log::{info, warn};
use mimic_controller::{
    BusButton, Calibration, DeviceId, Gesture, GestureReader, HiBus, InputArm, Interpolation,
    OutputArm, ServoBus, SystemClock, BUTTON_CHANNEL,
};
use std::error::Error;
use std::sync::Arc;
use tokio::time::Duration;

const TICK: Duration = Duration::from_millis(15);

async fn apply_gesture<B: ServoBus>(
    arm: &mut OutputArm<B>,
    gesture: Gesture,
    engaged: &mut bool,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("Gesture: {:?}", gesture);
    match gesture {
        Gesture::SingleShort => arm.set_mode(Interpolation::Immediate),
        Gesture::DoubleShort => arm.set_mode(Interpolation::UnitStep),
        Gesture::TripleShort => arm.set_mode(Interpolation::Proportional),
        Gesture::SingleLong => arm.set_mode(Interpolation::Timed),
        Gesture::DoubleLong => {
            // Toggle the follower's hold so it can be repositioned by hand.
            if *engaged {
                arm.detach().await?;
                info!("Follower released");
            } else {
                arm.attach().await?;
                info!("Follower re-engaged");
            }
            *engaged = !*engaged;
        }
        Gesture::TripleLong => {
            arm.park().await?;
            *engaged = true;
            info!("Follower parked at {}", arm.current());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    env_logger::Builder::from_default_env()
        .filter(None, log::LevelFilter::Info)
        .init();

    let mut args = std::env::args().skip(1);
    let follower_id = DeviceId::new(args.next(), "xArm");
    let leader_id = DeviceId::new(args.next(), "xArm");

    let calibration = Calibration::default();
    calibration.validate()?;

    let mut follower_bus = HiBus::open(&follower_id).await?;
    if let Ok(voltage) = follower_bus.battery_voltage().await {
        println!("Follower battery: {:.2}V", voltage);
    }

    let clock = Arc::new(SystemClock::new());
    let mut follower = OutputArm::new(
        follower_bus,
        calibration.follower_channels,
        calibration.follower_range,
        clock.clone(),
    );
    follower.notify_mode_changes(|mode| info!("Interpolation mode: {}", mode));
    follower.attach().await?;

    // The leader's board is shared between joint polling and the trigger
    // button on its spare channel.
    let leader_bus = Arc::new(tokio::sync::Mutex::new(HiBus::open(&leader_id).await?));
    let mut leader = InputArm::new(
        leader_bus.clone(),
        calibration.leader_channels,
        calibration.leader_range,
    )?;
    leader.release_all().await?;

    let mut trigger = GestureReader::new(BusButton::new(leader_bus, BUTTON_CHANNEL), clock);

    info!("Mimic loop running; move the leader arm");
    let mut engaged = true;
    loop {
        match trigger.poll().await {
            Ok(Some(gesture)) => apply_gesture(&mut follower, gesture, &mut engaged).await?,
            Ok(None) => {}
            Err(e) => warn!("Button read failed: {}", e),
        }

        if engaged {
            // Retargeting restamps the pacing baseline; the elapsed tick
            // has to be stepped out before the plan is replaced.
            follower.step().await?;
            match leader.read().await {
                Ok(_) => follower.map_from(&leader, Some(TICK)),
                Err(e) => warn!("Leader read failed: {}", e),
            }
        }

        tokio::time::sleep(TICK).await;
    }
}
