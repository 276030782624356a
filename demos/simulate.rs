//! Drive a session against the simulated tracking client.
//!
//! Usage: RUST_LOG=debug cargo run --example simulate
//! Moves the head in a slow circle, presses a few buttons and sweeps the
//! right trigger, printing every controller event and the head pose.

use hmd_bridge::{
    BridgeConfig, ControllerEvent, Hand, PoseProvider, PoseSample, Session, SimulatedClient,
    StereoConfigProvider,
};
use std::sync::Arc;
use std::time::Duration;

const FRAMES: u32 = 90;

fn main() {
    env_logger::init();

    let client = Arc::new(SimulatedClient::new());
    let (tx, rx) = crossbeam_channel::unbounded::<ControllerEvent>();
    let config = BridgeConfig::from_env();

    let mut session = match Session::connect(client.clone(), Box::new(tx), &config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to connect session: {}", e);
            std::process::exit(1);
        }
    };

    session.hmd_mut().enable_stereo(true);
    println!("Inputs:  {}", session.input_count());
    println!("Flags:   {:?}", session.hmd().flags());
    println!("Target:  {:?}", session.hmd().render_target_size(1280, 720));
    println!();

    for frame in 0..FRAMES {
        let t = frame as f64 / FRAMES as f64 * std::f64::consts::TAU;
        let half = t * 0.5;
        client.set_pose(
            &config.head_path,
            PoseSample {
                translation: [0.1 * t.cos(), 1.7, 0.1 * t.sin()],
                // Turning about +Y in tracker space.
                rotation: [0.0, half.sin() * 0.25, 0.0, (1.0 - (half.sin() * 0.25).powi(2)).sqrt()],
                timestamp_us: frame as u64 * 11_111,
            },
        );
        client.set_pose(
            &config.right_hand_path,
            PoseSample {
                translation: [0.25, 1.2, -0.3],
                ..PoseSample::IDENTITY
            },
        );

        match frame {
            10 => client.report_button("/controller/right/1", true),
            20 => client.report_button("/controller/right/1", false),
            45 => session.hmd_mut().reset_orientation_and_position(0.0),
            _ => {}
        }
        client.report_analog("/controller/right/trigger", frame as f64 / FRAMES as f64);

        let head = session.begin_frame(1.0 / 90.0);

        for event in rx.try_iter() {
            match event {
                ControllerEvent::Analog { .. } => {}
                _ => println!("frame {:>3}  {:?}", frame, event),
            }
        }

        if frame % 15 == 0 {
            let hand = session.controller_pose(0, Hand::Right);
            println!(
                "frame {:>3}  head=[{:+.2}, {:+.2}, {:+.2}]  right={:?}",
                frame,
                head.position.x,
                head.position.y,
                head.position.z,
                hand.map(|p| p.position),
            );
        }

        std::thread::sleep(Duration::from_millis(11));
    }

    println!();
    println!("Scale:   {}", session.hmd().world_to_meters_scale());
    session.shutdown();
    println!("Released handles, {} still live", client.live_handles());
}
