//! Per-frame orchestration of the HMD and its input devices.

use crate::client::TrackingClient;
use crate::config::BridgeConfig;
use crate::dispatch::MessageHandler;
use crate::hmd::Hmd;
use crate::input::InputDevice;
use crate::provider::{InputProvider, PoseProvider};
use crate::pump::ClientPump;
use crate::types::{Hand, Pose};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

/// Owns the HMD, the registered input providers and an optional pump.
///
/// Devices are handed in explicitly; nothing is looked up globally.
pub struct Session {
    hmd: Hmd,
    inputs: Vec<Box<dyn InputProvider>>,
    pump: Option<ClientPump>,
    head_fresh: bool,
}

impl Session {
    pub fn new(hmd: Hmd) -> Session {
        Session {
            hmd,
            inputs: Vec::new(),
            pump: None,
            head_fresh: false,
        }
    }

    /// Build an HMD and the default controller device on `client`.
    ///
    /// The controller device is only registered when the client context is
    /// available. A pump is started when the config asks for one.
    pub fn connect(
        client: Arc<dyn TrackingClient>,
        handler: Box<dyn MessageHandler>,
        config: &BridgeConfig,
    ) -> Result<Session> {
        let hmd = Hmd::new(client.clone(), config);
        let input = InputDevice::new(client.clone(), handler, hmd.world_scale(), config);

        let mut session = Session::new(hmd);
        if input.is_active() {
            session.register_input(Box::new(input));
        } else {
            log::warn!("Controller input not registered: tracking client unavailable");
        }

        if let Some(interval) = config.pump_interval {
            session.start_pump(client, interval)?;
        }
        Ok(session)
    }

    pub fn register_input(&mut self, mut input: Box<dyn InputProvider>) {
        input.set_pumped(self.pump.is_some());
        self.inputs.push(input);
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Move client pumping to a background thread.
    ///
    /// From then on the pump is the only caller of `update()`; registered
    /// inputs stop pumping from their tick.
    pub fn start_pump(&mut self, client: Arc<dyn TrackingClient>, interval: Duration) -> Result<()> {
        if self.pump.is_none() {
            for input in &mut self.inputs {
                input.set_pumped(true);
            }
            match ClientPump::start(client, interval) {
                Ok(pump) => self.pump = Some(pump),
                Err(e) => {
                    for input in &mut self.inputs {
                        input.set_pumped(false);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Stop the background pump and hand `update()` back to the inputs.
    pub fn stop_pump(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.stop();
            for input in &mut self.inputs {
                input.set_pumped(false);
            }
        }
    }

    pub fn is_pumped(&self) -> bool {
        self.pump.is_some()
    }

    pub fn hmd(&self) -> &Hmd {
        &self.hmd
    }

    pub fn hmd_mut(&mut self) -> &mut Hmd {
        &mut self.hmd
    }

    /// Run one frame: tick and drain every input, then refresh the head
    /// pose. Returns the head pose to apply this frame.
    pub fn begin_frame(&mut self, delta_time: f32) -> Pose {
        for input in &mut self.inputs {
            input.tick(delta_time);
            input.send_controller_events();
        }
        self.head_fresh = self.hmd.update_head_pose();
        self.hmd.current_orientation_and_position()
    }

    /// Whether the last frame got a fresh head pose rather than keeping the
    /// previous one.
    pub fn is_head_pose_fresh(&self) -> bool {
        self.head_fresh
    }

    /// First tracked pose for `hand` among the registered inputs.
    pub fn controller_pose(&self, controller_index: i32, hand: Hand) -> Option<Pose> {
        self.inputs
            .iter()
            .find_map(|input| input.controller_orientation_and_position(controller_index, hand))
    }

    /// Stop the pump first so no update runs while devices are torn down,
    /// then drop inputs and release the HMD.
    pub fn shutdown(&mut self) {
        self.stop_pump();
        self.inputs.clear();
        self.hmd.shutdown();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ControllerEvent;
    use crate::keys::ControllerKey;
    use crate::provider::StereoConfigProvider;
    use crate::sim::SimulatedClient;
    use crate::client::{AnalogCallback, DigitalCallback, InterfaceHandle};
    use crate::types::{ClientStatus, PoseSample};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Forwards to a simulated client and records how many threads were
    /// inside `update()` at once.
    struct OverlapCounter {
        inner: Arc<SimulatedClient>,
        inside: AtomicUsize,
        max_inside: AtomicUsize,
    }

    impl TrackingClient for OverlapCounter {
        fn check_status(&self) -> ClientStatus {
            self.inner.check_status()
        }

        fn update(&self) -> Result<()> {
            let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_inside.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_micros(200));
            let result = self.inner.update();
            self.inside.fetch_sub(1, Ordering::SeqCst);
            result
        }

        fn resolve_interface(&self, path: &str) -> Result<InterfaceHandle> {
            self.inner.resolve_interface(path)
        }

        fn release_interface(&self, handle: InterfaceHandle) -> Result<()> {
            self.inner.release_interface(handle)
        }

        fn register_digital_callback(&self, handle: InterfaceHandle, callback: DigitalCallback) -> Result<()> {
            self.inner.register_digital_callback(handle, callback)
        }

        fn register_analog_callback(&self, handle: InterfaceHandle, callback: AnalogCallback) -> Result<()> {
            self.inner.register_analog_callback(handle, callback)
        }

        fn pose(&self, handle: InterfaceHandle) -> Result<PoseSample> {
            self.inner.pose(handle)
        }
    }

    fn connect(sim: &Arc<SimulatedClient>, config: &BridgeConfig) -> (Session, crossbeam_channel::Receiver<ControllerEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded::<ControllerEvent>();
        let session = Session::connect(sim.clone(), Box::new(tx), config).unwrap();
        (session, rx)
    }

    #[test]
    fn frame_dispatches_input_and_updates_head() {
        let sim = Arc::new(SimulatedClient::new());
        let (mut session, rx) = connect(&sim, &BridgeConfig::default());
        assert_eq!(session.input_count(), 1);

        sim.set_pose("/me/head", PoseSample { translation: [0.0, 1.8, 0.0], ..PoseSample::IDENTITY });
        sim.report_button("/controller/right/4", true);

        let pose = session.begin_frame(0.011);
        assert!(session.is_head_pose_fresh());
        assert!((pose.position.z - 180.0).abs() < 1e-3);
        let keys: Vec<ControllerKey> = rx.try_iter().map(|e| e.key()).collect();
        assert_eq!(keys, vec![ControllerKey::RightFaceButton4, ControllerKey::GamepadFaceButtonTop]);
    }

    #[test]
    fn unavailable_client_registers_no_input() {
        let sim = Arc::new(SimulatedClient::not_ready());
        let (mut session, rx) = connect(&sim, &BridgeConfig::default());
        assert_eq!(session.input_count(), 0);
        assert!(!session.hmd().is_hmd_connected());

        assert_eq!(session.begin_frame(0.011), Pose::IDENTITY);
        assert!(!session.is_head_pose_fresh());
        assert!(session.controller_pose(0, Hand::Left).is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn controller_scale_follows_level_scale() {
        let sim = Arc::new(SimulatedClient::new());
        let (mut session, _rx) = connect(&sim, &BridgeConfig::default());
        sim.set_pose("/me/hands/left", PoseSample { translation: [0.0, 1.0, 0.0], ..PoseSample::IDENTITY });

        session.hmd_mut().on_start_game_frame(10.0);
        let pose = session.controller_pose(0, Hand::Left).unwrap();
        assert!((pose.position.z - 10.0).abs() < 1e-4);
    }

    #[test]
    fn pumped_session_delivers_on_next_frame() {
        let sim = Arc::new(SimulatedClient::new());
        let config = BridgeConfig {
            pump_interval: Some(Duration::from_millis(1)),
            ..BridgeConfig::default()
        };
        let (mut session, rx) = connect(&sim, &config);
        session.hmd_mut().enable_stereo(true);

        sim.report_button("/controller/left/middle", true);
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut keys = Vec::new();
        while keys.is_empty() && Instant::now() < deadline {
            session.begin_frame(0.001);
            keys.extend(rx.try_iter().map(|e| e.key()));
        }
        assert_eq!(keys, vec![ControllerKey::SpecialLeft]);
        assert!(session.hmd().is_stereo_enabled());
    }

    #[test]
    fn pumped_session_updates_from_one_thread_only() {
        let sim = Arc::new(SimulatedClient::new());
        let counter = Arc::new(OverlapCounter {
            inner: sim.clone(),
            inside: AtomicUsize::new(0),
            max_inside: AtomicUsize::new(0),
        });
        let config = BridgeConfig {
            pump_interval: Some(Duration::from_millis(1)),
            ..BridgeConfig::default()
        };
        let (tx, rx) = crossbeam_channel::unbounded::<ControllerEvent>();
        let mut session = Session::connect(counter.clone(), Box::new(tx), &config).unwrap();
        assert!(session.is_pumped());

        let deadline = Instant::now() + Duration::from_millis(300);
        let mut i = 0u32;
        while Instant::now() < deadline {
            sim.report_analog("/controller/right/trigger", if i % 2 == 0 { 0.9 } else { 0.1 });
            session.begin_frame(0.001);
            i += 1;
        }
        session.shutdown();

        assert!(sim.update_count() > 0);
        assert_eq!(counter.max_inside.load(Ordering::SeqCst), 1);
        // Trigger clicks still alternate press/release.
        let mut pressed = false;
        for event in rx.try_iter() {
            match event {
                ControllerEvent::Pressed { key: ControllerKey::RightTrigger, .. } => {
                    assert!(!pressed);
                    pressed = true;
                }
                ControllerEvent::Released { key: ControllerKey::RightTrigger, .. } => {
                    assert!(pressed);
                    pressed = false;
                }
                _ => {}
            }
        }
    }

    #[test]
    fn stopping_the_pump_returns_update_to_the_frame() {
        let sim = Arc::new(SimulatedClient::new());
        let config = BridgeConfig {
            pump_interval: Some(Duration::from_secs(60)),
            ..BridgeConfig::default()
        };
        let (mut session, rx) = connect(&sim, &config);
        // The pump updates once on start, then sleeps for the interval.
        let deadline = Instant::now() + Duration::from_secs(5);
        while sim.update_count() == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        let pumped_updates = sim.update_count();
        assert_eq!(pumped_updates, 1);
        session.begin_frame(0.011);
        assert_eq!(sim.update_count(), pumped_updates);

        session.stop_pump();
        assert!(!session.is_pumped());
        sim.report_button("/controller/left/middle", true);
        session.begin_frame(0.011);
        assert_eq!(rx.try_iter().map(|e| e.key()).collect::<Vec<_>>(), vec![ControllerKey::SpecialLeft]);
    }

    #[test]
    fn shutdown_releases_everything() {
        let sim = Arc::new(SimulatedClient::new());
        let (mut session, _rx) = connect(&sim, &BridgeConfig::default());
        assert!(sim.live_handles() > 0);
        session.shutdown();
        assert_eq!(sim.live_handles(), 0);
        drop(session);
    }
}
