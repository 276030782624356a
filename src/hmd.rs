//! Head-mounted display state: flags, calibration and the per-frame head pose.

use crate::client::{InterfaceHandle, TrackingClient};
use crate::config::BridgeConfig;
use crate::coords::{self, CalibrationPose, Rotator};
use crate::provider::{PoseProvider, StereoConfigProvider};
use crate::stereo::{self, DisplayDescription, StereoPass, ViewRect};
use crate::types::{HmdFlags, Pose, WorldScale};
use glam::{Mat4, Quat, Vec3};
use std::sync::Arc;

/// The head-mounted display.
///
/// Flags are independent; setters only change their own flag. Calibration
/// changes take `&mut self`, so a consumer never observes a half-applied
/// reset.
pub struct Hmd {
    client: Arc<dyn TrackingClient>,
    head: Option<InterfaceHandle>,
    flags: HmdFlags,
    scale: Arc<WorldScale>,
    calibration: CalibrationPose,
    /// Latest engine-space head pose before rebasing.
    raw: Pose,
    /// Last pose handed to the consumer.
    last: Pose,
    /// Yaw-only control rotation applied on top of the head orientation.
    delta_control: Rotator,
    /// Set by `shutdown`; the head interface is gone for good.
    released: bool,
    display: DisplayDescription,
}

impl Hmd {
    pub fn new(client: Arc<dyn TrackingClient>, config: &BridgeConfig) -> Hmd {
        let scale = Arc::new(WorldScale::new(config.world_to_meters_scale));
        Self::with_scale(client, config, scale)
    }

    /// Build with a scale cell shared with other devices.
    pub fn with_scale(
        client: Arc<dyn TrackingClient>,
        config: &BridgeConfig,
        scale: Arc<WorldScale>,
    ) -> Hmd {
        let mut flags = HmdFlags::ENABLED;
        flags.set(HmdFlags::POSITIONAL_TRACKING, config.positional_tracking);
        flags.set(HmdFlags::LOW_PERSISTENCE, config.low_persistence);

        let head = if client.is_ready() {
            flags.insert(HmdFlags::CONNECTED);
            match client.resolve_interface(&config.head_path) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::warn!("Head tracking unavailable: {}", e);
                    None
                }
            }
        } else {
            log::warn!("Tracking client not ready, HMD starts disconnected");
            None
        };

        log::info!(
            "HMD initialized: head={:?} flags={:?} display={:?}",
            head,
            flags,
            config.display
        );

        Hmd {
            client,
            head,
            flags,
            scale,
            calibration: CalibrationPose::default(),
            raw: Pose::IDENTITY,
            last: Pose::IDENTITY,
            delta_control: Rotator::default(),
            released: false,
            display: config.display,
        }
    }

    /// The scale cell, for devices that convert poses with the same scale.
    pub fn world_scale(&self) -> Arc<WorldScale> {
        self.scale.clone()
    }

    pub fn flags(&self) -> HmdFlags {
        self.flags
    }

    pub fn is_hmd_connected(&self) -> bool {
        self.flags.contains(HmdFlags::CONNECTED) && self.client.is_ready()
    }

    pub fn is_hmd_enabled(&self) -> bool {
        self.flags.contains(HmdFlags::ENABLED)
    }

    pub fn enable_hmd(&mut self, allow: bool) {
        self.flags.set(HmdFlags::ENABLED, allow);
    }

    pub fn is_positional_tracking_enabled(&self) -> bool {
        self.flags.contains(HmdFlags::POSITIONAL_TRACKING)
    }

    pub fn enable_positional_tracking(&mut self, enable: bool) -> bool {
        self.flags.set(HmdFlags::POSITIONAL_TRACKING, enable);
        self.refresh();
        enable
    }

    pub fn has_valid_tracking_position(&self) -> bool {
        self.is_positional_tracking_enabled() && self.head.is_some() && self.is_hmd_connected()
    }

    pub fn is_in_low_persistence_mode(&self) -> bool {
        self.flags.contains(HmdFlags::LOW_PERSISTENCE)
    }

    pub fn enable_low_persistence_mode(&mut self, enable: bool) {
        self.flags.set(HmdFlags::LOW_PERSISTENCE, enable);
    }

    pub fn is_head_tracking_allowed(&self) -> bool {
        self.is_hmd_enabled() && self.is_hmd_connected()
    }

    /// Apply the level's world scale at the start of a game frame.
    pub fn on_start_game_frame(&mut self, world_to_meters: f32) {
        if world_to_meters > 0.0 && world_to_meters.is_finite() {
            self.scale.set(world_to_meters);
        }
        self.flags.insert(HmdFlags::OVERRIDES_APPLIED);
    }

    /// Yaw-only rotation stored by the last `apply_hmd_rotation`.
    pub fn delta_control_rotation(&self) -> Rotator {
        self.delta_control
    }

    pub fn calibration(&self) -> CalibrationPose {
        self.calibration
    }

    pub fn base_orientation(&self) -> Quat {
        self.calibration.base_orientation
    }

    pub fn base_position(&self) -> Vec3 {
        self.calibration.base_position
    }

    /// Latest head pose before calibration.
    pub fn raw_pose(&self) -> Pose {
        self.raw
    }

    /// Express any engine-space pose relative to the HMD base.
    pub fn rebase_object_orientation_and_position(&self, pose: Pose) -> Pose {
        self.calibration.rebase(pose)
    }

    pub fn display(&self) -> &DisplayDescription {
        &self.display
    }

    /// (horizontal, vertical) per-eye field of view in degrees.
    pub fn field_of_view(&self) -> (f32, f32) {
        (self.display.fov_h_deg, self.display.fov_v_deg)
    }

    pub fn interpupillary_distance(&self) -> f32 {
        self.display.ipd_meters
    }

    pub fn set_interpupillary_distance(&mut self, ipd_meters: f32) {
        if ipd_meters >= 0.0 && ipd_meters.is_finite() {
            self.display.ipd_meters = ipd_meters;
        }
    }

    /// Recompute the reported pose from the stored raw pose.
    fn refresh(&mut self) {
        let mut pose = self.calibration.rebase(self.raw);
        if !self.is_positional_tracking_enabled() {
            pose.position = Vec3::ZERO;
        }
        self.last = pose;
    }

    /// Release the head interface. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(head) = self.head.take() {
            if let Err(e) = self.client.release_interface(head) {
                log::warn!("Failed to release head interface: {}", e);
            }
        }
        self.released = true;
        self.flags.remove(HmdFlags::CONNECTED);
    }
}

impl Drop for Hmd {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl PoseProvider for Hmd {
    fn update_head_pose(&mut self) -> bool {
        if !self.is_hmd_enabled() {
            return false;
        }
        let connected = !self.released && self.client.is_ready();
        self.flags.set(HmdFlags::CONNECTED, connected);

        match coords::acquire_pose(self.client.as_ref(), self.head, self.scale.get()) {
            Ok(raw) => {
                self.raw = raw;
                self.refresh();
                true
            }
            Err(_) => {
                log::trace!("No fresh head pose, keeping last applied");
                false
            }
        }
    }

    fn current_orientation_and_position(&self) -> Pose {
        self.last
    }

    fn world_to_meters_scale(&self) -> f32 {
        self.scale.get()
    }

    fn reset_orientation(&mut self, yaw: f32) {
        let mut view = Rotator::from_quat(self.raw.orientation);
        view.pitch = 0.0;
        view.roll = 0.0;
        view.yaw -= yaw;
        self.calibration.base_orientation = view.normalized().to_quat();
        self.refresh();
    }

    fn reset_position(&mut self) {
        self.calibration.base_position = self.raw.position;
        self.refresh();
    }

    fn reset_orientation_and_position(&mut self, yaw: f32) {
        let mut view = Rotator::from_quat(self.raw.orientation);
        view.pitch = 0.0;
        view.roll = 0.0;
        view.yaw -= yaw;
        self.calibration = CalibrationPose {
            base_orientation: view.normalized().to_quat(),
            base_position: self.raw.position,
        };
        self.refresh();
    }

    fn set_current_as_base(&mut self) {
        self.calibration = CalibrationPose {
            base_orientation: self.raw.orientation,
            base_position: self.raw.position,
        };
        self.refresh();
    }

    fn apply_hmd_rotation(&mut self, control: Rotator) -> Rotator {
        self.delta_control = Rotator::new(0.0, control.yaw, 0.0).normalized();
        let view = self.delta_control.to_quat() * self.last.orientation;
        Rotator::from_quat(view.normalize())
    }

    fn update_player_camera(&mut self) -> Option<Pose> {
        if !self.is_head_tracking_allowed() {
            return None;
        }
        self.update_head_pose();
        Some(self.last)
    }
}

impl StereoConfigProvider for Hmd {
    fn is_stereo_enabled(&self) -> bool {
        self.flags.contains(HmdFlags::STEREO)
    }

    fn enable_stereo(&mut self, stereo: bool) -> bool {
        self.flags.set(HmdFlags::STEREO, stereo);
        stereo
    }

    fn adjust_view_rect(&self, pass: StereoPass, rect: ViewRect) -> ViewRect {
        stereo::adjust_view_rect(pass, rect)
    }

    fn stereo_view_offset(&self, pass: StereoPass, view_rotation: Quat, world_to_meters: f32) -> Vec3 {
        stereo::stereo_view_offset(&self.display, pass, view_rotation, world_to_meters)
    }

    fn stereo_projection_matrix(&self, pass: StereoPass) -> Mat4 {
        stereo::stereo_projection_matrix(&self.display, pass)
    }

    fn render_target_size(&self, width: u32, height: u32) -> (u32, u32) {
        if self.is_stereo_enabled() {
            self.display.resolution
        } else {
            (width, height)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedClient;
    use crate::types::PoseSample;
    use glam::EulerRot;

    const HEAD: &str = "/me/head";
    const EPS: f32 = 1e-3;

    fn tracker_sample(q: Quat, translation: [f64; 3]) -> PoseSample {
        PoseSample {
            translation,
            rotation: [q.x as f64, q.y as f64, q.z as f64, q.w as f64],
            timestamp_us: 1,
        }
    }

    fn setup() -> (Arc<SimulatedClient>, Hmd) {
        let sim = Arc::new(SimulatedClient::new());
        let hmd = Hmd::new(sim.clone(), &BridgeConfig::default());
        (sim, hmd)
    }

    #[test]
    fn head_pose_is_converted_and_scaled() {
        let (sim, mut hmd) = setup();
        sim.set_pose(HEAD, tracker_sample(Quat::IDENTITY, [0.0, 1.5, -0.2]));
        assert!(hmd.update_head_pose());
        let pose = hmd.current_orientation_and_position();
        assert!((pose.position - Vec3::new(20.0, 0.0, 150.0)).length() < EPS);
    }

    #[test]
    fn failed_query_keeps_last_pose() {
        let (sim, mut hmd) = setup();
        sim.set_pose(HEAD, tracker_sample(Quat::IDENTITY, [0.1, 0.2, 0.3]));
        assert!(hmd.update_head_pose());
        let before = hmd.current_orientation_and_position();

        sim.clear_pose(HEAD);
        assert!(!hmd.update_head_pose());
        assert_eq!(hmd.current_orientation_and_position(), before);

        sim.set_ready(false);
        assert!(!hmd.update_head_pose());
        assert!(!hmd.flags().contains(HmdFlags::CONNECTED));
        assert_eq!(hmd.current_orientation_and_position(), before);
    }

    #[test]
    fn reset_orientation_and_position_zeroes_yaw_and_position() {
        let (sim, mut hmd) = setup();
        let tracker_q = Quat::from_euler(EulerRot::YXZ, 0.8, 0.3, 0.1);
        sim.set_pose(HEAD, tracker_sample(tracker_q, [0.4, 1.6, -0.7]));
        assert!(hmd.update_head_pose());

        hmd.reset_orientation_and_position(0.0);
        assert!(hmd.update_head_pose());

        let pose = hmd.current_orientation_and_position();
        let rot = Rotator::from_quat(pose.orientation);
        assert!(rot.yaw.abs() < EPS, "yaw {}", rot.yaw);
        assert!(pose.position.length() < EPS, "{:?}", pose.position);
    }

    #[test]
    fn reset_with_yaw_argument_sets_that_heading() {
        let (sim, mut hmd) = setup();
        let tracker_q = Quat::from_euler(EulerRot::YXZ, 0.8, 0.3, 0.1);
        sim.set_pose(HEAD, tracker_sample(tracker_q, [0.4, 1.6, -0.7]));
        assert!(hmd.update_head_pose());
        let pitch_before = Rotator::from_quat(hmd.current_orientation_and_position().orientation).pitch;

        // The argument is the heading reported right after the reset, so the
        // yaw reads 25 rather than 0; position still zeroes.
        hmd.reset_orientation_and_position(25.0);
        assert!(hmd.update_head_pose());

        let pose = hmd.current_orientation_and_position();
        let rot = Rotator::from_quat(pose.orientation);
        assert!((rot.yaw - 25.0).abs() < EPS, "yaw {}", rot.yaw);
        assert!((rot.pitch - pitch_before).abs() < EPS, "pitch {}", rot.pitch);
        assert!(pose.position.length() < EPS, "{:?}", pose.position);
    }

    #[test]
    fn reset_orientation_applies_yaw_offset() {
        let (sim, mut hmd) = setup();
        sim.set_pose(HEAD, tracker_sample(Quat::from_rotation_y(0.5), [0.0; 3]));
        hmd.update_head_pose();
        hmd.reset_orientation(30.0);
        let rot = Rotator::from_quat(hmd.current_orientation_and_position().orientation);
        assert!((rot.yaw - 30.0).abs() < EPS, "yaw {}", rot.yaw);
    }

    #[test]
    fn set_current_as_base_keeps_pitch_in_base() {
        let (sim, mut hmd) = setup();
        // Pitched down and turned.
        let tracker_q = Quat::from_euler(EulerRot::YXZ, 0.6, -0.4, 0.0);
        sim.set_pose(HEAD, tracker_sample(tracker_q, [0.0, 1.7, 0.0]));
        hmd.update_head_pose();

        hmd.reset_orientation_and_position(0.0);
        let yaw_only = hmd.current_orientation_and_position();

        hmd.set_current_as_base();
        let full = hmd.current_orientation_and_position();

        // Full base cancels everything, yaw-only base leaves the pitch.
        assert!(full.orientation.angle_between(Quat::IDENTITY) < EPS);
        let pitch = Rotator::from_quat(yaw_only.orientation).pitch;
        assert!(pitch.abs() > 10.0, "pitch {}", pitch);
        assert!(yaw_only.orientation.angle_between(full.orientation) > 0.1);
    }

    #[test]
    fn reset_position_leaves_orientation_base() {
        let (sim, mut hmd) = setup();
        sim.set_pose(HEAD, tracker_sample(Quat::from_rotation_y(0.3), [0.2, 1.0, 0.0]));
        hmd.update_head_pose();
        hmd.reset_orientation(0.0);
        let base = hmd.base_orientation();

        sim.set_pose(HEAD, tracker_sample(Quat::from_rotation_y(0.3), [0.5, 1.0, 0.0]));
        hmd.update_head_pose();
        hmd.reset_position();

        assert_eq!(hmd.base_orientation(), base);
        assert!((hmd.base_position() - hmd.raw_pose().position).length() < EPS);
        assert!(hmd.current_orientation_and_position().position.length() < EPS);
    }

    #[test]
    fn disabling_positional_tracking_zeroes_position() {
        let (sim, mut hmd) = setup();
        sim.set_pose(HEAD, tracker_sample(Quat::IDENTITY, [1.0, 1.0, 1.0]));
        hmd.update_head_pose();
        assert!(hmd.current_orientation_and_position().position.length() > 1.0);

        assert!(!hmd.enable_positional_tracking(false));
        assert_eq!(hmd.current_orientation_and_position().position, Vec3::ZERO);
        assert!(!hmd.has_valid_tracking_position());
    }

    #[test]
    fn flags_toggle_independently() {
        let (_sim, mut hmd) = setup();
        assert!(hmd.enable_stereo(true));
        assert!(hmd.enable_stereo(true));
        hmd.enable_low_persistence_mode(true);
        hmd.enable_hmd(false);

        assert!(hmd.is_stereo_enabled());
        assert!(hmd.is_in_low_persistence_mode());
        assert!(!hmd.is_hmd_enabled());
        assert!(!hmd.is_head_tracking_allowed());
        assert!(hmd.is_positional_tracking_enabled());
        assert!(!hmd.update_head_pose());
    }

    #[test]
    fn game_frame_applies_world_scale() {
        let (sim, mut hmd) = setup();
        let scale = hmd.world_scale();
        hmd.on_start_game_frame(50.0);
        assert!(hmd.flags().contains(HmdFlags::OVERRIDES_APPLIED));
        assert_eq!(scale.get(), 50.0);

        sim.set_pose(HEAD, tracker_sample(Quat::IDENTITY, [0.0, 2.0, 0.0]));
        hmd.update_head_pose();
        assert!((hmd.current_orientation_and_position().position.z - 100.0).abs() < EPS);

        hmd.on_start_game_frame(f32::NAN);
        assert_eq!(hmd.world_to_meters_scale(), 50.0);
    }

    #[test]
    fn render_target_follows_stereo() {
        let (_sim, mut hmd) = setup();
        assert_eq!(hmd.render_target_size(800, 600), (800, 600));
        hmd.enable_stereo(true);
        assert_eq!(hmd.render_target_size(800, 600), hmd.display().resolution);
    }

    #[test]
    fn missing_head_path_is_not_fatal() {
        let sim = Arc::new(SimulatedClient::new());
        sim.remove_path(HEAD);
        let mut hmd = Hmd::new(sim.clone(), &BridgeConfig::default());
        assert!(hmd.is_hmd_connected());
        assert!(!hmd.update_head_pose());
        assert_eq!(hmd.current_orientation_and_position(), Pose::IDENTITY);
    }

    /// Tracker sample that converts to exactly `engine` in engine space.
    fn engine_sample(engine: Quat) -> PoseSample {
        PoseSample {
            translation: [0.0; 3],
            rotation: [engine.y as f64, engine.z as f64, -engine.x as f64, -engine.w as f64],
            timestamp_us: 1,
        }
    }

    #[test]
    fn control_yaw_combines_with_head_pitch() {
        let (sim, mut hmd) = setup();
        sim.set_pose(HEAD, engine_sample(Rotator::new(20.0, 0.0, 0.0).to_quat()));
        assert!(hmd.update_head_pose());

        // Control pitch and roll are discarded.
        let view = hmd.apply_hmd_rotation(Rotator::new(-35.0, 90.0, 10.0));
        assert!((view.yaw - 90.0).abs() < EPS, "yaw {}", view.yaw);
        assert!((view.pitch - 20.0).abs() < EPS, "pitch {}", view.pitch);
        assert!(view.roll.abs() < EPS, "roll {}", view.roll);
        assert_eq!(hmd.delta_control_rotation(), Rotator::new(0.0, 90.0, 0.0));
    }

    #[test]
    fn player_camera_follows_tracking_permission() {
        let (sim, mut hmd) = setup();
        sim.set_pose(HEAD, tracker_sample(Quat::IDENTITY, [0.0, 1.0, 0.0]));
        let pose = hmd.update_player_camera().unwrap();
        assert!((pose.position.z - 100.0).abs() < EPS);

        hmd.enable_hmd(false);
        assert!(hmd.update_player_camera().is_none());
    }

    #[test]
    fn shutdown_disconnects_for_good() {
        let (sim, mut hmd) = setup();
        assert!(hmd.is_hmd_connected());
        assert!(hmd.has_valid_tracking_position());

        hmd.shutdown();
        assert!(sim.is_ready());
        assert!(!hmd.is_hmd_connected());
        assert!(!hmd.has_valid_tracking_position());
        assert!(!hmd.update_head_pose());
        assert!(!hmd.is_hmd_connected());
    }

    #[test]
    fn drop_releases_head_interface() {
        let (sim, hmd) = setup();
        assert_eq!(sim.live_handles(), 1);
        drop(hmd);
        assert_eq!(sim.released_paths(), vec![HEAD]);
    }
}
