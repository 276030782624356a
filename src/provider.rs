//! Capabilities the engine consumes, one trait per concern.

use crate::coords::Rotator;
use crate::dispatch::MessageHandler;
use crate::stereo::{StereoPass, ViewRect};
use crate::types::{Hand, Pose, TrackingStatus};
use glam::{Mat4, Quat, Vec3};

/// Head pose and its calibration.
pub trait PoseProvider {
    /// Pull a fresh head pose. Returns false and keeps the last applied pose
    /// when no fresh sample is available.
    fn update_head_pose(&mut self) -> bool;

    /// Last applied, calibration-relative head pose.
    fn current_orientation_and_position(&self) -> Pose;

    fn world_to_meters_scale(&self) -> f32;

    /// Make the current yaw (minus `yaw` degrees) the forward direction.
    fn reset_orientation(&mut self, yaw: f32);

    /// Make the current position the origin.
    fn reset_position(&mut self);

    fn reset_orientation_and_position(&mut self, yaw: f32);

    /// Make the current orientation, pitch and roll included, and the
    /// current position the new base.
    fn set_current_as_base(&mut self);

    /// Combine the player's control rotation with the head orientation.
    ///
    /// Only the yaw of `control` is kept; pitch and roll always come from
    /// the head. Returns the view rotation for the camera.
    fn apply_hmd_rotation(&mut self, control: Rotator) -> Rotator;

    /// Refresh the head pose for the player camera. Returns `None` while
    /// head tracking is not allowed.
    fn update_player_camera(&mut self) -> Option<Pose>;
}

/// Per-frame stereo view setup.
pub trait StereoConfigProvider {
    fn is_stereo_enabled(&self) -> bool;

    /// Returns the resulting stereo state.
    fn enable_stereo(&mut self, stereo: bool) -> bool;

    fn adjust_view_rect(&self, pass: StereoPass, rect: ViewRect) -> ViewRect;

    fn stereo_view_offset(&self, pass: StereoPass, view_rotation: Quat, world_to_meters: f32) -> Vec3;

    fn stereo_projection_matrix(&self, pass: StereoPass) -> Mat4;

    /// Render target size for a viewport of `width` x `height`.
    fn render_target_size(&self, width: u32, height: u32) -> (u32, u32);
}

/// Controller input feeding the engine's input system.
pub trait InputProvider: Send {
    /// Per-frame pump of the tracking client. Does not call `update()` while
    /// the provider is marked as pumped elsewhere.
    fn tick(&mut self, delta_time: f32);

    /// Hand client pumping to a background pump (`true`) or back to `tick`.
    fn set_pumped(&mut self, pumped: bool);

    /// Deliver queued controller events. Returns how many were sent.
    fn send_controller_events(&mut self) -> usize;

    fn set_message_handler(&mut self, handler: Box<dyn MessageHandler>);

    fn controller_orientation_and_position(&self, controller_index: i32, hand: Hand) -> Option<Pose>;

    fn controller_tracking_status(&self, controller_index: i32, hand: Hand) -> TrackingStatus;
}
