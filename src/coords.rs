//! Conversion from tracker space to engine space.
//!
//! Tracker: right-handed, +Y up, -Z forward, meters.
//! Engine: left-handed, +X forward, +Y right, +Z up, world units.

use crate::client::{InterfaceHandle, TrackingClient};
use crate::types::{Pose, PoseSample};
use crate::{BridgeError, Result};
use glam::{EulerRot, Quat, Vec3};

/// Remap a tracker position into engine axes: (x, y, z) -> (-z, x, y).
pub fn tracker_to_engine_position(t: [f64; 3]) -> Vec3 {
    Vec3::new(-t[2] as f32, t[0] as f32, t[1] as f32)
}

/// Remap a tracker quaternion [x, y, z, w] into engine axes.
///
/// The axis remap has determinant -1, so the vector part picks up the remap
/// and a sign flip. Returned as (-z, x, y, -w), which is the same rotation
/// as (z, -x, -y, w).
pub fn tracker_to_engine_orientation(q: [f64; 4]) -> Quat {
    let raw = Quat::from_xyzw(-q[2] as f32, q[0] as f32, q[1] as f32, -q[3] as f32);
    if raw.length_squared() > f32::EPSILON {
        raw.normalize()
    } else {
        Quat::IDENTITY
    }
}

/// Convert a tracker pose to an engine pose scaled by `world_to_meters`.
pub fn tracker_to_engine(sample: &PoseSample, world_to_meters: f32) -> Pose {
    Pose {
        orientation: tracker_to_engine_orientation(sample.rotation),
        position: tracker_to_engine_position(sample.translation) * world_to_meters,
    }
}

/// Query, convert and scale the pose on `handle`.
///
/// Every failure collapses to [`BridgeError::Untracked`]: the caller keeps
/// whatever pose it applied last.
pub fn acquire_pose(
    client: &dyn TrackingClient,
    handle: Option<InterfaceHandle>,
    world_to_meters: f32,
) -> Result<Pose> {
    if !client.is_ready() {
        return Err(BridgeError::Untracked);
    }
    let handle = handle.ok_or(BridgeError::Untracked)?;
    match client.pose(handle) {
        Ok(sample) => Ok(tracker_to_engine(&sample, world_to_meters)),
        Err(e) => {
            log::debug!("Pose query on {:?} failed: {}", handle, e);
            Err(BridgeError::Untracked)
        }
    }
}

/// Yaw/pitch/roll in degrees, yaw about +Z applied first, then pitch about
/// +Y, then roll about +X.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotator {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl Rotator {
    pub fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    pub fn from_quat(q: Quat) -> Self {
        let (yaw, pitch, roll) = q.to_euler(EulerRot::ZYX);
        Self {
            pitch: pitch.to_degrees(),
            yaw: yaw.to_degrees(),
            roll: roll.to_degrees(),
        }
    }

    pub fn to_quat(self) -> Quat {
        Quat::from_euler(
            EulerRot::ZYX,
            self.yaw.to_radians(),
            self.pitch.to_radians(),
            self.roll.to_radians(),
        )
    }

    /// Wrap every axis into (-180, 180].
    pub fn normalized(self) -> Self {
        Self {
            pitch: normalize_axis(self.pitch),
            yaw: normalize_axis(self.yaw),
            roll: normalize_axis(self.roll),
        }
    }
}

fn normalize_axis(deg: f32) -> f32 {
    let wrapped = deg.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Yaw of `q` in radians.
pub fn yaw_of(q: Quat) -> f32 {
    q.to_euler(EulerRot::ZYX).0
}

/// The pure-yaw part of `q` (pitch and roll dropped).
pub fn yaw_rotation(q: Quat) -> Quat {
    Quat::from_rotation_z(yaw_of(q))
}

/// Calibration baseline that defines "forward" and the zero position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationPose {
    pub base_orientation: Quat,
    pub base_position: Vec3,
}

impl Default for CalibrationPose {
    fn default() -> Self {
        Self {
            base_orientation: Quat::IDENTITY,
            base_position: Vec3::ZERO,
        }
    }
}

impl CalibrationPose {
    /// Express a raw engine-space pose relative to this baseline.
    pub fn rebase(&self, raw: Pose) -> Pose {
        let inverse = self.base_orientation.inverse();
        Pose {
            orientation: (inverse * raw.orientation).normalize(),
            position: inverse * (raw.position - self.base_position),
        }
    }
}
