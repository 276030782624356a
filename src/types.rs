use glam::{Quat, Vec3};
use std::sync::atomic::{AtomicU32, Ordering};

/// Raw pose as reported by the tracking client.
///
/// Client convention: right-handed, +Y up, -Z forward, meters.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    /// Translation in meters [x, y, z].
    pub translation: [f64; 3],
    /// Quaternion [qx, qy, qz, qw].
    pub rotation: [f64; 4],
    /// Client timestamp in microseconds.
    pub timestamp_us: u64,
}

impl PoseSample {
    pub const IDENTITY: PoseSample = PoseSample {
        translation: [0.0; 3],
        rotation: [0.0, 0.0, 0.0, 1.0],
        timestamp_us: 0,
    };
}

impl Default for PoseSample {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Pose in engine space: left-handed, +X forward, +Y right, +Z up, world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub orientation: Quat,
    pub position: Vec3,
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        orientation: Quat::IDENTITY,
        position: Vec3::ZERO,
    };
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Which hand of a controller set.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hand {
    Left = 0,
    Right = 1,
}

/// Readiness reported by the tracking client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    Ready,
    NotReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingStatus {
    Tracked,
    NotTracked,
}

bitflags::bitflags! {
    /// Runtime flags of the head-mounted display.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HmdFlags: u32 {
        const CONNECTED           = 1 << 0;
        const ENABLED             = 1 << 1;
        const STEREO              = 1 << 2;
        const POSITIONAL_TRACKING = 1 << 3;
        const LOW_PERSISTENCE     = 1 << 4;
        const OVERRIDES_APPLIED   = 1 << 5;
    }
}

/// World units per meter, shared between the HMD and the input devices.
///
/// Written on the game thread when a level applies its scale, read by any
/// pose conversion.
#[derive(Debug)]
pub struct WorldScale(AtomicU32);

impl WorldScale {
    pub fn new(world_to_meters: f32) -> Self {
        Self(AtomicU32::new(world_to_meters.to_bits()))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, world_to_meters: f32) {
        self.0.store(world_to_meters.to_bits(), Ordering::Release);
    }
}

impl Default for WorldScale {
    fn default() -> Self {
        Self::new(100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_scale_round_trips_through_bits() {
        let scale = WorldScale::new(100.0);
        assert_eq!(scale.get(), 100.0);
        scale.set(37.5);
        assert_eq!(scale.get(), 37.5);
    }
}
