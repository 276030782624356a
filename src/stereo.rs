//! Stereo view configuration for a side-by-side display.

use glam::{Mat4, Quat, Vec3};

/// Physical description of the attached display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayDescription {
    /// Full panel resolution, both eyes side by side.
    pub resolution: (u32, u32),
    /// Per-eye horizontal field of view in degrees.
    pub fov_h_deg: f32,
    /// Per-eye vertical field of view in degrees.
    pub fov_v_deg: f32,
    pub ipd_meters: f32,
    /// Near clip plane in world units.
    pub near_clip: f32,
}

impl Default for DisplayDescription {
    fn default() -> Self {
        Self {
            resolution: (1920, 1080),
            fov_h_deg: 90.0,
            fov_v_deg: 101.25,
            ipd_meters: 0.063,
            near_clip: 10.0,
        }
    }
}

impl DisplayDescription {
    pub fn eye_resolution(&self) -> (u32, u32) {
        (self.resolution.0 / 2, self.resolution.1)
    }

    pub fn eye_aspect(&self) -> f32 {
        let (w, h) = self.eye_resolution();
        if h == 0 {
            1.0
        } else {
            w as f32 / h as f32
        }
    }
}

/// Which view of a frame is being set up.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StereoPass {
    Full = 0,
    LeftEye = 1,
    RightEye = 2,
}

impl StereoPass {
    /// -1 for the left eye, +1 for the right, 0 for a mono view.
    fn side(self) -> f32 {
        match self {
            StereoPass::Full => 0.0,
            StereoPass::LeftEye => -1.0,
            StereoPass::RightEye => 1.0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Split a viewport into the half used by `pass`.
pub fn adjust_view_rect(pass: StereoPass, rect: ViewRect) -> ViewRect {
    let half = rect.width / 2;
    match pass {
        StereoPass::Full => rect,
        StereoPass::LeftEye => ViewRect { width: half, ..rect },
        StereoPass::RightEye => ViewRect {
            x: rect.x + half as i32,
            width: half,
            ..rect
        },
    }
}

/// Offset to add to the view location for `pass`: half the IPD along the
/// view's right axis (+Y), in world units.
pub fn stereo_view_offset(
    display: &DisplayDescription,
    pass: StereoPass,
    view_rotation: Quat,
    world_to_meters: f32,
) -> Vec3 {
    let eye = pass.side() * display.ipd_meters * 0.5 * world_to_meters;
    view_rotation * Vec3::new(0.0, eye, 0.0)
}

/// Reversed-Z infinite perspective for one eye.
pub fn stereo_projection_matrix(display: &DisplayDescription, pass: StereoPass) -> Mat4 {
    let aspect = match pass {
        StereoPass::Full => {
            let (w, h) = display.resolution;
            if h == 0 {
                1.0
            } else {
                w as f32 / h as f32
            }
        }
        StereoPass::LeftEye | StereoPass::RightEye => display.eye_aspect(),
    };
    Mat4::perspective_infinite_reverse_lh(display.fov_v_deg.to_radians(), aspect, display.near_clip)
}
