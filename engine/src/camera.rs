//! Orbit camera for volume windows.

use glam::{Mat4, Vec3};

/// Camera circling the unit cube that holds a 3D grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArcballCamera {
    /// Rotation around the vertical axis (radians)
    pub yaw: f32,
    /// Elevation (radians), kept short of the poles
    pub pitch: f32,
    /// Distance from the cube center
    pub distance: f32,
    /// Vertical field of view (radians)
    pub fov_y: f32,
    /// Near clip plane
    pub z_near: f32,
    /// Far clip plane
    pub z_far: f32,
}

const PITCH_LIMIT: f32 = core::f32::consts::FRAC_PI_2 - 0.017;

impl Default for ArcballCamera {
    fn default() -> Self {
        Self {
            yaw: 0.6,
            pitch: 0.4,
            distance: 3.0,
            fov_y: 60f32.to_radians(),
            z_near: 0.01,
            z_far: 100.0,
        }
    }
}

impl ArcballCamera {
    /// Rotate by a drag delta in radians.
    pub fn rotate(&mut self, d_yaw: f32, d_pitch: f32) {
        self.yaw -= d_yaw;
        self.pitch = (self.pitch - d_pitch).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Move toward (`factor < 1`) or away from the center.
    pub fn dolly(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.distance = (self.distance * factor).clamp(0.8, 10.0);
        }
    }

    /// Eye position in world space.
    pub fn eye(&self) -> Vec3 {
        Vec3::new(
            self.distance * self.yaw.cos() * self.pitch.cos(),
            self.distance * self.pitch.sin(),
            self.distance * self.yaw.sin() * self.pitch.cos(),
        )
    }

    /// World-to-view transform.
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), Vec3::ZERO, Vec3::Y)
    }

    /// Combined projection and view for a viewport aspect ratio.
    pub fn view_proj(&self, aspect: f32) -> [[f32; 4]; 4] {
        let proj = Mat4::perspective_rh(self.fov_y, aspect.max(1e-3), self.z_near, self.z_far);
        (proj * self.view()).to_cols_array_2d()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eye_stays_at_distance_and_pitch_is_clamped() {
        let mut cam = ArcballCamera::default();
        cam.rotate(0.3, -10.0);
        assert!(cam.pitch <= PITCH_LIMIT);
        assert!((cam.eye().length() - cam.distance).abs() < 1e-4);
        cam.dolly(100.0);
        assert_eq!(cam.distance, 10.0);
        let origin = cam.view().transform_point3(Vec3::ZERO);
        assert!((origin.z + cam.distance).abs() < 1e-3);
    }
}
