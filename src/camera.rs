use glam::{Mat4, Vec3};

/// Perspective camera described by a vertical field of view and a look-at pair.
#[derive(Clone, Debug, PartialEq)]
pub struct PerspectiveCamera {
    fov_degrees: f32,
    aspect: f32,
    near: f32,
    far: f32,
    eye: Vec3,
    target: Vec3,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            fov_degrees: 35.0,
            aspect: 1.0,
            near: 0.1,
            far: 1000.0,
            eye: Vec3::new(0.0, 0.0, 1.0),
            target: Vec3::ZERO,
        }
    }
}

impl PerspectiveCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_perspective(&mut self, fov_degrees: f32, aspect: f32, near: f32, far: f32) {
        self.fov_degrees = fov_degrees;
        self.aspect = aspect.max(0.01);
        self.near = near;
        self.far = far;
    }

    pub fn look_at(&mut self, eye: Vec3, target: Vec3) {
        self.eye = eye;
        self.target = target;
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn fov_degrees(&self) -> f32 {
        self.fov_degrees
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn clip_planes(&self) -> (f32, f32) {
        (self.near, self.far)
    }

    /// Right-handed view matrix with +Y as world up.
    ///
    /// When the view direction is parallel to +Y the up vector falls back to
    /// -Z so the basis stays well defined.
    pub fn view_matrix(&self) -> Mat4 {
        let forward = (self.target - self.eye).normalize_or_zero();
        let up = if forward.cross(Vec3::Y).length_squared() > f32::EPSILON {
            Vec3::Y
        } else {
            Vec3::NEG_Z
        };
        Mat4::look_at_rh(self.eye, self.target, up)
    }

    /// Projection into wgpu clip space (depth in `0..1`).
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn target_projects_to_screen_center() {
        let mut camera = PerspectiveCamera::new();
        camera.set_perspective(60.0, 4.0 / 3.0, 0.5, 500.0);
        camera.look_at(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO);
        let clip = camera.view_projection() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5);
        assert!(ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn depth_range_spans_clip_planes() {
        let mut camera = PerspectiveCamera::new();
        camera.set_perspective(100.0, 1.0, 0.5, 7.0);
        camera.look_at(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        let project = |z: f32| {
            let clip = camera.view_projection() * Vec4::new(0.0, 0.0, z, 1.0);
            clip.z / clip.w
        };
        assert!(project(-0.5).abs() < 1e-5);
        assert!((project(-7.0) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn looking_straight_down_keeps_a_valid_basis() {
        let mut camera = PerspectiveCamera::new();
        camera.look_at(Vec3::new(0.0, 5.0, 0.0), Vec3::ZERO);
        assert!(camera.view_matrix().is_finite());
    }
}
