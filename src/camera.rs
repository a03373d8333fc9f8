use glam::{Mat4, Quat, Vec3};

/// World up axis used as the yaw reference.
pub const WORLD_UP: Vec3 = Vec3::Y;

/// Translation directions understood by [`Camera::shift`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Forward,
    Backward,
    Left,
    Right,
}

/// Free-fly camera holding a position and an orthonormal basis.
///
/// The basis is re-derived after every rotation: `right` from
/// `front x up` and `up` from `right x front`, so the three vectors stay
/// mutually orthogonal and unit length for the life of the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    position: Vec3,
    front: Vec3,
    right: Vec3,
    up: Vec3,
}

impl Camera {
    /// Builds a camera looking from `position` toward `target`.
    ///
    /// Degenerate inputs (target == position, up colinear with the view
    /// direction) are not guarded and propagate NaNs, matching the
    /// unconstrained-float contract of the rest of the viewer.
    pub fn new(position: Vec3, target: Vec3, up: Vec3) -> Self {
        let front = (target - position).normalize();
        let right = front.cross(up).normalize();
        let up = right.cross(front).normalize();
        Self {
            position,
            front,
            right,
            up,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    /// Translates the camera along its front or right axis.
    ///
    /// Repeated calls accumulate; `speed` is unconstrained.
    pub fn shift(&mut self, direction: MoveDirection, speed: f32) {
        match direction {
            MoveDirection::Forward => self.position += self.front * speed,
            MoveDirection::Backward => self.position -= self.front * speed,
            MoveDirection::Right => self.position += self.right * speed,
            MoveDirection::Left => self.position -= self.right * speed,
        }
    }

    /// Rotates the view direction by `pitch` degrees about the current
    /// right axis, then by `yaw` degrees about the world up axis.
    ///
    /// Pitch is deliberately not clamped; consecutive extreme pitches can
    /// flip the camera over, exactly as the showcase always behaved.
    pub fn rotate(&mut self, pitch: f32, yaw: f32) {
        let pitch_rotation = Quat::from_axis_angle(self.right, pitch.to_radians());
        let yaw_rotation = Quat::from_axis_angle(WORLD_UP, yaw.to_radians());
        self.front = (yaw_rotation * (pitch_rotation * self.front)).normalize();
        self.right = self.front.cross(self.up).normalize();
        self.up = self.right.cross(self.front);
    }

    /// World-to-eye transform for the current state. Pure; no side effects.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f32 = 1e-5;

    fn assert_vec3_close(a: Vec3, b: Vec3) {
        assert!(
            (a - b).length() < TOLERANCE,
            "expected {a:?} to be close to {b:?}"
        );
    }

    fn showcase_camera() -> Camera {
        Camera::new(
            Vec3::new(5.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, -1.0),
            Vec3::new(0.0, 1.0, 0.0),
        )
    }

    #[test]
    fn basis_is_orthonormal_after_construction() {
        let camera = showcase_camera();
        assert!((camera.front().length() - 1.0).abs() < TOLERANCE);
        assert!((camera.right().length() - 1.0).abs() < TOLERANCE);
        assert!((camera.up().length() - 1.0).abs() < TOLERANCE);
        assert!(camera.front().dot(camera.right()).abs() < TOLERANCE);
        assert!(camera.front().dot(camera.up()).abs() < TOLERANCE);
        assert!(camera.right().dot(camera.up()).abs() < TOLERANCE);
    }

    #[test]
    fn view_matrix_matches_independent_look_at() {
        let position = Vec3::new(5.0, 1.0, 0.0);
        let target = Vec3::new(0.0, 1.0, -1.0);
        let camera = Camera::new(position, target, Vec3::Y);

        let front = (target - position).normalize();
        let right = front.cross(Vec3::Y).normalize();
        let up = right.cross(front).normalize();
        let expected = Mat4::look_at_rh(position, position + front, up);

        let view = camera.view_matrix();
        for (got, want) in view
            .to_cols_array()
            .iter()
            .zip(expected.to_cols_array().iter())
        {
            assert!((got - want).abs() < TOLERANCE);
        }
    }

    #[test]
    fn forward_move_follows_front_vector_exactly() {
        let mut camera = Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
        assert_vec3_close(camera.front(), Vec3::new(0.0, 0.0, -1.0));
        camera.shift(MoveDirection::Forward, 0.1);
        assert_vec3_close(camera.position(), Vec3::new(0.0, 0.0, -0.1));
    }

    #[test]
    fn strafe_moves_accumulate() {
        let mut camera = Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
        camera.shift(MoveDirection::Right, 0.5);
        camera.shift(MoveDirection::Right, 0.5);
        camera.shift(MoveDirection::Left, 0.25);
        assert_vec3_close(camera.position(), Vec3::new(0.75, 0.0, 0.0));
    }

    #[test]
    fn yaw_rotation_is_invertible() {
        let mut camera = Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
        let original = camera;
        camera.rotate(0.0, 35.0);
        camera.rotate(0.0, -35.0);
        assert_vec3_close(camera.front(), original.front());
        assert_vec3_close(camera.right(), original.right());
        assert_vec3_close(camera.up(), original.up());
    }

    #[test]
    fn pitch_rotation_is_invertible() {
        let mut camera = Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
        let original = camera;
        camera.rotate(25.0, 0.0);
        camera.rotate(-25.0, 0.0);
        assert_vec3_close(camera.front(), original.front());
        assert_vec3_close(camera.right(), original.right());
        assert_vec3_close(camera.up(), original.up());
    }

    #[test]
    fn rotation_keeps_basis_orthonormal() {
        let mut camera = showcase_camera();
        for _ in 0..50 {
            camera.rotate(3.0, 7.0);
        }
        assert!((camera.front().length() - 1.0).abs() < 1e-4);
        assert!((camera.right().length() - 1.0).abs() < 1e-4);
        assert!((camera.up().length() - 1.0).abs() < 1e-4);
        assert!(camera.front().dot(camera.up()).abs() < 1e-4);
    }
}
