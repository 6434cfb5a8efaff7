use super::vec2::Vec2;

/// A rigid 2D transform: rotation about the local origin followed by a translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec2,
    /// Angle in radians, counter-clockwise.
    pub rotation: f64,
}

impl Transform {
    pub fn new(position: Vec2, rotation: f64) -> Self {
        Self { position, rotation }
    }

    pub fn identity() -> Self {
        Self::new(Vec2::ZERO, 0.0)
    }

    /// Maps a local-space point to world space.
    pub fn apply(self, point: Vec2) -> Vec2 {
        point.rotate(self.rotation) + self.position
    }

    /// Rotates a local-space direction into world space (no translation).
    pub fn apply_vector(self, direction: Vec2) -> Vec2 {
        direction.rotate(self.rotation)
    }

    /// Maps a world-space point back to local space.
    pub fn apply_inverse(self, point: Vec2) -> Vec2 {
        (point - self.position).rotate(-self.rotation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;
    const EPSILON: f64 = 1e-10;

    #[test]
    fn test_transform_identity() {
        let t = Transform::default();
        let p = Vec2::new(5.0, -3.0);
        assert_eq!(t, Transform::identity());
        assert_abs_diff_eq!(t.apply(p), p, epsilon = EPSILON);
        assert_abs_diff_eq!(t.apply_inverse(p), p, epsilon = EPSILON);
    }

    #[test]
    fn test_transform_rotation_then_translation() {
        let t = Transform::new(Vec2::new(10.0, 5.0), PI / 2.0);
        // (1,0) rotates to (0,1), then moves to (10,6).
        assert_abs_diff_eq!(t.apply(Vec2::X), Vec2::new(10.0, 6.0), epsilon = EPSILON);
        // Directions ignore the translation.
        assert_abs_diff_eq!(t.apply_vector(Vec2::X), Vec2::Y, epsilon = EPSILON);
    }

    #[test]
    fn test_transform_inverse_round_trip() {
        let t = Transform::new(Vec2::new(10.0, 5.0), PI / 4.0);
        let local = Vec2::new(1.0, 1.0);
        let world = t.apply(local);
        assert_abs_diff_eq!(t.apply_inverse(world), local, epsilon = EPSILON);
    }
}
