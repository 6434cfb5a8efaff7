use crate::collision::AABB;
use crate::math::{Transform, Vec2};
use crate::shapes::Polygon;

/// A convex polygon with a transform, mass properties and motion state.
///
/// `position` is the world position of the center of mass, which is also the
/// polygon's local origin.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBody {
    pub shape: Polygon,

    // Primary state
    pub position: Vec2,
    pub rotation: f64, // Radians
    pub linear_velocity: Vec2,
    pub angular_velocity: f64, // Radians per second

    // Accumulators, cleared by the integrator every step
    pub force: Vec2,
    pub torque: f64,

    /// Mass per unit area. Zero makes the body static (infinite mass).
    pub density: f64,
}

impl RigidBody {
    /// Creates a body of the given density. The center of mass is placed where
    /// the shape's centroid was in the caller's vertex frame.
    pub fn new(density: f64, shape: Polygon) -> Self {
        let position = shape.centroid_offset();
        Self {
            shape,
            position,
            rotation: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            force: Vec2::ZERO,
            torque: 0.0,
            density: density.max(0.0),
        }
    }

    /// Creates a static body whose shape origin is placed at `position`.
    pub fn new_static(shape: Polygon, position: Vec2, rotation: f64) -> Self {
        let world_com = position + shape.centroid_offset().rotate(rotation);
        Self {
            position: world_com,
            rotation,
            ..Self::new(0.0, shape)
        }
    }

    /// Builder-style helper used when spawning bodies.
    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.linear_velocity = velocity;
        self
    }

    pub fn transform(&self) -> Transform {
        Transform::new(self.position, self.rotation)
    }

    pub fn mass(&self) -> f64 {
        self.density * self.shape.area()
    }

    /// `1 / mass`, or 0 for static bodies.
    pub fn inv_mass(&self) -> f64 {
        let mass = self.mass();
        if mass > 0.0 {
            1.0 / mass
        } else {
            0.0
        }
    }

    /// Moment of inertia about the center of mass.
    pub fn inertia(&self) -> f64 {
        self.shape.unit_inertia() * self.mass()
    }

    /// `1 / inertia`, or 0 when rotation is locked.
    pub fn inv_inertia(&self) -> f64 {
        let inertia = self.inertia();
        if inertia > 0.0 {
            1.0 / inertia
        } else {
            0.0
        }
    }

    pub fn is_static(&self) -> bool {
        self.inv_mass() == 0.0
    }

    /// World-space vertices in the polygon's (counter-clockwise) order.
    pub fn world_vertices(&self) -> Vec<Vec2> {
        let transform = self.transform();
        self.shape.vertices().iter().map(|&v| transform.apply(v)).collect()
    }

    /// World-space outward edge normals, index-aligned with the edges.
    pub fn world_normals(&self) -> Vec<Vec2> {
        let transform = self.transform();
        self.shape.normals().iter().map(|&n| transform.apply_vector(n)).collect()
    }

    /// Tight world-space bounding box of the polygon.
    pub fn calculate_aabb(&self) -> AABB {
        AABB::from_points(&self.world_vertices())
    }

    /// Velocity of the material point currently at `point` (world space).
    pub fn point_velocity(&self, point: Vec2) -> Vec2 {
        self.linear_velocity + (point - self.position).perpendicular() * self.angular_velocity
    }

    /// Inclusive world-space point-in-polygon test.
    pub fn contains_point(&self, point: Vec2) -> bool {
        self.shape.contains_local(self.transform().apply_inverse(point))
    }

    /// Applies a force at the center of mass.
    pub fn apply_force(&mut self, force: Vec2) {
        self.force += force;
    }

    /// Applies a force at a world-space point, producing torque.
    pub fn apply_force_at_point(&mut self, force: Vec2, point_world: Vec2) {
        self.force += force;
        self.torque += (point_world - self.position).cross(force);
    }

    pub fn clear_accumulators(&mut self) {
        self.force = Vec2::ZERO;
        self.torque = 0.0;
    }
}
