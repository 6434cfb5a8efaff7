use crate::math::vec2::Vec2;
use crate::objects::rigid_body::RigidBody;

/// Advances one body by `dt` with semi-implicit Euler: velocities first, then
/// position and rotation from the new velocities.
///
/// Gravity is applied as a force scaled by mass. Static bodies keep their
/// state; every body leaves with cleared accumulators.
pub fn integrate(body: &mut RigidBody, gravity: Vec2, dt: f64) {
    let inv_mass = body.inv_mass();
    if inv_mass == 0.0 {
        body.clear_accumulators();
        return;
    }

    body.apply_force(gravity * body.mass());

    // Linear: v += F/m dt, p += v dt
    body.linear_velocity += body.force * (inv_mass * dt);
    body.position += body.linear_velocity * dt;

    // Angular: w += T/I dt, theta += w dt
    body.angular_velocity += body.torque * body.inv_inertia() * dt;
    body.rotation = wrap_angle(body.rotation + body.angular_velocity * dt);

    body.clear_accumulators();
}

/// Wraps an angle in radians to the range [-PI, PI].
fn wrap_angle(angle: f64) -> f64 {
    angle.sin().atan2(angle.cos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Polygon;
    use std::f64::consts::PI;
    const EPSILON: f64 = 1e-9;

    // Unit square of density 1: mass 1, inertia 1/6.
    fn unit_box() -> RigidBody {
        RigidBody::new(1.0, Polygon::square(1.0).unwrap())
    }

    #[test]
    fn test_integrate_linear_motion_no_force() {
        let mut rb = unit_box();
        rb.linear_velocity = Vec2::new(10.0, -5.0);

        integrate(&mut rb, Vec2::ZERO, 0.1);

        assert!((rb.position.x - 1.0).abs() < EPSILON);
        assert!((rb.position.y + 0.5).abs() < EPSILON);
        assert_eq!(rb.linear_velocity, Vec2::new(10.0, -5.0));
        assert_eq!(rb.force, Vec2::ZERO);
    }

    #[test]
    fn test_integrate_constant_force() {
        let mut rb = RigidBody::new(2.0, Polygon::square(1.0).unwrap()); // mass 2
        rb.apply_force(Vec2::new(10.0, 0.0));

        integrate(&mut rb, Vec2::ZERO, 0.1);

        // a = 5, v = 0.5, p = 0.05
        assert!((rb.linear_velocity.x - 0.5).abs() < EPSILON);
        assert!((rb.position.x - 0.05).abs() < EPSILON);
        assert_eq!(rb.force, Vec2::ZERO);
    }

    #[test]
    fn test_integrate_gravity_is_mass_independent() {
        let mut light = unit_box();
        let mut heavy = RigidBody::new(8.0, Polygon::square(1.0).unwrap());
        let gravity = Vec2::new(0.0, -9.81);

        integrate(&mut light, gravity, 0.1);
        integrate(&mut heavy, gravity, 0.1);

        assert!((light.linear_velocity.y + 0.981).abs() < EPSILON);
        assert!((heavy.linear_velocity.y - light.linear_velocity.y).abs() < EPSILON);
        assert!((light.position.y + 0.0981).abs() < EPSILON);
    }

    #[test]
    fn test_integrate_angular_motion_constant_torque() {
        let mut rb = unit_box();
        let inertia = rb.inertia();
        rb.torque = 5.0;

        integrate(&mut rb, Vec2::ZERO, 0.1);

        let alpha = 5.0 / inertia;
        assert!((rb.angular_velocity - alpha * 0.1).abs() < EPSILON);
        assert!((rb.rotation - alpha * 0.01).abs() < EPSILON);
        assert_eq!(rb.torque, 0.0);
    }

    #[test]
    fn test_integrate_static_object() {
        let mut rb = RigidBody::new(0.0, Polygon::square(1.0).unwrap());
        rb.position = Vec2::new(1.0, 1.0);
        rb.rotation = 1.0;
        rb.linear_velocity = Vec2::new(1.0, 1.0);
        rb.angular_velocity = 1.0;
        rb.force = Vec2::new(10.0, 10.0);
        rb.torque = 10.0;

        let initial = rb.clone();
        integrate(&mut rb, Vec2::new(0.0, -9.81), 0.1);

        assert_eq!(rb.position, initial.position);
        assert_eq!(rb.rotation, initial.rotation);
        assert_eq!(rb.linear_velocity, initial.linear_velocity);
        assert_eq!(rb.force, Vec2::ZERO);
        assert_eq!(rb.torque, 0.0);
    }

    #[test]
    fn test_wrap_angle() {
        assert!(wrap_angle(0.0).abs() < EPSILON);
        assert!((wrap_angle(PI) - PI).abs() < EPSILON);
        assert!((wrap_angle(-PI) + PI).abs() < EPSILON);
        assert!((wrap_angle(PI + 0.1) - (-PI + 0.1)).abs() < EPSILON);
        assert!((wrap_angle(-PI - 0.1) - (PI - 0.1)).abs() < EPSILON);
        assert!(wrap_angle(2.0 * PI).abs() < EPSILON);
    }
}
