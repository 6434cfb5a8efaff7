use log::trace;

use crate::common::config::ContactConfig;
use crate::math::vec2::Vec2;
use crate::objects::rigid_body::RigidBody;
use super::manifold::{Collision, ContactManifold};

/// Impulses applied while resolving one collision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedContact {
    pub body_a: usize,
    pub body_b: usize,
    /// Scalar impulse along the collision normal.
    pub normal_impulse: f64,
    /// Scalar impulse along the sliding tangent, after clamping to the friction cone.
    pub friction_impulse: f64,
}

/// Borrows two distinct bodies mutably, in the order asked for.
fn pair_mut(bodies: &mut [RigidBody], a: usize, b: usize) -> Option<(&mut RigidBody, &mut RigidBody)> {
    if a == b || a >= bodies.len() || b >= bodies.len() {
        return None;
    }
    if a < b {
        let (head, tail) = bodies.split_at_mut(b);
        Some((&mut head[a], &mut tail[0]))
    } else {
        let (head, tail) = bodies.split_at_mut(a);
        Some((&mut tail[0], &mut head[b]))
    }
}

/// Applies the normal impulse, positional correction and friction for one
/// collision.
///
/// The impulse acts at the centroid of the manifold points, or at the SAT
/// point when no manifold is given. Returns `None` when nothing was applied:
/// an empty manifold, bodies already separating, or indices that do not name
/// two distinct bodies.
pub fn resolve_collision(
    collision: &Collision,
    manifold: Option<&ContactManifold>,
    bodies: &mut [RigidBody],
    config: &ContactConfig,
) -> Option<ResolvedContact> {
    let contact_point = match manifold {
        Some(manifold) => manifold.centroid()?,
        None => collision.point,
    };
    let (body_a, body_b) = pair_mut(bodies, collision.body_a, collision.body_b)?;
    let normal = collision.normal;

    // Moving apart already
    if (body_b.linear_velocity - body_a.linear_velocity).dot(normal) >= 0.0 {
        return None;
    }

    let inv_mass_a = body_a.inv_mass();
    let inv_mass_b = body_b.inv_mass();
    let inv_mass_sum = match inv_mass_a + inv_mass_b {
        sum if sum == 0.0 => 1.0,
        sum => sum,
    };

    let r_a = contact_point - body_a.position;
    let r_b = contact_point - body_b.position;
    let momentum_a = body_a.inv_inertia() * r_a.cross(normal);
    let momentum_b = body_b.inv_inertia() * r_b.cross(normal);
    let rot_weight = momentum_a * r_a.cross(normal) + momentum_b * r_b.cross(normal);

    let relative_velocity = body_b.point_velocity(contact_point) - body_a.point_velocity(contact_point);
    let relative_velocity_normal = relative_velocity.dot(normal);

    let j = -(config.restitution + 1.0) * relative_velocity_normal / (inv_mass_sum + rot_weight);
    let correction = collision.distance / inv_mass_sum * config.position_damping;

    body_a.linear_velocity -= normal * (j * inv_mass_a);
    body_a.position -= normal * (correction * inv_mass_a);
    body_a.angular_velocity -= j * momentum_a;

    body_b.linear_velocity += normal * (j * inv_mass_b);
    body_b.position += normal * (correction * inv_mass_b);
    body_b.angular_velocity += j * momentum_b;

    let jt = apply_friction(body_a, body_b, normal, inv_mass_sum, j, config.friction);

    trace!(
        "Resolved contact {}-{}: j={:.4}, jt={:.4}, correction={:.4}",
        collision.body_a,
        collision.body_b,
        j,
        jt,
        correction
    );

    Some(ResolvedContact {
        body_a: collision.body_a,
        body_b: collision.body_b,
        normal_impulse: j,
        friction_impulse: jt,
    })
}

/// Coulomb friction on the linear velocities only. Returns the clamped impulse.
fn apply_friction(
    body_a: &mut RigidBody,
    body_b: &mut RigidBody,
    normal: Vec2,
    inv_mass_sum: f64,
    normal_impulse: f64,
    friction: f64,
) -> f64 {
    let diff = body_b.linear_velocity - body_a.linear_velocity;
    let tangent = (diff - normal * diff.dot(normal)).normalize();

    let limit = normal_impulse.abs() * friction;
    let jt = (-diff.dot(tangent) / inv_mass_sum).clamp(-limit, limit);

    body_a.linear_velocity -= tangent * (body_a.inv_mass() * jt);
    body_b.linear_velocity += tangent * (body_b.inv_mass() * jt);
    jt
}
