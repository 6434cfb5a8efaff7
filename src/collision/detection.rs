use crate::math::vec2::Vec2;
use crate::objects::rigid_body::RigidBody;
use super::manifold::Collision;

/// Projects world-space vertices onto an axis and returns `(min, max)`.
pub fn project_onto_axis(vertices: &[Vec2], axis: Vec2) -> (f64, f64) {
    let mut min_proj = f64::INFINITY;
    let mut max_proj = f64::NEG_INFINITY;

    for vertex in vertices {
        let projection = vertex.dot(axis);
        min_proj = min_proj.min(projection);
        max_proj = max_proj.max(projection);
    }
    (min_proj, max_proj)
}

/// Which polygon supplied the axis of least penetration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisOwner {
    A,
    B,
}

/// Checks for collision between two convex polygons using the separating
/// axis theorem.
///
/// Candidate axes are A's edge normals followed by B's. Touching polygons
/// (zero overlap) count as colliding. The returned normal points from A
/// towards B.
pub fn check_collision(
    body_a: &RigidBody,
    body_a_idx: usize,
    body_b: &RigidBody,
    body_b_idx: usize,
) -> Option<Collision> {
    let verts_a = body_a.world_vertices();
    let verts_b = body_b.world_vertices();

    let axes = body_a
        .world_normals()
        .into_iter()
        .map(|axis| (axis, AxisOwner::A))
        .chain(body_b.world_normals().into_iter().map(|axis| (axis, AxisOwner::B)));

    let mut min_overlap = f64::INFINITY;
    let mut best_axis = Vec2::ZERO;
    let mut owner = AxisOwner::A;

    for (axis, axis_owner) in axes {
        let (min_a, max_a) = project_onto_axis(&verts_a, axis);
        let (min_b, max_b) = project_onto_axis(&verts_b, axis);

        let overlap = (max_a - min_b).min(max_b - min_a);
        if overlap < 0.0 {
            // Found a separating axis
            return None;
        }
        if overlap < min_overlap {
            min_overlap = overlap;
            best_axis = axis;
            owner = axis_owner;
        }
    }

    let mut normal = best_axis;
    if (body_b.position - body_a.position).dot(normal) < 0.0 {
        normal = -normal;
    }
    let distance = min_overlap;

    // Deepest vertex of the incident polygon, pushed back onto the reference face.
    let point = match owner {
        AxisOwner::A => deepest_vertex(&verts_b, -normal) + normal * distance,
        AxisOwner::B => deepest_vertex(&verts_a, normal) - normal * distance,
    };

    Some(Collision {
        body_a: body_a_idx,
        body_b: body_b_idx,
        normal,
        distance,
        point,
    })
}

/// Vertex with the greatest projection onto `direction`. The first one wins ties.
fn deepest_vertex(vertices: &[Vec2], direction: Vec2) -> Vec2 {
    let mut best = vertices[0];
    let mut best_proj = best.dot(direction);
    for vertex in &vertices[1..] {
        let proj = vertex.dot(direction);
        if proj > best_proj {
            best_proj = proj;
            best = *vertex;
        }
    }
    best
}
