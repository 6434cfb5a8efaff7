use crate::math::vec2::Vec2;
use crate::objects::rigid_body::RigidBody;

/// Result of a narrow-phase test between two overlapping polygons.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collision {
    /// Index of the first body involved in the collision.
    pub body_a: usize,
    /// Index of the second body involved in the collision.
    pub body_b: usize,
    /// Unit collision normal, pointing from body A towards body B.
    pub normal: Vec2,
    /// Penetration depth along `normal`. Never negative.
    pub distance: f64,
    /// Single representative contact point in world space.
    pub point: Vec2,
}

/// Up to two world-space contact points for one collision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactManifold {
    points: [Vec2; 2],
    count: usize,
    /// True when the reference face came from body A.
    pub reference_is_a: bool,
}

impl ContactManifold {
    pub fn empty() -> Self {
        Self {
            points: [Vec2::ZERO; 2],
            count: 0,
            reference_is_a: true,
        }
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points[..self.count]
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Average of the contact points, or `None` for an empty manifold.
    pub fn centroid(&self) -> Option<Vec2> {
        if self.count == 0 {
            return None;
        }
        let sum = self.points().iter().fold(Vec2::ZERO, |acc, p| acc + *p);
        Some(sum / self.count as f64)
    }

    fn push(&mut self, point: Vec2) {
        if self.count < 2 {
            self.points[self.count] = point;
            self.count += 1;
        }
    }
}

/// Polygon edge closest to perpendicular to a direction.
#[derive(Debug, Clone, Copy)]
struct Edge {
    a: Vec2,
    b: Vec2,
}

impl Edge {
    fn direction(&self) -> Vec2 {
        self.b - self.a
    }
}

/// Finds the most extreme vertex along `direction` and picks whichever of its
/// two edges is more perpendicular to it.
fn best_edge(vertices: &[Vec2], direction: Vec2) -> Edge {
    let n = vertices.len();
    let mut index = 0;
    let mut max_proj = f64::NEG_INFINITY;
    for (i, v) in vertices.iter().enumerate() {
        let proj = v.dot(direction);
        if proj > max_proj {
            max_proj = proj;
            index = i;
        }
    }

    let v = vertices[index];
    let next = vertices[(index + 1) % n];
    let prev = vertices[(index + n - 1) % n];

    let left = (v - next).normalize();
    let right = (v - prev).normalize();

    if right.dot(direction).abs() <= left.dot(direction).abs() {
        Edge { a: prev, b: v }
    } else {
        Edge { a: v, b: next }
    }
}

/// Keeps the part of segment `v1`-`v2` with `normal · p >= offset`.
fn clip(v1: Vec2, v2: Vec2, normal: Vec2, offset: f64) -> Vec<Vec2> {
    let mut kept = Vec::with_capacity(2);
    let d1 = normal.dot(v1) - offset;
    let d2 = normal.dot(v2) - offset;

    if d1 >= 0.0 {
        kept.push(v1);
    }
    if d2 >= 0.0 {
        kept.push(v2);
    }
    if d1 * d2 < 0.0 {
        let t = d1 / (d1 - d2);
        kept.push(v1 + (v2 - v1) * t);
    }
    kept
}

/// Picks the edge closer to perpendicular to `normal` as the reference face.
/// Ties go to `e1`. The flag is set when the reference came from `e2`.
fn choose_reference(e1: Edge, e2: Edge, normal: Vec2) -> (Edge, Edge, bool) {
    let tilt1 = e1.direction().normalize().dot(normal).abs();
    let tilt2 = e2.direction().normalize().dot(normal).abs();
    if tilt1 <= tilt2 {
        (e1, e2, false)
    } else {
        (e2, e1, true)
    }
}

/// Builds the contact manifold for a SAT collision by clipping the incident
/// edge against the side planes of the reference edge.
///
/// Returns an empty manifold when clipping leaves fewer than two points
/// (numerically degenerate configurations); the resolver skips those.
pub fn build_manifold(collision: &Collision, body_a: &RigidBody, body_b: &RigidBody) -> ContactManifold {
    let normal = collision.normal;
    let verts_a = body_a.world_vertices();
    let verts_b = body_b.world_vertices();

    let e1 = best_edge(&verts_a, normal);
    let e2 = best_edge(&verts_b, -normal);

    let (reference, incident, flip) = choose_reference(e1, e2, normal);

    let ref_dir = reference.direction().normalize();

    let o1 = ref_dir.dot(reference.a);
    let clipped = clip(incident.a, incident.b, ref_dir, o1);
    if clipped.len() < 2 {
        return ContactManifold::empty();
    }

    let o2 = ref_dir.dot(reference.b);
    let clipped = clip(clipped[0], clipped[1], -ref_dir, -o2);
    if clipped.len() < 2 {
        return ContactManifold::empty();
    }

    // Face normal of the reference edge, pointing at the other polygon.
    let toward = if flip { -normal } else { normal };
    let mut face_normal = ref_dir.perpendicular();
    if face_normal.dot(toward) < 0.0 {
        face_normal = -face_normal;
    }

    let mut manifold = ContactManifold {
        reference_is_a: !flip,
        ..ContactManifold::empty()
    };
    for point in clipped {
        if face_normal.dot(point - reference.a) <= 0.0 {
            manifold.push(point);
        }
    }
    manifold
}
