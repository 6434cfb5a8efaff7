use crate::error::{CollisionError, Result};
use crate::math::vec2::Vec2;

/// Below this absolute area a polygon is rejected as degenerate.
const MIN_AREA: f64 = 1e-10;

/// A convex polygon in local space.
///
/// Construction normalizes the winding to counter-clockwise and recenters the
/// vertices on the centroid, so the local origin is the center of mass.
/// Convexity itself is a caller contract and is not checked.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    vertices: Vec<Vec2>,
    normals: Vec<Vec2>,
    area: f64,
    /// Second moment of area about the centroid divided by the area.
    unit_inertia: f64,
    /// Where the centroid sat in the caller's vertex frame.
    centroid_offset: Vec2,
}

impl Polygon {
    /// Builds a polygon from its vertices (either winding).
    pub fn new(mut vertices: Vec<Vec2>) -> Result<Self> {
        let n = vertices.len();
        if n < 3 {
            return Err(CollisionError::DegeneratePolygon { vertices: n, area: 0.0 });
        }

        let signed_area = signed_area(&vertices);
        if !(signed_area.abs() >= MIN_AREA) {
            return Err(CollisionError::DegeneratePolygon {
                vertices: n,
                area: signed_area.abs(),
            });
        }
        if signed_area < 0.0 {
            vertices.reverse();
        }
        let area = signed_area.abs();

        let centroid = centroid(&vertices, area);
        for v in vertices.iter_mut() {
            *v -= centroid;
        }

        let normals = outward_normals(&vertices);
        let unit_inertia = second_moment(&vertices) / area;

        Ok(Self {
            vertices,
            normals,
            area,
            unit_inertia,
            centroid_offset: centroid,
        })
    }

    /// Axis-aligned rectangle of the given width and height.
    pub fn rectangle(width: f64, height: f64) -> Result<Self> {
        let hw = width / 2.0;
        let hh = height / 2.0;
        Self::new(vec![
            Vec2::new(-hw, -hh),
            Vec2::new(hw, -hh),
            Vec2::new(hw, hh),
            Vec2::new(-hw, hh),
        ])
    }

    pub fn square(size: f64) -> Result<Self> {
        Self::rectangle(size, size)
    }

    /// Regular polygon with `sides` vertices on a circle of `radius`.
    pub fn regular(radius: f64, sides: usize) -> Result<Self> {
        let step = std::f64::consts::TAU / sides.max(1) as f64;
        let vertices = (0..sides)
            .map(|i| Vec2::new(radius, 0.0).rotate(step * i as f64))
            .collect();
        Self::new(vertices)
    }

    /// Counter-clockwise vertices relative to the centroid.
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    /// Outward unit normal of edge `i` (from vertex `i` to vertex `i + 1`).
    pub fn normals(&self) -> &[Vec2] {
        &self.normals
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    /// Rotational inertia per unit mass about the centroid.
    pub fn unit_inertia(&self) -> f64 {
        self.unit_inertia
    }

    /// Centroid of the vertices as they were passed to [`Polygon::new`].
    pub fn centroid_offset(&self) -> Vec2 {
        self.centroid_offset
    }

    /// Inclusive point-in-polygon test in local space.
    pub fn contains_local(&self, point: Vec2) -> bool {
        self.vertices
            .iter()
            .zip(&self.normals)
            .all(|(v, n)| n.dot(point - *v) <= 0.0)
    }
}

fn signed_area(vertices: &[Vec2]) -> f64 {
    let n = vertices.len();
    let twice: f64 = (0..n).map(|i| vertices[i].cross(vertices[(i + 1) % n])).sum();
    twice / 2.0
}

/// Area-weighted centroid. Assumes counter-clockwise winding.
fn centroid(vertices: &[Vec2], area: f64) -> Vec2 {
    let n = vertices.len();
    let mut sum = Vec2::ZERO;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        sum += (a + b) * a.cross(b);
    }
    sum / (6.0 * area)
}

/// Second moment of area about the local origin (density 1).
fn second_moment(vertices: &[Vec2]) -> f64 {
    let n = vertices.len();
    let mut sum = 0.0;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        sum += a.cross(b) * (a.magnitude_squared() + a.dot(b) + b.magnitude_squared());
    }
    sum / 12.0
}

fn outward_normals(vertices: &[Vec2]) -> Vec<Vec2> {
    let n = vertices.len();
    (0..n)
        .map(|i| {
            let edge = vertices[(i + 1) % n] - vertices[i];
            // Clockwise perpendicular points out of a counter-clockwise polygon.
            (-edge.perpendicular()).normalize()
        })
        .collect()
}
