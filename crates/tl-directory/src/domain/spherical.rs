//! # Spherical Lookup
//!
//! Locates the trixel containing a latitude/longitude at a given level.
//!
//! The 8 base triangles are spanned by the octahedron vertices on the unit
//! sphere. Descending one level replaces a triangle `(a, b, c)` with the
//! child whose edges enclose the point, using the normalized edge midpoints
//! `w0 = |b + c|`, `w1 = |a + c|`, `w2 = |a + b|`.

use super::errors::DirectoryError;
use super::trixel::{TrixelId, MAX_LEVEL, ROOTS};

type Vec3 = [f64; 3];

const V0: Vec3 = [0.0, 0.0, 1.0];
const V1: Vec3 = [1.0, 0.0, 0.0];
const V2: Vec3 = [0.0, 1.0, 0.0];
const V3: Vec3 = [-1.0, 0.0, 0.0];
const V4: Vec3 = [0.0, -1.0, 0.0];
const V5: Vec3 = [0.0, 0.0, -1.0];

/// Corners of `S0..S3, N0..N3`, counter-clockwise seen from outside.
const ROOT_TRIANGLES: [[Vec3; 3]; 8] = [
    [V1, V5, V2],
    [V2, V5, V3],
    [V3, V5, V4],
    [V4, V5, V1],
    [V1, V0, V4],
    [V4, V0, V3],
    [V3, V0, V2],
    [V2, V0, V1],
];

impl TrixelId {
    /// Trixel at `level` that contains the point `(lat, lon)` in degrees.
    ///
    /// Points exactly on an edge resolve to the lowest-numbered candidate.
    pub fn from_lat_lon(lat: f64, lon: f64, level: u8) -> Result<TrixelId, DirectoryError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(DirectoryError::InvalidCoordinates(format!(
                "latitude {lat} out of range"
            )));
        }
        if !lon.is_finite() {
            return Err(DirectoryError::InvalidCoordinates(format!(
                "longitude {lon} is not finite"
            )));
        }
        if level > MAX_LEVEL {
            return Err(DirectoryError::InvalidCoordinates(format!(
                "level {level} exceeds {MAX_LEVEL}"
            )));
        }

        let point = to_cartesian(lat, lon);
        let (mut id, mut triangle) = best_match(&point, ROOTS.iter().copied().zip(ROOT_TRIANGLES));

        for _ in 0..level {
            let [a, b, c] = triangle;
            let w0 = normalize(add(b, c));
            let w1 = normalize(add(a, c));
            let w2 = normalize(add(a, b));
            let candidates = [[a, w2, w1], [b, w0, w2], [c, w1, w0], [w0, w1, w2]];
            let children = id.children()?;
            (id, triangle) = best_match(&point, children.into_iter().zip(candidates));
        }
        Ok(id)
    }
}

/// Candidate whose weakest edge test is the least negative.
fn best_match(
    point: &Vec3,
    candidates: impl Iterator<Item = (TrixelId, [Vec3; 3])>,
) -> (TrixelId, [Vec3; 3]) {
    let mut best: Option<(f64, TrixelId, [Vec3; 3])> = None;
    for (id, tri) in candidates {
        let score = edge_score(point, &tri);
        match best {
            Some((current, _, _)) if current >= score => {}
            _ => best = Some((score, id, tri)),
        }
    }
    // Candidates are never empty.
    best.map(|(_, id, tri)| (id, tri))
        .unwrap_or((ROOTS[0], ROOT_TRIANGLES[0]))
}

/// Minimum signed distance of `point` to the three edge planes.
fn edge_score(point: &Vec3, [a, b, c]: &[Vec3; 3]) -> f64 {
    let ab = dot(cross(*a, *b), *point);
    let bc = dot(cross(*b, *c), *point);
    let ca = dot(cross(*c, *a), *point);
    ab.min(bc).min(ca)
}

fn to_cartesian(lat: f64, lon: f64) -> Vec3 {
    let (lat, lon) = (lat.to_radians(), lon.to_radians());
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

fn add(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize(v: Vec3) -> Vec3 {
    let len = dot(v, v).sqrt();
    [v[0] / len, v[1] / len, v[2] / len]
}
