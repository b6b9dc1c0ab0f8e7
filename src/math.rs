//! Measures of simplices, used by the size fields to score element shapes.

use glam::{DMat3, DVec3};

/// Signed volume of the tetrahedron `(a, b, c, d)`. Positive when `d` lies on
/// the side of triangle `(a, b, c)` its right-handed normal points to.
pub fn tet_volume(a: DVec3, b: DVec3, c: DVec3, d: DVec3) -> f64 {
    (b - a).cross(c - a).dot(d - a) / 6.0
}

/// Right-handed normal of the triangle `(a, b, c)`, with a length of twice its
/// area.
pub fn tri_normal(a: DVec3, b: DVec3, c: DVec3) -> DVec3 {
    (b - a).cross(c - a)
}

/// Columns of the affine map from the reference simplex to the element.
pub fn jacobian(points: &[DVec3]) -> DMat3 {
    match *points {
        [a, b, c, d] => DMat3::from_cols(b - a, c - a, d - a),
        [a, b, c] => DMat3::from_cols(b - a, c - a, tri_normal(a, b, c)),
        [a, b] => DMat3::from_cols(b - a, DVec3::ZERO, DVec3::ZERO),
        _ => DMat3::ZERO,
    }
}

/// Centroid of a list of points.
pub fn centroid(points: &[DVec3]) -> DVec3 {
    if points.is_empty() {
        return DVec3::ZERO;
    }
    points.iter().fold(DVec3::ZERO, |acc, p| acc + *p) / points.len() as f64
}

/// Map a point from reference coordinates of the simplex to space.
pub fn map_point(points: &[DVec3], xi: DVec3) -> DVec3 {
    match points.first() {
        Some(origin) => *origin + jacobian(points) * xi,
        None => DVec3::ZERO,
    }
}

/// Mean ratio cubed of a tetrahedron, signed by its volume. It is 1 for the
/// regular tetrahedron, zero for a flat one, and negative when inverted.
pub fn tet_quality(a: DVec3, b: DVec3, c: DVec3, d: DVec3) -> f64 {
    let v = tet_volume(a, b, c, d);
    let lsq = [b - a, c - b, a - c, d - a, d - b, d - c]
        .iter()
        .map(|e| e.length_squared())
        .sum::<f64>();
    if lsq <= 0.0 {
        return 0.0;
    }
    15552.0 * v * v.abs() / (lsq * lsq * lsq)
}

/// Mean ratio squared of a triangle. When `reference` is given, the result
/// is negated if the triangle's normal points away from it.
pub fn tri_quality(a: DVec3, b: DVec3, c: DVec3, reference: Option<DVec3>) -> f64 {
    let n = tri_normal(a, b, c);
    let asq = 0.25 * n.length_squared();
    let lsq = [b - a, c - b, a - c]
        .iter()
        .map(|e| e.length_squared())
        .sum::<f64>();
    if lsq <= 0.0 {
        return 0.0;
    }
    let q = 48.0 * asq / (lsq * lsq);
    match reference {
        Some(r) if n.dot(r) < 0.0 => -q,
        _ => q,
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use glam::dvec3;

    use super::{tet_quality, tet_volume, tri_quality};

    #[test]
    fn t_regular_simplices() {
        let (a, b, c, d) = (
            dvec3(1.0, 1.0, 1.0),
            dvec3(1.0, -1.0, -1.0),
            dvec3(-1.0, 1.0, -1.0),
            dvec3(-1.0, -1.0, 1.0),
        );
        let q = if tet_volume(a, b, c, d) > 0.0 {
            tet_quality(a, b, c, d)
        } else {
            tet_quality(a, c, b, d)
        };
        assert_relative_eq!(q, 1.0, epsilon = 1e-12);
        let h = 3.0f64.sqrt() * 0.5;
        let q = tri_quality(
            dvec3(0.0, 0.0, 0.0),
            dvec3(1.0, 0.0, 0.0),
            dvec3(0.5, h, 0.0),
            None,
        );
        assert_relative_eq!(q, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn t_inverted_and_flat() {
        let (a, b, c) = (
            dvec3(0.0, 0.0, 0.0),
            dvec3(1.0, 0.0, 0.0),
            dvec3(0.0, 1.0, 0.0),
        );
        assert!(tet_quality(a, b, c, dvec3(0.0, 0.0, 1.0)) > 0.0);
        assert!(tet_quality(a, c, b, dvec3(0.0, 0.0, 1.0)) < 0.0);
        assert_eq!(tet_quality(a, b, c, dvec3(0.3, 0.3, 0.0)), 0.0);
        let up = Some(dvec3(0.0, 0.0, 1.0));
        assert!(tri_quality(a, b, c, up) > 0.0);
        assert!(tri_quality(a, c, b, up) < 0.0);
    }
}
