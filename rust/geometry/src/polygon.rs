// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2D polygon and segment helpers

use nalgebra::{Point2, Vector2};

#[inline]
fn cross(o: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Signed polygon area (shoelace); positive for counter-clockwise input
pub fn signed_area(points: &[Point2<f64>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    area / 2.0
}

/// Convex hull (Andrew's monotone chain), counter-clockwise, collinear
/// points removed. Fewer than 3 distinct points are returned as-is.
pub fn convex_hull(points: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut pts: Vec<Point2<f64>> = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup_by(|a, b| (a.x - b.x).abs() < 1e-12 && (a.y - b.y).abs() < 1e-12);
    if pts.len() < 3 {
        return pts;
    }

    let mut hull: Vec<Point2<f64>> = Vec::with_capacity(pts.len() * 2);
    for p in pts.iter() {
        while hull.len() >= 2 && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(*p);
    }
    let lower_len = hull.len() + 1;
    for p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(*p);
    }
    hull.pop();
    hull
}

/// Intersection of the lines `p1 + t·d1` and `p2 + s·d2`, `None` when parallel
pub fn line_intersection(
    p1: &Point2<f64>,
    d1: &Vector2<f64>,
    p2: &Point2<f64>,
    d2: &Vector2<f64>,
) -> Option<Point2<f64>> {
    let denom = d1.x * d2.y - d1.y * d2.x;
    if denom.abs() < 1e-9 * d1.norm().max(1e-12) * d2.norm().max(1e-12) {
        return None;
    }
    let w = p2 - p1;
    let t = (w.x * d2.y - w.y * d2.x) / denom;
    Some(p1 + d1 * t)
}

/// Offset a convex polygon outward by `distance`. The result is
/// counter-clockwise regardless of the input orientation.
pub fn offset_convex_polygon(points: &[Point2<f64>], distance: f64) -> Vec<Point2<f64>> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }
    let mut ring = points.to_vec();
    if signed_area(&ring) < 0.0 {
        ring.reverse();
    }

    // Outward normal of a counter-clockwise edge is its right-hand side
    let edges: Vec<(Point2<f64>, Vector2<f64>, Vector2<f64>)> = (0..n)
        .map(|i| {
            let a = ring[i];
            let d = ring[(i + 1) % n] - a;
            let normal = Vector2::new(d.y, -d.x)
                .try_normalize(1e-12)
                .unwrap_or_else(Vector2::zeros);
            (a + normal * distance, d, normal)
        })
        .collect();

    (0..n)
        .map(|i| {
            let (prev_p, prev_d, prev_n) = &edges[(i + n - 1) % n];
            let (p, d, _) = &edges[i];
            line_intersection(prev_p, prev_d, p, d)
                .unwrap_or_else(|| ring[i] + prev_n * distance)
        })
        .collect()
}

/// Closest point on segment `a..b` to `p`, as (clamped parameter, point)
pub fn project_onto_segment(
    p: &Point2<f64>,
    a: &Point2<f64>,
    b: &Point2<f64>,
) -> (f64, Point2<f64>) {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq < 1e-20 {
        return (0.0, *a);
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    (t, a + ab * t)
}

/// Distance from `p` to segment `a..b`
#[inline]
pub fn point_segment_distance(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let (_, closest) = project_onto_segment(p, a, b);
    (p - closest).norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_convex_hull_square_with_interior() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 2.0),
        ];
        let hull = convex_hull(&points);
        assert_eq!(hull.len(), 4);
        assert_relative_eq!(signed_area(&hull), 4.0);
    }

    #[test]
    fn test_offset_square() {
        let square = vec![
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 4.0),
            Point2::new(4.0, 4.0),
            Point2::new(4.0, 0.0),
        ];
        let grown = offset_convex_polygon(&square, 0.5);
        assert_relative_eq!(signed_area(&grown), 25.0, epsilon = 1e-9);
        assert!(grown
            .iter()
            .any(|p| (p.x + 0.5).abs() < 1e-9 && (p.y + 0.5).abs() < 1e-9));
    }

    #[test]
    fn test_line_intersection() {
        let p = line_intersection(
            &Point2::new(0.0, 1.0),
            &Vector2::new(1.0, 0.0),
            &Point2::new(3.0, -2.0),
            &Vector2::new(0.0, 1.0),
        )
        .unwrap();
        assert_relative_eq!(p.x, 3.0);
        assert_relative_eq!(p.y, 1.0);

        assert!(line_intersection(
            &Point2::new(0.0, 0.0),
            &Vector2::new(1.0, 0.0),
            &Point2::new(0.0, 1.0),
            &Vector2::new(-2.0, 0.0),
        )
        .is_none());
    }

    #[test]
    fn test_point_segment_distance() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(10.0, 0.0);
        assert_relative_eq!(point_segment_distance(&Point2::new(5.0, 3.0), &a, &b), 3.0);
        assert_relative_eq!(point_segment_distance(&Point2::new(-4.0, 3.0), &a, &b), 5.0);
        let (t, _) = project_onto_segment(&Point2::new(2.5, 1.0), &a, &b);
        assert_relative_eq!(t, 0.25);
    }
}
