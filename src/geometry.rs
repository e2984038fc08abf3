use imageproc::geometry::arc_length;
use imageproc::point::Point as ImagePoint;
use nalgebra::{Matrix3, Point2, RowSVector, SMatrix, SVector, Vector2};

/// Pixel-space point (x to the right, y down)
pub type Point = Point2<f64>;

/// Convert an imageproc contour point into a floating point pixel coordinate
pub fn from_contour_point(p: &ImagePoint<i32>) -> Point {
    Point::new(p.x as f64, p.y as f64)
}

/// Perimeter of a closed polygon (last vertex connects back to the first)
pub fn closed_perimeter(points: &[Point]) -> f64 {
    let arc: Vec<ImagePoint<f64>> = points.iter().map(|p| ImagePoint::new(p.x, p.y)).collect();
    arc_length(&arc, true)
}

/// Twice the signed area. Positive means clockwise on screen (y axis pointing down).
fn signed_area2(points: &[Point]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum()
}

/// Area enclosed by a closed polygon (shoelace formula)
pub fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    signed_area2(points).abs() / 2.0
}

fn cross(o: &Point, a: &Point, b: &Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Convex hull by Andrew's monotone chain. Collinear points are dropped.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
    });
    sorted.dedup();

    if sorted.len() < 3 {
        return sorted;
    }

    let mut lower: Vec<Point> = Vec::with_capacity(sorted.len());
    for p in &sorted {
        while lower.len() >= 2
            && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0
        {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<Point> = Vec::with_capacity(sorted.len());
    for p in sorted.iter().rev() {
        while upper.len() >= 2
            && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0
        {
            upper.pop();
        }
        upper.push(*p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// A rectangle at arbitrary rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center: Point,
    /// Side closer to the image x axis
    pub width: f64,
    /// Side closer to the image y axis
    pub height: f64,
    /// Rotation of the width side in degrees, in (-45, 45]
    pub angle: f64,
}

impl RotatedRect {
    /// Corners in top-left, top-right, bottom-right, bottom-left order (for angle 0)
    pub fn corners(&self) -> [Point; 4] {
        let theta = self.angle.to_radians();
        let u = Vector2::new(theta.cos(), theta.sin()) * (self.width / 2.0);
        let v = Vector2::new(-theta.sin(), theta.cos()) * (self.height / 2.0);
        let c = self.center;
        [c - u - v, c + u - v, c + u + v, c - u + v]
    }
}

/// Minimum-area enclosing rectangle using rotating calipers over the convex hull
pub fn min_area_rect(points: &[Point]) -> RotatedRect {
    let hull = convex_hull(points);

    if hull.len() < 3 {
        // Degenerate: a point or a segment. Fall back to the axis-aligned extent.
        let (min_x, max_x) = hull
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.x), hi.max(p.x)));
        let (min_y, max_y) = hull
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
        if hull.is_empty() {
            return RotatedRect {
                center: Point::origin(),
                width: 0.0,
                height: 0.0,
                angle: 0.0,
            };
        }
        return RotatedRect {
            center: Point::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0),
            width: max_x - min_x,
            height: max_y - min_y,
            angle: 0.0,
        };
    }

    let n = hull.len();
    let mut best: Option<(f64, RotatedRect)> = None;

    for i in 0..n {
        let edge = hull[(i + 1) % n] - hull[i];
        let length = edge.norm();
        if length < f64::EPSILON {
            continue;
        }
        let dir = edge / length;
        let normal = Vector2::new(-dir.y, dir.x);

        let (mut min_d, mut max_d) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_n, mut max_n) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in &hull {
            let rel = *p - hull[i];
            let d = rel.dot(&dir);
            let m = rel.dot(&normal);
            min_d = min_d.min(d);
            max_d = max_d.max(d);
            min_n = min_n.min(m);
            max_n = max_n.max(m);
        }

        let along = max_d - min_d;
        let across = max_n - min_n;
        let area = along * across;

        if best.as_ref().map_or(true, |(a, _)| area < *a) {
            let center = hull[i] + dir * ((min_d + max_d) / 2.0) + normal * ((min_n + max_n) / 2.0);
            let rect = normalize_rect(center, along, across, dir.y.atan2(dir.x).to_degrees());
            best = Some((area, rect));
        }
    }

    best.map(|(_, r)| r).unwrap_or(RotatedRect {
        center: hull[0],
        width: 0.0,
        height: 0.0,
        angle: 0.0,
    })
}

/// Bring an edge angle into (-45, 45] and assign sides so width follows the x axis
fn normalize_rect(center: Point, along: f64, across: f64, angle_deg: f64) -> RotatedRect {
    let mut angle = angle_deg;
    while angle > 90.0 {
        angle -= 180.0;
    }
    while angle <= -90.0 {
        angle += 180.0;
    }

    let (width, height, angle) = if angle > 45.0 {
        (across, along, angle - 90.0)
    } else if angle <= -45.0 {
        (across, along, angle + 90.0)
    } else {
        (along, across, angle)
    };
    RotatedRect {
        center,
        width,
        height,
        angle,
    }
}

/// True when the polygon turns the same way at every vertex
pub fn is_convex(points: &[Point]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0.0;
    for i in 0..n {
        let c = cross(&points[i], &points[(i + 1) % n], &points[(i + 2) % n]);
        if c.abs() < f64::EPSILON {
            return false;
        }
        if sign == 0.0 {
            sign = c.signum();
        } else if c.signum() != sign {
            return false;
        }
    }
    true
}

/// Reorder a quad so it runs clockwise on screen, starting at the vertex
/// nearest the image origin
pub fn order_clockwise(quad: [Point; 4]) -> [Point; 4] {
    let mut q = quad;
    if signed_area2(&q) < 0.0 {
        q.reverse();
    }
    let start = q
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (a.x + a.y)
                .partial_cmp(&(b.x + b.y))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0);
    q.rotate_left(start);
    q
}

/// Even-odd point in polygon test
pub fn contains_point(polygon: &[Point], p: &Point) -> bool {
    let n = polygon.len();
    let mut inside = false;
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Centroid of a set of vertices
pub fn centroid(points: &[Point]) -> Point {
    if points.is_empty() {
        return Point::origin();
    }
    let sum = points.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords);
    Point::from(sum / points.len() as f64)
}

/// Projective transform mapping each `src[i]` onto `dst[i]`.
///
/// Solves the 8x8 DLT system with h33 fixed to 1. Returns `None` for
/// degenerate correspondences (three collinear points).
pub fn homography(src: &[Point; 4], dst: &[Point; 4]) -> Option<Matrix3<f64>> {
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for i in 0..4 {
        let (x, y) = (src[i].x, src[i].y);
        let (u, v) = (dst[i].x, dst[i].y);
        let r = 2 * i;
        let row_u = [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y];
        let row_v = [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y];
        a.set_row(r, &RowSVector::<f64, 8>::from_row_slice(&row_u));
        a.set_row(r + 1, &RowSVector::<f64, 8>::from_row_slice(&row_v));
        b[r] = u;
        b[r + 1] = v;
    }

    let h = a.lu().solve(&b)?;
    Some(Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0))
}

/// Transform a point using a 3x3 projective matrix
pub fn transform_point(matrix: &Matrix3<f64>, x: f64, y: f64) -> (f64, f64) {
    let p = nalgebra::Vector3::new(x, y, 1.0);
    let result = matrix * p;
    (result.x / result.z, result.y / result.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f64, y: f64, side: f64) -> Vec<Point> {
        vec![
            Point::new(x, y),
            Point::new(x + side, y),
            Point::new(x + side, y + side),
            Point::new(x, y + side),
        ]
    }

    #[test]
    fn test_perimeter_of_square() {
        let sq = square(0.0, 0.0, 100.0);
        assert!((closed_perimeter(&sq) - 400.0).abs() < 1e-9);
        assert!((polygon_area(&sq) - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_min_area_rect_axis_aligned() {
        let pts = vec![
            Point::new(10.0, 10.0),
            Point::new(210.0, 10.0),
            Point::new(210.0, 110.0),
            Point::new(10.0, 110.0),
            Point::new(100.0, 50.0),
        ];
        let rect = min_area_rect(&pts);
        assert!((rect.width - 200.0).abs() < 1e-6);
        assert!((rect.height - 100.0).abs() < 1e-6);
        assert!(rect.angle.abs() < 1e-6);
        assert!((rect.center.x - 110.0).abs() < 1e-6);
        assert!((rect.center.y - 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_min_area_rect_tall_shape() {
        let pts = square(0.0, 0.0, 1.0)
            .into_iter()
            .map(|p| Point::new(p.x * 40.0, p.y * 300.0))
            .collect::<Vec<_>>();
        let rect = min_area_rect(&pts);
        assert!((rect.width - 40.0).abs() < 1e-6);
        assert!((rect.height - 300.0).abs() < 1e-6);
    }

    #[test]
    fn test_min_area_rect_rotated() {
        let rect = RotatedRect {
            center: Point::new(100.0, 100.0),
            width: 80.0,
            height: 30.0,
            angle: 20.0,
        };
        let fitted = min_area_rect(&rect.corners());
        assert!((fitted.width - 80.0).abs() < 1e-6);
        assert!((fitted.height - 30.0).abs() < 1e-6);
        assert!((fitted.angle - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_order_clockwise() {
        let ccw = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 0.0),
        ];
        let ordered = order_clockwise(ccw);
        assert_eq!(ordered[0], Point::new(0.0, 0.0));
        assert_eq!(ordered[1], Point::new(10.0, 0.0));
        assert_eq!(ordered[2], Point::new(10.0, 10.0));
    }

    #[test]
    fn test_homography_maps_corners() {
        let src = [
            Point::new(0.0, 0.0),
            Point::new(7.0, 0.0),
            Point::new(7.0, 7.0),
            Point::new(0.0, 7.0),
        ];
        let dst = [
            Point::new(100.0, 120.0),
            Point::new(310.0, 110.0),
            Point::new(320.0, 330.0),
            Point::new(90.0, 320.0),
        ];
        let h = homography(&src, &dst).unwrap();
        for (s, d) in src.iter().zip(dst.iter()) {
            let (x, y) = transform_point(&h, s.x, s.y);
            assert!((x - d.x).abs() < 1e-6);
            assert!((y - d.y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_contains_point() {
        let sq = square(0.0, 0.0, 10.0);
        assert!(contains_point(&sq, &Point::new(5.0, 5.0)));
        assert!(!contains_point(&sq, &Point::new(15.0, 5.0)));
    }
}
