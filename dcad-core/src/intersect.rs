//! 几何内核：实体形状与轴对齐查询矩形的求交、线段最近点。
//!
//! 求交只考虑轮廓。`touches` 在轮廓与矩形边相交，或轮廓整体落在矩形内时为真，
//! 因此“完全包含”必然也算“触碰”。

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::geometry::{Extremes, Point2};

/// 最近点查询结果。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClosestPoint {
    pub point: Point2,
    pub distance: f64,
}

/// 椭圆的归一化描述：圆心、两个半轴与主轴（`radius_x`）方向角。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EllipseShape {
    pub centre: Point2,
    pub radius_x: f64,
    pub radius_y: f64,
    pub rotation: f64,
}

impl EllipseShape {
    /// 参数角 `parameter`（弧度）处的轮廓点，位于椭圆自身旋转坐标系中。
    pub fn point_at(&self, parameter: f64) -> Point2 {
        let (sin_t, cos_t) = parameter.sin_cos();
        let (sin_r, cos_r) = self.rotation.sin_cos();
        let x = self.centre.x() + self.radius_x * cos_t * cos_r - self.radius_y * sin_t * sin_r;
        let y = self.centre.y() + self.radius_y * sin_t * cos_r + self.radius_x * cos_t * sin_r;
        Point2::new(x, y)
    }

    /// 世界坐标转换到以圆心为原点、主轴为 X 轴的局部坐标。
    pub fn to_local(&self, point: Point2) -> DVec2 {
        let (sin_r, cos_r) = self.rotation.sin_cos();
        let offset = point.as_vec2() - self.centre.as_vec2();
        DVec2::new(
            offset.x * cos_r + offset.y * sin_r,
            -offset.x * sin_r + offset.y * cos_r,
        )
    }

    pub fn to_world(&self, local: DVec2) -> Point2 {
        let (sin_r, cos_r) = self.rotation.sin_cos();
        Point2::new(
            self.centre.x() + local.x * cos_r - local.y * sin_r,
            self.centre.y() + local.x * sin_r + local.y * cos_r,
        )
    }
}

/// 供框选使用的形状描述。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IntersectShape {
    Polyline { points: Vec<Point2> },
    Ellipse(EllipseShape),
    Composite(Vec<IntersectShape>),
}

impl IntersectShape {
    /// 轮廓与矩形四条边的交点。
    pub fn intersections(&self, window: &Extremes) -> Vec<Point2> {
        match self {
            IntersectShape::Polyline { points } => intersect_polyline_rectangle(points, window),
            IntersectShape::Ellipse(shape) => intersect_ellipse_rectangle(shape, window),
            IntersectShape::Composite(parts) => parts
                .iter()
                .flat_map(|part| part.intersections(window))
                .collect(),
        }
    }

    pub fn touches(&self, window: &Extremes) -> bool {
        match self {
            IntersectShape::Polyline { points } => polyline_touches_rectangle(points, window),
            IntersectShape::Ellipse(shape) => ellipse_touches_rectangle(shape, window),
            IntersectShape::Composite(parts) => parts.iter().any(|part| part.touches(window)),
        }
    }
}

fn rectangle_edges(window: &Extremes) -> [(Point2, Point2); 4] {
    let bottom_left = Point2::new(window.xmin, window.ymin);
    let bottom_right = Point2::new(window.xmax, window.ymin);
    let top_right = Point2::new(window.xmax, window.ymax);
    let top_left = Point2::new(window.xmin, window.ymax);
    [
        (bottom_left, bottom_right),
        (bottom_right, top_right),
        (top_right, top_left),
        (top_left, bottom_left),
    ]
}

/// 线段求交，端点包含在内。平行或共线时返回 `None`。
pub fn intersect_segments(a1: Point2, a2: Point2, b1: Point2, b2: Point2) -> Option<Point2> {
    let ua_t = (b2.x() - b1.x()) * (a1.y() - b1.y()) - (b2.y() - b1.y()) * (a1.x() - b1.x());
    let ub_t = (a2.x() - a1.x()) * (a1.y() - b1.y()) - (a2.y() - a1.y()) * (a1.x() - b1.x());
    let u_b = (b2.y() - b1.y()) * (a2.x() - a1.x()) - (b2.x() - b1.x()) * (a2.y() - a1.y());

    if u_b == 0.0 {
        return None;
    }

    let ua = ua_t / u_b;
    let ub = ub_t / u_b;
    if (0.0..=1.0).contains(&ua) && (0.0..=1.0).contains(&ub) {
        Some(Point2::new(
            a1.x() + ua * (a2.x() - a1.x()),
            a1.y() + ua * (a2.y() - a1.y()),
        ))
    } else {
        None
    }
}

pub fn intersect_polyline_rectangle(points: &[Point2], window: &Extremes) -> Vec<Point2> {
    let edges = rectangle_edges(window);
    let mut result = Vec::new();
    for segment in points.windows(2) {
        for (start, end) in edges {
            if let Some(point) = intersect_segments(segment[0], segment[1], start, end) {
                result.push(point);
            }
        }
    }
    result
}

pub fn polyline_touches_rectangle(points: &[Point2], window: &Extremes) -> bool {
    if !intersect_polyline_rectangle(points, window).is_empty() {
        return true;
    }
    // 无交点时轮廓要么全在内、要么全在外，检查任一顶点即可。
    points.first().is_some_and(|point| window.contains(*point))
}

/// 椭圆与线段求交。零长度半轴按线段处理，避免除零。
pub fn intersect_ellipse_segment(shape: &EllipseShape, a1: Point2, a2: Point2) -> Vec<Point2> {
    let rx = shape.radius_x.abs();
    let ry = shape.radius_y.abs();

    if rx <= f64::EPSILON || ry <= f64::EPSILON {
        let (start, end) = if rx > f64::EPSILON {
            (DVec2::new(-rx, 0.0), DVec2::new(rx, 0.0))
        } else {
            (DVec2::new(0.0, -ry), DVec2::new(0.0, ry))
        };
        let start = shape.to_world(start);
        let end = shape.to_world(end);
        if start.is_same(end) {
            return if point_on_segment(start, a1, a2) {
                vec![start]
            } else {
                Vec::new()
            };
        }
        return intersect_segments(a1, a2, start, end).into_iter().collect();
    }

    let origin = shape.to_local(a1);
    let direction = shape.to_local(a2) - origin;
    let m_dir = DVec2::new(direction.x / (rx * rx), direction.y / (ry * ry));
    let m_diff = DVec2::new(origin.x / (rx * rx), origin.y / (ry * ry));

    let a = direction.dot(m_dir);
    if a == 0.0 {
        return Vec::new();
    }
    let b = direction.dot(m_diff);
    let c = origin.dot(m_diff) - 1.0;
    let d = b * b - a * c;

    let mut parameters = Vec::with_capacity(2);
    if d > 0.0 {
        let root = d.sqrt();
        parameters.push((-b - root) / a);
        parameters.push((-b + root) / a);
    } else if d == 0.0 {
        parameters.push(-b / a);
    }

    parameters
        .into_iter()
        .filter(|t| (0.0..=1.0).contains(t))
        .map(|t| shape.to_world(origin + direction * t))
        .collect()
}

pub fn intersect_ellipse_rectangle(shape: &EllipseShape, window: &Extremes) -> Vec<Point2> {
    rectangle_edges(window)
        .into_iter()
        .flat_map(|(start, end)| intersect_ellipse_segment(shape, start, end))
        .collect()
}

pub fn ellipse_touches_rectangle(shape: &EllipseShape, window: &Extremes) -> bool {
    if !intersect_ellipse_rectangle(shape, window).is_empty() {
        return true;
    }
    window.contains(shape.point_at(0.0))
}

fn point_on_segment(point: Point2, a: Point2, b: Point2) -> bool {
    let ab = b.as_vec2() - a.as_vec2();
    let ap = point.as_vec2() - a.as_vec2();
    if ab.perp_dot(ap) != 0.0 {
        return false;
    }
    let t = ap.dot(ab);
    t >= 0.0 && t <= ab.length_squared()
}

/// 依次对每段求（不截断的）垂足，取距离最小者；距离相同时后出现的线段胜出。
/// 所有线段都退化时返回 `None`。
pub fn closest_on_segments(points: &[Point2], query: Point2) -> Option<ClosestPoint> {
    let mut best: Option<ClosestPoint> = None;
    for segment in points.windows(2) {
        let Some(foot) = query.perpendicular(segment[0], segment[1]) else {
            continue;
        };
        let distance = query.distance(foot);
        if best.is_none_or(|current| distance <= current.distance) {
            best = Some(ClosestPoint {
                point: foot,
                distance,
            });
        }
    }
    best
}

/// 距查询点最近的顶点。
pub fn closest_vertex(points: &[Point2], query: Point2) -> Option<ClosestPoint> {
    points
        .iter()
        .map(|point| ClosestPoint {
            point: *point,
            distance: query.distance(*point),
        })
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn window() -> Extremes {
        Extremes::new(0.0, 10.0, 0.0, 10.0)
    }

    #[test]
    fn segments_cross_inclusive_of_endpoints() {
        let hit = intersect_segments(
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
            Point2::new(10.0, 0.0),
        )
        .expect("diagonals cross");
        assert!((hit.x() - 5.0).abs() < 1e-12);
        assert!((hit.y() - 5.0).abs() < 1e-12);

        let at_end = intersect_segments(
            Point2::new(0.0, 0.0),
            Point2::new(5.0, 0.0),
            Point2::new(5.0, -1.0),
            Point2::new(5.0, 1.0),
        );
        assert_eq!(at_end, Some(Point2::new(5.0, 0.0)));
    }

    #[test]
    fn parallel_segments_do_not_intersect() {
        assert!(
            intersect_segments(
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 0.0),
                Point2::new(0.0, 1.0),
                Point2::new(10.0, 1.0),
            )
            .is_none()
        );
    }

    #[test]
    fn polyline_crossing_and_containment() {
        let crossing = [Point2::new(-5.0, 5.0), Point2::new(5.0, 5.0)];
        assert_eq!(intersect_polyline_rectangle(&crossing, &window()).len(), 1);
        assert!(polyline_touches_rectangle(&crossing, &window()));

        let inside = [Point2::new(2.0, 2.0), Point2::new(3.0, 3.0)];
        assert!(intersect_polyline_rectangle(&inside, &window()).is_empty());
        assert!(polyline_touches_rectangle(&inside, &window()));

        let outside = [Point2::new(20.0, 20.0), Point2::new(30.0, 30.0)];
        assert!(!polyline_touches_rectangle(&outside, &window()));
    }

    #[test]
    fn ellipse_point_at_follows_rotation() {
        let shape = EllipseShape {
            centre: Point2::new(0.0, 0.0),
            radius_x: 10.0,
            radius_y: 5.0,
            rotation: FRAC_PI_2,
        };
        let p = shape.point_at(0.0);
        assert!(p.x().abs() < 1e-9);
        assert!((p.y() - 10.0).abs() < 1e-9);
        let back = shape.to_world(shape.to_local(Point2::new(3.0, -2.0)));
        assert!((back.x() - 3.0).abs() < 1e-9);
        assert!((back.y() + 2.0).abs() < 1e-9);
    }

    #[test]
    fn ellipse_segment_two_crossings() {
        let shape = EllipseShape {
            centre: Point2::new(0.0, 0.0),
            radius_x: 10.0,
            radius_y: 5.0,
            rotation: 0.0,
        };
        let hits = intersect_ellipse_segment(&shape, Point2::new(-20.0, 0.0), Point2::new(20.0, 0.0));
        assert_eq!(hits.len(), 2);
        assert!((hits[0].x() + 10.0).abs() < 1e-9);
        assert!((hits[1].x() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn ellipse_inside_window_touches_without_crossings() {
        let shape = EllipseShape {
            centre: Point2::new(5.0, 5.0),
            radius_x: 2.0,
            radius_y: 1.0,
            rotation: 0.3,
        };
        assert!(intersect_ellipse_rectangle(&shape, &window()).is_empty());
        assert!(ellipse_touches_rectangle(&shape, &window()));
    }

    #[test]
    fn window_inside_ellipse_does_not_touch_outline() {
        let shape = EllipseShape {
            centre: Point2::new(5.0, 5.0),
            radius_x: 100.0,
            radius_y: 80.0,
            rotation: 0.0,
        };
        assert!(!ellipse_touches_rectangle(&shape, &window()));
    }

    #[test]
    fn degenerate_ellipse_is_treated_as_segment() {
        let shape = EllipseShape {
            centre: Point2::new(5.0, -5.0),
            radius_x: 0.0,
            radius_y: 10.0,
            rotation: 0.0,
        };
        let hits = intersect_ellipse_rectangle(&shape, &window());
        assert_eq!(hits.len(), 1);
        assert!((hits[0].y()).abs() < 1e-9);
    }

    #[test]
    fn closest_prefers_later_segment_on_tie() {
        let points = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
        ];
        let closest = closest_on_segments(&points, Point2::new(5.0, 5.0)).unwrap();
        assert_eq!(closest.point, Point2::new(10.0, 5.0));
        assert!((closest.distance - 5.0).abs() < 1e-12);
    }

    #[test]
    fn closest_skips_zero_length_segments() {
        let points = [Point2::new(1.0, 1.0), Point2::new(1.0, 1.0)];
        assert!(closest_on_segments(&points, Point2::new(0.0, 0.0)).is_none());
        let vertex = closest_vertex(&points, Point2::new(0.0, 0.0)).unwrap();
        assert_eq!(vertex.point, Point2::new(1.0, 1.0));
    }
}
