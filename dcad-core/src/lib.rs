pub mod entity;
pub mod intersect;

pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示。相等比较为精确比较，不带容差。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        /// 精确相等判断。尺寸标注的退化检测依赖该语义，不能改成模糊比较。
        #[inline]
        pub fn is_same(self, other: Point2) -> bool {
            self.0.x == other.0.x && self.0.y == other.0.y
        }

        #[inline]
        pub fn distance(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn mid_point(self, other: Point2) -> Point2 {
            Self((self.0 + other.0) * 0.5)
        }

        /// 从 `self` 指向 `other` 的方向角，弧度，范围 (-π, π]。
        #[inline]
        pub fn angle_to(self, other: Point2) -> f64 {
            (other.0.y - self.0.y).atan2(other.0.x - self.0.x)
        }

        /// 沿 `angle` 方向移动 `distance`。
        #[inline]
        pub fn project(self, angle: f64, distance: f64) -> Point2 {
            Self(self.0 + DVec2::new(angle.cos(), angle.sin()) * distance)
        }

        /// 求 `self` 到直线 `a`-`b` 的垂足。垂足不会被限制在线段内；
        /// 当 `a` 与 `b` 重合（方向不确定）时返回 `None`。
        pub fn perpendicular(self, a: Point2, b: Point2) -> Option<Point2> {
            if a.is_same(b) {
                return None;
            }
            let direction = b.0 - a.0;
            let length_squared = direction.length_squared();
            if length_squared == 0.0 {
                return None;
            }
            let t = (self.0 - a.0).dot(direction) / length_squared;
            Some(Self(a.0 + direction * t))
        }

        /// 绕 `pivot` 逆时针旋转 `angle` 弧度。
        pub fn rotate(self, pivot: Point2, angle: f64) -> Point2 {
            let (sin, cos) = angle.sin_cos();
            let offset = self.0 - pivot.0;
            Self(pivot.0 + DVec2::new(offset.x * cos - offset.y * sin, offset.x * sin + offset.y * cos))
        }
    }

    impl Default for Point2 {
        fn default() -> Self {
            Self::new(0.0, 0.0)
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量，用于椭圆主轴与平移。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        /// 逆时针旋转 90° 得到的垂直向量。
        #[inline]
        pub fn perp(self) -> Vector2 {
            Self(DVec2::new(-self.0.y, self.0.x))
        }

        #[inline]
        pub fn scale(self, factor: f64) -> Vector2 {
            Self(self.0 * factor)
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐范围 `[xmin, xmax, ymin, ymax]`，用于实体包围盒与框选窗口。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Extremes {
        pub xmin: f64,
        pub xmax: f64,
        pub ymin: f64,
        pub ymax: f64,
    }

    impl Extremes {
        #[inline]
        pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Self {
            Self {
                xmin,
                xmax,
                ymin,
                ymax,
            }
        }

        /// 由两个对角点构造窗口，顺序无关。
        pub fn from_corners(a: Point2, b: Point2) -> Self {
            Self {
                xmin: a.x().min(b.x()),
                xmax: a.x().max(b.x()),
                ymin: a.y().min(b.y()),
                ymax: a.y().max(b.y()),
            }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                xmin: f64::INFINITY,
                xmax: f64::NEG_INFINITY,
                ymin: f64::INFINITY,
                ymax: f64::NEG_INFINITY,
            }
        }

        /// 点集为空时返回 `None`。
        pub fn from_points<I>(points: I) -> Option<Self>
        where
            I: IntoIterator<Item = Point2>,
        {
            let mut extremes = Self::empty();
            for point in points {
                extremes.include_point(point);
            }
            if extremes.is_empty() {
                None
            } else {
                Some(extremes)
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.xmin > self.xmax || self.ymin > self.ymax
        }

        pub fn include_point(&mut self, point: Point2) {
            self.xmin = self.xmin.min(point.x());
            self.xmax = self.xmax.max(point.x());
            self.ymin = self.ymin.min(point.y());
            self.ymax = self.ymax.max(point.y());
        }

        pub fn include_extremes(&mut self, other: &Extremes) {
            if other.is_empty() {
                return;
            }
            self.include_point(Point2::new(other.xmin, other.ymin));
            self.include_point(Point2::new(other.xmax, other.ymax));
        }

        #[inline]
        pub fn as_array(&self) -> [f64; 4] {
            [self.xmin, self.xmax, self.ymin, self.ymax]
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            Point2::new(self.xmin, self.ymin)
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            Point2::new(self.xmax, self.ymax)
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.xmax - self.xmin
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.ymax - self.ymin
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            self.min().mid_point(self.max())
        }

        /// 闭区间判断，边界上的点视为在内。
        #[inline]
        pub fn contains(&self, point: Point2) -> bool {
            point.x() >= self.xmin
                && point.x() <= self.xmax
                && point.y() >= self.ymin
                && point.y() <= self.ymax
        }

        /// 四条边均严格位于 `window` 内部时为真；与边界重合不算在内。
        #[inline]
        pub fn lies_strictly_inside(&self, window: &Extremes) -> bool {
            self.xmin > window.xmin
                && self.xmax < window.xmax
                && self.ymin > window.ymin
                && self.ymax < window.ymax
        }
    }

    impl From<[f64; 4]> for Extremes {
        fn from(value: [f64; 4]) -> Self {
            Self::new(value[0], value[1], value[2], value[3])
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::f64::consts::{FRAC_PI_2, PI};

        #[test]
        fn distance_and_mid_point() {
            let a = Point2::new(0.0, 0.0);
            let b = Point2::new(3.0, 4.0);
            assert!((a.distance(b) - 5.0).abs() < 1e-12);
            let mid = a.mid_point(b);
            assert_eq!(mid, Point2::new(1.5, 2.0));
        }

        #[test]
        fn angle_covers_half_open_range() {
            let origin = Point2::new(0.0, 0.0);
            assert!((origin.angle_to(Point2::new(0.0, 1.0)) - FRAC_PI_2).abs() < 1e-12);
            assert!((origin.angle_to(Point2::new(-1.0, 0.0)) - PI).abs() < 1e-12);
            assert!(origin.angle_to(Point2::new(1.0, 0.0)).abs() < 1e-12);
        }

        #[test]
        fn project_moves_along_angle() {
            let p = Point2::new(1.0, 1.0).project(FRAC_PI_2, 2.0);
            assert!((p.x() - 1.0).abs() < 1e-12);
            assert!((p.y() - 3.0).abs() < 1e-12);
        }

        #[test]
        fn perpendicular_foot_is_not_clamped() {
            let foot = Point2::new(20.0, 5.0)
                .perpendicular(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0))
                .expect("line is well defined");
            assert_eq!(foot, Point2::new(20.0, 0.0));
        }

        #[test]
        fn perpendicular_is_none_for_coincident_points() {
            let a = Point2::new(2.0, 2.0);
            assert!(Point2::new(5.0, 5.0).perpendicular(a, a).is_none());
        }

        #[test]
        fn rotate_about_pivot() {
            let p = Point2::new(2.0, 1.0).rotate(Point2::new(1.0, 1.0), FRAC_PI_2);
            assert!((p.x() - 1.0).abs() < 1e-12);
            assert!((p.y() - 2.0).abs() < 1e-12);
        }

        #[test]
        fn is_same_is_exact() {
            let a = Point2::new(1.0, 1.0);
            assert!(a.is_same(Point2::new(1.0, 1.0)));
            assert!(!a.is_same(Point2::new(1.0, 1.0 + 1e-15)));
        }

        #[test]
        fn extremes_strict_containment() {
            let inner = Extremes::new(1.0, 2.0, 1.0, 2.0);
            let window = Extremes::new(0.0, 3.0, 0.0, 3.0);
            assert!(inner.lies_strictly_inside(&window));
            let touching = Extremes::new(0.0, 2.0, 1.0, 2.0);
            assert!(!touching.lies_strictly_inside(&window));
            assert!(window.contains(Point2::new(0.0, 3.0)));
            assert!(Extremes::from_points(Vec::new()).is_none());
        }
    }
}

pub mod errors {
    use thiserror::Error;

    use crate::entity::EntityKind;

    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum GeometryError {
        #[error("{kind:?} requires at least {required} points, got {actual}")]
        InsufficientPoints {
            kind: EntityKind,
            required: usize,
            actual: usize,
        },
    }

    /// 解析几何查询前检查最少点数，未满足视为调用方违约。
    pub fn ensure_min_points(
        kind: EntityKind,
        actual: usize,
    ) -> Result<(), GeometryError> {
        let required = kind.min_points();
        if actual < required {
            Err(GeometryError::InsufficientPoints {
                kind,
                required,
                actual,
            })
        } else {
            Ok(())
        }
    }
}
