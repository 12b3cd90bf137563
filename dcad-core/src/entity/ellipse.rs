use std::f64::consts::FRAC_PI_2;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::{EntityData, EntityKind, SnapKind, SnapPoint, SnapSettings, Style, nearest_within};
use crate::errors::{GeometryError, ensure_min_points};
use crate::geometry::{Extremes, Point2, Vector2};
use crate::intersect::{ClosestPoint, EllipseShape, IntersectShape};

/// 采样法的样本数：0° 到 360°（含两端，首尾重合），步长 1°。
pub const ELLIPSE_SAMPLES: usize = 361;

/// 采样法最近点的初始距离阈值，超过该距离的样本一律忽略。
pub const CLOSEST_POINT_THRESHOLD: f64 = 1.65;

/// 椭圆范围与最近点的计算策略。
pub trait EllipseStrategy {
    fn extremes(&self, shape: &EllipseShape) -> Extremes;
    fn closest_point(&self, shape: &EllipseShape, query: Point2) -> Option<ClosestPoint>;
}

/// 默认策略：在旋转参数坐标系中按 1° 采样轮廓。
#[derive(Debug, Clone, Copy, Default)]
pub struct SampledEllipse;

impl SampledEllipse {
    fn samples(shape: &EllipseShape) -> impl Iterator<Item = Point2> + '_ {
        (0..ELLIPSE_SAMPLES).map(move |degree| shape.point_at((degree as f64).to_radians()))
    }
}

impl EllipseStrategy for SampledEllipse {
    fn extremes(&self, shape: &EllipseShape) -> Extremes {
        let mut extremes = Extremes::empty();
        for point in Self::samples(shape) {
            extremes.include_point(point);
        }
        extremes
    }

    fn closest_point(&self, shape: &EllipseShape, query: Point2) -> Option<ClosestPoint> {
        let mut best: Option<ClosestPoint> = None;
        let mut threshold = CLOSEST_POINT_THRESHOLD;
        for point in Self::samples(shape) {
            let distance = query.distance(point);
            if distance < threshold {
                threshold = distance;
                best = Some(ClosestPoint { point, distance });
            }
        }
        best
    }
}

/// 解析策略：闭式包围盒与精确垂足（二分求根），没有距离阈值。
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticEllipse;

/// 二分求根的迭代上限，足以耗尽双精度。
const ROOT_ITERATIONS: usize = 1100;

impl AnalyticEllipse {
    /// 半轴 `e0 >= e1 > 0`，查询点位于第一象限 `(y0, y1)`。
    fn first_quadrant(e0: f64, e1: f64, y0: f64, y1: f64) -> DVec2 {
        if y1 > 0.0 {
            if y0 > 0.0 {
                let z0 = y0 / e0;
                let z1 = y1 / e1;
                let g = z0 * z0 + z1 * z1 - 1.0;
                if g != 0.0 {
                    let r0 = (e0 / e1) * (e0 / e1);
                    let s = Self::root(r0, z0, z1, g);
                    DVec2::new(r0 * y0 / (s + r0), y1 / (s + 1.0))
                } else {
                    DVec2::new(y0, y1)
                }
            } else {
                DVec2::new(0.0, e1)
            }
        } else {
            let numer = e0 * y0;
            let denom = e0 * e0 - e1 * e1;
            if numer < denom {
                let ratio = numer / denom;
                DVec2::new(e0 * ratio, e1 * (1.0 - ratio * ratio).sqrt())
            } else {
                DVec2::new(e0, 0.0)
            }
        }
    }

    fn root(r0: f64, z0: f64, z1: f64, g: f64) -> f64 {
        let n0 = r0 * z0;
        let mut s0 = z1 - 1.0;
        let mut s1 = if g < 0.0 {
            0.0
        } else {
            DVec2::new(n0, z1).length() - 1.0
        };
        let mut s = 0.0;
        for _ in 0..ROOT_ITERATIONS {
            s = (s0 + s1) / 2.0;
            if s == s0 || s == s1 {
                break;
            }
            let ratio0 = n0 / (s + r0);
            let ratio1 = z1 / (s + 1.0);
            let g = ratio0 * ratio0 + ratio1 * ratio1 - 1.0;
            if g > 0.0 {
                s0 = s;
            } else if g < 0.0 {
                s1 = s;
            } else {
                break;
            }
        }
        s
    }

    fn closest_local(rx: f64, ry: f64, local: DVec2) -> DVec2 {
        // 零长度半轴退化为线段或点。
        if rx <= f64::EPSILON && ry <= f64::EPSILON {
            return DVec2::ZERO;
        }
        if ry <= f64::EPSILON {
            return DVec2::new(local.x.clamp(-rx, rx), 0.0);
        }
        if rx <= f64::EPSILON {
            return DVec2::new(0.0, local.y.clamp(-ry, ry));
        }

        let swapped = rx < ry;
        let (e0, e1, y0, y1) = if swapped {
            (ry, rx, local.y, local.x)
        } else {
            (rx, ry, local.x, local.y)
        };
        let foot = Self::first_quadrant(e0, e1, y0.abs(), y1.abs());
        let foot = DVec2::new(foot.x.copysign(y0), foot.y.copysign(y1));
        if swapped {
            DVec2::new(foot.y, foot.x)
        } else {
            foot
        }
    }
}

impl EllipseStrategy for AnalyticEllipse {
    fn extremes(&self, shape: &EllipseShape) -> Extremes {
        let (sin_r, cos_r) = shape.rotation.sin_cos();
        let rx = shape.radius_x.abs();
        let ry = shape.radius_y.abs();
        let half_x = ((rx * cos_r).powi(2) + (ry * sin_r).powi(2)).sqrt();
        let half_y = ((rx * sin_r).powi(2) + (ry * cos_r).powi(2)).sqrt();
        Extremes::new(
            shape.centre.x() - half_x,
            shape.centre.x() + half_x,
            shape.centre.y() - half_y,
            shape.centre.y() + half_y,
        )
    }

    fn closest_point(&self, shape: &EllipseShape, query: Point2) -> Option<ClosestPoint> {
        let local = shape.to_local(query);
        let foot = Self::closest_local(shape.radius_x.abs(), shape.radius_y.abs(), local);
        let point = shape.to_world(foot);
        Some(ClosestPoint {
            point,
            distance: query.distance(point),
        })
    }
}

/// 椭圆：圆心、定义一条半轴方向与长度的点、定义垂直半轴长度的点。
/// `width`/`height` 只在构造时由点推导，点在构造后不可修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    points: Vec<Point2>,
    width: f64,
    height: f64,
    pub style: Style,
}

impl Ellipse {
    pub fn new(centre: Point2, axis_point: Point2, second_point: Point2, style: Style) -> Self {
        Self::with_points(vec![centre, axis_point, second_point], style)
    }

    pub fn from_data(data: EntityData) -> Self {
        let mut style = Style::default();
        style.apply(&data);
        Self::with_points(data.points, style)
    }

    /// 由 DXF 式的主轴向量与半径比还原三个构造点。
    pub fn from_axes(centre: Point2, major_axis: Vector2, ratio: f64, style: Style) -> Self {
        let axis_point = centre.translate(major_axis);
        let second_point = centre.translate(major_axis.perp().scale(ratio));
        Self::new(centre, axis_point, second_point, style)
    }

    fn with_points(points: Vec<Point2>, style: Style) -> Self {
        let width = match points.as_slice() {
            [centre, axis, ..] => centre.distance(*axis) * 2.0,
            _ => 0.0,
        };
        let height = match points.as_slice() {
            [centre, _, second, ..] => centre.distance(*second) * 2.0,
            _ => 0.0,
        };
        Self {
            points,
            width,
            height,
            style,
        }
    }

    #[inline]
    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.height
    }

    /// 圆心指向第一个轴点的方向角。
    pub fn rotation(&self) -> f64 {
        match self.points.as_slice() {
            [centre, axis, ..] => centre.angle_to(*axis),
            _ => 0.0,
        }
    }

    #[inline]
    pub fn centre(&self) -> Option<Point2> {
        self.points.first().copied()
    }

    fn ensure_complete(&self) -> Result<(), GeometryError> {
        ensure_min_points(EntityKind::Ellipse, self.points.len())
    }

    pub fn shape(&self) -> Result<EllipseShape, GeometryError> {
        self.ensure_complete()?;
        Ok(EllipseShape {
            centre: self.points[0],
            radius_x: self.width / 2.0,
            radius_y: self.height / 2.0,
            rotation: self.rotation(),
        })
    }

    pub fn extremes(&self) -> Result<Extremes, GeometryError> {
        self.extremes_with(&SampledEllipse)
    }

    pub fn extremes_with(&self, strategy: &dyn EllipseStrategy) -> Result<Extremes, GeometryError> {
        Ok(strategy.extremes(&self.shape()?))
    }

    /// 采样法最近点，所有样本都超出阈值时返回 `None`。
    pub fn closest_point(&self, query: Point2) -> Result<Option<ClosestPoint>, GeometryError> {
        self.closest_point_with(&SampledEllipse, query)
    }

    pub fn closest_point_with(
        &self,
        strategy: &dyn EllipseStrategy,
        query: Point2,
    ) -> Result<Option<ClosestPoint>, GeometryError> {
        Ok(strategy.closest_point(&self.shape()?, query))
    }

    pub fn intersect_shape(&self) -> Result<IntersectShape, GeometryError> {
        Ok(IntersectShape::Ellipse(self.shape()?))
    }

    /// 0°、90°、180°、270° 处的象限点。
    pub fn quadrants(&self) -> Result<[Point2; 4], GeometryError> {
        let shape = self.shape()?;
        Ok([0.0, 1.0, 2.0, 3.0].map(|quarter| shape.point_at(quarter * FRAC_PI_2)))
    }

    pub fn within(&self, window: &Extremes, layer_visible: bool) -> Result<bool, GeometryError> {
        if !layer_visible {
            return Ok(false);
        }
        Ok(self.extremes()?.lies_strictly_inside(window))
    }

    pub fn touched(&self, window: &Extremes, layer_visible: bool) -> Result<bool, GeometryError> {
        if !layer_visible {
            return Ok(false);
        }
        Ok(self.intersect_shape()?.touches(window))
    }

    pub fn snaps(
        &self,
        mouse: Point2,
        delta: f64,
        settings: &SnapSettings,
        layer_visible: bool,
    ) -> Result<Vec<SnapPoint>, GeometryError> {
        if !layer_visible {
            return Ok(Vec::new());
        }
        let shape = self.shape()?;

        let mut snaps = Vec::new();
        if settings.centre {
            snaps.push(SnapPoint::new(shape.centre, SnapKind::Centre));
        }
        if settings.quadrant {
            snaps.extend(
                self.quadrants()?
                    .into_iter()
                    .map(|point| SnapPoint::new(point, SnapKind::Quadrant)),
            );
        }
        if settings.nearest {
            snaps.extend(nearest_within(self.closest_point(mouse)?, delta));
        }
        Ok(snaps)
    }
}
