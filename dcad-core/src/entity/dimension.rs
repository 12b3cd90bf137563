use serde::{Deserialize, Serialize};

use super::{EntityData, EntityKind, SnapKind, SnapPoint, SnapSettings, Style, nearest_within};
use crate::errors::{GeometryError, ensure_min_points};
use crate::geometry::{Extremes, Point2};
use crate::intersect::{ClosestPoint, IntersectShape, closest_on_segments};

/// 标注文字默认字高。
pub const DEFAULT_TEXT_HEIGHT: f64 = 2.5;

/// DXF 组码 70 的基础类型：
/// 64 < t < 128 归为坐标标注 6；t > 128 时去掉“用户定位文字”位。
pub fn base_dim_type(dim_type: i32) -> i32 {
    if dim_type > 64 && dim_type < 128 {
        6
    } else if dim_type > 128 {
        dim_type - 128
    } else {
        dim_type
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DimensionKind {
    /// 旋转、水平或垂直线性标注。
    Linear,
    Aligned,
    Angular,
    Diameter,
    Radius,
    Angular3Point,
    Ordinate,
    Unknown(i32),
}

impl DimensionKind {
    pub fn from_base(base: i32) -> Self {
        match base {
            0 => DimensionKind::Linear,
            1 => DimensionKind::Aligned,
            2 => DimensionKind::Angular,
            3 => DimensionKind::Diameter,
            4 => DimensionKind::Radius,
            5 => DimensionKind::Angular3Point,
            6 => DimensionKind::Ordinate,
            other => DimensionKind::Unknown(other),
        }
    }
}

/// 由三个输入点推导出的尺寸线几何。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtensionPoints {
    pub start: Point2,
    pub end: Point2,
    pub text_point: Point2,
    /// 带符号的测量值；轴对齐回退分支下为 dx 或 dy。
    pub measurement: f64,
    /// 尺寸线方向角（弧度）。
    pub angle: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLabel {
    pub anchor: Point2,
    pub content: String,
    pub rotation_degrees: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Drawable {
    Line { start: Point2, end: Point2 },
    Text(TextLabel),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// 两位小数、取绝对值，再以最短形式输出（`10`、`10.5`）。
///
/// 按数值的精确十进制展开舍入；恰好落在第三位 5 上的值向远离零方向进位。
/// 这样的值必然是 1/8 的整数倍，乘以 8、1000 都不引入误差。
fn format_measurement(measurement: f64) -> String {
    let value = measurement.abs();
    let exact_tie = (value * 8.0).fract() == 0.0 && (value * 1000.0) % 10.0 == 5.0;
    let rounded = if exact_tie {
        (value * 100.0).round() / 100.0
    } else {
        format!("{value:.2}").parse::<f64>().unwrap_or(value)
    };
    format!("{}", rounded + 0.0)
}

/// 尺寸标注。子几何（尺寸界线、尺寸线、文字）每次按需由输入点推导，不做缓存。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    points: Vec<Point2>,
    pub dim_type: i32,
    pub block_name: String,
    pub leader_length: f64,
    pub angle: f64,
    pub style_name: String,
    pub style: Style,
}

impl Dimension {
    pub fn new(start: Point2, second: Point2, extension: Point2, style: Style) -> Self {
        Self {
            points: vec![start, second, extension],
            dim_type: 0,
            block_name: String::new(),
            leader_length: 0.0,
            angle: 0.0,
            style_name: "STANDARD".to_string(),
            style,
        }
    }

    pub fn from_data(data: EntityData) -> Self {
        let mut style = Style::default();
        style.apply(&data);
        Self {
            points: data.points,
            dim_type: data.dim_type.unwrap_or(0),
            block_name: data.block_name.unwrap_or_default(),
            leader_length: data.leader_length.unwrap_or(0.0),
            angle: data.angle.unwrap_or(0.0),
            style_name: data.style_name.unwrap_or_else(|| "STANDARD".to_string()),
            style,
        }
    }

    #[inline]
    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    #[inline]
    pub fn base_type(&self) -> i32 {
        base_dim_type(self.dim_type)
    }

    #[inline]
    pub fn kind(&self) -> DimensionKind {
        DimensionKind::from_base(self.base_type())
    }

    fn ensure_complete(&self) -> Result<(), GeometryError> {
        ensure_min_points(EntityKind::Dimension, self.points.len())
    }

    /// 前两个点之间的距离。
    pub fn length(&self) -> Result<f64, GeometryError> {
        self.ensure_complete()?;
        Ok(self.points[0].distance(self.points[1]))
    }

    /// 任意两点重合、或点数不足时返回 `None`。
    pub fn extension_points(&self) -> Option<ExtensionPoints> {
        let [p1, p2, p3] = match self.points.as_slice() {
            [p1, p2, p3, ..] => [*p1, *p2, *p3],
            _ => return None,
        };
        if p1.is_same(p2) || p1.is_same(p3) || p2.is_same(p3) {
            return None;
        }

        let (start, end, measurement) = match p3.perpendicular(p1, p2) {
            Some(foot) => {
                let angle = foot.angle_to(p3);
                let offset = p3.distance(foot);
                (
                    p1.project(angle, offset),
                    p2.project(angle, offset),
                    p1.distance(p2),
                )
            }
            None => axis_aligned_extension(p1, p2, p3)?,
        };

        Some(ExtensionPoints {
            start,
            end,
            text_point: start.mid_point(end),
            measurement,
            angle: start.angle_to(end),
        })
    }

    pub fn text_label(&self) -> Option<TextLabel> {
        let extension = self.extension_points()?;
        Some(TextLabel {
            anchor: extension.text_point,
            content: format_measurement(extension.measurement),
            rotation_degrees: extension.angle.to_degrees(),
            height: DEFAULT_TEXT_HEIGHT,
        })
    }

    /// 只有基础类型 0 会生成两条尺寸界线、一条尺寸线和文字，其它类型为空。
    pub fn drawables(&self) -> Vec<Drawable> {
        if self.base_type() != 0 {
            return Vec::new();
        }
        let Some(extension) = self.extension_points() else {
            return Vec::new();
        };
        let mut drawables = vec![
            Drawable::Line {
                start: self.points[0],
                end: extension.start,
            },
            Drawable::Line {
                start: self.points[1],
                end: extension.end,
            },
            Drawable::Line {
                start: extension.start,
                end: extension.end,
            },
        ];
        if let Some(label) = self.text_label() {
            drawables.push(Drawable::Text(label));
        }
        drawables
    }

    fn lines(&self) -> Vec<[Point2; 2]> {
        self.drawables()
            .into_iter()
            .filter_map(|drawable| match drawable {
                Drawable::Line { start, end } => Some([start, end]),
                Drawable::Text(_) => None,
            })
            .collect()
    }

    pub fn extremes(&self) -> Result<Option<Extremes>, GeometryError> {
        self.ensure_complete()?;
        let points = self
            .drawables()
            .into_iter()
            .flat_map(|drawable| match drawable {
                Drawable::Line { start, end } => vec![start, end],
                Drawable::Text(label) => vec![label.anchor],
            });
        Ok(Extremes::from_points(points))
    }

    pub fn bounding_rect(&self) -> Result<Option<BoundingRect>, GeometryError> {
        self.ensure_complete()?;
        let Some(extension) = self.extension_points() else {
            return Ok(None);
        };
        let extremes = Extremes::from_points([
            self.points[0],
            self.points[1],
            extension.start,
            extension.end,
        ]);
        Ok(extremes.map(|extremes| BoundingRect {
            x: extremes.xmin,
            y: extremes.ymin,
            width: extremes.width(),
            height: extremes.height(),
        }))
    }

    pub fn closest_point(&self, query: Point2) -> Result<Option<ClosestPoint>, GeometryError> {
        self.ensure_complete()?;
        let mut best: Option<ClosestPoint> = None;
        for line in self.lines() {
            if let Some(candidate) = closest_on_segments(&line, query) {
                if best.is_none_or(|current| candidate.distance <= current.distance) {
                    best = Some(candidate);
                }
            }
        }
        Ok(best)
    }

    pub fn intersect_shape(&self) -> Result<Option<IntersectShape>, GeometryError> {
        self.ensure_complete()?;
        let parts: Vec<_> = self
            .lines()
            .into_iter()
            .map(|line| IntersectShape::Polyline {
                points: line.to_vec(),
            })
            .collect();
        if parts.is_empty() {
            Ok(None)
        } else {
            Ok(Some(IntersectShape::Composite(parts)))
        }
    }

    pub fn within(&self, window: &Extremes, layer_visible: bool) -> Result<bool, GeometryError> {
        if !layer_visible {
            return Ok(false);
        }
        Ok(self
            .extremes()?
            .is_some_and(|extremes| extremes.lies_strictly_inside(window)))
    }

    pub fn touched(&self, window: &Extremes, layer_visible: bool) -> Result<bool, GeometryError> {
        if !layer_visible {
            return Ok(false);
        }
        Ok(self
            .intersect_shape()?
            .is_some_and(|shape| shape.touches(window)))
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
        self.ensure_complete()?;
        let Some(extension) = self.extension_points() else {
            return Ok(Vec::new());
        };

        let mut snaps = Vec::new();
        if settings.endpoint {
            snaps.extend(
                [extension.start, extension.end, self.points[0], self.points[1]]
                    .into_iter()
                    .map(|point| SnapPoint::new(point, SnapKind::Endpoint)),
            );
        }
        if settings.midpoint {
            snaps.push(SnapPoint::new(extension.text_point, SnapKind::Midpoint));
        }
        if settings.nearest {
            snaps.extend(nearest_within(self.closest_point(mouse)?, delta));
        }
        Ok(snaps)
    }
}

/// 垂足不存在时的轴对齐回退：比较 p3 在两个方向上的“越界量”。
fn axis_aligned_extension(p1: Point2, p2: Point2, p3: Point2) -> Option<(Point2, Point2, f64)> {
    let dx = p2.x() - p1.x();
    let dy = p2.y() - p1.y();
    let slack_x = (p3.x() - p1.x()).abs() + (p2.x() - p3.x()).abs() - dx.abs();
    let slack_y = (p3.y() - p1.y()).abs() + (p2.y() - p3.y()).abs() - dy.abs();

    if slack_x > slack_y && dy != 0.0 {
        Some((
            Point2::new(p3.x(), p1.y()),
            Point2::new(p3.x(), p2.y()),
            dy,
        ))
    } else if slack_x < slack_y && dx != 0.0 {
        Some((
            Point2::new(p1.x(), p3.y()),
            Point2::new(p2.x(), p3.y()),
            dx,
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Point2, expected: Point2) {
        assert!(
            actual.distance(expected) < 1e-9,
            "expected {expected:?}, got {actual:?}"
        );
    }

    fn horizontal() -> Dimension {
        Dimension::new(
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(5.0, 5.0),
            Style::default(),
        )
    }

    #[test]
    fn extension_points_offset_towards_third_point() {
        let extension = horizontal().extension_points().expect("points are distinct");
        assert_close(extension.start, Point2::new(0.0, 5.0));
        assert_close(extension.end, Point2::new(10.0, 5.0));
        assert_close(extension.text_point, Point2::new(5.0, 5.0));
        assert!((extension.measurement - 10.0).abs() < 1e-12);
        assert!(extension.angle.abs() < 1e-12);
    }

    #[test]
    fn coincident_points_yield_no_geometry() {
        let dimension = Dimension::new(
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(5.0, 5.0),
            Style::default(),
        );
        assert!(dimension.extension_points().is_none());
        assert!(dimension.drawables().is_empty());
        assert_eq!(dimension.extremes().unwrap(), None);
        assert_eq!(dimension.bounding_rect().unwrap(), None);
        assert_eq!(dimension.closest_point(Point2::new(0.0, 0.0)).unwrap(), None);
        let window = Extremes::new(-100.0, 100.0, -100.0, 100.0);
        assert!(!dimension.within(&window, true).unwrap());
        assert!(!dimension.touched(&window, true).unwrap());
        let snaps = dimension
            .snaps(Point2::new(1.0, 1.0), 10.0, &SnapSettings::default(), true)
            .unwrap();
        assert!(snaps.is_empty());
    }

    #[test]
    fn label_uses_two_decimal_absolute_value() {
        let label = horizontal().text_label().unwrap();
        assert_eq!(label.content, "10");
        assert_eq!(label.height, DEFAULT_TEXT_HEIGHT);
        assert!(label.rotation_degrees.abs() < 1e-9);

        assert_eq!(format_measurement(10.5), "10.5");
        assert_eq!(format_measurement(3.14159), "3.14");
        assert_eq!(format_measurement(-7.0), "7");
        assert_eq!(format_measurement(-0.001), "0");
    }

    #[test]
    fn label_rounds_exact_ties_away_from_zero() {
        assert_eq!(format_measurement(0.125), "0.13");
        assert_eq!(format_measurement(10.125), "10.13");
        assert_eq!(format_measurement(-0.375), "0.38");
        assert_eq!(format_measurement(2.5), "2.5");
        // 1.005 与 2.675 的二进制值略小于字面值，不是真正的平局。
        assert_eq!(format_measurement(1.005), "1");
        assert_eq!(format_measurement(2.675), "2.67");
    }

    #[test]
    fn vertical_dimension_rotates_label() {
        let dimension = Dimension::new(
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 8.0),
            Point2::new(-3.0, 4.0),
            Style::default(),
        );
        let label = dimension.text_label().unwrap();
        assert_eq!(label.content, "8");
        assert!((label.rotation_degrees - 90.0).abs() < 1e-9);
        assert_close(label.anchor, Point2::new(-3.0, 4.0));
    }

    #[test]
    fn axis_fallback_picks_direction_by_slack() {
        let (start, end, measurement) = axis_aligned_extension(
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 3.0),
            Point2::new(10.0, 1.0),
        )
        .expect("x slack dominates");
        assert_eq!(start, Point2::new(10.0, 0.0));
        assert_eq!(end, Point2::new(10.0, 3.0));
        assert_eq!(measurement, 3.0);

        let (start, end, measurement) = axis_aligned_extension(
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 3.0),
            Point2::new(2.0, 9.0),
        )
        .expect("y slack dominates");
        assert_eq!(start, Point2::new(0.0, 9.0));
        assert_eq!(end, Point2::new(4.0, 9.0));
        assert_eq!(measurement, 4.0);

        assert!(
            axis_aligned_extension(
                Point2::new(0.0, 0.0),
                Point2::new(4.0, 4.0),
                Point2::new(2.0, 2.0),
            )
            .is_none()
        );
    }

    #[test]
    fn only_base_type_zero_draws() {
        let drawables = horizontal().drawables();
        assert_eq!(drawables.len(), 4);
        let lines = drawables
            .iter()
            .filter(|drawable| matches!(drawable, Drawable::Line { .. }))
            .count();
        assert_eq!(lines, 3);

        let mut aligned = horizontal();
        aligned.dim_type = 1;
        assert_eq!(aligned.kind(), DimensionKind::Aligned);
        assert!(aligned.drawables().is_empty());
        assert_eq!(aligned.extremes().unwrap(), None);
        assert!(aligned.extension_points().is_some());
    }

    #[test]
    fn base_type_decoding() {
        assert_eq!(base_dim_type(0), 0);
        assert_eq!(base_dim_type(1), 1);
        assert_eq!(base_dim_type(64), 64);
        assert_eq!(base_dim_type(70), 6);
        assert_eq!(base_dim_type(128), 128);
        assert_eq!(base_dim_type(129), 1);
        assert_eq!(base_dim_type(160), 32);
        assert_eq!(DimensionKind::from_base(base_dim_type(133)), DimensionKind::Angular3Point);
        assert_eq!(DimensionKind::from_base(9), DimensionKind::Unknown(9));
    }

    #[test]
    fn queries_follow_derived_lines() {
        let dimension = horizontal();
        let extremes = dimension.extremes().unwrap().unwrap();
        assert!(extremes.xmin.abs() < 1e-9);
        assert!((extremes.xmax - 10.0).abs() < 1e-9);
        assert!(extremes.ymin.abs() < 1e-9);
        assert!((extremes.ymax - 5.0).abs() < 1e-9);

        let rect = dimension.bounding_rect().unwrap().unwrap();
        assert!((rect.width - 10.0).abs() < 1e-9);
        assert!((rect.height - 5.0).abs() < 1e-9);
        assert!((dimension.length().unwrap() - 10.0).abs() < 1e-12);

        let closest = dimension
            .closest_point(Point2::new(5.0, 6.0))
            .unwrap()
            .unwrap();
        assert_close(closest.point, Point2::new(5.0, 5.0));

        assert!(
            dimension
                .touched(&Extremes::new(4.0, 6.0, 4.0, 6.0), true)
                .unwrap()
        );
        assert!(
            !dimension
                .touched(&Extremes::new(3.0, 7.0, 1.0, 3.0), true)
                .unwrap()
        );
    }

    #[test]
    fn snaps_cover_extension_and_picked_points() {
        let settings = SnapSettings {
            nearest: false,
            ..SnapSettings::default()
        };
        let snaps = horizontal()
            .snaps(Point2::new(50.0, 50.0), 10.0, &settings, true)
            .unwrap();
        let endpoints = snaps.iter().filter(|s| s.kind == SnapKind::Endpoint).count();
        assert_eq!(endpoints, 4);
        let midpoint = snaps
            .iter()
            .find(|s| s.kind == SnapKind::Midpoint)
            .expect("text anchor snap");
        assert_close(midpoint.point, Point2::new(5.0, 5.0));
    }

    #[test]
    fn from_data_keeps_dxf_attributes() {
        let mut data = EntityData::with_points([
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(5.0, 5.0),
        ])
        .layer("DIM");
        data.dim_type = Some(160);
        data.block_name = Some("*D1".to_string());
        let dimension = Dimension::from_data(data);
        assert_eq!(dimension.style.layer, "DIM");
        assert_eq!(dimension.block_name, "*D1");
        assert_eq!(dimension.style_name, "STANDARD");
        assert_eq!(dimension.base_type(), 32);
    }
}
