//! 实体模型：多段线、椭圆、尺寸标注，以及它们共享的查询契约。

mod dimension;
mod ellipse;
mod polyline;

pub use dimension::{
    BoundingRect, DEFAULT_TEXT_HEIGHT, Dimension, DimensionKind, Drawable, ExtensionPoints,
    TextLabel, base_dim_type,
};
pub use ellipse::{
    AnalyticEllipse, CLOSEST_POINT_THRESHOLD, ELLIPSE_SAMPLES, Ellipse, EllipseStrategy,
    SampledEllipse,
};
pub use polyline::Polyline;

use serde::{Deserialize, Serialize};

use crate::errors::GeometryError;
use crate::geometry::{Extremes, Point2};
use crate::intersect::{ClosestPoint, IntersectShape};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Polyline,
    Ellipse,
    Dimension,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Polyline,
        EntityKind::Ellipse,
        EntityKind::Dimension,
    ];

    /// 构造完成所需的最少点数。
    #[inline]
    pub fn min_points(self) -> usize {
        match self {
            EntityKind::Polyline => 2,
            EntityKind::Ellipse => 3,
            EntityKind::Dimension => 3,
        }
    }

    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Polyline => "Polyline",
            EntityKind::Ellipse => "Ellipse",
            EntityKind::Dimension => "Dimension",
        }
    }
}

/// 样式属性，构造后允许直接修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub line_width: f64,
    pub colour: String,
    pub layer: String,
    pub alpha: f64,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            line_width: 2.0,
            colour: "BYLAYER".to_string(),
            layer: "0".to_string(),
            alpha: 1.0,
        }
    }
}

impl Style {
    pub fn on_layer(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            ..Self::default()
        }
    }

    fn apply(&mut self, data: &EntityData) {
        if let Some(colour) = &data.colour {
            self.colour = colour.clone();
        }
        if let Some(layer) = &data.layer {
            self.layer = layer.clone();
        }
    }
}

/// 实体构造数据。缺失字段取默认值，点集可以为空。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityData {
    pub points: Vec<Point2>,
    pub colour: Option<String>,
    pub layer: Option<String>,
    pub dim_type: Option<i32>,
    pub block_name: Option<String>,
    pub leader_length: Option<f64>,
    pub angle: Option<f64>,
    pub style_name: Option<String>,
}

impl EntityData {
    pub fn with_points(points: impl IntoIterator<Item = Point2>) -> Self {
        Self {
            points: points.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    pub fn colour(mut self, colour: impl Into<String>) -> Self {
        self.colour = Some(colour.into());
        self
    }
}

/// 图层可见性查询，由场景的图层表实现。
pub trait LayerVisibility {
    fn layer_visible(&self, name: &str) -> bool;
}

impl<F> LayerVisibility for F
where
    F: Fn(&str) -> bool,
{
    fn layer_visible(&self, name: &str) -> bool {
        self(name)
    }
}

/// 各类捕捉开关。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapSettings {
    pub endpoint: bool,
    pub midpoint: bool,
    pub centre: bool,
    pub quadrant: bool,
    pub nearest: bool,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self {
            endpoint: true,
            midpoint: true,
            centre: true,
            quadrant: true,
            nearest: true,
        }
    }
}

impl SnapSettings {
    pub fn none() -> Self {
        Self {
            endpoint: false,
            midpoint: false,
            centre: false,
            quadrant: false,
            nearest: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapKind {
    Endpoint,
    Midpoint,
    Centre,
    Quadrant,
    Nearest,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapPoint {
    pub point: Point2,
    pub kind: SnapKind,
}

impl SnapPoint {
    #[inline]
    pub fn new(point: Point2, kind: SnapKind) -> Self {
        Self { point, kind }
    }
}

/// 最近点捕捉的判定：距离小于 `delta / 10` 才生效。
pub(crate) fn nearest_within(closest: Option<ClosestPoint>, delta: f64) -> Option<SnapPoint> {
    closest
        .filter(|closest| closest.distance < delta / 10.0)
        .map(|closest| SnapPoint::new(closest.point, SnapKind::Nearest))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entity {
    Polyline(Polyline),
    Ellipse(Ellipse),
    Dimension(Dimension),
}

impl Entity {
    pub fn from_data(kind: EntityKind, data: EntityData) -> Self {
        match kind {
            EntityKind::Polyline => Entity::Polyline(Polyline::from_data(data)),
            EntityKind::Ellipse => Entity::Ellipse(Ellipse::from_data(data)),
            EntityKind::Dimension => Entity::Dimension(Dimension::from_data(data)),
        }
    }

    #[inline]
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Polyline(_) => EntityKind::Polyline,
            Entity::Ellipse(_) => EntityKind::Ellipse,
            Entity::Dimension(_) => EntityKind::Dimension,
        }
    }

    #[inline]
    pub fn style(&self) -> &Style {
        match self {
            Entity::Polyline(polyline) => &polyline.style,
            Entity::Ellipse(ellipse) => &ellipse.style,
            Entity::Dimension(dimension) => &dimension.style,
        }
    }

    #[inline]
    pub fn style_mut(&mut self) -> &mut Style {
        match self {
            Entity::Polyline(polyline) => &mut polyline.style,
            Entity::Ellipse(ellipse) => &mut ellipse.style,
            Entity::Dimension(dimension) => &mut dimension.style,
        }
    }

    #[inline]
    pub fn layer_name(&self) -> &str {
        &self.style().layer
    }

    #[inline]
    pub fn points(&self) -> &[Point2] {
        match self {
            Entity::Polyline(polyline) => polyline.points(),
            Entity::Ellipse(ellipse) => ellipse.points(),
            Entity::Dimension(dimension) => dimension.points(),
        }
    }

    /// 轴对齐范围。退化的尺寸标注返回 `Ok(None)`。
    pub fn extremes(&self) -> Result<Option<Extremes>, GeometryError> {
        match self {
            Entity::Polyline(polyline) => polyline.extremes().map(Some),
            Entity::Ellipse(ellipse) => ellipse.extremes().map(Some),
            Entity::Dimension(dimension) => dimension.extremes(),
        }
    }

    pub fn closest_point(&self, query: Point2) -> Result<Option<ClosestPoint>, GeometryError> {
        match self {
            Entity::Polyline(polyline) => polyline.closest_point(query).map(Some),
            Entity::Ellipse(ellipse) => ellipse.closest_point(query),
            Entity::Dimension(dimension) => dimension.closest_point(query),
        }
    }

    pub fn intersect_shape(&self) -> Result<Option<IntersectShape>, GeometryError> {
        match self {
            Entity::Polyline(polyline) => polyline.intersect_shape().map(Some),
            Entity::Ellipse(ellipse) => ellipse.intersect_shape().map(Some),
            Entity::Dimension(dimension) => dimension.intersect_shape(),
        }
    }

    pub fn within(&self, window: &Extremes, layer_visible: bool) -> Result<bool, GeometryError> {
        match self {
            Entity::Polyline(polyline) => polyline.within(window, layer_visible),
            Entity::Ellipse(ellipse) => ellipse.within(window, layer_visible),
            Entity::Dimension(dimension) => dimension.within(window, layer_visible),
        }
    }

    pub fn touched(&self, window: &Extremes, layer_visible: bool) -> Result<bool, GeometryError> {
        match self {
            Entity::Polyline(polyline) => polyline.touched(window, layer_visible),
            Entity::Ellipse(ellipse) => ellipse.touched(window, layer_visible),
            Entity::Dimension(dimension) => dimension.touched(window, layer_visible),
        }
    }

    pub fn snaps(
        &self,
        mouse: Point2,
        delta: f64,
        settings: &SnapSettings,
        layer_visible: bool,
    ) -> Result<Vec<SnapPoint>, GeometryError> {
        match self {
            Entity::Polyline(polyline) => polyline.snaps(mouse, delta, settings, layer_visible),
            Entity::Ellipse(ellipse) => ellipse.snaps(mouse, delta, settings, layer_visible),
            Entity::Dimension(dimension) => dimension.snaps(mouse, delta, settings, layer_visible),
        }
    }

    /// 以图层表判断可见性后再做框选测试。
    pub fn is_visible_in(&self, layers: &dyn LayerVisibility) -> bool {
        layers.layer_visible(self.layer_name())
    }
}

impl From<Polyline> for Entity {
    fn from(value: Polyline) -> Self {
        Entity::Polyline(value)
    }
}

impl From<Ellipse> for Entity {
    fn from(value: Ellipse) -> Self {
        Entity::Ellipse(value)
    }
}

impl From<Dimension> for Entity {
    fn from(value: Dimension) -> Self {
        Entity::Dimension(value)
    }
}
