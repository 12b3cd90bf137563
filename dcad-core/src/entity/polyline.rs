use serde::{Deserialize, Serialize};

use super::{EntityData, EntityKind, SnapKind, SnapPoint, SnapSettings, Style, nearest_within};
use crate::errors::{GeometryError, ensure_min_points};
use crate::geometry::{Extremes, Point2};
use crate::intersect::{ClosestPoint, IntersectShape, closest_on_segments, closest_vertex};

/// 多段线：至少两个点，首尾精确相等即视为闭合。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<Point2>,
    pub style: Style,
}

impl Polyline {
    pub fn new(points: impl IntoIterator<Item = Point2>, style: Style) -> Self {
        Self {
            points: points.into_iter().collect(),
            style,
        }
    }

    pub fn from_data(data: EntityData) -> Self {
        let mut style = Style::default();
        style.apply(&data);
        Self {
            points: data.points,
            style,
        }
    }

    #[inline]
    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    pub fn is_closed(&self) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) if self.points.len() > 1 => first.is_same(*last),
            _ => false,
        }
    }

    fn ensure_complete(&self) -> Result<(), GeometryError> {
        ensure_min_points(EntityKind::Polyline, self.points.len())
    }

    pub fn extremes(&self) -> Result<Extremes, GeometryError> {
        self.ensure_complete()?;
        Ok(Extremes::from_points(self.points.iter().copied()).unwrap_or_else(Extremes::empty))
    }

    /// 每段取不截断的垂足；全部线段退化时退回最近顶点。
    pub fn closest_point(&self, query: Point2) -> Result<ClosestPoint, GeometryError> {
        self.ensure_complete()?;
        let closest = closest_on_segments(&self.points, query)
            .or_else(|| closest_vertex(&self.points, query));
        Ok(closest.unwrap_or(ClosestPoint {
            point: query,
            distance: f64::INFINITY,
        }))
    }

    pub fn intersect_shape(&self) -> Result<IntersectShape, GeometryError> {
        self.ensure_complete()?;
        Ok(IntersectShape::Polyline {
            points: self.points.clone(),
        })
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
        self.ensure_complete()?;

        let mut snaps = Vec::new();
        if settings.endpoint {
            snaps.extend(
                self.points
                    .iter()
                    .map(|point| SnapPoint::new(*point, SnapKind::Endpoint)),
            );
        }
        if settings.midpoint {
            snaps.extend(
                self.points
                    .windows(2)
                    .map(|segment| SnapPoint::new(segment[0].mid_point(segment[1]), SnapKind::Midpoint)),
            );
        }
        if settings.nearest {
            snaps.extend(nearest_within(Some(self.closest_point(mouse)?), delta));
        }
        Ok(snaps)
    }
}
