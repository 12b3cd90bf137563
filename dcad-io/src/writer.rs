//! DXF 实体编码：实体 -> 有序的（组码，值）列表 -> 以换行拼接的文本。

use serde::{Deserialize, Serialize};

use dcad_core::{
    entity::{Dimension, Ellipse, Entity, Polyline},
    errors::ensure_min_points,
    geometry::Vector2,
};

use crate::IoError;

/// 一个 DXF 组：组码与其文本值。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPair {
    pub code: i32,
    pub value: String,
}

impl GroupPair {
    pub fn new(code: i32, value: impl Into<String>) -> Self {
        Self {
            code,
            value: value.into(),
        }
    }
}

/// 数值使用最短往返格式，`-0` 归一为 `0`。
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else {
        format!("{value}")
    }
}

/// 组列表拼接为文本，组码与值各占一行，末尾不带换行。
pub fn to_text(pairs: &[GroupPair]) -> String {
    pairs
        .iter()
        .map(|pair| format!("{}\n{}", pair.code, pair.value))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Default)]
pub struct DxfWriter {
    pairs: Vec<GroupPair>,
}

impl DxfWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pair(&mut self, code: i32, value: impl Into<String>) -> &mut Self {
        self.pairs.push(GroupPair::new(code, value));
        self
    }

    pub fn number(&mut self, code: i32, value: f64) -> &mut Self {
        self.pair(code, format_number(value))
    }

    pub fn finish(self) -> Vec<GroupPair> {
        self.pairs
    }
}

/// 单个实体编码为组列表。点数不足时返回几何错误。
pub fn encode_entity(entity: &Entity) -> Result<Vec<GroupPair>, IoError> {
    ensure_min_points(entity.kind(), entity.points().len())?;
    let mut writer = DxfWriter::new();
    match entity {
        Entity::Polyline(polyline) => write_polyline(&mut writer, polyline),
        Entity::Ellipse(ellipse) => write_ellipse(&mut writer, ellipse),
        Entity::Dimension(dimension) => write_dimension(&mut writer, dimension),
    }
    Ok(writer.finish())
}

/// 多个实体依次编码并以换行拼接。
pub fn encode_entities<'a, I>(entities: I) -> Result<String, IoError>
where
    I: IntoIterator<Item = &'a Entity>,
{
    let mut chunks = Vec::new();
    for entity in entities {
        chunks.push(to_text(&encode_entity(entity)?));
    }
    Ok(chunks.join("\n"))
}

/// 以 `SECTION/ENTITIES ... ENDSEC/EOF` 包装的完整文本。
pub fn encode_document<'a, I>(entities: I) -> Result<String, IoError>
where
    I: IntoIterator<Item = &'a Entity>,
{
    let body = encode_entities(entities)?;
    let mut header = DxfWriter::new();
    header.pair(0, "SECTION").pair(2, "ENTITIES");
    let mut footer = DxfWriter::new();
    footer.pair(0, "ENDSEC").pair(0, "EOF");

    let mut parts = vec![to_text(&header.finish())];
    if !body.is_empty() {
        parts.push(body);
    }
    parts.push(to_text(&footer.finish()));
    Ok(parts.join("\n"))
}

fn write_polyline(writer: &mut DxfWriter, polyline: &Polyline) {
    let layer = polyline.style.layer.as_str();
    writer
        .pair(0, "POLYLINE")
        .pair(8, layer)
        .pair(66, "1")
        .pair(10, "0")
        .pair(20, "0")
        .pair(30, "0")
        .number(39, polyline.style.line_width)
        .pair(70, if polyline.is_closed() { "1" } else { "0" });
    for point in polyline.points() {
        writer
            .pair(0, "VERTEX")
            .pair(8, layer)
            .number(10, point.x())
            .number(20, point.y())
            .pair(30, "0");
    }
    writer.pair(0, "SEQEND").pair(8, layer);
}

/// 主轴取两个半轴中较长者，并按椭圆自身的旋转角转到世界坐标。
fn major_axis_and_ratio(ellipse: &Ellipse) -> (Vector2, f64) {
    let rx = ellipse.width() / 2.0;
    let ry = ellipse.height() / 2.0;
    let rotation = ellipse.rotation();
    let (major, minor, angle) = if rx > ry {
        (rx, ry, rotation)
    } else {
        (ry, rx, rotation + std::f64::consts::FRAC_PI_2)
    };
    let ratio = if major > 0.0 { minor / major } else { 1.0 };
    (
        Vector2::new(major * angle.cos(), major * angle.sin()),
        ratio,
    )
}

fn write_ellipse(writer: &mut DxfWriter, ellipse: &Ellipse) {
    let centre = ellipse.points()[0];
    let (major, ratio) = major_axis_and_ratio(ellipse);
    writer
        .pair(0, "ELLIPSE")
        .pair(8, ellipse.style.layer.as_str())
        .number(10, centre.x())
        .number(20, centre.y())
        .pair(30, "0.0")
        .number(11, major.x())
        .number(21, major.y())
        .pair(31, "0.0")
        .number(40, ratio)
        .number(41, 0.0)
        .number(42, std::f64::consts::TAU);
}

fn write_dimension(writer: &mut DxfWriter, dimension: &Dimension) {
    let points = dimension.points();
    let (start, second, extension) = (points[0], points[1], points[2]);
    writer
        .pair(0, "DIMENSION")
        .pair(8, dimension.style.layer.as_str())
        .pair(2, dimension.block_name.as_str())
        .number(10, start.x())
        .number(20, start.y())
        .pair(30, "0.0")
        .number(11, extension.x())
        .number(21, extension.y())
        .pair(31, "0.0")
        .pair(70, dimension.dim_type.to_string())
        .number(13, start.x())
        .number(23, start.y())
        .pair(33, "0.0")
        .number(14, second.x())
        .number(24, second.y())
        .pair(34, "0.0")
        .pair(3, dimension.style_name.as_str());
}
