use std::fs;
use std::iter::Peekable;
use std::path::Path;
use std::vec;

use thiserror::Error;

use dcad_core::{
    entity::{Dimension, Ellipse, Entity, EntityData, Polyline, Style},
    errors::GeometryError,
    geometry::{Point2, Vector2},
};

mod writer;

pub use writer::{
    DxfWriter, GroupPair, encode_document, encode_entities, encode_entity, format_number, to_text,
};

#[derive(Debug, Error)]
pub enum IoError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Vec<Entity>, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, entities: &[Entity], path: &Path) -> Result<(), IoError>;
}

/// 单个实体到 DXF 组列表的编码器。
pub trait EntityEncoder {
    fn encode(&self, entity: &Entity) -> Result<Vec<GroupPair>, IoError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DxfFacade;

impl DxfFacade {
    pub fn new() -> Self {
        Self
    }

    /// 解析 DXF 文本。既接受带 `SECTION/ENTITIES` 框架的文档，
    /// 也接受编码器直接输出的裸实体记录流。
    pub fn parse_str(&self, source: &str) -> Result<Vec<Entity>, IoError> {
        DxfParser::new(source)
            .and_then(DxfParser::parse)
            .map_err(|DxfError { message }| IoError::InvalidDocument(message))
    }
}

impl DocumentLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Vec<Entity>, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_str(&data)
    }
}

impl DocumentSaver for DxfFacade {
    fn save(&self, entities: &[Entity], path: &Path) -> Result<(), IoError> {
        let text = encode_document(entities)?;
        fs::write(path, text).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl EntityEncoder for DxfFacade {
    fn encode(&self, entity: &Entity) -> Result<Vec<GroupPair>, IoError> {
        encode_entity(entity)
    }
}

#[derive(Debug)]
struct DxfError {
    message: String,
}

impl DxfError {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

struct DxfParser {
    stream: GroupStream,
}

impl DxfParser {
    fn new(source: &str) -> Result<Self, DxfError> {
        Ok(Self {
            stream: GroupStream::tokenize(source)?,
        })
    }

    fn parse(mut self) -> Result<Vec<Entity>, DxfError> {
        let mut entities = Vec::new();
        while let Some(group) = self.stream.next_group() {
            if group.code != 0 {
                return Err(DxfError::invalid(format!(
                    "意外的组码 {}（期望 0 表示 SECTION、实体或 EOF）",
                    group.code
                )));
            }
            match group.value.as_str() {
                "SECTION" => {
                    let name = self
                        .stream
                        .next_group()
                        .ok_or_else(|| DxfError::invalid("SECTION 缺少名称（组码 2）"))?;
                    if name.code != 2 {
                        return Err(DxfError::invalid(format!(
                            "SECTION 名称使用了组码 {}（期望 2）",
                            name.code
                        )));
                    }
                    match name.value.as_str() {
                        "ENTITIES" => self.parse_entities(&mut entities)?,
                        _ => self.skip_section()?,
                    }
                }
                "EOF" => break,
                kind => {
                    if let Some(parsed) = self.parse_entity(kind)? {
                        entities.push(parsed);
                    }
                }
            }
        }
        Ok(entities)
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        while let Some(group) = self.stream.next_group() {
            if group.code == 0 && group.value == "ENDSEC" {
                return Ok(());
            }
        }
        Err(DxfError::invalid("SECTION 未找到 ENDSEC 终止标记"))
    }

    fn parse_entities(&mut self, entities: &mut Vec<Entity>) -> Result<(), DxfError> {
        loop {
            let group = self
                .stream
                .next_group()
                .ok_or_else(|| DxfError::invalid("ENTITIES 段提前结束"))?;
            if group.code != 0 {
                return Err(DxfError::invalid(format!(
                    "ENTITIES 段遇到组码 {}（期望 0 表示实体起始）",
                    group.code
                )));
            }
            match group.value.as_str() {
                "ENDSEC" => return Ok(()),
                kind => {
                    if let Some(parsed) = self.parse_entity(kind)? {
                        entities.push(parsed);
                    }
                }
            }
        }
    }

    /// 不认识的实体类型整体跳过，返回 `None`。
    fn parse_entity(&mut self, kind: &str) -> Result<Option<Entity>, DxfError> {
        match kind {
            "POLYLINE" => self.parse_polyline().map(Some),
            "ELLIPSE" => self.parse_ellipse().map(Some),
            "DIMENSION" => self.parse_dimension().map(Some),
            _ => {
                self.stream.skip_fields();
                Ok(None)
            }
        }
    }

    fn parse_polyline(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut line_width = None;
        let mut flags = 0;
        while let Some(group) = self.stream.next_field() {
            match group.code {
                8 => layer = Some(group.value.trim().to_string()),
                39 => line_width = Some(group.real("POLYLINE")?),
                70 => flags = group.integer("POLYLINE")?,
                // 66 顶点跟随标记与 10/20/30 占位基点不携带信息。
                _ => {}
            }
        }

        let mut points = Vec::new();
        loop {
            let group = self
                .stream
                .next_group()
                .ok_or_else(|| DxfError::invalid("POLYLINE 缺少 SEQEND"))?;
            match (group.code, group.value.as_str()) {
                (0, "VERTEX") => points.push(self.parse_vertex(points.len())?),
                (0, "SEQEND") => {
                    self.stream.skip_fields();
                    break;
                }
                (code, value) => {
                    return Err(DxfError::invalid(format!(
                        "POLYLINE 顶点序列中出现意外的组 {code}/{value}（期望 VERTEX 或 SEQEND）"
                    )));
                }
            }
        }

        if points.len() < 2 {
            return Err(DxfError::invalid(format!(
                "POLYLINE 至少需要 2 个顶点，实际为 {}",
                points.len()
            )));
        }
        // 闭合标志对应首尾重合的点序列。
        if flags & 1 != 0 && !points[0].is_same(points[points.len() - 1]) {
            points.push(points[0]);
        }

        let mut style = Style::on_layer(layer.unwrap_or_else(|| "0".to_string()));
        if let Some(line_width) = line_width {
            style.line_width = line_width;
        }
        Ok(Entity::Polyline(Polyline::new(points, style)))
    }

    fn parse_vertex(&mut self, index: usize) -> Result<Point2, DxfError> {
        let context = format!("VERTEX {index}");
        let mut location = PointField::default();
        while let Some(group) = self.stream.next_field() {
            if matches!(group.code, 10 | 20) {
                location.take(&group, &context)?;
            }
        }
        location
            .point()
            .ok_or_else(|| DxfError::invalid(format!("{context} 缺少完整的 XY 坐标")))
    }

    fn parse_ellipse(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut centre = PointField::default();
        let mut major = PointField::default();
        let mut ratio = None;

        while let Some(group) = self.stream.next_field() {
            match group.code {
                8 => layer = Some(group.value.trim().to_string()),
                10 | 20 => centre.take(&group, "ELLIPSE")?,
                11 | 21 => major.take(&group, "ELLIPSE")?,
                40 => ratio = Some(group.real("ELLIPSE")?),
                // Z 分量恒为 0；只支持完整椭圆，41/42 起止参数忽略。
                _ => {}
            }
        }

        let centre = centre
            .point()
            .ok_or_else(|| DxfError::invalid("ELLIPSE 缺少圆心（组码 10/20）"))?;
        let major = major
            .point()
            .ok_or_else(|| DxfError::invalid("ELLIPSE 缺少主轴向量（组码 11/21）"))?;
        let ratio = ratio.unwrap_or(1.0);
        if ratio < 0.0 {
            return Err(DxfError::invalid(format!(
                "ELLIPSE 半径比不能为负数，实际为 {ratio}"
            )));
        }

        let style = Style::on_layer(layer.unwrap_or_else(|| "0".to_string()));
        Ok(Entity::Ellipse(Ellipse::from_axes(
            centre,
            Vector2::new(major.x(), major.y()),
            ratio,
            style,
        )))
    }

    fn parse_dimension(&mut self) -> Result<Entity, DxfError> {
        let mut data = EntityData::default();
        let mut definition = PointField::default();
        let mut text_mid = PointField::default();
        let mut first = PointField::default();
        let mut second = PointField::default();

        while let Some(group) = self.stream.next_field() {
            match group.code {
                8 => data.layer = Some(group.value.trim().to_string()),
                2 => data.block_name = Some(group.value.trim().to_string()),
                3 => data.style_name = Some(group.value.trim().to_string()),
                10 | 20 => definition.take(&group, "DIMENSION")?,
                11 | 21 => text_mid.take(&group, "DIMENSION")?,
                13 | 23 => first.take(&group, "DIMENSION")?,
                14 | 24 => second.take(&group, "DIMENSION")?,
                40 => data.leader_length = Some(group.real("DIMENSION")?),
                50 => data.angle = Some(group.real("DIMENSION")?),
                70 => data.dim_type = Some(group.integer("DIMENSION")?),
                _ => {}
            }
        }

        // 旧文件可能只写定义点 10/20 作为起点。
        let start = first.point().or_else(|| definition.point()).ok_or_else(|| {
            DxfError::invalid("DIMENSION 缺少起点（组码 13/23 或 10/20）")
        })?;
        let second = second
            .point()
            .ok_or_else(|| DxfError::invalid("DIMENSION 缺少第二点（组码 14/24）"))?;
        let extension = text_mid
            .point()
            .ok_or_else(|| DxfError::invalid("DIMENSION 缺少文字中点（组码 11/21）"))?;

        data.points = vec![start, second, extension];
        Ok(Entity::Dimension(Dimension::from_data(data)))
    }
}

/// 预先切分好的组序列。
///
/// 文本按 `'\n'` 切分，保留末尾的空值行：编码器可能以空字符串结束一条记录
/// （例如空的标注样式名）。组码行之间的空行被跳过。
struct GroupStream {
    groups: Peekable<vec::IntoIter<GroupPair>>,
}

impl GroupStream {
    fn tokenize(source: &str) -> Result<Self, DxfError> {
        let mut lines = source
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .enumerate();
        let mut groups = Vec::new();
        while let Some((index, code_line)) = lines.next() {
            let code_line = code_line.trim();
            if code_line.is_empty() {
                continue;
            }
            let code = code_line.parse::<i32>().map_err(|_| {
                DxfError::invalid(format!(
                    "第 {} 行的组码 \"{code_line}\" 无法解析为整数",
                    index + 1
                ))
            })?;
            let (_, value) = lines.next().ok_or_else(|| {
                DxfError::invalid(format!(
                    "第 {} 行的组码 {code} 之后缺少值行",
                    index + 1
                ))
            })?;
            groups.push(GroupPair::new(code, value));
        }
        Ok(Self {
            groups: groups.into_iter().peekable(),
        })
    }

    fn next_group(&mut self) -> Option<GroupPair> {
        self.groups.next()
    }

    /// 当前实体的下一个属性组；遇到下一条 0 组记录或文本结束时返回 `None`。
    fn next_field(&mut self) -> Option<GroupPair> {
        self.groups.next_if(|group| group.code != 0)
    }

    fn skip_fields(&mut self) {
        while self.next_field().is_some() {}
    }
}

impl GroupPair {
    fn real(&self, entity: &str) -> Result<f64, DxfError> {
        self.value.trim().parse::<f64>().map_err(|_| {
            DxfError::invalid(format!(
                "{entity} 组码 {} 的值 \"{}\" 不是有效数字",
                self.code, self.value
            ))
        })
    }

    fn integer(&self, entity: &str) -> Result<i32, DxfError> {
        self.value.trim().parse::<i32>().map_err(|_| {
            DxfError::invalid(format!(
                "{entity} 组码 {} 的值 \"{}\" 不是有效整数",
                self.code, self.value
            ))
        })
    }
}

/// 一对 X/Y 坐标组（1x/2x）。同一坐标出现两次视为文件损坏。
#[derive(Debug, Default)]
struct PointField {
    x: Option<f64>,
    y: Option<f64>,
}

impl PointField {
    fn take(&mut self, group: &GroupPair, entity: &str) -> Result<(), DxfError> {
        let slot = if group.code < 20 { &mut self.x } else { &mut self.y };
        if slot.is_some() {
            return Err(DxfError::invalid(format!(
                "{entity} 组码 {} 重复出现",
                group.code
            )));
        }
        *slot = Some(group.real(entity)?);
        Ok(())
    }

    fn point(&self) -> Option<Point2> {
        Some(Point2::new(self.x?, self.y?))
    }
}
