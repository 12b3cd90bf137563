use dcad_core::entity::LayerVisibility;

/// 图层记录。实体查询只关心 `visible`。
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub colour: String,
    pub line_width: f64,
    pub visible: bool,
    pub plotting: bool,
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            colour: "#FFFFFF".to_string(),
            line_width: 1.0,
            visible: true,
            plotting: true,
        }
    }
}

/// 图层表。名称比较不区分大小写，`0` 与 `DEFPOINTS` 两个标准图层始终存在。
#[derive(Debug, Clone)]
pub struct LayerTable {
    layers: Vec<Layer>,
}

pub const DEFPOINTS: &str = "DEFPOINTS";

impl Default for LayerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerTable {
    pub fn new() -> Self {
        let mut zero = Layer::new("0");
        zero.colour = "#00BFFF".to_string();
        let mut defpoints = Layer::new(DEFPOINTS);
        defpoints.plotting = false;
        Self {
            layers: vec![zero, defpoints],
        }
    }

    pub fn get(&self, name: &str) -> Option<&Layer> {
        self.layers
            .iter()
            .find(|layer| layer.name.eq_ignore_ascii_case(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Layer> {
        self.layers
            .iter_mut()
            .find(|layer| layer.name.eq_ignore_ascii_case(name))
    }

    /// 图层不存在时以默认属性创建。返回是否新建。
    pub fn ensure(&mut self, name: &str) -> bool {
        if self.get(name).is_some() {
            return false;
        }
        self.layers.push(Layer::new(name));
        true
    }

    /// 设置可见性，图层不存在时返回 `false`。
    pub fn set_visible(&mut self, name: &str, visible: bool) -> bool {
        match self.get_mut(name) {
            Some(layer) => {
                layer.visible = visible;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl LayerVisibility for LayerTable {
    /// 未知图层视为不可见。
    fn layer_visible(&self, name: &str) -> bool {
        self.get(name).is_some_and(|layer| layer.visible)
    }
}
