pub mod command;
pub mod layers;
pub mod prompt;

pub mod errors {
    use dcad_core::errors::GeometryError;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("unknown command `{0}`")]
        UnknownCommand(String),
        #[error("command name or shortcut `{0}` is already registered")]
        DuplicateCommand(String),
        #[error("entity with id {0} not found")]
        EntityNotFound(u64),
        #[error("layer `{0}` not found")]
        LayerNotFound(String),
        #[error("layer `{0}` is hidden")]
        LayerHidden(String),
        #[error(transparent)]
        Geometry(#[from] GeometryError),
    }
}

pub mod scene {
    use std::collections::{BTreeMap, BTreeSet};

    use tracing::{debug, warn};

    use dcad_core::entity::{Entity, LayerVisibility, SnapPoint, SnapSettings};
    use dcad_core::geometry::{Extremes, Point2};

    use crate::errors::EngineError;
    use crate::layers::LayerTable;

    /// 场景内实体的稳定编号，删除后不复用。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    /// 引擎层负责维护实体集合、图层表和运行时状态（选中集）。
    #[derive(Debug, Default)]
    pub struct Scene {
        entities: BTreeMap<EntityId, Entity>,
        next_id: u64,
        layers: LayerTable,
        selected: BTreeSet<EntityId>,
    }

    impl Scene {
        pub fn new() -> Self {
            Self::default()
        }

        /// 以一组实体初始化场景，例如从 DXF 读入的结果。
        pub fn with_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
            let mut scene = Self::new();
            scene.load_entities(entities);
            scene
        }

        /// 替换全部实体并清空选中集，图层表保留。
        pub fn load_entities(&mut self, entities: impl IntoIterator<Item = Entity>) {
            self.entities.clear();
            self.selected.clear();
            for entity in entities {
                self.add_entity(entity);
            }
        }

        /// 加入实体，所在图层不存在时自动创建。
        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            let id = EntityId(self.next_id);
            self.next_id += 1;
            if self.layers.ensure(entity.layer_name()) {
                debug!(layer = entity.layer_name(), "created layer for entity");
            }
            debug!(
                id = id.get(),
                kind = entity.kind().name(),
                layer = entity.layer_name(),
                "entity added to scene"
            );
            self.entities.insert(id, entity);
            id
        }

        pub fn remove_entity(&mut self, id: EntityId) -> Result<Entity, EngineError> {
            self.selected.remove(&id);
            self.entities
                .remove(&id)
                .ok_or(EngineError::EntityNotFound(id.get()))
        }

        #[inline]
        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.entities.get(&id)
        }

        /// 按编号顺序遍历实体。
        pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> + '_ {
            self.entities.iter().map(|(id, entity)| (*id, entity))
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.entities.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.entities.is_empty()
        }

        #[inline]
        pub fn layers(&self) -> &LayerTable {
            &self.layers
        }

        /// 切换图层可见性。隐藏图层上的实体同时移出选中集。
        pub fn set_layer_visible(&mut self, name: &str, visible: bool) -> Result<(), EngineError> {
            if !self.layers.set_visible(name, visible) {
                return Err(EngineError::LayerNotFound(name.to_string()));
            }
            if !visible {
                let entities = &self.entities;
                self.selected.retain(|id| {
                    entities
                        .get(id)
                        .is_some_and(|entity| !entity.layer_name().eq_ignore_ascii_case(name))
                });
            }
            Ok(())
        }

        fn require(&self, id: EntityId) -> Result<&Entity, EngineError> {
            self.entities
                .get(&id)
                .ok_or(EngineError::EntityNotFound(id.get()))
        }

        #[inline]
        pub fn selection_len(&self) -> usize {
            self.selected.len()
        }

        #[inline]
        pub fn is_selected(&self, id: EntityId) -> bool {
            self.selected.contains(&id)
        }

        /// 把实体加入选中集，返回 `false` 表示它原本就已选中。
        /// 隐藏图层上的实体不可选。
        pub fn select(&mut self, id: EntityId) -> Result<bool, EngineError> {
            let entity = self.require(id)?;
            if !entity.is_visible_in(&self.layers) {
                return Err(EngineError::LayerHidden(entity.layer_name().to_string()));
            }
            Ok(self.selected.insert(id))
        }

        pub fn deselect(&mut self, id: EntityId) -> bool {
            self.selected.remove(&id)
        }

        /// 点选时的增减切换，返回切换后是否处于选中状态。
        pub fn toggle_selection(&mut self, id: EntityId) -> Result<bool, EngineError> {
            if self.selected.remove(&id) {
                return Ok(false);
            }
            self.select(id)
        }

        #[inline]
        pub fn clear_selection(&mut self) {
            self.selected.clear();
        }

        /// 按编号升序返回选中实体。
        #[inline]
        pub fn selection(&self) -> impl Iterator<Item = EntityId> + '_ {
            self.selected.iter().copied()
        }

        /// 窗选：完全落在窗口内部的可见实体加入选中集，返回本次命中的编号。
        pub fn window_select(&mut self, window: &Extremes) -> Result<Vec<EntityId>, EngineError> {
            let mut hits = Vec::new();
            for (id, entity) in &self.entities {
                if entity.within(window, entity.is_visible_in(&self.layers))? {
                    hits.push(*id);
                }
            }
            self.selected.extend(hits.iter().copied());
            debug!(hits = hits.len(), "window selection");
            Ok(hits)
        }

        /// 交叉选：与窗口边界相交或位于窗口内部的可见实体加入选中集。
        pub fn crossing_select(&mut self, window: &Extremes) -> Result<Vec<EntityId>, EngineError> {
            let mut hits = Vec::new();
            for (id, entity) in &self.entities {
                if entity.touched(window, entity.is_visible_in(&self.layers))? {
                    hits.push(*id);
                }
            }
            self.selected.extend(hits.iter().copied());
            debug!(hits = hits.len(), "crossing selection");
            Ok(hits)
        }

        pub fn entity_extremes(&self, id: EntityId) -> Result<Option<Extremes>, EngineError> {
            Ok(self.require(id)?.extremes()?)
        }

        /// 全部实体的范围。
        pub fn extremes(&self) -> Result<Option<Extremes>, EngineError> {
            self.extremes_of(self.entities.keys().copied())
        }

        /// 当前选中实体的范围。
        pub fn selection_extremes(&self) -> Result<Option<Extremes>, EngineError> {
            self.extremes_of(self.selected.iter().copied())
        }

        fn extremes_of(
            &self,
            ids: impl Iterator<Item = EntityId>,
        ) -> Result<Option<Extremes>, EngineError> {
            let mut extremes = Extremes::empty();
            let mut has = false;
            for id in ids {
                match self.entity_extremes(id)? {
                    Some(entity_extremes) => {
                        extremes.include_extremes(&entity_extremes);
                        has = true;
                    }
                    None => warn!(id = id.get(), "skipped degenerate entity in extremes"),
                }
            }
            Ok(has.then_some(extremes))
        }

        /// 汇总所有实体在鼠标位置附近的捕捉点。隐藏图层上的实体不参与。
        pub fn snaps(
            &self,
            mouse: Point2,
            delta: f64,
            settings: &SnapSettings,
        ) -> Result<Vec<SnapPoint>, EngineError> {
            let mut snaps = Vec::new();
            for entity in self.entities.values() {
                let visible = entity.is_visible_in(&self.layers);
                snaps.extend(entity.snaps(mouse, delta, settings, visible)?);
            }
            Ok(snaps)
        }

        /// 距鼠标最近、且在 `delta` 范围内的捕捉点。
        pub fn nearest_snap(
            &self,
            mouse: Point2,
            delta: f64,
            settings: &SnapSettings,
        ) -> Result<Option<SnapPoint>, EngineError> {
            let nearest = self
                .snaps(mouse, delta, settings)?
                .into_iter()
                .map(|snap| (snap.point.distance(mouse), snap))
                .filter(|(distance, _)| *distance <= delta)
                .min_by(|(a, _), (b, _)| a.total_cmp(b))
                .map(|(_, snap)| snap);
            Ok(nearest)
        }
    }

    impl LayerVisibility for Scene {
        fn layer_visible(&self, name: &str) -> bool {
            self.layers.layer_visible(name)
        }
    }

}
