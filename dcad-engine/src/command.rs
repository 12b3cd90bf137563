use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use dcad_core::entity::{Entity, EntityData, EntityKind};

use crate::errors::EngineError;
use crate::prompt::{ExcessInput, InputToken, PromptResponse, PromptScript, PromptStep, TokenKind};

/// 实体命令的注册信息。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub command: &'static str,
    pub shortcut: Option<&'static str>,
    pub kind: EntityKind,
    pub min_points: usize,
    /// 采集过程中是否在相邻输入点之间绘制辅助线。
    pub helper_geometry: bool,
    pub show_preview: bool,
}

/// 每种实体对外提供的命令契约：注册信息、取点提示脚本与构造。
pub trait EntityCommand: Send + Sync {
    fn spec(&self) -> CommandSpec;

    fn script(&self) -> &'static PromptScript;

    /// 根据当前输入序列决定下一条提示，并在输入无效或多余时弹出最后一个输入。
    fn prompt(&self, inputs: &mut Vec<InputToken>) -> PromptResponse {
        self.script().respond(self.spec().min_points, inputs)
    }

    fn build(&self, data: EntityData) -> Entity {
        Entity::from_data(self.spec().kind, data)
    }
}

const PICK_ANOTHER: &str = "Pick another point or press ESC to quit:";

static POLYLINE_SCRIPT: PromptScript = PromptScript {
    steps: &[
        PromptStep::new("Pick start point:", &[]),
        PromptStep::new(PICK_ANOTHER, &[TokenKind::Point]),
        PromptStep::new(PICK_ANOTHER, &[TokenKind::Point, TokenKind::Number]),
        PromptStep::new(PICK_ANOTHER, &[TokenKind::Point, TokenKind::Number]),
    ],
    excess: ExcessInput::Discard,
    reset_on_action: false,
};

static ELLIPSE_SCRIPT: PromptScript = PromptScript {
    steps: &[
        PromptStep::new("Pick the centre point:", &[]),
        PromptStep::new("Pick start point:", &[TokenKind::Point]),
        PromptStep::new("Pick end point:", &[TokenKind::Point]),
        PromptStep::new("", &[TokenKind::Point]),
    ],
    excess: ExcessInput::Keep,
    reset_on_action: true,
};

static DIMENSION_SCRIPT: PromptScript = PromptScript {
    steps: &[
        PromptStep::new("Pick start point:", &[]),
        PromptStep::new("Pick second point:", &[TokenKind::Point]),
        PromptStep::new("Position extension:", &[TokenKind::Point]),
        PromptStep::new("Pick second point:", &[TokenKind::Point]),
    ],
    excess: ExcessInput::DiscardAndComplete,
    reset_on_action: true,
};

pub struct PolylineCommand;

impl EntityCommand for PolylineCommand {
    fn spec(&self) -> CommandSpec {
        CommandSpec {
            command: "Polyline",
            shortcut: Some("PL"),
            kind: EntityKind::Polyline,
            min_points: EntityKind::Polyline.min_points(),
            helper_geometry: false,
            show_preview: true,
        }
    }

    fn script(&self) -> &'static PromptScript {
        &POLYLINE_SCRIPT
    }
}

pub struct EllipseCommand;

impl EntityCommand for EllipseCommand {
    fn spec(&self) -> CommandSpec {
        CommandSpec {
            command: "Ellipse",
            shortcut: None,
            kind: EntityKind::Ellipse,
            min_points: EntityKind::Ellipse.min_points(),
            helper_geometry: true,
            show_preview: true,
        }
    }

    fn script(&self) -> &'static PromptScript {
        &ELLIPSE_SCRIPT
    }
}

pub struct DimensionCommand;

impl EntityCommand for DimensionCommand {
    fn spec(&self) -> CommandSpec {
        CommandSpec {
            command: "Dimension",
            shortcut: None,
            kind: EntityKind::Dimension,
            min_points: EntityKind::Dimension.min_points(),
            helper_geometry: false,
            show_preview: true,
        }
    }

    fn script(&self) -> &'static PromptScript {
        &DIMENSION_SCRIPT
    }
}

/// 内置实体命令：多段线、椭圆、尺寸标注。
pub fn builtin_commands() -> Vec<Arc<dyn EntityCommand>> {
    vec![
        Arc::new(PolylineCommand) as Arc<dyn EntityCommand>,
        Arc::new(EllipseCommand),
        Arc::new(DimensionCommand),
    ]
}

/// 命令名与快捷键到实体命令的映射，大小写不敏感。
pub struct EntityRegistry {
    commands: Vec<Arc<dyn EntityCommand>>,
    lookup: HashMap<String, usize>,
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityRegistry {
    pub fn empty() -> Self {
        Self {
            commands: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    /// 注册全部内置实体命令。
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for command in builtin_commands() {
            if let Err(err) = registry.register(command) {
                // 内置表由 `builtin_commands_are_unique` 测试保证无重名。
                debug_assert!(false, "built-in command table is inconsistent: {err}");
                warn!(error = %err, "skipped built-in entity command");
            }
        }
        registry
    }

    /// 依次注册给定命令，任何重名都会中止并返回错误。
    pub fn with_commands(
        commands: impl IntoIterator<Item = Arc<dyn EntityCommand>>,
    ) -> Result<Self, EngineError> {
        let mut registry = Self::empty();
        for command in commands {
            registry.register(command)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, command: Arc<dyn EntityCommand>) -> Result<(), EngineError> {
        let spec = command.spec();
        let keys: Vec<String> = std::iter::once(spec.command)
            .chain(spec.shortcut)
            .map(str::to_uppercase)
            .collect();
        if let Some(taken) = keys.iter().find(|key| self.lookup.contains_key(*key)) {
            return Err(EngineError::DuplicateCommand(taken.clone()));
        }

        let index = self.commands.len();
        self.commands.push(command);
        for key in keys {
            self.lookup.insert(key, index);
        }
        debug!(command = spec.command, shortcut = ?spec.shortcut, "registered entity command");
        Ok(())
    }

    /// 按命令名或快捷键查找。
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn EntityCommand>, EngineError> {
        let key = name.trim().to_uppercase();
        match self.lookup.get(&key) {
            Some(index) => {
                let command = Arc::clone(&self.commands[*index]);
                debug!(input = name, command = command.spec().command, "resolved command");
                Ok(command)
            }
            None => Err(EngineError::UnknownCommand(name.to_string())),
        }
    }

    pub fn specs(&self) -> impl Iterator<Item = CommandSpec> + '_ {
        self.commands.iter().map(|command| command.spec())
    }

    /// 按实体类型构造，供从数据（例如文件）重建实体时使用。
    pub fn build(&self, kind: EntityKind, data: EntityData) -> Result<Entity, EngineError> {
        self.commands
            .iter()
            .find(|command| command.spec().kind == kind)
            .map(|command| command.build(data))
            .ok_or_else(|| EngineError::UnknownCommand(kind.name().to_string()))
    }
}
