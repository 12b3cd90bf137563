//! 取点提示协议与输入采集器。
//!
//! 每种实体用一张提示脚本描述“第 n 个输入应是什么类型、接下来提示什么”。
//! 采集器在脚本之上维护已采集的点，并在点数满足时产出实体。

use std::sync::Arc;

use tracing::{debug, warn};

use dcad_core::entity::{Entity, EntityData, Style};
use dcad_core::geometry::Point2;

use crate::command::EntityCommand;

/// 外部输入：一次点击或一个键入的距离。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputToken {
    Point(Point2),
    Number(f64),
}

impl InputToken {
    #[inline]
    pub fn kind(&self) -> TokenKind {
        match self {
            InputToken::Point(_) => TokenKind::Point,
            InputToken::Number(_) => TokenKind::Number,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Point,
    Number,
}

/// 脚本中的一步：该步显示的提示，以及到达该步的那个输入允许的类型。
/// 第 0 步对应“尚无输入”，`accepts` 为空。
#[derive(Debug, Clone, Copy)]
pub struct PromptStep {
    pub text: &'static str,
    pub accepts: &'static [TokenKind],
}

impl PromptStep {
    pub const fn new(text: &'static str, accepts: &'static [TokenKind]) -> Self {
        Self { text, accepts }
    }
}

/// 点数已达最少点数后，再来的合法输入如何处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcessInput {
    /// 交给步骤类型检查决定去留。
    Keep,
    /// 弹出多余输入，本次不再触发完成。
    Discard,
    /// 弹出多余输入，剩余点数满足时仍报告完成。
    DiscardAndComplete,
}

#[derive(Debug)]
pub struct PromptScript {
    pub steps: &'static [PromptStep],
    pub excess: ExcessInput,
    pub reset_on_action: bool,
}

/// 提示协议的返回值。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptResponse {
    pub prompt_input: String,
    pub reset: bool,
    pub action: bool,
    pub valid_input: bool,
}

impl PromptScript {
    fn accepts(&self, inputs: &[InputToken]) -> bool {
        match inputs.last() {
            None => true,
            Some(token) => self
                .steps
                .get(inputs.len())
                .is_some_and(|step| step.accepts.contains(&token.kind())),
        }
    }

    fn text_for(&self, count: usize) -> &'static str {
        self.steps.get(count).map_or("", |step| step.text)
    }

    /// 校验最后一个输入；无效或多余时将其弹出，再按剩余点数给出提示。
    pub fn respond(&self, min_points: usize, inputs: &mut Vec<InputToken>) -> PromptResponse {
        let valid_input = self.accepts(inputs);
        let excess = inputs.len() > min_points && self.excess != ExcessInput::Keep;

        let mut action = false;
        if !valid_input || excess {
            inputs.pop();
            if self.excess == ExcessInput::DiscardAndComplete && inputs.len() == min_points {
                action = true;
            }
        } else if inputs.len() == min_points {
            action = true;
        }

        PromptResponse {
            prompt_input: self.text_for(inputs.len()).to_string(),
            reset: action && self.reset_on_action,
            action,
            valid_input,
        }
    }
}

/// 采集器向调用方报告的结果。
#[derive(Debug, Clone, PartialEq)]
pub enum CollectorEvent {
    /// 输入类型不符，已丢弃。
    Rejected { prompt: String },
    Pending { prompt: String },
    /// 实体完成；采集器已复位，`prompt` 为下一个实体的首条提示。
    Completed { entity: Entity, prompt: String },
}

/// 驱动提示脚本的输入采集器。
///
/// 多段线在达到最少点数后继续接收点，直到调用 [`InputCollector::finish`]；
/// 在多段线的后续步骤中键入数字，表示沿上一段方向延伸该距离。
/// 只有一个点时“上一段方向”取 X 轴正向。
pub struct InputCollector {
    command: Arc<dyn EntityCommand>,
    style: Style,
    inputs: Vec<InputToken>,
    points: Vec<Point2>,
    prompt: String,
    ready: bool,
}

impl InputCollector {
    pub fn new(command: Arc<dyn EntityCommand>, style: Style) -> Self {
        let mut collector = Self {
            command,
            style,
            inputs: Vec::new(),
            points: Vec::new(),
            prompt: String::new(),
            ready: false,
        };
        collector.reset();
        collector
    }

    #[inline]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[inline]
    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    pub fn command_name(&self) -> &'static str {
        self.command.spec().command
    }

    /// 已达最少点数、可以 `finish` 的持续采集型命令。
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    fn reset(&mut self) {
        self.inputs.clear();
        self.points.clear();
        self.ready = false;
        self.prompt = self.command.prompt(&mut self.inputs).prompt_input;
    }

    fn resolve(&self, token: InputToken) -> Point2 {
        match token {
            InputToken::Point(point) => point,
            InputToken::Number(distance) => match self.points.as_slice() {
                [.., previous, last] => last.project(previous.angle_to(*last), distance),
                [last] => last.project(0.0, distance),
                [] => Point2::default(),
            },
        }
    }

    pub fn feed(&mut self, token: InputToken) -> CollectorEvent {
        self.inputs.push(token);
        let response = self.command.prompt(&mut self.inputs);
        self.prompt = response.prompt_input.clone();

        if !response.valid_input {
            warn!(
                command = self.command_name(),
                input = ?token,
                "discarded input of unexpected type"
            );
            return CollectorEvent::Rejected {
                prompt: response.prompt_input,
            };
        }

        let point = self.resolve(token);
        self.points.push(point);

        if response.action {
            if response.reset {
                let entity = self.build();
                self.reset();
                return CollectorEvent::Completed {
                    entity,
                    prompt: self.prompt.clone(),
                };
            }
            self.ready = true;
        }
        CollectorEvent::Pending {
            prompt: response.prompt_input,
        }
    }

    /// 结束持续采集型命令（多段线）。点数不足时丢弃已采集的点并返回 `None`。
    pub fn finish(&mut self) -> Option<Entity> {
        let min_points = self.command.spec().min_points;
        let entity = if self.points.len() >= min_points {
            Some(self.build())
        } else {
            if !self.points.is_empty() {
                warn!(
                    command = self.command_name(),
                    points = self.points.len(),
                    "command cancelled before reaching minimum points"
                );
            }
            None
        };
        self.reset();
        entity
    }

    fn build(&self) -> Entity {
        let data = EntityData {
            points: self.points.clone(),
            colour: Some(self.style.colour.clone()),
            layer: Some(self.style.layer.clone()),
            ..EntityData::default()
        };
        let mut entity = self.command.build(data);
        *entity.style_mut() = self.style.clone();
        debug!(
            command = self.command_name(),
            points = self.points.len(),
            layer = %self.style.layer,
            "entity created"
        );
        entity
    }
}
