//! 脚本化的命令行会话：按命令名驱动输入采集器绘制实体，或读入 DXF，
//! 随后打印场景概览、捕捉结果与 DXF 输出。

use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use dcad_config::AppConfig;
use dcad_core::entity::{Entity, SnapSettings, Style};
use dcad_core::geometry::{Extremes, Point2};
use dcad_engine::command::EntityRegistry;
use dcad_engine::errors::EngineError;
use dcad_engine::prompt::{CollectorEvent, InputCollector, InputToken};
use dcad_engine::scene::Scene;
use dcad_io::{DocumentLoader, DocumentSaver, DxfFacade, IoError, encode_document};

#[derive(Debug, Default)]
pub struct SessionOptions {
    pub load: Option<PathBuf>,
    pub save: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Io(#[from] IoError),
}

/// 一条脚本化命令：命令名（或快捷键）与依次输入的记号。
struct ScriptedCommand {
    name: &'static str,
    inputs: Vec<InputToken>,
}

fn demo_script() -> Vec<ScriptedCommand> {
    let point = |x, y| InputToken::Point(Point2::new(x, y));
    vec![
        ScriptedCommand {
            name: "PL",
            inputs: vec![
                point(0.0, 0.0),
                InputToken::Number(80.0),
                point(80.0, 40.0),
                InputToken::Number(20.0),
            ],
        },
        ScriptedCommand {
            name: "ellipse",
            inputs: vec![point(40.0, 20.0), point(55.0, 20.0), point(40.0, 28.0)],
        },
        ScriptedCommand {
            name: "Dimension",
            inputs: vec![point(0.0, 0.0), point(80.0, 0.0), point(40.0, -8.0)],
        },
    ]
}

fn snap_settings(config: &AppConfig) -> SnapSettings {
    SnapSettings {
        endpoint: config.snaps.endpoint,
        midpoint: config.snaps.midpoint,
        centre: config.snaps.centre,
        quadrant: config.snaps.quadrant,
        nearest: config.snaps.nearest,
    }
}

fn default_style(config: &AppConfig) -> Style {
    Style {
        line_width: config.drawing.line_width,
        colour: config.drawing.colour.clone(),
        layer: config.drawing.layer.clone(),
        ..Style::default()
    }
}

/// 逐条执行脚本命令，把完成的实体加入场景。
fn draw_scripted(scene: &mut Scene, style: &Style) -> Result<(), SessionError> {
    let registry = EntityRegistry::new();
    for command in demo_script() {
        let resolved = registry.resolve(command.name)?;
        let mut collector = InputCollector::new(resolved, style.clone());
        println!("命令: {}", collector.command_name());
        println!("  > {}", collector.prompt());
        for token in command.inputs {
            match collector.feed(token) {
                CollectorEvent::Rejected { prompt } => println!("  ! 输入无效  > {prompt}"),
                CollectorEvent::Pending { prompt } => println!("  > {prompt}"),
                CollectorEvent::Completed { entity, .. } => {
                    scene.add_entity(entity);
                }
            }
        }
        if collector.is_ready() {
            if let Some(entity) = collector.finish() {
                scene.add_entity(entity);
            }
        }
    }
    Ok(())
}

fn describe(entity: &Entity) -> String {
    let points: Vec<String> = entity
        .points()
        .iter()
        .map(|point| format!("({:.2}, {:.2})", point.x(), point.y()))
        .collect();
    format!(
        "{} Layer={} 点=[{}]",
        entity.kind().name(),
        entity.layer_name(),
        points.join(", ")
    )
}

fn print_extremes(label: &str, extremes: Option<Extremes>) {
    match extremes {
        Some(e) => println!(
            "{label}: x=[{:.3}, {:.3}] y=[{:.3}, {:.3}]",
            e.xmin, e.xmax, e.ymin, e.ymax
        ),
        None => println!("{label}: 无"),
    }
}

pub fn run(config: &AppConfig, options: &SessionOptions) -> Result<(), SessionError> {
    let facade = DxfFacade::new();
    let mut scene = match &options.load {
        Some(path) => {
            let entities = facade.load(path)?;
            info!(path = %path.display(), count = entities.len(), "已从 DXF 加载实体");
            Scene::with_entities(entities)
        }
        None => {
            let mut scene = Scene::new();
            draw_scripted(&mut scene, &default_style(config))?;
            scene
        }
    };

    println!("当前图层：");
    for layer in scene.layers().iter() {
        println!("  - {} (可见: {}, 打印: {})", layer.name, layer.visible, layer.plotting);
    }
    println!("当前实体：");
    for (id, entity) in scene.entities() {
        println!("  - #{} {}", id.get(), describe(entity));
    }

    let Some(extents) = scene.extremes()? else {
        warn!("场景为空，跳过选择与捕捉演示");
        return Ok(());
    };
    print_extremes("场景范围", Some(extents));

    let settings = snap_settings(config);
    let mouse = extents.max();
    let snaps = scene.snaps(mouse, config.snaps.delta, &settings)?;
    println!("鼠标 ({:.2}, {:.2}) 处共有 {} 个捕捉候选", mouse.x(), mouse.y(), snaps.len());
    match scene.nearest_snap(mouse, config.snaps.delta, &settings)? {
        Some(snap) => println!(
            "最近捕捉: {:?} ({:.3}, {:.3})",
            snap.kind,
            snap.point.x(),
            snap.point.y()
        ),
        None => println!("最近捕捉: 无"),
    }

    // 以场景中心附近的小窗口做交叉选择。
    let centre = extents.center();
    let half = extents.width().max(extents.height()) / 4.0;
    let window = Extremes::new(
        centre.x() - half,
        centre.x() + half,
        centre.y() - half,
        centre.y() + half,
    );
    let hits = scene.crossing_select(&window)?;
    let ids: Vec<String> = hits.iter().map(|id| id.get().to_string()).collect();
    println!("交叉选择命中实体 ID：{}", ids.join(", "));
    print_extremes("选中范围", scene.selection_extremes()?);

    let entities: Vec<Entity> = scene.entities().map(|(_, entity)| entity.clone()).collect();
    match &options.save {
        Some(path) => {
            facade.save(&entities, path)?;
            println!("已写出 DXF：{}", path.display());
        }
        None => println!("{}", encode_document(&entities)?),
    }
    Ok(())
}
