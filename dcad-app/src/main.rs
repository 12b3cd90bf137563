use std::path::{Path, PathBuf};

use dcad_config::{AppConfig, ConfigError};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod session;

use session::SessionOptions;

fn main() {
    let mut args = std::env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut options = SessionOptions::default();

    while let Some(arg) = args.next() {
        let slot = match arg.as_str() {
            "--config" => &mut config_path,
            "--load" => &mut options.load,
            "--save" => &mut options.save,
            other => {
                eprintln!("dcad: 未知参数 {other}（可用：--config、--load、--save）");
                std::process::exit(2);
            }
        };
        let Some(value) = args.next() else {
            eprintln!("dcad: {arg} 之后需要一个文件路径");
            std::process::exit(2);
        };
        *slot = Some(PathBuf::from(value));
    }

    // 订阅者装好之前的日志会丢失，配置错误留到初始化之后再报告。
    let (config, config_error) = match resolve_config(config_path.as_deref()) {
        Ok(config) => (config, None),
        Err(err) => (AppConfig::default(), Some(err)),
    };
    init_logging(&config.logging.level);
    if let Some(err) = config_error {
        warn!(error = %err, "配置不可用，改用内建默认值");
    }
    info!(
        layer = %config.drawing.layer,
        snap_delta = config.snaps.delta,
        "dcad 会话开始"
    );

    if let Err(err) = session::run(&config, &options) {
        error!(error = %err, "会话中止");
        std::process::exit(1);
    }
}

/// 显式路径优先；否则按 `DCAD_CONFIG`、`./config/default.toml` 的顺序发现。
fn resolve_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match explicit {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::discover(),
    }
}

/// `RUST_LOG` 存在时覆盖配置中的等级。
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if fmt().with_env_filter(filter).with_target(false).try_init().is_err() {
        debug!("日志订阅者已存在，沿用现有配置");
    }
}
