use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指向配置文件的环境变量。
pub const CONFIG_ENV: &str = "DCAD_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub snaps: SnapConfig,
    #[serde(default)]
    pub drawing: DrawingConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `DCAD_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        let cwd = env::current_dir().map_err(|source| ConfigError::Context {
            message: "获取当前工作目录失败".to_string(),
            source,
        })?;
        Self::discover_from(env::var_os(CONFIG_ENV), &cwd)
    }

    /// `discover` 的可测试版本：显式传入环境变量取值与工作目录。
    pub fn discover_from(env_path: Option<OsString>, cwd: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = env_path {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = cwd.join("config").join("default.toml");
        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.snaps.delta.is_nan() || self.snaps.delta <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "snaps.delta 必须为正数，实际为 {}",
                self.snaps.delta
            )));
        }
        if self.drawing.line_width.is_nan() || self.drawing.line_width < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "drawing.line_width 不能为负数，实际为 {}",
                self.drawing.line_width
            )));
        }
        Ok(())
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 捕捉开关与拾取容差。最近点捕捉只在距离小于 `delta / 10` 时生效。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    pub endpoint: bool,
    pub midpoint: bool,
    pub centre: bool,
    pub quadrant: bool,
    pub nearest: bool,
    pub delta: f64,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            endpoint: true,
            midpoint: true,
            centre: true,
            quadrant: true,
            nearest: true,
            delta: 10.0,
        }
    }
}

/// 新建实体使用的默认样式。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DrawingConfig {
    pub layer: String,
    pub colour: String,
    pub line_width: f64,
}

impl Default for DrawingConfig {
    fn default() -> Self {
        Self {
            layer: "0".to_string(),
            colour: "BYLAYER".to_string(),
            line_width: 2.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("配置取值无效: {0}")]
    Invalid(String),
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
