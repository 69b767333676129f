use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use svgpad_core::document::Orientation;
use thiserror::Error;

pub const CONFIG_ENV_VAR: &str = "SVGPAD_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub draw: DrawConfig,
    #[serde(default)]
    pub frontend: FrontendConfig,
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

    /// 自动发现配置文件：优先读取环境变量 `SVGPAD_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV_VAR) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// 步长与页面宽度必须为正，路径标识不能为空。
    pub fn validate(&self) -> Result<(), ConfigError> {
        let view = &self.view;
        let positive = [
            ("view.zoom_step", view.zoom_step),
            ("view.precise_zoom_step", view.precise_zoom_step),
            ("view.rotate_step", view.rotate_step),
            ("view.precise_rotate_step", view.precise_rotate_step),
            ("view.page_width", view.page_width),
            ("draw.stroke_width", self.draw.stroke_width),
        ];
        for (key, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!("{key} 必须为正数，当前为 {value}")));
            }
        }
        if self.draw.path_id.trim().is_empty() || self.draw.path_class.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "draw.path_id 与 draw.path_class 不能为空".to_string(),
            ));
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

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum RulerUnitName {
    #[default]
    #[serde(rename = "м", alias = "m")]
    Meters,
    #[serde(rename = "км", alias = "km")]
    Kilometers,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewConfig {
    #[serde(default = "ViewConfig::default_zoom_step")]
    pub zoom_step: f64,
    #[serde(default = "ViewConfig::default_precise_zoom_step")]
    pub precise_zoom_step: f64,
    #[serde(default = "ViewConfig::default_rotate_step")]
    pub rotate_step: f64,
    #[serde(default = "ViewConfig::default_precise_rotate_step")]
    pub precise_rotate_step: f64,
    #[serde(default = "ViewConfig::default_page_width")]
    pub page_width: f64,
    #[serde(default = "ViewConfig::default_orientation")]
    pub orientation: Orientation,
    #[serde(default)]
    pub ruler_unit: RulerUnitName,
}

impl ViewConfig {
    fn default_zoom_step() -> f64 {
        0.05
    }

    fn default_precise_zoom_step() -> f64 {
        0.005
    }

    fn default_rotate_step() -> f64 {
        5.0
    }

    fn default_precise_rotate_step() -> f64 {
        1.0
    }

    fn default_page_width() -> f64 {
        1000.0
    }

    fn default_orientation() -> Orientation {
        Orientation::Landscape
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            zoom_step: Self::default_zoom_step(),
            precise_zoom_step: Self::default_precise_zoom_step(),
            rotate_step: Self::default_rotate_step(),
            precise_rotate_step: Self::default_precise_rotate_step(),
            page_width: Self::default_page_width(),
            orientation: Self::default_orientation(),
            ruler_unit: RulerUnitName::default(),
        }
    }
}

/// 手绘路径的标识与样式。
#[derive(Debug, Clone, Deserialize)]
pub struct DrawConfig {
    #[serde(default = "DrawConfig::default_path_id")]
    pub path_id: String,
    #[serde(default = "DrawConfig::default_path_class")]
    pub path_class: String,
    #[serde(default = "DrawConfig::default_stroke")]
    pub stroke: String,
    #[serde(default = "DrawConfig::default_stroke_width")]
    pub stroke_width: f64,
    #[serde(default = "DrawConfig::default_none")]
    pub stroke_dasharray: String,
    #[serde(default = "DrawConfig::default_none")]
    pub fill: String,
}

impl DrawConfig {
    fn default_path_id() -> String {
        "path".to_string()
    }

    fn default_path_class() -> String {
        "itspath".to_string()
    }

    fn default_stroke() -> String {
        "#000000".to_string()
    }

    fn default_stroke_width() -> f64 {
        1.0
    }

    fn default_none() -> String {
        "none".to_string()
    }
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            path_id: Self::default_path_id(),
            path_class: Self::default_path_class(),
            stroke: Self::default_stroke(),
            stroke_width: Self::default_stroke_width(),
            stroke_dasharray: Self::default_none(),
            fill: Self::default_none(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    /// 名称解析器放弃时使用的文件名。
    #[serde(default = "FrontendConfig::default_file_name")]
    pub default_file_name: String,
}

impl FrontendConfig {
    fn default_file_name() -> String {
        "unnamed".to_string()
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            default_file_name: Self::default_file_name(),
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
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
    #[error("配置无效: {0}")]
    Invalid(String),
}
