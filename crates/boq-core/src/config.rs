//! 引擎配置
//!
//! 配置在每次运行前确定，运行期间只读。命令行覆盖项通过
//! [`EngineConfig::with_overrides`] 生成新的配置快照，不修改原值。

use crate::units::Unit;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 配置文件路径的环境变量
pub const CONFIG_ENV: &str = "BOQ_CONFIG";

/// 默认配置文件名（当前目录下）
pub const DEFAULT_CONFIG_FILE: &str = "boq.toml";

/// 配置文件根结构
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub engine: EngineConfig,
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
        config.engine.validate()?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `BOQ_CONFIG`，否则寻找 `./boq.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join(DEFAULT_CONFIG_FILE))
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
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 区域图层名称（不区分大小写）
    pub planner_layer: String,
    /// 嵌套块参照的最大深度
    pub max_nested_depth: usize,
    /// 输出数值的小数位数
    pub decimals: u32,
    /// 报表目标单位
    pub target_units: Unit,
    /// `$INSUNITS` 缺失或未识别时假定的图纸单位
    pub unitless_units: Unit,
    /// 是否统计外部参照
    pub include_xrefs: bool,
    /// 有区域时把明细分类强制为区域图层名
    pub force_planner_category: bool,
    /// 是否按块名/分类/区域汇总块参照
    pub aggregate_instances: bool,
    /// 是否输出图层统计行
    pub layer_metrics: bool,
    /// 圆弧离散的最少段数
    pub arc_min_steps: usize,
    /// 圆弧离散每段的角度（度）
    pub arc_step_degrees: f64,
    /// 凸度弧离散的最少段数
    pub bulge_min_steps: usize,
    /// 凸度弧离散每段的角度（度）
    pub bulge_step_degrees: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            planner_layer: "PLANNER".to_string(),
            max_nested_depth: 10,
            decimals: 2,
            target_units: Unit::Foot,
            unitless_units: Unit::Meter,
            include_xrefs: false,
            force_planner_category: true,
            aggregate_instances: true,
            layer_metrics: true,
            arc_min_steps: 16,
            arc_step_degrees: 6.0,
            bulge_min_steps: 8,
            bulge_step_degrees: 6.0,
        }
    }
}

impl EngineConfig {
    /// 检查配置取值
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.planner_layer.trim().is_empty() {
            return Err(ConfigError::Invalid("planner_layer 不能为空".to_string()));
        }
        if self.arc_min_steps == 0 || self.bulge_min_steps == 0 {
            return Err(ConfigError::Invalid("离散段数必须大于 0".to_string()));
        }
        if !(self.arc_step_degrees > 0.0 && self.bulge_step_degrees > 0.0) {
            return Err(ConfigError::Invalid("离散角度必须大于 0".to_string()));
        }
        if self.decimals > 10 {
            return Err(ConfigError::Invalid(format!(
                "decimals 超出范围: {}",
                self.decimals
            )));
        }
        Ok(())
    }

    /// 图层名是否为区域图层
    pub fn is_planner_layer(&self, layer: &str) -> bool {
        layer.trim().eq_ignore_ascii_case(self.planner_layer.trim())
    }

    /// 应用覆盖项，返回新的配置快照
    pub fn with_overrides(&self, overrides: &EngineOverrides) -> Result<Self, ConfigError> {
        let mut next = self.clone();
        if let Some(layer) = &overrides.planner_layer {
            next.planner_layer = layer.clone();
        }
        if let Some(depth) = overrides.max_nested_depth {
            next.max_nested_depth = depth;
        }
        if let Some(decimals) = overrides.decimals {
            next.decimals = decimals;
        }
        if let Some(unit) = overrides.target_units {
            next.target_units = unit;
        }
        if let Some(unit) = overrides.unitless_units {
            next.unitless_units = unit;
        }
        if let Some(flag) = overrides.include_xrefs {
            next.include_xrefs = flag;
        }
        if let Some(flag) = overrides.aggregate_instances {
            next.aggregate_instances = flag;
        }
        if let Some(flag) = overrides.layer_metrics {
            next.layer_metrics = flag;
        }
        next.validate()?;
        Ok(next)
    }
}

/// 运行时覆盖项（通常来自命令行），`None` 表示保留原值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineOverrides {
    pub planner_layer: Option<String>,
    pub max_nested_depth: Option<usize>,
    pub decimals: Option<u32>,
    pub target_units: Option<Unit>,
    pub unitless_units: Option<Unit>,
    pub include_xrefs: Option<bool>,
    pub aggregate_instances: Option<bool>,
    pub layer_metrics: Option<bool>,
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
