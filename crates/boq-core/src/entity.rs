//! 图纸实体
//!
//! 一个实体包含几何数据、所属图层和颜色，读入后不再修改。

use crate::geometry::Geometry;
use crate::properties::ColorSpec;
use serde::{Deserialize, Serialize};

/// CAD实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// 几何类型和数据
    pub geometry: Geometry,

    /// 所属图层名称
    pub layer: String,

    /// 颜色
    pub color: ColorSpec,
}

impl Entity {
    /// 创建新实体（图层 "0"，颜色随层）
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            layer: "0".to_string(),
            color: ColorSpec::ByLayer,
        }
    }

    /// 使用指定的图层
    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = layer.into();
        self
    }

    /// 使用指定的颜色
    pub fn with_color(mut self, color: ColorSpec) -> Self {
        self.color = color;
        self
    }
}
