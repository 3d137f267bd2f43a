//! 图层表
//!
//! 只记录图层名称与默认颜色，用于颜色解析。

use crate::properties::{Color, ColorSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 图层定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// 图层名称
    pub name: String,

    /// 图层颜色
    pub color: ColorSpec,
}

impl Layer {
    /// 创建新图层（颜色为 ACI 7）
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: ColorSpec::Index(7),
        }
    }

    /// 设置颜色
    pub fn with_color(mut self, color: ColorSpec) -> Self {
        self.color = color;
        self
    }

    /// 图层基色：真彩色，其次 ACI，否则白色
    pub fn base_color(&self) -> Color {
        self.color.direct().unwrap_or(Color::WHITE)
    }
}

/// 图层表（按名称索引，遍历顺序稳定）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerTable {
    layers: BTreeMap<String, Layer>,
}

impl LayerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加图层，同名图层会被替换
    pub fn add(&mut self, layer: Layer) {
        self.layers.insert(layer.name.clone(), layer);
    }

    /// 获取图层
    pub fn get(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name)
    }

    /// 迭代所有图层
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl FromIterator<Layer> for LayerTable {
    fn from_iter<T: IntoIterator<Item = Layer>>(iter: T) -> Self {
        let mut table = Self::new();
        for layer in iter {
            table.add(layer);
        }
        table
    }
}
