//! 输入图纸
//!
//! 引擎的只读输入：模型空间实体、块表、顶层块参照、图层表和单位比例。
//! 由外部读取器（如 DXF 适配器）构建，引擎不修改它。

use crate::block::{BlockInstance, BlockTable};
use crate::entity::Entity;
use crate::layer::LayerTable;
use crate::math::Point2;
use crate::sampling::CurveSampler;
use crate::transform::Transform2D;
use serde::{Deserialize, Serialize};

/// 图纸文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    /// 文档名称（通常是文件名，仅用于日志）
    pub name: String,
    /// 模型空间实体（按读入顺序）
    pub entities: Vec<Entity>,
    /// 模型空间的顶层块参照（按读入顺序）
    pub instances: Vec<BlockInstance>,
    /// 块表
    pub blocks: BlockTable,
    /// 图层表
    pub layers: LayerTable,
    /// 图纸单位到米的比例
    pub scale_to_meters: f64,
}

impl Drawing {
    /// 创建空图纸（单位为米）
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: Vec::new(),
            instances: Vec::new(),
            blocks: BlockTable::new(),
            layers: LayerTable::new(),
            scale_to_meters: 1.0,
        }
    }

    /// 设置单位比例
    pub fn with_scale_to_meters(mut self, scale: f64) -> Self {
        self.scale_to_meters = scale;
        self
    }

    pub fn add_entity(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    pub fn add_instance(&mut self, instance: BlockInstance) {
        self.instances.push(instance);
    }

    /// 展开块参照，返回其全部几何（含嵌套块参照）在世界坐标下的离散点
    ///
    /// 嵌套深度超过 `max_depth` 或在当前路径上出现环时，该分支被截断。
    pub fn instance_points(
        &self,
        instance: &BlockInstance,
        parent: &Transform2D,
        sampler: &CurveSampler,
        max_depth: usize,
    ) -> Vec<Point2> {
        let mut points = Vec::new();
        let mut path = Vec::new();
        self.collect_instance_points(instance, parent, sampler, max_depth, &mut path, &mut points);
        points
    }

    fn collect_instance_points<'a>(
        &'a self,
        instance: &'a BlockInstance,
        parent: &Transform2D,
        sampler: &CurveSampler,
        max_depth: usize,
        path: &mut Vec<&'a str>,
        out: &mut Vec<Point2>,
    ) {
        if path.len() > max_depth || path.contains(&instance.name.as_str()) {
            return;
        }
        let Some(block) = self.blocks.get(&instance.name) else {
            return;
        };
        let transform = parent.then(&instance.local_transform(block.base_point));
        for entity in &block.entities {
            out.extend(sampler.sample_transformed(&entity.geometry, &transform));
        }

        path.push(instance.name.as_str());
        for child in &block.instances {
            self.collect_instance_points(child, &transform, sampler, max_depth, path, out);
        }
        path.pop();
    }
}

impl Default for Drawing {
    fn default() -> Self {
        Self::new("")
    }
}
