//! 块定义和块参照系统
//!
//! 块是一组实体（以及嵌套块参照）的集合，可以被重复使用。
//! 块参照是块的一个实例，可以有自己的位置、旋转和缩放，并携带属性标签。
//! 块之间按名称引用，允许（错误地）形成环，遍历方负责防护。

use crate::entity::Entity;
use crate::math::Point2;
use crate::transform::Transform2D;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 可识别的属性标签
///
/// 其余标签在边界处直接丢弃。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeTag {
    Name,
    Room,
    Zone,
    Label,
    Title,
    Desc,
    Description,
    Note,
    Rem,
    Remark,
    Info,
    MetaDesc,
}

impl AttributeTag {
    /// 解析标签名（不区分大小写），未识别返回 `None`
    pub fn parse(tag: &str) -> Option<Self> {
        let tag = match tag.trim().to_uppercase().as_str() {
            "NAME" => Self::Name,
            "ROOM" => Self::Room,
            "ZONE" => Self::Zone,
            "LABEL" => Self::Label,
            "TITLE" => Self::Title,
            "DESC" => Self::Desc,
            "DESCRIPTION" => Self::Description,
            "NOTE" => Self::Note,
            "REM" => Self::Rem,
            "REMARK" => Self::Remark,
            "INFO" => Self::Info,
            "META_DESC" => Self::MetaDesc,
            _ => return None,
        };
        Some(tag)
    }

    /// 是否为区域名称标签
    pub fn is_zone_name(&self) -> bool {
        matches!(
            self,
            Self::Name | Self::Room | Self::Zone | Self::Label | Self::Title
        )
    }

    /// 是否为描述标签
    pub fn is_description(&self) -> bool {
        !self.is_zone_name()
    }
}

/// 属性值（标签 + 文本）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub tag: AttributeTag,
    pub value: String,
}

impl Attribute {
    pub fn new(tag: AttributeTag, value: impl Into<String>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }
}

/// 按顺序查找第一个满足条件且非空（去空白后）的属性值
fn first_matching(attributes: &[Attribute], pred: impl Fn(&AttributeTag) -> bool) -> Option<&str> {
    attributes
        .iter()
        .filter(|a| pred(&a.tag))
        .map(|a| a.value.trim())
        .find(|v| !v.is_empty())
}

/// 块定义
///
/// 块是一组实体的集合，定义在其自己的坐标系中
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDefinition {
    /// 块名称（必须唯一）
    pub name: String,
    /// 基点（插入点的参考）
    pub base_point: Point2,
    /// 块中的实体
    pub entities: Vec<Entity>,
    /// 块中的嵌套块参照
    pub instances: Vec<BlockInstance>,
    /// 块说明
    pub description: String,
    /// 属性定义的默认值
    pub attribute_defaults: Vec<Attribute>,
}

impl BlockDefinition {
    /// 创建新块
    pub fn new(name: impl Into<String>, base_point: Point2) -> Self {
        Self {
            name: name.into(),
            base_point,
            entities: Vec::new(),
            instances: Vec::new(),
            description: String::new(),
            attribute_defaults: Vec::new(),
        }
    }

    /// 添加实体到块
    pub fn add_entity(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    /// 添加嵌套块参照
    pub fn add_instance(&mut self, instance: BlockInstance) {
        self.instances.push(instance);
    }

    /// 设置说明
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 添加属性定义默认值
    pub fn with_attribute_default(mut self, attribute: Attribute) -> Self {
        self.attribute_defaults.push(attribute);
        self
    }

    /// 属性定义中第一个描述标签的默认值
    pub fn default_description(&self) -> Option<&str> {
        first_matching(&self.attribute_defaults, AttributeTag::is_description)
    }
}

/// 块参照
///
/// 块参照是块定义的一个实例，可以有位置、旋转和缩放
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockInstance {
    /// 参照的块名称
    pub name: String,
    /// 插入点
    pub insertion_point: Point2,
    /// X 方向缩放
    pub scale_x: f64,
    /// Y 方向缩放
    pub scale_y: f64,
    /// 旋转角度（弧度）
    pub rotation: f64,
    /// 所属图层
    pub layer: String,
    /// 已识别的属性
    pub attributes: Vec<Attribute>,
}

impl BlockInstance {
    /// 创建块参照
    pub fn new(name: impl Into<String>, insertion_point: Point2) -> Self {
        Self {
            name: name.into(),
            insertion_point,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            layer: "0".to_string(),
            attributes: Vec::new(),
        }
    }

    /// 设置缩放
    pub fn with_scale(mut self, scale_x: f64, scale_y: f64) -> Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    /// 设置旋转（度）
    pub fn with_rotation_degrees(mut self, degrees: f64) -> Self {
        self.rotation = degrees.to_radians();
        self
    }

    /// 设置图层
    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = layer.into();
        self
    }

    /// 添加属性
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// 是否为外部参照（名称形如 `xref|block`）
    pub fn is_xref(&self) -> bool {
        self.name.contains('|')
    }

    /// 从块坐标到父坐标的变换
    pub fn local_transform(&self, base_point: Point2) -> Transform2D {
        Transform2D::placement(
            self.insertion_point,
            base_point,
            self.scale_x,
            self.scale_y,
            self.rotation,
        )
    }

    /// 第一个非空的区域名称属性
    pub fn zone_name(&self) -> Option<&str> {
        first_matching(&self.attributes, AttributeTag::is_zone_name)
    }

    /// 第一个非空的描述属性
    pub fn description(&self) -> Option<&str> {
        first_matching(&self.attributes, AttributeTag::is_description)
    }
}

/// 块表 - 管理所有块定义
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockTable {
    /// 块定义（按名称索引）
    blocks: HashMap<String, BlockDefinition>,
}

impl BlockTable {
    /// 创建空的块表
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加块定义，名称重复时返回 false
    pub fn add_block(&mut self, block: BlockDefinition) -> bool {
        if self.blocks.contains_key(&block.name) {
            false
        } else {
            self.blocks.insert(block.name.clone(), block);
            true
        }
    }

    /// 获取块定义
    pub fn get(&self, name: &str) -> Option<&BlockDefinition> {
        self.blocks.get(name)
    }

    /// 检查块是否存在
    pub fn contains(&self, name: &str) -> bool {
        self.blocks.contains_key(name)
    }

    /// 获取块数量
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// 块参照的描述：参照属性，其次块说明，再次属性定义默认值
    pub fn description_of(&self, instance: &BlockInstance) -> String {
        if let Some(desc) = instance.description() {
            return desc.to_string();
        }
        let Some(block) = self.get(&instance.name) else {
            return String::new();
        };
        let own = block.description.trim();
        if !own.is_empty() {
            return own.to_string();
        }
        block.default_description().unwrap_or("").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Geometry, Line};

    #[test]
    fn test_block_creation() {
        let mut block = BlockDefinition::new("TestBlock", Point2::origin());
        let line = Line::new(Point2::new(0.0, 0.0), Point2::new(10.0, 10.0));
        block.add_entity(Entity::new(Geometry::Line(line)));
        block.add_instance(BlockInstance::new("Child", Point2::origin()));

        assert_eq!(block.name, "TestBlock");
        assert_eq!(block.entities.len(), 1);
        assert_eq!(block.instances.len(), 1);
    }

    #[test]
    fn test_block_table() {
        let mut table = BlockTable::new();
        assert!(table.add_block(BlockDefinition::new("Block1", Point2::origin())));
        assert!(table.add_block(BlockDefinition::new("Block2", Point2::new(10.0, 10.0))));
        assert!(!table.add_block(BlockDefinition::new("Block1", Point2::origin()))); // 重复名称

        assert_eq!(table.len(), 2);
        assert!(table.contains("Block2"));
    }

    #[test]
    fn test_attribute_tag_parsing() {
        assert_eq!(AttributeTag::parse("room"), Some(AttributeTag::Room));
        assert_eq!(AttributeTag::parse(" META_DESC "), Some(AttributeTag::MetaDesc));
        assert_eq!(AttributeTag::parse("PART_NO"), None);
        assert!(AttributeTag::Title.is_zone_name());
        assert!(AttributeTag::Remark.is_description());
    }

    #[test]
    fn test_zone_name_skips_blank_values() {
        let ins = BlockInstance::new("ROOM_BOX", Point2::origin())
            .with_attribute(Attribute::new(AttributeTag::Desc, "ignored"))
            .with_attribute(Attribute::new(AttributeTag::Name, "   "))
            .with_attribute(Attribute::new(AttributeTag::Room, " Lobby "));
        assert_eq!(ins.zone_name(), Some("Lobby"));
        assert_eq!(ins.description(), Some("ignored"));
    }

    #[test]
    fn test_description_chain() {
        let mut table = BlockTable::new();
        table.add_block(
            BlockDefinition::new("CHAIR", Point2::origin())
                .with_attribute_default(Attribute::new(AttributeTag::Note, "default note")),
        );
        table.add_block(
            BlockDefinition::new("DESK", Point2::origin()).with_description("oak desk"),
        );

        let chair = BlockInstance::new("CHAIR", Point2::origin());
        assert_eq!(table.description_of(&chair), "default note");

        let desk = BlockInstance::new("DESK", Point2::origin());
        assert_eq!(table.description_of(&desk), "oak desk");

        let tagged = BlockInstance::new("DESK", Point2::origin())
            .with_attribute(Attribute::new(AttributeTag::Info, "custom"));
        assert_eq!(table.description_of(&tagged), "custom");

        let unknown = BlockInstance::new("NOPE", Point2::origin());
        assert_eq!(table.description_of(&unknown), "");
    }

    #[test]
    fn test_xref_detection() {
        assert!(BlockInstance::new("site|tree", Point2::origin()).is_xref());
        assert!(!BlockInstance::new("tree", Point2::origin()).is_xref());
    }
}
