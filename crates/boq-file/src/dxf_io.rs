//! DXF文件导入
//!
//! 把 `dxf` crate 读出的图纸映射为引擎的输入模型：
//! - 图层表（ACI 颜色）
//! - 模型空间的 LINE/ARC/CIRCLE/LWPOLYLINE/POLYLINE/TEXT/MTEXT（图纸空间实体跳过）
//! - 模型空间与块定义中的 INSERT（含属性）
//! - `$INSUNITS` 单位比例
//!
//! HATCH 边界不在 `dxf` crate 的解析范围内，直接跳过。

use crate::error::FileError;
use boq_core::block::{Attribute, AttributeTag, BlockDefinition, BlockInstance};
use boq_core::drawing::Drawing;
use boq_core::entity::Entity;
use boq_core::geometry::{Arc, Circle, Geometry, Line, Polyline, PolylineVertex, Text};
use boq_core::layer::Layer;
use boq_core::math::Point2;
use boq_core::properties::{Color, ColorSpec};
use boq_core::units::Unit;
use dxf::entities::EntityType;
use std::path::Path;
use tracing::{debug, warn};

/// 从DXF文件导入
///
/// `unitless` 为 `$INSUNITS` 缺失或无法识别时假定的图纸单位。
pub fn import(path: &Path, unitless: Unit) -> Result<Drawing, FileError> {
    let source = dxf::Drawing::load_file(path).map_err(|e| FileError::Dxf(e.to_string()))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(convert_drawing(&source, name, unitless))
}

/// 转换已加载的 DXF 图纸
pub fn convert_drawing(source: &dxf::Drawing, name: impl Into<String>, unitless: Unit) -> Drawing {
    let name = name.into();
    let insunits = source.header.default_drawing_units as i32;
    let unit = Unit::from_insunits(insunits).unwrap_or_else(|| {
        warn!("{}: $INSUNITS={} 无法识别，按 {} 处理", name, insunits, unitless);
        unitless
    });
    let mut drawing = Drawing::new(name).with_scale_to_meters(unit.to_meters_factor());

    // 导入图层
    for layer in source.layers() {
        let color = layer
            .color
            .index()
            .map(|i| ColorSpec::Index(i16::from(i)))
            .unwrap_or(ColorSpec::Index(7));
        drawing.layers.add(Layer::new(&layer.name).with_color(color));
    }

    // 导入块定义
    for block in source.blocks() {
        let mut definition =
            BlockDefinition::new(&block.name, Point2::new(block.base_point.x, block.base_point.y))
                .with_description(block.description.trim());
        for entity in &block.entities {
            match &entity.specific {
                EntityType::Insert(insert) => definition.add_instance(convert_insert(entity, insert)),
                EntityType::AttributeDefinition(attdef) => {
                    if let Some(tag) = AttributeTag::parse(&attdef.text_tag) {
                        definition = definition.with_attribute_default(Attribute::new(tag, &attdef.value));
                    }
                }
                _ => {
                    if let Some(converted) = convert_entity(entity) {
                        definition.add_entity(converted);
                    }
                }
            }
        }
        if !drawing.blocks.add_block(definition) {
            debug!("重复的块定义 '{}' 被忽略", block.name);
        }
    }

    // 导入模型空间
    for entity in source.entities() {
        if entity.common.is_in_paper_space {
            continue;
        }
        if let EntityType::Insert(insert) = &entity.specific {
            drawing.add_instance(convert_insert(entity, insert));
        } else if let Some(converted) = convert_entity(entity) {
            drawing.add_entity(converted);
        }
    }

    debug!(
        "{}: 实体 {} 个，块参照 {} 个，块定义 {} 个，图层 {} 个",
        drawing.name,
        drawing.entities.len(),
        drawing.instances.len(),
        drawing.blocks.len(),
        drawing.layers.len()
    );
    drawing
}

fn point(p: &dxf::Point) -> Point2 {
    Point2::new(p.x, p.y)
}

/// 实体颜色：24 位真彩色优先，其次颜色索引
fn entity_color(entity: &dxf::entities::Entity) -> ColorSpec {
    let true_color = entity.common.color_24_bit;
    if true_color > 0 {
        return ColorSpec::True(Color::from_hex((true_color as u32) & 0x00FF_FFFF));
    }
    if entity.common.color.is_by_layer() {
        return ColorSpec::ByLayer;
    }
    entity
        .common
        .color
        .index()
        .map(|i| ColorSpec::Index(i16::from(i)))
        .unwrap_or(ColorSpec::ByLayer)
}

/// 把DXF实体转换为引擎实体，不支持的类型返回 `None`
fn convert_entity(entity: &dxf::entities::Entity) -> Option<Entity> {
    let geometry = match &entity.specific {
        EntityType::Line(line) => Geometry::Line(Line::new(point(&line.p1), point(&line.p2))),

        EntityType::Circle(circle) => {
            Geometry::Circle(Circle::new(point(&circle.center), circle.radius))
        }

        EntityType::Arc(arc) => Geometry::Arc(Arc::new(
            point(&arc.center),
            arc.radius,
            arc.start_angle.to_radians(),
            arc.end_angle.to_radians(),
        )),

        EntityType::LwPolyline(lwpoly) => {
            let vertices: Vec<PolylineVertex> = lwpoly
                .vertices
                .iter()
                .map(|v| PolylineVertex::with_bulge(Point2::new(v.x, v.y), v.bulge))
                .collect();
            Geometry::Polyline(Polyline::new(vertices, lwpoly.is_closed()))
        }

        EntityType::Polyline(poly) => {
            let vertices: Vec<PolylineVertex> = poly
                .vertices()
                .map(|v| PolylineVertex::with_bulge(point(&v.location), v.bulge))
                .collect();
            Geometry::Polyline(Polyline::new(vertices, poly.is_closed()))
        }

        EntityType::Text(text) => {
            Geometry::Text(Text::new(point(&text.location), text.value.clone(), text.text_height))
        }

        EntityType::MText(mtext) => Geometry::Text(Text::new(
            point(&mtext.insertion_point),
            mtext.text.replace("\\P", "\n"),
            mtext.initial_text_height,
        )),

        _ => return None,
    };

    Some(
        Entity::new(geometry)
            .with_layer(entity.common.layer.clone())
            .with_color(entity_color(entity)),
    )
}

/// 把 INSERT 转换为块参照，只保留可识别的属性标签
fn convert_insert(entity: &dxf::entities::Entity, insert: &dxf::entities::Insert) -> BlockInstance {
    let mut instance = BlockInstance::new(&insert.name, point(&insert.location))
        .with_scale(insert.x_scale_factor, insert.y_scale_factor)
        .with_rotation_degrees(insert.rotation)
        .with_layer(entity.common.layer.clone());
    for attribute in insert.attributes() {
        if let Some(tag) = AttributeTag::parse(&attribute.attribute_tag) {
            instance = instance.with_attribute(Attribute::new(tag, &attribute.value));
        }
    }
    instance
}
