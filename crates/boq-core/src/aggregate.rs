//! 块参照汇总
//!
//! 遍历模型空间的顶层块参照及其嵌套块参照，每个块参照生成一条成员记录
//! （数量 1，最小外接矩形尺寸，描述），再按 (块名, 分类, 原始图层, 区域)
//! 分组，数量求和、尺寸取中位数。
//!
//! 嵌套遍历带深度上限，并拒绝进入当前路径上已经出现过的块，
//! 因此自引用的块定义不会无限递归，也不会重复计数。

use crate::block::BlockInstance;
use crate::config::EngineConfig;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::drawing::Drawing;
use crate::extent::{oriented_extent, Extent};
use crate::row::{DetailRow, INSERT_ENTITY_TYPE};
use crate::sampling::CurveSampler;
use crate::transform::Transform2D;
use crate::units::{round_to, UnitScale};
use crate::zone::ZoneSet;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// 空图层名对应的分类
pub const MISC_LAYER: &str = "misc";

/// 图层名为空时归为 `misc`
pub fn layer_or_misc(layer: &str) -> &str {
    let trimmed = layer.trim();
    if trimmed.is_empty() {
        MISC_LAYER
    } else {
        trimmed
    }
}

/// 嵌套块参照的有效图层：图层为空或为 "0" 时继承父级
fn resolve_child_layer(child: &str, parent: &str) -> String {
    let child = child.trim();
    if child.is_empty() || child == "0" {
        parent.to_string()
    } else {
        child.to_string()
    }
}

/// 单个块参照（顶层或嵌套）的成员记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Member {
    pub name: String,
    /// 有效图层
    pub layer: String,
    /// 分组用分类
    pub category: String,
    /// 顶层块参照的原始图层（小写、去空白）
    pub category1: String,
    pub zone: String,
    /// 数量（每个块参照计 1）
    pub quantity: f64,
    /// 目标单位下的尺寸，无几何时为 `None`
    pub extent: Option<Extent>,
    pub description: String,
}

/// 分组键
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupKey {
    pub name: String,
    pub category: String,
    pub category1: String,
    pub zone: String,
}

/// 分组后的汇总记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedGroup {
    pub key: GroupKey,
    pub quantity: f64,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub description: String,
}

#[derive(Debug, Default)]
struct GroupAccumulator {
    quantity: f64,
    lengths: Vec<f64>,
    widths: Vec<f64>,
    description: String,
}

/// 中位数，偶数个时取中间两个的平均值
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) * 0.5)
    } else {
        Some(sorted[mid])
    }
}

/// 按键分组并归约
pub fn group_members(members: &[Member]) -> Vec<AggregatedGroup> {
    let mut groups: BTreeMap<GroupKey, GroupAccumulator> = BTreeMap::new();
    for member in members {
        let key = GroupKey {
            name: member.name.clone(),
            category: member.category.clone(),
            category1: member.category1.clone(),
            zone: member.zone.clone(),
        };
        let acc = groups.entry(key).or_default();
        acc.quantity += member.quantity;
        // 退化尺寸（长或宽为 0）不参与中位数
        if let Some(extent) = member.extent.filter(|e| e.length > 0.0 && e.width > 0.0) {
            acc.lengths.push(extent.length);
            acc.widths.push(extent.width);
        }
        if acc.description.is_empty() && !member.description.is_empty() {
            acc.description = member.description.clone();
        }
    }

    groups
        .into_iter()
        .map(|(key, acc)| AggregatedGroup {
            key,
            quantity: acc.quantity,
            length: median(&acc.lengths),
            width: median(&acc.widths),
            description: acc.description,
        })
        .collect()
}

/// 一个顶层块参照下嵌套组件的数量
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentCount {
    /// 顶层块名
    pub name: String,
    pub zone: String,
    /// 嵌套块名 -> 数量
    pub components: BTreeMap<String, usize>,
}

impl ComponentCount {
    /// 嵌套组件总数
    pub fn total(&self) -> usize {
        self.components.values().sum()
    }
}

/// 遍历中的一个节点
struct Node<'d> {
    instance: &'d BlockInstance,
    transform: Transform2D,
    layer: String,
    depth: usize,
}

/// 块参照汇总器
pub struct InstanceAggregator<'a> {
    drawing: &'a Drawing,
    config: &'a EngineConfig,
    zones: &'a ZoneSet,
    sampler: CurveSampler,
    scale: UnitScale,
}

impl<'a> InstanceAggregator<'a> {
    pub fn new(drawing: &'a Drawing, config: &'a EngineConfig, zones: &'a ZoneSet) -> Self {
        Self {
            drawing,
            config,
            zones,
            sampler: CurveSampler::from_config(config),
            scale: UnitScale::new(drawing.scale_to_meters, config.target_units),
        }
    }

    /// 参与统计的顶层块参照：不在区域图层上，外部参照按配置过滤
    fn roots(&self) -> impl Iterator<Item = &'a BlockInstance> + '_ {
        self.drawing.instances.iter().filter(|ins| {
            !self.config.is_planner_layer(&ins.layer)
                && (self.config.include_xrefs || !ins.is_xref())
        })
    }

    /// 根块参照所在区域：插入点优先，其次展开几何的包围盒中心
    fn root_zone(&self, instance: &BlockInstance) -> String {
        if let Some(zone) = self.zones.zone_for_point(&instance.insertion_point) {
            return zone.to_string();
        }
        let points = self.drawing.instance_points(
            instance,
            &Transform2D::identity(),
            &self.sampler,
            self.config.max_nested_depth,
        );
        self.zones.zone_for_points(&points)
    }

    /// 深度优先遍历，`path` 为当前路径上的块名
    fn walk<'d>(
        &'d self,
        node: Node<'d>,
        path: &mut Vec<&'d str>,
        diagnostics: &mut Diagnostics,
        visit: &mut dyn FnMut(&Node<'d>),
    ) where
        'a: 'd,
    {
        let name = node.instance.name.as_str();
        if path.contains(&name) {
            diagnostics.push(DiagnosticKind::CyclicReference {
                name: name.to_string(),
                depth: node.depth,
            });
            return;
        }
        visit(&node);

        let Some(block) = self.drawing.blocks.get(name) else {
            diagnostics.push(DiagnosticKind::MissingBlock {
                name: name.to_string(),
            });
            return;
        };

        let transform = node
            .transform
            .then(&node.instance.local_transform(block.base_point));
        path.push(name);
        for child in &block.instances {
            if !self.config.include_xrefs && child.is_xref() {
                continue;
            }
            let depth = node.depth + 1;
            if depth > self.config.max_nested_depth {
                diagnostics.push(DiagnosticKind::DepthExceeded {
                    name: child.name.clone(),
                    depth,
                });
                continue;
            }
            let child_node = Node {
                instance: child,
                transform,
                layer: resolve_child_layer(&child.layer, &node.layer),
                depth,
            };
            self.walk(child_node, path, diagnostics, visit);
        }
        path.pop();
    }

    /// 生成所有成员记录（顶层块参照在前，随后是其嵌套块参照）
    pub fn members(&self, diagnostics: &mut Diagnostics) -> Vec<Member> {
        let mut members = Vec::new();
        for root in self.roots() {
            let zone = self.root_zone(root);
            let category1 = root.layer.trim().to_lowercase();
            let node = Node {
                instance: root,
                transform: Transform2D::identity(),
                layer: root.layer.clone(),
                depth: 0,
            };
            let mut path = Vec::new();
            self.walk(node, &mut path, diagnostics, &mut |n| {
                if self.config.is_planner_layer(&n.layer) {
                    return;
                }
                members.push(self.member(n, &zone, &category1));
            });
        }
        debug!("块参照成员 {} 条", members.len());
        members
    }

    fn member(&self, node: &Node<'_>, zone: &str, category1: &str) -> Member {
        let instance = node.instance;
        let points = self.drawing.instance_points(
            instance,
            &node.transform,
            &self.sampler,
            self.config.max_nested_depth.saturating_sub(node.depth),
        );
        let extent = (!points.is_empty()).then(|| {
            let e = oriented_extent(&points);
            Extent::new(self.scale.length(e.length), self.scale.length(e.width))
        });

        let category = if self.config.force_planner_category && !zone.is_empty() {
            self.config.planner_layer.clone()
        } else {
            layer_or_misc(&node.layer).to_string()
        };

        Member {
            name: instance.name.clone(),
            layer: node.layer.clone(),
            category,
            category1: category1.to_string(),
            zone: zone.to_string(),
            quantity: 1.0,
            extent,
            description: self.drawing.blocks.description_of(instance),
        }
    }

    /// 每个顶层块参照下嵌套组件的数量（按嵌套块名计数，递归）
    pub fn component_counts(&self, diagnostics: &mut Diagnostics) -> Vec<ComponentCount> {
        let mut counts = Vec::new();
        for root in self.roots() {
            let node = Node {
                instance: root,
                transform: Transform2D::identity(),
                layer: root.layer.clone(),
                depth: 0,
            };
            let mut components: BTreeMap<String, usize> = BTreeMap::new();
            let mut path = Vec::new();
            self.walk(node, &mut path, diagnostics, &mut |n| {
                if n.depth > 0 {
                    *components.entry(n.instance.name.clone()).or_default() += 1;
                }
            });
            if !components.is_empty() {
                counts.push(ComponentCount {
                    name: root.name.clone(),
                    zone: self.root_zone(root),
                    components,
                });
            }
        }
        counts
    }

    /// 生成明细行：汇总模式下每组一行，否则每个成员一行
    pub fn rows(&self, diagnostics: &mut Diagnostics) -> Vec<DetailRow> {
        let members = self.members(diagnostics);
        let decimals = self.config.decimals;
        let round = |v: Option<f64>| v.map(|x| round_to(x, decimals));

        if !self.config.aggregate_instances {
            return members
                .into_iter()
                .map(|m| DetailRow {
                    entity_type: INSERT_ENTITY_TYPE.to_string(),
                    category: m.category,
                    zone: m.zone,
                    category1: m.category1,
                    name: m.name,
                    qty_type: "count".to_string(),
                    qty_value: round_to(m.quantity, decimals),
                    length: round(m.extent.map(|e| e.length)),
                    width: round(m.extent.map(|e| e.width)),
                    description: m.description,
                    remarks: format!("dwg_layer={}; aggregated 1 inserts", m.layer),
                })
                .collect();
        }

        group_members(&members)
            .into_iter()
            .map(|g| DetailRow {
                entity_type: INSERT_ENTITY_TYPE.to_string(),
                remarks: format!("aggregated {} inserts", g.quantity),
                category: g.key.category,
                zone: g.key.zone,
                category1: g.key.category1,
                name: g.key.name,
                qty_type: "count".to_string(),
                qty_value: round_to(g.quantity, decimals),
                length: round(g.length),
                width: round(g.width),
                description: g.description,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Attribute, AttributeTag, BlockDefinition};
    use crate::entity::Entity;
    use crate::geometry::{Geometry, Polyline};
    use crate::math::Point2;
    use crate::units::Unit;
    use crate::zone::Zone;
    use approx::assert_relative_eq;

    fn rect_block(name: &str, length: f64, width: f64) -> BlockDefinition {
        let mut block = BlockDefinition::new(name, Point2::origin());
        block.add_entity(Entity::new(Geometry::Polyline(Polyline::from_points(
            [
                Point2::new(0.0, 0.0),
                Point2::new(length, 0.0),
                Point2::new(length, width),
                Point2::new(0.0, width),
            ],
            true,
        ))));
        block
    }

    fn metre_config() -> EngineConfig {
        EngineConfig {
            target_units: Unit::Meter,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[10.0, 12.0]), Some(11.0));
    }

    #[test]
    fn test_two_placements_form_one_group() {
        let mut drawing = Drawing::new("agg");
        drawing.blocks.add_block(rect_block("DESK", 1.0, 1.0));
        // 同一块以不同缩放放置：10x4 与 12x6
        drawing.add_instance(
            BlockInstance::new("DESK", Point2::new(0.0, 0.0))
                .with_scale(10.0, 4.0)
                .with_layer("Furniture"),
        );
        drawing.add_instance(
            BlockInstance::new("DESK", Point2::new(100.0, 0.0))
                .with_scale(12.0, 6.0)
                .with_rotation_degrees(30.0)
                .with_layer("Furniture"),
        );

        let config = metre_config();
        let zones = ZoneSet::default();
        let mut diagnostics = Diagnostics::new();
        let aggregator = InstanceAggregator::new(&drawing, &config, &zones);
        let groups = group_members(&aggregator.members(&mut diagnostics));

        assert_eq!(groups.len(), 1);
        let g = &groups[0];
        assert_eq!(g.key.category, "Furniture");
        assert_eq!(g.key.category1, "furniture");
        assert_eq!(g.quantity, 2.0);
        assert_relative_eq!(g.length.unwrap(), 11.0, epsilon = 1e-9);
        assert_relative_eq!(g.width.unwrap(), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_degenerate_placement_skipped_in_median() {
        let mut drawing = Drawing::new("flat");
        drawing.blocks.add_block(rect_block("DESK", 1.0, 1.0));
        drawing.add_instance(
            BlockInstance::new("DESK", Point2::new(0.0, 0.0))
                .with_scale(10.0, 4.0)
                .with_layer("F"),
        );
        // 压扁的放置：宽度为 0
        drawing.add_instance(
            BlockInstance::new("DESK", Point2::new(50.0, 0.0))
                .with_scale(12.0, 0.0)
                .with_layer("F"),
        );

        let config = metre_config();
        let zones = ZoneSet::default();
        let mut diagnostics = Diagnostics::new();
        let aggregator = InstanceAggregator::new(&drawing, &config, &zones);
        let members = aggregator.members(&mut diagnostics);
        assert!(members.iter().all(|m| m.quantity == 1.0));

        let groups = group_members(&members);
        assert_eq!(groups.len(), 1);
        let g = &groups[0];
        assert_eq!(g.quantity, 2.0);
        assert_relative_eq!(g.length.unwrap(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(g.width.unwrap(), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_group_quantity_sums_member_quantities() {
        let member = |quantity: f64| Member {
            name: "BENCH".to_string(),
            layer: "F".to_string(),
            category: "F".to_string(),
            category1: "f".to_string(),
            zone: String::new(),
            quantity,
            extent: None,
            description: String::new(),
        };
        let groups = group_members(&[member(1.0), member(2.5)]);
        assert_eq!(groups.len(), 1);
        assert_relative_eq!(groups[0].quantity, 3.5);
        assert_eq!(groups[0].length, None);
    }

    #[test]
    fn test_self_reference_terminates_without_double_count() {
        let mut drawing = Drawing::new("cycle");
        let mut a = rect_block("A", 1.0, 1.0);
        a.add_instance(BlockInstance::new("A", Point2::new(2.0, 0.0)));
        a.add_instance(BlockInstance::new("B", Point2::new(4.0, 0.0)));
        let mut b = rect_block("B", 1.0, 1.0);
        b.add_instance(BlockInstance::new("A", Point2::new(2.0, 0.0)));
        drawing.blocks.add_block(a);
        drawing.blocks.add_block(b);
        drawing.add_instance(BlockInstance::new("A", Point2::origin()).with_layer("X"));

        let config = metre_config();
        let zones = ZoneSet::default();
        let mut diagnostics = Diagnostics::new();
        let aggregator = InstanceAggregator::new(&drawing, &config, &zones);
        let members = aggregator.members(&mut diagnostics);

        let names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        let cycles = diagnostics
            .entries()
            .iter()
            .filter(|d| matches!(d, DiagnosticKind::CyclicReference { .. }))
            .count();
        assert_eq!(cycles, 2);
    }

    #[test]
    fn test_depth_limit_truncates_chain() {
        let mut drawing = Drawing::new("deep");
        for i in 0..5 {
            let mut block = rect_block(&format!("L{i}"), 1.0, 1.0);
            block.add_instance(BlockInstance::new(format!("L{}", i + 1), Point2::origin()));
            drawing.blocks.add_block(block);
        }
        drawing.blocks.add_block(rect_block("L5", 1.0, 1.0));
        drawing.add_instance(BlockInstance::new("L0", Point2::origin()).with_layer("X"));

        let config = EngineConfig {
            max_nested_depth: 2,
            ..metre_config()
        };
        let zones = ZoneSet::default();
        let mut diagnostics = Diagnostics::new();
        let members = InstanceAggregator::new(&drawing, &config, &zones).members(&mut diagnostics);

        assert_eq!(members.len(), 3);
        assert!(diagnostics
            .entries()
            .iter()
            .any(|d| matches!(d, DiagnosticKind::DepthExceeded { depth: 3, .. })));
    }

    #[test]
    fn test_nested_members_inherit_zone_layer_and_category1() {
        let mut drawing = Drawing::new("nested");
        let mut table = rect_block("TABLE", 2.0, 1.0);
        table.add_instance(BlockInstance::new("CHAIR", Point2::new(0.0, -0.5)).with_layer("0"));
        table.add_instance(BlockInstance::new("CHAIR", Point2::new(1.0, -0.5)).with_layer("Seats"));
        table.add_instance(BlockInstance::new("MARK", Point2::new(1.0, 1.0)).with_layer("planner"));
        drawing.blocks.add_block(table);
        drawing.blocks.add_block(rect_block("CHAIR", 0.5, 0.5));
        drawing.blocks.add_block(rect_block("MARK", 0.1, 0.1));
        drawing.add_instance(BlockInstance::new("TABLE", Point2::new(5.0, 5.0)).with_layer("Furn"));

        let zones = ZoneSet::new(vec![Zone::new(
            "Hall",
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(20.0, 0.0),
                Point2::new(20.0, 20.0),
                Point2::new(0.0, 20.0),
            ],
        )]);
        let config = EngineConfig {
            force_planner_category: false,
            ..metre_config()
        };
        let mut diagnostics = Diagnostics::new();
        let aggregator = InstanceAggregator::new(&drawing, &config, &zones);
        let members = aggregator.members(&mut diagnostics);

        let summary: Vec<(&str, &str, &str, &str)> = members
            .iter()
            .map(|m| (m.name.as_str(), m.layer.as_str(), m.category1.as_str(), m.zone.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("TABLE", "Furn", "furn", "Hall"),
                ("CHAIR", "Furn", "furn", "Hall"),
                ("CHAIR", "Seats", "furn", "Hall"),
            ]
        );

        let counts = aggregator.component_counts(&mut diagnostics);
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].components.get("CHAIR"), Some(&2));
        assert_eq!(counts[0].components.get("MARK"), Some(&1));
        assert_eq!(counts[0].total(), 3);
    }

    #[test]
    fn test_planner_category_forced_inside_zone() {
        let mut drawing = Drawing::new("forced");
        drawing.blocks.add_block(rect_block("BIN", 1.0, 1.0));
        drawing.add_instance(BlockInstance::new("BIN", Point2::new(1.0, 1.0)).with_layer("Waste"));
        drawing.add_instance(BlockInstance::new("BIN", Point2::new(50.0, 50.0)).with_layer(""));
        // 区域图层与外部参照不参与统计
        drawing.add_instance(BlockInstance::new("BIN", Point2::new(1.0, 1.0)).with_layer("PLANNER"));
        drawing.add_instance(BlockInstance::new("site|BIN", Point2::new(1.0, 1.0)));

        let zones = ZoneSet::new(vec![Zone::new(
            "Yard",
            vec![Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), Point2::new(0.0, 10.0)],
        )]);
        let config = metre_config();
        let mut diagnostics = Diagnostics::new();
        let rows = InstanceAggregator::new(&drawing, &config, &zones).rows(&mut diagnostics);

        assert_eq!(rows.len(), 2);
        let inside = rows.iter().find(|r| r.zone == "Yard").unwrap();
        assert_eq!(inside.category, "PLANNER");
        assert_eq!(inside.category1, "waste");
        assert_eq!(inside.remarks, "aggregated 1 inserts");
        let outside = rows.iter().find(|r| r.zone.is_empty()).unwrap();
        assert_eq!(outside.category, MISC_LAYER);
    }

    #[test]
    fn test_unaggregated_rows_and_description() {
        let mut drawing = Drawing::new("flat");
        drawing
            .blocks
            .add_block(rect_block("LAMP", 1.0, 1.0).with_description("floor lamp"));
        let tagged = BlockInstance::new("LAMP", Point2::origin())
            .with_layer("Light")
            .with_attribute(Attribute::new(AttributeTag::Desc, "brass"));
        drawing.add_instance(tagged);
        drawing.add_instance(BlockInstance::new("LAMP", Point2::new(3.0, 0.0)).with_layer("Light"));

        let config = EngineConfig {
            aggregate_instances: false,
            ..metre_config()
        };
        let zones = ZoneSet::default();
        let rows = InstanceAggregator::new(&drawing, &config, &zones).rows(&mut Diagnostics::new());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].description, "brass");
        assert_eq!(rows[1].description, "floor lamp");
        assert_eq!(rows[0].remarks, "dwg_layer=Light; aggregated 1 inserts");
        assert_eq!(rows[0].length, Some(1.0));
    }

    #[test]
    fn test_missing_block_still_counts_without_dimensions() {
        let mut drawing = Drawing::new("missing");
        drawing.add_instance(BlockInstance::new("GHOST", Point2::origin()).with_layer("X"));
        let config = metre_config();
        let zones = ZoneSet::default();
        let mut diagnostics = Diagnostics::new();
        let rows = InstanceAggregator::new(&drawing, &config, &zones).rows(&mut diagnostics);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].length, None);
        assert!(matches!(
            diagnostics.entries()[0],
            DiagnosticKind::MissingBlock { .. }
        ));
    }
}
