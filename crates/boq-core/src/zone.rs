//! 区域划分
//!
//! 区域是带名称的闭合多边形。构建顺序：
//! 1. 区域图层上的块参照，取其展开后的轴对齐包围盒作为矩形区域；
//! 2. 若没有得到任何区域，再用区域图层上的闭合多段线作边界，
//!    以模型空间中的文本作为名称。
//!
//! 查询时按区域顺序做射线法判断，返回第一个包含该点的区域。

use crate::config::EngineConfig;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::drawing::Drawing;
use crate::geometry::{vertex_centroid, Geometry};
use crate::math::{BoundingBox2, Point2, EPSILON, VERTEX_TOLERANCE};
use crate::sampling::CurveSampler;
use crate::transform::Transform2D;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// 命名区域
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    /// 归一化后的顶点环（首尾不重复，至少三个顶点）
    pub polygon: Vec<Point2>,
}

impl Zone {
    pub fn new(name: impl Into<String>, polygon: Vec<Point2>) -> Self {
        Self {
            name: name.into(),
            polygon,
        }
    }

    pub fn contains(&self, point: &Point2) -> bool {
        point_in_polygon(point, &self.polygon)
    }
}

/// 射线法判断点是否在多边形内
///
/// 边的 y 区间按半开处理，点恰好在水平边界上时结果取决于边的方向。
pub fn point_in_polygon(point: &Point2, polygon: &[Point2]) -> bool {
    let n = polygon.len();
    let mut inside = false;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        if (a.y > point.y) != (b.y > point.y) {
            let x_cross = (b.x - a.x) * (point.y - a.y) / (b.y - a.y + EPSILON) + a.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

/// 多边形归一化：去除连续重复顶点（容差内），去掉与首点重合的闭合点
pub fn normalize_polygon(points: &[Point2]) -> Vec<Point2> {
    let same = |a: &Point2, b: &Point2| {
        (a.x - b.x).abs() <= VERTEX_TOLERANCE && (a.y - b.y).abs() <= VERTEX_TOLERANCE
    };
    let mut ring: Vec<Point2> = Vec::with_capacity(points.len());
    for p in points {
        if ring.last().map_or(true, |last| !same(last, p)) {
            ring.push(*p);
        }
    }
    if ring.len() > 2 && same(&ring[0], &ring[ring.len() - 1]) {
        ring.pop();
    }
    ring
}

/// 文档的区域集合，构建后只读
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneSet {
    zones: Vec<Zone>,
}

impl ZoneSet {
    pub fn new(zones: Vec<Zone>) -> Self {
        Self { zones }
    }

    /// 包含该点的第一个区域名称
    pub fn zone_for_point(&self, point: &Point2) -> Option<&str> {
        self.zones
            .iter()
            .find(|z| z.contains(point))
            .map(|z| z.name.as_str())
    }

    /// 点集包围盒中心所在的区域，无点或不在任何区域时为空字符串
    pub fn zone_for_points(&self, points: &[Point2]) -> String {
        BoundingBox2::from_points(points.iter().copied())
            .and_then(|bbox| self.zone_for_point(&bbox.center()))
            .unwrap_or("")
            .to_string()
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

/// 区域标签（文本首行）
#[derive(Debug, Clone, PartialEq)]
struct Label {
    text: String,
    position: Point2,
}

/// 区域构建器
pub struct ZoneClassifier<'a> {
    drawing: &'a Drawing,
    config: &'a EngineConfig,
    sampler: CurveSampler,
}

impl<'a> ZoneClassifier<'a> {
    pub fn new(drawing: &'a Drawing, config: &'a EngineConfig) -> Self {
        Self {
            drawing,
            config,
            sampler: CurveSampler::from_config(config),
        }
    }

    /// 构建区域集合：块参照区域优先，没有时退回边界加标签
    pub fn build(&self, diagnostics: &mut Diagnostics) -> ZoneSet {
        let from_instances = self.zones_from_instances(diagnostics);
        if !from_instances.is_empty() {
            debug!("从区域块参照得到 {} 个区域", from_instances.len());
            return ZoneSet::new(from_instances);
        }
        let from_boundaries = self.zones_from_boundaries(diagnostics);
        debug!("从区域边界得到 {} 个区域", from_boundaries.len());
        ZoneSet::new(from_boundaries)
    }

    fn zones_from_instances(&self, diagnostics: &mut Diagnostics) -> Vec<Zone> {
        let mut zones: Vec<Zone> = Vec::new();
        for instance in self
            .drawing
            .instances
            .iter()
            .filter(|i| self.config.is_planner_layer(&i.layer))
        {
            let points = self.drawing.instance_points(
                instance,
                &Transform2D::identity(),
                &self.sampler,
                self.config.max_nested_depth,
            );
            let Some(bbox) = BoundingBox2::from_points(points) else {
                continue;
            };
            let ring = normalize_polygon(&bbox.corners());
            if ring.len() < 3 {
                diagnostics.push(DiagnosticKind::DegenerateZone {
                    layer: instance.layer.clone(),
                });
                continue;
            }

            let name = instance
                .zone_name()
                .map(str::to_string)
                .or_else(|| {
                    let block_name = instance.name.trim();
                    (!block_name.is_empty()).then(|| block_name.to_string())
                })
                .unwrap_or_else(|| "Zone".to_string());

            let zone = Zone::new(name, ring);
            if !zones.contains(&zone) {
                zones.push(zone);
            }
        }
        zones
    }

    fn zones_from_boundaries(&self, diagnostics: &mut Diagnostics) -> Vec<Zone> {
        let mut rings: Vec<Vec<Point2>> = Vec::new();
        for entity in &self.drawing.entities {
            let Geometry::Polyline(polyline) = &entity.geometry else {
                continue;
            };
            if !polyline.closed || !self.config.is_planner_layer(&entity.layer) {
                continue;
            }
            let ring = normalize_polygon(&self.sampler.sample_polyline(polyline));
            if ring.len() < 3 {
                diagnostics.push(DiagnosticKind::DegenerateZone {
                    layer: entity.layer.clone(),
                });
                continue;
            }
            rings.push(ring);
        }
        if rings.is_empty() {
            return Vec::new();
        }

        let labels = self.collect_labels();
        let mut used = vec![false; labels.len()];
        rings
            .into_iter()
            .enumerate()
            .map(|(i, ring)| {
                let name = take_label(&ring, &labels, &mut used)
                    .unwrap_or_else(|| format!("Zone {:02}", i + 1));
                Zone::new(name, ring)
            })
            .collect()
    }

    /// 模型空间中的文本标签，按 (y 降序, x 升序, 文本) 排序
    fn collect_labels(&self) -> Vec<Label> {
        let mut labels: Vec<Label> = self
            .drawing
            .entities
            .iter()
            .filter_map(|e| match &e.geometry {
                Geometry::Text(text) => {
                    let label = text.label();
                    (!label.is_empty()).then(|| Label {
                        text: label.to_string(),
                        position: text.position,
                    })
                }
                _ => None,
            })
            .collect();
        labels.sort_by(|a, b| {
            b.position
                .y
                .total_cmp(&a.position.y)
                .then_with(|| a.position.x.total_cmp(&b.position.x))
                .then_with(|| a.text.cmp(&b.text))
        });
        labels
    }
}

/// 为边界选取标签：先找落在内部的第一个未用标签，否则取离顶点平均值最近的未用标签
fn take_label(ring: &[Point2], labels: &[Label], used: &mut [bool]) -> Option<String> {
    let inside = labels
        .iter()
        .enumerate()
        .find(|(i, l)| !used[*i] && point_in_polygon(&l.position, ring))
        .map(|(i, _)| i);

    let chosen = inside.or_else(|| {
        let centroid = vertex_centroid(ring)?;
        labels
            .iter()
            .enumerate()
            .filter(|(i, _)| !used[*i])
            .map(|(i, l)| (i, (l.position - centroid).norm_squared()))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
            .map(|(i, _)| i)
    })?;

    used[chosen] = true;
    Some(labels[chosen].text.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Attribute, AttributeTag, BlockDefinition, BlockInstance};
    use crate::entity::Entity;
    use crate::geometry::{Line, Polyline, Text};

    fn square(x: f64, y: f64, size: f64) -> Vec<Point2> {
        vec![
            Point2::new(x, y),
            Point2::new(x + size, y),
            Point2::new(x + size, y + size),
            Point2::new(x, y + size),
        ]
    }

    fn planner_boundary(x: f64, y: f64, size: f64) -> Entity {
        Entity::new(Geometry::Polyline(Polyline::from_points(square(x, y, size), true)))
            .with_layer("PLANNER")
    }

    fn text(x: f64, y: f64, content: &str) -> Entity {
        Entity::new(Geometry::Text(Text::new(Point2::new(x, y), content, 1.0))).with_layer("TEXT")
    }

    #[test]
    fn test_point_in_polygon() {
        let poly = vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(12.0, 8.0),
            Point2::new(2.0, 9.0),
        ];
        let centroid = vertex_centroid(&poly).unwrap();
        assert!(point_in_polygon(&centroid, &poly));
        assert!(!point_in_polygon(&Point2::new(100.0, 100.0), &poly));
        assert!(!point_in_polygon(&Point2::new(-1.0, 4.0), &poly));
    }

    #[test]
    fn test_normalize_polygon() {
        let raw = vec![
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0 + 1e-12),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 0.0),
        ];
        let ring = normalize_polygon(&raw);
        assert_eq!(ring.len(), 3);
        assert_ne!(ring[0], ring[ring.len() - 1]);
    }

    #[test]
    fn test_zones_from_planner_instances() {
        let mut drawing = Drawing::new("zones");
        let mut room = BlockDefinition::new("ROOM_BOX", Point2::origin());
        room.add_entity(Entity::new(Geometry::Line(Line::new(
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 5.0),
        ))));
        drawing.blocks.add_block(room);

        let named = BlockInstance::new("ROOM_BOX", Point2::origin())
            .with_layer("planner")
            .with_attribute(Attribute::new(AttributeTag::Room, "Kitchen"));
        let unnamed = BlockInstance::new("ROOM_BOX", Point2::new(20.0, 0.0)).with_layer("PLANNER");
        drawing.add_instance(named.clone());
        drawing.add_instance(named);
        drawing.add_instance(unnamed);
        // 其他图层上的块参照不构成区域
        drawing.add_instance(BlockInstance::new("ROOM_BOX", Point2::new(40.0, 0.0)).with_layer("FURN"));

        let config = EngineConfig::default();
        let mut diagnostics = Diagnostics::new();
        let zones = ZoneClassifier::new(&drawing, &config).build(&mut diagnostics);

        assert_eq!(zones.len(), 2);
        assert_eq!(zones.zone_for_point(&Point2::new(5.0, 2.0)), Some("Kitchen"));
        assert_eq!(zones.zone_for_point(&Point2::new(25.0, 2.0)), Some("ROOM_BOX"));
        assert_eq!(zones.zone_for_point(&Point2::new(45.0, 2.0)), None);
    }

    #[test]
    fn test_zones_from_boundaries_and_labels() {
        let mut drawing = Drawing::new("zones");
        drawing.add_entity(planner_boundary(0.0, 0.0, 10.0));
        drawing.add_entity(planner_boundary(20.0, 0.0, 10.0));
        drawing.add_entity(planner_boundary(40.0, 0.0, 10.0));
        drawing.add_entity(text(5.0, 5.0, "Office\nsecond line"));
        // 不在任何边界内，就近分配给第二个边界
        drawing.add_entity(text(25.0, 30.0, "Store"));
        drawing.add_entity(text(0.0, 100.0, "   "));

        let config = EngineConfig::default();
        let mut diagnostics = Diagnostics::new();
        let zones = ZoneClassifier::new(&drawing, &config).build(&mut diagnostics);

        let names: Vec<&str> = zones.zones().iter().map(|z| z.name.as_str()).collect();
        assert_eq!(names, vec!["Office", "Store", "Zone 03"]);
        assert!(zones.zones().iter().all(|z| z.polygon.len() == 4));
    }

    #[test]
    fn test_each_label_used_once() {
        let mut drawing = Drawing::new("zones");
        drawing.add_entity(planner_boundary(0.0, 0.0, 10.0));
        drawing.add_entity(planner_boundary(0.0, 20.0, 10.0));
        drawing.add_entity(text(5.0, 5.0, "Only"));

        let config = EngineConfig::default();
        let zones = ZoneClassifier::new(&drawing, &config).build(&mut Diagnostics::new());
        let names: Vec<&str> = zones.zones().iter().map(|z| z.name.as_str()).collect();
        assert_eq!(names, vec!["Only", "Zone 02"]);
    }

    #[test]
    fn test_open_or_degenerate_boundaries_are_ignored() {
        let mut drawing = Drawing::new("zones");
        drawing.add_entity(
            Entity::new(Geometry::Polyline(Polyline::from_points(square(0.0, 0.0, 10.0), false)))
                .with_layer("PLANNER"),
        );
        drawing.add_entity(
            Entity::new(Geometry::Polyline(Polyline::from_points(
                [Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)],
                true,
            )))
            .with_layer("PLANNER"),
        );

        let config = EngineConfig::default();
        let mut diagnostics = Diagnostics::new();
        let zones = ZoneClassifier::new(&drawing, &config).build(&mut diagnostics);
        assert!(zones.is_empty());
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_zone_for_points_uses_bbox_center() {
        let zones = ZoneSet::new(vec![Zone::new("A", square(0.0, 0.0, 10.0))]);
        let pts = [Point2::new(1.0, 1.0), Point2::new(9.0, 9.0)];
        assert_eq!(zones.zone_for_points(&pts), "A");
        assert_eq!(zones.zone_for_points(&[]), "");
    }
}
