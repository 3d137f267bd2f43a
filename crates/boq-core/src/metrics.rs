//! 图层统计
//!
//! 按 (区域, 图层) 累计开放图元长度、闭合图元周长和面积，
//! 并由周长与面积反推等效矩形的长宽。

use crate::aggregate::layer_or_misc;
use crate::config::EngineConfig;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::entity::Entity;
use crate::geometry::{path_length, polygon_area, Geometry};
use crate::properties::Color;
use crate::row::{LayerSummaryRow, CLOSED_REMARK, OPEN_REMARK};
use crate::sampling::CurveSampler;
use crate::units::{round_to, UnitScale};
use crate::zone::ZoneSet;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// 单个 (区域, 图层) 的累计值（目标单位）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricBucket {
    pub open_length: f64,
    pub perimeter: f64,
    pub area: f64,
}

/// 统计桶的键：(区域名, 图层名)
pub type BucketKey = (String, String);

/// 全部统计结果，按键有序
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayerMetrics {
    buckets: BTreeMap<BucketKey, MetricBucket>,
}

impl LayerMetrics {
    fn bucket(&mut self, zone: &str, layer: &str) -> &mut MetricBucket {
        self.buckets
            .entry((zone.to_string(), layer_or_misc(layer).to_string()))
            .or_default()
    }

    /// 累加开放长度，非正值忽略
    pub fn add_open(&mut self, zone: &str, layer: &str, length: f64) {
        if length > 0.0 {
            self.bucket(zone, layer).open_length += length;
        }
    }

    /// 累加周长，非正值忽略
    pub fn add_perimeter(&mut self, zone: &str, layer: &str, perimeter: f64) {
        if perimeter > 0.0 {
            self.bucket(zone, layer).perimeter += perimeter;
        }
    }

    /// 累加面积，非正值忽略
    pub fn add_area(&mut self, zone: &str, layer: &str, area: f64) {
        if area > 0.0 {
            self.bucket(zone, layer).area += area;
        }
    }

    pub fn get(&self, zone: &str, layer: &str) -> Option<&MetricBucket> {
        self.buckets.get(&(zone.to_string(), layer.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BucketKey, &MetricBucket)> {
        self.buckets.iter()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// 由周长 P 与面积 A 反推矩形边长，返回 (长, 宽)，长 >= 宽
///
/// 无实数解或边长非正时返回 `None`。
pub fn rectangle_from_perimeter_area(perimeter: f64, area: f64) -> Option<(f64, f64)> {
    if !(perimeter > 0.0 && area > 0.0) {
        return None;
    }
    let s = perimeter / 2.0;
    let d = s * s - 4.0 * area;
    if d < -1e-9 {
        return None;
    }
    let root = d.max(0.0).sqrt();
    let a = 0.5 * (s + root);
    let b = 0.5 * (s - root);
    if a <= 0.0 || b <= 0.0 {
        return None;
    }
    Some(if a >= b { (a, b) } else { (b, a) })
}

/// 图层统计累加器
pub struct LayerMetricAccumulator<'a> {
    zones: &'a ZoneSet,
    sampler: CurveSampler,
    scale: UnitScale,
}

impl<'a> LayerMetricAccumulator<'a> {
    pub fn new(config: &EngineConfig, zones: &'a ZoneSet, scale_to_meters: f64) -> Self {
        Self {
            zones,
            sampler: CurveSampler::from_config(config),
            scale: UnitScale::new(scale_to_meters, config.target_units),
        }
    }

    /// 统计一组实体（文本不参与）
    pub fn accumulate(&self, entities: &[Entity], diagnostics: &mut Diagnostics) -> LayerMetrics {
        let mut metrics = LayerMetrics::default();
        for entity in entities {
            if matches!(entity.geometry, Geometry::Text(_)) {
                continue;
            }
            let points = self.sampler.sample(&entity.geometry);
            if points.is_empty() {
                diagnostics.push(DiagnosticKind::MalformedEntity {
                    entity_type: entity.geometry.type_name().to_string(),
                    layer: entity.layer.clone(),
                });
                continue;
            }
            let zone = self.zones.zone_for_points(&points);
            let layer = entity.layer.as_str();
            let length = |l: f64| self.scale.length(l);
            let area = |a: f64| self.scale.area(a);

            match &entity.geometry {
                Geometry::Line(line) => metrics.add_open(&zone, layer, length(line.length())),
                Geometry::Arc(arc) => metrics.add_open(&zone, layer, length(arc.length())),
                Geometry::Circle(circle) => {
                    metrics.add_perimeter(&zone, layer, length(circle.circumference()));
                    metrics.add_area(&zone, layer, area(circle.area()));
                }
                Geometry::Polyline(polyline) => {
                    let total = path_length(&points);
                    if polyline.closed {
                        metrics.add_perimeter(&zone, layer, length(total));
                        let ring = &points[..points.len() - 1];
                        metrics.add_area(&zone, layer, area(polygon_area(ring)));
                    } else {
                        metrics.add_open(&zone, layer, length(total));
                    }
                }
                Geometry::Hatch(hatch) => metrics.add_area(&zone, layer, area(hatch.filled_area())),
                Geometry::Text(_) => {}
            }
        }
        debug!("图层统计 {} 组", metrics.len());
        metrics
    }
}

/// 生成图层汇总行：开放长度一行，闭合周长/面积一行
pub fn summary_rows(
    metrics: &LayerMetrics,
    colors: &BTreeMap<String, Color>,
    decimals: u32,
) -> Vec<LayerSummaryRow> {
    let round = |v: f64| round_to(v, decimals);
    let mut rows = Vec::new();
    for ((zone, layer), bucket) in metrics.iter() {
        let color = colors.get(layer).copied();
        if bucket.open_length > 0.0 {
            rows.push(LayerSummaryRow {
                category: layer.clone(),
                zone: zone.clone(),
                length: Some(round(bucket.open_length)),
                width: None,
                perimeter: None,
                area: None,
                color,
                remarks: OPEN_REMARK.to_string(),
            });
        }
        if bucket.perimeter > 0.0 || bucket.area > 0.0 {
            let dims = rectangle_from_perimeter_area(bucket.perimeter, bucket.area);
            rows.push(LayerSummaryRow {
                category: layer.clone(),
                zone: zone.clone(),
                length: dims.map(|(l, _)| round(l)),
                width: dims.map(|(_, w)| round(w)),
                perimeter: Some(round(bucket.perimeter)),
                area: Some(round(bucket.area)),
                color,
                remarks: CLOSED_REMARK.to_string(),
            });
        }
    }
    rows
}
