//! 图层代表色
//!
//! 每个图层先取图层表中的基色，再由图层上的实体按“墨水量”加权投票：
//! 线类实体按长度，填充按面积。得票最多的颜色成为该图层的代表色。

use crate::aggregate::layer_or_misc;
use crate::config::EngineConfig;
use crate::entity::Entity;
use crate::geometry::{path_length, Geometry};
use crate::layer::LayerTable;
use crate::properties::Color;
use crate::sampling::CurveSampler;
use std::collections::BTreeMap;

/// 图层代表色解析器
pub struct DominantColorResolver<'a> {
    layers: &'a LayerTable,
    sampler: CurveSampler,
    scale_to_meters: f64,
}

impl<'a> DominantColorResolver<'a> {
    pub fn new(config: &EngineConfig, layers: &'a LayerTable, scale_to_meters: f64) -> Self {
        Self {
            layers,
            sampler: CurveSampler::from_config(config),
            scale_to_meters,
        }
    }

    /// 图层基色表（键为 `layer_or_misc` 后的名称）
    pub fn base_colors(&self) -> BTreeMap<String, Color> {
        self.layers
            .iter()
            .map(|layer| (layer_or_misc(&layer.name).to_string(), layer.base_color()))
            .collect()
    }

    /// 实体颜色：真彩色，其次 ACI 1..255，其次图层基色，否则中性灰
    fn entity_color(&self, entity: &Entity, base: &BTreeMap<String, Color>) -> Color {
        entity
            .color
            .direct()
            .or_else(|| base.get(layer_or_misc(&entity.layer)).copied())
            .unwrap_or(Color::NEUTRAL)
    }

    /// 投票权重（已按单位比例缩放），文本不投票
    fn weight(&self, entity: &Entity) -> Option<f64> {
        let s = self.scale_to_meters;
        let w = match &entity.geometry {
            Geometry::Line(line) => line.length() * s,
            Geometry::Arc(arc) => arc.length() * s,
            Geometry::Circle(circle) => circle.circumference() * s,
            Geometry::Polyline(polyline) => {
                path_length(&self.sampler.sample_polyline(polyline)) * s
            }
            Geometry::Hatch(hatch) => hatch.filled_area() * s * s,
            Geometry::Text(_) => return None,
        };
        Some(if w > 0.0 && w.is_finite() { w } else { 1.0 })
    }

    /// 计算每个图层的代表色
    ///
    /// 没有投票的图层保留基色；票数相同时取 RGB 最小的颜色。
    pub fn resolve(&self, entities: &[Entity]) -> BTreeMap<String, Color> {
        let base = self.base_colors();
        let mut votes: BTreeMap<String, BTreeMap<Color, f64>> = BTreeMap::new();
        for entity in entities {
            let Some(weight) = self.weight(entity) else {
                continue;
            };
            let color = self.entity_color(entity, &base);
            *votes
                .entry(layer_or_misc(&entity.layer).to_string())
                .or_default()
                .entry(color)
                .or_default() += weight;
        }

        let mut result = base;
        for (layer, histogram) in votes {
            // BTreeMap 按颜色升序遍历，只在严格更大时替换，平票保留较小的颜色
            let winner = histogram
                .into_iter()
                .fold(None::<(Color, f64)>, |best, (color, w)| match best {
                    Some((_, bw)) if w <= bw => best,
                    _ => Some((color, w)),
                });
            if let Some((color, _)) = winner {
                result.insert(layer, color);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Hatch, HatchBoundary, Line, Text};
    use crate::layer::Layer;
    use crate::math::Point2;
    use crate::properties::ColorSpec;

    fn line(len: f64) -> Geometry {
        Geometry::Line(Line::new(Point2::origin(), Point2::new(len, 0.0)))
    }

    fn layers() -> LayerTable {
        [
            Layer::new("WALL").with_color(ColorSpec::Index(1)),
            Layer::new("EMPTY").with_color(ColorSpec::True(Color::new(1, 2, 3))),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_heaviest_color_wins() {
        let layers = layers();
        let config = EngineConfig::default();
        let resolver = DominantColorResolver::new(&config, &layers, 1.0);
        let entities = vec![
            Entity::new(line(10.0)).with_layer("WALL"),
            Entity::new(line(3.0)).with_layer("WALL").with_color(ColorSpec::Index(5)),
            Entity::new(line(4.0)).with_layer("WALL").with_color(ColorSpec::Index(5)),
            Entity::new(Geometry::Text(Text::new(Point2::origin(), "x", 1.0)))
                .with_layer("WALL")
                .with_color(ColorSpec::Index(3)),
        ];
        let colors = resolver.resolve(&entities);
        assert_eq!(colors.get("WALL"), Some(&Color::RED));
        assert_eq!(colors.get("EMPTY"), Some(&Color::new(1, 2, 3)));

        let more = vec![
            Entity::new(line(1.0)).with_layer("WALL"),
            Entity::new(line(5.0)).with_layer("WALL").with_color(ColorSpec::Index(5)),
        ];
        assert_eq!(resolver.resolve(&more).get("WALL"), Some(&Color::BLUE));
    }

    #[test]
    fn test_area_votes_scale_by_square() {
        let layers = LayerTable::new();
        let config = EngineConfig::default();
        // 毫米图纸：100x100 的填充面积 0.01，比 1 米长的线少
        let resolver = DominantColorResolver::new(&config, &layers, 0.001);
        let hatch = Hatch::new(vec![HatchBoundary::new(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(100.0, 0.0),
                Point2::new(100.0, 100.0),
                Point2::new(0.0, 100.0),
            ],
            true,
        )]);
        let entities = vec![
            Entity::new(Geometry::Hatch(hatch))
                .with_layer("A")
                .with_color(ColorSpec::Index(3)),
            Entity::new(line(1000.0)).with_layer("A").with_color(ColorSpec::Index(4)),
        ];
        assert_eq!(resolver.resolve(&entities).get("A"), Some(&Color::CYAN));
    }

    #[test]
    fn test_unknown_layer_falls_back_to_neutral_and_ties_pick_lowest() {
        let layers = LayerTable::new();
        let config = EngineConfig::default();
        let resolver = DominantColorResolver::new(&config, &layers, 1.0);
        let entities = vec![
            Entity::new(line(0.0)).with_layer(""),
            Entity::new(line(2.0)).with_layer("T").with_color(ColorSpec::Index(1)),
            Entity::new(line(2.0)).with_layer("T").with_color(ColorSpec::Index(5)),
        ];
        let colors = resolver.resolve(&entities);
        assert_eq!(colors.get("misc"), Some(&Color::NEUTRAL));
        assert_eq!(colors.get("T"), Some(&Color::BLUE));
    }
}
