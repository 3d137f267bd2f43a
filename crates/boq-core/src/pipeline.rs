//! 单文档处理流程
//!
//! 区域 → 块参照明细 → 图层统计与代表色 → 排序。
//! 每次 `run` 都从头创建全部中间状态，同一输入多次运行结果一致。

use crate::aggregate::{ComponentCount, InstanceAggregator};
use crate::color_vote::DominantColorResolver;
use crate::config::EngineConfig;
use crate::diagnostics::Diagnostics;
use crate::drawing::Drawing;
use crate::metrics::{summary_rows, LayerMetricAccumulator};
use crate::row::{sort_rows, Row};
use crate::zone::{ZoneClassifier, ZoneSet};
use serde::Serialize;
use tracing::{debug, info};

/// 一个文档的处理结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    /// 排序后的输出行
    pub rows: Vec<Row>,
    /// 识别出的区域
    pub zones: ZoneSet,
    /// 顶层块参照的嵌套组件计数
    pub components: Vec<ComponentCount>,
    /// 被跳过的内容
    pub diagnostics: Diagnostics,
}

impl PipelineOutput {
    /// 明细行数量
    pub fn detail_count(&self) -> usize {
        self.rows.iter().filter(|r| !r.is_layer_summary()).count()
    }

    /// 汇总行数量
    pub fn summary_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_layer_summary()).count()
    }
}

/// 处理流程
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: EngineConfig,
}

impl Pipeline {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 处理一个文档
    pub fn run(&self, drawing: &Drawing) -> PipelineOutput {
        let config = &self.config;
        let mut diagnostics = Diagnostics::new();

        let zones = ZoneClassifier::new(drawing, config).build(&mut diagnostics);
        debug!("{}: 区域 {} 个", drawing.name, zones.len());

        let aggregator = InstanceAggregator::new(drawing, config, &zones);
        let mut rows: Vec<Row> = aggregator
            .rows(&mut diagnostics)
            .into_iter()
            .map(Row::Detail)
            .collect();

        // 组件计数与明细共用同一遍历，跳过记录已在上面收集过
        let components = aggregator.component_counts(&mut Diagnostics::new());

        if config.layer_metrics {
            let metrics = LayerMetricAccumulator::new(config, &zones, drawing.scale_to_meters)
                .accumulate(&drawing.entities, &mut diagnostics);
            let colors = DominantColorResolver::new(config, &drawing.layers, drawing.scale_to_meters)
                .resolve(&drawing.entities);
            rows.extend(
                summary_rows(&metrics, &colors, config.decimals)
                    .into_iter()
                    .map(Row::LayerSummary),
            );
        }

        sort_rows(&mut rows);

        let output = PipelineOutput {
            rows,
            zones,
            components,
            diagnostics,
        };
        info!(
            "{}: 明细 {} 行，汇总 {} 行，跳过 {} 项",
            drawing.name,
            output.detail_count(),
            output.summary_count(),
            output.diagnostics.len()
        );
        output
    }
}
