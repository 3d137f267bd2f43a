//! 图纸工程量提取引擎
//!
//! 从已解析的图纸（实体、块定义、块参照、图层、文字）中提取并汇总
//! 工程量：曲线离散、最小面积外接矩形、区域划分、嵌套块参照汇总、
//! 按图层统计长度/周长/面积以及图层代表色。
//!
//! # 架构设计
//!
//! 数据自下而上流动：
//! - `sampling`: 曲线离散为点序列
//! - `extent`: 凸包 + 旋转卡壳求外接矩形
//! - `zone`: 区域多边形与点归属
//! - `aggregate`: 块参照遍历与分组
//! - `metrics` / `color_vote`: 图层统计与代表色
//! - `pipeline`: 串联以上步骤，输出排序后的行
//!
//! # 示例
//!
//! ```rust
//! use boq_core::prelude::*;
//!
//! let mut drawing = Drawing::new("demo");
//! drawing.add_entity(
//!     Entity::new(Geometry::Line(Line::new(Point2::origin(), Point2::new(10.0, 0.0))))
//!         .with_layer("WALL"),
//! );
//!
//! let output = Pipeline::new(EngineConfig::default()).run(&drawing);
//! assert_eq!(output.rows.len(), 1);
//! ```

pub mod aggregate;
pub mod block;
pub mod color_vote;
pub mod config;
pub mod diagnostics;
pub mod drawing;
pub mod entity;
pub mod extent;
pub mod geometry;
pub mod layer;
pub mod math;
pub mod metrics;
pub mod pipeline;
pub mod properties;
pub mod row;
pub mod sampling;
pub mod transform;
pub mod units;
pub mod zone;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::block::{Attribute, AttributeTag, BlockDefinition, BlockInstance, BlockTable};
    pub use crate::config::{AppConfig, EngineConfig, EngineOverrides};
    pub use crate::diagnostics::{DiagnosticKind, Diagnostics};
    pub use crate::drawing::Drawing;
    pub use crate::entity::Entity;
    pub use crate::geometry::{Arc, Circle, Geometry, Hatch, HatchBoundary, Line, Polyline, Text};
    pub use crate::layer::{Layer, LayerTable};
    pub use crate::math::{BoundingBox2, Point2, Vector2};
    pub use crate::pipeline::{Pipeline, PipelineOutput};
    pub use crate::properties::{Color, ColorSpec};
    pub use crate::row::{DetailRow, LayerSummaryRow, Row};
    pub use crate::transform::Transform2D;
    pub use crate::units::Unit;
}
