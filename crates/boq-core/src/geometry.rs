//! 几何图元定义
//!
//! 工程量提取只关心会产生长度、周长或面积的图元：
//! - 线段 (Line)
//! - 圆 (Circle)
//! - 圆弧 (Arc)
//! - 多段线 (Polyline)，顶点可带凸度
//! - 填充 (Hatch)，只保留边界顶点
//! - 文本 (Text)，仅用于区域命名

use crate::math::{distance, Point2, EPSILON};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

/// 几何类型枚举
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Line(Line),
    Circle(Circle),
    Arc(Arc),
    Polyline(Polyline),
    Hatch(Hatch),
    Text(Text),
}

impl Geometry {
    /// 获取几何的类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Line(_) => "Line",
            Geometry::Circle(_) => "Circle",
            Geometry::Arc(_) => "Arc",
            Geometry::Polyline(_) => "Polyline",
            Geometry::Hatch(_) => "Hatch",
            Geometry::Text(_) => "Text",
        }
    }
}

/// 线段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub start: Point2,
    pub end: Point2,
}

impl Line {
    pub fn new(start: Point2, end: Point2) -> Self {
        Self { start, end }
    }

    /// 计算线段长度
    pub fn length(&self) -> f64 {
        distance(&self.start, &self.end)
    }
}

/// 圆
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point2,
    pub radius: f64,
}

impl Circle {
    pub fn new(center: Point2, radius: f64) -> Self {
        Self { center, radius }
    }

    /// 计算周长
    pub fn circumference(&self) -> f64 {
        TAU * self.radius
    }

    /// 计算面积
    pub fn area(&self) -> f64 {
        PI * self.radius * self.radius
    }
}

/// 圆弧（逆时针，从起始角到终止角）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    pub center: Point2,
    pub radius: f64,
    /// 起始角度（弧度）
    pub start_angle: f64,
    /// 终止角度（弧度）
    pub end_angle: f64,
}

impl Arc {
    pub fn new(center: Point2, radius: f64, start_angle: f64, end_angle: f64) -> Self {
        Self {
            center,
            radius,
            start_angle,
            end_angle,
        }
    }

    /// 扫过的角度，范围 (0, 2π]；起止角重合视为整圆
    pub fn sweep_angle(&self) -> f64 {
        let sweep = (self.end_angle - self.start_angle).rem_euclid(TAU);
        if sweep < EPSILON {
            TAU
        } else {
            sweep
        }
    }

    /// 计算弧长
    pub fn length(&self) -> f64 {
        self.sweep_angle() * self.radius
    }
}

/// 多段线顶点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolylineVertex {
    pub point: Point2,
    /// 凸度（bulge）- 到下一顶点的弧线段，0表示直线
    pub bulge: f64,
}

impl PolylineVertex {
    pub fn new(point: Point2) -> Self {
        Self { point, bulge: 0.0 }
    }

    pub fn with_bulge(point: Point2, bulge: f64) -> Self {
        Self { point, bulge }
    }
}

/// 多段线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub vertices: Vec<PolylineVertex>,
    /// 是否闭合
    pub closed: bool,
}

impl Polyline {
    pub fn new(vertices: Vec<PolylineVertex>, closed: bool) -> Self {
        Self { vertices, closed }
    }

    /// 从点列表创建（所有顶点都是直线连接）
    pub fn from_points(points: impl IntoIterator<Item = Point2>, closed: bool) -> Self {
        Self {
            vertices: points.into_iter().map(PolylineVertex::new).collect(),
            closed,
        }
    }

    /// 线段数量
    pub fn segment_count(&self) -> usize {
        match self.vertices.len() {
            0 | 1 => 0,
            n if self.closed => n,
            n => n - 1,
        }
    }
}

/// 填充边界环
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HatchBoundary {
    pub vertices: Vec<Point2>,
    /// 是否为外边界（false 表示孔洞）
    pub is_outer: bool,
}

impl HatchBoundary {
    pub fn new(vertices: Vec<Point2>, is_outer: bool) -> Self {
        Self { vertices, is_outer }
    }
}

/// 填充
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hatch {
    pub boundaries: Vec<HatchBoundary>,
}

impl Hatch {
    pub fn new(boundaries: Vec<HatchBoundary>) -> Self {
        Self { boundaries }
    }

    /// 填充面积：外边界面积减去孔洞面积
    pub fn filled_area(&self) -> f64 {
        let signed: f64 = self
            .boundaries
            .iter()
            .map(|b| {
                let area = polygon_area(&b.vertices);
                if b.is_outer {
                    area
                } else {
                    -area
                }
            })
            .sum();
        signed.max(0.0)
    }
}

/// 文本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    /// 插入点
    pub position: Point2,
    /// 文本内容
    pub content: String,
    /// 文本高度
    pub height: f64,
}

impl Text {
    pub fn new(position: Point2, content: impl Into<String>, height: f64) -> Self {
        Self {
            position,
            content: content.into(),
            height,
        }
    }

    /// 用作标签的文本：首行去空白
    pub fn label(&self) -> &str {
        self.content.lines().next().unwrap_or("").trim()
    }
}

/// 折线总长度（不自动闭合）
pub fn path_length(points: &[Point2]) -> f64 {
    points.windows(2).map(|w| distance(&w[0], &w[1])).sum()
}

/// 鞋带公式计算多边形面积（绝对值），少于三个点时为 0
pub fn polygon_area(points: &[Point2]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice.abs() * 0.5
}

/// 顶点平均值（多边形的“质心”近似，用于就近标签匹配）
pub fn vertex_centroid(points: &[Point2]) -> Option<Point2> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point2::new(sx / n, sy / n))
}
