//! 单位系统
//!
//! 图纸坐标先按 `$INSUNITS` 换算为米，再转换到报表的目标单位。
//! 长度按比例缩放，面积按比例的平方缩放。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 线性单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Unit {
    /// 英寸
    #[serde(rename = "in", alias = "inch")]
    Inch,
    /// 英尺 (12 英寸)
    #[default]
    #[serde(rename = "ft", alias = "foot", alias = "feet")]
    Foot,
    /// 毫米
    #[serde(rename = "mm", alias = "millimeter")]
    Millimeter,
    /// 厘米
    #[serde(rename = "cm", alias = "centimeter")]
    Centimeter,
    /// 米
    #[serde(rename = "m", alias = "meter")]
    Meter,
}

impl Unit {
    /// 获取单位到米的转换因子
    pub fn to_meters_factor(&self) -> f64 {
        match self {
            Unit::Inch => 0.0254,
            Unit::Foot => 0.3048,
            Unit::Millimeter => 0.001,
            Unit::Centimeter => 0.01,
            Unit::Meter => 1.0,
        }
    }

    /// 获取单位符号
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Inch => "in",
            Unit::Foot => "ft",
            Unit::Millimeter => "mm",
            Unit::Centimeter => "cm",
            Unit::Meter => "m",
        }
    }

    /// 从字符串解析单位
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mm" | "millimeter" | "millimeters" => Some(Unit::Millimeter),
            "cm" | "centimeter" | "centimeters" => Some(Unit::Centimeter),
            "m" | "meter" | "meters" => Some(Unit::Meter),
            "in" | "inch" | "inches" | "\"" => Some(Unit::Inch),
            "ft" | "foot" | "feet" | "'" => Some(Unit::Foot),
            _ => None,
        }
    }

    /// `$INSUNITS` 代码映射（1 英寸，2 英尺，4 毫米，5 厘米，6 米），其他代码返回 `None`
    pub fn from_insunits(code: i32) -> Option<Self> {
        match code {
            1 => Some(Unit::Inch),
            2 => Some(Unit::Foot),
            4 => Some(Unit::Millimeter),
            5 => Some(Unit::Centimeter),
            6 => Some(Unit::Meter),
            _ => None,
        }
    }

    /// 米制长度转换为本单位
    pub fn length_from_meters(&self, meters: f64) -> f64 {
        meters / self.to_meters_factor()
    }

    /// 平方米转换为本单位的平方
    pub fn area_from_square_meters(&self, square_meters: f64) -> f64 {
        let f = self.to_meters_factor();
        square_meters / (f * f)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// 从图纸单位到目标单位的换算
///
/// `scale_to_meters` 为图纸单位到米的比例。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitScale {
    pub scale_to_meters: f64,
    pub target: Unit,
}

impl UnitScale {
    pub fn new(scale_to_meters: f64, target: Unit) -> Self {
        Self {
            scale_to_meters,
            target,
        }
    }

    /// 图纸长度转目标单位
    pub fn length(&self, drawing_length: f64) -> f64 {
        self.target
            .length_from_meters(drawing_length * self.scale_to_meters)
    }

    /// 图纸面积转目标单位
    pub fn area(&self, drawing_area: f64) -> f64 {
        self.target
            .area_from_square_meters(drawing_area * self.scale_to_meters * self.scale_to_meters)
    }
}

/// 按小数位数四舍五入
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
