//! 颜色属性
//!
//! 实体颜色可以是 24 位真彩色、AutoCAD 颜色索引（ACI）或跟随图层。

use serde::{Deserialize, Serialize};
use std::fmt;

/// RGB颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// 从十六进制值创建（如 0xFF0000 表示红色）
    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xFF) as u8,
            g: ((hex >> 8) & 0xFF) as u8,
            b: (hex & 0xFF) as u8,
        }
    }

    /// 转换为 `#RRGGBB` 字符串
    pub fn to_hex_string(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    // 预定义颜色（AutoCAD ACI颜色兼容）
    pub const RED: Color = Color::new(255, 0, 0);
    pub const YELLOW: Color = Color::new(255, 255, 0);
    pub const GREEN: Color = Color::new(0, 255, 0);
    pub const CYAN: Color = Color::new(0, 255, 255);
    pub const BLUE: Color = Color::new(0, 0, 255);
    pub const MAGENTA: Color = Color::new(255, 0, 255);
    pub const WHITE: Color = Color::new(255, 255, 255);
    pub const GRAY: Color = Color::new(128, 128, 128);
    pub const LIGHT_GRAY: Color = Color::new(192, 192, 192);

    /// 无法解析颜色时的中性灰
    pub const NEUTRAL: Color = Color::new(200, 200, 200);

    /// ACI 颜色索引转 RGB，有效范围 1..=255
    ///
    /// 10..=249 按 24 个色相（每 15°）排列，每个色相 5 档亮度，
    /// 偶数为纯色、奇数为半饱和色；250..=255 为灰阶。
    pub fn from_aci(index: i16) -> Option<Self> {
        const LEVELS: [f64; 5] = [255.0, 204.0, 153.0, 127.0, 76.0];
        const GRAYS: [u8; 6] = [51, 91, 132, 173, 214, 255];

        let color = match index {
            1 => Self::RED,
            2 => Self::YELLOW,
            3 => Self::GREEN,
            4 => Self::CYAN,
            5 => Self::BLUE,
            6 => Self::MAGENTA,
            7 => Self::WHITE,
            8 => Self::GRAY,
            9 => Self::LIGHT_GRAY,
            10..=249 => {
                let offset = (index - 10) as usize;
                let hue = (offset / 10) as f64 * 15.0;
                let shade = offset % 10;
                let value = LEVELS[shade / 2];
                let pale = shade % 2 == 1;
                let [r, g, b] = hue_fractions(hue);
                let channel = |f: f64| {
                    let f = if pale { 0.5 + 0.5 * f } else { f };
                    (value * f).floor() as u8
                };
                Self::new(channel(r), channel(g), channel(b))
            }
            250..=255 => {
                let v = GRAYS[(index - 250) as usize];
                Self::new(v, v, v)
            }
            _ => return None,
        };
        Some(color)
    }
}

/// 满饱和满亮度下某色相的 RGB 分量比例
fn hue_fractions(hue: f64) -> [f64; 3] {
    let sector = hue / 60.0;
    let frac = sector - sector.floor();
    match sector.floor() as u32 {
        0 => [1.0, frac, 0.0],
        1 => [1.0 - frac, 1.0, 0.0],
        2 => [0.0, 1.0, frac],
        3 => [0.0, 1.0 - frac, 1.0],
        4 => [frac, 0.0, 1.0],
        _ => [1.0, 0.0, 1.0 - frac],
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex_string())
    }
}

/// 实体或图层上记录的颜色来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ColorSpec {
    /// 跟随图层
    #[default]
    ByLayer,
    /// ACI 颜色索引
    Index(i16),
    /// 24 位真彩色
    True(Color),
}

impl ColorSpec {
    /// 不经过图层回退的直接颜色（真彩色优先，其次是有效 ACI）
    pub fn direct(&self) -> Option<Color> {
        match *self {
            ColorSpec::True(c) => Some(c),
            ColorSpec::Index(i) => Color::from_aci(i),
            ColorSpec::ByLayer => None,
        }
    }
}
