//! 输出记录
//!
//! 两种记录：块参照明细行，以及按 (区域, 图层) 统计的图层汇总行。
//! 数值在生成时已按配置的小数位数取整，生成后不再修改。

use crate::properties::Color;
use serde::{Serialize, Serializer};

/// 明细行的实体类型
pub const INSERT_ENTITY_TYPE: &str = "INSERT";
/// 汇总行的实体类型
pub const LAYER_SUMMARY_ENTITY_TYPE: &str = "LAYER_SUMMARY";

/// 开放图元汇总行的备注
pub const OPEN_REMARK: &str = "OPEN length only";
/// 闭合图元汇总行的备注
pub const CLOSED_REMARK: &str = "CLOSED (rectangle): length/width + perimeter & area";

/// 块参照明细行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    pub entity_type: String,
    /// 分类（区域存在时可能被强制为区域图层名）
    pub category: String,
    pub zone: String,
    /// 原始图层名（小写、去空白）
    pub category1: String,
    /// 块名称
    pub name: String,
    pub qty_type: String,
    pub qty_value: f64,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub description: String,
    pub remarks: String,
}

/// 图层汇总行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSummaryRow {
    pub category: String,
    pub zone: String,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub perimeter: Option<f64>,
    pub area: Option<f64>,
    #[serde(serialize_with = "serialize_color")]
    pub color: Option<Color>,
    pub remarks: String,
}

fn serialize_color<S: Serializer>(color: &Option<Color>, serializer: S) -> Result<S::Ok, S::Error> {
    match color {
        Some(c) => serializer.serialize_str(&c.to_hex_string()),
        None => serializer.serialize_none(),
    }
}

/// 输出记录
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "row_type", rename_all = "snake_case")]
pub enum Row {
    Detail(DetailRow),
    LayerSummary(LayerSummaryRow),
}

impl Row {
    pub fn entity_type(&self) -> &str {
        match self {
            Row::Detail(d) => &d.entity_type,
            Row::LayerSummary(_) => LAYER_SUMMARY_ENTITY_TYPE,
        }
    }

    pub fn category(&self) -> &str {
        match self {
            Row::Detail(d) => &d.category,
            Row::LayerSummary(s) => &s.category,
        }
    }

    pub fn zone(&self) -> &str {
        match self {
            Row::Detail(d) => &d.zone,
            Row::LayerSummary(s) => &s.zone,
        }
    }

    pub fn is_layer_summary(&self) -> bool {
        matches!(self, Row::LayerSummary(_))
    }

    pub fn as_detail(&self) -> Option<&DetailRow> {
        match self {
            Row::Detail(d) => Some(d),
            Row::LayerSummary(_) => None,
        }
    }

    pub fn as_summary(&self) -> Option<&LayerSummaryRow> {
        match self {
            Row::LayerSummary(s) => Some(s),
            Row::Detail(_) => None,
        }
    }
}

/// 分类名归一化：合并空白并转大写
pub fn normalize_category(category: &str) -> String {
    category
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// 行排序键
///
/// 先按归一化分类；同一分类内明细行在前。明细行再按区域、原始图层、
/// 块名排序；汇总行中有区域的排在无区域的前面。
fn sort_key(row: &Row) -> (String, u8, u8, String, String, String) {
    let category = normalize_category(row.category());
    let zone = row.zone().to_lowercase();
    match row {
        Row::Detail(d) => (
            category,
            0,
            0,
            zone,
            d.category1.to_lowercase(),
            d.name.clone(),
        ),
        Row::LayerSummary(_) => {
            let zone_rank = u8::from(zone.is_empty());
            (category, 1, zone_rank, zone, String::new(), String::new())
        }
    }
}

/// 按分类分块排序（稳定排序）
pub fn sort_rows(rows: &mut [Row]) {
    rows.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(category: &str, zone: &str, category1: &str, name: &str) -> Row {
        Row::Detail(DetailRow {
            entity_type: INSERT_ENTITY_TYPE.to_string(),
            category: category.to_string(),
            zone: zone.to_string(),
            category1: category1.to_string(),
            name: name.to_string(),
            qty_type: "count".to_string(),
            qty_value: 1.0,
            length: None,
            width: None,
            description: String::new(),
            remarks: String::new(),
        })
    }

    fn summary(category: &str, zone: &str) -> Row {
        Row::LayerSummary(LayerSummaryRow {
            category: category.to_string(),
            zone: zone.to_string(),
            length: Some(1.0),
            width: None,
            perimeter: None,
            area: None,
            color: Some(Color::RED),
            remarks: OPEN_REMARK.to_string(),
        })
    }

    #[test]
    fn test_normalize_category() {
        assert_eq!(normalize_category("  wall   finish "), "WALL FINISH");
        assert_eq!(normalize_category(""), "");
    }

    #[test]
    fn test_sort_rows_groups_categories() {
        let mut rows = vec![
            summary("wall", ""),
            summary("WALL", "b"),
            detail("Wall", "a", "x", "CHAIR"),
            detail("DOOR", "", "d", "D1"),
            detail("WALL", "a", "x", "BENCH"),
        ];
        sort_rows(&mut rows);

        let order: Vec<(&str, &str, bool)> = rows
            .iter()
            .map(|r| (r.category(), r.zone(), r.is_layer_summary()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("DOOR", "", false),
                ("WALL", "a", false),
                ("Wall", "a", false),
                ("WALL", "b", true),
                ("wall", "", true),
            ]
        );
        assert_eq!(rows[1].as_detail().unwrap().name, "BENCH");
    }
}
