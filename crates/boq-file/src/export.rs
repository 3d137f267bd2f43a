//! 导出模块
//!
//! 把输出行写为 CSV 或 JSON，并提供输入文件收集与输出路径规则。

use crate::error::FileError;
use boq_core::aggregate::ComponentCount;
use boq_core::diagnostics::Diagnostics;
use boq_core::pipeline::PipelineOutput;
use boq_core::row::{Row, LAYER_SUMMARY_ENTITY_TYPE};
use boq_core::units::Unit;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// 汇总行的数量类型
const LAYER_QTY_TYPE: &str = "layer";

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// CSV 导出器
#[derive(Debug, Clone)]
pub struct CsvExporter {
    /// 表头中标注的长度单位
    pub unit: Unit,
    /// 数值的小数位数
    pub decimals: u32,
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self {
            unit: Unit::Foot,
            decimals: 2,
        }
    }
}

impl CsvExporter {
    pub fn new(unit: Unit, decimals: u32) -> Self {
        Self { unit, decimals }
    }

    /// 表头
    pub fn headers(&self) -> Vec<String> {
        let unit = self.unit.symbol();
        vec![
            "entity_type".to_string(),
            "category".to_string(),
            "zone".to_string(),
            "category1".to_string(),
            "BOQ name".to_string(),
            "qty_type".to_string(),
            "qty_value".to_string(),
            format!("length ({unit})"),
            format!("width ({unit})"),
            "perimeter".to_string(),
            format!("area ({unit}2)"),
            "Description".to_string(),
            "Preview".to_string(),
            "remarks".to_string(),
        ]
    }

    fn number(&self, value: Option<f64>) -> String {
        value
            .map(|v| format!("{:.*}", self.decimals as usize, v))
            .unwrap_or_default()
    }

    /// 一行的各列
    fn record(&self, row: &Row) -> Vec<String> {
        match row {
            Row::Detail(d) => vec![
                d.entity_type.clone(),
                d.category.clone(),
                d.zone.clone(),
                d.category1.clone(),
                d.name.clone(),
                d.qty_type.clone(),
                self.number(Some(d.qty_value)),
                self.number(d.length),
                self.number(d.width),
                String::new(),
                String::new(),
                d.description.clone(),
                String::new(),
                d.remarks.clone(),
            ],
            Row::LayerSummary(s) => vec![
                LAYER_SUMMARY_ENTITY_TYPE.to_string(),
                s.category.clone(),
                s.zone.clone(),
                String::new(),
                String::new(),
                LAYER_QTY_TYPE.to_string(),
                String::new(),
                self.number(s.length),
                self.number(s.width),
                self.number(s.perimeter),
                self.number(s.area),
                String::new(),
                s.color.map(|c| c.to_hex_string()).unwrap_or_default(),
                s.remarks.clone(),
            ],
        }
    }

    /// 导出为 CSV 字符串
    pub fn export(&self, rows: &[Row]) -> String {
        let mut csv = String::new();
        push_record(&mut csv, &self.headers());
        for row in rows {
            push_record(&mut csv, &self.record(row));
        }
        csv
    }

    /// 导出到文件（自动创建父目录）
    pub fn export_to_file(&self, rows: &[Row], path: &Path) -> Result<(), FileError> {
        ensure_parent(path)?;
        std::fs::write(path, self.export(rows))?;
        debug!("写入 {} 行到 {}", rows.len(), path.display());
        Ok(())
    }
}

/// 需要加引号的字段：含逗号、引号或换行
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn push_record(out: &mut String, fields: &[String]) {
    let line: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
    out.push_str(&line.join(","));
    out.push_str("\r\n");
}

fn ensure_parent(path: &Path) -> Result<(), FileError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// JSON 报告
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub source: &'a str,
    pub rows: &'a [Row],
    pub components: &'a [ComponentCount],
    pub diagnostics: &'a Diagnostics,
}

impl<'a> JsonReport<'a> {
    pub fn new(source: &'a str, output: &'a PipelineOutput) -> Self {
        Self {
            source,
            rows: &output.rows,
            components: &output.components,
            diagnostics: &output.diagnostics,
        }
    }

    /// 导出到文件（自动创建父目录）
    pub fn export_to_file(&self, path: &Path) -> Result<(), FileError> {
        ensure_parent(path)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// 拆分明细行与汇总行
pub fn split_rows(rows: &[Row]) -> (Vec<&Row>, Vec<&Row>) {
    rows.iter().partition(|r| !r.is_layer_summary())
}

/// 输出文件路径：`<stem>_raw_extract.<ext>`，放在 `out_dir` 或输入文件旁
pub fn output_path(input: &Path, out_dir: Option<&Path>, format: ExportFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "drawing".to_string());
    let file_name = format!("{stem}_raw_extract.{}", format.extension());
    match out_dir {
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    }
}

fn is_dxf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("dxf"))
}

/// 收集输入文件：单个 `.dxf` 文件，或目录下的 `.dxf` 文件（可递归），结果排序
pub fn collect_dxf_files(path: &Path, recursive: bool) -> Result<Vec<PathBuf>, FileError> {
    if path.is_file() {
        return if is_dxf(path) {
            Ok(vec![path.to_path_buf()])
        } else {
            Err(FileError::InvalidFormat(format!(
                "{} is not a .dxf file",
                path.display()
            )))
        };
    }
    if !path.is_dir() {
        return Err(FileError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();
    for entry in WalkDir::new(path).max_depth(max_depth) {
        let entry = entry.map_err(|e| FileError::Io(e.into()))?;
        if entry.file_type().is_file() && is_dxf(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}
