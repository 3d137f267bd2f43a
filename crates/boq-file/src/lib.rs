//! 工程量提取文件处理
//!
//! 支持：
//! - `.dxf` 导入（基于 `dxf` crate）
//! - CSV / JSON 导出

pub mod dxf_io;
pub mod error;
pub mod export;

pub use error::FileError;
pub use export::{CsvExporter, ExportFormat, JsonReport};
