//! 单个文档处理过程中的跳过记录
//!
//! 引擎本身不会因单个实体失败而中止，被跳过的内容记录在这里，
//! 与输出行一起返回给调用方。

use serde::Serialize;
use std::fmt;

/// 跳过原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// 几何无效，离散结果为空
    MalformedEntity { entity_type: String, layer: String },
    /// 块参照引用了不存在的块定义
    MissingBlock { name: String },
    /// 块参照在当前路径上形成环
    CyclicReference { name: String, depth: usize },
    /// 超过最大嵌套深度
    DepthExceeded { name: String, depth: usize },
    /// 区域边界退化（顶点不足三个）
    DegenerateZone { layer: String },
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedEntity { entity_type, layer } => {
                write!(f, "malformed {entity_type} on layer '{layer}'")
            }
            Self::MissingBlock { name } => write!(f, "block '{name}' is not defined"),
            Self::CyclicReference { name, depth } => {
                write!(f, "block '{name}' references itself at depth {depth}")
            }
            Self::DepthExceeded { name, depth } => {
                write!(f, "block '{name}' exceeds nesting depth {depth}")
            }
            Self::DegenerateZone { layer } => {
                write!(f, "zone boundary on layer '{layer}' has fewer than 3 vertices")
            }
        }
    }
}

/// 一个文档的诊断列表
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    entries: Vec<DiagnosticKind>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一条诊断
    pub fn push(&mut self, kind: DiagnosticKind) {
        tracing::debug!("跳过: {}", kind);
        self.entries.push(kind);
    }

    pub fn entries(&self) -> &[DiagnosticKind] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
