//! # 解析器模块
//!
//! 读取缺陷模板文件并归类为带标签的行，组装为 `Template`。
//!
//! ## 依赖关系
//! - 被 `commands/` 模块使用
//! - 使用 `models/` 数据模型
//! - 子模块: template, table, elements

pub mod elements;
pub mod table;
pub mod template;

use crate::error::{DefectError, Result};
use crate::models::Template;

use std::fs;
use std::path::Path;

/// 模板布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// 根据表头自动判断
    Auto,
    /// 两列键值模板
    KeyValue,
    /// 带表头的宽表
    Table,
}

/// 读取并解析模板文件
pub fn parse_template_file(path: &Path, layout: Layout) -> Result<Template> {
    if !path.is_file() {
        return Err(DefectError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let content = fs::read_to_string(path).map_err(|e| DefectError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("template");

    parse_template_str(&content, source, layout)
}

/// 从字符串内容解析模板
pub fn parse_template_str(content: &str, source: &str, layout: Layout) -> Result<Template> {
    let layout = match layout {
        Layout::Auto => detect_layout(content),
        other => other,
    };

    match layout {
        Layout::Table => table::parse_table_content(content, source),
        _ => template::parse_template_content(content, source),
    }
}

/// 表头包含 `dHvbm` 时为宽表
pub fn detect_layout(content: &str) -> Layout {
    let header = content.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    if header.split(',').any(|cell| cell.trim() == "dHvbm") {
        Layout::Table
    } else {
        Layout::KeyValue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_layout() {
        assert_eq!(detect_layout("bg,1.0\nZn-1,0.0\n"), Layout::KeyValue);
        assert_eq!(
            detect_layout("\ndefect,site,charge,dHvbm,bandgap\n"),
            Layout::Table
        );
    }

    #[test]
    fn test_parse_file_roundtrip() {
        let path = std::env::temp_dir().join("qdefect_parse_file_test.csv");
        fs::write(&path, "bg,2.0\nZn-1,-1.0\nV_Zn_0_1,1.0\n").unwrap();

        let template = parse_template_file(&path, Layout::Auto).unwrap();
        assert_eq!(template.source, "qdefect_parse_file_test.csv");
        assert_eq!(template.defects.len(), 1);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join("qdefect_definitely_missing.csv");
        assert!(matches!(
            parse_template_file(&path, Layout::Auto),
            Err(DefectError::FileNotFound { .. })
        ));
    }
}
