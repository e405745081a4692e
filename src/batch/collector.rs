//! # 模板收集器
//!
//! 根据输入路径和文件名模式收集待处理的模板文件。
//!
//! ## 功能
//! - 单文件输入直接返回
//! - 目录输入按 glob 模式过滤（逗号分隔多个模式）
//! - 可选递归搜索
//! - 排除模式：跳过本工具自身生成的输出文件
//! - 结果按路径排序，保证批量输出顺序稳定
//!
//! ## 依赖关系
//! - 被 `commands/diagram.rs` 调用
//! - 使用 `walkdir` 遍历目录, `glob` 匹配文件名

use crate::error::{DefectError, Result};

use glob::Pattern;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 默认匹配模式
pub const DEFAULT_PATTERN: &str = "*.csv";

/// 模板收集器
pub struct FileCollector {
    input: PathBuf,
    patterns: Vec<Pattern>,
    excluded: Vec<Pattern>,
    recursive: bool,
}

fn compile_patterns(pattern: &str) -> Result<Vec<Pattern>> {
    pattern
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|part| {
            Pattern::new(part).map_err(|e| {
                DefectError::InvalidArgument(format!("Invalid pattern '{}': {}", part, e))
            })
        })
        .collect()
}

impl FileCollector {
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            patterns: Vec::new(),
            excluded: Vec::new(),
            recursive: false,
        }
    }

    /// 设置匹配模式（逗号分隔的多模式）
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        self.patterns = compile_patterns(pattern)?;
        Ok(self)
    }

    /// 设置排除模式；匹配的文件名即使满足 `with_pattern` 也被跳过
    pub fn excluding(mut self, pattern: &str) -> Result<Self> {
        self.excluded = compile_patterns(pattern)?;
        Ok(self)
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 收集所有匹配的文件
    pub fn collect(&self) -> Vec<PathBuf> {
        if self.input.is_file() {
            return vec![self.input.clone()];
        }

        if !self.input.is_dir() {
            return vec![];
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };

        let mut files: Vec<PathBuf> = WalkDir::new(&self.input)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| self.matches(e.path()))
            .map(|e| e.path().to_path_buf())
            .collect();

        files.sort();
        files
    }

    fn matches(&self, path: &Path) -> bool {
        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };

        if self.excluded.iter().any(|p| p.matches(filename)) {
            return false;
        }
        if self.patterns.is_empty() {
            return true;
        }
        self.patterns.iter().any(|p| p.matches(filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_pattern_matching() {
        let collector = FileCollector::new(PathBuf::from("."))
            .with_pattern("*.csv, defect_?.txt")
            .unwrap();
        assert!(collector.matches(Path::new("dir/ZnO.csv")));
        assert!(collector.matches(Path::new("defect_1.txt")));
        assert!(!collector.matches(Path::new("defect_12.txt")));
        assert!(!collector.matches(Path::new("ZnO.json")));
    }

    #[test]
    fn test_excluded_patterns_win() {
        let collector = FileCollector::new(PathBuf::from("."))
            .with_pattern(DEFAULT_PATTERN)
            .unwrap()
            .excluding("*_diagram.*")
            .unwrap();
        assert!(collector.matches(Path::new("ZnO.csv")));
        assert!(!collector.matches(Path::new("ZnO_diagram.csv")));
        assert!(FileCollector::new(PathBuf::from(".")).excluding("[a-").is_err());
    }

    #[test]
    fn test_invalid_pattern() {
        let result = FileCollector::new(PathBuf::from(".")).with_pattern("[a-");
        assert!(matches!(result, Err(DefectError::InvalidArgument(_))));
    }

    #[test]
    fn test_collect_sorted_and_recursive() {
        let dir = std::env::temp_dir().join("qdefect_collector_test");
        fs::remove_dir_all(&dir).ok();
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("b.csv"), "bg,1.0\n").unwrap();
        fs::write(dir.join("a.csv"), "bg,1.0\n").unwrap();
        fs::write(dir.join("notes.txt"), "").unwrap();
        fs::write(dir.join("nested").join("c.csv"), "bg,1.0\n").unwrap();

        let flat = FileCollector::new(dir.clone())
            .with_pattern(DEFAULT_PATTERN)
            .unwrap()
            .collect();
        assert_eq!(flat, vec![dir.join("a.csv"), dir.join("b.csv")]);

        let deep = FileCollector::new(dir.clone())
            .with_pattern(DEFAULT_PATTERN)
            .unwrap()
            .recursive(true)
            .collect();
        assert_eq!(deep.len(), 3);

        fs::remove_dir_all(&dir).ok();
    }
}
