//! # 结果导出模块
//!
//! 将形成能图结果写出为 JSON 记录、扁平 CSV 或图像。
//!
//! ## 子模块
//! - `json`: 结构化记录（浮点数保留 5 位小数）
//! - `csv`: 每个包络线断点一行
//! - `plot`: 每个角点一张形成能图
//!
//! ## 依赖关系
//! - 被 `commands/diagram.rs` 调用
//! - 使用 `thermo/aggregator.rs` 的报告结构

pub mod csv;
pub mod json;
pub mod plot;

/// 导出数值保留的小数位数
pub const EXPORT_DIGITS: usize = 5;
