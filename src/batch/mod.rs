//! # 批量处理模块
//!
//! 对目录中的多个缺陷模板并行生成形成能图。
//!
//! ## 功能
//! - 收集匹配的模板文件
//! - 线程池并行处理，进度反馈与统计
//!
//! ## 依赖关系
//! - 被 `commands/diagram.rs` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::{FileCollector, DEFAULT_PATTERN};
pub use runner::{BatchRunner, ProcessResult};
