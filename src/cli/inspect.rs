//! # inspect 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/inspect.rs`

use crate::cli::diagram::LayoutArg;

use clap::Args;
use std::path::PathBuf;

/// inspect 子命令参数
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Defect template file
    pub template: PathBuf,

    /// Template layout
    #[arg(long, value_enum, default_value = "auto")]
    pub layout: LayoutArg,
}
