//! # diagram 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/diagram.rs`

use crate::batch::DEFAULT_PATTERN;
use crate::parsers::Layout;
use crate::thermo::EnvelopeStrategy;

use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// 包络线算法
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum StrategyArg {
    /// Evaluate every charge line on an evenly spaced Fermi grid
    #[default]
    Sampling,
    /// Minimum-area search over pairwise intersections, verified against sampling
    Exact,
}

impl From<StrategyArg> for EnvelopeStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Sampling => EnvelopeStrategy::Sampling,
            StrategyArg::Exact => EnvelopeStrategy::Exact,
        }
    }
}

/// 模板格式
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum LayoutArg {
    /// Detect from the header row
    #[default]
    Auto,
    /// Two-column key/value template
    Template,
    /// Wide table with dHvbm and dmu columns
    Table,
}

impl From<LayoutArg> for Layout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Auto => Layout::Auto,
            LayoutArg::Template => Layout::KeyValue,
            LayoutArg::Table => Layout::Table,
        }
    }
}

/// 输出格式
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Full JSON record
    Json,
    /// Flat envelope rows
    Csv,
    /// PNG chart per corner
    Png,
    /// SVG chart per corner
    Svg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
        }
    }
}

/// diagram 子命令参数
#[derive(Args, Debug)]
pub struct DiagramArgs {
    /// Input: defect template file or directory of templates
    pub input: PathBuf,

    /// Output: file path (single mode) or directory (batch mode)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format (auto-detected from extension if not specified, else json)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Lower-envelope algorithm
    #[arg(long, value_enum, default_value = "sampling")]
    pub strategy: StrategyArg,

    /// Number of Fermi-level samples over [0, Eg]
    #[arg(long, default_value_t = 100)]
    pub samples: usize,

    /// Template layout
    #[arg(long, value_enum, default_value = "auto")]
    pub layout: LayoutArg,

    /// Skip defect families whose chemical potentials are missing at a corner
    #[arg(long, default_value_t = false)]
    pub skip_missing: bool,

    /// Attach an evenly resampled curve with N points to each family (JSON only, 0 = off)
    #[arg(long, default_value_t = 0)]
    pub curve_points: usize,

    /// Figure width in pixels (for PNG) or points (for SVG)
    #[arg(long, default_value_t = 1200)]
    pub width: u32,

    /// Figure height in pixels (for PNG) or points (for SVG)
    #[arg(long, default_value_t = 800)]
    pub height: u32,

    /// Do not print per-corner summary tables
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,

    // ─────────────────────────────────────────────────────────────
    // 批量处理参数
    // ─────────────────────────────────────────────────────────────
    /// Glob pattern for template files (batch mode, comma separated)
    #[arg(long, default_value = DEFAULT_PATTERN)]
    pub pattern: String,

    /// Number of parallel jobs (0 = auto, batch mode only)
    #[arg(short, long, default_value_t = 0, env = "QDEFECT_JOBS")]
    pub jobs: usize,

    /// Recurse into subdirectories (batch mode)
    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    /// Overwrite existing output files
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,
}
