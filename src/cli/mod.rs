//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `diagram`: 由缺陷模板计算形成能图（单文件或批量）
//! - `inspect`: 检查模板内容与各角点的 ΔH(0)
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: diagram, inspect

pub mod diagram;
pub mod inspect;

use clap::{Parser, Subcommand};

/// qdefect - 点缺陷形成能图工具
#[derive(Parser)]
#[command(name = "qdefect")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Point-defect formation energy diagrams from defect templates", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Compute formation-energy envelopes for every chemical-potential corner
    Diagram(diagram::DiagramArgs),

    /// Show the parsed template and the formation enthalpy at Fermi level 0
    Inspect(inspect::InspectArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_diagram_args() {
        let cli = Cli::try_parse_from([
            "qdefect",
            "diagram",
            "ZnO.csv",
            "--strategy",
            "exact",
            "-f",
            "svg",
            "--skip-missing",
        ])
        .unwrap();

        match cli.command {
            Commands::Diagram(args) => {
                assert_eq!(args.strategy, diagram::StrategyArg::Exact);
                assert_eq!(args.format, Some(diagram::OutputFormat::Svg));
                assert_eq!(args.samples, 100);
                assert!(args.skip_missing);
                assert_eq!(args.pattern, "*.csv");
            }
            _ => panic!("expected diagram"),
        }
    }
}
