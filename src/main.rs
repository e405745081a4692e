//! # qdefect - 点缺陷形成能图工具
//!
//! 由缺陷模板（带隙、化学势角点、各电荷态的缺陷焓）计算每个角点上
//! 各缺陷族的形成能-费米能级下包络线与电荷转变能级。
//!
//! ## 子命令
//! - `diagram` - 计算并导出形成能图 (JSON / CSV / PNG / SVG)
//! - `inspect` - 检查模板内容与 ΔH(E_F = 0)
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── parsers/   (模板解析器)
//!   │     ├── thermo/    (形成焓、直线、包络线、角点聚合)
//!   │     ├── export/    (JSON / CSV / 图表导出)
//!   │     ├── batch/     (批量并行处理)
//!   │     └── models/    (数据模型)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod error;
mod export;
mod models;
mod parsers;
mod thermo;
mod utils;

use clap::Parser;
use cli::Cli;

fn main() {
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
