//! # 终端输出样式
//!
//! 统一的状态前缀：`[OK]`, `[ERR]`, `[WARN]`, `[*]`, `[SKIP]`, `[DONE]`。
//! 错误输出到 stderr，其余输出到 stdout。
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `colored` crate

use colored::Colorize;
use std::path::Path;

pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

pub fn print_info(msg: &str) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

pub fn print_skip(msg: &str) {
    println!("{} {}", "[SKIP]".dimmed(), msg);
}

pub fn print_done(msg: &str) {
    println!("{} {}", "[DONE]".green().bold(), msg);
}

/// 打印 `模板 -> 输出文件`
pub fn print_written(input: &Path, output: &Path) {
    println!(
        "{} {} {} {}",
        "[OK]".green().bold(),
        input.display().to_string().dimmed(),
        "->".cyan(),
        output.display()
    );
}

/// 打印标题栏
pub fn print_header(title: &str) {
    let line = "─".repeat(60);
    println!("\n{}", line.dimmed());
    println!("  {}", title.bold());
    println!("{}\n", line.dimmed());
}

pub fn print_separator() {
    println!("{}", "─".repeat(60).dimmed());
}
