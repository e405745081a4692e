//! # diagram 子命令实现
//!
//! 读取缺陷模板，计算每个角点上各缺陷族的下包络线，并导出结果。
//!
//! ## 功能
//! - 支持单文件和批量目录处理
//! - 批量模式下模板之间并行（rayon 线程池）
//! - 输出 JSON / CSV 数据，或每个角点一张 PNG / SVG 图
//! - 单文件模式打印每个角点的汇总表格
//!
//! ## 依赖关系
//! - 使用 `cli/diagram.rs` 定义的 DiagramArgs
//! - 使用 `batch/` 模块进行批量处理
//! - 使用 `parsers/`, `thermo/`, `export/`

use crate::batch::{BatchRunner, FileCollector, ProcessResult};
use crate::cli::diagram::{DiagramArgs, OutputFormat};
use crate::error::{DefectError, Result};
use crate::export::{self, plot::PlotSize};
use crate::models::diagram::format_charge;
use crate::models::Template;
use crate::parsers::{self, Layout};
use crate::thermo::{Aggregator, CornerReport, DiagramReport, MissingValuePolicy};
use crate::utils::output;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 本命令写出的文件名，批量收集时排除，重复运行不会把输出当作模板
const OUTPUT_PATTERN: &str = "*_diagram.*, *_diagram_corner*.*";

/// 一次运行共享的配置
struct DiagramConfig {
    aggregator: Aggregator,
    layout: Layout,
    curve_points: usize,
    size: PlotSize,
    overwrite: bool,
}

impl DiagramConfig {
    fn from_args(args: &DiagramArgs) -> Result<Self> {
        if args.samples < 2 {
            return Err(DefectError::InvalidArgument(format!(
                "--samples must be at least 2, got {}",
                args.samples
            )));
        }

        let policy = if args.skip_missing {
            MissingValuePolicy::Skip
        } else {
            MissingValuePolicy::Abort
        };

        Ok(Self {
            aggregator: Aggregator::new(args.strategy.into(), args.samples, policy),
            layout: args.layout.into(),
            curve_points: args.curve_points,
            size: PlotSize {
                width: args.width,
                height: args.height,
            },
            overwrite: args.overwrite,
        })
    }
}

/// 执行 diagram 子命令
pub fn execute(args: DiagramArgs) -> Result<()> {
    output::print_header("Defect Formation Energy Diagram");

    let config = DiagramConfig::from_args(&args)?;

    if args.input.is_file() {
        execute_single_file(&args, &config)
    } else if args.input.is_dir() {
        execute_batch(&args, Arc::new(config))
    } else {
        Err(DefectError::FileNotFound {
            path: args.input.display().to_string(),
        })
    }
}

/// 单文件模式
fn execute_single_file(args: &DiagramArgs, config: &DiagramConfig) -> Result<()> {
    output::print_info(&format!("Single file mode: '{}'", args.input.display()));

    let format = args.format.unwrap_or_else(|| match &args.output {
        Some(path) => guess_format_from_extension(path),
        None => OutputFormat::Json,
    });
    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input, format));

    let template = parsers::parse_template_file(&args.input, config.layout)?;
    for key in &template.unrecognized {
        output::print_warning(&format!("Unrecognized key '{}' ignored", key));
    }
    output::print_success(&format!(
        "Loaded template: {} (Eg = {:.4} eV, {} corners, {} defects)",
        template.formula,
        template.bandgap,
        template.corners.len(),
        template.defects.len()
    ));

    let report = config.aggregator.run(&template)?;

    if !args.quiet {
        for corner in &report.corners {
            print_corner_table(corner, report.bandgap);
        }
    }

    let targets = output_targets(&report, &output_path, format);
    if !config.overwrite {
        if let Some(existing) = targets.iter().find(|p| p.exists()) {
            output::print_skip(&format!(
                "Output exists, use --overwrite to replace: {}",
                existing.display()
            ));
            return Ok(());
        }
    }

    ensure_parent_dir(&output_path)?;
    write_report(&report, &template, &output_path, format, config)?;

    for target in &targets {
        output::print_written(&args.input, target);
    }
    output::print_done(&format!("{} corner(s) processed", report.corners.len()));

    Ok(())
}

/// 批量处理模式
fn execute_batch(args: &DiagramArgs, config: Arc<DiagramConfig>) -> Result<()> {
    output::print_info(&format!("Batch mode: directory '{}'", args.input.display()));

    let files = collect_templates(&args.input, &args.pattern, args.recursive)?;

    if files.is_empty() {
        output::print_warning(&format!(
            "No matching files found with pattern '{}'",
            args.pattern
        ));
        return Ok(());
    }

    output::print_info(&format!("Found {} template files", files.len()));

    let output_dir = args.output.clone().unwrap_or_else(|| args.input.clone());
    fs::create_dir_all(&output_dir).map_err(|e| DefectError::FileWriteError {
        path: output_dir.display().to_string(),
        source: e,
    })?;

    let format = args.format.unwrap_or(OutputFormat::Json);
    output::print_info(&format!("Output format: {}", format.extension()));

    let runner = BatchRunner::new(args.jobs).quiet(args.quiet);
    output::print_info(&format!("Using {} parallel jobs", runner.jobs()));
    let result = runner.run(files, |file| {
        process_batch_file(file, &output_dir, format, &config)
    })?;

    output::print_separator();
    output::print_success(&format!(
        "Batch complete: {} file(s), {} success, {} skipped, {} failed",
        result.total(),
        result.success,
        result.skipped,
        result.failed
    ));

    if !result.failures.is_empty() {
        output::print_warning("Failed files:");
        for (path, err) in result.failures.iter().take(10) {
            output::print_error(&format!("  {}: {}", path, err));
        }
        if result.failures.len() > 10 {
            output::print_warning(&format!("  ... and {} more", result.failures.len() - 10));
        }
    }

    Ok(())
}

/// 收集批量模式的模板，跳过已生成的输出
fn collect_templates(input: &Path, pattern: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    Ok(FileCollector::new(input.to_path_buf())
        .with_pattern(pattern)?
        .excluding(OUTPUT_PATTERN)?
        .recursive(recursive)
        .collect())
}

/// 处理批量模式中的单个模板
fn process_batch_file(
    input: &PathBuf,
    output_dir: &Path,
    format: OutputFormat,
    config: &DiagramConfig,
) -> ProcessResult {
    let output_file = output_dir.join(output_file_name(input, format));

    let outcome = parsers::parse_template_file(input, config.layout).and_then(|template| {
        let report = config.aggregator.run(&template)?;
        let targets = output_targets(&report, &output_file, format);
        if !config.overwrite && targets.iter().any(|p| p.exists()) {
            return Ok(None);
        }
        write_report(&report, &template, &output_file, format, config)?;
        Ok(Some(targets))
    });

    match outcome {
        Ok(Some(_)) => {
            ProcessResult::Success(format!("{} -> {}", input.display(), output_file.display()))
        }
        Ok(None) => ProcessResult::Skipped(format!(
            "Output exists, skipping: {}",
            output_file.display()
        )),
        Err(e) => ProcessResult::Failed(input.display().to_string(), e.to_string()),
    }
}

/// 写出结果
fn write_report(
    report: &DiagramReport,
    template: &Template,
    output_path: &Path,
    format: OutputFormat,
    config: &DiagramConfig,
) -> Result<()> {
    match format {
        OutputFormat::Json => export::json::to_json(report, config.curve_points, output_path),
        OutputFormat::Csv => export::csv::to_csv(report, output_path),
        OutputFormat::Png | OutputFormat::Svg => {
            let use_svg = format == OutputFormat::Svg;
            for corner in &report.corners {
                let path = export::plot::corner_plot_path(output_path, corner.index, use_svg);
                let title = plot_title(template, corner);
                export::plot::generate_corner_plot(
                    corner,
                    report.bandgap,
                    &title,
                    &path,
                    config.size,
                    use_svg,
                )?;
            }
            Ok(())
        }
    }
}

/// 实际会写出的文件列表
fn output_targets(report: &DiagramReport, output_path: &Path, format: OutputFormat) -> Vec<PathBuf> {
    match format {
        OutputFormat::Json | OutputFormat::Csv => vec![output_path.to_path_buf()],
        OutputFormat::Png | OutputFormat::Svg => report
            .corners
            .iter()
            .map(|c| {
                export::plot::corner_plot_path(output_path, c.index, format == OutputFormat::Svg)
            })
            .collect(),
    }
}

fn plot_title(template: &Template, corner: &CornerReport) -> String {
    match &corner.rich_label {
        Some(rich) => format!("{} ({}, corner {})", template.formula, rich, corner.label),
        None => format!("{} (corner {})", template.formula, corner.label),
    }
}

/// `<stem>_diagram.<ext>`
fn output_file_name(input: &Path, format: OutputFormat) -> String {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("template");
    format!("{}_diagram.{}", stem, format.extension())
}

fn default_output_path(input: &Path, format: OutputFormat) -> PathBuf {
    input.with_file_name(output_file_name(input, format))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| DefectError::FileWriteError {
                path: parent.display().to_string(),
                source: e,
            })
        }
        _ => Ok(()),
    }
}

/// 从文件扩展名推断输出格式
fn guess_format_from_extension(path: &Path) -> OutputFormat {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        Some("csv") => OutputFormat::Csv,
        Some("png") => OutputFormat::Png,
        Some("svg") => OutputFormat::Svg,
        _ => OutputFormat::Json,
    }
}

/// 打印单个角点的汇总表格
fn print_corner_table(corner: &CornerReport, bandgap: f64) {
    use tabled::{Table, Tabled};

    #[derive(Tabled)]
    struct FamilyRow {
        #[tabled(rename = "Defect")]
        label: String,
        #[tabled(rename = "Stable charges")]
        charges: String,
        #[tabled(rename = "Transition levels (eV)")]
        transitions: String,
        #[tabled(rename = "ΔH(E_F=0)")]
        at_vbm: String,
        #[tabled(rename = "ΔH(E_F=Eg)")]
        at_cbm: String,
        #[tabled(rename = "Method")]
        method: String,
    }

    let rows: Vec<FamilyRow> = corner
        .families
        .iter()
        .map(|f| {
            let transitions = f
                .transitions
                .iter()
                .map(|t| {
                    format!(
                        "ε({}/{}) = {:.3}",
                        format_charge(t.from_charge),
                        format_charge(t.to_charge),
                        t.fermi_level
                    )
                })
                .collect::<Vec<_>>();

            FamilyRow {
                label: f.label.clone(),
                charges: f
                    .envelope
                    .charges
                    .iter()
                    .map(|&q| format_charge(q))
                    .collect::<Vec<_>>()
                    .join(" → "),
                transitions: if transitions.is_empty() {
                    "-".to_string()
                } else {
                    transitions.join(", ")
                },
                at_vbm: format!("{:.4}", f.envelope.value_at(0.0)),
                at_cbm: format!("{:.4}", f.envelope.value_at(bandgap)),
                method: f.envelope.method.to_string(),
            }
        })
        .collect();

    let title = match &corner.rich_label {
        Some(rich) => format!("Corner {} ({})", corner.label, rich),
        None => format!("Corner {}", corner.label),
    };
    output::print_header(&title);

    if rows.is_empty() {
        output::print_warning("No defect families evaluated at this corner");
    } else {
        println!("{}", Table::new(&rows));
    }

    for skipped in &corner.skipped {
        output::print_skip(&format!("{}: {}", skipped.label, skipped.reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::DEFAULT_PATTERN;

    #[test]
    fn test_guess_format_from_extension() {
        assert_eq!(guess_format_from_extension(Path::new("a.CSV")), OutputFormat::Csv);
        assert_eq!(guess_format_from_extension(Path::new("a.svg")), OutputFormat::Svg);
        assert_eq!(guess_format_from_extension(Path::new("a.png")), OutputFormat::Png);
        assert_eq!(guess_format_from_extension(Path::new("a.out")), OutputFormat::Json);
        assert_eq!(guess_format_from_extension(Path::new("a")), OutputFormat::Json);
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name(Path::new("data/ZnO.csv"), OutputFormat::Json),
            "ZnO_diagram.json"
        );
        assert_eq!(
            default_output_path(Path::new("data/ZnO.csv"), OutputFormat::Svg),
            PathBuf::from("data/ZnO_diagram.svg")
        );
    }

    #[test]
    fn test_batch_file_writes_and_skips() {
        let dir = std::env::temp_dir().join("qdefect_diagram_batch_test");
        fs::remove_dir_all(&dir).ok();
        fs::create_dir_all(&dir).unwrap();
        let input = dir.join("ZnO.csv");
        fs::write(&input, "bg,2.0\nZn-1,0.0\nO-1,-3.0\nV_O_1_1,3.5\nV_O_-1_1,4.5\n").unwrap();

        let config = DiagramConfig {
            aggregator: Aggregator::default(),
            layout: Layout::Auto,
            curve_points: 0,
            size: PlotSize::default(),
            overwrite: false,
        };

        let first = process_batch_file(&input, &dir, OutputFormat::Csv, &config);
        assert!(matches!(first, ProcessResult::Success(_)));
        assert!(dir.join("ZnO_diagram.csv").exists());

        let second = process_batch_file(&input, &dir, OutputFormat::Csv, &config);
        assert!(matches!(second, ProcessResult::Skipped(_)));

        let missing = process_batch_file(&dir.join("none.csv"), &dir, OutputFormat::Csv, &config);
        assert!(matches!(missing, ProcessResult::Failed(_, _)));

        fs::write(dir.join("ZnO_diagram_corner1.csv"), "").unwrap();
        let rerun = collect_templates(&dir, DEFAULT_PATTERN, false).unwrap();
        assert_eq!(rerun, vec![input.clone()]);

        fs::remove_dir_all(&dir).ok();
    }
}
