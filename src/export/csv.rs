//! # CSV 数据导出
//!
//! 将所有角点的包络线展平为逐行记录，便于表格软件或脚本读取。
//!
//! ## 列说明
//! `corner, rich_label, defect, segment_charge, fermi_level, energy`
//!
//! 每个包络线断点一行；`segment_charge` 为从该断点开始的线段电荷，
//! 最后一个断点沿用最后一段的电荷。
//!
//! ## 依赖关系
//! - 被 `commands/diagram.rs` 调用
//! - 使用 `csv` 库写入

use crate::error::{DefectError, Result};
use crate::export::EXPORT_DIGITS;
use crate::thermo::DiagramReport;

use std::io::Write;
use std::path::Path;

const HEADER: [&str; 6] = [
    "corner",
    "rich_label",
    "defect",
    "segment_charge",
    "fermi_level",
    "energy",
];

/// 写入任意输出流；`target` 用于错误信息
pub fn write_csv<W: Write>(report: &DiagramReport, writer: W, target: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HEADER)?;

    for corner in &report.corners {
        let rich = corner.rich_label.clone().unwrap_or_default();
        for family in &corner.families {
            let envelope = &family.envelope;
            for (i, point) in envelope.breakpoints.iter().enumerate() {
                let charge = envelope
                    .charges
                    .get(i)
                    .or_else(|| envelope.charges.last())
                    .copied()
                    .unwrap_or_default();

                wtr.write_record(&[
                    corner.label.clone(),
                    rich.clone(),
                    family.label.clone(),
                    charge.to_string(),
                    format!("{:.*}", EXPORT_DIGITS, point.fermi_level),
                    format!("{:.*}", EXPORT_DIGITS, point.energy),
                ])?;
            }
        }
    }

    wtr.flush().map_err(|e| DefectError::FileWriteError {
        path: target.display().to_string(),
        source: e,
    })?;
    Ok(())
}

/// 导出为 CSV 文件
pub fn to_csv(report: &DiagramReport, output_path: &Path) -> Result<()> {
    let file = std::fs::File::create(output_path).map_err(|e| DefectError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })?;
    write_csv(report, file, output_path)
}
