//! # JSON 记录导出
//!
//! 每个模板输出一份记录：角点 → 缺陷 ΔH(0) + 各缺陷族的直线、包络线与
//! 电荷转变能级。所有浮点数在此处统一保留 5 位小数。
//!
//! ## 依赖关系
//! - 被 `commands/diagram.rs` 调用
//! - 使用 `serde_json`

use crate::error::{DefectError, Result};
use crate::export::EXPORT_DIGITS;
use crate::models::diagram::format_charge;
use crate::models::{Breakpoint, ChargeLine};
use crate::thermo::{round_decimals, CornerReport, DiagramReport, FamilyRecord};

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

fn r(value: f64) -> f64 {
    round_decimals(value, EXPORT_DIGITS)
}

/// 两个平行序列表示的曲线
#[derive(Debug, Serialize)]
pub struct CurveRecord {
    pub fermi_level: Vec<f64>,
    pub energy: Vec<f64>,
}

impl CurveRecord {
    fn from_points(points: &[Breakpoint]) -> Self {
        CurveRecord {
            fermi_level: points.iter().map(|p| r(p.fermi_level)).collect(),
            energy: points.iter().map(|p| r(p.energy)).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LineRecord {
    pub key: String,
    pub charge: i32,
    pub intercept: f64,
    pub fermi_level: [f64; 2],
    pub energy: [f64; 2],
}

impl From<&ChargeLine> for LineRecord {
    fn from(line: &ChargeLine) -> Self {
        LineRecord {
            key: line.key.clone(),
            charge: line.charge,
            intercept: r(line.intercept),
            fermi_level: [r(line.start.fermi_level), r(line.end.fermi_level)],
            energy: [r(line.start.energy), r(line.end.energy)],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransitionRecord {
    pub label: String,
    pub fermi_level: f64,
    pub energy: f64,
}

#[derive(Debug, Serialize)]
pub struct FamilyExport {
    pub label: String,
    pub method: String,
    pub lines: Vec<LineRecord>,
    pub envelope: CurveRecord,
    pub segment_charges: Vec<i32>,
    pub transitions: Vec<TransitionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curve: Option<CurveRecord>,
}

impl FamilyExport {
    fn new(family: &FamilyRecord, curve_points: usize) -> Self {
        FamilyExport {
            label: family.label.clone(),
            method: family.envelope.method.to_string(),
            lines: family.lines.iter().map(LineRecord::from).collect(),
            envelope: CurveRecord::from_points(&family.envelope.breakpoints),
            segment_charges: family.envelope.charges.clone(),
            transitions: family
                .transitions
                .iter()
                .map(|t| TransitionRecord {
                    label: format!(
                        "{}/{}",
                        format_charge(t.from_charge),
                        format_charge(t.to_charge)
                    ),
                    fermi_level: r(t.fermi_level),
                    energy: r(t.energy),
                })
                .collect(),
            curve: (curve_points >= 2)
                .then(|| CurveRecord::from_points(&family.envelope.resample(curve_points))),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DefectEnthalpyRecord {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub site: String,
    pub charge: i32,
    pub index: String,
    pub enthalpy: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SkippedRecord {
    pub label: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct CornerExport {
    pub index: usize,
    pub label: String,
    pub rich_label: Option<String>,
    pub potentials: BTreeMap<String, f64>,
    pub defects: Vec<DefectEnthalpyRecord>,
    pub families: Vec<FamilyExport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedRecord>,
}

impl CornerExport {
    fn new(corner: &CornerReport, curve_points: usize) -> Self {
        CornerExport {
            index: corner.index,
            label: corner.label.clone(),
            rich_label: corner.rich_label.clone(),
            potentials: corner
                .potentials
                .iter()
                .map(|(k, v)| (k.clone(), r(*v)))
                .collect(),
            defects: corner
                .defects
                .iter()
                .map(|d| DefectEnthalpyRecord {
                    key: d.key.clone(),
                    kind: d.kind.clone(),
                    site: d.site.clone(),
                    charge: d.charge,
                    index: d.index.clone(),
                    enthalpy: d.enthalpy.map(r),
                })
                .collect(),
            families: corner
                .families
                .iter()
                .map(|f| FamilyExport::new(f, curve_points))
                .collect(),
            skipped: corner
                .skipped
                .iter()
                .map(|s| SkippedRecord {
                    label: s.label.clone(),
                    reason: s.reason.clone(),
                })
                .collect(),
        }
    }
}

/// 完整的导出记录
#[derive(Debug, Serialize)]
pub struct DiagramExport {
    pub source: String,
    pub formula: String,
    pub bandgap: f64,
    pub strategy: String,
    pub samples: usize,
    pub corners: Vec<CornerExport>,
}

impl DiagramExport {
    /// `curve_points >= 2` 时附带等距重采样曲线
    pub fn new(report: &DiagramReport, curve_points: usize) -> Self {
        DiagramExport {
            source: report.source.clone(),
            formula: report.formula.clone(),
            bandgap: r(report.bandgap),
            strategy: report.strategy.to_string(),
            samples: report.samples,
            corners: report
                .corners
                .iter()
                .map(|c| CornerExport::new(c, curve_points))
                .collect(),
        }
    }
}

/// 序列化为格式化 JSON 字符串
pub fn to_json_string(report: &DiagramReport, curve_points: usize) -> Result<String> {
    Ok(serde_json::to_string_pretty(&DiagramExport::new(
        report,
        curve_points,
    ))?)
}

/// 写出 JSON 文件
pub fn to_json(report: &DiagramReport, curve_points: usize, output_path: &Path) -> Result<()> {
    let file = File::create(output_path).map_err(|e| DefectError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);

    let text = to_json_string(report, curve_points)?;
    writeln!(writer, "{}", text).map_err(|e| DefectError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })?;
    writer.flush().map_err(|e| DefectError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::{parse_template_str, Layout};
    use crate::thermo::Aggregator;

    const TEMPLATE: &str = "bg,2.0
Zn-1,0.0
O-1,-3.0
V_O_1_1,3.5
V_O_-1_1,4.5
I_Zn_2_1,0.123456
";

    fn report() -> DiagramReport {
        let template = parse_template_str(TEMPLATE, "ZnO.csv", Layout::Auto).unwrap();
        Aggregator::default().run(&template).unwrap()
    }

    #[test]
    fn test_json_structure() {
        let json = to_json_string(&report(), 0).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["formula"], "ZnO");
        assert_eq!(value["strategy"], "sampling");
        let corner = &value["corners"][0];
        assert_eq!(corner["rich_label"], "Zn-rich");

        let v_o = &corner["families"][0];
        assert_eq!(v_o["label"], "V_O");
        assert_eq!(v_o["envelope"]["fermi_level"][1], 0.5);
        assert_eq!(v_o["envelope"]["energy"][2], -0.5);
        assert_eq!(v_o["transitions"][0]["label"], "+1/-1");
        assert!(v_o.get("curve").is_none());
        assert!(corner.get("skipped").is_none());
    }

    #[test]
    fn test_json_rounds_to_five_digits() {
        let report = report();
        let json = to_json_string(&report, 0).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        // 0.123456 → ΔH(0) rounded to 4 digits, slope 2 → end 4.1235
        let i_zn = &value["corners"][0]["families"][1];
        assert_eq!(i_zn["lines"][0]["intercept"], 0.1235);
        assert_eq!(i_zn["lines"][0]["energy"][1], 4.1235);
    }

    #[test]
    fn test_json_curve_points() {
        let json = to_json_string(&report(), 100).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let curve = &value["corners"][0]["families"][0]["curve"];
        assert_eq!(curve["fermi_level"].as_array().unwrap().len(), 100);
        assert_eq!(curve["energy"][0], 0.5);
    }

    #[test]
    fn test_json_is_byte_identical_across_runs() {
        let first = to_json_string(&report(), 50).unwrap();
        let second = to_json_string(&report(), 50).unwrap();
        assert_eq!(first, second);
    }
}
