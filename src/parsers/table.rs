//! # 宽表模板解析器
//!
//! 解析带表头的多列 CSV 模板：缺陷块与相稳定角点块并排存放。
//!
//! ## 表头说明
//! ```text
//! defect,site,charge,dHvbm,na,nb,nc,nd,ne,nf,ng,point,dmuA,...,dmuG,bandgap,formula,phase_stabilty_points
//! ```
//! - 缺陷行: `defect` 非空；ΔH(0) = dHvbm + Σ n_X · dmuX
//! - 角点行: `point` 非空；化学势按轴字母 A..G 存储
//! - `bandgap`, `formula`, `phase_stabilty_points` 取第一个非空值
//!
//! 空单元格表示该轴不参与计算。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `models/` 数据模型
//! - 使用 `csv` + `serde` 反序列化

use crate::error::{DefectError, Result};
use crate::models::{ChemicalCorner, DefectDescriptor, DefectKind, EnthalpyTerms, Template};
use crate::thermo::lines::{parse_charge, validate_bandgap};

use serde::Deserialize;
use std::collections::HashMap;

/// 化学势轴
const AXES: [&str; 7] = ["A", "B", "C", "D", "E", "F", "G"];

/// 宽表中的一行
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TableRow {
    defect: Option<String>,
    site: Option<String>,
    charge: Option<String>,
    #[serde(rename = "dHvbm")]
    dh_vbm: Option<f64>,
    na: Option<f64>,
    nb: Option<f64>,
    nc: Option<f64>,
    nd: Option<f64>,
    ne: Option<f64>,
    nf: Option<f64>,
    ng: Option<f64>,
    point: Option<String>,
    #[serde(rename = "dmuA")]
    dmu_a: Option<f64>,
    #[serde(rename = "dmuB")]
    dmu_b: Option<f64>,
    #[serde(rename = "dmuC")]
    dmu_c: Option<f64>,
    #[serde(rename = "dmuD")]
    dmu_d: Option<f64>,
    #[serde(rename = "dmuE")]
    dmu_e: Option<f64>,
    #[serde(rename = "dmuF")]
    dmu_f: Option<f64>,
    #[serde(rename = "dmuG")]
    dmu_g: Option<f64>,
    bandgap: Option<f64>,
    formula: Option<String>,
    phase_stabilty_points: Option<f64>,
}

impl TableRow {
    fn counts(&self) -> [Option<f64>; 7] {
        [self.na, self.nb, self.nc, self.nd, self.ne, self.nf, self.ng]
    }

    fn potentials(&self) -> [Option<f64>; 7] {
        [
            self.dmu_a, self.dmu_b, self.dmu_c, self.dmu_d, self.dmu_e, self.dmu_f, self.dmu_g,
        ]
    }
}

/// 非空文本单元格
fn filled(cell: &Option<String>) -> Option<&str> {
    cell.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// 解析宽表内容
pub fn parse_table_content(content: &str, source: &str) -> Result<Template> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut bandgap = None;
    let mut formula = None;
    let mut corner_limit = None;
    let mut corners: Vec<ChemicalCorner> = Vec::new();
    let mut defects: Vec<DefectDescriptor> = Vec::new();
    let mut occurrences: HashMap<(String, String, i32), usize> = HashMap::new();

    for (line, result) in reader.deserialize::<TableRow>().enumerate() {
        let row = result.map_err(|e| DefectError::ParseError {
            format: "table".to_string(),
            path: source.to_string(),
            reason: format!("Row {}: {}", line + 2, e),
        })?;

        if bandgap.is_none() {
            bandgap = row.bandgap;
        }
        if formula.is_none() {
            formula = filled(&row.formula).map(str::to_string);
        }
        if corner_limit.is_none() {
            corner_limit = row.phase_stabilty_points;
        }

        if let Some(kind) = filled(&row.defect) {
            defects.push(defect_from_row(&row, kind, source, &mut occurrences)?);
        }

        if let Some(point) = filled(&row.point) {
            let mut corner = ChemicalCorner::new(corners.len() + 1, point);
            for (axis, value) in AXES.iter().zip(row.potentials()) {
                if let Some(value) = value {
                    corner = corner.with_potential(*axis, value);
                }
            }
            corners.push(corner);
        }
    }

    let bandgap = bandgap.ok_or_else(|| DefectError::MissingField {
        field: "bandgap".to_string(),
        path: source.to_string(),
    })?;
    let bandgap = validate_bandgap(bandgap)?;

    if let Some(limit) = corner_limit {
        corners.truncate(limit.max(0.0) as usize);
    }

    Ok(Template {
        source: source.to_string(),
        formula: formula.unwrap_or_default(),
        bandgap,
        corners,
        defects,
        unrecognized: Vec::new(),
    })
}

fn defect_from_row(
    row: &TableRow,
    kind: &str,
    source: &str,
    occurrences: &mut HashMap<(String, String, i32), usize>,
) -> Result<DefectDescriptor> {
    let site = filled(&row.site).ok_or_else(|| DefectError::MissingField {
        field: format!("site (defect '{}')", kind),
        path: source.to_string(),
    })?;
    let charge_text = filled(&row.charge).unwrap_or("");
    let label = format!("{}_{}", kind, site);
    let charge = parse_charge(&label, charge_text)?;
    let dh_vbm = row.dh_vbm.ok_or_else(|| DefectError::MissingField {
        field: format!("dHvbm (defect '{}')", label),
        path: source.to_string(),
    })?;

    let counter = occurrences
        .entry((kind.to_string(), site.to_string(), charge))
        .or_insert(0);
    *counter += 1;
    let index = counter.to_string();

    let counts = AXES
        .iter()
        .zip(row.counts())
        .filter_map(|(axis, n)| n.map(|n| (axis.to_string(), n)))
        .collect();

    Ok(DefectDescriptor {
        key: format!("{}_{}_{}_{}", kind, site, charge, index),
        kind: DefectKind::from_symbol(kind),
        site: site.to_string(),
        charge,
        index,
        terms: EnthalpyTerms::Stoichiometric { dh_vbm, counts },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thermo::enthalpy::formation_enthalpy;

    const TABLE: &str = "\
defect,site,charge,dHvbm,na,nb,nc,nd,ne,nf,ng,point,dmuA,dmuB,dmuC,dmuD,dmuE,dmuF,dmuG,bandgap,formula,phase_stabilty_points
V,Cu,0,1.2,1,0,,,,,,1,0.0,-1.0,,,,,,1.5,Cu2O,2
V,Cu,-1,1.5,1,0,,,,,,2,-0.5,0.0,,,,,,,,
V,O,2,0.8,0,1,,,,,,3,-0.2,-0.6,,,,,,,,
V,O,2,0.9,0,1,,,,,,,,,,,,,,,,
";

    #[test]
    fn test_parse_table() {
        let template = parse_table_content(TABLE, "Cu2O.csv").unwrap();
        assert_eq!(template.bandgap, 1.5);
        assert_eq!(template.formula, "Cu2O");
        // phase_stabilty_points limits the corners used
        assert_eq!(template.corners.len(), 2);
        assert_eq!(template.corners[1].potential("A"), Some(-0.5));
        assert_eq!(template.corners[1].potential("C"), None);

        assert_eq!(template.defects.len(), 4);
        assert_eq!(template.defects[2].key, "V_O_2_1");
        assert_eq!(template.defects[3].key, "V_O_2_2");
        assert_eq!(template.families().len(), 2);
    }

    #[test]
    fn test_table_enthalpy() {
        let template = parse_table_content(TABLE, "Cu2O.csv").unwrap();
        // V_Cu q=0 at corner 2: 1.2 + 1 * -0.5 + 0 * 0.0
        let h = formation_enthalpy(&template.corners[1], &template.defects[0]).unwrap();
        assert_eq!(h, 0.7);
    }

    #[test]
    fn test_table_malformed_charge() {
        let content = "defect,site,charge,dHvbm,bandgap\nV,O,+2e,1.0,2.0\n";
        assert!(matches!(
            parse_table_content(content, "t.csv"),
            Err(DefectError::MalformedCharge { .. })
        ));
    }

    #[test]
    fn test_table_missing_bandgap() {
        let content = "defect,site,charge,dHvbm\nV,O,1,1.0\n";
        assert!(matches!(
            parse_table_content(content, "t.csv"),
            Err(DefectError::MissingField { .. })
        ));
    }
}
