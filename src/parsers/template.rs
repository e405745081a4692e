//! # 键值模板解析器
//!
//! 解析两列 CSV 缺陷模板（第一列为键，第二列为值）。
//!
//! ## 模板格式说明
//! ```text
//! bg,3.37                # 带隙 (eV)
//! formula,ZnO            # 可选，默认为角点元素按出现顺序拼接
//! Zn-1,0.0               # 元素 Zn 在角点 1 的化学势
//! O-1,-3.5
//! V_O_2_1,1.2            # <type>_<site>_<charge>_<index>: 相对焓
//! I_Zn_2_1,2.9
//! ```
//!
//! 每一行先被归类为带标签的 `TemplateRow`，再组装为 `Template`。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `models/` 数据模型
//! - 使用 `csv`, `regex`

use crate::error::{DefectError, Result};
use crate::models::{ChemicalCorner, DefectDescriptor, DefectKind, EnthalpyTerms, Template};
use crate::parsers::elements::is_element;
use crate::thermo::lines::{parse_charge, validate_bandgap};

use regex::Regex;
use std::sync::OnceLock;

/// 模板中的一行
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateRow {
    BandGap(f64),
    Formula(String),
    CornerPotential {
        element: String,
        corner: String,
        value: f64,
    },
    Defect(DefectDescriptor),
    Unrecognized(String),
}

fn corner_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([A-Z][a-z]?)-(\d+)$").expect("valid corner key regex"))
}

/// 解析模板内容
pub fn parse_template_content(content: &str, source: &str) -> Result<Template> {
    let rows = read_rows(content, source)?;
    assemble(rows, source)
}

/// 读取并归类所有行
pub fn read_rows(content: &str, source: &str) -> Result<Vec<TemplateRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let key = record.get(0).unwrap_or("");
        if key.is_empty() {
            continue;
        }
        let value = record.get(1).unwrap_or("");
        rows.push(classify_row(key, value, source)?);
    }

    Ok(rows)
}

/// 将一对键值归类为模板行
pub fn classify_row(key: &str, value: &str, source: &str) -> Result<TemplateRow> {
    if key == "bg" || key == "bandgap" {
        return Ok(TemplateRow::BandGap(parse_number(key, value, source)?));
    }

    if key == "formula" {
        return Ok(TemplateRow::Formula(value.to_string()));
    }

    let parts: Vec<&str> = key.split('_').collect();
    if parts.len() >= 4 {
        let descriptor = DefectDescriptor {
            key: key.to_string(),
            kind: DefectKind::from_symbol(parts[0]),
            site: parts[1].to_string(),
            charge: parse_charge(key, parts[2])?,
            index: parts[3..].join("_"),
            terms: EnthalpyTerms::Relative(parse_number(key, value, source)?),
        };
        return Ok(TemplateRow::Defect(descriptor));
    }

    if let Some(caps) = corner_key_pattern().captures(key) {
        let element = &caps[1];
        if is_element(element) {
            return Ok(TemplateRow::CornerPotential {
                element: element.to_string(),
                corner: caps[2].to_string(),
                value: parse_number(key, value, source)?,
            });
        }
    }

    Ok(TemplateRow::Unrecognized(key.to_string()))
}

/// 由归类后的行组装模板
pub fn assemble(rows: Vec<TemplateRow>, source: &str) -> Result<Template> {
    let mut bandgap = None;
    let mut formula = None;
    let mut atoms: Vec<String> = Vec::new();
    let mut corners: Vec<ChemicalCorner> = Vec::new();
    let mut defects: Vec<DefectDescriptor> = Vec::new();
    let mut unrecognized = Vec::new();

    for row in rows {
        match row {
            TemplateRow::BandGap(value) => bandgap = Some(value),
            TemplateRow::Formula(value) => formula = Some(value),
            TemplateRow::CornerPotential {
                element,
                corner,
                value,
            } => {
                if !atoms.contains(&element) {
                    atoms.push(element.clone());
                }
                let position = match corners.iter().position(|c| c.label == corner) {
                    Some(position) => position,
                    None => {
                        corners.push(ChemicalCorner::new(corners.len() + 1, corner));
                        corners.len() - 1
                    }
                };
                corners[position].potentials.insert(element, value);
            }
            TemplateRow::Defect(descriptor) => {
                if defects
                    .iter()
                    .any(|d| d.identity() == descriptor.identity())
                {
                    return Err(DefectError::DuplicateDefect {
                        key: descriptor.key,
                    });
                }
                defects.push(descriptor);
            }
            TemplateRow::Unrecognized(key) => unrecognized.push(key),
        }
    }

    let bandgap = bandgap.ok_or_else(|| DefectError::MissingField {
        field: "bg".to_string(),
        path: source.to_string(),
    })?;
    let bandgap = validate_bandgap(bandgap)?;

    Ok(Template {
        source: source.to_string(),
        formula: formula.unwrap_or_else(|| atoms.concat()),
        bandgap,
        corners,
        defects,
        unrecognized,
    })
}

fn parse_number(key: &str, value: &str, source: &str) -> Result<f64> {
    value.parse::<f64>().map_err(|_| DefectError::ParseError {
        format: "template".to_string(),
        path: source.to_string(),
        reason: format!("Invalid number '{}' for key '{}'", value, key),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZNO: &str = "bg,3.37
Zn-1,0.0
O-1,-3.5
Zn-2,-3.5
O-2,0.0
V_O_2_1,1.2
V_O_0_1,3.1
I_Zn_2_1,2.9
O_Zn_0_1,5.0
,
comment,ignored
";

    #[test]
    fn test_parse_template() {
        let template = parse_template_content(ZNO, "ZnO.csv").unwrap();
        assert_eq!(template.bandgap, 3.37);
        assert_eq!(template.formula, "ZnO");
        assert_eq!(template.corners.len(), 2);
        assert_eq!(template.corners[0].label, "1");
        assert_eq!(template.corners[0].potential("O"), Some(-3.5));
        assert_eq!(template.corners[1].index, 2);
        assert_eq!(template.defects.len(), 4);
        assert_eq!(template.defects[3].kind, DefectKind::Substitution("O".to_string()));
        assert_eq!(template.unrecognized, vec!["comment".to_string()]);

        let labels: Vec<String> = template.families().iter().map(|f| f.label.clone()).collect();
        assert_eq!(labels, vec!["V_O", "I_Zn", "O_Zn"]);
    }

    #[test]
    fn test_classify_rows() {
        assert_eq!(classify_row("bg", "1.5", "t").unwrap(), TemplateRow::BandGap(1.5));
        assert_eq!(
            classify_row("Ga-3", "-0.25", "t").unwrap(),
            TemplateRow::CornerPotential {
                element: "Ga".to_string(),
                corner: "3".to_string(),
                value: -0.25,
            }
        );
        assert_eq!(
            classify_row("Qq-1", "0.0", "t").unwrap(),
            TemplateRow::Unrecognized("Qq-1".to_string())
        );
        assert_eq!(
            classify_row("Zn-rich", "0.0", "t").unwrap(),
            TemplateRow::Unrecognized("Zn-rich".to_string())
        );

        match classify_row("V_O_-1_split_a", "0.7", "t").unwrap() {
            TemplateRow::Defect(d) => {
                assert_eq!(d.kind, DefectKind::Vacancy);
                assert_eq!(d.site, "O");
                assert_eq!(d.charge, -1);
                assert_eq!(d.index, "split_a");
                assert_eq!(d.terms, EnthalpyTerms::Relative(0.7));
            }
            other => panic!("unexpected row: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_charge() {
        let err = classify_row("V_O_1.5_1", "0.7", "t").unwrap_err();
        assert!(matches!(err, DefectError::MalformedCharge { .. }));
    }

    #[test]
    fn test_invalid_number() {
        let err = classify_row("V_O_1_1", "abc", "t").unwrap_err();
        assert!(matches!(err, DefectError::ParseError { .. }));
    }

    #[test]
    fn test_missing_bandgap() {
        let err = parse_template_content("Zn-1,0.0\nV_Zn_0_1,1.0\n", "t.csv").unwrap_err();
        assert!(matches!(err, DefectError::MissingField { .. }));
    }

    #[test]
    fn test_duplicate_defect() {
        let content = "bg,1.0\nV_O_1_1,1.0\nV_O_+1_1,2.0\n";
        let err = parse_template_content(content, "t.csv").unwrap_err();
        assert!(matches!(err, DefectError::DuplicateDefect { .. }));
    }

    #[test]
    fn test_explicit_formula_and_extra_columns() {
        let content = "bg,2.0,eV\nformula,Ga2O3\nGa-1,-1.0,note\n";
        let template = parse_template_content(content, "t.csv").unwrap();
        assert_eq!(template.formula, "Ga2O3");
        assert_eq!(template.corners[0].potential("Ga"), Some(-1.0));
    }
}
