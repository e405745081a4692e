//! # 角点聚合器
//!
//! 遍历所有角点 × 所有缺陷族，计算每个 (角点, 缺陷族) 的电荷态直线与
//! 下包络线，返回不可变的结果记录。
//!
//! ## 功能
//! - 缺陷族按首次出现顺序，角点按输入顺序
//! - 角点之间并行计算（rayon），收集顺序与输入一致
//! - 缺失化学势时按策略中止或跳过该缺陷族
//!
//! ## 依赖关系
//! - 被 `commands/diagram.rs`, `commands/inspect.rs` 调用
//! - 使用 `thermo/enthalpy.rs`, `thermo/lines.rs`, `thermo/envelope.rs`

use crate::error::{DefectError, Result};
use crate::models::{ChargeLine, ChemicalCorner, DefectFamily, Envelope, Template, Transition};
use crate::thermo::envelope::{EnvelopeSolver, EnvelopeStrategy, DEFAULT_SAMPLES};
use crate::thermo::{enthalpy, lines};

use rayon::prelude::*;
use std::collections::BTreeMap;

/// 缺失化学势的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingValuePolicy {
    /// 中止整个计算
    #[default]
    Abort,
    /// 跳过该角点上受影响的缺陷族
    Skip,
}

/// 单个缺陷行在某角点的 ΔH(0)
#[derive(Debug, Clone, PartialEq)]
pub struct DefectRecord {
    pub key: String,
    pub kind: String,
    pub site: String,
    pub charge: i32,
    pub index: String,
    /// 缺少化学势（且策略为跳过）时为 None
    pub enthalpy: Option<f64>,
}

/// 一个 (角点, 缺陷族) 的结果
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyRecord {
    pub label: String,
    pub lines: Vec<ChargeLine>,
    pub envelope: Envelope,
    pub transitions: Vec<Transition>,
}

/// 被跳过的缺陷族
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFamily {
    pub label: String,
    pub reason: String,
}

/// 一个角点的全部结果
#[derive(Debug, Clone, PartialEq)]
pub struct CornerReport {
    pub index: usize,
    pub label: String,
    pub rich_label: Option<String>,
    pub potentials: BTreeMap<String, f64>,
    pub defects: Vec<DefectRecord>,
    pub families: Vec<FamilyRecord>,
    pub skipped: Vec<SkippedFamily>,
}

/// 一个模板的全部结果
#[derive(Debug, Clone, PartialEq)]
pub struct DiagramReport {
    pub source: String,
    pub formula: String,
    pub bandgap: f64,
    pub strategy: EnvelopeStrategy,
    pub samples: usize,
    pub corners: Vec<CornerReport>,
}

/// 角点聚合器
#[derive(Debug, Clone)]
pub struct Aggregator {
    strategy: EnvelopeStrategy,
    samples: usize,
    policy: MissingValuePolicy,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self {
            strategy: EnvelopeStrategy::Sampling,
            samples: DEFAULT_SAMPLES,
            policy: MissingValuePolicy::Abort,
        }
    }
}

impl Aggregator {
    pub fn new(strategy: EnvelopeStrategy, samples: usize, policy: MissingValuePolicy) -> Self {
        Self {
            strategy,
            samples: samples.max(2),
            policy,
        }
    }

    /// 计算整个模板
    pub fn run(&self, template: &Template) -> Result<DiagramReport> {
        let bandgap = lines::validate_bandgap(template.bandgap)?;
        let solver = EnvelopeSolver::new(bandgap)
            .with_samples(self.samples)
            .with_strategy(self.strategy);
        let families = template.families();

        let corners = template
            .corners
            .par_iter()
            .map(|corner| self.evaluate_corner(&solver, corner, &families))
            .collect::<Result<Vec<_>>>()?;

        Ok(DiagramReport {
            source: template.source.clone(),
            formula: template.formula.clone(),
            bandgap,
            strategy: self.strategy,
            samples: self.samples,
            corners,
        })
    }

    /// 计算单个角点
    pub fn evaluate_corner(
        &self,
        solver: &EnvelopeSolver,
        corner: &ChemicalCorner,
        families: &[DefectFamily],
    ) -> Result<CornerReport> {
        let mut records = Vec::with_capacity(families.len());
        let mut skipped = Vec::new();

        for family in families {
            match evaluate_family(solver, corner, family) {
                Ok(record) => records.push(record),
                Err(e @ DefectError::MissingCornerValue { .. })
                    if self.policy == MissingValuePolicy::Skip =>
                {
                    skipped.push(SkippedFamily {
                        label: family.label.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let defects = families
            .iter()
            .flat_map(|f| f.members.iter())
            .map(|d| DefectRecord {
                key: d.key.clone(),
                kind: d.kind.to_string(),
                site: d.site.clone(),
                charge: d.charge,
                index: d.index.clone(),
                enthalpy: enthalpy::formation_enthalpy(corner, d).ok(),
            })
            .collect();

        Ok(CornerReport {
            index: corner.index,
            label: corner.label.clone(),
            rich_label: corner.rich_label(),
            potentials: corner.potentials.clone(),
            defects,
            families: records,
            skipped,
        })
    }
}

/// 计算单个 (角点, 缺陷族)
pub fn evaluate_family(
    solver: &EnvelopeSolver,
    corner: &ChemicalCorner,
    family: &DefectFamily,
) -> Result<FamilyRecord> {
    let charge_lines = lines::build_family_lines(corner, family, solver.bandgap())?;
    let envelope = solver.solve(&family.label, &charge_lines)?;
    let transitions = envelope.transitions();

    Ok(FamilyRecord {
        label: family.label.clone(),
        lines: charge_lines,
        envelope,
        transitions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DefectDescriptor, DefectKind, EnthalpyTerms};

    fn defect(kind: &str, site: &str, charge: i32, stored: f64) -> DefectDescriptor {
        DefectDescriptor {
            key: format!("{}_{}_{}_1", kind, site, charge),
            kind: DefectKind::from_symbol(kind),
            site: site.to_string(),
            charge,
            index: "1".to_string(),
            terms: EnthalpyTerms::Relative(stored),
        }
    }

    fn template() -> Template {
        Template {
            source: "ZnO.csv".to_string(),
            formula: "ZnO".to_string(),
            bandgap: 2.0,
            corners: vec![
                ChemicalCorner::new(1, "1")
                    .with_potential("Zn", 0.0)
                    .with_potential("O", -3.0),
                ChemicalCorner::new(2, "2")
                    .with_potential("Zn", -3.0)
                    .with_potential("O", 0.0),
            ],
            defects: vec![
                defect("V", "O", 1, 3.5),
                defect("I", "Zn", 2, 1.0),
                defect("V", "O", -1, 4.5),
                defect("Zn", "O", 0, 2.0),
            ],
            unrecognized: Vec::new(),
        }
    }

    #[test]
    fn test_one_record_per_corner_and_family() {
        let report = Aggregator::default().run(&template()).unwrap();
        assert_eq!(report.corners.len(), 2);

        for corner in &report.corners {
            let labels: Vec<&str> = corner.families.iter().map(|f| f.label.as_str()).collect();
            assert_eq!(labels, vec!["V_O", "I_Zn", "Zn_O"]);
            assert_eq!(corner.defects.len(), 4);
            assert!(corner.skipped.is_empty());
        }

        // Corner 1: V_O lines are 0.5 + E_F and 1.5 - E_F
        let v_o = &report.corners[0].families[0];
        assert_eq!(v_o.lines.len(), 2);
        assert_eq!(v_o.lines[0].intercept, 0.5);
        assert_eq!(v_o.lines[1].intercept, 1.5);
        assert_eq!(v_o.transitions.len(), 1);
        assert!((v_o.transitions[0].fermi_level - 0.5).abs() < 1e-9);

        assert_eq!(report.corners[0].rich_label.as_deref(), Some("Zn-rich"));
        assert_eq!(report.corners[1].rich_label.as_deref(), Some("O-rich"));
    }

    #[test]
    fn test_missing_value_aborts_by_default() {
        let mut template = template();
        template.defects.push(defect("V", "Ga", 0, 1.0));
        let err = Aggregator::default().run(&template).unwrap_err();
        assert!(matches!(err, DefectError::MissingCornerValue { .. }));
    }

    #[test]
    fn test_missing_value_skip_policy() {
        let mut template = template();
        template.defects.push(defect("V", "Ga", 0, 1.0));
        let aggregator =
            Aggregator::new(EnvelopeStrategy::Sampling, 100, MissingValuePolicy::Skip);
        let report = aggregator.run(&template).unwrap();

        for corner in &report.corners {
            assert_eq!(corner.families.len(), 3);
            assert_eq!(corner.skipped.len(), 1);
            assert_eq!(corner.skipped[0].label, "V_Ga");
            let ga = corner.defects.iter().find(|d| d.site == "Ga").unwrap();
            assert!(ga.enthalpy.is_none());
        }
    }

    #[test]
    fn test_invalid_bandgap_rejected() {
        let mut template = template();
        template.bandgap = 0.0;
        assert!(matches!(
            Aggregator::default().run(&template),
            Err(DefectError::InvalidBandgap(_))
        ));
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let aggregator = Aggregator::new(EnvelopeStrategy::Exact, 100, MissingValuePolicy::Abort);
        let first = aggregator.run(&template()).unwrap();
        let second = aggregator.run(&template()).unwrap();
        assert_eq!(first, second);
    }
}
