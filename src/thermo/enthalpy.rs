//! # 缺陷形成焓
//!
//! 计算 E_F = 0 时的缺陷形成焓 ΔH(0)。
//!
//! ## 规则
//! - 间隙 `I`: ΔH = H_rel − μ(site)
//! - 空位 `V`: ΔH = H_rel + μ(site)
//! - 替位 `X`: ΔH = H_rel + μ(site) − μ(X)
//! - 化学计量形式: ΔH = ΔH(VBM) + Σ n_i · Δμ_i
//!
//! 结果保留 4 位小数后再参与后续运算。
//!
//! ## 依赖关系
//! - 被 `thermo/lines.rs`, `thermo/aggregator.rs` 使用
//! - 使用 `models/` 的 ChemicalCorner, DefectDescriptor

use crate::error::{DefectError, Result};
use crate::models::{ChemicalCorner, DefectDescriptor, DefectKind, EnthalpyTerms};
use crate::thermo::round_decimals;

/// ΔH 保留的小数位数
pub const ENTHALPY_DIGITS: usize = 4;

/// 计算缺陷在给定角点的 ΔH(E_F = 0)
pub fn formation_enthalpy(corner: &ChemicalCorner, defect: &DefectDescriptor) -> Result<f64> {
    match &defect.terms {
        EnthalpyTerms::Relative(stored) => {
            relative_enthalpy(corner, *stored, &defect.kind, &defect.site)
        }
        EnthalpyTerms::Stoichiometric { dh_vbm, counts } => {
            let mut total = *dh_vbm;
            for (axis, n) in counts {
                total += n * lookup(corner, axis)?;
            }
            Ok(round_decimals(total, ENTHALPY_DIGITS))
        }
    }
}

/// 由相对焓与角点化学势组合缺陷焓
pub fn relative_enthalpy(
    corner: &ChemicalCorner,
    stored: f64,
    kind: &DefectKind,
    site: &str,
) -> Result<f64> {
    let mu_site = lookup(corner, site)?;

    let value = match kind {
        DefectKind::Interstitial => stored - mu_site,
        DefectKind::Vacancy => stored + mu_site,
        DefectKind::Substitution(element) => stored + mu_site - lookup(corner, element)?,
    };

    Ok(round_decimals(value, ENTHALPY_DIGITS))
}

fn lookup(corner: &ChemicalCorner, element: &str) -> Result<f64> {
    corner
        .potential(element)
        .ok_or_else(|| DefectError::MissingCornerValue {
            corner: corner.label.clone(),
            element: element.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corner() -> ChemicalCorner {
        ChemicalCorner::new(1, "1")
            .with_potential("Zn", -3.2)
            .with_potential("O", -0.4)
    }

    #[test]
    fn test_vacancy() {
        let h = relative_enthalpy(&corner(), 1.0, &DefectKind::Vacancy, "Zn").unwrap();
        assert_eq!(h, -2.2);
    }

    #[test]
    fn test_interstitial() {
        let h = relative_enthalpy(&corner(), 1.0, &DefectKind::Interstitial, "Zn").unwrap();
        assert_eq!(h, 4.2);
    }

    #[test]
    fn test_antisite() {
        // O on a Zn site: 1.0 + (-3.2) - (-0.4)
        let kind = DefectKind::Substitution("O".to_string());
        let h = relative_enthalpy(&corner(), 1.0, &kind, "Zn").unwrap();
        assert_eq!(h, -1.8);
    }

    #[test]
    fn test_missing_site_is_error() {
        let err = relative_enthalpy(&corner(), 1.0, &DefectKind::Vacancy, "Ga").unwrap_err();
        match err {
            DefectError::MissingCornerValue { corner, element } => {
                assert_eq!(corner, "1");
                assert_eq!(element, "Ga");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_substituent_is_error() {
        let kind = DefectKind::Substitution("Ga".to_string());
        assert!(matches!(
            relative_enthalpy(&corner(), 1.0, &kind, "Zn"),
            Err(DefectError::MissingCornerValue { .. })
        ));
    }

    #[test]
    fn test_stoichiometric_terms() {
        let corner = ChemicalCorner::new(1, "1")
            .with_potential("A", -1.5)
            .with_potential("B", 0.25);
        let defect = DefectDescriptor {
            key: "V_A_0_1".to_string(),
            kind: DefectKind::Vacancy,
            site: "A".to_string(),
            charge: 0,
            index: "1".to_string(),
            terms: EnthalpyTerms::Stoichiometric {
                dh_vbm: 3.0,
                counts: vec![("A".to_string(), 1.0), ("B".to_string(), -2.0)],
            },
        };
        // 3.0 + 1.0 * -1.5 - 2.0 * 0.25
        assert_eq!(formation_enthalpy(&corner, &defect).unwrap(), 1.0);
    }

    #[test]
    fn test_result_rounded_to_four_digits() {
        let corner = ChemicalCorner::new(1, "1").with_potential("Zn", -0.123456);
        let h = relative_enthalpy(&corner, 0.0, &DefectKind::Vacancy, "Zn").unwrap();
        assert_eq!(h, -0.1235);
    }
}
