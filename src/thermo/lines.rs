//! # 电荷态形成能直线
//!
//! ΔH_q(E_F) = q · E_F + ΔH_q(0)，定义域 [0, Eg]。
//!
//! ## 依赖关系
//! - 被 `thermo/aggregator.rs` 调用
//! - 使用 `thermo/enthalpy.rs` 计算截距

use crate::error::{DefectError, Result};
use crate::models::{Breakpoint, ChargeLine, ChemicalCorner, DefectFamily};
use crate::thermo::enthalpy::{self, ENTHALPY_DIGITS};
use crate::thermo::round_decimals;

/// 构造单条电荷态直线，两端点均保留 4 位小数
pub fn build_charge_line(key: &str, h0: f64, charge: i32, bandgap: f64) -> ChargeLine {
    let h0 = round_decimals(h0, ENTHALPY_DIGITS);
    let at_cbm = round_decimals(charge as f64 * bandgap + h0, ENTHALPY_DIGITS);

    ChargeLine {
        key: key.to_string(),
        charge,
        intercept: h0,
        start: Breakpoint::new(0.0, h0),
        end: Breakpoint::new(bandgap, at_cbm),
    }
}

/// 为一个缺陷族在一个角点上构造全部直线（保持输入顺序）
pub fn build_family_lines(
    corner: &ChemicalCorner,
    family: &DefectFamily,
    bandgap: f64,
) -> Result<Vec<ChargeLine>> {
    family
        .members
        .iter()
        .map(|defect| {
            let h0 = enthalpy::formation_enthalpy(corner, defect)?;
            Ok(build_charge_line(&defect.key, h0, defect.charge, bandgap))
        })
        .collect()
}

/// 解析形式电荷，只接受带符号整数
pub fn parse_charge(key: &str, text: &str) -> Result<i32> {
    text.trim()
        .parse::<i32>()
        .map_err(|_| DefectError::MalformedCharge {
            key: key.to_string(),
            value: text.to_string(),
        })
}

/// 校验带隙
pub fn validate_bandgap(bandgap: f64) -> Result<f64> {
    if bandgap.is_finite() && bandgap > 0.0 {
        Ok(bandgap)
    } else {
        Err(DefectError::InvalidBandgap(bandgap))
    }
}
