//! # 缺陷形成能计算模块
//!
//! 从角点化学势和缺陷焓项计算形成能 - 费米能级曲线。
//!
//! ## 子模块
//! - `enthalpy`: E_F = 0 处的缺陷形成焓
//! - `lines`: 每个电荷态的形成能直线
//! - `envelope`: 下包络线与电荷转变能级
//! - `aggregator`: 遍历所有角点 × 缺陷族
//!
//! ## 依赖关系
//! - 被 `commands/` 调用
//! - 使用 `models/` 数据模型
//! - 不涉及任何文件或终端 I/O

pub mod aggregator;
pub mod enthalpy;
pub mod envelope;
pub mod lines;

pub use aggregator::{Aggregator, CornerReport, DiagramReport, FamilyRecord, MissingValuePolicy};
pub use envelope::EnvelopeStrategy;

/// 按十进制位数舍入
///
/// 通过定宽格式化实现，结果与十进制正确舍入（ties-to-even）一致；
/// -0.0 归一为 0.0。
pub fn round_decimals(value: f64, digits: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let rounded = format!("{:.*}", digits, value)
        .parse::<f64>()
        .unwrap_or(value);
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_decimals() {
        assert_eq!(round_decimals(1.0 + -3.2, 4), -2.2);
        assert_eq!(round_decimals(0.123456, 4), 0.1235);
        assert_eq!(round_decimals(2.718281828, 5), 2.71828);
        assert_eq!(round_decimals(-0.00001, 4), 0.0);
        assert!(round_decimals(f64::NAN, 4).is_nan());
    }
}
