//! # 化学势角点数据模型
//!
//! 一个角点对应相稳定区域的一个顶点，存储各元素（或化学势轴）的化学势。
//!
//! ## 依赖关系
//! - 被 `parsers/` 构造
//! - 被 `thermo/enthalpy.rs` 读取

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 相稳定角点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChemicalCorner {
    /// 输入顺序中的位置（从 1 开始）
    pub index: usize,

    /// 模板中写出的角点标识（如 "2"）
    pub label: String,

    /// 化学势 μ (eV)，按元素符号索引
    pub potentials: BTreeMap<String, f64>,
}

impl ChemicalCorner {
    pub fn new(index: usize, label: impl Into<String>) -> Self {
        ChemicalCorner {
            index,
            label: label.into(),
            potentials: BTreeMap::new(),
        }
    }

    pub fn with_potential(mut self, element: impl Into<String>, value: f64) -> Self {
        self.potentials.insert(element.into(), value);
        self
    }

    /// 查询化学势
    pub fn potential(&self, element: &str) -> Option<f64> {
        self.potentials.get(element).copied()
    }

    /// "<El>-rich" 标签：化学势最高的元素
    ///
    /// 相同最大值时取符号顺序中的第一个。
    pub fn rich_label(&self) -> Option<String> {
        let mut best: Option<(&String, f64)> = None;
        for (element, &mu) in &self.potentials {
            match best {
                Some((_, current)) if mu <= current => {}
                _ => best = Some((element, mu)),
            }
        }
        best.map(|(element, _)| format!("{}-rich", element))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rich_label_picks_highest_potential() {
        let corner = ChemicalCorner::new(1, "1")
            .with_potential("Zn", -0.2)
            .with_potential("O", -3.1);
        assert_eq!(corner.rich_label().as_deref(), Some("Zn-rich"));
    }

    #[test]
    fn test_rich_label_tie_uses_symbol_order() {
        let corner = ChemicalCorner::new(1, "1")
            .with_potential("Zn", 0.0)
            .with_potential("O", 0.0);
        assert_eq!(corner.rich_label().as_deref(), Some("O-rich"));
    }

    #[test]
    fn test_empty_corner_has_no_rich_label() {
        assert!(ChemicalCorner::new(3, "3").rich_label().is_none());
    }
}
