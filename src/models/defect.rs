//! # 点缺陷数据模型
//!
//! 描述单个缺陷行（类型、位置、电荷、编号、焓项）以及由同一
//! (类型, 位置) 组成的缺陷族。
//!
//! ## 依赖关系
//! - 被 `parsers/` 构造
//! - 被 `thermo/` 读取

use crate::models::ChemicalCorner;

use serde::{Deserialize, Serialize};
use std::fmt;

/// 缺陷类型
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DefectKind {
    /// 空位 `V`
    Vacancy,
    /// 间隙 `I`
    Interstitial,
    /// 替位 / 反位：占据位置的元素符号
    Substitution(String),
}

impl DefectKind {
    /// 从类型符号解析
    pub fn from_symbol(symbol: &str) -> Self {
        match symbol {
            "V" => DefectKind::Vacancy,
            "I" => DefectKind::Interstitial,
            other => DefectKind::Substitution(other.to_string()),
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            DefectKind::Vacancy => "V",
            DefectKind::Interstitial => "I",
            DefectKind::Substitution(element) => element,
        }
    }
}

impl fmt::Display for DefectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// 费米能级为 0 时的焓项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EnthalpyTerms {
    /// 相对于 μ = 0 的存储焓，按缺陷类型与角点化学势组合
    Relative(f64),
    /// ΔH(VBM) + Σ n_i · Δμ_i，每个独立化学势轴一个系数
    Stoichiometric {
        dh_vbm: f64,
        counts: Vec<(String, f64)>,
    },
}

/// 缺陷描述（对应一行原始数据）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectDescriptor {
    /// 原始键（如 "V_Zn_2_1"）
    pub key: String,
    pub kind: DefectKind,
    /// 缺陷所在位置的元素
    pub site: String,
    /// 形式电荷
    pub charge: i32,
    /// 区分其他字段完全相同的行
    pub index: String,
    pub terms: EnthalpyTerms,
}

impl DefectDescriptor {
    /// 缺陷族标签 "<type>_<site>"
    pub fn family_label(&self) -> String {
        format!("{}_{}", self.kind, self.site)
    }

    /// (type, site, charge, index) 唯一键
    pub fn identity(&self) -> (&DefectKind, &str, i32, &str) {
        (&self.kind, &self.site, self.charge, &self.index)
    }
}

/// 同一 (类型, 位置) 的所有电荷态
#[derive(Debug, Clone, PartialEq)]
pub struct DefectFamily {
    pub label: String,
    pub kind: DefectKind,
    pub site: String,
    pub members: Vec<DefectDescriptor>,
}

impl DefectFamily {
    /// 按首次出现顺序分组
    pub fn group(defects: &[DefectDescriptor]) -> Vec<DefectFamily> {
        let mut families: Vec<DefectFamily> = Vec::new();

        for defect in defects {
            match families
                .iter_mut()
                .find(|f| f.kind == defect.kind && f.site == defect.site)
            {
                Some(family) => family.members.push(defect.clone()),
                None => families.push(DefectFamily {
                    label: defect.family_label(),
                    kind: defect.kind.clone(),
                    site: defect.site.clone(),
                    members: vec![defect.clone()],
                }),
            }
        }

        families
    }

    /// 族内出现的电荷集合
    pub fn charges(&self) -> Vec<i32> {
        let mut charges: Vec<i32> = self.members.iter().map(|d| d.charge).collect();
        charges.sort_unstable();
        charges.dedup();
        charges
    }
}

/// 解析后的完整模板
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    /// 来源（文件名）
    pub source: String,
    /// 化学式
    pub formula: String,
    /// 带隙 Eg (eV)
    pub bandgap: f64,
    /// 角点（输入顺序）
    pub corners: Vec<ChemicalCorner>,
    /// 缺陷行（输入顺序）
    pub defects: Vec<DefectDescriptor>,
    /// 未识别的键
    pub unrecognized: Vec<String>,
}

impl Template {
    pub fn families(&self) -> Vec<DefectFamily> {
        DefectFamily::group(&self.defects)
    }
}
