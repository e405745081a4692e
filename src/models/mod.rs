//! # 数据模型模块
//!
//! 定义化学势角点、缺陷描述与形成能图的数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `thermo/`, `export/` 和 `commands/` 使用
//! - 子模块: corner, defect, diagram

pub mod corner;
pub mod defect;
pub mod diagram;

pub use corner::ChemicalCorner;
pub use defect::{DefectDescriptor, DefectFamily, DefectKind, EnthalpyTerms, Template};
pub use diagram::{Breakpoint, ChargeLine, Envelope, EnvelopeMethod, Transition};
