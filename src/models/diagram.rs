//! # 形成能图数据模型
//!
//! 电荷态直线、包络线断点与电荷转变能级。
//!
//! ## 依赖关系
//! - 被 `thermo/lines.rs`, `thermo/envelope.rs` 构造
//! - 被 `export/` 读取

use serde::{Deserialize, Serialize};
use std::fmt;

/// 包络线上的点 (E_F, ΔH)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub fermi_level: f64,
    pub energy: f64,
}

impl Breakpoint {
    pub fn new(fermi_level: f64, energy: f64) -> Self {
        Breakpoint {
            fermi_level,
            energy,
        }
    }
}

/// 单个电荷态的形成能直线 ΔH(E_F) = q·E_F + ΔH(0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeLine {
    /// 来源缺陷键
    pub key: String,
    /// 斜率 = 形式电荷
    pub charge: i32,
    /// E_F = 0 处的焓
    pub intercept: f64,
    /// (0, ΔH(0))
    pub start: Breakpoint,
    /// (Eg, q·Eg + ΔH(0))
    pub end: Breakpoint,
}

impl ChargeLine {
    pub fn value_at(&self, fermi_level: f64) -> f64 {
        self.charge as f64 * fermi_level + self.intercept
    }

    /// 与另一条直线的交点横坐标；平行（含重合）时为 None
    pub fn crossing(&self, other: &ChargeLine) -> Option<f64> {
        if self.charge == other.charge {
            return None;
        }
        Some((other.intercept - self.intercept) / (self.charge as f64 - other.charge as f64))
    }
}

/// 包络线计算方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeMethod {
    /// 单一电荷态，直线即包络
    Single,
    /// 离散采样取最小值
    Sampling,
    /// 交点组合 + 最小面积
    Exact,
}

impl fmt::Display for EnvelopeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeMethod::Single => write!(f, "single"),
            EnvelopeMethod::Sampling => write!(f, "sampling"),
            EnvelopeMethod::Exact => write!(f, "exact"),
        }
    }
}

/// 电荷转变能级 ε(q/q')
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub fermi_level: f64,
    pub energy: f64,
    /// 转变点左侧（较低 E_F）的稳定电荷
    pub from_charge: i32,
    /// 转变点右侧的稳定电荷
    pub to_charge: i32,
}

/// 一个缺陷族在一个角点上的下包络线
///
/// 断点按 E_F 升序，首点 E_F = 0，末点 E_F = Eg；
/// `charges[i]` 是断点 i 与 i+1 之间线段所属的电荷态。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub breakpoints: Vec<Breakpoint>,
    pub charges: Vec<i32>,
    pub method: EnvelopeMethod,
}

impl Envelope {
    /// 分段线性插值；域外取端点值
    pub fn value_at(&self, fermi_level: f64) -> f64 {
        let points = &self.breakpoints;
        let (first, last) = match (points.first(), points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return f64::NAN,
        };

        if fermi_level <= first.fermi_level {
            return first.energy;
        }
        if fermi_level >= last.fermi_level {
            return last.energy;
        }

        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if fermi_level <= b.fermi_level {
                let width = b.fermi_level - a.fermi_level;
                if width <= 0.0 {
                    return b.energy;
                }
                let t = (fermi_level - a.fermi_level) / width;
                return a.energy + t * (b.energy - a.energy);
            }
        }

        last.energy
    }

    /// 每段的实际斜率
    #[cfg(test)]
    pub fn segment_slopes(&self) -> Vec<f64> {
        self.breakpoints
            .windows(2)
            .map(|pair| {
                (pair[1].energy - pair[0].energy) / (pair[1].fermi_level - pair[0].fermi_level)
            })
            .collect()
    }

    /// 内部断点处的电荷转变
    pub fn transitions(&self) -> Vec<Transition> {
        self.charges
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| pair[0] != pair[1])
            .map(|(i, pair)| {
                let point = self.breakpoints[i + 1];
                Transition {
                    fermi_level: point.fermi_level,
                    energy: point.energy,
                    from_charge: pair[0],
                    to_charge: pair[1],
                }
            })
            .collect()
    }

    /// 在 [0, Eg] 上等距重采样（含两端点）
    pub fn resample(&self, samples: usize) -> Vec<Breakpoint> {
        let (start, end) = match (self.breakpoints.first(), self.breakpoints.last()) {
            (Some(first), Some(last)) => (first.fermi_level, last.fermi_level),
            _ => return Vec::new(),
        };
        if samples < 2 {
            return vec![Breakpoint::new(start, self.value_at(start))];
        }

        let step = (end - start) / (samples - 1) as f64;
        (0..samples)
            .map(|i| {
                let x = if i == samples - 1 {
                    end
                } else {
                    start + i as f64 * step
                };
                Breakpoint::new(x, self.value_at(x))
            })
            .collect()
    }
}

/// 带符号的电荷文本（"+1", "0", "-2"）
pub fn format_charge(charge: i32) -> String {
    if charge > 0 {
        format!("+{}", charge)
    } else {
        charge.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_envelope() -> Envelope {
        Envelope {
            breakpoints: vec![
                Breakpoint::new(0.0, 0.5),
                Breakpoint::new(0.5, 1.0),
                Breakpoint::new(2.0, -0.5),
            ],
            charges: vec![1, -1],
            method: EnvelopeMethod::Exact,
        }
    }

    #[test]
    fn test_value_at_interpolates() {
        let env = scenario_envelope();
        assert!((env.value_at(0.25) - 0.75).abs() < 1e-12);
        assert!((env.value_at(1.0) - 0.5).abs() < 1e-12);
        assert!((env.value_at(-1.0) - 0.5).abs() < 1e-12);
        assert!((env.value_at(3.0) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_transitions_and_slopes() {
        let env = scenario_envelope();
        let transitions = env.transitions();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].from_charge, 1);
        assert_eq!(transitions[0].to_charge, -1);
        assert!((transitions[0].fermi_level - 0.5).abs() < 1e-12);

        let slopes = env.segment_slopes();
        assert!((slopes[0] - 1.0).abs() < 1e-12);
        assert!((slopes[1] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_resample_includes_both_ends() {
        let samples = scenario_envelope().resample(5);
        assert_eq!(samples.len(), 5);
        assert_eq!(samples[0].fermi_level, 0.0);
        assert_eq!(samples[4].fermi_level, 2.0);
        assert!((samples[4].energy + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_crossing_of_parallel_lines() {
        let a = ChargeLine {
            key: "a".to_string(),
            charge: 1,
            intercept: 0.0,
            start: Breakpoint::new(0.0, 0.0),
            end: Breakpoint::new(1.0, 1.0),
        };
        let b = ChargeLine {
            intercept: 0.3,
            ..a.clone()
        };
        assert!(a.crossing(&b).is_none());
    }

    #[test]
    fn test_crossing_with_extreme_charges() {
        let a = ChargeLine {
            key: "a".to_string(),
            charge: i32::MAX,
            intercept: 0.0,
            start: Breakpoint::new(0.0, 0.0),
            end: Breakpoint::new(1.0, i32::MAX as f64),
        };
        let b = ChargeLine {
            key: "b".to_string(),
            charge: -1,
            intercept: 1.0,
            ..a.clone()
        };
        let x = a.crossing(&b).unwrap();
        assert!(x.is_finite());
        assert!((a.value_at(x) - b.value_at(x)).abs() < 1e-6);
    }

    #[test]
    fn test_format_charge() {
        assert_eq!(format_charge(2), "+2");
        assert_eq!(format_charge(0), "0");
        assert_eq!(format_charge(-1), "-1");
    }
}
