//! # 形成能下包络线
//!
//! 对同一缺陷族的所有电荷态直线取逐点最小值，得到 [0, Eg] 上的分段线性
//! 曲线，并给出电荷转变能级。
//!
//! ## 算法
//! - 采样法（默认）：在 [0, Eg] 上等距取点（默认 100，含两端点），逐点取
//!   最低直线；活动直线变化处用两直线的精确交点作为断点（交点落在相邻
//!   采样点之间时），否则退回到采样点。
//! - 精确法：求两两直线在定义域内的交点（保留 3 位小数并去重），从中取
//!   n − 1 个点的所有组合，按 E_F 排序后加上两端点，取曲线下面积最小的
//!   候选。选中的候选必须通过逐段验证，否则回退到采样法。交点不足
//!   n − 1 个（平行、重合或共点）时同样回退。
//!
//! 两种方法最后都合并间距小于 1e-3 的相邻断点。
//!
//! ## 依赖关系
//! - 被 `thermo/aggregator.rs` 调用
//! - 使用 `models/diagram.rs` 的 ChargeLine, Envelope

use crate::error::{DefectError, Result};
use crate::models::{Breakpoint, ChargeLine, Envelope, EnvelopeMethod};
use crate::thermo::round_decimals;

use serde::{Deserialize, Serialize};
use std::fmt;

/// 默认采样点数
pub const DEFAULT_SAMPLES: usize = 100;

/// 断点去重容差（E_F，eV）
pub const FERMI_TOLERANCE: f64 = 1e-3;

/// 交点坐标保留的小数位数
const INTERSECTION_DIGITS: usize = 3;

/// 精确法候选验证容差，覆盖交点 3 位小数舍入
const VERIFY_TOLERANCE: f64 = 1e-2;

/// 判定两条直线重合的截距容差
const LINE_EPSILON: f64 = 1e-9;

/// 精确法候选组合数上限
const MAX_CANDIDATES: usize = 200_000;

/// 包络线计算策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStrategy {
    #[default]
    Sampling,
    Exact,
}

impl fmt::Display for EnvelopeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeStrategy::Sampling => write!(f, "sampling"),
            EnvelopeStrategy::Exact => write!(f, "exact"),
        }
    }
}

/// 精确法的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ExactOutcome {
    /// 通过验证的包络线
    Envelope(Envelope),
    /// 定义域内交点不足 n − 1 个
    Degenerate { found: usize, needed: usize },
    /// 组合数过多
    TooManyCandidates(usize),
    /// 最小面积候选不是逐点最小
    Rejected,
}

/// 下包络线求解器
#[derive(Debug, Clone)]
pub struct EnvelopeSolver {
    /// 带隙 Eg (eV)
    bandgap: f64,
    /// 采样点数
    samples: usize,
    strategy: EnvelopeStrategy,
}

impl EnvelopeSolver {
    /// 创建新的求解器（采样法，100 点）
    pub fn new(bandgap: f64) -> Self {
        Self {
            bandgap,
            samples: DEFAULT_SAMPLES,
            strategy: EnvelopeStrategy::Sampling,
        }
    }

    /// 设置采样点数（至少 2）
    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples.max(2);
        self
    }

    pub fn with_strategy(mut self, strategy: EnvelopeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn bandgap(&self) -> f64 {
        self.bandgap
    }

    /// 计算缺陷族的下包络线
    pub fn solve(&self, label: &str, lines: &[ChargeLine]) -> Result<Envelope> {
        let lines = distinct_lines(lines);

        match lines.len() {
            0 => Err(DefectError::EmptyFamily {
                label: label.to_string(),
            }),
            1 => Ok(single_line(lines[0])),
            _ => match self.strategy {
                EnvelopeStrategy::Sampling => Ok(self.sample(&lines)),
                EnvelopeStrategy::Exact => match self.exact(&lines) {
                    ExactOutcome::Envelope(envelope) => Ok(envelope),
                    _ => Ok(self.sample(&lines)),
                },
            },
        }
    }

    /// 仅运行精确法（不回退）
    #[cfg(test)]
    pub fn solve_exact(&self, lines: &[ChargeLine]) -> ExactOutcome {
        let lines = distinct_lines(lines);
        match lines.len() {
            0 => ExactOutcome::Degenerate {
                found: 0,
                needed: 0,
            },
            1 => ExactOutcome::Envelope(single_line(lines[0])),
            _ => self.exact(&lines),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // 采样法
    // ─────────────────────────────────────────────────────────────

    fn sample(&self, lines: &[&ChargeLine]) -> Envelope {
        let grid = self.grid();
        let active: Vec<usize> = grid.iter().map(|&x| lowest_line(lines, x)).collect();

        let first = lines[active[0]];
        let mut segments = vec![(Breakpoint::new(0.0, first.start.energy), first.charge)];

        for i in 1..grid.len() {
            if active[i - 1] == active[i] {
                continue;
            }

            bridge(
                lines,
                (active[i - 1], active[i]),
                (grid[i - 1], grid[i]),
                lines.len(),
                &mut segments,
            );
        }

        let last = lines[active[active.len() - 1]];
        let end = Breakpoint::new(self.bandgap, last.end.energy);

        assemble(segments, end, EnvelopeMethod::Sampling)
    }

    /// [0, Eg] 上的等距采样点，末点精确等于 Eg
    fn grid(&self) -> Vec<f64> {
        let n = self.samples.max(2);
        let step = self.bandgap / (n - 1) as f64;
        (0..n)
            .map(|i| {
                if i == n - 1 {
                    self.bandgap
                } else {
                    i as f64 * step
                }
            })
            .collect()
    }

    // ─────────────────────────────────────────────────────────────
    // 精确法
    // ─────────────────────────────────────────────────────────────

    fn exact(&self, lines: &[&ChargeLine]) -> ExactOutcome {
        let points = self.intersections(lines);
        let needed = lines.len() - 1;

        if points.len() < needed {
            return ExactOutcome::Degenerate {
                found: points.len(),
                needed,
            };
        }

        let count = binomial(points.len(), needed);
        if count > MAX_CANDIDATES {
            return ExactOutcome::TooManyCandidates(count);
        }

        let start = Breakpoint::new(
            0.0,
            lines
                .iter()
                .map(|l| l.start.energy)
                .fold(f64::INFINITY, f64::min),
        );
        let end = Breakpoint::new(
            self.bandgap,
            lines
                .iter()
                .map(|l| l.end.energy)
                .fold(f64::INFINITY, f64::min),
        );

        let mut best: Option<(f64, Vec<Breakpoint>)> = None;

        for combo in Combinations::new(points.len(), needed) {
            let mut candidate: Vec<Breakpoint> = combo.iter().map(|&i| points[i]).collect();
            candidate.sort_by(|a, b| a.fermi_level.total_cmp(&b.fermi_level));
            candidate.insert(0, start);
            candidate.push(end);

            let area = area_under(&candidate);
            let better = match &best {
                Some((best_area, _)) => area < *best_area,
                None => true,
            };
            if better {
                best = Some((area, candidate));
            }
        }

        let candidate = match best {
            Some((_, candidate)) => candidate,
            None => return ExactOutcome::Rejected,
        };

        match self.verify(lines, &candidate) {
            Some(charges) => {
                let end = candidate[candidate.len() - 1];
                let segments = candidate.into_iter().zip(charges).collect();
                ExactOutcome::Envelope(assemble(segments, end, EnvelopeMethod::Exact))
            }
            None => ExactOutcome::Rejected,
        }
    }

    /// 定义域内两两交点，保留 3 位小数并去重
    fn intersections(&self, lines: &[&ChargeLine]) -> Vec<Breakpoint> {
        let mut points: Vec<Breakpoint> = Vec::new();

        for (i, a) in lines.iter().enumerate() {
            for b in &lines[i + 1..] {
                let x = match a.crossing(b) {
                    Some(x) => x,
                    None => continue,
                };
                if !(0.0..=self.bandgap).contains(&x) {
                    continue;
                }

                let point = Breakpoint::new(
                    round_decimals(x, INTERSECTION_DIGITS),
                    round_decimals(a.value_at(x), INTERSECTION_DIGITS),
                );
                let duplicate = points.iter().any(|p| {
                    (p.fermi_level - point.fermi_level).abs() < FERMI_TOLERANCE
                        && (p.energy - point.energy).abs() < FERMI_TOLERANCE
                });
                if !duplicate {
                    points.push(point);
                }
            }
        }

        points
    }

    /// 验证候选：每段与某条直线重合，且各采样点不高于逐点最小值
    ///
    /// 返回每段对应的电荷（零宽段占位为后一段的电荷）。
    fn verify(&self, lines: &[&ChargeLine], candidate: &[Breakpoint]) -> Option<Vec<i32>> {
        let mut charges: Vec<Option<i32>> = Vec::with_capacity(candidate.len() - 1);

        for pair in candidate.windows(2) {
            let (p, q) = (pair[0], pair[1]);
            if q.fermi_level - p.fermi_level < FERMI_TOLERANCE {
                charges.push(None);
                continue;
            }

            let owner = lines
                .iter()
                .map(|l| {
                    let err = (l.value_at(p.fermi_level) - p.energy).abs()
                        + (l.value_at(q.fermi_level) - q.energy).abs();
                    (l.charge, err)
                })
                .filter(|(_, err)| *err <= 2.0 * VERIFY_TOLERANCE)
                .min_by(|a, b| a.1.total_cmp(&b.1))?;
            charges.push(Some(owner.0));
        }

        let candidate_env = Envelope {
            breakpoints: candidate.to_vec(),
            charges: Vec::new(),
            method: EnvelopeMethod::Exact,
        };
        for x in self.grid() {
            let floor = lines[lowest_line(lines, x)].value_at(x);
            if candidate_env.value_at(x) > floor + VERIFY_TOLERANCE {
                return None;
            }
        }

        // 零宽段在 assemble 中被合并，占位值取其后第一段的电荷
        let mut resolved = vec![0; charges.len()];
        let mut next = None;
        for i in (0..charges.len()).rev() {
            if let Some(c) = charges[i] {
                next = Some(c);
            }
            resolved[i] = charges[i].or(next)?;
        }
        Some(resolved)
    }
}

/// 去除重合直线（相同电荷与截距），保留首次出现
fn distinct_lines(lines: &[ChargeLine]) -> Vec<&ChargeLine> {
    let mut distinct: Vec<&ChargeLine> = Vec::new();
    for line in lines {
        let duplicate = distinct.iter().any(|d| {
            d.charge == line.charge && (d.intercept - line.intercept).abs() < LINE_EPSILON
        });
        if !duplicate {
            distinct.push(line);
        }
    }
    distinct
}

fn single_line(line: &ChargeLine) -> Envelope {
    Envelope {
        breakpoints: vec![line.start, line.end],
        charges: vec![line.charge],
        method: EnvelopeMethod::Single,
    }
}

/// E_F 处最低的直线；相等时取较小电荷（其右侧更低）
fn lowest_line(lines: &[&ChargeLine], fermi_level: f64) -> usize {
    let mut best = 0;
    let mut best_value = lines[0].value_at(fermi_level);

    for (i, line) in lines.iter().enumerate().skip(1) {
        let value = line.value_at(fermi_level);
        if value < best_value || (value == best_value && line.charge < lines[best].charge) {
            best = i;
            best_value = value;
        }
    }

    best
}

/// 活动直线在 [lo, hi] 内由 `from` 变为 `to` 时补上断点
///
/// 两直线交点处若有第三条更低的直线，则该电荷态只在两个采样点之间
/// 最低，区间在该处拆分为 from → c 与 c → to 递归处理。
fn bridge(
    lines: &[&ChargeLine],
    (from, to): (usize, usize),
    (lo, hi): (f64, f64),
    depth: usize,
    segments: &mut Vec<(Breakpoint, i32)>,
) {
    let (a, b) = (lines[from], lines[to]);
    let x = match a.crossing(b) {
        Some(x) if x >= lo && x <= hi => x,
        _ => {
            segments.push((Breakpoint::new(hi, b.value_at(hi)), b.charge));
            return;
        }
    };

    let lowest = lowest_line(lines, x);
    let dips = lowest != from
        && lowest != to
        && lines[lowest].value_at(x) < a.value_at(x) - LINE_EPSILON;
    if dips && depth > 0 {
        bridge(lines, (from, lowest), (lo, x), depth - 1, segments);
        bridge(lines, (lowest, to), (x, hi), depth - 1, segments);
    } else {
        segments.push((Breakpoint::new(x, b.value_at(x)), b.charge));
    }
}

/// 由 (断点, 该断点起始段的电荷) 序列和终点组装包络线
///
/// 与前一断点距离小于 1e-3 的断点被合并，相邻同电荷的线段被连接。
fn assemble(segments: Vec<(Breakpoint, i32)>, end: Breakpoint, method: EnvelopeMethod) -> Envelope {
    let mut breakpoints: Vec<Breakpoint> = Vec::new();
    let mut charges: Vec<i32> = Vec::new();

    for (point, charge) in segments {
        if let Some(last) = breakpoints.last() {
            if (point.fermi_level - last.fermi_level).abs() < FERMI_TOLERANCE {
                if let Some(c) = charges.last_mut() {
                    *c = charge;
                }
                continue;
            }
        }
        breakpoints.push(point);
        charges.push(charge);
    }

    if breakpoints.len() > 1 {
        if let Some(last) = breakpoints.last() {
            if (end.fermi_level - last.fermi_level).abs() < FERMI_TOLERANCE {
                breakpoints.pop();
                charges.pop();
            }
        }
    }
    breakpoints.push(end);

    // 连接相邻同电荷线段
    let mut i = 1;
    while i < charges.len() {
        if charges[i] == charges[i - 1] {
            charges.remove(i);
            breakpoints.remove(i);
        } else {
            i += 1;
        }
    }

    Envelope {
        breakpoints,
        charges,
        method,
    }
}

/// 梯形积分，对分段线性曲线精确
fn area_under(points: &[Breakpoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| {
            (pair[1].fermi_level - pair[0].fermi_level) * (pair[0].energy + pair[1].energy) / 2.0
        })
        .sum()
}

fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut result: usize = 1;
    for i in 0..k {
        result = result.saturating_mul(n - i) / (i + 1);
    }
    result
}

/// 按字典序枚举 {0..n} 的 k 元组合
struct Combinations {
    n: usize,
    indices: Vec<usize>,
    done: bool,
}

impl Combinations {
    fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            indices: (0..k).collect(),
            done: k > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let current = self.indices.clone();

        let k = self.indices.len();
        let mut i = k;
        loop {
            if i == 0 {
                self.done = true;
                break;
            }
            i -= 1;
            if self.indices[i] < self.n - k + i {
                self.indices[i] += 1;
                for j in i + 1..k {
                    self.indices[j] = self.indices[j - 1] + 1;
                }
                break;
            }
        }

        Some(current)
    }
}
