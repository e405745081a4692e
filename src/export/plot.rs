//! # 缺陷形成能图
//!
//! 使用 `plotters` 为每个化学势角点生成一张形成能-费米能级图。
//!
//! ## 功能
//! - 每个缺陷族绘制其下包络线，图例为缺陷族标签
//! - 电荷转变能级以圆点标出
//! - 支持 PNG 和 SVG 输出
//!
//! ## 依赖关系
//! - 被 `commands/diagram.rs` 调用
//! - 使用 `thermo/aggregator.rs` 的 CornerReport
//! - 使用 `plotters` 渲染图表

use crate::error::{DefectError, Result};
use crate::thermo::CornerReport;

use plotters::prelude::*;
use std::path::{Path, PathBuf};

/// 图表尺寸
#[derive(Debug, Clone, Copy)]
pub struct PlotSize {
    pub width: u32,
    pub height: u32,
}

impl Default for PlotSize {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
        }
    }
}

/// `<stem>_corner<N>.<ext>`
pub fn corner_plot_path(base: &Path, corner_index: usize, use_svg: bool) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "diagram".to_string());
    let ext = if use_svg { "svg" } else { "png" };
    base.with_file_name(format!("{}_corner{}.{}", stem, corner_index, ext))
}

/// 生成单个角点的形成能图
pub fn generate_corner_plot(
    corner: &CornerReport,
    bandgap: f64,
    title: &str,
    output_path: &Path,
    size: PlotSize,
    use_svg: bool,
) -> Result<()> {
    if use_svg {
        let root = SVGBackend::new(output_path, (size.width, size.height)).into_drawing_area();
        draw_corner_chart(&root, corner, bandgap, title)?;
        root.present()
            .map_err(|e| DefectError::PlotError(e.to_string()))?;
    } else {
        let root = BitMapBackend::new(output_path, (size.width, size.height)).into_drawing_area();
        draw_corner_chart(&root, corner, bandgap, title)?;
        root.present()
            .map_err(|e| DefectError::PlotError(e.to_string()))?;
    }
    Ok(())
}

/// y 轴范围，上下各留 10% 余量
fn energy_range(corner: &CornerReport) -> (f64, f64) {
    let energies = corner
        .families
        .iter()
        .flat_map(|f| f.envelope.breakpoints.iter().map(|p| p.energy));

    let (min, max) = energies.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), e| {
        (lo.min(e), hi.max(e))
    });
    if !min.is_finite() || !max.is_finite() {
        return (-1.0, 1.0);
    }

    let span = (max - min).max(1.0);
    (min.min(0.0) - 0.1 * span, max + 0.1 * span)
}

fn draw_corner_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    corner: &CornerReport,
    bandgap: f64,
    title: &str,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)
        .map_err(|e| DefectError::PlotError(format!("{:?}", e)))?;

    let (y_min, y_max) = energy_range(corner);

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 28).into_font())
        .margin(30)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..bandgap, y_min..y_max)
        .map_err(|e| DefectError::PlotError(format!("{:?}", e)))?;

    chart
        .configure_mesh()
        .x_desc("Fermi level (eV)")
        .y_desc("Formation energy (eV)")
        .x_label_style(("sans-serif", 16))
        .y_label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(|e| DefectError::PlotError(format!("{:?}", e)))?;

    // ΔH = 0 参考线
    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![(0.0, 0.0), (bandgap, 0.0)],
            BLACK.mix(0.4).stroke_width(1),
        )))
        .map_err(|e| DefectError::PlotError(format!("{:?}", e)))?;

    for (i, family) in corner.families.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        let points: Vec<(f64, f64)> = family
            .envelope
            .breakpoints
            .iter()
            .map(|p| (p.fermi_level, p.energy))
            .collect();

        chart
            .draw_series(LineSeries::new(points, color.stroke_width(3)))
            .map_err(|e| DefectError::PlotError(format!("{:?}", e)))?
            .label(family.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(3)));

        chart
            .draw_series(
                family
                    .transitions
                    .iter()
                    .map(|t| Circle::new((t.fermi_level, t.energy), 5, color.filled())),
            )
            .map_err(|e| DefectError::PlotError(format!("{:?}", e)))?;
    }

    if !corner.families.is_empty() {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.85))
            .border_style(BLACK)
            .label_font(("sans-serif", 16))
            .draw()
            .map_err(|e| DefectError::PlotError(format!("{:?}", e)))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::{parse_template_str, Layout};
    use crate::thermo::Aggregator;

    #[test]
    fn test_corner_plot_path() {
        let path = corner_plot_path(Path::new("out/ZnO.svg"), 2, true);
        assert_eq!(path, PathBuf::from("out/ZnO_corner2.svg"));
        let path = corner_plot_path(Path::new("ZnO"), 1, false);
        assert_eq!(path, PathBuf::from("ZnO_corner1.png"));
    }

    #[test]
    fn test_energy_range_includes_zero() {
        let template =
            parse_template_str("bg,2.0\nZn-1,0.0\nV_Zn_0_1,1.0\n", "t.csv", Layout::Auto).unwrap();
        let report = Aggregator::default().run(&template).unwrap();
        let (lo, hi) = energy_range(&report.corners[0]);
        assert!(lo < 0.0);
        assert!(hi > 1.0);
    }
}
