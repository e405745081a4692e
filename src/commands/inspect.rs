//! # inspect 子命令实现
//!
//! 打印解析后的模板：带隙、角点化学势、缺陷行，以及每个缺陷在
//! 每个角点上的 ΔH(E_F = 0)。
//!
//! ## 依赖关系
//! - 使用 `cli/inspect.rs` 定义的 InspectArgs
//! - 使用 `parsers/` 读取模板, `thermo/enthalpy.rs` 计算 ΔH(0)

use crate::cli::inspect::InspectArgs;
use crate::error::Result;
use crate::models::diagram::format_charge;
use crate::models::{EnthalpyTerms, Template};
use crate::parsers;
use crate::thermo::enthalpy::formation_enthalpy;
use crate::utils::output;

use tabled::builder::Builder;
use tabled::{Table, Tabled};

/// 执行 inspect 子命令
pub fn execute(args: InspectArgs) -> Result<()> {
    output::print_header("Defect Template");

    let template = parsers::parse_template_file(&args.template, args.layout.into())?;

    output::print_info(&format!("Source:  {}", template.source));
    output::print_info(&format!("Formula: {}", template.formula));
    output::print_info(&format!("Bandgap: {:.4} eV", template.bandgap));
    for key in &template.unrecognized {
        output::print_warning(&format!("Unrecognized key '{}' ignored", key));
    }

    print_corner_table(&template);
    print_defect_table(&template);
    print_enthalpy_table(&template);

    let families = template.families();
    output::print_header("Defect Families");
    for family in &families {
        let charges: Vec<String> = family.charges().into_iter().map(format_charge).collect();
        output::print_info(&format!("{}: q = {}", family.label, charges.join(", ")));
    }

    output::print_done(&format!(
        "{} corner(s), {} defect(s), {} family(ies)",
        template.corners.len(),
        template.defects.len(),
        families.len()
    ));

    Ok(())
}

fn print_corner_table(template: &Template) {
    #[derive(Tabled)]
    struct CornerRow {
        #[tabled(rename = "#")]
        index: usize,
        #[tabled(rename = "Corner")]
        label: String,
        #[tabled(rename = "Rich in")]
        rich: String,
        #[tabled(rename = "Chemical potentials (eV)")]
        potentials: String,
    }

    let rows: Vec<CornerRow> = template
        .corners
        .iter()
        .map(|c| CornerRow {
            index: c.index,
            label: c.label.clone(),
            rich: c.rich_label().unwrap_or_else(|| "-".to_string()),
            potentials: c
                .potentials
                .iter()
                .map(|(el, mu)| format!("{} = {:.4}", el, mu))
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();

    output::print_header("Chemical Potential Corners");
    if rows.is_empty() {
        output::print_warning("Template defines no corners");
    } else {
        println!("{}", Table::new(&rows));
    }
}

fn print_defect_table(template: &Template) {
    #[derive(Tabled)]
    struct DefectRow {
        #[tabled(rename = "Key")]
        key: String,
        #[tabled(rename = "Type")]
        kind: String,
        #[tabled(rename = "Site")]
        site: String,
        #[tabled(rename = "q")]
        charge: String,
        #[tabled(rename = "Index")]
        index: String,
        #[tabled(rename = "Enthalpy terms")]
        terms: String,
    }

    let rows: Vec<DefectRow> = template
        .defects
        .iter()
        .map(|d| DefectRow {
            key: d.key.clone(),
            kind: d.kind.to_string(),
            site: d.site.clone(),
            charge: format_charge(d.charge),
            index: d.index.clone(),
            terms: match &d.terms {
                EnthalpyTerms::Relative(h) => format!("H = {:.4}", h),
                EnthalpyTerms::Stoichiometric { dh_vbm, counts } => {
                    let mut text = format!("ΔH(VBM) = {:.4}", dh_vbm);
                    for (axis, n) in counts {
                        text.push_str(&format!(", n{} = {}", axis, n));
                    }
                    text
                }
            },
        })
        .collect();

    output::print_header("Defects");
    if rows.is_empty() {
        output::print_warning("Template defines no defects");
    } else {
        println!("{}", Table::new(&rows));
    }
}

/// 缺陷 × 角点的 ΔH(0) 矩阵；缺失化学势处显示 `n/a`
fn print_enthalpy_table(template: &Template) {
    if template.corners.is_empty() || template.defects.is_empty() {
        return;
    }

    let mut builder = Builder::default();
    let mut header = vec!["Defect".to_string()];
    header.extend(template.corners.iter().map(|c| format!("Corner {}", c.label)));
    builder.push_record(header);

    for defect in &template.defects {
        let mut row = vec![defect.key.clone()];
        row.extend(template.corners.iter().map(|c| {
            formation_enthalpy(c, defect)
                .map(|h| format!("{:.4}", h))
                .unwrap_or_else(|_| "n/a".to_string())
        }));
        builder.push_record(row);
    }

    output::print_header("ΔH(E_F = 0) (eV)");
    println!("{}", builder.build());
}
