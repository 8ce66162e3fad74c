use fieldscan_core::model::RegionSet;
use fieldscan_core::pipeline::ExtractionReport;
use std::fmt::Write;

pub fn format_report(report: &ExtractionReport) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Processed {} document(s), {} page(s)",
        report.documents, report.pages
    );
    let _ = writeln!(
        out,
        "  Rows {}..{}  ({} cell(s) written)\n",
        report.start_row,
        report.next_row.saturating_sub(1).max(report.start_row),
        report.cell_writes.len()
    );

    if !report.cell_writes.is_empty() {
        let width = report
            .cell_writes
            .iter()
            .map(|w| w.cell_ref().len())
            .max()
            .unwrap_or(2);
        for write in &report.cell_writes {
            let _ = writeln!(out, "  {:<width$}  {}", write.cell_ref(), write.value);
        }
        out.push('\n');
    }

    if !report.geometry_warnings.is_empty() {
        let _ = writeln!(out, "Regions outside the page:");
        for w in &report.geometry_warnings {
            let _ = writeln!(
                out,
                "  {} page {}: {}",
                w.document.display(),
                w.page + 1,
                w.region
            );
        }
        out.push('\n');
    }

    if !report.cell_conflicts.is_empty() {
        let _ = writeln!(out, "Cells claimed by more than one region:");
        for c in &report.cell_conflicts {
            let _ = writeln!(
                out,
                "  {} page {}: {}",
                c.document.display(),
                c.page + 1,
                c.conflict
            );
        }
        out.push('\n');
    }

    if !report.failures.is_empty() {
        let _ = writeln!(out, "Recognition failures (left empty):");
        for f in &report.failures {
            let _ = writeln!(out, "  {f}");
        }
        out.push('\n');
    }

    out
}

pub fn format_region_set(set: &RegionSet) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({} regions)\n", set.set_name, set.regions.len());

    let name_width = set
        .regions
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(4)
        .max(4);

    let _ = writeln!(
        out,
        "  {:<name_width$}  {:<6}  {:>6} {:>6} {:>6} {:>6}  {:>3}",
        "Name", "Type", "x", "y", "w", "h", "tol"
    );
    for r in &set.regions {
        let _ = writeln!(
            out,
            "  {:<name_width$}  {:<6}  {:>6} {:>6} {:>6} {:>6}  {:>3}",
            r.name,
            r.field_type.to_string(),
            r.x,
            r.y,
            r.w,
            r.h,
            r.tolerance
        );
    }
    out
}
