//! Human-readable run report

use crate::crawler::RunReport;
use std::fmt::Write;

/// Formats a run report as plain text
pub fn format_report(report: &RunReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Sweep Report ===\n");
    let _ = writeln!(
        out,
        "Started: {}",
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "Duration: {:.2}s", report.elapsed.as_secs_f64());
    let _ = writeln!(out, "Pages processed: {}", report.pages_processed);
    let _ = writeln!(out, "Items found: {}", report.items_found);
    let _ = writeln!(out, "Last non-empty page: {}", report.max_page_found);

    if report.failed_pages.is_empty() {
        let _ = writeln!(out, "Failed pages: 0");
    } else {
        let pages: Vec<String> = report.failed_pages.iter().map(u64::to_string).collect();
        let _ = writeln!(
            out,
            "Failed pages: {} ({})",
            report.failed_pages.len(),
            pages.join(", ")
        );
    }

    if report.items_downloaded > 0 || !report.failed_downloads.is_empty() {
        let _ = writeln!(out, "Items downloaded: {}", report.items_downloaded);
        if !report.failed_downloads.is_empty() {
            let _ = writeln!(
                out,
                "Failed downloads: {} ({})",
                report.failed_downloads.len(),
                report.failed_downloads.join(", ")
            );
        }
    }

    let status = if report.has_error {
        "interrupted"
    } else if report.catalog_exhausted {
        "complete"
    } else {
        "stopped at page limit"
    };
    let _ = writeln!(out, "Status: {}", status);

    out
}

pub fn print_report(report: &RunReport) {
    print!("{}", format_report(report));
}
