//! Sizes, durations and the post-build summary table.

use std::time::Duration;

use console::Term;
use owo_colors::OwoColorize;
use owo_colors::Stream::Stderr;
use satchel_bundler::BuildReport;

/// Human-readable byte count.
///
/// ```
/// use satchel_cli::ui::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(500), "500 B");
/// assert_eq!(format_size(1024), "1.00 KB");
/// assert_eq!(format_size(1_048_576), "1.00 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_idx = 0;
    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Human-readable duration.
///
/// ```
/// use std::time::Duration;
/// use satchel_cli::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// One line of the summary: an output file and the entry it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub path: String,
    pub size: u64,
    pub entry: Option<String>,
}

/// Rows for every written file, entry bundles first.
pub fn summary_rows(report: &BuildReport) -> Vec<SummaryRow> {
    let entry_of = |path: &str| {
        report
            .manifest
            .entries
            .iter()
            .find(|(_, files)| files.iter().any(|f| f == path))
            .map(|(name, _)| name.clone())
    };

    let mut rows: Vec<SummaryRow> = report
        .files
        .iter()
        .map(|file| SummaryRow {
            path: file.path.clone(),
            size: file.bytes.len() as u64,
            entry: entry_of(&file.path),
        })
        .collect();
    rows.sort_by(|a, b| {
        a.entry
            .is_none()
            .cmp(&b.entry.is_none())
            .then_with(|| a.path.cmp(&b.path))
    });
    rows
}

/// Print the summary table to stderr.
pub fn print_build_summary(report: &BuildReport) {
    let width = Term::stderr().size().1 as usize;
    let rows = summary_rows(report);
    let name_width = rows
        .iter()
        .map(|r| r.path.len())
        .max()
        .unwrap_or(0)
        .min(60);

    eprintln!(
        "\n{}",
        "Build Summary".if_supports_color(Stderr, |t| t.bold())
    );
    eprintln!("{}", "─".repeat(width.clamp(20, 80)));

    for row in &rows {
        let label = match &row.entry {
            Some(entry) => format!("[{}]", entry),
            None => String::new(),
        };
        eprintln!(
            "  {:<name_width$}  {:>10}  {}",
            row.path.if_supports_color(Stderr, |t| t.cyan()),
            format_size(row.size),
            label.if_supports_color(Stderr, |t| t.dimmed()),
            name_width = name_width
        );
    }

    eprintln!("{}", "─".repeat(width.clamp(20, 80)));
    eprintln!(
        "  {} file(s), {} total, {} source(s), {} artifact(s) in {}",
        rows.len(),
        format_size(report.total_size() as u64),
        report.sources,
        report.artifacts,
        format_duration(report.duration)
    );
}
