use crate::application::monitoring::PerfReport;
use crate::domain::conflict::{Conflict, Severity};
use crate::domain::resolution::{ResolutionAction, ResolutionReport, ResolveRequest};
use crate::domain::scan_report::ScanReport;
use crate::domain::value_objects::Environment;
use colored::*;
use tabled::settings::{object::Columns, Alignment, Modify, Style};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct SummaryRow {
    metric: String,
    value: String,
}

#[derive(Tabled)]
struct ConflictRow {
    severity: String,
    key: String,
    kind: String,
    #[tabled(rename = "DEV")]
    development: String,
    #[tabled(rename = "STG")]
    staging: String,
    #[tabled(rename = "PROD")]
    production: String,
    services: String,
}

fn colored_severity(severity: Severity) -> String {
    match severity {
        Severity::Critical => severity.as_str().red().bold().to_string(),
        Severity::Warning => severity.as_str().yellow().to_string(),
        Severity::Info => severity.as_str().blue().to_string(),
    }
}

fn slot_cell(conflict: &Conflict, env: Environment) -> String {
    match conflict.environments.get(env) {
        Some(slot) => slot.fingerprint.to_string().dimmed().to_string(),
        None => "—".red().to_string(),
    }
}

pub fn print_scan_summary(report: &ScanReport) {
    println!();

    println!("{}", "ENVSYNC CONFLICT SCAN".bold().cyan());
    println!(
        "Project: {}  ·  {} entries scanned",
        report.project_id.to_string().bright_yellow(),
        report.entries_scanned
    );
    println!();

    if report.is_clean() {
        println!("{}", "✓ No conflicts detected.".bold().green());
        println!();
        return;
    }

    let rows: Vec<ConflictRow> = report
        .conflicts
        .iter()
        .map(|c| ConflictRow {
            severity: colored_severity(c.severity),
            key: c.key_name.bold().to_string(),
            kind: c.kind.as_str().to_string(),
            development: slot_cell(c, Environment::Development),
            staging: slot_cell(c, Environment::Staging),
            production: slot_cell(c, Environment::Production),
            services: c.affected_services.join(", "),
        })
        .collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(0..=0)).with(Alignment::left()))
        .to_string();
    println!("{table}");

    let m = &report.metrics;
    let summary_rows = vec![
        SummaryRow {
            metric: "Critical".into(),
            value: m.critical.to_string().red().to_string(),
        },
        SummaryRow {
            metric: "Warning".into(),
            value: m.warning.to_string().yellow().to_string(),
        },
        SummaryRow {
            metric: "Info".into(),
            value: m.info.to_string().blue().to_string(),
        },
        SummaryRow {
            metric: "Total conflicts".into(),
            value: m.total.to_string().bold().to_string(),
        },
    ];

    let summary_table = Table::new(summary_rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..=1)).with(Alignment::right()))
        .to_string();

    println!();
    println!("{summary_table}");
    println!();
}

// ─── Resolution summary ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ResolutionRow {
    environment: String,
    action: String,
    result: String,
}

/// Print the per-target outcome of a resolution.
///
/// Returns `true` if any target failed (so the caller can exit non-zero).
pub fn print_resolution(request: &ResolveRequest, report: &ResolutionReport) -> bool {
    println!();
    println!("{}", "ENVSYNC RESOLUTION".bold().cyan());
    match (request.action, request.source_environment) {
        (ResolutionAction::Copy, Some(source)) => println!(
            "{} {} from {}",
            request.action.as_str().bold(),
            request.key_name.bright_yellow(),
            source.as_str().blue()
        ),
        _ => println!(
            "{} {}",
            request.action.as_str().bold(),
            request.key_name.bright_yellow()
        ),
    }
    println!();

    if report.results.is_empty() {
        println!("{}", "Nothing to do.".italic());
        println!();
        return false;
    }

    let rows: Vec<ResolutionRow> = report
        .results
        .iter()
        .map(|r| ResolutionRow {
            environment: r.environment.as_str().bold().to_string(),
            action: r.action_taken.as_str().to_string(),
            result: match &r.error {
                None => "ok".green().to_string(),
                Some(e) => e.red().to_string(),
            },
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");

    let failed = report.failed_count();
    let total = report.results.len();
    if failed == 0 {
        let message = format!("✓ {} of {} environment(s) updated.", total, total);
        println!("{}", message.green());
    } else {
        let message = format!(
            "{} of {} environment(s) updated, {} failed.",
            total - failed,
            total,
            failed
        );
        println!("{}", message.yellow());
    }
    println!();

    failed > 0
}

// ─── Performance summary ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct PerfRow {
    operation: String,
    subject: String,
    #[tabled(rename = "rows")]
    rows: String,
    #[tabled(rename = "time (ms)")]
    duration_ms: String,
}

/// Print a performance timing table to stdout.
pub fn print_perf_summary(report: &PerfReport) {
    if report.timings.is_empty() {
        return;
    }

    println!("{}", "PERFORMANCE".bold().cyan());

    let rows: Vec<PerfRow> = report
        .timings
        .iter()
        .map(|t| PerfRow {
            operation: t.operation.dimmed().to_string(),
            subject: t.subject.bold().to_string(),
            rows: t.rows.to_string(),
            duration_ms: format_duration(t.duration_ms),
        })
        .collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..=3)).with(Alignment::right()))
        .to_string();

    println!("{table}");

    println!(
        "  Total: {} row(s) read  ·  {} ms elapsed",
        report.total_rows_read.to_string().bold(),
        format_duration(report.total_ms),
    );
    println!();
}

fn format_duration(ms: u128) -> String {
    if ms >= 1_000 {
        format!("{:.1}s", ms as f64 / 1_000.0).yellow().to_string()
    } else if ms >= 100 {
        ms.to_string().yellow().to_string()
    } else {
        ms.to_string().green().to_string()
    }
}
