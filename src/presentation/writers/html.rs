use anyhow::Result;
use sailfish::TemplateOnce;

use crate::domain::conflict::{Conflict, ConflictEnvironmentEntry};
use crate::domain::value_objects::Environment;
use crate::domain::{ports::OutputWriter, scan_report::ScanReport};

#[derive(TemplateOnce)]
#[template(path = "html/conflicts.stpl")] // base dir declared inside sailfish.toml
struct ConflictsTemplate<'a> {
    report: &'a ScanReport,
}

/// Cell text for one environment slot of a conflict.
fn slot_label(conflict: &Conflict, env: Environment) -> String {
    match conflict.environments.get(env) {
        None => "missing".to_string(),
        Some(ConflictEnvironmentEntry {
            fingerprint,
            service_name,
            ..
        }) => match service_name {
            Some(service) => format!("{} · {}", fingerprint, service),
            None => fingerprint.to_string(),
        },
    }
}

pub struct HtmlWriter;

impl OutputWriter for HtmlWriter {
    fn format(&self, report: &ScanReport) -> Result<String> {
        Ok(ConflictsTemplate { report }.render_once()?)
    }

    fn extension(&self) -> &'static str {
        "html"
    }
}
