use crate::domain::{ports::OutputWriter, scan_report::ScanReport};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use self::{html::HtmlWriter, json::JsonWriter};

pub mod html;
pub mod json;

/// Register available writers - OCP: add new ones without touching main.rs
pub fn all_writers() -> Vec<Box<dyn OutputWriter>> {
    vec![Box::new(JsonWriter), Box::new(HtmlWriter)]
}

pub fn writer_for(format: &str) -> Option<Box<dyn OutputWriter>> {
    match format {
        "json" => Some(Box::new(JsonWriter)),
        "html" => Some(Box::new(HtmlWriter)),
        _ => None,
    }
}

/// Writes the scan report to `<dir>/<project>_<timestamp>.<ext>` and returns the path.
pub fn write_to_file(
    writer: &dyn OutputWriter,
    report: &ScanReport,
    dir: &Path,
) -> Result<PathBuf> {
    // Ensure the output directory exists
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let content = writer.format(report)?;
    let path = dir.join(report_file_name(report, writer.extension()));
    fs::write(&path, &content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

fn report_file_name(report: &ScanReport, extension: &str) -> String {
    let project: String = report.project_id.0.chars().map(file_safe).collect();
    format!(
        "{}_{}.{}",
        project,
        report.scanned_at.format("%Y%m%d_%H%M%S"),
        extension
    )
}

fn file_safe(c: char) -> char {
    if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
        c
    } else {
        '_'
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::ProjectId;

    #[test]
    fn writer_lookup() {
        assert_eq!(writer_for("json").unwrap().extension(), "json");
        assert_eq!(writer_for("html").unwrap().extension(), "html");
        assert!(writer_for("sql").is_none());
        assert_eq!(all_writers().len(), 2);
    }

    #[test]
    fn file_name_is_project_and_timestamp() {
        let report = ScanReport::new(ProjectId("acme/api".into()), 0, vec![]);
        let name = report_file_name(&report, "json");
        assert!(name.starts_with("acme_api_"), "{}", name);
        assert!(name.ends_with(".json"));
    }

    #[test]
    fn write_to_file_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("reports").join("nested");
        let report = ScanReport::new(ProjectId("p".into()), 0, vec![]);

        let path = write_to_file(&JsonWriter, &report, &target).unwrap();
        assert!(path.starts_with(&target));
        let written = fs::read_to_string(path).unwrap();
        assert!(written.contains("\"project_id\": \"p\""));
    }
}
