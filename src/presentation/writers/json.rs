use anyhow::Result;

use crate::domain::{ports::OutputWriter, scan_report::ScanReport};

pub struct JsonWriter;

impl OutputWriter for JsonWriter {
    fn format(&self, report: &ScanReport) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::detector::ConflictDetector;
    use crate::domain::entry::ConfigEntry;
    use crate::domain::value_objects::{EntryId, Environment, ProjectId, ServiceId};
    use chrono::Utc;
    use serde_json::Value;

    fn entry(
        key: &str,
        env: Environment,
        value: &str,
        service: Option<(&str, &str)>,
    ) -> ConfigEntry {
        ConfigEntry {
            id: EntryId(format!("{}-{}", key, env)),
            key_name: key.into(),
            environment: env,
            decrypted_value: value.into(),
            associated_service_id: service.map(|(id, _)| ServiceId(id.into())),
            associated_service_name: service.map(|(_, name)| name.into()),
            updated_at: Utc::now(),
        }
    }

    fn report() -> ScanReport {
        let entries = vec![
            entry("API_KEY", Environment::Development, "abc", None),
            entry("API_KEY", Environment::Staging, "abc", None),
            entry(
                "DB_URL",
                Environment::Development,
                "a",
                Some(("s1", "Supabase")),
            ),
            entry("DB_URL", Environment::Staging, "a", Some(("s2", "Neon"))),
        ];
        let conflicts = ConflictDetector::new().detect(&entries);
        ScanReport::new(ProjectId("p1".into()), entries.len(), conflicts)
    }

    fn parsed() -> Value {
        serde_json::from_str(&JsonWriter.format(&report()).unwrap()).unwrap()
    }

    #[test]
    fn json_output_has_metrics_and_conflicts() {
        let v = parsed();
        assert_eq!(v["project_id"], "p1");
        assert_eq!(v["entries_scanned"], 4);
        assert_eq!(v["metrics"]["total"], 3);
        assert_eq!(v["metrics"]["critical"], 2);
        assert_eq!(v["metrics"]["info"], 1);
    }

    #[test]
    fn json_conflict_shape_uses_snake_case_and_null_slots() {
        let v = parsed();
        let first = &v["conflicts"][0];
        assert_eq!(first["id"], "missing_value-API_KEY");
        assert_eq!(first["kind"], "missing_value");
        assert_eq!(first["severity"], "critical");
        assert!(first["environments"]["production"].is_null());
        assert!(first["environments"]["development"]["fingerprint"].is_string());

        let last = &v["conflicts"][2];
        assert_eq!(last["kind"], "config_mismatch");
        assert_eq!(
            last["affected_services"],
            serde_json::json!(["Supabase", "Neon"])
        );
    }

    #[test]
    fn json_output_has_no_plaintext() {
        let output = JsonWriter.format(&report()).unwrap();
        assert!(!output.contains("\"abc\""));
        assert!(!output.contains("decrypted_value"));
    }
}
