//! # envsync — library usage example
//!
//! Shows three common patterns for consuming envsync as a Rust library:
//!
//! 1. **From a config file** — scan a project in a real database
//! 2. **In memory** — wire the services by hand, no database needed
//! 3. **Inspect and resolve** — walk the conflicts and fix the critical ones
//!
//! Run with a config file:
//!   cargo run --example resolve_as_lib -- envsync.toml my-project
//!
//! Run fully in memory:
//!   cargo run --example resolve_as_lib

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use envsync::domain::entry::StoredEntry;
use envsync::domain::ports::{RecordStore, ValueCipher};
use envsync::infrastructure::cipher::{derive_key, ChaChaValueCipher};
use envsync::infrastructure::memory_store::InMemoryRecordStore;
use envsync::infrastructure::notifier::NoopSyncNotifier;
use envsync::presentation::writers::{all_writers, write_to_file};
use envsync::Environment::{Development, Production, Staging};
use envsync::{
    AppConfig, ConflictKind, ConflictResolver, EntryId, Environment, ProjectId, ResolutionAction,
    ResolveRequest, ScanReport, ScanService, ServiceId, Severity,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    match (args.get(1), args.get(2)) {
        (Some(path), Some(project)) => from_config_file(path, project).await,
        _ => in_memory().await,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pattern 1 — load config from a TOML file (same as the CLI does internally)
// ─────────────────────────────────────────────────────────────────────────────
async fn from_config_file(path: &str, project: &str) -> Result<()> {
    println!("=== Pattern 1: from config file ({path}) ===\n");

    let cfg = AppConfig::load(path)?;
    let report = envsync::scan(&cfg, &ProjectId(project.into()), "example").await?;

    for writer in all_writers() {
        let written = write_to_file(&*writer, &report, Path::new(&cfg.output.dir))?;
        println!("Written: {}", written.display());
    }

    print_summary(&report);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Pattern 2 — build the services by hand over an in-memory store.
// Useful in tests, or when the entries come from somewhere other than SQL.
// ─────────────────────────────────────────────────────────────────────────────
async fn in_memory() -> Result<()> {
    println!("=== Pattern 2: in memory ===\n");

    let cipher = Arc::new(ChaChaValueCipher::new(derive_key("example passphrase")?));
    let project = ProjectId("demo".into());

    let seed = |key: &str, env: Environment, value: &str, service: Option<&str>| {
        anyhow::Ok(StoredEntry {
            id: EntryId(format!("{key}-{env}")),
            project_id: project.clone(),
            key_name: key.into(),
            environment: env,
            encrypted_value: cipher.encrypt(value)?,
            service_id: service.map(|s| ServiceId(s.into())),
            service_name: None,
            is_secret: true,
            description: None,
            updated_at: Utc::now(),
        })
    };

    let store = Arc::new(InMemoryRecordStore::with_entries(vec![
        seed("STRIPE_KEY", Development, "sk_test_123", Some("stripe"))?,
        seed("STRIPE_KEY", Staging, "sk_test_123", Some("stripe"))?,
        seed("DATABASE_URL", Development, "pg://dev", Some("supabase"))?,
        seed("DATABASE_URL", Staging, "pg://stg", Some("neon"))?,
        seed("DATABASE_URL", Production, "pg://prod", Some("supabase"))?,
    ]));
    store.register_service(ServiceId("stripe".into()), "Stripe")?;
    store.register_service(ServiceId("supabase".into()), "Supabase")?;
    store.register_service(ServiceId("neon".into()), "Neon")?;

    let scanner = ScanService::new(store.clone(), cipher.clone());
    let report = scanner.scan(&project).await?;
    print_summary(&report);

    // Hand off to pattern 3
    let resolver = ConflictResolver::new(store.clone(), cipher, Arc::new(NoopSyncNotifier));
    resolve_critical(&resolver, &report).await?;

    let after = scanner.scan(&project).await?;
    println!("\nAfter resolution:");
    print_summary(&after);

    let prod = store.find_entry(&project, "STRIPE_KEY", Production).await?;
    let state = if prod.is_some() { "present" } else { "absent" };
    println!("STRIPE_KEY in production: {state}");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Pattern 3 — inspect the report and resolve what matters.
// The ScanReport is plain serialisable Rust data — no magic, no callbacks.
// ─────────────────────────────────────────────────────────────────────────────
async fn resolve_critical(resolver: &ConflictResolver, report: &ScanReport) -> Result<()> {
    println!("=== Pattern 3: resolving critical conflicts ===\n");

    for conflict in &report.conflicts {
        if conflict.kind != ConflictKind::MissingValue || conflict.severity != Severity::Critical {
            continue;
        }

        // Copy from the first environment that has a value.
        let present = conflict.environments.present();
        let Some(&source) = present.first() else {
            continue;
        };
        let request = ResolveRequest {
            project_id: report.project_id.clone(),
            key_name: conflict.key_name.clone(),
            source_environment: Some(source),
            target_environments: conflict.environments.missing(),
            action: ResolutionAction::Copy,
        };

        let outcome = resolver.resolve(&request, "example").await?;
        for result in &outcome.results {
            println!(
                "  {} → {}: {} {}",
                conflict.key_name,
                result.environment,
                result.action_taken.as_str(),
                result.error.as_deref().unwrap_or("ok"),
            );
        }
    }

    // Example: serialise to JSON and send to a webhook / write to a log
    let json = serde_json::to_string_pretty(report)?;
    println!("\nFull report: {} bytes of JSON", json.len());
    Ok(())
}

fn print_summary(report: &ScanReport) {
    println!("── {} ──────────────────────", report.project_id);
    for conflict in &report.conflicts {
        println!(
            "  [{}] {}",
            conflict.severity.as_str(),
            conflict.description
        );
    }
    println!("  critical : {}", report.metrics.critical);
    println!("  warning  : {}", report.metrics.warning);
    println!("  info     : {}", report.metrics.info);
}
