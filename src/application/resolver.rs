use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::domain::entry::{EntryUpdate, NewEntry, StoredEntry};
use crate::domain::ports::{RecordStore, SyncNotifier, ValueCipher};
use crate::domain::resolution::{
    ActionTaken, ResolutionAction, ResolutionReport, ResolutionResult, ResolveError, ResolveRequest,
};
use crate::domain::value_objects::{Environment, ProjectId};

// ─────────────────────────────────────────────────────────────────────────────
// ConflictResolver
// ─────────────────────────────────────────────────────────────────────────────

/// Applies a `copy` or `delete` resolution across target environments.
///
/// # Failure model
/// - Malformed request, missing copy source, or undecryptable copy source:
///   the whole request fails before any target is touched.
/// - Anything that goes wrong for one target (lookup, cipher, store write) is
///   recorded in that target's result slot; remaining targets still run and
///   completed writes are not rolled back.
///
/// Targets are processed sequentially, so results come back in request
/// order. After each successful target a [`SyncNotifier`] call is spawned
/// and never awaited.
pub struct ConflictResolver {
    store: Arc<dyn RecordStore>,
    cipher: Arc<dyn ValueCipher>,
    notifier: Arc<dyn SyncNotifier>,
}

impl ConflictResolver {
    pub fn new(
        store: Arc<dyn RecordStore>,
        cipher: Arc<dyn ValueCipher>,
        notifier: Arc<dyn SyncNotifier>,
    ) -> Self {
        Self {
            store,
            cipher,
            notifier,
        }
    }

    #[instrument(
        name = "resolve",
        skip(self, request, actor_id),
        fields(project = %request.project_id, key = %request.key_name, action = %request.action),
        level = "info"
    )]
    pub async fn resolve(
        &self,
        request: &ResolveRequest,
        actor_id: &str,
    ) -> Result<ResolutionReport, ResolveError> {
        request.validate()?;

        let results = match request.action {
            ResolutionAction::Copy => {
                let source_env = request.source_environment.ok_or_else(|| {
                    ResolveError::InvalidRequest("source_environment is required for copy".into())
                })?;
                self.copy(
                    &request.project_id,
                    &request.key_name,
                    source_env,
                    &request.target_environments,
                    actor_id,
                )
                .await?
            }
            ResolutionAction::Delete => {
                self.delete(
                    &request.project_id,
                    &request.key_name,
                    &request.target_environments,
                    actor_id,
                )
                .await
            }
        };

        let report = ResolutionReport::new(results);
        info!(
            targets = report.results.len(),
            failed = report.failed_count(),
            "resolution completed"
        );
        Ok(report)
    }

    async fn copy(
        &self,
        project: &ProjectId,
        key_name: &str,
        source_env: Environment,
        targets: &[Environment],
        actor_id: &str,
    ) -> Result<Vec<ResolutionResult>, ResolveError> {
        let source = self
            .store
            .find_entry(project, key_name, source_env)
            .await
            .with_context(|| format!("failed to load {} from {}", key_name, source_env))?
            .ok_or_else(|| ResolveError::SourceNotFound {
                key_name: key_name.to_string(),
                environment: source_env,
            })?;

        // Decrypted once; re-encrypted per target below.
        let plaintext = self
            .cipher
            .decrypt(&source.encrypted_value)
            .map_err(|e| ResolveError::SourceDecrypt(format!("{:#}", e)))?;

        let mut results = Vec::with_capacity(targets.len());
        for &target in targets {
            if target == source_env {
                debug!(environment = %target, "target equals source; skipped");
                continue;
            }

            let result = self.copy_to(&source, &plaintext, target).await;
            self.record_outcome(project, &result, actor_id);
            results.push(result);
        }
        Ok(results)
    }

    /// A failed lookup fails the target without writing to it.
    async fn copy_to(
        &self,
        source: &StoredEntry,
        plaintext: &str,
        target: Environment,
    ) -> ResolutionResult {
        let (project, key_name) = (&source.project_id, &source.key_name);
        let existing = match self.store.find_entry(project, key_name, target).await {
            Ok(existing) => existing,
            Err(e) => {
                let e = e.context(format!("failed to look up {} in {}", key_name, target));
                return ResolutionResult {
                    environment: target,
                    action_taken: ActionTaken::Skipped,
                    error: Some(format!("{:#}", e)),
                };
            }
        };

        let action_taken = if existing.is_some() {
            ActionTaken::Updated
        } else {
            ActionTaken::Created
        };
        let outcome = self
            .write_copy(existing.as_ref(), source, plaintext, target)
            .await;

        ResolutionResult {
            environment: target,
            action_taken,
            error: outcome.err().map(|e| format!("{:#}", e)),
        }
    }

    async fn write_copy(
        &self,
        existing: Option<&StoredEntry>,
        source: &StoredEntry,
        plaintext: &str,
        target: Environment,
    ) -> Result<()> {
        let key_name = &source.key_name;
        let encrypted_value = self
            .cipher
            .encrypt(plaintext)
            .with_context(|| format!("failed to encrypt value for {}", target))?;

        match existing {
            Some(entry) => {
                let update = EntryUpdate {
                    encrypted_value,
                    service_id: source.service_id.clone(),
                    is_secret: source.is_secret,
                    description: source.description.clone(),
                    updated_at: Utc::now(),
                };
                self.store
                    .update_entry(&entry.id, &update)
                    .await
                    .with_context(|| format!("failed to update {} in {}", key_name, target))
            }
            None => {
                let entry = NewEntry {
                    project_id: source.project_id.clone(),
                    key_name: key_name.clone(),
                    environment: target,
                    encrypted_value,
                    service_id: source.service_id.clone(),
                    is_secret: source.is_secret,
                    description: source.description.clone(),
                };
                self.store
                    .create_entry(&entry)
                    .await
                    .map(|_| ())
                    .with_context(|| format!("failed to create {} in {}", key_name, target))
            }
        }
    }

    async fn delete(
        &self,
        project: &ProjectId,
        key_name: &str,
        targets: &[Environment],
        actor_id: &str,
    ) -> Vec<ResolutionResult> {
        let mut results = Vec::with_capacity(targets.len());
        for &target in targets {
            let error = match self.store.delete_entries(project, key_name, target).await {
                Ok(removed) => {
                    debug!(environment = %target, removed, "delete applied");
                    None
                }
                Err(e) => Some(format!(
                    "{:#}",
                    e.context(format!("failed to delete {} in {}", key_name, target))
                )),
            };

            let result = ResolutionResult {
                environment: target,
                action_taken: ActionTaken::Deleted,
                error,
            };
            self.record_outcome(project, &result, actor_id);
            results.push(result);
        }
        results
    }

    fn record_outcome(&self, project: &ProjectId, result: &ResolutionResult, actor_id: &str) {
        match &result.error {
            None => {
                info!(
                    environment = %result.environment,
                    action = result.action_taken.as_str(),
                    "target resolved"
                );
                self.spawn_notify(project, result.environment, actor_id);
            }
            Some(error) => {
                warn!(
                    environment = %result.environment,
                    action = result.action_taken.as_str(),
                    %error,
                    "target failed"
                );
            }
        }
    }

    fn spawn_notify(&self, project: &ProjectId, environment: Environment, actor_id: &str) {
        let notifier = Arc::clone(&self.notifier);
        let project = project.clone();
        let actor_id = actor_id.to_string();

        // Fire-and-forget: the handle is dropped and the notifier's result is
        // discarded on purpose. Do not await or propagate.
        let _detached = tokio::spawn(async move {
            let _ = notifier.notify(&project, environment, &actor_id).await;
        });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
