use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::domain::ports::SyncNotifier;
use crate::domain::value_objects::{Environment, ProjectId};

/// Emits the refresh signal as a tracing event on the `envsync::sync` target.
///
/// Deployments that maintain derived state (caches, rendered `.env` files)
/// subscribe to that target.
///
/// The resolver calls this from detached tasks, so delivery is best-effort.
/// A short-lived process such as the CLI can shut its runtime down before
/// those tasks run, and the signal is then never emitted.
pub struct TracingSyncNotifier;

#[async_trait]
impl SyncNotifier for TracingSyncNotifier {
    async fn notify(
        &self,
        project: &ProjectId,
        environment: Environment,
        actor_id: &str,
    ) -> Result<()> {
        info!(
            target: "envsync::sync",
            project = %project,
            environment = %environment,
            actor = actor_id,
            "environment changed; derived state should refresh"
        );
        Ok(())
    }
}

pub struct NoopSyncNotifier;

#[async_trait]
impl SyncNotifier for NoopSyncNotifier {
    async fn notify(&self, _: &ProjectId, _: Environment, _: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notifiers_always_succeed() {
        let project = ProjectId("p".into());
        assert!(TracingSyncNotifier
            .notify(&project, Environment::Production, "u")
            .await
            .is_ok());
        assert!(NoopSyncNotifier
            .notify(&project, Environment::Staging, "u")
            .await
            .is_ok());
    }
}
