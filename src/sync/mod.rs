pub mod orchestrator;
pub mod reconciler;


use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::model::integration::Integration;
use crate::providers::{self, ProviderError};
use crate::store::TaskStore;
use reconciler::SyncReconciler;

/// Outcome of one reconciliation pass for one integration. Returned to the
/// caller and discarded, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub success: bool,
    pub message: String,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
    pub created_items: Vec<String>,
    pub updated_items: Vec<String>,
    pub error_messages: Vec<String>,
}

impl SyncResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            created: 0,
            updated: 0,
            skipped: 0,
            errors: 0,
            created_items: Vec::new(),
            updated_items: Vec::new(),
            error_messages: Vec::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::success(message)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedSync {
    pub integration: Integration,
    pub error: String,
}

/// Aggregated outcome of one orchestration run across integrations and
/// providers.
#[derive(Debug, Clone, Serialize)]
pub struct MultiProviderSyncResult {
    pub success: bool,
    pub synced: Vec<Integration>,
    pub failed: Vec<FailedSync>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl MultiProviderSyncResult {
    pub(crate) fn begin() -> Self {
        let now = Utc::now();
        Self {
            success: true,
            synced: Vec::new(),
            failed: Vec::new(),
            global_error: None,
            started_at: now,
            finished_at: now,
        }
    }

    /// Fold another group's result into this one. Synced and failed lists
    /// concatenate; the first non-empty global error wins.
    pub fn merge(&mut self, other: MultiProviderSyncResult) {
        self.synced.extend(other.synced);
        self.failed.extend(other.failed);
        if self.global_error.is_none() {
            self.global_error = other.global_error;
        }
    }

    /// A run succeeds when nothing failed globally and either at least one
    /// integration synced or nothing failed at all (a no-op run counts).
    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self.success =
            self.global_error.is_none() && (!self.synced.is_empty() || self.failed.is_empty());
        self
    }
}

/// Configuration for one orchestration run. Immutable for its duration.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// How stale an integration's last sync may be before it is due.
    pub max_age: Duration,
    /// Sync every active integration regardless of staleness.
    pub force_sync: bool,
    /// Bound on simultaneous syncs within one provider group.
    pub concurrent_syncs: usize,
    pub skip_test_connection: bool,
    /// Overrides for the built-in provider ordering (lower runs first).
    pub provider_priorities: HashMap<String, u32>,
    /// When set, bounds each integration's sync attempt.
    pub sync_timeout: Option<std::time::Duration>,
    /// Advisory only; no automatic re-attempt is performed.
    pub retry_failed_connections: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_age: Duration::hours(1),
            force_sync: false,
            concurrent_syncs: 3,
            skip_test_connection: false,
            provider_priorities: HashMap::new(),
            sync_timeout: None,
            retry_failed_connections: false,
        }
    }
}

impl SyncOptions {
    /// Serial, short-staleness settings for recovering after an outage.
    pub fn emergency() -> Self {
        Self {
            max_age: Duration::minutes(5),
            concurrent_syncs: 1,
            retry_failed_connections: true,
            ..Self::default()
        }
    }

    pub fn provider_priority(&self, tag: &str) -> u32 {
        self.provider_priorities
            .get(tag)
            .copied()
            .unwrap_or_else(|| default_provider_priority(tag))
    }
}

pub fn default_provider_priority(tag: &str) -> u32 {
    match tag {
        "GitHub" => 1,
        "AzureDevOps" => 2,
        _ => 99,
    }
}

/// Execution-side interface the orchestrator binds to, one implementation per
/// provider. Configuration and listing of integrations live on
/// `IntegrationStore`; keeping the two apart avoids the circular dependency a
/// combined service would need a locator for.
#[async_trait]
pub trait IntegrationSyncService: Send + Sync {
    fn provider_tag(&self) -> &str;

    async fn test_connection(&self, integration: &Integration) -> Result<bool, ProviderError>;

    /// Import remote items that have no local counterpart. Never returns an
    /// error; failures surface in the result.
    async fn sync_new_items(&self, integration: &Integration) -> SyncResult;

    /// Refresh the status of already-imported tasks from their remote state.
    async fn update_existing_from_remote(&self, integration: &Integration) -> SyncResult;
}

/// Reconcilers for every shipped provider, keyed by provider tag.
pub fn default_services(
    tasks: Arc<dyn TaskStore>,
) -> HashMap<String, Arc<dyn IntegrationSyncService>> {
    let mut services: HashMap<String, Arc<dyn IntegrationSyncService>> = HashMap::new();
    for client in providers::create_clients() {
        let tag = client.tag().to_string();
        services.insert(tag, Arc::new(SyncReconciler::new(client, Arc::clone(&tasks))));
    }
    services
}
