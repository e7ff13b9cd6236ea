use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Semaphore;

use super::{FailedSync, IntegrationSyncService, MultiProviderSyncResult, SyncOptions};
use crate::model::integration::Integration;
use crate::store::IntegrationStore;

/// Coordinates sync across integrations and providers: selects what is due,
/// runs each provider group with bounded concurrency, and stamps last-sync
/// timestamps for the integrations that actually succeeded.
pub struct SyncOrchestrator {
    integrations: Arc<dyn IntegrationStore>,
    services: HashMap<String, Arc<dyn IntegrationSyncService>>,
}

impl SyncOrchestrator {
    pub fn new(
        integrations: Arc<dyn IntegrationStore>,
        services: HashMap<String, Arc<dyn IntegrationSyncService>>,
    ) -> Self {
        Self {
            integrations,
            services,
        }
    }

    /// Integrations that should sync this run: all active ones when forcing,
    /// otherwise the active ones whose last sync is missing or stale.
    pub async fn select_due(&self, options: &SyncOptions) -> Result<Vec<Integration>> {
        if options.force_sync {
            self.integrations.get_all_active().await
        } else {
            self.integrations.get_due_for_sync(options.max_age).await
        }
    }

    pub async fn run_smart_sync(&self, options: &SyncOptions) -> MultiProviderSyncResult {
        let mut aggregate = MultiProviderSyncResult::begin();
        if let Err(e) = self.smart_sync_inner(options, &mut aggregate).await {
            aggregate.global_error = Some(e.to_string());
        }
        aggregate.finish()
    }

    async fn smart_sync_inner(
        &self,
        options: &SyncOptions,
        aggregate: &mut MultiProviderSyncResult,
    ) -> Result<()> {
        let due = self.select_due(options).await?;
        if due.is_empty() {
            tracing::info!("no integrations due for sync");
            return Ok(());
        }
        tracing::info!(count = due.len(), "starting sync run");

        for (provider, group) in group_by_provider(due, options) {
            let group_result = self.sync_group(&provider, group, options).await;
            aggregate.merge(group_result);
        }

        self.mark_synced(aggregate).await
    }

    /// Serial retry pass with a short staleness window, for recovering after
    /// an outage without hammering the providers.
    pub async fn run_emergency_sync(&self) -> MultiProviderSyncResult {
        self.run_smart_sync(&SyncOptions::emergency()).await
    }

    /// Sync every active integration of a single provider.
    pub async fn sync_provider(
        &self,
        provider: &str,
        options: &SyncOptions,
    ) -> MultiProviderSyncResult {
        let mut aggregate = MultiProviderSyncResult::begin();
        let outcome: Result<()> = async {
            let group = self.integrations.get_active_by_provider(provider).await?;
            if group.is_empty() {
                return Ok(());
            }
            let group_result = self.sync_group(provider, group, options).await;
            aggregate.merge(group_result);
            self.mark_synced(&aggregate).await
        }
        .await;
        if let Err(e) = outcome {
            aggregate.global_error = Some(e.to_string());
        }
        aggregate.finish()
    }

    /// Sync a hand-picked set of integrations. Ids that don't resolve to an
    /// active integration are skipped silently.
    pub async fn sync_specific_integrations(
        &self,
        ids: &[String],
        options: &SyncOptions,
    ) -> MultiProviderSyncResult {
        let mut aggregate = MultiProviderSyncResult::begin();
        let outcome: Result<()> = async {
            let selected: Vec<Integration> = self
                .integrations
                .get_all_active()
                .await?
                .into_iter()
                .filter(|i| ids.contains(&i.id))
                .collect();
            for (provider, group) in group_by_provider(selected, options) {
                let group_result = self.sync_group(&provider, group, options).await;
                aggregate.merge(group_result);
            }
            self.mark_synced(&aggregate).await
        }
        .await;
        if let Err(e) = outcome {
            aggregate.global_error = Some(e.to_string());
        }
        aggregate.finish()
    }

    /// Run one provider group. Every integration is scheduled; the semaphore
    /// only bounds how many execute simultaneously.
    pub async fn sync_group(
        &self,
        provider: &str,
        group: Vec<Integration>,
        options: &SyncOptions,
    ) -> MultiProviderSyncResult {
        let mut result = MultiProviderSyncResult::begin();
        let Some(service) = self.services.get(provider) else {
            result.global_error =
                Some(format!("No sync service registered for provider '{provider}'"));
            return result.finish();
        };

        let semaphore = Arc::new(Semaphore::new(options.concurrent_syncs.max(1)));
        let mut meta = Vec::with_capacity(group.len());
        let mut handles = Vec::with_capacity(group.len());
        for integration in group {
            let service = Arc::clone(service);
            let semaphore = Arc::clone(&semaphore);
            let options = options.clone();
            let task_integration = integration.clone();
            meta.push(integration);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("sync semaphore closed");
                sync_one(service.as_ref(), &task_integration, &options).await
            }));
        }

        for (integration, joined) in meta.into_iter().zip(join_all(handles).await) {
            match joined {
                Ok(Ok(())) => result.synced.push(integration),
                Ok(Err(error)) => {
                    tracing::warn!(provider, integration = %integration.id, "sync failed: {error}");
                    result.failed.push(FailedSync { integration, error });
                }
                Err(e) => {
                    let error = format!("Sync task panicked: {e}");
                    result.failed.push(FailedSync { integration, error });
                }
            }
        }
        result.finish()
    }

    async fn mark_synced(&self, aggregate: &MultiProviderSyncResult) -> Result<()> {
        if aggregate.synced.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = aggregate.synced.iter().map(|i| i.id.clone()).collect();
        self.integrations
            .update_last_sync_bulk(&ids, Utc::now())
            .await
    }
}

/// One attempt for one integration: optional connection pre-test, then the
/// provider's sync entry point, all bounded by the configured timeout.
async fn sync_one(
    service: &dyn IntegrationSyncService,
    integration: &Integration,
    options: &SyncOptions,
) -> Result<(), String> {
    let attempt = async {
        if !options.skip_test_connection {
            match service.test_connection(integration).await {
                Ok(true) => {}
                Ok(false) => return Err("Connection failed".to_string()),
                Err(e) => return Err(format!("Connection failed: {e}")),
            }
        }
        let result = service.sync_new_items(integration).await;
        if result.success {
            Ok(())
        } else {
            Err(result.message)
        }
    };

    match options.sync_timeout {
        Some(limit) => match tokio::time::timeout(limit, attempt).await {
            Ok(outcome) => outcome,
            Err(_) => Err(format!("Sync timed out after {limit:?}")),
        },
        None => attempt.await,
    }
}

/// Group integrations by provider tag, ordered so lower-priority numbers run
/// first; ties break on the tag for a deterministic schedule.
fn group_by_provider(
    integrations: Vec<Integration>,
    options: &SyncOptions,
) -> Vec<(String, Vec<Integration>)> {
    let mut groups: HashMap<String, Vec<Integration>> = HashMap::new();
    for integration in integrations {
        groups
            .entry(integration.provider.clone())
            .or_default()
            .push(integration);
    }
    let mut ordered: Vec<(String, Vec<Integration>)> = groups.into_iter().collect();
    ordered.sort_by(|(a, _), (b, _)| {
        options
            .provider_priority(a)
            .cmp(&options.provider_priority(b))
            .then_with(|| a.cmp(b))
    });
    ordered
}
