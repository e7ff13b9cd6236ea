use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use super::{IntegrationSyncService, SyncResult};
use crate::model::integration::Integration;
use crate::model::task::{Task, TaskPriority, TaskStatus};
use crate::providers::{ProviderClient, ProviderError};
use crate::store::TaskStore;

/// Category stamped on every task the reconciler creates.
const INTEGRATION_CATEGORY: &str = "Integration";

/// Per-provider reconciliation: pulls remote work items and folds them
/// into the local task store.
pub struct SyncReconciler {
    client: Arc<dyn ProviderClient>,
    tasks: Arc<dyn TaskStore>,
}

impl SyncReconciler {
    pub fn new(client: Arc<dyn ProviderClient>, tasks: Arc<dyn TaskStore>) -> Self {
        Self { client, tasks }
    }

    async fn sync_new_items_inner(&self, integration: &Integration) -> Result<SyncResult> {
        let items = self
            .client
            .fetch_work_items(
                &integration.organization,
                &integration.credential,
                integration.project.as_deref(),
            )
            .await?;
        if items.is_empty() {
            return Ok(SyncResult::success("No work items found to sync."));
        }

        let link_tag = self.client.link_tag();
        let existing = self.tasks.get_all().await?;
        let imported: HashSet<String> = existing
            .iter()
            .filter_map(|t| t.external_link(link_tag))
            .collect();

        let mut result = SyncResult::success("");
        for item in items {
            let remote_id = match item.id.trim().parse::<u64>() {
                Ok(n) => n.to_string(),
                Err(_) => {
                    result.errors += 1;
                    result.error_messages.push(format!(
                        "Skipping work item '{}': unparseable id '{}'",
                        item.title, item.id
                    ));
                    continue;
                }
            };
            if item.title.trim().is_empty() {
                result.errors += 1;
                result
                    .error_messages
                    .push(format!("Skipping work item {remote_id}: missing title"));
                continue;
            }
            if imported.contains(&remote_id) {
                result.skipped += 1;
                continue;
            }

            let task = import_task(link_tag, &remote_id, &item.title, item.description.as_deref(), item.item_type.as_deref());
            match self.tasks.add_if_absent(task).await {
                Ok(Some(created)) => {
                    result.created += 1;
                    result
                        .created_items
                        .push(format!("{} ({link_tag}:{remote_id})", created.title));
                }
                // A concurrent sync already created it; the snapshot was stale.
                Ok(None) => result.skipped += 1,
                Err(e) => {
                    result.errors += 1;
                    result
                        .error_messages
                        .push(format!("Failed to store work item {remote_id}: {e}"));
                }
            }
        }

        result.message = format!(
            "Sync completed: {} created, {} skipped, {} errors.",
            result.created, result.skipped, result.errors
        );
        Ok(result)
    }

    async fn update_existing_inner(&self, integration: &Integration) -> Result<SyncResult> {
        let link_tag = self.client.link_tag();
        let linked: Vec<(Task, String)> = self
            .tasks
            .get_all()
            .await?
            .into_iter()
            .filter_map(|t| t.external_link(link_tag).map(|id| (t, id)))
            .collect();
        if linked.is_empty() {
            return Ok(SyncResult::success(
                "No provider-synced tasks found to update.",
            ));
        }
        if !integration.active {
            return Ok(SyncResult::failure("No active integration found."));
        }

        let mut result = SyncResult::success("");
        for (mut task, remote_id) in linked {
            let fetched = self
                .client
                .fetch_work_item_by_id(
                    &integration.organization,
                    &integration.credential,
                    integration.project.as_deref(),
                    &remote_id,
                )
                .await;
            // Gone remotely or unreachable: leave the local task untouched.
            let item = match fetched {
                Ok(Some(item)) => item,
                Ok(None) | Err(_) => continue,
            };

            let mapped = map_remote_state(&item.state);
            if mapped == task.status {
                result.skipped += 1;
                continue;
            }
            let from = task.status;
            task.status = mapped;
            task.updated_at = Utc::now();
            match self.tasks.update(&task).await {
                Ok(()) => {
                    result.updated += 1;
                    result
                        .updated_items
                        .push(format!("{}: {from} -> {mapped}", task.title));
                }
                Err(e) => {
                    result.errors += 1;
                    result
                        .error_messages
                        .push(format!("Failed to update task {}: {e}", task.id));
                }
            }
        }

        result.message = format!(
            "Update completed: {} updated, {} skipped, {} errors.",
            result.updated, result.skipped, result.errors
        );
        Ok(result)
    }
}

#[async_trait]
impl IntegrationSyncService for SyncReconciler {
    fn provider_tag(&self) -> &str {
        self.client.tag()
    }

    async fn test_connection(&self, integration: &Integration) -> Result<bool, ProviderError> {
        self.client
            .test_connection(&integration.organization, &integration.credential)
            .await
    }

    async fn sync_new_items(&self, integration: &Integration) -> SyncResult {
        match self.sync_new_items_inner(integration).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(provider = self.client.tag(), integration = %integration.id, "sync failed: {e}");
                SyncResult::failure(e.to_string())
            }
        }
    }

    async fn update_existing_from_remote(&self, integration: &Integration) -> SyncResult {
        match self.update_existing_inner(integration).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(provider = self.client.tag(), integration = %integration.id, "update failed: {e}");
                SyncResult::failure(e.to_string())
            }
        }
    }
}

fn import_task(
    link_tag: &str,
    remote_id: &str,
    title: &str,
    body: Option<&str>,
    item_type: Option<&str>,
) -> Task {
    let description = match body {
        Some(body) if !body.trim().is_empty() => {
            let body: String = body.chars().take(500).collect();
            format!("{link_tag} work item #{remote_id}\n\n{body}")
        }
        _ => format!("{link_tag} work item #{remote_id}"),
    };
    let (priority, estimated_minutes) = infer_priority(item_type);

    let mut task = Task::new(format!("[{link_tag}] {title}"));
    task.description = Some(description);
    task.priority = priority;
    task.category = Some(INTEGRATION_CATEGORY.to_string());
    task.external_provider = Some(link_tag.to_string());
    task.external_id = Some(remote_id.to_string());
    task.estimated_minutes = Some(estimated_minutes);
    task
}

/// Priority and time estimate inferred from the remote item type.
pub fn infer_priority(item_type: Option<&str>) -> (TaskPriority, u32) {
    let kind = item_type.unwrap_or("").to_lowercase();
    if kind.contains("bug") {
        (TaskPriority::High, 120)
    } else if kind.contains("user story") {
        (TaskPriority::Medium, 480)
    } else if kind.contains("task") {
        (TaskPriority::Medium, 240)
    } else if kind.contains("feature") {
        (TaskPriority::Low, 960)
    } else {
        (TaskPriority::Medium, 240)
    }
}

/// Remote state to local status. Unknown states land on Pending.
pub fn map_remote_state(state: &str) -> TaskStatus {
    match state.to_lowercase().as_str() {
        "new" => TaskStatus::Pending,
        "active" => TaskStatus::InProgress,
        "resolved" => TaskStatus::InProgress,
        "closed" | "done" => TaskStatus::Completed,
        _ => TaskStatus::Pending,
    }
}
