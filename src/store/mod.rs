pub mod json;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::model::integration::Integration;
use crate::model::task::Task;

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get_all(&self) -> Result<Vec<Task>>;

    /// Case-insensitive substring match on the title.
    async fn find_by_title(&self, needle: &str) -> Result<Vec<Task>>;

    async fn add(&self, task: Task) -> Result<Task>;

    /// Insert unless a task with the same `(external_provider, external_id)`
    /// already exists; returns `None` when it does. Makes remote-item import
    /// idempotent even when two syncs race on the same snapshot.
    async fn add_if_absent(&self, task: Task) -> Result<Option<Task>>;

    async fn update(&self, task: &Task) -> Result<()>;
}

#[async_trait]
pub trait IntegrationStore: Send + Sync {
    async fn add(&self, integration: Integration) -> Result<Integration>;

    async fn get_all(&self) -> Result<Vec<Integration>>;

    async fn get_all_active(&self) -> Result<Vec<Integration>>;

    async fn get_active_by_provider(&self, provider: &str) -> Result<Vec<Integration>>;

    /// Active integrations never synced, or last synced more than `max_age` ago.
    async fn get_due_for_sync(&self, max_age: Duration) -> Result<Vec<Integration>>;

    async fn update_last_sync_bulk(&self, ids: &[String], at: DateTime<Utc>) -> Result<()>;

    async fn set_active(&self, id: &str, active: bool) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;
}
