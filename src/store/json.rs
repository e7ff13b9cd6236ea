use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{IntegrationStore, TaskStore};
use crate::model::integration::Integration;
use crate::model::task::Task;

#[derive(Debug, Default, Serialize, Deserialize)]
struct TaskData {
    next_id: u64,
    tasks: Vec<Task>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IntegrationData {
    next_id: u64,
    integrations: Vec<Integration>,
}

fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(serde_json::from_str(&contents).unwrap_or_default())
}

fn save<T: Serialize>(data: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub struct JsonTaskStore {
    path: PathBuf,
    state: Mutex<TaskData>,
}

impl JsonTaskStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        let data = load_or_default(&path)?;
        Ok(Self {
            path,
            state: Mutex::new(data),
        })
    }
}

#[async_trait]
impl TaskStore for JsonTaskStore {
    async fn get_all(&self) -> Result<Vec<Task>> {
        Ok(self.state.lock().await.tasks.clone())
    }

    async fn find_by_title(&self, needle: &str) -> Result<Vec<Task>> {
        let needle = needle.to_lowercase();
        let state = self.state.lock().await;
        Ok(state
            .tasks
            .iter()
            .filter(|t| t.title.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn add(&self, mut task: Task) -> Result<Task> {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        if task.id.is_empty() {
            task.id = format!("T-{}", state.next_id);
        }
        state.tasks.push(task.clone());
        save(&*state, &self.path)?;
        Ok(task)
    }

    async fn add_if_absent(&self, mut task: Task) -> Result<Option<Task>> {
        let mut state = self.state.lock().await;
        if let (Some(provider), Some(external_id)) = (&task.external_provider, &task.external_id) {
            let taken = state.tasks.iter().any(|t| {
                t.external_provider.as_ref() == Some(provider)
                    && t.external_id.as_ref() == Some(external_id)
            });
            if taken {
                return Ok(None);
            }
        }
        state.next_id += 1;
        if task.id.is_empty() {
            task.id = format!("T-{}", state.next_id);
        }
        state.tasks.push(task.clone());
        save(&*state, &self.path)?;
        Ok(Some(task))
    }

    async fn update(&self, task: &Task) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(slot) = state.tasks.iter_mut().find(|t| t.id == task.id) else {
            bail!("No task with id {}", task.id);
        };
        *slot = task.clone();
        save(&*state, &self.path)?;
        Ok(())
    }
}

pub struct JsonIntegrationStore {
    path: PathBuf,
    state: Mutex<IntegrationData>,
}

impl JsonIntegrationStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        let data = load_or_default(&path)?;
        Ok(Self {
            path,
            state: Mutex::new(data),
        })
    }
}

#[async_trait]
impl IntegrationStore for JsonIntegrationStore {
    async fn add(&self, mut integration: Integration) -> Result<Integration> {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        if integration.id.is_empty() {
            integration.id = format!("I-{}", state.next_id);
        }
        state.integrations.push(integration.clone());
        save(&*state, &self.path)?;
        Ok(integration)
    }

    async fn get_all(&self) -> Result<Vec<Integration>> {
        Ok(self.state.lock().await.integrations.clone())
    }

    async fn get_all_active(&self) -> Result<Vec<Integration>> {
        let state = self.state.lock().await;
        Ok(state
            .integrations
            .iter()
            .filter(|i| i.active)
            .cloned()
            .collect())
    }

    async fn get_active_by_provider(&self, provider: &str) -> Result<Vec<Integration>> {
        let state = self.state.lock().await;
        Ok(state
            .integrations
            .iter()
            .filter(|i| i.active && i.provider == provider)
            .cloned()
            .collect())
    }

    async fn get_due_for_sync(&self, max_age: Duration) -> Result<Vec<Integration>> {
        let now = Utc::now();
        let state = self.state.lock().await;
        Ok(state
            .integrations
            .iter()
            .filter(|i| i.active && i.is_due(max_age, now))
            .cloned()
            .collect())
    }

    async fn update_last_sync_bulk(&self, ids: &[String], at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.lock().await;
        for integration in state.integrations.iter_mut() {
            if ids.contains(&integration.id) {
                integration.last_sync_at = Some(at);
            }
        }
        save(&*state, &self.path)?;
        Ok(())
    }

    async fn set_active(&self, id: &str, active: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(integration) = state.integrations.iter_mut().find(|i| i.id == id) else {
            bail!("No integration with id {id}");
        };
        integration.active = active;
        save(&*state, &self.path)?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let before = state.integrations.len();
        state.integrations.retain(|i| i.id != id);
        if state.integrations.len() == before {
            bail!("No integration with id {id}");
        }
        save(&*state, &self.path)?;
        Ok(())
    }
}
