use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    OnHold,
    Completed,
    Cancelled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "Pending"),
            TaskStatus::InProgress => write!(f, "In Progress"),
            TaskStatus::OnHold => write!(f, "On Hold"),
            TaskStatus::Completed => write!(f, "Completed"),
            TaskStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "Low"),
            TaskPriority::Medium => write!(f, "Medium"),
            TaskPriority::High => write!(f, "High"),
            TaskPriority::Critical => write!(f, "Critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Link marker of the provider this task was imported from (e.g. "DevOps").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u32>,
    #[serde(default)]
    pub actual_minutes: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            title: title.into(),
            description: None,
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            category: None,
            tags: Vec::new(),
            external_provider: None,
            external_id: None,
            due_date: None,
            estimated_minutes: None,
            actual_minutes: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Remote id this task is linked to under the given provider marker, if any.
    ///
    /// Prefers the structured `external_provider`/`external_id` fields; also reads
    /// the legacy `"<Marker>:<id>"` tag encoding carried by data imported before
    /// the structured fields existed.
    pub fn external_link(&self, link_tag: &str) -> Option<String> {
        if self.external_provider.as_deref() == Some(link_tag) {
            if let Some(id) = &self.external_id {
                return Some(id.clone());
            }
        }
        legacy_link_id(&self.tags, link_tag)
    }
}

/// Parse the legacy `"<Marker>:<id>"` tag form. The suffix must be numeric;
/// tags without a parseable suffix are ignored.
pub fn legacy_link_id(tags: &[String], link_tag: &str) -> Option<String> {
    let prefix = format!("{link_tag}:");
    tags.iter().find_map(|tag| {
        let rest = tag.trim().strip_prefix(&prefix)?;
        rest.trim().parse::<u64>().ok().map(|n| n.to_string())
    })
}
