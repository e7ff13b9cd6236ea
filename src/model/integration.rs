use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A stored connection to one external provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    pub id: String,
    /// Provider tag, e.g. "GitHub" or "AzureDevOps".
    pub provider: String,
    /// Owner name or organization URL, depending on the provider.
    pub organization: String,
    pub credential: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl Integration {
    pub fn new(
        provider: impl Into<String>,
        organization: impl Into<String>,
        credential: impl Into<String>,
        project: Option<String>,
    ) -> Self {
        Self {
            id: String::new(),
            provider: provider.into(),
            organization: organization.into(),
            credential: credential.into(),
            project,
            active: true,
            created_at: Utc::now(),
            last_sync_at: None,
        }
    }

    /// Whether this integration is stale enough to sync. Never-synced
    /// integrations are always due.
    pub fn is_due(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        match self.last_sync_at {
            None => true,
            Some(last) => now - last > max_age,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_synced_is_due() {
        let integration = Integration::new("GitHub", "octocat", "token", None);
        assert!(integration.is_due(Duration::hours(1), Utc::now()));
    }

    #[test]
    fn recently_synced_is_not_due() {
        let now = Utc::now();
        let mut integration = Integration::new("GitHub", "octocat", "token", None);
        integration.last_sync_at = Some(now - Duration::minutes(30));
        assert!(!integration.is_due(Duration::hours(1), now));
    }

    #[test]
    fn stale_sync_is_due() {
        let now = Utc::now();
        let mut integration = Integration::new("GitHub", "octocat", "token", None);
        integration.last_sync_at = Some(now - Duration::hours(2));
        assert!(integration.is_due(Duration::hours(1), now));
    }
}
