use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{check_status, ProviderClient, ProviderError};
use crate::model::remote_item::RemoteWorkItem;

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "tasksmith";

pub struct GitHubClient {
    client: reqwest::Client,
}

impl GitHubClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn get(&self, url: &str, credential: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("Authorization", format!("Bearer {credential}"))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
    }
}

impl Default for GitHubClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct GhIssue {
    number: u64,
    title: String,
    body: Option<String>,
    state: Option<String>,
    #[serde(default)]
    labels: Vec<GhLabel>,
    html_url: Option<String>,
    /// Present when the record is actually a pull request.
    pull_request: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct GhLabel {
    name: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<GhIssue>,
}

fn issue_to_item(issue: GhIssue) -> RemoteWorkItem {
    let description = issue
        .body
        .filter(|b| !b.trim().is_empty())
        .map(|b| b.chars().take(500).collect::<String>());
    let item_type = issue.labels.first().map(|l| l.name.clone());
    RemoteWorkItem {
        id: issue.number.to_string(),
        title: issue.title,
        state: issue.state.unwrap_or_default(),
        description,
        item_type,
        url: issue.html_url,
    }
}

#[async_trait]
impl ProviderClient for GitHubClient {
    fn tag(&self) -> &str {
        "GitHub"
    }

    async fn test_connection(
        &self,
        _organization: &str,
        credential: &str,
    ) -> Result<bool, ProviderError> {
        let resp = self.get(&format!("{API_BASE}/user"), credential).send().await?;
        Ok(resp.status().is_success())
    }

    async fn fetch_work_items(
        &self,
        organization: &str,
        credential: &str,
        project: Option<&str>,
    ) -> Result<Vec<RemoteWorkItem>, ProviderError> {
        let issues = match project {
            Some(repo) => {
                let url = format!(
                    "{API_BASE}/repos/{organization}/{repo}/issues?state=open&per_page=50"
                );
                let resp = self.get(&url, credential).send().await?;
                check_status(resp)?.json::<Vec<GhIssue>>().await?
            }
            None => {
                let query = format!("user:{organization} is:issue is:open");
                let url = format!(
                    "{API_BASE}/search/issues?q={}&per_page=50",
                    urlencoding::encode(&query)
                );
                let resp = self.get(&url, credential).send().await?;
                check_status(resp)?.json::<SearchResponse>().await?.items
            }
        };

        Ok(issues
            .into_iter()
            .filter(|issue| issue.pull_request.is_none())
            .map(issue_to_item)
            .collect())
    }

    async fn fetch_work_item_by_id(
        &self,
        organization: &str,
        credential: &str,
        project: Option<&str>,
        remote_id: &str,
    ) -> Result<Option<RemoteWorkItem>, ProviderError> {
        // Issue numbers are repo-scoped; an owner-wide integration has no
        // single-issue endpoint to hit, so those tasks are left untouched.
        let Some(repo) = project else {
            return Ok(None);
        };
        let url = format!("{API_BASE}/repos/{organization}/{repo}/issues/{remote_id}");
        let resp = self.get(&url, credential).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let issue: GhIssue = check_status(resp)?.json().await?;
        Ok(Some(issue_to_item(issue)))
    }
}
