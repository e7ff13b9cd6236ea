use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{check_status, ProviderClient, ProviderError};
use crate::model::remote_item::RemoteWorkItem;

const API_VERSION: &str = "7.1";
const MAX_BATCH: usize = 200;

pub struct AzureDevOpsClient {
    client: reqwest::Client,
}

impl AzureDevOpsClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for AzureDevOpsClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Accepts either a bare organization name or a full organization URL.
fn base_url(organization: &str) -> String {
    if organization.starts_with("http") {
        organization.trim_end_matches('/').to_string()
    } else {
        format!("https://dev.azure.com/{organization}")
    }
}

fn auth_header(credential: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!(":{credential}"));
    format!("Basic {encoded}")
}

#[derive(Deserialize)]
struct WiqlResponse {
    #[serde(rename = "workItems", default)]
    work_items: Vec<WiqlRef>,
}

#[derive(Deserialize)]
struct WiqlRef {
    id: u64,
}

#[derive(Deserialize)]
struct BatchResponse {
    #[serde(default)]
    value: Vec<AdoWorkItem>,
}

#[derive(Deserialize)]
struct AdoWorkItem {
    id: u64,
    fields: AdoFields,
    url: Option<String>,
}

#[derive(Deserialize)]
struct AdoFields {
    #[serde(rename = "System.Title")]
    title: Option<String>,
    #[serde(rename = "System.State")]
    state: Option<String>,
    #[serde(rename = "System.WorkItemType")]
    work_item_type: Option<String>,
    #[serde(rename = "System.Description")]
    description: Option<String>,
}

fn to_remote_item(item: AdoWorkItem) -> RemoteWorkItem {
    RemoteWorkItem {
        id: item.id.to_string(),
        title: item.fields.title.unwrap_or_default(),
        state: item.fields.state.unwrap_or_default(),
        description: item
            .fields
            .description
            .filter(|d| !d.trim().is_empty())
            .map(|d| d.chars().take(500).collect()),
        item_type: item.fields.work_item_type,
        url: item.url,
    }
}

#[async_trait]
impl ProviderClient for AzureDevOpsClient {
    fn tag(&self) -> &str {
        "AzureDevOps"
    }

    fn link_tag(&self) -> &str {
        "DevOps"
    }

    async fn test_connection(
        &self,
        organization: &str,
        credential: &str,
    ) -> Result<bool, ProviderError> {
        let url = format!(
            "{}/_apis/projects?$top=1&api-version={API_VERSION}",
            base_url(organization)
        );
        let resp = self
            .client
            .get(&url)
            .header("Authorization", auth_header(credential))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    async fn fetch_work_items(
        &self,
        organization: &str,
        credential: &str,
        project: Option<&str>,
    ) -> Result<Vec<RemoteWorkItem>, ProviderError> {
        let base = base_url(organization);
        let auth = auth_header(credential);

        let wiql_url = match project {
            Some(project) => format!(
                "{base}/{}/_apis/wit/wiql?api-version={API_VERSION}",
                urlencoding::encode(project)
            ),
            None => format!("{base}/_apis/wit/wiql?api-version={API_VERSION}"),
        };
        let query = serde_json::json!({
            "query": "Select [System.Id] From WorkItems \
                      Where [System.State] <> 'Removed' \
                      Order By [System.ChangedDate] Desc"
        });
        let resp = self
            .client
            .post(&wiql_url)
            .header("Authorization", &auth)
            .json(&query)
            .send()
            .await?;
        let wiql: WiqlResponse = check_status(resp)?.json().await?;
        if wiql.work_items.is_empty() {
            return Ok(Vec::new());
        }

        let ids = wiql
            .work_items
            .iter()
            .take(MAX_BATCH)
            .map(|r| r.id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let items_url = format!(
            "{base}/_apis/wit/workitems?ids={ids}\
             &fields=System.Title,System.State,System.WorkItemType,System.Description\
             &api-version={API_VERSION}"
        );
        let resp = self
            .client
            .get(&items_url)
            .header("Authorization", &auth)
            .send()
            .await?;
        let batch: BatchResponse = check_status(resp)?.json().await?;

        Ok(batch.value.into_iter().map(to_remote_item).collect())
    }

    async fn fetch_work_item_by_id(
        &self,
        organization: &str,
        credential: &str,
        _project: Option<&str>,
        remote_id: &str,
    ) -> Result<Option<RemoteWorkItem>, ProviderError> {
        let url = format!(
            "{}/_apis/wit/workitems/{remote_id}?api-version={API_VERSION}",
            base_url(organization)
        );
        let resp = self
            .client
            .get(&url)
            .header("Authorization", auth_header(credential))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let item: AdoWorkItem = check_status(resp)?.json().await?;
        Ok(Some(to_remote_item(item)))
    }
}
