pub mod azure_devops;
pub mod github;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::model::remote_item::RemoteWorkItem;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("provider API error: {0}")]
    Api(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// One client per provider. Credentials and scope come from the Integration
/// being synced, so a single instance serves every integration of its provider.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Provider tag used for grouping integrations, e.g. "AzureDevOps".
    fn tag(&self) -> &str;

    /// Marker embedded in task linkage, e.g. "DevOps". Kept distinct from the
    /// tag so data imported under the shorter historical marker still matches.
    fn link_tag(&self) -> &str {
        self.tag()
    }

    async fn test_connection(
        &self,
        organization: &str,
        credential: &str,
    ) -> Result<bool, ProviderError>;

    async fn fetch_work_items(
        &self,
        organization: &str,
        credential: &str,
        project: Option<&str>,
    ) -> Result<Vec<RemoteWorkItem>, ProviderError>;

    /// Fetch one item by its remote id. `Ok(None)` means not found, which the
    /// update path treats as a silent skip.
    async fn fetch_work_item_by_id(
        &self,
        organization: &str,
        credential: &str,
        project: Option<&str>,
        remote_id: &str,
    ) -> Result<Option<RemoteWorkItem>, ProviderError>;
}


pub fn create_clients() -> Vec<Arc<dyn ProviderClient>> {
    vec![
        Arc::new(github::GitHubClient::new()),
        Arc::new(azure_devops::AzureDevOpsClient::new()),
    ]
}

pub(crate) fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(ProviderError::Auth(format!("status {status}")))
    } else {
        Err(ProviderError::Api(format!("unexpected status {status}")))
    }
}
