//! Remote operations
//!
//! [`AddonApi`] is the seam between the evaluation driver and the EKS REST
//! API. [`EksClient`] implements it over HTTP; tests substitute in-memory
//! fakes.

use super::model::{
    Addon, Cluster, DescribeAddonResponse, ListAddonsPage, ListClustersPage, LookupKey,
};
use crate::aws::client::EksClient;
use crate::aws::error::{ApiError, Operation};
use crate::aws::http::AwsHttpClient;
use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Result of one page fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

/// The three remote calls the add-on table is built from
#[async_trait]
pub trait AddonApi: Send + Sync {
    /// Region this client talks to
    fn region(&self) -> &str;

    /// One page of ListClusters
    async fn list_clusters(&self, next_token: Option<&str>) -> Result<Page<Cluster>, ApiError>;

    /// One page of ListAddons for `cluster`
    async fn list_addons(
        &self,
        cluster: &Cluster,
        next_token: Option<&str>,
    ) -> Result<Page<String>, ApiError>;

    /// DescribeAddon for a single add-on
    async fn describe_addon(&self, key: &LookupKey) -> Result<Addon, ApiError>;
}

/// Builds the client for a region
pub trait ClientFactory: Send + Sync {
    fn client(&self, region: &str) -> Result<Arc<dyn AddonApi>>;
}

fn decode<T: DeserializeOwned>(value: Value, operation: Operation, target: &str) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| {
        ApiError::new(
            operation,
            target,
            None,
            "MalformedResponse",
            format!("Failed to decode response: {}", e),
        )
    })
}

#[async_trait]
impl AddonApi for EksClient {
    fn region(&self) -> &str {
        EksClient::region(self)
    }

    async fn list_clusters(&self, next_token: Option<&str>) -> Result<Page<Cluster>, ApiError> {
        let target = self.target("clusters");
        let url = self.clusters_url(next_token);
        let response = self.get(&url, Operation::ListClusters, &target).await?;
        let page: ListClustersPage = decode(response, Operation::ListClusters, &target)?;

        Ok(Page {
            items: page.clusters.into_iter().map(Cluster::new).collect(),
            next_token: page.next_token,
        })
    }

    async fn list_addons(
        &self,
        cluster: &Cluster,
        next_token: Option<&str>,
    ) -> Result<Page<String>, ApiError> {
        let target = self.target(&format!("clusters/{}/addons", cluster.name));
        let url = self.addons_url(&cluster.name, next_token);
        let response = self.get(&url, Operation::ListAddons, &target).await?;
        let page: ListAddonsPage = decode(response, Operation::ListAddons, &target)?;

        Ok(Page {
            items: page.addons,
            next_token: page.next_token,
        })
    }

    async fn describe_addon(&self, key: &LookupKey) -> Result<Addon, ApiError> {
        let target = self.target(&key.path());
        let url = self.addon_url(&key.cluster_name, &key.addon_name);
        let response = self.get(&url, Operation::DescribeAddon, &target).await?;
        let described: DescribeAddonResponse = decode(response, Operation::DescribeAddon, &target)?;
        Ok(described.addon)
    }
}

/// Creates [`EksClient`]s sharing one HTTP connection pool
#[derive(Clone)]
pub struct EksClientFactory {
    http: AwsHttpClient,
    endpoint: Option<String>,
}

impl EksClientFactory {
    pub fn new(endpoint: Option<String>) -> Result<Self> {
        Ok(Self {
            http: AwsHttpClient::new()?,
            endpoint,
        })
    }
}

impl ClientFactory for EksClientFactory {
    fn client(&self, region: &str) -> Result<Arc<dyn AddonApi>> {
        let client = EksClient::with_http(self.http.clone(), region, self.endpoint.as_deref())?;
        Ok(Arc::new(client))
    }
}
