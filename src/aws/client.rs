//! EKS Client
//!
//! One client per region, combining the shared HTTP client with the
//! region's endpoint.

use super::error::{ApiError, Operation};
use super::http::AwsHttpClient;
use anyhow::{Context, Result};
use serde_json::Value;
use url::Url;

/// Endpoint template used when none is configured
pub const DEFAULT_ENDPOINT: &str = "https://eks.{region}.amazonaws.com";

/// Page size requested from list calls (API maximum is 100)
pub const MAX_RESULTS: u32 = 100;

/// EKS client bound to a single region
#[derive(Clone)]
pub struct EksClient {
    pub http: AwsHttpClient,
    region: String,
    base_url: String,
}

impl EksClient {
    /// Create a new EKS client for `region`.
    ///
    /// `endpoint` is a URL template where `{region}` is substituted; it
    /// defaults to the public regional endpoint.
    pub fn new(region: &str, endpoint: Option<&str>) -> Result<Self> {
        let http = AwsHttpClient::new()?;
        Self::with_http(http, region, endpoint)
    }

    /// Create a client reusing an existing HTTP client
    pub fn with_http(http: AwsHttpClient, region: &str, endpoint: Option<&str>) -> Result<Self> {
        let template = endpoint.unwrap_or(DEFAULT_ENDPOINT);
        let base_url = template.replace("{region}", region);
        Url::parse(&base_url).with_context(|| format!("Invalid EKS endpoint: {}", base_url))?;

        Ok(Self {
            http,
            region: region.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a GET request against this region's endpoint
    pub async fn get(&self, url: &str, operation: Operation, target: &str) -> Result<Value, ApiError> {
        self.http.get(url, operation, target).await
    }

    /// Human-readable call target, used in error messages
    pub fn target(&self, path: &str) -> String {
        format!("{} {}", self.region, path)
    }

    // =========================================================================
    // EKS API helpers
    // =========================================================================

    /// Build the ListClusters URL
    pub fn clusters_url(&self, next_token: Option<&str>) -> String {
        with_page_query(format!("{}/clusters", self.base_url), next_token)
    }

    /// Build the ListAddons URL for a cluster
    pub fn addons_url(&self, cluster: &str, next_token: Option<&str>) -> String {
        with_page_query(
            format!(
                "{}/clusters/{}/addons",
                self.base_url,
                urlencoding::encode(cluster)
            ),
            next_token,
        )
    }

    /// Build the DescribeAddon URL
    pub fn addon_url(&self, cluster: &str, addon: &str) -> String {
        format!(
            "{}/clusters/{}/addons/{}",
            self.base_url,
            urlencoding::encode(cluster),
            urlencoding::encode(addon)
        )
    }
}

fn with_page_query(url: String, next_token: Option<&str>) -> String {
    match next_token {
        Some(token) => format!(
            "{}?maxResults={}&nextToken={}",
            url,
            MAX_RESULTS,
            urlencoding::encode(token)
        ),
        None => format!("{}?maxResults={}", url, MAX_RESULTS),
    }
}
