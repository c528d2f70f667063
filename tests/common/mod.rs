//! Shared fixtures for pipeline tests: an in-memory EKS region and a
//! factory handing those regions to the evaluator.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use eks_addons::aws::error::{ApiError, Operation};
use eks_addons::pipeline::{EvalError, EvalSummary, Evaluator, Query, Row, Streamer};
use eks_addons::resource::{Addon, AddonApi, ClientFactory, Cluster, LookupKey, Page};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ACCOUNT: &str = "123456789012";

pub fn api_error(operation: Operation, code: &str, status: u16) -> ApiError {
    ApiError::new(operation, "mock", Some(status), code, format!("{} from mock", code))
}

pub fn not_found(operation: Operation) -> ApiError {
    api_error(operation, "ResourceNotFoundException", 404)
}

/// Detail record the mock returns for an add-on
pub fn addon_detail(region: &str, cluster: &str, addon: &str) -> Addon {
    serde_json::from_value(json!({
        "addonName": addon,
        "clusterName": cluster,
        "status": "ACTIVE",
        "addonVersion": "v1.0.0-eksbuild.1",
        "addonArn": format!("arn:aws:eks:{}:{}:addon/{}/{}/uuid", region, ACCOUNT, cluster, addon),
        "createdAt": 1700000000,
        "tags": {"cluster": cluster}
    }))
    .expect("fixture addon should decode")
}

fn token(index: usize) -> String {
    format!("token-{}", index)
}

fn page_index(token: Option<&str>) -> usize {
    token
        .and_then(|t| t.strip_prefix("token-"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// One fake region
#[derive(Default)]
pub struct MockApi {
    region: String,
    cluster_pages: Vec<Vec<String>>,
    cluster_error: Option<ApiError>,
    addon_pages: HashMap<String, Vec<Vec<String>>>,
    addon_errors: HashMap<String, ApiError>,
    addon_page_errors: HashMap<String, (usize, ApiError)>,
    describe_errors: HashMap<LookupKey, ApiError>,
    describe_delays: HashMap<LookupKey, Duration>,
    pub list_clusters_calls: AtomicUsize,
    pub list_addons_calls: AtomicUsize,
    pub describe_calls: AtomicUsize,
    pub described: Mutex<Vec<LookupKey>>,
}

impl MockApi {
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            ..Self::default()
        }
    }

    /// ListClusters pages
    pub fn with_clusters(mut self, pages: &[&[&str]]) -> Self {
        self.cluster_pages = pages
            .iter()
            .map(|p| p.iter().map(|s| s.to_string()).collect())
            .collect();
        self
    }

    /// ListAddons pages for one cluster
    pub fn with_addons(mut self, cluster: &str, pages: &[&[&str]]) -> Self {
        self.addon_pages.insert(
            cluster.to_string(),
            pages
                .iter()
                .map(|p| p.iter().map(|s| s.to_string()).collect())
                .collect(),
        );
        self
    }

    pub fn fail_clusters(mut self, err: ApiError) -> Self {
        self.cluster_error = Some(err);
        self
    }

    pub fn fail_addons(mut self, cluster: &str, err: ApiError) -> Self {
        self.addon_errors.insert(cluster.to_string(), err);
        self
    }

    /// Fail one ListAddons page of `cluster`, counting from zero
    pub fn fail_addons_page(mut self, cluster: &str, page: usize, err: ApiError) -> Self {
        self.addon_page_errors.insert(cluster.to_string(), (page, err));
        self
    }

    /// Make DescribeAddon for one key take `delay` before answering
    pub fn delay_describe(mut self, cluster: &str, addon: &str, delay: Duration) -> Self {
        self.describe_delays.insert(LookupKey::new(cluster, addon), delay);
        self
    }

    pub fn fail_describe(mut self, cluster: &str, addon: &str, err: ApiError) -> Self {
        self.describe_errors.insert(LookupKey::new(cluster, addon), err);
        self
    }

    pub fn calls(&self) -> (usize, usize, usize) {
        (
            self.list_clusters_calls.load(Ordering::SeqCst),
            self.list_addons_calls.load(Ordering::SeqCst),
            self.describe_calls.load(Ordering::SeqCst),
        )
    }

    fn knows(&self, key: &LookupKey) -> bool {
        self.addon_pages
            .get(&key.cluster_name)
            .map(|pages| pages.iter().flatten().any(|a| *a == key.addon_name))
            .unwrap_or(false)
    }
}

#[async_trait]
impl AddonApi for MockApi {
    fn region(&self) -> &str {
        &self.region
    }

    async fn list_clusters(&self, next_token: Option<&str>) -> Result<Page<Cluster>, ApiError> {
        self.list_clusters_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.cluster_error {
            return Err(err.clone());
        }
        let index = page_index(next_token);
        let items = self
            .cluster_pages
            .get(index)
            .map(|p| p.iter().map(Cluster::new).collect())
            .unwrap_or_default();
        let next_token = (index + 1 < self.cluster_pages.len()).then(|| token(index + 1));
        Ok(Page { items, next_token })
    }

    async fn list_addons(
        &self,
        cluster: &Cluster,
        next_token: Option<&str>,
    ) -> Result<Page<String>, ApiError> {
        self.list_addons_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.addon_errors.get(&cluster.name) {
            return Err(err.clone());
        }
        let Some(pages) = self.addon_pages.get(&cluster.name) else {
            return Err(not_found(Operation::ListAddons));
        };
        let index = page_index(next_token);
        if let Some((page, err)) = self.addon_page_errors.get(&cluster.name) {
            if *page == index {
                return Err(err.clone());
            }
        }
        let items = pages.get(index).cloned().unwrap_or_default();
        let next_token = (index + 1 < pages.len()).then(|| token(index + 1));
        Ok(Page { items, next_token })
    }

    async fn describe_addon(&self, key: &LookupKey) -> Result<Addon, ApiError> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        self.described.lock().unwrap().push(key.clone());
        if let Some(delay) = self.describe_delays.get(key) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(err) = self.describe_errors.get(key) {
            return Err(err.clone());
        }
        if !self.knows(key) {
            return Err(not_found(Operation::DescribeAddon));
        }
        Ok(addon_detail(&self.region, &key.cluster_name, &key.addon_name))
    }
}

/// Hands out the registered mock regions
#[derive(Default, Clone)]
pub struct MockFactory {
    apis: HashMap<String, Arc<MockApi>>,
}

impl MockFactory {
    pub fn new<I: IntoIterator<Item = MockApi>>(apis: I) -> Self {
        Self {
            apis: apis
                .into_iter()
                .map(|api| (api.region().to_string(), Arc::new(api)))
                .collect(),
        }
    }

    pub fn api(&self, region: &str) -> Arc<MockApi> {
        self.apis[region].clone()
    }

    pub fn regions(&self) -> Vec<String> {
        let mut regions: Vec<String> = self.apis.keys().cloned().collect();
        regions.sort();
        regions
    }
}

impl ClientFactory for MockFactory {
    fn client(&self, region: &str) -> Result<Arc<dyn AddonApi>> {
        match self.apis.get(region) {
            Some(api) => Ok(api.clone() as Arc<dyn AddonApi>),
            None => bail!("no mock for region {}", region),
        }
    }
}

/// Run `query` and keep both the outcome and whatever rows were delivered
pub async fn run_query(
    evaluator: &Evaluator,
    query: &Query,
) -> (Result<EvalSummary, EvalError>, Vec<Row>) {
    let (streamer, mut rx) = Streamer::channel(8, query.limit);
    let drain = async {
        let mut rows = Vec::new();
        while let Some(row) = rx.recv().await {
            rows.push(row);
        }
        rows
    };
    tokio::join!(evaluator.run(query, streamer), drain)
}
