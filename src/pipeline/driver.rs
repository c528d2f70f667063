//! Evaluation driver
//!
//! Runs one [`Query`] end to end:
//!
//! 1. resolve the regions and build one client per region;
//! 2. turn every region into a stream of work items: one listing unit per
//!    cluster, or one direct describe per lookup key when both key columns
//!    are constrained;
//! 3. run the work items concurrently up to a fixed ceiling;
//! 4. inside a listing unit, page through ListAddons and, if the query
//!    selects any detail column, describe each add-on once, keeping page
//!    order;
//! 5. hand every row to the [`Streamer`].
//!
//! Failure scopes: a failed listing only ends that cluster (or that region's
//! cluster enumeration) and is reported once everything else has finished.
//! Authorization failures and any describe error that is not a suppressed
//! not-found end the whole evaluation at once.

use super::policy::CallPolicy;
use super::query::Query;
use super::row::Row;
use super::streamer::{Streamer, DEFAULT_CAPACITY};
use crate::aws::error::ApiError;
use crate::aws::regions::RegionMatrix;
use crate::config::Config;
use crate::resource::{AddonApi, ClientFactory, Cluster, Hydrator, IgnoreErrors, Lister, LookupKey};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Maximum (region × cluster) units in flight
pub const DEFAULT_MAX_CONCURRENCY: usize = 15;

/// Maximum describe calls in flight inside one unit
pub const DEFAULT_HYDRATE_CONCURRENCY: usize = 5;

/// Error that ends an evaluation
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("failed to create EKS client for {region}: {message}")]
    Client { region: String, message: String },
}

impl EvalError {
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            EvalError::Api(err) => Some(err),
            EvalError::Client { .. } => None,
        }
    }
}

/// What happened during an evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalSummary {
    pub regions: usize,
    pub units: usize,
    pub rows: usize,
    /// Add-ons that disappeared between listing and describe
    pub suppressed: usize,
    pub cancelled: bool,
}

#[derive(Default)]
struct Counters {
    units: AtomicUsize,
    suppressed: AtomicUsize,
}

enum Work<'a> {
    Listing {
        api: &'a dyn AddonApi,
        cluster: Cluster,
        /// Cluster came from the caller's qualifiers, not from ListClusters
        pushed_down: bool,
    },
    Direct {
        api: &'a dyn AddonApi,
        key: LookupKey,
    },
    EnumerationFailed(ApiError),
}

enum Abort {
    /// Ends one unit; reported after the rest of the evaluation completes
    Deferred(ApiError),
    /// Ends the evaluation now
    Fatal(EvalError),
}

enum Step {
    List(ApiError),
    Hydrate(ApiError),
}

/// Runs queries against a set of regions
pub struct Evaluator {
    factory: Arc<dyn ClientFactory>,
    matrix: RegionMatrix,
    policy: CallPolicy,
    ignore: IgnoreErrors,
    max_concurrency: usize,
    hydrate_concurrency: usize,
}

impl Evaluator {
    pub fn new(factory: Arc<dyn ClientFactory>, matrix: RegionMatrix) -> Self {
        Self {
            factory,
            matrix,
            policy: CallPolicy::default(),
            ignore: IgnoreErrors::default(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            hydrate_concurrency: DEFAULT_HYDRATE_CONCURRENCY,
        }
    }

    /// Evaluator configured from persisted settings
    pub fn from_config(factory: Arc<dyn ClientFactory>, config: &Config) -> Self {
        Self::new(factory, RegionMatrix::new(config.effective_regions()))
            .with_policy(config.call_policy())
            .with_ignore(IgnoreErrors::new(config.effective_ignore_codes()))
            .with_concurrency(config.max_concurrency, config.hydrate_concurrency)
    }

    pub fn with_matrix(mut self, matrix: RegionMatrix) -> Self {
        self.matrix = matrix;
        self
    }

    pub fn with_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_ignore(mut self, ignore: IgnoreErrors) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_concurrency(mut self, units: usize, hydrate: usize) -> Self {
        self.max_concurrency = units.max(1);
        self.hydrate_concurrency = hydrate.max(1);
        self
    }

    pub fn matrix(&self) -> &RegionMatrix {
        &self.matrix
    }

    /// Run `query`, delivering rows through `streamer`.
    ///
    /// Returns once every unit has finished, the evaluation failed, or the
    /// streamer was cancelled. Rows already delivered stay delivered.
    pub async fn run(&self, query: &Query, streamer: Streamer) -> Result<EvalSummary, EvalError> {
        let regions = self.matrix.resolve(&query.regions);
        let mut summary = EvalSummary {
            regions: regions.len(),
            ..EvalSummary::default()
        };

        if regions.is_empty() {
            info!(constraint = ?query.regions, "No configured region matches the query");
            return Ok(summary);
        }

        if streamer.is_cancelled() {
            summary.cancelled = true;
            return Ok(summary);
        }

        let mut clients = Vec::with_capacity(regions.len());
        for region in &regions {
            let client = self.factory.client(region).map_err(|e| EvalError::Client {
                region: region.clone(),
                message: format!("{:#}", e),
            })?;
            clients.push(client);
        }

        info!(
            regions = regions.len(),
            direct = query.direct_keys().is_some(),
            hydrate = query.needs_hydration(),
            "Starting evaluation"
        );

        let start = Instant::now();
        let counters = Counters::default();
        let outcome = tokio::select! {
            biased;
            result = self.evaluate(&clients, query, &streamer, &counters) => result,
            _ = streamer.cancelled() => {
                debug!("Evaluation cancelled, dropping in-flight calls");
                Ok(())
            }
        };

        summary.units = counters.units.load(Ordering::SeqCst);
        summary.suppressed = counters.suppressed.load(Ordering::SeqCst);
        summary.rows = streamer.sent();
        summary.cancelled = streamer.is_cancelled();

        info!(
            regions = summary.regions,
            units = summary.units,
            rows = summary.rows,
            suppressed = summary.suppressed,
            cancelled = summary.cancelled,
            failed = outcome.is_err(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Evaluation finished"
        );

        outcome.map(|()| summary)
    }

    /// Run `query` and collect its rows, honoring `query.limit`
    pub async fn collect(&self, query: &Query) -> Result<Vec<Row>, EvalError> {
        let (streamer, mut rx) = Streamer::channel(DEFAULT_CAPACITY, query.limit);
        let drain = async {
            let mut rows = Vec::new();
            while let Some(row) = rx.recv().await {
                rows.push(row);
            }
            rows
        };
        let (result, rows) = tokio::join!(self.run(query, streamer), drain);
        result.map(|_| rows)
    }

    async fn evaluate(
        &self,
        clients: &[Arc<dyn AddonApi>],
        query: &Query,
        streamer: &Streamer,
        counters: &Counters,
    ) -> Result<(), EvalError> {
        let direct = query.direct_keys();
        let region_work: Vec<BoxStream<'_, Work<'_>>> = clients
            .iter()
            .map(|api| self.region_work(api.as_ref(), query, direct.as_deref()))
            .collect();

        let outcomes = stream::select_all(region_work)
            .take_while(|_| future::ready(!streamer.is_cancelled()))
            .map(|work| self.run_work(work, query, streamer, counters))
            .buffer_unordered(self.max_concurrency);
        futures::pin_mut!(outcomes);

        let mut deferred: Option<ApiError> = None;
        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Ok(()) => {}
                Err(Abort::Deferred(err)) => {
                    warn!(error = %err, "Listing failed, continuing with remaining units");
                    deferred.get_or_insert(err);
                }
                Err(Abort::Fatal(err)) => {
                    error!(error = %err, "Aborting evaluation");
                    return Err(err);
                }
            }
        }

        match deferred {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Work items for one region
    fn region_work<'a>(
        &'a self,
        api: &'a dyn AddonApi,
        query: &'a Query,
        direct: Option<&[LookupKey]>,
    ) -> BoxStream<'a, Work<'a>> {
        if let Some(keys) = direct {
            let items: Vec<Work<'a>> = keys
                .iter()
                .cloned()
                .map(|key| Work::Direct { api, key })
                .collect();
            return stream::iter(items).boxed();
        }

        if !query.quals.cluster_names.is_empty() {
            let items: Vec<Work<'a>> = query
                .quals
                .cluster_names
                .iter()
                .map(|name| Work::Listing {
                    api,
                    cluster: Cluster::new(name.as_str()),
                    pushed_down: true,
                })
                .collect();
            return stream::iter(items).boxed();
        }

        Lister::new(api, &self.policy)
            .clusters()
            .map(move |item| match item {
                Ok(cluster) => Work::Listing {
                    api,
                    cluster,
                    pushed_down: false,
                },
                Err(err) => Work::EnumerationFailed(err),
            })
            .boxed()
    }

    async fn run_work(
        &self,
        work: Work<'_>,
        query: &Query,
        streamer: &Streamer,
        counters: &Counters,
    ) -> Result<(), Abort> {
        match work {
            Work::EnumerationFailed(err) => self.listing_failed(err, false),
            Work::Direct { api, key } => {
                counters.units.fetch_add(1, Ordering::SeqCst);
                if streamer.is_cancelled() {
                    return Ok(());
                }
                let hydrator = Hydrator::new(api, &self.policy, &self.ignore);
                match hydrator.hydrate(&key).await {
                    Ok(Some(addon)) => {
                        // A closed stream just means nobody wants more rows
                        let _ = streamer.emit(Row::hydrated(api.region(), addon)).await;
                        Ok(())
                    }
                    Ok(None) => {
                        counters.suppressed.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                    Err(err) => Err(Abort::Fatal(err.into())),
                }
            }
            Work::Listing {
                api,
                cluster,
                pushed_down,
            } => {
                counters.units.fetch_add(1, Ordering::SeqCst);
                if streamer.is_cancelled() {
                    return Ok(());
                }
                self.list_cluster(api, &cluster, pushed_down, query, streamer, counters)
                    .await
            }
        }
    }

    /// One listing unit: page through a cluster's add-ons, hydrating as needed
    async fn list_cluster(
        &self,
        api: &dyn AddonApi,
        cluster: &Cluster,
        pushed_down: bool,
        query: &Query,
        streamer: &Streamer,
        counters: &Counters,
    ) -> Result<(), Abort> {
        let region = api.region();
        let needs_hydration = query.needs_hydration();
        let hydrator = Hydrator::new(api, &self.policy, &self.ignore);

        // Identity-only rows have nothing to overlap, so they are produced one
        // at a time and no page is fetched ahead of the consumer
        let concurrency = if needs_hydration { self.hydrate_concurrency } else { 1 };

        let steps = Lister::new(api, &self.policy)
            .addons(cluster)
            .take_while(move |_| future::ready(!streamer.is_cancelled()))
            .map(|item| async move {
                let identity = match item {
                    Ok(identity) => identity,
                    Err(err) => return Err(Step::List(err)),
                };
                if !needs_hydration {
                    return Ok(Some(Row::partial(region, identity)));
                }
                if streamer.is_cancelled() {
                    return Ok(None);
                }
                match hydrator.hydrate(&identity.lookup_key()).await {
                    Ok(Some(addon)) => Ok(Some(Row::hydrated(region, addon))),
                    Ok(None) => {
                        counters.suppressed.fetch_add(1, Ordering::SeqCst);
                        Ok(None)
                    }
                    Err(err) => Err(Step::Hydrate(err)),
                }
            })
            .buffered(concurrency);
        futures::pin_mut!(steps);

        let mut listed = 0usize;
        let mut emitted = 0usize;
        loop {
            // Checked before pulling, since pulling may fetch the next page
            if streamer.is_cancelled() {
                debug!(region = %region, cluster = %cluster.name, "Evaluation cancelled, stopping unit");
                return Ok(());
            }
            let Some(step) = steps.next().await else {
                break;
            };
            match step {
                Ok(Some(row)) => {
                    listed += 1;
                    if streamer.emit(row).await.is_err() {
                        debug!(region = %region, cluster = %cluster.name, "Stream closed, stopping unit");
                        return Ok(());
                    }
                    emitted += 1;
                }
                Ok(None) => listed += 1,
                // Only a failure before any add-on was listed means the named cluster is missing
                Err(Step::List(err)) => return self.listing_failed(err, pushed_down && listed == 0),
                Err(Step::Hydrate(err)) => return Err(Abort::Fatal(err.into())),
            }
        }

        debug!(region = %region, cluster = %cluster.name, rows = emitted, "Unit complete");
        Ok(())
    }

    fn listing_failed(&self, err: ApiError, pushed_down: bool) -> Result<(), Abort> {
        if pushed_down && self.ignore.should_ignore(&err) {
            // The caller named a cluster that does not exist in this region
            debug!(error = %err, "Named cluster not found, no rows");
            return Ok(());
        }
        if err.is_fatal() {
            return Err(Abort::Fatal(err.into()));
        }
        Err(Abort::Deferred(err))
    }
}
