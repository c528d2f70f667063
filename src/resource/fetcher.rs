//! Resource Fetcher
//!
//! Walks the paginated EKS list calls. Both the cluster enumeration and the
//! add-on listing are exposed as lazy streams: a page is only requested when
//! the consumer has drained the previous one, and the stream ends when the
//! API stops returning a `nextToken`.

use super::api::{AddonApi, Page};
use super::model::{AddonIdentity, Cluster};
use crate::aws::error::{ApiError, Operation};
use crate::pipeline::policy::CallPolicy;
use futures::future;
use futures::stream::{self, Stream, StreamExt};
use std::future::Future;

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Turn a page fetcher into a stream of items.
///
/// `fetch` receives the token for the page to load (`None` for the first
/// page). A failed page yields one `Err` and ends the stream; items from
/// earlier pages have already been yielded.
pub fn paginate<'a, T, F, Fut>(fetch: F) -> impl Stream<Item = Result<T, ApiError>> + 'a
where
    T: 'a,
    F: FnMut(Option<String>) -> Fut + 'a,
    Fut: Future<Output = Result<Page<T>, ApiError>> + 'a,
{
    stream::unfold((fetch, Cursor::Start), |(mut fetch, cursor)| async move {
        let token = match cursor {
            Cursor::Done => return None,
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
        };

        match fetch(token.clone()).await {
            Ok(page) => {
                let next = match page.next_token {
                    Some(next) if next.is_empty() => Cursor::Done,
                    Some(next) if token.as_deref() == Some(next.as_str()) => {
                        // The API handed back the token we sent; following it would loop forever
                        tracing::warn!("Pagination token repeated, stopping: {}", next);
                        Cursor::Done
                    }
                    Some(next) => Cursor::Next(next),
                    None => Cursor::Done,
                };
                Some((Ok(page.items), (fetch, next)))
            }
            Err(err) => Some((Err(err), (fetch, Cursor::Done))),
        }
    })
    .flat_map(|page| match page {
        Ok(items) => stream::iter(items.into_iter().map(Ok)).left_stream(),
        Err(err) => stream::once(future::ready(Err(err))).right_stream(),
    })
}

/// Listing capability for one region
#[derive(Clone, Copy)]
pub struct Lister<'a> {
    api: &'a dyn AddonApi,
    policy: &'a CallPolicy,
}

impl<'a> Lister<'a> {
    pub fn new(api: &'a dyn AddonApi, policy: &'a CallPolicy) -> Self {
        Self { api, policy }
    }

    /// Every cluster in the region, in API page order
    pub fn clusters(self) -> impl Stream<Item = Result<Cluster, ApiError>> + Send + 'a {
        let Lister { api, policy } = self;
        let target = format!("{} clusters", api.region());

        paginate(move |token: Option<String>| {
            let target = target.clone();
            async move {
                tracing::debug!(region = %api.region(), token = ?token, "ListClusters page");
                policy
                    .call(Operation::ListClusters, &target, || api.list_clusters(token.as_deref()))
                    .await
            }
        })
    }

    /// Every add-on of `cluster`, in API page order
    pub fn addons(self, cluster: &'a Cluster) -> impl Stream<Item = Result<AddonIdentity, ApiError>> + Send + 'a {
        let Lister { api, policy } = self;
        let target = format!("{} clusters/{}/addons", api.region(), cluster.name);

        paginate(move |token: Option<String>| {
            let target = target.clone();
            async move {
                tracing::debug!(
                    region = %api.region(),
                    cluster = %cluster.name,
                    token = ?token,
                    "ListAddons page"
                );
                policy
                    .call(Operation::ListAddons, &target, || api.list_addons(cluster, token.as_deref()))
                    .await
            }
        })
        .map(move |item| item.map(|name| AddonIdentity::new(cluster, name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn page(items: &[&str], next: Option<&str>) -> Page<String> {
        Page {
            items: items.iter().map(|s| s.to_string()).collect(),
            next_token: next.map(|s| s.to_string()),
        }
    }

    #[tokio::test]
    async fn test_paginate_follows_tokens_in_order() {
        let calls = AtomicUsize::new(0);
        let items: Vec<_> = paginate(|token: Option<String>| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(match token.as_deref() {
                    None => page(&["a", "b"], Some("t1")),
                    Some("t1") => page(&["c"], Some("t2")),
                    Some("t2") => page(&["d", "e"], None),
                    Some(other) => panic!("unexpected token {}", other),
                })
            }
        })
        .collect()
        .await;

        let items: Vec<String> = items.into_iter().map(Result::unwrap).collect();
        assert_eq!(items, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_paginate_error_ends_stream_after_earlier_items() {
        let items: Vec<_> = paginate(|token: Option<String>| async move {
            match token {
                None => Ok(page(&["a"], Some("t1"))),
                Some(_) => Err(ApiError::new(
                    Operation::ListAddons,
                    "t",
                    Some(500),
                    "ServerException",
                    "boom",
                )),
            }
        })
        .collect()
        .await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().ok(), Some("a"));
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn test_paginate_stops_on_repeated_token() {
        let calls = AtomicUsize::new(0);
        let items: Vec<_> = paginate(|_token: Option<String>| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(page(&["x"], Some("same"))) }
        })
        .collect()
        .await;

        assert_eq!(items.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_paginate_empty_token_ends() {
        let items: Vec<_> = paginate(|_token: Option<String>| async { Ok(page(&[], Some(""))) })
            .collect()
            .await;
        assert!(items.is_empty());
    }
}
