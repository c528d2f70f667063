//! Result streamer
//!
//! Forwards rows to the caller one at a time over a bounded channel, in the
//! order they are handed in. It never filters, batches or reorders.
//!
//! The streamer is also where cancellation is observed: once the row limit
//! is reached or the receiver is dropped, [`Streamer::is_cancelled`] turns
//! true and [`Streamer::cancelled`] resolves.

use super::row::Row;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Default channel capacity
pub const DEFAULT_CAPACITY: usize = 64;

/// The row was not delivered because the evaluation is cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("result stream is closed")]
pub struct Stopped;

struct StreamState {
    limit: Option<usize>,
    reserved: AtomicUsize,
    stop: watch::Sender<bool>,
}

/// Sending half handed to the evaluation driver
#[derive(Clone)]
pub struct Streamer {
    tx: mpsc::Sender<Row>,
    state: Arc<StreamState>,
}

impl Streamer {
    /// Create a streamer and the receiver the caller reads rows from
    pub fn channel(capacity: usize, limit: Option<usize>) -> (Self, mpsc::Receiver<Row>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (stop, _) = watch::channel(limit == Some(0));
        let state = Arc::new(StreamState {
            limit,
            reserved: AtomicUsize::new(0),
            stop,
        });
        (Self { tx, state }, rx)
    }

    /// Deliver one row
    pub async fn emit(&self, row: Row) -> Result<(), Stopped> {
        if self.is_cancelled() {
            return Err(Stopped);
        }

        // Reserve a slot first so concurrent units cannot overshoot the limit
        let slot = self
            .state
            .reserved
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match self.state.limit {
                Some(limit) if n >= limit => None,
                _ => Some(n + 1),
            })
            .map_err(|_| Stopped)?;

        if self.tx.send(row).await.is_err() {
            // Nothing was delivered, give the slot back
            self.state.reserved.fetch_sub(1, Ordering::SeqCst);
            self.cancel();
            return Err(Stopped);
        }

        if self.state.limit == Some(slot + 1) {
            tracing::debug!("Row limit {} reached", slot + 1);
            self.cancel();
        }
        Ok(())
    }

    /// Stop the evaluation without delivering more rows
    pub fn cancel(&self) {
        self.state.stop.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.stop.borrow() || self.tx.is_closed()
    }

    /// Resolves once the evaluation is cancelled
    pub async fn cancelled(&self) {
        let mut stop = self.state.stop.subscribe();
        let stopped = async move {
            loop {
                if *stop.borrow_and_update() {
                    return;
                }
                if stop.changed().await.is_err() {
                    return;
                }
            }
        };
        tokio::select! {
            _ = self.tx.closed() => {}
            _ = stopped => {}
        }
    }

    /// Rows delivered (or being delivered) so far
    pub fn sent(&self) -> usize {
        self.state.reserved.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{AddonIdentity, Cluster};

    fn row(name: &str) -> Row {
        Row::partial("us-east-1", AddonIdentity::new(&Cluster::new("c1"), name))
    }

    #[tokio::test]
    async fn test_forwards_in_order() {
        let (streamer, mut rx) = Streamer::channel(8, None);
        for name in ["a", "b", "c"] {
            streamer.emit(row(name)).await.unwrap();
        }
        drop(streamer);

        let mut names = Vec::new();
        while let Some(r) = rx.recv().await {
            names.push(r.identity.addon_name);
        }
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_limit_cancels() {
        let (streamer, mut rx) = Streamer::channel(8, Some(2));
        streamer.emit(row("a")).await.unwrap();
        assert!(!streamer.is_cancelled());
        streamer.emit(row("b")).await.unwrap();
        assert!(streamer.is_cancelled());
        assert_eq!(streamer.emit(row("c")).await, Err(Stopped));
        streamer.cancelled().await;
        assert_eq!(streamer.sent(), 2);

        drop(streamer);
        let mut count = 0;
        while rx.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_dropped_receiver_cancels() {
        let (streamer, rx) = Streamer::channel(8, None);
        drop(rx);
        assert!(streamer.is_cancelled());
        assert_eq!(streamer.emit(row("a")).await, Err(Stopped));
        streamer.cancelled().await;
    }

    #[tokio::test]
    async fn test_failed_send_is_not_counted() {
        let (streamer, rx) = Streamer::channel(1, None);
        streamer.emit(row("a")).await.unwrap();

        // The channel is full, so the second emit waits until the receiver goes away
        let (sent, ()) = tokio::join!(streamer.emit(row("b")), async move {
            tokio::task::yield_now().await;
            drop(rx);
        });

        assert_eq!(sent, Err(Stopped));
        assert_eq!(streamer.sent(), 1);
        assert!(streamer.is_cancelled());
    }

    #[tokio::test]
    async fn test_zero_limit_is_cancelled_up_front() {
        let (streamer, _rx) = Streamer::channel(8, Some(0));
        assert!(streamer.is_cancelled());
    }
}
