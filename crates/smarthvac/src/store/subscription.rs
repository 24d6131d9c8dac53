//! Query subscriptions with explicit cancellation.
//!
//! A subscription runs the query once, delivers the result, and re-runs it
//! whenever the store announces a change, a refresh is requested, or the
//! poll interval elapses (for stores without a change feed). Each delivery
//! carries the full result set plus the per-document changes since the
//! previous one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{ChangeNotice, DocumentStore, Query, StoreError, StoredDocument};

/// Kind of change a document went through between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    pub id: String,
}

/// Result set of a subscribed query at one point in time.
#[derive(Debug, Clone)]
pub struct QuerySnapshot {
    pub documents: Vec<StoredDocument>,
    pub changes: Vec<DocumentChange>,
    pub read_at: DateTime<Utc>,
}

impl QuerySnapshot {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Computes added/modified/removed documents between two result sets.
pub fn diff(previous: &[StoredDocument], current: &[StoredDocument]) -> Vec<DocumentChange> {
    let before: HashMap<&str, &StoredDocument> =
        previous.iter().map(|d| (d.id.as_str(), d)).collect();
    let after: HashMap<&str, &StoredDocument> =
        current.iter().map(|d| (d.id.as_str(), d)).collect();

    let mut changes = Vec::new();
    for doc in current {
        match before.get(doc.id.as_str()) {
            None => changes.push(DocumentChange {
                kind: ChangeKind::Added,
                id: doc.id.clone(),
            }),
            Some(old) if old.data != doc.data => changes.push(DocumentChange {
                kind: ChangeKind::Modified,
                id: doc.id.clone(),
            }),
            Some(_) => {}
        }
    }
    for doc in previous {
        if !after.contains_key(doc.id.as_str()) {
            changes.push(DocumentChange {
                kind: ChangeKind::Removed,
                id: doc.id.clone(),
            });
        }
    }
    changes
}

/// Handle to a running query subscription.
///
/// Dropping the handle cancels the subscription.
pub struct Subscription {
    receiver: mpsc::Receiver<Result<QuerySnapshot, StoreError>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Starts a subscription for `query`.
    ///
    /// `cancel` scopes the subscription's lifetime; pass a child of the
    /// owning context's token. `refresh` forces an immediate re-query.
    pub fn start(
        store: Arc<dyn DocumentStore>,
        query: Query,
        poll_interval: Duration,
        refresh: Option<broadcast::Receiver<()>>,
        cancel: CancellationToken,
    ) -> Self {
        Self::spawn(store, query, poll_interval, None, refresh, cancel)
    }

    /// Like [`Subscription::start`], but every query that takes longer than
    /// `request_timeout` is delivered as [`StoreError::Timeout`].
    pub fn start_with_timeout(
        store: Arc<dyn DocumentStore>,
        query: Query,
        poll_interval: Duration,
        request_timeout: Duration,
        refresh: Option<broadcast::Receiver<()>>,
        cancel: CancellationToken,
    ) -> Self {
        Self::spawn(
            store,
            query,
            poll_interval,
            Some(request_timeout),
            refresh,
            cancel,
        )
    }

    fn spawn(
        store: Arc<dyn DocumentStore>,
        query: Query,
        poll_interval: Duration,
        request_timeout: Option<Duration>,
        refresh: Option<broadcast::Receiver<()>>,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, receiver) = mpsc::channel(16);
        let waker = Waker {
            collection: query.collection.clone(),
            changes: store.change_feed(),
            refresh,
            poll_interval,
        };

        log::debug!(
            "Subscribing to '{}' on {} store ({})",
            query.collection,
            store.name(),
            if waker.changes.is_some() {
                "push"
            } else {
                "polled"
            }
        );

        let task = tokio::spawn(run(
            store,
            query,
            request_timeout,
            waker,
            tx,
            cancel.clone(),
        ));

        Self {
            receiver,
            cancel,
            task: Some(task),
        }
    }

    /// Waits for the next snapshot. Returns `None` once cancelled.
    pub async fn next(&mut self) -> Option<Result<QuerySnapshot, StoreError>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            item = self.receiver.recv() => item,
            _ = self.cancel.cancelled() => None,
        }
    }

    /// Stops the subscription. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancels and waits for the background task to finish.
    pub async fn close(mut self) {
        self.cancel.cancel();
        self.receiver.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::warn!("Subscription task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Decides when the next query runs.
struct Waker {
    collection: String,
    changes: Option<broadcast::Receiver<ChangeNotice>>,
    refresh: Option<broadcast::Receiver<()>>,
    poll_interval: Duration,
}

impl Waker {
    async fn wait(&mut self) {
        tokio::select! {
            _ = Self::next_change(&mut self.changes, &self.collection, self.poll_interval) => {},
            _ = Self::next_refresh(&mut self.refresh) => {
                log::debug!("Refresh requested for '{}'", self.collection);
            },
        }
    }

    async fn next_change(
        changes: &mut Option<broadcast::Receiver<ChangeNotice>>,
        collection: &str,
        poll_interval: Duration,
    ) {
        let Some(rx) = changes.as_mut() else {
            tokio::time::sleep(poll_interval).await;
            return;
        };
        loop {
            match rx.recv().await {
                Ok(notice) if notice.collection == collection => return,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::debug!("Change feed lagged by {} notices", skipped);
                    return;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    log::warn!("Change feed closed, falling back to polling");
                    *changes = None;
                    tokio::time::sleep(poll_interval).await;
                    return;
                }
            }
        }
    }

    async fn next_refresh(refresh: &mut Option<broadcast::Receiver<()>>) {
        let Some(rx) = refresh.as_mut() else {
            std::future::pending::<()>().await;
            return;
        };
        match rx.recv().await {
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => {
                *refresh = None;
                std::future::pending::<()>().await;
            }
        }
    }
}

async fn run(
    store: Arc<dyn DocumentStore>,
    query: Query,
    request_timeout: Option<Duration>,
    mut waker: Waker,
    tx: mpsc::Sender<Result<QuerySnapshot, StoreError>>,
    cancel: CancellationToken,
) {
    let mut previous: Option<Vec<StoredDocument>> = None;

    loop {
        let outcome = tokio::select! {
            result = query_once(store.as_ref(), &query, request_timeout) => result,
            _ = cancel.cancelled() => break,
        };

        let delivery = match outcome {
            Ok(documents) => {
                let changes = diff(previous.as_deref().unwrap_or(&[]), &documents);
                let first = previous.is_none();
                previous = Some(documents.clone());
                if first || !changes.is_empty() {
                    Some(Ok(QuerySnapshot {
                        documents,
                        changes,
                        read_at: Utc::now(),
                    }))
                } else {
                    None
                }
            }
            Err(e) => {
                log::warn!("Query on '{}' failed: {}", query.collection, e);
                Some(Err(e))
            }
        };

        if let Some(item) = delivery {
            tokio::select! {
                sent = tx.send(item) => {
                    if sent.is_err() {
                        break;
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }

        tokio::select! {
            _ = waker.wait() => {},
            _ = cancel.cancelled() => break,
        }
    }

    log::debug!("Subscription to '{}' stopped", query.collection);
}

async fn query_once(
    store: &dyn DocumentStore,
    query: &Query,
    request_timeout: Option<Duration>,
) -> Result<Vec<StoredDocument>, StoreError> {
    match request_timeout {
        Some(limit) => tokio::time::timeout(limit, store.query(query))
            .await
            .map_err(|_| StoreError::Timeout(limit))?,
        None => store.query(query).await,
    }
}
