//! Job observation.
//!
//! [`JobObserver::watch`] opens a live feed over the newest jobs and renders
//! a [`JobListView`] for every delivered snapshot. [`JobObserver::select`]
//! resolves the detail panel of one job, including its result plot.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::blob::{result_plot_key, BlobStore};
use crate::config::JobsConfig;
use crate::error::StoreError;
use crate::job::{Job, JobStatus};
use crate::store::{DocumentStore, Query, Subscription};

pub mod view;

pub use view::{
    JobDetailView, JobListView, JobRowView, ResultPanel, RowAccent, SYNC_ERROR_MESSAGE,
};

pub struct JobObserver {
    store: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    collection: String,
    list_limit: usize,
    poll_interval: Duration,
    request_timeout: Duration,
    refresh: broadcast::Sender<()>,
    cancel: CancellationToken,
}

impl JobObserver {
    /// `cancel` is the owning context's token; every feed opened by this
    /// observer stops when it is cancelled.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        jobs: &JobsConfig,
        request_timeout: Duration,
        refresh: broadcast::Sender<()>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            blobs,
            collection: jobs.collection.clone(),
            list_limit: jobs.list_limit,
            poll_interval: Duration::from_secs(jobs.poll_interval_secs),
            request_timeout,
            refresh,
            cancel,
        }
    }

    fn list_query(&self) -> Query {
        Query::newest_first(&self.collection).limit(self.list_limit)
    }

    /// Opens a live feed over the newest jobs.
    pub fn watch(&self) -> JobFeed {
        let subscription = Subscription::start_with_timeout(
            self.store.clone(),
            self.list_query(),
            self.poll_interval,
            self.request_timeout,
            Some(self.refresh.subscribe()),
            self.cancel.child_token(),
        );
        JobFeed {
            subscription,
            jobs: Vec::new(),
            list_limit: self.list_limit,
        }
    }

    /// Reads the newest jobs once.
    pub async fn fetch_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let query = self.list_query();
        let documents = tokio::time::timeout(self.request_timeout, self.store.query(&query))
            .await
            .map_err(|_| StoreError::Timeout(self.request_timeout))??;
        Ok(documents.iter().map(Job::from_document).collect())
    }

    pub fn render_list(&self, jobs: &[Job]) -> JobListView {
        JobListView::render(jobs, self.list_limit)
    }

    /// Re-reads one job by id.
    pub async fn fetch_job(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        let document = tokio::time::timeout(
            self.request_timeout,
            self.store.get(&self.collection, job_id),
        )
        .await
        .map_err(|_| StoreError::Timeout(self.request_timeout))??;
        Ok(document.as_ref().map(Job::from_document))
    }

    /// Resolves the detail panel of a job.
    ///
    /// Uses `known` when the caller already holds the materialized record
    /// (for example from a feed) and re-fetches by id otherwise. Returns
    /// `None` when the job does not exist.
    #[tracing::instrument(skip_all, fields(job_id = %job_id))]
    pub async fn select(
        &self,
        job_id: &str,
        known: Option<&Job>,
    ) -> Result<Option<JobDetailView>, StoreError> {
        let job = match known {
            Some(job) => job.clone(),
            None => match self.fetch_job(job_id).await? {
                Some(job) => job,
                None => {
                    log::info!("Job {} not found in '{}'", job_id, self.collection);
                    return Ok(None);
                }
            },
        };

        let result = self.resolve_result(&job).await;
        Ok(Some(JobDetailView::new(&job, result)))
    }

    /// Result panel for a job. Blob lookups never fail the detail view;
    /// an unreachable or missing plot reads as pending.
    pub async fn resolve_result(&self, job: &Job) -> ResultPanel {
        match &job.status {
            JobStatus::Done => {
                let key = result_plot_key(&job.id);
                let lookup = self.blobs.resolve_url(&key);
                match tokio::time::timeout(self.request_timeout, lookup).await {
                    Ok(Ok(Some(url))) => ResultPanel::Image { url },
                    Ok(Ok(None)) => {
                        log::debug!("No result plot at {} yet", key);
                        ResultPanel::ImagePending
                    }
                    Ok(Err(e)) => {
                        log::debug!("Could not resolve result plot {}: {}", key, e);
                        ResultPanel::ImagePending
                    }
                    Err(_) => {
                        log::debug!("Resolving result plot {} timed out", key);
                        ResultPanel::ImagePending
                    }
                }
            }
            JobStatus::Error => ResultPanel::failed(job.error_message.as_deref()),
            status => ResultPanel::InProgress {
                status: status.to_string(),
            },
        }
    }
}

/// One update of a live job feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedUpdate {
    /// The list changed and was re-rendered.
    Rendered(JobListView),
    /// The store could not be read; the feed keeps retrying.
    SyncError(String),
}

/// Live job list backed by a [`Subscription`]. Dropping it cancels the
/// subscription.
pub struct JobFeed {
    subscription: Subscription,
    jobs: Vec<Job>,
    list_limit: usize,
}

impl JobFeed {
    /// Waits for the next update. Returns `None` once the feed is cancelled.
    pub async fn next_update(&mut self) -> Option<FeedUpdate> {
        match self.subscription.next().await? {
            Ok(snapshot) => {
                for change in &snapshot.changes {
                    log::debug!("Job {} {:?}", change.id, change.kind);
                }
                self.jobs = snapshot.documents.iter().map(Job::from_document).collect();
                Some(FeedUpdate::Rendered(JobListView::render(
                    &self.jobs,
                    self.list_limit,
                )))
            }
            Err(e) => {
                log::warn!("Job feed sync failed: {}", e);
                Some(FeedUpdate::SyncError(SYNC_ERROR_MESSAGE.to_string()))
            }
        }
    }

    /// Jobs of the last successful snapshot.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn job(&self, job_id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == job_id)
    }

    pub fn cancel(&self) {
        self.subscription.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.subscription.is_cancelled()
    }

    /// Cancels the feed and waits for its task to stop.
    pub async fn close(self) {
        self.subscription.close().await;
    }
}
