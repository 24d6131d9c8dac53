//! Render models for the job list and the detail panel.
//!
//! These are plain data; a frontend only has to paint them.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::job::{Job, JobStatus};

/// Characters of the request text shown in a list row.
pub const DESCRIPTION_PREVIEW_CHARS: usize = 50;

pub const NO_DESCRIPTION: &str = "No description";
pub const JUST_NOW: &str = "Just now";
pub const SYNC_ERROR_MESSAGE: &str = "Error syncing jobs.";
pub const PLOT_PENDING_MESSAGE: &str = "Plot pending or not generated.";
pub const UNKNOWN_ERROR: &str = "Unknown error";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowAccent {
    Default,
    Warning,
    Success,
    Danger,
}

impl RowAccent {
    pub fn for_status(status: &JobStatus) -> Self {
        match status {
            JobStatus::Running => RowAccent::Warning,
            JobStatus::Done => RowAccent::Success,
            JobStatus::Error => RowAccent::Danger,
            JobStatus::Queued | JobStatus::Pending | JobStatus::Other(_) => RowAccent::Default,
        }
    }
}

/// Request text cut to the preview length, or the placeholder.
pub fn preview_description(text: Option<&str>) -> String {
    let Some(text) = text.filter(|t| !t.is_empty()) else {
        return NO_DESCRIPTION.to_string();
    };
    let mut chars = text.chars();
    let preview: String = chars.by_ref().take(DESCRIPTION_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

pub fn format_local(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(TIME_FORMAT).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRowView {
    pub id: String,
    pub description: String,
    pub status: String,
    pub accent: RowAccent,
    pub created: String,
}

impl JobRowView {
    pub fn from_job(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            description: preview_description(job.input_text.as_deref()),
            status: job.status.to_string(),
            accent: RowAccent::for_status(&job.status),
            created: job
                .created_at
                .map(format_local)
                .unwrap_or_else(|| JUST_NOW.to_string()),
        }
    }
}

/// The visible job list, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobListView {
    pub rows: Vec<JobRowView>,
}

impl JobListView {
    /// Renders at most `limit` jobs ordered by creation time, newest first.
    /// Jobs still waiting for their server timestamp sort on top.
    pub fn render(jobs: &[Job], limit: usize) -> Self {
        let mut ordered: Vec<&Job> = jobs.iter().collect();
        ordered.sort_by(|a, b| match (a.created_at, b.created_at) {
            (None, None) => b.id.cmp(&a.id),
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(x), Some(y)) => y.cmp(&x).then_with(|| b.id.cmp(&a.id)),
        });

        Self {
            rows: ordered
                .into_iter()
                .take(limit)
                .map(JobRowView::from_job)
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// What the detail panel shows in place of the result plot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResultPanel {
    InProgress { status: String },
    Image { url: String },
    ImagePending,
    Failed { message: String },
}

impl ResultPanel {
    pub fn failed(error_message: Option<&str>) -> Self {
        let message = error_message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(UNKNOWN_ERROR);
        ResultPanel::Failed {
            message: message.to_string(),
        }
    }

    /// Text shown to the user; the URL itself for an image.
    pub fn message(&self) -> String {
        match self {
            ResultPanel::InProgress { status } => {
                format!("Simulation in progress... ({})", status)
            }
            ResultPanel::Image { url } => url.clone(),
            ResultPanel::ImagePending => PLOT_PENDING_MESSAGE.to_string(),
            ResultPanel::Failed { message } => format!("Job failed: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetailView {
    pub id: String,
    pub description: String,
    pub status: String,
    pub accent: RowAccent,
    pub created: String,
    pub result_path: String,
    pub result: ResultPanel,
}

impl JobDetailView {
    pub fn new(job: &Job, result: ResultPanel) -> Self {
        Self {
            id: job.id.clone(),
            description: job
                .input_text
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            status: job.status.to_string(),
            accent: RowAccent::for_status(&job.status),
            created: job
                .created_at
                .map(format_local)
                .unwrap_or_else(|| "-".to_string()),
            result_path: job
                .result_path
                .clone()
                .unwrap_or_else(|| "Waiting...".to_string()),
            result,
        }
    }
}
