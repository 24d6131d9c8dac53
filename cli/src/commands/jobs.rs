//! `smarthvac list`, `smarthvac watch` and `smarthvac show <job-id>`

use std::process::ExitCode;

use chrono::Local;
use smarthvac::observer::{
    FeedUpdate, JobDetailView, JobListView, RowAccent, SYNC_ERROR_MESSAGE,
};

use super::ApiResponse;
use crate::render;
use crate::state::{AppState, OutputMode};

fn print_list(output: OutputMode, view: &JobListView) {
    match output {
        OutputMode::Json => ApiResponse::ok(view).print(),
        OutputMode::Human { color } => println!("{}", render::job_list(view, color)),
    }
}

fn print_error<T: serde::Serialize>(output: OutputMode, message: &str) {
    match output {
        OutputMode::Json => ApiResponse::<T>::err(message).print(),
        OutputMode::Human { color } => {
            eprintln!("{}", render::paint(message, RowAccent::Danger, color))
        }
    }
}

pub async fn list(state: &AppState) -> ExitCode {
    let observer = state.context.observer();
    match observer.fetch_jobs().await {
        Ok(jobs) => {
            print_list(state.output, &observer.render_list(&jobs));
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::warn!("Failed to list jobs: {}", e);
            print_error::<JobListView>(state.output, SYNC_ERROR_MESSAGE);
            ExitCode::FAILURE
        }
    }
}

pub async fn show(state: &AppState, job_id: &str) -> ExitCode {
    let observer = state.context.observer();
    match observer.select(job_id, None).await {
        Ok(Some(view)) => {
            match state.output {
                OutputMode::Json => ApiResponse::ok(&view).print(),
                OutputMode::Human { color } => println!("{}", render::job_detail(&view, color)),
            }
            ExitCode::SUCCESS
        }
        Ok(None) => {
            print_error::<JobDetailView>(state.output, &format!("Job not found: {}", job_id));
            ExitCode::FAILURE
        }
        Err(e) => {
            log::warn!("Failed to load job {}: {}", job_id, e);
            print_error::<JobDetailView>(state.output, SYNC_ERROR_MESSAGE);
            ExitCode::FAILURE
        }
    }
}

/// Re-renders the job list on every change until Ctrl-C.
pub async fn watch(state: &AppState) -> ExitCode {
    let token = state.context.shutdown_token();
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        log::warn!("Failed to install Ctrl-C handler: {}", e);
    }

    let mut feed = state.context.observer().watch();
    log::info!("Watching jobs, press Ctrl-C to stop");

    while let Some(update) = feed.next_update().await {
        match update {
            FeedUpdate::Rendered(view) => {
                if let OutputMode::Human { .. } = state.output {
                    println!("--- {} ---", Local::now().format("%H:%M:%S"));
                }
                print_list(state.output, &view);
            }
            FeedUpdate::SyncError(message) => {
                print_error::<JobListView>(state.output, &message);
            }
        }
    }

    feed.close().await;
    state.context.shutdown();
    log::info!("Stopped watching jobs");
    ExitCode::SUCCESS
}
