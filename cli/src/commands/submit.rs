//! `smarthvac submit <text…>`

use std::process::ExitCode;

use serde::Serialize;
use smarthvac::submit::{StatusLine, SubmissionForm, SubmittedJob};

use super::ApiResponse;
use crate::render;
use crate::state::{AppState, OutputMode};

#[derive(Debug, Serialize)]
struct SubmitOutput {
    job: SubmittedJob,
    status: StatusLine,
}

pub async fn submit(state: &AppState, words: &[String]) -> ExitCode {
    let submitter = state.context.submitter();
    let mut form = SubmissionForm::with_text(words.join(" "));
    let job = form.submit(&submitter).await;

    let Some(status) = form.status.clone() else {
        return ExitCode::FAILURE;
    };

    let submitted = job.is_some();
    match (state.output, job) {
        (OutputMode::Json, Some(job)) => ApiResponse::ok(SubmitOutput { job, status }).print(),
        (OutputMode::Json, None) => ApiResponse::<SubmitOutput>::err(status.message).print(),
        (OutputMode::Human { color }, Some(_)) => {
            println!("{}", render::status_line(&status, color))
        }
        (OutputMode::Human { color }, None) => {
            eprintln!("{}", render::status_line(&status, color))
        }
    }

    if submitted {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
