//! `smarthvac ping`

use std::process::ExitCode;

use smarthvac::ConnectivityReport;

use super::ApiResponse;
use crate::render;
use crate::state::{AppState, OutputMode};
use smarthvac::observer::RowAccent;

pub async fn ping(state: &AppState) -> ExitCode {
    match state.context.check_connectivity().await {
        Ok(report) => {
            match state.output {
                OutputMode::Json => ApiResponse::ok(report).print(),
                OutputMode::Human { color } => {
                    let line = format!(
                        "Connected to {} store: wrote {}/{} in {}ms",
                        report.backend, report.collection, report.key, report.elapsed_ms
                    );
                    println!("{}", render::paint(&line, RowAccent::Success, color));
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Connectivity check failed: {}", e);
            match state.output {
                OutputMode::Json => ApiResponse::<ConnectivityReport>::err(e.to_string()).print(),
                OutputMode::Human { color } => eprintln!(
                    "{}",
                    render::paint(
                        &format!("Connectivity check failed: {}", e),
                        RowAccent::Danger,
                        color
                    )
                ),
            }
            ExitCode::FAILURE
        }
    }
}
