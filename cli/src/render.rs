//! Terminal rendering of list and detail views.

use smarthvac::observer::{JobDetailView, JobListView, ResultPanel, RowAccent};
use smarthvac::submit::{StatusLine, Tone};

const RESET: &str = "\x1b[0m";

fn accent_code(accent: RowAccent) -> Option<&'static str> {
    match accent {
        RowAccent::Default => None,
        RowAccent::Warning => Some("\x1b[33m"),
        RowAccent::Success => Some("\x1b[32m"),
        RowAccent::Danger => Some("\x1b[31m"),
    }
}

pub fn paint(text: &str, accent: RowAccent, color: bool) -> String {
    match accent_code(accent) {
        Some(code) if color => format!("{}{}{}", code, text, RESET),
        _ => text.to_string(),
    }
}

pub fn status_line(status: &StatusLine, color: bool) -> String {
    let accent = match status.tone {
        Tone::Neutral => RowAccent::Default,
        Tone::Success => RowAccent::Success,
        Tone::Error => RowAccent::Danger,
    };
    paint(&status.message, accent, color)
}

pub fn job_list(view: &JobListView, color: bool) -> String {
    if view.is_empty() {
        return "No jobs yet.".to_string();
    }

    let id_width = view.rows.iter().map(|r| r.id.len()).max().unwrap_or(0);
    view.rows
        .iter()
        .map(|row| {
            let status = paint(&format!("{:<8}", row.status), row.accent, color);
            format!(
                "{:<19}  {}  {:<width$}  {}",
                row.created,
                status,
                row.id,
                row.description,
                width = id_width
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn job_detail(view: &JobDetailView, color: bool) -> String {
    let result = match &view.result {
        ResultPanel::Image { url } => format!("Plot:        {}", url),
        ResultPanel::Failed { .. } => {
            format!("Result:      {}", paint(&view.result.message(), RowAccent::Danger, color))
        }
        panel => format!("Result:      {}", panel.message()),
    };

    [
        format!("Job:         {}", view.id),
        format!("Status:      {}", paint(&view.status, view.accent, color)),
        format!("Created:     {}", view.created),
        format!("Description: {}", view.description),
        format!("Result path: {}", view.result_path),
        result,
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use smarthvac::observer::JobRowView;

    fn row(id: &str, status: &str, accent: RowAccent) -> JobRowView {
        JobRowView {
            id: id.to_string(),
            description: "cool the server room to 20C".to_string(),
            status: status.to_string(),
            accent,
            created: "2026-01-15 10:30:00".to_string(),
        }
    }

    #[test]
    fn test_paint_only_with_color() {
        assert_eq!(paint("done", RowAccent::Success, false), "done");
        assert_eq!(paint("done", RowAccent::Success, true), "\x1b[32mdone\x1b[0m");
        assert_eq!(paint("queued", RowAccent::Default, true), "queued");
    }

    #[test]
    fn test_job_list_layout() {
        let view = JobListView {
            rows: vec![
                row("job_20260115_103000_2", "running", RowAccent::Warning),
                row("job_20260115_103000", "done", RowAccent::Success),
            ],
        };
        let text = job_list(&view, false);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("2026-01-15 10:30:00  running   job_20260115_103000_2"));
        assert!(lines[1].contains("done      job_20260115_103000    cool"));
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(job_list(&JobListView::default(), true), "No jobs yet.");
    }

    #[test]
    fn test_detail_failed() {
        let view = JobDetailView {
            id: "job_1".to_string(),
            description: "heat the lobby".to_string(),
            status: "error".to_string(),
            accent: RowAccent::Danger,
            created: "-".to_string(),
            result_path: "Waiting...".to_string(),
            result: ResultPanel::failed(None),
        };
        let text = job_detail(&view, false);
        assert!(text.contains("Result:      Job failed: Unknown error"));
        assert!(text.contains("Created:     -"));
    }
}
