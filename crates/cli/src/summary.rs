// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Final session summary printed after every run.

use crate::color::{self, codes};
use pcs_core::SessionState;
use pcs_engine::SessionReport;
use std::fmt::Write as _;
use std::time::Duration;

fn state_color(state: SessionState) -> u8 {
    match state {
        SessionState::Completed => codes::GOOD,
        SessionState::Aborted => codes::WARN,
        _ => codes::BAD,
    }
}

fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    if total >= 60 {
        format!("{}m{:02}s", total / 60, total % 60)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

/// Render the summary block for a finished session.
pub fn render(report: &SessionReport, colorize: bool) -> String {
    let mut out = String::new();
    let label = |text: &str| color::paint(colorize, codes::CONTEXT, text);

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} {}",
        label("session"),
        report.session_id
    );
    let _ = writeln!(
        out,
        "{} {}",
        label("state  "),
        color::paint(colorize, state_color(report.state), &report.state.to_string())
    );
    let _ = writeln!(
        out,
        "{} {}",
        label("time   "),
        format_duration(report.duration)
    );
    let _ = writeln!(
        out,
        "{} {}/{} succeeded",
        label("modules"),
        report.succeeded(),
        report.job_results.len()
    );
    let failed = report.failed();
    if failed > 0 {
        let _ = writeln!(
            out,
            "{} {}",
            label("failed "),
            color::paint(colorize, codes::BAD, &failed.to_string())
        );
    }
    if let Some(failure) = &report.failure {
        let _ = writeln!(
            out,
            "{} {}",
            label("cause  "),
            color::paint(colorize, codes::BAD, failure)
        );
    }
    let _ = writeln!(
        out,
        "{} {}",
        label("log    "),
        report.log_file.display()
    );
    out
}

/// Print the summary to stderr.
pub fn print(report: &SessionReport, colorize: bool) {
    eprint!("{}", render(report, colorize));
}

#[cfg(test)]
#[path = "summary_tests.rs"]
mod tests;
