use crate::output::{OutputMode, render};
use anyhow::Result;
use gleaner_core::Coordinator;
use serde::Serialize;
use std::io::Write as _;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitOut {
    ok: bool,
    action: &'static str,
    cursor_path: String,
    tracked_files: usize,
}

/// Execute `gln init`: seed the cursor store at end-of-stream for every
/// discovered session file so the historical backlog is never ingested.
///
/// # Errors
///
/// Returns an error if the cursor store cannot be loaded or persisted.
pub fn run_init(coordinator: &Coordinator, output: OutputMode) -> Result<()> {
    let report = coordinator.initialize()?;

    let out = InitOut {
        ok: true,
        action: "init",
        cursor_path: report.cursor_path.display().to_string(),
        tracked_files: report.tracked_files,
    };
    render(output, &out, |v, w| {
        writeln!(w, "✓ Tracking {} file(s) at end-of-stream.", v.tracked_files)?;
        writeln!(w, "  Cursor store: {}", v.cursor_path)
    })
}
