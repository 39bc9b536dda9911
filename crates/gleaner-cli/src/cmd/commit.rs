use crate::output::{OutputMode, render};
use anyhow::Result;
use clap::Args;
use gleaner_core::Coordinator;
use serde::Serialize;
use std::io::Write as _;

#[derive(Args, Debug)]
pub struct CommitArgs {
    /// Identifier of the batch to acknowledge (from `gln extract`).
    #[arg(long)]
    pub batch_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommitOut {
    ok: bool,
    action: &'static str,
    batch_id: String,
    committed_files: usize,
}

/// Execute `gln commit`: acknowledge a batch, advancing the committed
/// offset of every file it touched. Idempotent: recommitting or
/// committing an unknown id advances nothing.
///
/// # Errors
///
/// Returns an error if the cursor store cannot be loaded or persisted.
pub fn run_commit(args: &CommitArgs, coordinator: &Coordinator, output: OutputMode) -> Result<()> {
    let report = coordinator.commit(&args.batch_id)?;

    let out = CommitOut {
        ok: true,
        action: "committed",
        batch_id: report.batch_id,
        committed_files: report.committed_files,
    };
    render(output, &out, |v, w| {
        if v.committed_files == 0 {
            writeln!(
                w,
                "Batch {} matched no pending cursors (already committed?).",
                v.batch_id
            )
        } else {
            writeln!(
                w,
                "✓ Batch {} committed; {} file(s) advanced.",
                v.batch_id, v.committed_files
            )
        }
    })
}
