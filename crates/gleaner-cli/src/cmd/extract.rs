use crate::output::{OutputMode, render};
use anyhow::Result;
use clap::Args;
use gleaner_core::{Coordinator, ExtractOutcome};
use serde::Serialize;
use std::io::Write as _;

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Override the per-file read ceiling in bytes for this pass.
    #[arg(long, value_name = "N")]
    pub max_bytes_per_file: Option<u64>,

    /// Override the per-source record cap for this pass.
    #[arg(long, value_name = "N")]
    pub max_records_per_source: Option<usize>,
}

#[derive(Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
enum ExtractOut {
    Pending {
        ok: bool,
        action: &'static str,
        batch_ids: Vec<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        errors: Vec<String>,
    },
    Noop {
        ok: bool,
        action: &'static str,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        errors: Vec<String>,
    },
    Created {
        ok: bool,
        action: &'static str,
        batch_id: String,
        batch_path: String,
        sources: usize,
        records: usize,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        errors: Vec<String>,
    },
}

/// Execute `gln extract`: run one extraction pass over every watched
/// file and report the outcome.
///
/// Per-file failures are reported, never fatal; only a cursor-store or
/// batch-write failure aborts the pass.
///
/// # Errors
///
/// Returns an error if the cursor store or batch artifact cannot be
/// read or persisted.
pub fn run_extract(coordinator: &Coordinator, output: OutputMode) -> Result<()> {
    let report = coordinator.extract()?;

    let out = match report.outcome {
        ExtractOutcome::Pending { batch_ids } => ExtractOut::Pending {
            ok: true,
            action: "pending",
            batch_ids,
            errors: report.errors,
        },
        ExtractOutcome::Noop => ExtractOut::Noop {
            ok: true,
            action: "noop",
            errors: report.errors,
        },
        ExtractOutcome::Created {
            batch_id,
            batch_path,
            sources,
            records,
        } => ExtractOut::Created {
            ok: true,
            action: "created",
            batch_id,
            batch_path: batch_path.display().to_string(),
            sources,
            records,
            errors: report.errors,
        },
    };

    render(output, &out, |v, w| match v {
        ExtractOut::Pending {
            batch_ids, errors, ..
        } => {
            writeln!(
                w,
                "Batch {} is awaiting commit; nothing new was read.",
                batch_ids.join(", ")
            )?;
            write_errors(w, errors)
        }
        ExtractOut::Noop { errors, .. } => {
            writeln!(w, "No new records.")?;
            write_errors(w, errors)
        }
        ExtractOut::Created {
            batch_id,
            batch_path,
            sources,
            records,
            errors,
            ..
        } => {
            writeln!(
                w,
                "✓ Batch {batch_id}: {records} record(s) from {sources} source(s)."
            )?;
            writeln!(w, "  Artifact: {batch_path}")?;
            writeln!(w, "  Commit with: gln commit --batch-id {batch_id}")?;
            write_errors(w, errors)
        }
    })
}

fn write_errors(w: &mut dyn std::io::Write, errors: &[String]) -> std::io::Result<()> {
    for err in errors {
        writeln!(w, "  warning: {err}")?;
    }
    Ok(())
}
