//! End-to-end properties of the two-phase extract/commit protocol.
//!
//! Each test drives the public `Coordinator` API against a real temp
//! directory tree shaped like `<sources>/<source-id>/sessions/*.jsonl`.

use gleaner_core::batch::{Batch, artifact_path};
use gleaner_core::coordinator::{Coordinator, ExtractOutcome};
use gleaner_core::cursor::CursorStore;
use gleaner_core::GleanConfig;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

struct Pipeline {
    _tmp: tempfile::TempDir,
    coordinator: Coordinator,
    sources: PathBuf,
}

fn pipeline() -> Pipeline {
    let tmp = tempfile::tempdir().expect("tempdir");
    let state = tmp.path().join("state");
    let sources = tmp.path().join("sources");
    fs::create_dir_all(&sources).expect("mkdir sources");
    let coordinator = Coordinator::new(state, sources.clone(), GleanConfig::default());
    Pipeline {
        _tmp: tmp,
        coordinator,
        sources,
    }
}

fn message_line(role: &str, text: &str) -> String {
    serde_json::json!({
        "type": "message",
        "timestamp": "2026-08-29T10:00:00Z",
        "message": {"role": role, "content": [{"type": "text", "text": text}]},
    })
    .to_string()
        + "\n"
}

fn session_path(p: &Pipeline, source: &str, file: &str) -> PathBuf {
    p.sources.join(source).join("sessions").join(file)
}

fn append(path: &Path, data: &str) {
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    let mut f = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("open");
    f.write_all(data.as_bytes()).expect("append");
}

fn only_cursor(p: &Pipeline) -> gleaner_core::cursor::FileCursor {
    let store = CursorStore::load(&p.coordinator.cursor_path()).expect("load store");
    assert_eq!(store.files.len(), 1, "expected exactly one tracked file");
    store.files.values().next().expect("cursor").clone()
}

fn extract_created(p: &Pipeline) -> String {
    match p.coordinator.extract().expect("extract").outcome {
        ExtractOutcome::Created { batch_id, .. } => batch_id,
        other => panic!("expected Created, got {other:?}"),
    }
}

#[test]
fn committed_ranges_partition_the_file_growth() {
    let p = pipeline();
    let path = session_path(&p, "agent-a", "s.jsonl");
    append(&path, &message_line("user", "seed"));
    p.coordinator.initialize().expect("init");

    let mut boundaries = vec![only_cursor(&p).committed];

    for round in 0..4 {
        append(&path, &message_line("user", &format!("round {round}")));
        append(&path, &message_line("assistant", &format!("reply {round}")));

        let batch_id = extract_created(&p);

        // Committed is untouched while the batch is outstanding.
        let cursor = only_cursor(&p);
        assert_eq!(cursor.committed, *boundaries.last().expect("boundary"));

        p.coordinator.commit(&batch_id).expect("commit");
        let cursor = only_cursor(&p);
        assert!(cursor.pending.is_none());
        boundaries.push(cursor.committed);
    }

    // Strictly increasing, non-overlapping partition of the growth.
    for pair in boundaries.windows(2) {
        assert!(pair[0] < pair[1], "boundaries must strictly increase: {boundaries:?}");
    }
    let size = fs::metadata(&path).expect("metadata").len();
    assert_eq!(*boundaries.last().expect("boundary"), size);
}

#[test]
fn rotation_restarts_the_path_at_zero() {
    let p = pipeline();
    let path = session_path(&p, "agent-a", "s.jsonl");
    append(&path, &message_line("user", "old generation"));
    p.coordinator.initialize().expect("init");

    // Rotate: build the replacement while the original still exists so
    // it cannot reuse the inode, then rename it over the path.
    let staging = path.with_extension("jsonl.new");
    append(&staging, &message_line("user", "new generation"));
    fs::rename(&staging, &path).expect("rotate");

    let batch_id = extract_created(&p);
    let batch =
        Batch::load(&artifact_path(&p.coordinator.batches_dir(), &batch_id)).expect("load batch");
    assert_eq!(batch.touched_files.len(), 1);
    assert_eq!(
        batch.touched_files[0].committed, 0,
        "rotated file must restart at offset 0, not the stale committed value"
    );
    assert_eq!(batch.sources[0].records[0].text, "new generation");

    p.coordinator.commit(&batch_id).expect("commit");
    let size = fs::metadata(&path).expect("metadata").len();
    assert_eq!(only_cursor(&p).committed, size);
}

#[test]
fn truncation_restarts_the_path_at_zero() {
    let p = pipeline();
    let path = session_path(&p, "agent-a", "s.jsonl");
    append(&path, &message_line("user", "a long first generation message"));
    p.coordinator.initialize().expect("init");

    // Truncate in place (same inode, smaller size).
    fs::write(&path, message_line("user", "tiny")).expect("truncate");

    let batch_id = extract_created(&p);
    let batch =
        Batch::load(&artifact_path(&p.coordinator.batches_dir(), &batch_id)).expect("load batch");
    assert_eq!(batch.touched_files[0].committed, 0);
    assert_eq!(batch.sources[0].records[0].text, "tiny");
    p.coordinator.commit(&batch_id).expect("commit");
}

#[test]
fn outstanding_batch_blocks_new_reads() {
    let p = pipeline();
    let path = session_path(&p, "agent-a", "s.jsonl");
    append(&path, "");
    p.coordinator.initialize().expect("init");

    append(&path, &message_line("user", "first"));
    let batch_id = extract_created(&p);
    let artifact = artifact_path(&p.coordinator.batches_dir(), &batch_id);
    let frozen = fs::read(&artifact).expect("read artifact");

    // New data arrives, but the pass must return the outstanding batch
    // untouched and read nothing.
    append(&path, &message_line("user", "second"));
    for _ in 0..2 {
        let report = p.coordinator.extract().expect("extract");
        assert_eq!(
            report.outcome,
            ExtractOutcome::Pending {
                batch_ids: vec![batch_id.clone()]
            }
        );
    }
    assert_eq!(
        fs::read(&artifact).expect("read artifact"),
        frozen,
        "outstanding artifact must not change"
    );

    // After commit the deferred bytes arrive in the next batch.
    p.coordinator.commit(&batch_id).expect("commit");
    let next_id = extract_created(&p);
    let batch =
        Batch::load(&artifact_path(&p.coordinator.batches_dir(), &next_id)).expect("load batch");
    assert_eq!(batch.sources[0].records.len(), 1);
    assert_eq!(batch.sources[0].records[0].text, "second");
}

#[test]
fn partial_record_is_withheld_until_complete() {
    let p = pipeline();
    let path = session_path(&p, "agent-a", "s.jsonl");
    append(&path, "");
    p.coordinator.initialize().expect("init");

    let full = message_line("user", "flushed in two writes");
    let (head, tail) = full.split_at(full.len() / 2);
    append(&path, head);

    let report = p.coordinator.extract().expect("extract");
    assert_eq!(
        report.outcome,
        ExtractOutcome::Noop,
        "a mid-record write must not produce a batch"
    );
    assert_eq!(only_cursor(&p).pending, None);

    append(&path, tail);
    let batch_id = extract_created(&p);
    let batch =
        Batch::load(&artifact_path(&p.coordinator.batches_dir(), &batch_id)).expect("load batch");
    assert_eq!(batch.sources[0].records[0].text, "flushed in two writes");
    p.coordinator.commit(&batch_id).expect("commit");
}

#[test]
fn commit_is_idempotent() {
    let p = pipeline();
    let path = session_path(&p, "agent-a", "s.jsonl");
    append(&path, "");
    p.coordinator.initialize().expect("init");
    append(&path, &message_line("user", "once"));

    let batch_id = extract_created(&p);
    assert_eq!(
        p.coordinator.commit(&batch_id).expect("commit").committed_files,
        1
    );
    assert_eq!(
        p.coordinator.commit(&batch_id).expect("recommit").committed_files,
        0
    );
    assert_eq!(
        p.coordinator
            .commit("19700101-000000")
            .expect("bogus commit")
            .committed_files,
        0
    );
}

#[test]
fn noise_only_file_converges_without_batches() {
    let p = pipeline();
    let path = session_path(&p, "agent-a", "s.jsonl");
    p.coordinator.initialize().expect("init");

    for _ in 0..3 {
        append(&path, &message_line("assistant", "NO_REPLY"));
        append(&path, "not json at all\n");
        let report = p.coordinator.extract().expect("extract");
        assert_eq!(report.outcome, ExtractOutcome::Noop);
    }

    let cursor = only_cursor(&p);
    let size = fs::metadata(&path).expect("metadata").len();
    assert_eq!(cursor.committed, size, "noise must converge to EOF");
    assert!(cursor.pending.is_none());
    assert!(!p.coordinator.batches_dir().exists() || {
        fs::read_dir(p.coordinator.batches_dir())
            .expect("read batches dir")
            .count()
            == 0
    });
}

#[test]
fn append_then_extract_then_commit_scenario() {
    // The canonical happy path, with measured offsets: a tracked file
    // gains one complete user record; extract stages it without moving
    // committed; commit advances committed to the staged offset.
    let p = pipeline();
    let path = session_path(&p, "agent-a", "s.jsonl");
    append(&path, &message_line("user", "backlog"));
    p.coordinator.initialize().expect("init");

    let before = only_cursor(&p);
    let committed_before = before.committed;

    append(&path, &message_line("user", "the new record"));
    let size_after = fs::metadata(&path).expect("metadata").len();

    let batch_id = extract_created(&p);
    let batch =
        Batch::load(&artifact_path(&p.coordinator.batches_dir(), &batch_id)).expect("load batch");
    assert_eq!(batch.sources.len(), 1);
    assert_eq!(batch.sources[0].records.len(), 1);
    assert_eq!(batch.sources[0].records[0].role, "user");

    let staged = only_cursor(&p);
    assert_eq!(staged.committed, committed_before);
    assert_eq!(staged.pending, Some(size_after));
    assert_eq!(staged.pending_batch.as_deref(), Some(batch_id.as_str()));

    let report = p.coordinator.commit(&batch_id).expect("commit");
    assert_eq!(report.committed_files, 1);

    let after = only_cursor(&p);
    assert_eq!(after.committed, size_after);
    assert_eq!(after.pending, None);
    assert_eq!(after.pending_batch, None);
}

#[test]
fn store_survives_reload_between_operations() {
    // Every operation loads the store fresh from disk; nothing depends
    // on in-memory continuity.
    let p = pipeline();
    let path = session_path(&p, "agent-a", "s.jsonl");
    append(&path, "");
    p.coordinator.initialize().expect("init");
    append(&path, &message_line("user", "hello"));
    let batch_id = extract_created(&p);

    // A brand-new coordinator over the same state dir commits it.
    let other = Coordinator::new(
        p.coordinator.cursor_path().parent().expect("state dir").to_path_buf(),
        p.sources.clone(),
        GleanConfig::default(),
    );
    assert_eq!(other.commit(&batch_id).expect("commit").committed_files, 1);
}
