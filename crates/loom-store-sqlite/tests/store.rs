// crates/loom-store-sqlite/tests/store.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Tests for durable registry and step event persistence.
// ============================================================================
//! ## Overview
//! Validates the `SQLite` adapters against the port contract: document
//! round-trips, candidate mutations, status preservation, append-only event
//! scans, and reopen behavior.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;

use loom_core::Candidate;
use loom_core::CandidateId;
use loom_core::CandidateStatus;
use loom_core::InputDefinition;
use loom_core::Migration;
use loom_core::MigrationId;
use loom_core::MigratorApp;
use loom_core::RegistryError;
use loom_core::RegistryStore;
use loom_core::StepDefinition;
use loom_core::StepEventRecord;
use loom_core::StepEventStore;
use loom_core::StepEventType;
use loom_core::StepName;
use loom_core::StepStatus;
use loom_core::Timestamp;
use loom_store_sqlite::SqliteStore;
use loom_store_sqlite::SqliteStoreConfig;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn store_config(dir: &tempfile::TempDir) -> SqliteStoreConfig {
    SqliteStoreConfig {
        path: dir.path().join("loom.db"),
        busy_timeout_ms: 1_000,
        journal_mode: loom_store_sqlite::SqliteJournalMode::Wal,
        sync_mode: loom_store_sqlite::SqliteSyncMode::Normal,
    }
}

fn candidate(id: &str) -> Candidate {
    Candidate {
        id: CandidateId::new(id),
        kind: "repository".to_string(),
        metadata: BTreeMap::new(),
        files: None,
        steps: None,
        status: CandidateStatus::NotStarted,
    }
}

fn migration(candidates: Vec<Candidate>) -> Migration {
    Migration {
        id: MigrationId::new("mig1"),
        name: "Migration One".to_string(),
        description: "durable".to_string(),
        steps: vec![StepDefinition {
            name: StepName::new("A"),
            description: "step A".to_string(),
            migrator_app: MigratorApp::new("worker"),
            step_type: None,
            config: BTreeMap::new(),
            files: None,
        }],
        required_inputs: vec![InputDefinition {
            name: "env".to_string(),
            label: "Environment".to_string(),
        }],
        migrator_url: "https://migrator.example".to_string(),
        candidates,
    }
}

fn event(step: &str, status: StepStatus, tick: u64) -> StepEventRecord {
    StepEventRecord {
        migration_id: MigrationId::new("mig1"),
        candidate_id: CandidateId::new("cand1"),
        step_name: StepName::new(step),
        event_type: StepEventType::Dispatch,
        status,
        duration_ms: status.is_terminal().then_some(25),
        metadata: BTreeMap::new(),
        created_at: Timestamp::Logical(tick),
    }
}

fn mig_id() -> MigrationId {
    MigrationId::new("mig1")
}

// ============================================================================
// SECTION: Registry
// ============================================================================

#[test]
fn migrations_round_trip_with_candidates_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(&store_config(&dir)).unwrap();

    let document = migration(vec![candidate("cand2"), candidate("cand1")]);
    store.save(&document).unwrap();

    let loaded = RegistryStore::get(&store, &mig_id()).unwrap().unwrap();
    assert_eq!(loaded, document);
    let ids: Vec<&str> =
        loaded.candidates.iter().map(|candidate| candidate.id.as_str()).collect();
    assert_eq!(ids, vec!["cand2", "cand1"]);

    assert!(RegistryStore::get(&store, &MigrationId::new("ghost")).unwrap().is_none());
    assert_eq!(RegistryStore::list(&store).unwrap().len(), 1);
}

#[test]
fn documents_survive_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = store_config(&dir);
    {
        let store = SqliteStore::new(&config).unwrap();
        store.save(&migration(vec![candidate("cand1")])).unwrap();
        store
            .set_candidate_status(&mig_id(), &CandidateId::new("cand1"), CandidateStatus::Running)
            .unwrap();
    }

    let reopened = SqliteStore::new(&config).unwrap();
    let candidates = reopened.get_candidates(&mig_id()).unwrap();
    assert_eq!(candidates[0].status, CandidateStatus::Running);
    RegistryStore::readiness(&reopened).unwrap();
}

#[test]
fn candidate_status_updates_are_visible_and_checked() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(&store_config(&dir)).unwrap();
    store.save(&migration(vec![candidate("cand1")])).unwrap();

    store
        .set_candidate_status(&mig_id(), &CandidateId::new("cand1"), CandidateStatus::Completed)
        .unwrap();
    let candidates = store.get_candidates(&mig_id()).unwrap();
    assert_eq!(candidates[0].status, CandidateStatus::Completed);

    let missing = store.set_candidate_status(
        &mig_id(),
        &CandidateId::new("ghost"),
        CandidateStatus::Running,
    );
    assert!(matches!(missing, Err(RegistryError::CandidateNotFound(_))));

    let missing_migration = store.set_candidate_status(
        &MigrationId::new("ghost"),
        &CandidateId::new("cand1"),
        CandidateStatus::Running,
    );
    assert!(matches!(missing_migration, Err(RegistryError::MigrationNotFound(_))));
}

#[test]
fn save_candidates_preserves_status_for_matching_id_and_kind() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(&store_config(&dir)).unwrap();
    store.save(&migration(vec![candidate("cand1")])).unwrap();
    store
        .set_candidate_status(&mig_id(), &CandidateId::new("cand1"), CandidateStatus::Running)
        .unwrap();

    let mut changed_kind = candidate("cand1");
    changed_kind.kind = "application".to_string();
    store
        .save_candidates(&mig_id(), vec![candidate("cand1"), candidate("cand2")])
        .unwrap();
    let preserved = store.get_candidates(&mig_id()).unwrap();
    assert_eq!(preserved[0].status, CandidateStatus::Running);
    assert_eq!(preserved[1].status, CandidateStatus::NotStarted);

    store.save_candidates(&mig_id(), vec![changed_kind]).unwrap();
    let replaced = store.get_candidates(&mig_id()).unwrap();
    assert_eq!(replaced[0].status, CandidateStatus::NotStarted);
}

#[test]
fn update_candidate_metadata_merges_into_the_document() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(&store_config(&dir)).unwrap();
    let mut seeded = candidate("cand1");
    seeded.metadata.insert("env".to_string(), "dev".to_string());
    store.save(&migration(vec![seeded])).unwrap();

    let update: BTreeMap<String, String> = [
        ("env".to_string(), "prod".to_string()),
        ("owner".to_string(), "infra".to_string()),
    ]
    .into_iter()
    .collect();
    store
        .update_candidate_metadata(&mig_id(), &CandidateId::new("cand1"), &update)
        .unwrap();

    let candidates = store.get_candidates(&mig_id()).unwrap();
    assert_eq!(candidates[0].metadata.get("env").map(String::as_str), Some("prod"));
    assert_eq!(candidates[0].metadata.get("owner").map(String::as_str), Some("infra"));
}

// ============================================================================
// SECTION: Step Events
// ============================================================================

#[test]
fn step_events_scan_in_append_order_with_optional_filter() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(&store_config(&dir)).unwrap();

    store.append(&event("A", StepStatus::InProgress, 1)).unwrap();
    store.append(&event("A", StepStatus::Failed, 2)).unwrap();
    store.append(&event("A", StepStatus::Succeeded, 3)).unwrap();
    let mut other = event("Z", StepStatus::Succeeded, 4);
    other.migration_id = MigrationId::new("mig2");
    store.append(&other).unwrap();

    let all = StepEventStore::list(&store, None).unwrap();
    assert_eq!(all.len(), 4);
    let statuses: Vec<StepStatus> = all.iter().map(|record| record.status).collect();
    assert_eq!(
        statuses,
        vec![
            StepStatus::InProgress,
            StepStatus::Failed,
            StepStatus::Succeeded,
            StepStatus::Succeeded
        ]
    );

    let scoped = StepEventStore::list(&store, Some(&mig_id())).unwrap();
    assert_eq!(scoped.len(), 3);
    assert_eq!(scoped[2], event("A", StepStatus::Succeeded, 3));
}

#[test]
fn step_event_round_trip_preserves_metadata_and_duration() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(&store_config(&dir)).unwrap();

    let mut record = event("A", StepStatus::Merged, 9);
    record.metadata.insert("prUrl".to_string(), "http://pr/1".to_string());
    store.append(&record).unwrap();

    let loaded = StepEventStore::list(&store, None).unwrap();
    assert_eq!(loaded, vec![record]);
}
