use std::io::Write;

use caliber_core::queue::{LibSqlQueueStore, QueueStats, QueueStore};
use caliber_core::sync::ConflictChoice;
use caliber_core::{
    ConflictStrategy, DataConflict, NewOperation, OperationKind, OperationStatus, QueueOperation,
    SyncResult, SyncStatus,
};
use clap::Parser;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::{tempdir, NamedTempFile};

use crate::cli::{Cli, Commands, StatusArg};
use crate::commands::common::{
    format_operation_lines, format_stats_lines, format_sync_result, format_sync_status,
    format_timestamp, normalize_operation_identifier, open_queue, parse_operation,
    resolve_db_path, resolve_operation,
};
use crate::commands::enqueue::run_enqueue;
use crate::commands::retry::requeue;
use crate::commands::sync::load_sync_config;
use crate::error::CliError;

#[test]
fn normalize_operation_identifier_rejects_empty() {
    assert!(matches!(
        normalize_operation_identifier("   "),
        Err(CliError::EmptyOperationId)
    ));
    assert_eq!(
        normalize_operation_identifier("  0192ABCD ").unwrap(),
        "0192abcd"
    );
}

#[test]
fn explicit_db_path_wins() {
    let path = resolve_db_path(Some("/tmp/custom.db".into())).unwrap();
    assert_eq!(path, std::path::PathBuf::from("/tmp/custom.db"));
}

#[test]
fn parse_operation_builds_owned_create() {
    let op = parse_operation(
        OperationKind::Create,
        " firearms ",
        r#"{"make": "Ruger"}"#,
        Some(" user-1 "),
    )
    .unwrap();
    assert_eq!(op.kind, OperationKind::Create);
    assert_eq!(op.table, "firearms");
    assert_eq!(op.data, json!({"make": "Ruger"}));
    assert_eq!(op.owner_id.as_deref(), Some("user-1"));
}

#[test]
fn parse_operation_rejects_bad_input() {
    assert!(matches!(
        parse_operation(OperationKind::Create, " ", "{}", None),
        Err(CliError::EmptyTable)
    ));
    assert!(matches!(
        parse_operation(OperationKind::Create, "ammo", "not json", None),
        Err(CliError::InvalidPayload(_))
    ));
    assert!(matches!(
        parse_operation(OperationKind::Create, "ammo", "[1, 2]", None),
        Err(CliError::InvalidPayload(_))
    ));
    assert!(matches!(
        parse_operation(OperationKind::Delete, "ammo", r#"{"brand": "CCI"}"#, None),
        Err(CliError::InvalidPayload(_))
    ));
    assert!(matches!(
        parse_operation(OperationKind::Update, "ammo", r#"{"id": "a1"}"#, Some("  ")),
        Err(CliError::EmptyOwner)
    ));
}

#[test]
fn format_timestamp_returns_utc_label() {
    assert_eq!(format_timestamp(1_709_294_400_000), "2024-03-01 12:00:00 UTC");
}

#[test]
fn format_operation_lines_include_key_fields() {
    let mut op = QueueOperation::from_new(NewOperation::update(
        "firearms",
        json!({"id": "f1", "serial": "X"}),
    ));
    op.retries = 2;
    op.error = Some("Backend unavailable: timeout".to_string());
    op.status = OperationStatus::Pending;

    let lines = format_operation_lines(&[op]);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("pending"));
    assert!(lines[0].contains("update"));
    assert!(lines[0].contains("firearms"));
    assert!(lines[0].contains("retries=2"));
    assert!(lines[0].contains("row=f1"));
    assert!(lines[0].contains("error=Backend unavailable: timeout"));
}

#[test]
fn format_stats_lines_include_total() {
    let stats = QueueStats {
        pending: 2,
        completed: 5,
        failed: 1,
        conflict: 0,
    };
    let lines = format_stats_lines(&stats);
    assert_eq!(lines[0], "pending    2");
    assert_eq!(lines[4], "total      8");
}

#[test]
fn format_sync_events() {
    assert_eq!(format_sync_status(&SyncStatus::syncing(50.0)), "[syncing] 50%");
    assert_eq!(format_sync_status(&SyncStatus::idle()), "[idle] 100%");
    assert_eq!(
        format_sync_result(&SyncResult {
            success: 3,
            failed: 1,
            conflicts: 2
        }),
        "Sync finished: 3 succeeded, 1 failed, 2 conflict(s)"
    );
}

#[test]
fn load_sync_config_defaults_without_path() {
    assert_eq!(load_sync_config(None).unwrap(), caliber_core::SyncConfig::default());
}

#[test]
fn load_sync_config_reads_json_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"conflict_strategy": "manual", "retry": {{"max_retries": 3}}}}"#
    )
    .unwrap();

    let config = load_sync_config(Some(file.path())).unwrap();
    assert_eq!(config.conflict_strategy, ConflictStrategy::Manual);
    assert_eq!(config.retry.max_retries, 3);
}

#[test]
fn load_sync_config_rejects_invalid_values() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{"retry": {{"max_retries": 0}}}}"#).unwrap();

    assert!(matches!(
        load_sync_config(Some(file.path())),
        Err(CliError::Config(_))
    ));
}

#[test]
fn cli_parses_resolve_and_list_arguments() {
    let cli = Cli::try_parse_from(["caliber", "resolve", "0192", "keep-local", "--owner", "u1"])
        .unwrap();
    match cli.command {
        Commands::Resolve { id, choice, owner } => {
            assert_eq!(id, "0192");
            assert_eq!(ConflictChoice::from(choice), ConflictChoice::KeepLocal);
            assert_eq!(owner, "u1");
        }
        _ => panic!("expected resolve command"),
    }

    let cli = Cli::try_parse_from(["caliber", "list", "--status", "failed", "--json"]).unwrap();
    match cli.command {
        Commands::List { status, json } => {
            assert_eq!(status, Some(StatusArg::Failed));
            assert!(json);
        }
        _ => panic!("expected list command"),
    }
}

#[test]
fn cli_rejects_retry_with_id_and_all_failed() {
    assert!(Cli::try_parse_from(["caliber", "retry", "0192", "--all-failed"]).is_err());
}

async fn enqueue_pair(store: &LibSqlQueueStore) -> (QueueOperation, QueueOperation) {
    let a = store
        .enqueue(NewOperation::delete("ammo", "a1"))
        .await
        .unwrap();
    let b = store
        .enqueue(NewOperation::delete("ammo", "a2"))
        .await
        .unwrap();
    (
        store.get(&a).await.unwrap().unwrap(),
        store.get(&b).await.unwrap().unwrap(),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn resolve_operation_supports_exact_and_prefix_id() {
    let store = LibSqlQueueStore::open_in_memory().await.unwrap();
    let op = store
        .enqueue(NewOperation::delete("ammo", "a1"))
        .await
        .unwrap();

    let exact = resolve_operation(&op.as_str(), &store).await.unwrap();
    assert_eq!(exact.id, op);

    let prefix = op.as_str().chars().take(13).collect::<String>();
    let by_prefix = resolve_operation(&prefix, &store).await.unwrap();
    assert_eq!(by_prefix.id, op);
}

#[tokio::test(flavor = "multi_thread")]
async fn resolve_operation_rejects_ambiguous_prefix() {
    let store = LibSqlQueueStore::open_in_memory().await.unwrap();
    let (a, b) = enqueue_pair(&store).await;

    let shared = a
        .id
        .as_str()
        .chars()
        .zip(b.id.as_str().chars())
        .take_while(|(left, right)| left == right)
        .map(|(left, _)| left)
        .collect::<String>();
    assert!(!shared.is_empty());

    let result = resolve_operation(&shared, &store).await;
    assert!(matches!(result, Err(CliError::AmbiguousOperationId(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn resolve_operation_rejects_missing_operation() {
    let store = LibSqlQueueStore::open_in_memory().await.unwrap();
    let result = resolve_operation("ffffffff", &store).await;
    assert!(matches!(result, Err(CliError::OperationNotFound(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn requeue_all_failed_resets_retry_budget() {
    let store = LibSqlQueueStore::open_in_memory().await.unwrap();
    let (a, b) = enqueue_pair(&store).await;
    store.mark_failed(&a.id, "boom").await.unwrap();

    let requeued = requeue(&store, None, true).await.unwrap();
    assert_eq!(requeued, vec![a.id]);

    let op = store.get(&a.id).await.unwrap().unwrap();
    assert_eq!(op.status, OperationStatus::Pending);
    assert_eq!(op.retries, 0);
    assert!(op.error.is_none());
    assert_eq!(
        store.get(&b.id).await.unwrap().unwrap().status,
        OperationStatus::Pending
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn requeue_single_operation_requires_failed_or_conflict() {
    let store = LibSqlQueueStore::open_in_memory().await.unwrap();
    let (a, b) = enqueue_pair(&store).await;
    let conflict = DataConflict::from_versions("a2", "ammo", json!({}), json!({}));
    store.mark_conflict(&b.id, &conflict).await.unwrap();

    let a_id = a.id.to_string();
    let b_id = b.id.to_string();
    let pending = requeue(&store, Some(a_id.as_str()), false).await;
    assert!(matches!(pending, Err(CliError::NotRetryable(_, OperationStatus::Pending))));

    let requeued = requeue(&store, Some(b_id.as_str()), false).await.unwrap();
    assert_eq!(requeued, vec![b.id]);
    let op = store.get(&b.id).await.unwrap().unwrap();
    assert_eq!(op.status, OperationStatus::Pending);
    assert!(op.conflict.is_none());

    assert!(matches!(
        requeue(&store, None, false).await,
        Err(CliError::MissingRetryTarget)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn run_enqueue_persists_to_database_file() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("nested").join("queue.db");

    run_enqueue(
        OperationKind::Update,
        "firearms",
        r#"{"id": "f1", "notes": "cleaned"}"#,
        Some("user-1"),
        &db_path,
    )
    .await
    .unwrap();

    let store = open_queue(&db_path).await.unwrap();
    let pending = store.get_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, OperationKind::Update);
    assert_eq!(pending[0].row_id().as_deref(), Some("f1"));
    assert_eq!(pending[0].owner_id.as_deref(), Some("user-1"));
    assert_eq!(store.stats().await.unwrap().pending, 1);
}
