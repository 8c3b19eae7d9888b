//! Durable restart, tamper detection and store sharing.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use rusqlite::{params, Connection};
use vault_ledger::{
    AuditEvent, FileId, Identity, Keypair, Ledger, LedgerConfig, LedgerError, ManualClock,
};
use vault_ledger_core::{RecordBuilder, ValidationError};
use vault_ledger_store::{Commit, CommitResult, MemoryStore, SqliteStore, Store};
use vault_ledger_testkit::fixtures::{sealer, START_MILLIS};
use vault_ledger_testkit::{identity, TestFixture};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Admin registers two files, grants alice one of them, alice reads it twice
/// and views a sub-item. Four records.
async fn populate(path: &Path) -> Result<()> {
    let fixture = TestFixture::with_store(SqliteStore::open(path)?).await;
    fixture.seed_file(1, "Qm1", "report.pdf").await;
    fixture.seed_file(2, "Qm2", "ledger.xlsx").await;
    fixture.grant(1, &fixture.alice).await;

    fixture.tick(1_000);
    fixture.ledger.access_file(&fixture.alice, FileId(1)).await?;
    fixture.tick(1_000);
    fixture.ledger.access_file(&fixture.alice, FileId(1)).await?;
    fixture
        .ledger
        .log_sub_file(&fixture.alice, FileId(1), "appendix.docx")
        .await?;
    Ok(())
}

/// Rewrite the stored bytes of record `seq` with the append-only trigger
/// dropped.
fn tamper(path: &Path, seq: u64, edit: impl FnOnce(&mut Vec<u8>)) -> Result<()> {
    let conn = Connection::open(path)?;
    conn.execute_batch("DROP TRIGGER audit_log_no_update;")?;

    let mut bytes: Vec<u8> = conn.query_row(
        "SELECT canonical_bytes FROM audit_log WHERE seq = ?1",
        params![seq as i64],
        |row| row.get(0),
    )?;
    edit(&mut bytes);
    conn.execute(
        "UPDATE audit_log SET canonical_bytes = ?1 WHERE seq = ?2",
        params![bytes, seq as i64],
    )?;
    Ok(())
}

async fn reopen(path: &Path) -> std::result::Result<Ledger<SqliteStore>, LedgerError> {
    let store = SqliteStore::open(path)?;
    Ledger::open(sealer(), store, LedgerConfig::default()).await
}

#[tokio::test]
async fn test_reopen_sees_same_state() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ledger.db");
    populate(&path).await?;

    let ledger = reopen(&path).await?;
    let alice = identity(0xa1);
    let bob = identity(0xb0);

    assert_eq!(ledger.administrator().await?, identity(0xa0));

    let head = ledger.head().await?.expect("log is not empty");
    assert_eq!(head.seq, 4);
    assert_eq!(head.updated_at, START_MILLIS + 2_000);

    // Files and grants survived: alice still reads file 1, not file 2.
    assert_eq!(ledger.access_file(&alice, FileId(1)).await?, "Qm1");
    assert!(matches!(
        ledger.access_file(&alice, FileId(2)).await,
        Err(LedgerError::Unauthorized { .. })
    ));
    assert!(matches!(
        ledger.access_file(&bob, FileId(1)).await,
        Err(LedgerError::Unauthorized { .. })
    ));

    // The chain continues from the persisted head.
    let next = ledger.records(5, 5).await?;
    assert_eq!(next[0].prev_record_id(), head.record_id.as_ref());

    let summary = ledger.verify_log().await?;
    assert_eq!(summary.length, 5);
    Ok(())
}

#[tokio::test]
async fn test_reopen_uninitialized_store() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = SqliteStore::open(dir.path().join("empty.db"))?;

    let result = Ledger::open(sealer(), store, LedgerConfig::default()).await;
    assert!(matches!(result, Err(LedgerError::NotInitialized)));
    Ok(())
}

#[tokio::test]
async fn test_create_twice_fails() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ledger.db");
    populate(&path).await?;

    let store = SqliteStore::open(&path)?;
    let result = Ledger::create(sealer(), store, LedgerConfig::default(), &identity(0xee)).await;
    assert!(matches!(result, Err(LedgerError::AlreadyInitialized)));

    // The original administrator is still in place.
    let ledger = reopen(&path).await?;
    assert_eq!(ledger.administrator().await?, identity(0xa0));
    Ok(())
}

#[tokio::test]
async fn test_create_rejects_null_deployer() {
    let result = Ledger::create(
        sealer(),
        MemoryStore::new(),
        LedgerConfig::default(),
        &Identity::ZERO,
    )
    .await;
    assert!(matches!(result, Err(LedgerError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_flipped_signature_detected_on_open() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ledger.db");
    populate(&path).await?;

    tamper(&path, 2, |bytes| {
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
    })?;

    match reopen(&path).await {
        Err(LedgerError::Validation(ValidationError::SignatureFailed { seq })) => {
            assert_eq!(seq, 2)
        }
        Err(other) => panic!("expected signature failure, got {:?}", other),
        Ok(_) => panic!("tampered log opened"),
    }
    Ok(())
}

#[tokio::test]
async fn test_flipped_payload_detected_by_verify() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ledger.db");
    populate(&path).await?;

    // Last payload byte sits right before the 64-byte signature. For record 3
    // it is the final character of "report.pdf".
    tamper(&path, 3, |bytes| {
        let at = bytes.len() - 65;
        bytes[at] ^= 0x01;
    })?;

    let config = LedgerConfig {
        verify_on_open: false,
        ..LedgerConfig::default()
    };
    let ledger = Ledger::open(sealer(), SqliteStore::open(&path)?, config).await?;

    match ledger.verify_log().await {
        Err(LedgerError::Validation(ValidationError::PayloadHashMismatch { seq })) => {
            assert_eq!(seq, 3)
        }
        other => panic!("expected payload mismatch, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_foreign_sealer_rejected_on_open() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ledger.db");
    populate(&path).await?;

    let other = Keypair::from_seed(&[0x07; 32]);
    let result = Ledger::open(other, SqliteStore::open(&path)?, LedgerConfig::default()).await;
    assert!(matches!(
        result,
        Err(LedgerError::Validation(ValidationError::UnexpectedSealer { seq: 1 }))
    ));
    Ok(())
}

#[tokio::test]
async fn test_append_only_triggers_hold() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ledger.db");
    populate(&path).await?;

    let conn = Connection::open(&path)?;
    assert!(conn.execute("DELETE FROM audit_log WHERE seq = 4", []).is_err());
    assert!(conn
        .execute("UPDATE audit_log SET timestamp = 0 WHERE seq = 1", [])
        .is_err());
    assert!(conn.execute("DELETE FROM acl", []).is_err());
    assert!(conn.execute("DELETE FROM files WHERE file_id = 1", []).is_err());
    drop(conn);

    reopen(&path).await?;
    Ok(())
}

#[tokio::test]
async fn test_shared_store_rejects_stale_record() -> Result<()> {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let admin = identity(0xa0);
    let clock = Arc::new(ManualClock::new(START_MILLIS));

    let first = Ledger::create(sealer(), store.clone(), LedgerConfig::default(), &admin)
        .await?
        .with_clock(clock.clone());
    first.add_file(&admin, FileId(1), "Qm1", "a.pdf").await?;
    first.access_file(&admin, FileId(1)).await?;

    // A writer that still believes the log is empty.
    let stale = RecordBuilder::new(
        1,
        &AuditEvent::FileAccessed {
            file_id: FileId(1),
            file_name: "a.pdf".into(),
            actor: admin,
        },
    )
    .timestamp(START_MILLIS)
    .sign(&sealer());
    let result = store.commit(Commit::new(START_MILLIS).append(stale)).await?;

    let head = first.head().await?.expect("one record");
    assert_eq!(
        result,
        CommitResult::Conflict {
            expected_seq: 2,
            existing: head.record_id,
        }
    );

    // A second ledger over the same store continues the chain.
    let second = Ledger::open(sealer(), store.clone(), LedgerConfig::default())
        .await?
        .with_clock(clock.clone());
    second.access_file(&admin, FileId(1)).await?;
    first.access_file(&admin, FileId(1)).await?;

    let summary = second.verify_log().await?;
    assert_eq!(summary.length, 3);
    Ok(())
}

#[tokio::test]
async fn test_replay_in_small_batches() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ledger.db");
    populate(&path).await?;

    for replay_batch in [0, 1, 3, 4, 100] {
        let config = LedgerConfig {
            replay_batch,
            ..LedgerConfig::default()
        };
        let ledger = Ledger::open(sealer(), SqliteStore::open(&path)?, config).await?;

        let summary = ledger.verify_log().await?;
        assert_eq!(summary.length, 4, "batch {}", replay_batch);
        assert_eq!(summary.head, ledger.head().await?.and_then(|h| h.record_id));

        let view = ledger.audit_view().await?;
        assert_eq!(view.records_applied(), 4);
        assert!(view.is_granted(FileId(1), &identity(0xa1)));
        assert_eq!(view.tally(FileId(1)).map(|t| t.total()), Some(3));
    }
    Ok(())
}

#[tokio::test]
async fn test_batched_verify_reports_tampered_seq() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ledger.db");
    populate(&path).await?;

    tamper(&path, 4, |bytes| {
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
    })?;

    let config = LedgerConfig {
        replay_batch: 2,
        ..LedgerConfig::default()
    };
    match Ledger::open(sealer(), SqliteStore::open(&path)?, config).await {
        Err(LedgerError::Validation(ValidationError::SignatureFailed { seq })) => {
            assert_eq!(seq, 4)
        }
        Err(other) => panic!("expected signature failure, got {:?}", other),
        Ok(_) => panic!("tampered log opened"),
    }
    Ok(())
}
