//! Random operation sequences checked against a plain in-memory model.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use vault_ledger::{FileId, Identity, LedgerError, Locator};
use vault_ledger_store::{MemoryStore, SqliteStore, Store};
use vault_ledger_testkit::generators::ledger_ops;
use vault_ledger_testkit::{LedgerOp, TestFixture, CAST_SIZE};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Ok,
    Unauthorized,
    NotFound,
    InvalidArgument,
    Other(String),
}

fn outcome<T>(result: Result<T, LedgerError>) -> Outcome {
    match result {
        Ok(_) => Outcome::Ok,
        Err(LedgerError::Unauthorized { .. }) => Outcome::Unauthorized,
        Err(LedgerError::NotFound(_)) => Outcome::NotFound,
        Err(LedgerError::InvalidArgument(_)) => Outcome::InvalidArgument,
        Err(other) => Outcome::Other(other.to_string()),
    }
}

/// What the ledger should look like after a sequence of calls.
struct Model {
    admin: Identity,
    files: BTreeMap<FileId, Locator>,
    acl: BTreeSet<(FileId, Identity)>,
    logged_grants: BTreeSet<(FileId, Identity)>,
    records: u64,
}

impl Model {
    fn new(admin: Identity) -> Self {
        Self {
            admin,
            files: BTreeMap::new(),
            acl: BTreeSet::new(),
            logged_grants: BTreeSet::new(),
            records: 0,
        }
    }

    fn readable(&self, caller: &Identity, file: FileId) -> Outcome {
        if !self.files.contains_key(&file) {
            Outcome::NotFound
        } else if !self.acl.contains(&(file, *caller)) {
            Outcome::Unauthorized
        } else {
            Outcome::Ok
        }
    }

    fn apply(&mut self, op: &LedgerOp, cast: &[Identity]) -> Outcome {
        match op {
            LedgerOp::AddFile {
                caller, file, locator, ..
            } => {
                if cast[*caller] != self.admin {
                    return Outcome::Unauthorized;
                }
                self.files.insert(*file, locator.clone());
                self.acl.insert((*file, self.admin));
                Outcome::Ok
            }
            LedgerOp::Authorize {
                caller,
                file,
                grantee,
            } => {
                if cast[*caller] != self.admin {
                    return Outcome::Unauthorized;
                }
                if !self.files.contains_key(file) {
                    return Outcome::NotFound;
                }
                self.acl.insert((*file, cast[*grantee]));
                self.logged_grants.insert((*file, cast[*grantee]));
                self.records += 1;
                Outcome::Ok
            }
            LedgerOp::Access { caller, file } | LedgerOp::SubAccess { caller, file, .. } => {
                let result = self.readable(&cast[*caller], *file);
                if result == Outcome::Ok {
                    self.records += 1;
                }
                result
            }
            LedgerOp::Transfer { caller, new_admin } => {
                if cast[*caller] != self.admin {
                    return Outcome::Unauthorized;
                }
                if cast[*new_admin].is_zero() {
                    return Outcome::InvalidArgument;
                }
                self.admin = cast[*new_admin];
                self.records += 1;
                Outcome::Ok
            }
        }
    }
}

async fn run_model<S: Store>(store: S, ops: Vec<LedgerOp>) -> Result<(), TestCaseError> {
    let f = TestFixture::with_store(store).await;
    let cast: [Identity; CAST_SIZE] = [f.admin, f.alice, f.bob, f.carol, Identity::ZERO];
    let mut model = Model::new(f.admin);

    for op in &ops {
        f.tick(1);
        let expected = model.apply(op, &cast);
        let actual = match op {
            LedgerOp::AddFile {
                caller,
                file,
                locator,
                name,
            } => outcome(
                f.ledger
                    .add_file(&cast[*caller], *file, locator.clone(), name.clone())
                    .await,
            ),
            LedgerOp::Authorize {
                caller,
                file,
                grantee,
            } => outcome(
                f.ledger
                    .authorize_user(&cast[*caller], *file, &cast[*grantee])
                    .await,
            ),
            LedgerOp::Access { caller, file } => {
                let result = f.ledger.access_file(&cast[*caller], *file).await;
                if let Ok(locator) = &result {
                    prop_assert_eq!(Some(locator), model.files.get(file));
                }
                outcome(result)
            }
            LedgerOp::SubAccess {
                caller,
                file,
                sub_name,
            } => outcome(
                f.ledger
                    .log_sub_file(&cast[*caller], *file, sub_name.clone())
                    .await,
            ),
            LedgerOp::Transfer { caller, new_admin } => outcome(
                f.ledger
                    .transfer_ownership(&cast[*caller], &cast[*new_admin])
                    .await,
            ),
        };
        prop_assert_eq!(actual, expected, "op {:?}", op);
        prop_assert_eq!(f.log_len().await, model.records);
    }

    prop_assert_eq!(f.ledger.administrator().await.unwrap(), model.admin);

    // Store ACL matches the model for every (file, identity) pair.
    for raw in 0..6u64 {
        for who in &cast {
            let granted = f.ledger.store().is_authorized(FileId(raw), who).await.unwrap();
            prop_assert_eq!(granted, model.acl.contains(&(FileId(raw), *who)));
        }
    }

    // The log alone reproduces exactly the logged grants.
    let summary = f.ledger.verify_log().await.unwrap();
    prop_assert_eq!(summary.length, model.records);

    let view = f.ledger.audit_view().await.unwrap();
    let observed: BTreeSet<_> = view.grants().map(|g| (g.file_id, g.grantee)).collect();
    prop_assert_eq!(observed, model.logged_grants);

    Ok(())
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_memory_ledger_matches_model(ops in ledger_ops(40)) {
        runtime().block_on(run_model(MemoryStore::new(), ops))?;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_sqlite_ledger_matches_model(ops in ledger_ops(24)) {
        let store = SqliteStore::open_memory().unwrap();
        runtime().block_on(run_model(store, ops))?;
    }
}
