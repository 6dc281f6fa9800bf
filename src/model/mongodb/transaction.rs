use mongodb::{
    error::{TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    ClientSession,
};

use crate::error::{Error, Result};

/// How many times a transaction body is re-run under contention before the
/// operation surfaces as a conflict.
pub const MAX_TRANSACTION_ATTEMPTS: u32 = 8;

/// Outcome of a commit attempt that did not hard-fail.
pub enum Commit {
    Done,
    /// The server aborted the whole transaction; run the body again.
    Retry,
}

/// Commit the in-progress transaction, retrying commits whose outcome the
/// server could not acknowledge.
pub async fn commit_with_retry(session: &mut ClientSession) -> Result<Commit> {
    loop {
        match session.commit_transaction().await {
            Ok(()) => return Ok(Commit::Done),
            Err(err) if err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) => {
                debug!("Transaction commit outcome unknown, retrying commit");
            }
            Err(err) if err.contains_label(TRANSIENT_TRANSACTION_ERROR) => {
                return Ok(Commit::Retry);
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Whether an error is worth a fresh transaction attempt.
pub fn is_transient(err: &Error) -> bool {
    matches!(err, Error::Db(db_err) if db_err.contains_label(TRANSIENT_TRANSACTION_ERROR))
}

/// Run a block as a single optimistic transaction:
///
/// ```ignore
/// in_transaction!(client, |session| {
///     let doc = coll.find_one_with_session(filter, None, &mut session).await?;
///     // compute from the snapshot...
///     coll.update_one_with_session(filter, update, None, &mut session).await?;
///     Ok(new_state)
/// })
/// ```
///
/// The body reads a snapshot, computes new state, and writes it back; if
/// another writer touches the same documents in between, the server aborts
/// with a transient error and the body is re-run against a fresh snapshot.
/// Attempts are capped; exhaustion surfaces as `TransactionConflict`.
///
/// Every read and write inside the body MUST go through the `_with_session`
/// variants, otherwise it escapes the transaction and the lost-update
/// protection is silently void.
macro_rules! in_transaction {
    ($client:expr, |$session:ident| $body:expr) => {{
        let mut $session = $client.start_session(None).await?;
        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            if attempt > $crate::model::mongodb::MAX_TRANSACTION_ATTEMPTS {
                warn!(
                    "Transaction gave up after {} attempts",
                    $crate::model::mongodb::MAX_TRANSACTION_ATTEMPTS
                );
                break Err($crate::error::Error::TransactionConflict(format!(
                    "exhausted {} attempts under contention",
                    $crate::model::mongodb::MAX_TRANSACTION_ATTEMPTS
                )));
            }
            $session.start_transaction(None).await?;
            let result: $crate::error::Result<_> = async { $body }.await;
            match result {
                Ok(value) => {
                    match $crate::model::mongodb::commit_with_retry(&mut $session).await? {
                        $crate::model::mongodb::Commit::Done => break Ok(value),
                        $crate::model::mongodb::Commit::Retry => {
                            debug!("Transaction attempt {attempt} aborted at commit, retrying");
                        }
                    }
                }
                Err(err) => {
                    // The abort result doesn't matter; a dropped transaction
                    // is reaped by the server either way.
                    let _ = $session.abort_transaction().await;
                    if !$crate::model::mongodb::is_transient(&err) {
                        break Err(err);
                    }
                    debug!("Transaction attempt {attempt} hit a transient conflict, retrying");
                }
            }
        }
    }};
}

pub(crate) use in_transaction;
