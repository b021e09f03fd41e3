//! Write scope
//!
//! Every write issued by the labeler runs inside a [`WriteScope`]: a transaction
//! created by the caller, handed to the label store and key registry, and made
//! visible only by an explicit [`WriteScope::commit`]. Dropping an uncommitted
//! scope rolls the transaction back.

use lfmat_common::{Error, Result};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::time::Instant;

/// Monitored transaction wrapper that logs acquisition and release timing
pub struct WriteScope<'c> {
    tx: Option<Transaction<'c, Sqlite>>,
    caller: &'static str,
    acquired_at: Instant,
}

impl<'c> WriteScope<'c> {
    /// Connection to issue statements on
    pub fn conn(&mut self) -> Result<&mut SqliteConnection> {
        let caller = self.caller;
        self.tx
            .as_deref_mut()
            .ok_or_else(|| Error::Internal(format!("write scope {} already finished", caller)))
    }

    /// Commit the transaction, making every write in the scope visible
    pub async fn commit(mut self) -> Result<()> {
        let caller = self.caller;
        let tx = self
            .tx
            .take()
            .ok_or_else(|| Error::Internal(format!("write scope {} already finished", caller)))?;

        tx.commit().await?;

        let held_ms = self.acquired_at.elapsed().as_millis();
        if held_ms > 2000 {
            tracing::warn!(
                caller = self.caller,
                held_ms,
                "LONG TRANSACTION - Connection held for extended period"
            );
        } else {
            tracing::debug!(caller = self.caller, held_ms, "Write scope committed");
        }

        Ok(())
    }
}

impl<'c> Drop for WriteScope<'c> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::debug!(
                caller = self.caller,
                held_ms = self.acquired_at.elapsed().as_millis(),
                "Write scope dropped without commit (rolled back)"
            );
        }
    }
}

/// Begin a write scope, logging how long the connection took to acquire
pub async fn begin_scope<'c>(pool: &'c SqlitePool, caller: &'static str) -> Result<WriteScope<'c>> {
    let start = Instant::now();

    let tx = pool.begin().await?;

    let wait_ms = start.elapsed().as_millis();
    if wait_ms > 1000 {
        tracing::warn!(
            caller,
            wait_ms,
            "SLOW CONNECTION ACQUISITION - Pool may be saturated"
        );
    } else {
        tracing::debug!(caller, wait_ms, "Connection acquired");
    }

    Ok(WriteScope {
        tx: Some(tx),
        caller,
        acquired_at: Instant::now(),
    })
}
