//! Database transaction utilities
//!
//! Multi-statement ledger writes (ensure the row, then update it) run inside a
//! [`TransactionGuard`] so they are applied atomically.

use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use super::ledger::LedgerError;

/// A transaction that is rolled back unless [`TransactionGuard::commit`] is called.
///
/// ```ignore
/// let mut tx = TransactionGuard::begin(&pool).await?;
/// sqlx::query("UPDATE ...").execute(tx.conn()?).await?;
/// tx.commit().await?;
/// ```
pub struct TransactionGuard<'a> {
    transaction: Option<Transaction<'a, Postgres>>,
}

impl<'a> TransactionGuard<'a> {
    pub async fn begin(pool: &PgPool) -> Result<Self, LedgerError> {
        let transaction = pool.begin().await?;
        Ok(Self {
            transaction: Some(transaction),
        })
    }

    /// Connection to run statements on.
    pub fn conn(&mut self) -> Result<&mut PgConnection, LedgerError> {
        self.transaction
            .as_deref_mut()
            .ok_or(LedgerError::Database(sqlx::Error::PoolClosed))
    }

    pub async fn commit(mut self) -> Result<(), LedgerError> {
        if let Some(tx) = self.transaction.take() {
            tx.commit().await?;
        }
        Ok(())
    }
}

impl<'a> Drop for TransactionGuard<'a> {
    fn drop(&mut self) {
        // sqlx rolls the inner transaction back when it is dropped.
        if self.transaction.is_some() {
            tracing::warn!("Transaction dropped without commit, rolling back");
        }
    }
}
