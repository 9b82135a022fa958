//! Commit-or-rollback helper for units of work.

use store::StoreTransaction;

use crate::error::Result;

/// Ends a unit of work: commits on success, rolls back on failure.
///
/// The originating error is returned unchanged; a failed rollback is only
/// logged because the transaction is discarded either way.
pub(crate) async fn finish<T, Tx>(tx: Tx, result: Result<T>) -> Result<T>
where
    Tx: StoreTransaction,
{
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}
