// Commands - async handlers the host application calls into

pub mod export;
pub mod import;
pub mod shuffle;
pub mod store;

use crate::services::error::Result as StoreResult;
use crate::services::test_store::TestStore;
use crate::AppState;

/// Applies a mutation and saves the snapshot while still holding the write
/// lock, so saves land in mutation order.
pub(crate) async fn mutate_store<T, F>(state: &AppState, mutation: F) -> Result<T, String>
where
    F: FnOnce(&mut TestStore) -> StoreResult<T>,
{
    let mut store = state.store.write().await;
    let value = mutation(&mut store).map_err(|e| e.to_string())?;

    if let Err(e) = state.persistence.save(&store).await {
        tracing::error!("Failed to save tests: {}", e);
        return Err(format!("Failed to save tests: {}", e));
    }

    Ok(value)
}
