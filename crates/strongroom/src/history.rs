//! Archived prior versions of item payloads.
//!
//! History is append-only and sealed under the item's key pair, so reading
//! it needs the same key as reading the live payload. Every read is audited.

use tracing::info;

use strongroom_core::{HistoricalRecord, ItemId};
use strongroom_perms::{seal_payload, ItemKeyPair};
use strongroom_store::{InsertResult, Membership, Store};

use crate::error::{Result, VaultError};
use crate::vault::Vault;

/// A decrypted historical payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalPayload {
    pub item_id: ItemId,
    pub timestamp: i64,
    pub payload: Vec<u8>,
    /// Whether reading this payload must be written to the audit log.
    pub loggable: bool,
}

impl<S: Store, M: Membership> Vault<S, M> {
    /// Archive the payload an item had at `timestamp`.
    ///
    /// Needs the item's current modify half. A second archive at the same
    /// timestamp is rejected rather than overwriting the first.
    pub async fn archive_historical_version(
        &self,
        item_id: &ItemId,
        timestamp: i64,
        keys: &ItemKeyPair,
        payload: &[u8],
    ) -> Result<HistoricalRecord> {
        let current = self.current_key(item_id).await?;
        Self::require_current_modify(keys, &current, "archive history")?;

        let sealed = seal_payload(item_id, timestamp, keys, payload)?;
        let record = HistoricalRecord::new(item_id.clone(), timestamp, current.epoch, sealed);

        match self.store.append_history(&record).await? {
            InsertResult::Inserted => {
                info!(
                    item = %item_id,
                    timestamp,
                    epoch = current.epoch,
                    bytes = payload.len(),
                    "archived historical version"
                );
                Ok(record)
            }
            InsertResult::AlreadyExists => Err(VaultError::IntegrityFailure(format!(
                "history of {} already has a version at {}",
                item_id, timestamp
            ))),
        }
    }

    /// All archived versions of an item, oldest first, still sealed.
    pub async fn history_for_item(&self, item_id: &ItemId) -> Result<Vec<HistoricalRecord>> {
        Ok(self.store.history_for_item(item_id).await?)
    }

    /// Verify and decrypt an archived version.
    ///
    /// The read half of `keys` suffices.
    pub async fn open_historical(
        &self,
        record: &HistoricalRecord,
        keys: &ItemKeyPair,
    ) -> Result<HistoricalPayload> {
        let payload = self.open_sealed(record, keys).await?;
        let loggable = record.is_loggable();
        if loggable {
            info!(
                item = %record.item_id,
                timestamp = record.timestamp,
                epoch = record.key_epoch,
                "read historical version"
            );
        }

        Ok(HistoricalPayload {
            item_id: record.item_id.clone(),
            timestamp: record.timestamp,
            payload,
            loggable,
        })
    }
}
