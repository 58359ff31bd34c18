//! Ledger preconditions checked before building a transfer.
//!
//! Opt-in status is derived fresh from one snapshot read on every call and
//! never cached: the account may change between two checks.

use crate::adapters::{AccountSnapshot, LedgerClient};
use crate::address::Address;
use crate::asset::AssetId;
use crate::error::Error;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Key names under which a holding record may expose its asset id.
const ASSET_ID_KEYS: [&str; 3] = ["asset-id", "assetId", "asset_id"];

/// Extract the canonical asset id of one holding record.
///
/// Accepts the flat spellings in [`ASSET_ID_KEYS`] and the nested form
/// `{"asset": {"id": ..}}`, each as a JSON integer or a decimal string.
/// Returns `None` for records with no recognizable id.
pub fn holding_asset_id(record: &Value) -> Option<AssetId> {
    let raw = ASSET_ID_KEYS
        .iter()
        .find_map(|key| present(record.get(*key)))
        .or_else(|| present(record.get("asset").and_then(|asset| asset.get("id"))))?;

    match raw {
        Value::Number(n) => n.as_u64().map(AssetId),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse().ok().map(AssetId)
        }
        _ => None,
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// All asset ids held according to `snapshot`.
pub fn held_assets(snapshot: &AccountSnapshot) -> Vec<AssetId> {
    snapshot
        .holdings()
        .iter()
        .filter_map(holding_asset_id)
        .collect()
}

/// Reads ledger state to decide whether a transfer can succeed.
#[derive(Clone)]
pub struct PreconditionChecker {
    ledger: Arc<dyn LedgerClient>,
}

impl PreconditionChecker {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Whether `address` holds a record for `asset_id`.
    ///
    /// The native currency is always held and needs no read. A failed read
    /// surfaces as [`Error::LedgerUnavailable`]; the caller decides whether
    /// to treat it as "not opted in" or abort.
    pub async fn is_opted_in(&self, address: &Address, asset_id: AssetId) -> Result<bool, Error> {
        if asset_id.is_native() {
            return Ok(true);
        }

        let snapshot = self
            .ledger
            .account_snapshot(address)
            .await
            .map_err(|e| {
                warn!(%address, %asset_id, error = %e, "account snapshot read failed");
                Error::LedgerUnavailable(e.reason().to_string())
            })?;

        let opted_in = snapshot
            .holdings()
            .iter()
            .any(|record| holding_asset_id(record) == Some(asset_id));

        debug!(%address, %asset_id, opted_in, "checked opt-in status");
        Ok(opted_in)
    }

    /// Fail with [`Error::ReceiverNotOptedIn`] unless `address` holds `asset_id`.
    pub async fn require_opted_in(&self, address: &Address, asset_id: AssetId) -> Result<(), Error> {
        if self.is_opted_in(address, asset_id).await? {
            Ok(())
        } else {
            Err(Error::ReceiverNotOptedIn {
                address: address.to_string(),
                asset: asset_id,
            })
        }
    }
}
