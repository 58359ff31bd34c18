#[cfg(feature = "memory")]
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    address::Address,
    asset::AssetId,
    error::{LedgerError, PinError, SignerError},
    transaction::{SignedTransaction, TxId, UnsignedTransaction},
};

/// Raw account document as served by the ledger.
///
/// The shape is not fixed: holding records may name the asset id
/// differently depending on the API that produced them. Interpretation
/// lives in [`crate::precondition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountSnapshot(pub serde_json::Value);

impl AccountSnapshot {
    /// Holding records, or an empty slice when the document has none.
    pub fn holdings(&self) -> &[serde_json::Value] {
        self.0
            .get("assets")
            .and_then(|assets| assets.as_array())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Ledger acceptance of one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub tx_id: TxId,
    pub confirmed_round: u64,
    /// Index of the asset created by this transaction, if any.
    pub asset_id: Option<AssetId>,
    pub confirmed_at: DateTime<Utc>,
}

/// -----------------------------
/// Adapter contract
/// -----------------------------

/// Read and write access to the ledger network.
///
/// Implementations must be safe to share between concurrent callers: reads
/// are independent and each submission is its own request.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn account_snapshot(&self, address: &Address) -> Result<AccountSnapshot, LedgerError>;

    /// Submit one transaction or one atomic group in a single request.
    /// Returns the transaction ids in submission order.
    async fn submit(&self, transactions: &[SignedTransaction]) -> Result<Vec<TxId>, LedgerError>;

    /// Wait until `tx_id` is in a block, giving up after `max_rounds`.
    async fn wait_for_confirmation(
        &self,
        tx_id: &TxId,
        max_rounds: u64,
    ) -> Result<Confirmation, LedgerError>;
}

/// Wallet capability. Key material never leaves the implementation.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Whether this signer holds authority for `address`.
    fn can_sign(&self, address: &Address) -> bool;

    async fn sign(&self, transaction: &UnsignedTransaction)
    -> Result<SignedTransaction, SignerError>;
}

/// Content-addressed storage for asset media. Opaque to the core: only the
/// returned URL is used.
#[async_trait]
pub trait ContentPinner: Send + Sync {
    async fn pin(&self, file_name: &str, content: &[u8]) -> Result<String, PinError>;
}
