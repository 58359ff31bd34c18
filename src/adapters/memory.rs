//! In-memory ledger, signer and pinner.
//!
//! `MemoryLedger` enforces the same rules a real ledger applies to the four
//! transaction kinds: fees, balances, asset existence, opt-in on both sides of
//! a transfer, group integrity and all-or-nothing application of a group.

use crate::{
    adapters::{
        AccountSnapshot, Confirmation, ContentPinner, LedgerClient, TransactionSigner,
    },
    address::Address,
    asset::{AssetId, AssetParams},
    error::{LedgerError, PinError, SignerError},
    group::GroupId,
    transaction::{SignedTransaction, TransactionRequest, TxId, UnsignedTransaction},
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Flat fee charged to the sender of every transaction.
pub const MIN_FEE: u64 = 1_000;

const FIRST_ASSET_ID: u64 = 1_000;

#[derive(Debug, Clone, Default)]
struct AccountState {
    balance: u64,
    holdings: BTreeMap<AssetId, u64>,
}

#[derive(Debug, Clone)]
struct AssetRecord {
    creator: Address,
    params: AssetParams,
}

#[derive(Debug, Clone)]
struct LedgerState {
    accounts: HashMap<Address, AccountState>,
    assets: HashMap<AssetId, AssetRecord>,
    confirmed: HashMap<TxId, Confirmation>,
    next_asset_id: u64,
    round: u64,
}

impl LedgerState {
    fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            assets: HashMap::new(),
            confirmed: HashMap::new(),
            next_asset_id: FIRST_ASSET_ID,
            round: 1,
        }
    }

    fn account(&mut self, address: &Address) -> &mut AccountState {
        self.accounts.entry(address.clone()).or_default()
    }

    fn charge_fee(&mut self, sender: &Address) -> Result<(), String> {
        let account = self.account(sender);
        if account.balance < MIN_FEE {
            return Err(format!(
                "overspend: account {} balance {} cannot cover fee {}",
                sender, account.balance, MIN_FEE
            ));
        }
        account.balance -= MIN_FEE;
        Ok(())
    }

    /// Apply one request. Returns the id of a created asset, if any.
    fn apply(&mut self, request: &TransactionRequest) -> Result<Option<AssetId>, String> {
        self.charge_fee(request.sender())?;

        match request {
            TransactionRequest::Payment {
                sender,
                receiver,
                amount,
            } => {
                let from = self.account(sender);
                if from.balance < *amount {
                    return Err(format!(
                        "overspend: account {} balance {} below {}",
                        sender, from.balance, amount
                    ));
                }
                from.balance -= amount;
                let to = self.account(receiver);
                to.balance = to
                    .balance
                    .checked_add(*amount)
                    .ok_or_else(|| format!("balance overflow for {}", receiver))?;
                Ok(None)
            }
            TransactionRequest::AssetTransfer {
                sender,
                receiver,
                asset_id,
                amount,
            } => {
                if !self.assets.contains_key(asset_id) {
                    return Err(format!("asset {} does not exist", asset_id));
                }
                if !self.account(receiver).holdings.contains_key(asset_id) {
                    return Err(format!(
                        "receiver {} not opted in to asset {}",
                        receiver, asset_id
                    ));
                }
                let held = match self.account(sender).holdings.get(asset_id) {
                    Some(held) => *held,
                    None => {
                        return Err(format!(
                            "sender {} not opted in to asset {}",
                            sender, asset_id
                        ));
                    }
                };
                if held < *amount {
                    return Err(format!(
                        "underflow on asset {}: {} holds {}, needs {}",
                        asset_id, sender, held, amount
                    ));
                }
                self.account(sender).holdings.insert(*asset_id, held - amount);
                let to = self.account(receiver).holdings.entry(*asset_id).or_insert(0);
                *to = to
                    .checked_add(*amount)
                    .ok_or_else(|| format!("holding overflow for {}", receiver))?;
                Ok(None)
            }
            TransactionRequest::AssetOptIn { sender, asset_id } => {
                if !self.assets.contains_key(asset_id) {
                    return Err(format!("asset {} does not exist", asset_id));
                }
                self.account(sender).holdings.entry(*asset_id).or_insert(0);
                Ok(None)
            }
            TransactionRequest::AssetCreate { sender, params } => {
                params.validate().map_err(|e| e.to_string())?;
                let id = AssetId(self.next_asset_id);
                self.next_asset_id += 1;
                self.assets.insert(
                    id,
                    AssetRecord {
                        creator: sender.clone(),
                        params: params.clone(),
                    },
                );
                self.account(sender).holdings.insert(id, params.total);
                Ok(Some(id))
            }
        }
    }

    fn render(&self, address: &Address) -> serde_json::Value {
        let account = self.accounts.get(address).cloned().unwrap_or_default();
        let assets: Vec<_> = account
            .holdings
            .iter()
            .map(|(id, amount)| json!({"asset-id": id.0, "amount": amount, "is-frozen": false}))
            .collect();
        let created: Vec<_> = self
            .assets
            .iter()
            .filter(|(_, record)| &record.creator == address)
            .map(|(id, record)| {
                json!({
                    "index": id.0,
                    "params": {
                        "name": record.params.name,
                        "unit-name": record.params.unit_name,
                        "total": record.params.total,
                        "decimals": record.params.decimals,
                    }
                })
            })
            .collect();
        json!({
            "address": address.as_str(),
            "amount": account.balance,
            "assets": assets,
            "created-assets": created,
            "round": self.round,
        })
    }
}

struct MemoryStore {
    state: Mutex<LedgerState>,
    raw_snapshots: Mutex<HashMap<Address, serde_json::Value>>,
    read_failure: Mutex<Option<String>>,
    rejection: Mutex<Option<String>>,
    snapshot_reads: AtomicUsize,
    submissions: AtomicUsize,
}

impl MemoryStore {
    fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::new()),
            raw_snapshots: Mutex::new(HashMap::new()),
            read_failure: Mutex::new(None),
            rejection: Mutex::new(None),
            snapshot_reads: AtomicUsize::new(0),
            submissions: AtomicUsize::new(0),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, LedgerError> {
    mutex
        .lock()
        .map_err(|_| LedgerError::Unavailable("ledger state poisoned".to_string()))
}

/// A single-node ledger held in memory. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MemoryLedger {
    store: Arc<MemoryStore>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
        }
    }

    /// Credit native currency to `address` outside of any transaction.
    pub fn fund(&self, address: &Address, amount: u64) -> Result<(), LedgerError> {
        let mut state = lock(&self.store.state)?;
        state.account(address).balance += amount;
        Ok(())
    }

    /// Register an asset directly, crediting the full supply to `creator`.
    pub fn register_asset(
        &self,
        creator: &Address,
        params: AssetParams,
    ) -> Result<AssetId, LedgerError> {
        let mut state = lock(&self.store.state)?;
        let id = AssetId(state.next_asset_id);
        state.next_asset_id += 1;
        state.account(creator).holdings.insert(id, params.total);
        state.assets.insert(
            id,
            AssetRecord {
                creator: creator.clone(),
                params,
            },
        );
        Ok(id)
    }

    /// Set a holding record directly, opting the account in if needed.
    pub fn set_holding(
        &self,
        address: &Address,
        asset_id: AssetId,
        amount: u64,
    ) -> Result<(), LedgerError> {
        let mut state = lock(&self.store.state)?;
        state.account(address).holdings.insert(asset_id, amount);
        Ok(())
    }

    pub fn balance(&self, address: &Address) -> Result<u64, LedgerError> {
        let state = lock(&self.store.state)?;
        Ok(state.accounts.get(address).map_or(0, |a| a.balance))
    }

    /// `None` when the account is not opted in.
    pub fn asset_balance(
        &self,
        address: &Address,
        asset_id: AssetId,
    ) -> Result<Option<u64>, LedgerError> {
        let state = lock(&self.store.state)?;
        Ok(state
            .accounts
            .get(address)
            .and_then(|a| a.holdings.get(&asset_id).copied()))
    }

    pub fn asset_params(&self, asset_id: AssetId) -> Result<Option<AssetParams>, LedgerError> {
        let state = lock(&self.store.state)?;
        Ok(state.assets.get(&asset_id).map(|r| r.params.clone()))
    }

    /// Serve `document` verbatim for `address` instead of the rendered state.
    pub fn set_raw_snapshot(
        &self,
        address: &Address,
        document: serde_json::Value,
    ) -> Result<(), LedgerError> {
        lock(&self.store.raw_snapshots)?.insert(address.clone(), document);
        Ok(())
    }

    /// Make every snapshot read fail with `reason` (or succeed again with `None`).
    pub fn fail_reads(&self, reason: Option<&str>) -> Result<(), LedgerError> {
        *lock(&self.store.read_failure)? = reason.map(str::to_string);
        Ok(())
    }

    /// Make every submission fail with `reason` (or evaluate normally with `None`).
    pub fn reject_submissions(&self, reason: Option<&str>) -> Result<(), LedgerError> {
        *lock(&self.store.rejection)? = reason.map(str::to_string);
        Ok(())
    }

    pub fn snapshot_reads(&self) -> usize {
        self.store.snapshot_reads.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> usize {
        self.store.submissions.load(Ordering::SeqCst)
    }

    pub fn round(&self) -> Result<u64, LedgerError> {
        Ok(lock(&self.store.state)?.round)
    }

    fn check_group(transactions: &[SignedTransaction]) -> Result<(), String> {
        let requests: Vec<TransactionRequest> =
            transactions.iter().map(|t| t.request().clone()).collect();
        let expected = GroupId::derive(&requests);

        if transactions.len() > 1 {
            for tx in transactions {
                match tx.transaction.group {
                    Some(group) if group == expected => {}
                    Some(_) => return Err("incomplete group: group id mismatch".to_string()),
                    None => {
                        return Err(format!(
                            "transaction {} is not part of the submitted group",
                            tx.tx_id()
                        ));
                    }
                }
            }
        } else if let Some(group) = transactions[0].transaction.group {
            if group != expected {
                return Err("incomplete group: group id mismatch".to_string());
            }
        }
        Ok(())
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn account_snapshot(&self, address: &Address) -> Result<AccountSnapshot, LedgerError> {
        self.store.snapshot_reads.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = lock(&self.store.read_failure)?.clone() {
            return Err(LedgerError::Unavailable(reason));
        }
        if let Some(document) = lock(&self.store.raw_snapshots)?.get(address) {
            return Ok(AccountSnapshot(document.clone()));
        }

        let state = lock(&self.store.state)?;
        Ok(AccountSnapshot(state.render(address)))
    }

    async fn submit(&self, transactions: &[SignedTransaction]) -> Result<Vec<TxId>, LedgerError> {
        self.store.submissions.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = lock(&self.store.rejection)?.clone() {
            return Err(LedgerError::Rejected(reason));
        }
        if transactions.is_empty() {
            return Err(LedgerError::Rejected("empty submission".to_string()));
        }

        Self::check_group(transactions).map_err(LedgerError::Rejected)?;

        for tx in transactions {
            if &tx.signer != tx.request().sender() || tx.signature.is_empty() {
                return Err(LedgerError::Rejected(format!(
                    "transaction {} has an invalid signature for {}",
                    tx.tx_id(),
                    tx.request().sender()
                )));
            }
        }

        let mut state = lock(&self.store.state)?;
        let ids: Vec<TxId> = transactions.iter().map(SignedTransaction::tx_id).collect();
        let mut seen = HashSet::with_capacity(ids.len());
        for id in &ids {
            if state.confirmed.contains_key(id) || !seen.insert(id) {
                return Err(LedgerError::Rejected(format!(
                    "transaction already in ledger: {}",
                    id
                )));
            }
        }

        // Evaluate against a scratch copy; commit only if every member applies.
        let mut scratch = state.clone();
        let mut created = Vec::with_capacity(transactions.len());
        for (tx, id) in transactions.iter().zip(&ids) {
            let asset = scratch
                .apply(tx.request())
                .map_err(|reason| LedgerError::Rejected(format!("transaction {}: {}", id, reason)))?;
            created.push(asset);
        }

        scratch.round += 1;
        let round = scratch.round;
        let now = Utc::now();
        for (id, asset_id) in ids.iter().zip(created) {
            scratch.confirmed.insert(
                id.clone(),
                Confirmation {
                    tx_id: id.clone(),
                    confirmed_round: round,
                    asset_id,
                    confirmed_at: now,
                },
            );
        }
        *state = scratch;

        Ok(ids)
    }

    async fn wait_for_confirmation(
        &self,
        tx_id: &TxId,
        max_rounds: u64,
    ) -> Result<Confirmation, LedgerError> {
        let state = lock(&self.store.state)?;
        state.confirmed.get(tx_id).cloned().ok_or_else(|| {
            LedgerError::Unavailable(format!(
                "transaction {} not confirmed after {} rounds",
                tx_id, max_rounds
            ))
        })
    }
}

/// Signer holding authority for a fixed set of addresses.
///
/// Signatures are keyed digests, not real curve signatures.
pub struct MemorySigner {
    accounts: HashSet<Address>,
    denial: Mutex<Option<String>>,
    signed: AtomicUsize,
}

impl MemorySigner {
    pub fn new<I: IntoIterator<Item = Address>>(accounts: I) -> Self {
        Self {
            accounts: accounts.into_iter().collect(),
            denial: Mutex::new(None),
            signed: AtomicUsize::new(0),
        }
    }

    /// Refuse every request with `reason`, as a user declining in the wallet would.
    pub fn deny(&self, reason: Option<&str>) {
        if let Ok(mut denial) = self.denial.lock() {
            *denial = reason.map(str::to_string);
        }
    }

    pub fn signed(&self) -> usize {
        self.signed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionSigner for MemorySigner {
    fn can_sign(&self, address: &Address) -> bool {
        self.accounts.contains(address)
    }

    async fn sign(
        &self,
        transaction: &UnsignedTransaction,
    ) -> Result<SignedTransaction, SignerError> {
        let sender = transaction.sender();
        if !self.can_sign(sender) {
            return Err(SignerError::Unavailable(format!("no key for {}", sender)));
        }
        let denial = self
            .denial
            .lock()
            .map_err(|_| SignerError::Unavailable("signer state poisoned".to_string()))?
            .clone();
        if let Some(reason) = denial {
            return Err(SignerError::Denied(reason));
        }

        let signature =
            blake3::keyed_hash(&sender.public_key(), &transaction.bytes_to_sign());
        self.signed.fetch_add(1, Ordering::SeqCst);

        Ok(SignedTransaction {
            transaction: transaction.clone(),
            signer: sender.clone(),
            signature: signature.as_bytes().to_vec(),
        })
    }
}

/// Pinner that keeps content in memory and returns `ipfs://` style URLs.
#[derive(Default)]
pub struct MemoryPinner {
    pinned: Mutex<HashMap<String, Vec<u8>>>,
    failure: Mutex<Option<String>>,
}

impl MemoryPinner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, reason: Option<&str>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = reason.map(str::to_string);
        }
    }

    pub fn content(&self, url: &str) -> Option<Vec<u8>> {
        self.pinned.lock().ok()?.get(url).cloned()
    }
}

#[async_trait]
impl ContentPinner for MemoryPinner {
    async fn pin(&self, file_name: &str, content: &[u8]) -> Result<String, PinError> {
        if let Some(reason) = self
            .failure
            .lock()
            .map_err(|_| PinError("pinner state poisoned".to_string()))?
            .clone()
        {
            return Err(PinError(reason));
        }
        if content.is_empty() {
            return Err(PinError(format!("{} is empty", file_name)));
        }

        let url = format!("ipfs://{}", blake3::hash(content).to_hex());
        self.pinned
            .lock()
            .map_err(|_| PinError("pinner state poisoned".to_string()))?
            .insert(url.clone(), content.to_vec());
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{AtomicGroupBuilder, TransactionGroup};
    use crate::transaction::{build_asset_opt_in, build_asset_transfer, build_payment};

    fn addr(seed: u8) -> Address {
        Address::from_public_key(&[seed; 32])
    }

    async fn sign_all(signer: &MemorySigner, group: &TransactionGroup) -> Vec<SignedTransaction> {
        let mut out = Vec::new();
        for tx in group.unsigned_transactions() {
            out.push(signer.sign(&tx).await.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_payment_moves_balance_and_charges_fee() {
        let ledger = MemoryLedger::new();
        let (alice, bob) = (addr(1), addr(2));
        ledger.fund(&alice, 10_000_000).unwrap();
        let signer = MemorySigner::new([alice.clone()]);

        let group = TransactionGroup::single(build_payment(&alice, &bob, 1_000_000u64).unwrap());
        let signed = sign_all(&signer, &group).await;
        let ids = ledger.submit(&signed).await.unwrap();

        assert_eq!(ids.len(), 1);
        assert_eq!(ledger.balance(&alice).unwrap(), 10_000_000 - 1_000_000 - MIN_FEE);
        assert_eq!(ledger.balance(&bob).unwrap(), 1_000_000);

        let confirmation = ledger.wait_for_confirmation(&ids[0], 4).await.unwrap();
        assert_eq!(confirmation.confirmed_round, 2);
    }

    #[tokio::test]
    async fn test_failed_group_leaves_state_untouched() {
        let ledger = MemoryLedger::new();
        let (alice, bob) = (addr(1), addr(2));
        ledger.fund(&alice, 10_000_000).unwrap();
        let asset = ledger
            .register_asset(&alice, AssetParams::fungible("Token", "TKN", "100", 0).unwrap())
            .unwrap();
        let signer = MemorySigner::new([alice.clone()]);

        let group = AtomicGroupBuilder::new()
            .with_member(build_payment(&alice, &bob, 1_000_000u64).unwrap())
            .with_member(build_asset_transfer(&alice, &bob, asset, 10u64).unwrap())
            .seal()
            .unwrap();
        let signed = sign_all(&signer, &group).await;

        let err = ledger.submit(&signed).await.unwrap_err();
        assert!(err.reason().contains("not opted in"));
        assert_eq!(ledger.balance(&alice).unwrap(), 10_000_000);
        assert_eq!(ledger.balance(&bob).unwrap(), 0);
        assert_eq!(ledger.asset_balance(&alice, asset).unwrap(), Some(100));
    }

    #[tokio::test]
    async fn test_partial_group_rejected() {
        let ledger = MemoryLedger::new();
        let alice = addr(1);
        ledger.fund(&alice, 10_000_000).unwrap();
        let signer = MemorySigner::new([alice.clone()]);

        let group = AtomicGroupBuilder::new()
            .with_member(build_payment(&alice, addr(2), 1u64).unwrap())
            .with_member(build_payment(&alice, addr(3), 1u64).unwrap())
            .seal()
            .unwrap();
        let signed = sign_all(&signer, &group).await;

        let err = ledger.submit(&signed[..1]).await.unwrap_err();
        assert!(err.reason().contains("group"));
    }

    #[tokio::test]
    async fn test_replay_rejected() {
        let ledger = MemoryLedger::new();
        let alice = addr(1);
        ledger.fund(&alice, 10_000_000).unwrap();
        let signer = MemorySigner::new([alice.clone()]);

        let group = TransactionGroup::single(build_payment(&alice, addr(2), 1u64).unwrap());
        let signed = sign_all(&signer, &group).await;
        ledger.submit(&signed).await.unwrap();

        let err = ledger.submit(&signed).await.unwrap_err();
        assert!(err.reason().contains("already in ledger"));
    }

    #[tokio::test]
    async fn test_repeated_member_rejected() {
        let ledger = MemoryLedger::new();
        let (alice, bob) = (addr(1), addr(2));
        ledger.fund(&alice, 10_000_000).unwrap();
        let signer = MemorySigner::new([alice.clone()]);

        let payment = build_payment(&alice, &bob, 1_000_000u64).unwrap();
        let group = AtomicGroupBuilder::new()
            .with_member(payment.clone())
            .with_member(payment)
            .seal()
            .unwrap();
        let signed = sign_all(&signer, &group).await;
        assert_eq!(signed[0].tx_id(), signed[1].tx_id());

        let err = ledger.submit(&signed).await.unwrap_err();
        assert!(err.reason().contains("already in ledger"));
        assert_eq!(ledger.balance(&alice).unwrap(), 10_000_000);
        assert_eq!(ledger.balance(&bob).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_opt_in_renders_holding() {
        let ledger = MemoryLedger::new();
        let (alice, bob) = (addr(1), addr(2));
        ledger.fund(&bob, 1_000_000).unwrap();
        let asset = ledger
            .register_asset(&alice, AssetParams::unique("Ticket", "MTK"))
            .unwrap();
        let signer = MemorySigner::new([bob.clone()]);

        let group = TransactionGroup::single(build_asset_opt_in(&bob, asset).unwrap());
        ledger.submit(&sign_all(&signer, &group).await).await.unwrap();

        let snapshot = ledger.account_snapshot(&bob).await.unwrap();
        assert_eq!(snapshot.holdings()[0]["asset-id"], asset.0);
        assert_eq!(ledger.snapshot_reads(), 1);
    }

    #[tokio::test]
    async fn test_signer_refuses_unknown_sender() {
        let signer = MemorySigner::new([addr(1)]);
        let tx = UnsignedTransaction::new(build_payment(addr(2), addr(1), 1u64).unwrap(), None);
        assert!(matches!(
            signer.sign(&tx).await,
            Err(SignerError::Unavailable(_))
        ));

        signer.deny(Some("user rejected"));
        let tx = UnsignedTransaction::new(build_payment(addr(1), addr(2), 1u64).unwrap(), None);
        assert!(matches!(signer.sign(&tx).await, Err(SignerError::Denied(_))));
        assert_eq!(signer.signed(), 0);
    }

    #[tokio::test]
    async fn test_pinner_returns_url() {
        let pinner = MemoryPinner::new();
        let url = pinner.pin("ticket.png", b"png-bytes").await.unwrap();
        assert!(url.starts_with("ipfs://"));
        assert_eq!(pinner.content(&url).unwrap(), b"png-bytes".to_vec());

        pinner.fail_with(Some("backend down"));
        assert!(pinner.pin("ticket.png", b"png-bytes").await.is_err());
    }
}
