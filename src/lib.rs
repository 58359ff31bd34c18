//! Transaction orchestration for an account-based ledger.
//!
//! A user intent flows through five stages: validation ([`address`],
//! [`amount`]), precondition reads ([`precondition`]), request and group
//! construction ([`transaction`], [`group`]), signing and submission
//! ([`submission`]) and outcome formatting ([`report`]). [`Orchestrator`]
//! wires them together for the common intents.
//!
//! The ledger, the wallet and the content store are reached only through the
//! traits in [`adapters`]; an in-memory implementation of each ships behind
//! the `memory` feature.

pub mod adapters;
pub mod address;
pub mod amount;
pub mod asset;
pub mod config;
pub mod error;
pub mod group;
pub mod precondition;
pub mod report;
pub mod submission;
pub mod transaction;

pub use adapters::{AccountSnapshot, Confirmation, ContentPinner, LedgerClient, TransactionSigner};
pub use address::{Address, validate_address};
pub use amount::{from_base_units, to_base_units};
pub use asset::{Asset, AssetId, AssetParams};
pub use config::{Network, NetworkConfig};
pub use error::{Error, FailureKind};
pub use group::{AtomicGroupBuilder, GroupId, TransactionGroup};
pub use precondition::PreconditionChecker;
pub use report::{OutcomeSurface, Report, Reporter};
pub use submission::{FailureReason, Submission, SubmissionOutcome, SubmissionPipeline};
pub use transaction::{
    SignedTransaction, TransactionRequest, TxId, UnsignedTransaction, build_asset_create,
    build_asset_opt_in, build_asset_transfer, build_payment,
};

use std::sync::Arc;
use tracing::{info, warn};

/// Result of an opt-in intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptInResult {
    /// The account already held the asset; nothing was submitted.
    AlreadyOptedIn,
    Submitted(SubmissionOutcome),
}

/// Entry point for user intents.
///
/// Errors found before submission (bad input, missing opt-in, unreadable
/// ledger, failed pinning) are returned as `Err`. Signer problems and
/// anything that happens from submission onwards are folded into the
/// returned [`SubmissionOutcome`]; the signer is always checked before any
/// ledger read.
#[derive(Clone)]
pub struct Orchestrator {
    ledger: Arc<dyn LedgerClient>,
    signer: Option<Arc<dyn TransactionSigner>>,
    config: NetworkConfig,
}

impl Orchestrator {
    pub fn new(ledger: Arc<dyn LedgerClient>, config: NetworkConfig) -> Self {
        Self {
            ledger,
            signer: None,
            config,
        }
    }

    /// Attach the wallet used to sign every submission.
    pub fn with_signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Get ledger client reference
    pub fn ledger(&self) -> &dyn LedgerClient {
        self.ledger.as_ref()
    }

    pub fn checker(&self) -> PreconditionChecker {
        PreconditionChecker::new(Arc::clone(&self.ledger))
    }

    pub fn pipeline(&self) -> SubmissionPipeline {
        SubmissionPipeline::new(
            Arc::clone(&self.ledger),
            self.signer.clone(),
            self.config.confirmation_rounds,
        )
    }

    pub fn reporter(&self) -> Reporter {
        Reporter::new(self.config.explorer_base_url.as_str())
    }

    /// Empty group builder bounded by the configured group size.
    pub fn group_builder(&self) -> AtomicGroupBuilder {
        AtomicGroupBuilder::with_max_size(self.config.max_group_size)
    }

    /// Submit an already sealed group.
    pub async fn submit_group(&self, group: &TransactionGroup) -> SubmissionOutcome {
        self.pipeline().submit(group).await.into()
    }

    async fn submit_one(&self, request: TransactionRequest) -> SubmissionOutcome {
        self.pipeline().submit_one(request).await.into()
    }

    /// Pay `human_amount` of the native currency.
    pub async fn send_payment(
        &self,
        sender: &str,
        receiver: &str,
        human_amount: &str,
    ) -> Result<SubmissionOutcome, Error> {
        let amount = Asset::native().to_base_units(human_amount)?;
        let request = build_payment(sender, receiver, amount)?;
        info!(%sender, %receiver, amount, "sending payment");
        Ok(self.submit_one(request).await)
    }

    /// Transfer `human_amount` of `asset`. The receiver's opt-in is left to
    /// the ledger; a missing one comes back as a rejected submission.
    pub async fn send_asset(
        &self,
        sender: &str,
        receiver: &str,
        asset: &Asset,
        human_amount: &str,
    ) -> Result<SubmissionOutcome, Error> {
        let amount = asset.to_base_units(human_amount)?;
        let request = build_asset_transfer(sender, receiver, asset.id, amount)?;
        info!(%sender, %receiver, asset = %asset.id, amount, "sending asset");
        Ok(self.submit_one(request).await)
    }

    /// Failed outcome when the attached signer cannot act for `sender`.
    /// Checked ahead of any precondition read.
    fn signer_failure(&self, sender: &Address) -> Option<SubmissionOutcome> {
        let err = self.pipeline().ensure_signer([sender]).err()?;
        warn!(%sender, error = %err, "signer check failed");
        Some(SubmissionOutcome::Failure(FailureReason::from(&err)))
    }

    /// Opt `sender` in to `asset_id` unless it already holds it.
    ///
    /// A missing signer yields a failed outcome without reading the ledger.
    pub async fn opt_in(&self, sender: &str, asset_id: AssetId) -> Result<OptInResult, Error> {
        let request = build_asset_opt_in(sender, asset_id)?;
        if let Some(failure) = self.signer_failure(request.sender()) {
            return Ok(OptInResult::Submitted(failure));
        }
        if self.checker().is_opted_in(request.sender(), asset_id).await? {
            info!(%sender, asset = %asset_id, "already opted in");
            return Ok(OptInResult::AlreadyOptedIn);
        }

        info!(%sender, asset = %asset_id, "opting in");
        Ok(OptInResult::Submitted(self.submit_one(request).await))
    }

    /// One payment and one asset transfer to the same receiver, all or nothing.
    pub async fn atomic_bundle(
        &self,
        sender: &str,
        receiver: &str,
        native_amount: &str,
        asset: &Asset,
        asset_amount: &str,
    ) -> Result<SubmissionOutcome, Error> {
        let payment = build_payment(
            sender,
            receiver,
            Asset::native().to_base_units(native_amount)?,
        )?;
        let transfer = build_asset_transfer(
            sender,
            receiver,
            asset.id,
            asset.to_base_units(asset_amount)?,
        )?;

        if let Some(failure) = self.signer_failure(payment.sender()) {
            return Ok(failure);
        }

        let receiver = validate_address(receiver)?;
        self.checker().require_opted_in(&receiver, asset.id).await?;

        let group = self
            .group_builder()
            .with_member(payment)
            .with_member(transfer)
            .seal()?;
        info!(%sender, %receiver, group = %group.id(), "submitting atomic bundle");
        Ok(self.submit_group(&group).await)
    }

    /// Create a fungible token whose whole supply goes to `sender`.
    pub async fn create_token(
        &self,
        sender: &str,
        name: &str,
        unit_name: &str,
        human_total: &str,
        decimals: u8,
    ) -> Result<SubmissionOutcome, Error> {
        let params = AssetParams::fungible(name, unit_name, human_total, decimals)?;
        let request = build_asset_create(sender, params)?;
        info!(%sender, %name, %unit_name, decimals, "creating token");
        Ok(self.submit_one(request).await)
    }

    /// Pin `content` and create a unique asset anchored to it.
    pub async fn mint_nft(
        &self,
        sender: &str,
        name: &str,
        unit_name: &str,
        content: &[u8],
        pinner: &dyn ContentPinner,
    ) -> Result<SubmissionOutcome, Error> {
        let creator = validate_address(sender)?;
        let params = AssetParams::unique(name, unit_name);
        params.validate()?;
        if let Some(failure) = self.signer_failure(&creator) {
            return Ok(failure);
        }

        let url = pinner.pin(name, content).await?;
        info!(%sender, %name, %url, "content pinned");

        let request = build_asset_create(sender, params.with_content_url(&url))?;
        Ok(self.submit_one(request).await)
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryLedger, MemorySigner};

    fn addr(seed: u8) -> Address {
        Address::from_public_key(&[seed; 32])
    }

    #[test]
    fn test_group_builder_uses_config() {
        let config = NetworkConfig {
            max_group_size: 2,
            ..NetworkConfig::default()
        };
        let orchestrator = Orchestrator::new(Arc::new(MemoryLedger::new()), config);

        let mut builder = orchestrator.group_builder();
        for i in 0..3u64 {
            builder.add_member(build_payment(addr(1), addr(2), i).unwrap());
        }
        assert_eq!(
            builder.seal(),
            Err(Error::GroupTooLarge { size: 3, max: 2 })
        );
    }

    #[tokio::test]
    async fn test_invalid_input_is_an_error_not_an_outcome() {
        let ledger = MemoryLedger::new();
        let orchestrator = Orchestrator::new(Arc::new(ledger.clone()), NetworkConfig::default())
            .with_signer(Arc::new(MemorySigner::new([addr(1)])));

        let err = orchestrator
            .send_payment(addr(1).as_str(), addr(2).as_str(), "1.5")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));

        let err = orchestrator
            .send_payment("NOT-AN-ADDRESS", addr(2).as_str(), "1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(_)));
        assert_eq!(ledger.submissions(), 0);
    }
}
