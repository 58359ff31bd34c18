//! Sign, submit and confirm sealed groups.

use crate::adapters::{LedgerClient, TransactionSigner};
use crate::address::Address;
use crate::asset::AssetId;
use crate::error::{Error, FailureKind};
use crate::group::{GroupId, TransactionGroup};
use crate::transaction::{SignedTransaction, TransactionRequest, TxId};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A group accepted into a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Transaction ids in member order.
    pub tx_ids: Vec<TxId>,
    /// Set only for atomic groups.
    pub group_id: Option<GroupId>,
    pub confirmed_round: u64,
    /// Asset created by the group, if any.
    pub asset_id: Option<AssetId>,
}

impl Submission {
    pub fn first_tx_id(&self) -> Option<&TxId> {
        self.tx_ids.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&Error> for FailureReason {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Terminal result of one orchestrated action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Success(Submission),
    Failure(FailureReason),
}

impl SubmissionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn tx_ids(&self) -> &[TxId] {
        match self {
            Self::Success(submission) => &submission.tx_ids,
            Self::Failure(_) => &[],
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Self::Success(_) => None,
            Self::Failure(reason) => Some(reason),
        }
    }
}

impl From<Result<Submission, Error>> for SubmissionOutcome {
    fn from(result: Result<Submission, Error>) -> Self {
        match result {
            Ok(submission) => Self::Success(submission),
            Err(err) => Self::Failure(FailureReason::from(&err)),
        }
    }
}

/// Signs each member through the injected signer, submits the signed set
/// as one request and waits for every member to confirm.
///
/// The pipeline never retries. A failed group must be rebuilt by the caller.
#[derive(Clone)]
pub struct SubmissionPipeline {
    ledger: Arc<dyn LedgerClient>,
    signer: Option<Arc<dyn TransactionSigner>>,
    confirmation_rounds: u64,
}

impl SubmissionPipeline {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        signer: Option<Arc<dyn TransactionSigner>>,
        confirmation_rounds: u64,
    ) -> Self {
        Self {
            ledger,
            signer,
            confirmation_rounds,
        }
    }

    /// Submit a single request as a group of one.
    pub async fn submit_one(&self, request: TransactionRequest) -> Result<Submission, Error> {
        self.submit(&TransactionGroup::single(request)).await
    }

    pub async fn submit(&self, group: &TransactionGroup) -> Result<Submission, Error> {
        let start = Instant::now();
        histogram!("algoflow.group.size").record(group.len() as f64);

        let result = self.run(group).await;

        histogram!("algoflow.submission.duration_ms")
            .record(start.elapsed().as_millis() as f64);
        counter!("algoflow.submissions.total",
            "status" => if result.is_ok() { "success" } else { "failed" }
        )
        .increment(1);

        match &result {
            Ok(submission) => info!(
                group = %group.id(),
                members = group.len(),
                round = submission.confirmed_round,
                "group confirmed"
            ),
            Err(e) => warn!(group = %group.id(), kind = %e.kind(), error = %e, "submission failed"),
        }
        result
    }

    async fn run(&self, group: &TransactionGroup) -> Result<Submission, Error> {
        let signed = self.sign_all(group).await?;

        let tx_ids = self
            .ledger
            .submit(&signed)
            .await
            .map_err(|e| Error::SubmissionRejected(e.reason().to_string()))?;
        debug!(group = %group.id(), count = tx_ids.len(), "group submitted");

        let mut confirmed_round = 0;
        let mut asset_id = None;
        for tx_id in &tx_ids {
            let confirmation = self
                .ledger
                .wait_for_confirmation(tx_id, self.confirmation_rounds)
                .await
                .map_err(|e| Error::SubmissionRejected(e.reason().to_string()))?;
            confirmed_round = confirmed_round.max(confirmation.confirmed_round);
            asset_id = asset_id.or(confirmation.asset_id);
        }

        Ok(Submission {
            tx_ids,
            group_id: group.group_field(),
            confirmed_round,
            asset_id,
        })
    }

    /// Fail with [`Error::SignerUnavailable`] unless a signer is attached
    /// and holds authority for every one of `senders`. Makes no network call.
    pub fn ensure_signer<'a, I>(&self, senders: I) -> Result<&Arc<dyn TransactionSigner>, Error>
    where
        I: IntoIterator<Item = &'a Address>,
    {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| Error::SignerUnavailable("no signer connected".to_string()))?;

        if let Some(sender) = senders.into_iter().find(|sender| !signer.can_sign(sender)) {
            return Err(Error::SignerUnavailable(format!("no key for {}", sender)));
        }
        Ok(signer)
    }

    /// Every sender is checked before the first signature is requested.
    async fn sign_all(&self, group: &TransactionGroup) -> Result<Vec<SignedTransaction>, Error> {
        let signer = self.ensure_signer(group.members().iter().map(TransactionRequest::sender))?;

        let mut signed = Vec::with_capacity(group.len());
        for unsigned in group.unsigned_transactions() {
            signed.push(signer.sign(&unsigned).await?);
        }
        Ok(signed)
    }
}
