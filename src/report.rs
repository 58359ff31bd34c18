//! Outcome formatting for the calling UI.

use crate::error::FailureKind;
use crate::submission::SubmissionOutcome;
use crate::transaction::TxId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Success,
    Failure,
}

/// User-facing rendering of a [`SubmissionOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub status: ReportStatus,
    pub message: String,
    /// First transaction id, on success.
    pub reference: Option<String>,
    pub explorer_url: Option<String>,
    /// Link to the created asset, when the outcome created one.
    pub asset_url: Option<String>,
}

/// Wire form of an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OutcomeSurface {
    Success {
        #[serde(rename = "txIds")]
        tx_ids: Vec<TxId>,
    },
    Failure {
        kind: FailureKind,
        message: String,
    },
}

impl From<&SubmissionOutcome> for OutcomeSurface {
    fn from(outcome: &SubmissionOutcome) -> Self {
        match outcome {
            SubmissionOutcome::Success(submission) => Self::Success {
                tx_ids: submission.tx_ids.clone(),
            },
            SubmissionOutcome::Failure(reason) => Self::Failure {
                kind: reason.kind,
                message: reason.message.clone(),
            },
        }
    }
}

/// Stateless formatter. Links are built from a fixed explorer base URL.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    explorer_base: Option<String>,
}

impl Reporter {
    pub fn new(explorer_base: impl Into<String>) -> Self {
        let base = explorer_base.into();
        let base = base.trim_end_matches('/');
        Self {
            explorer_base: (!base.is_empty()).then(|| base.to_string()),
        }
    }

    /// A reporter that never produces links.
    pub fn without_links() -> Self {
        Self::default()
    }

    pub fn transaction_url(&self, tx_id: &TxId) -> Option<String> {
        self.explorer_base
            .as_ref()
            .map(|base| format!("{}/transaction/{}", base, tx_id))
    }

    pub fn report(&self, outcome: &SubmissionOutcome) -> Report {
        match outcome {
            SubmissionOutcome::Success(submission) => {
                let reference = submission.first_tx_id();
                let message = match (submission.asset_id, submission.tx_ids.len()) {
                    (Some(asset), _) => format!("Asset {} created", asset),
                    (None, 1) => "Transaction confirmed".to_string(),
                    (None, n) => format!("Atomic group of {} transactions confirmed", n),
                };
                Report {
                    status: ReportStatus::Success,
                    message,
                    reference: reference.map(ToString::to_string),
                    explorer_url: reference.and_then(|id| self.transaction_url(id)),
                    asset_url: submission.asset_id.and_then(|asset| {
                        self.explorer_base
                            .as_ref()
                            .map(|base| format!("{}/asset/{}", base, asset))
                    }),
                }
            }
            SubmissionOutcome::Failure(reason) => Report {
                status: ReportStatus::Failure,
                message: reason.message.clone(),
                reference: None,
                explorer_url: None,
                asset_url: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetId;
    use crate::error::Error;
    use crate::submission::{FailureReason, Submission};

    fn success(tx_ids: &[&str], asset_id: Option<AssetId>) -> SubmissionOutcome {
        SubmissionOutcome::Success(Submission {
            tx_ids: tx_ids.iter().map(|id| TxId(id.to_string())).collect(),
            group_id: None,
            confirmed_round: 7,
            asset_id,
        })
    }

    #[test]
    fn test_success_links_first_transaction() {
        let reporter = Reporter::new("https://lora.algokit.io/testnet/");
        let report = reporter.report(&success(&["AAA", "BBB"], None));

        assert_eq!(report.status, ReportStatus::Success);
        assert_eq!(report.reference.as_deref(), Some("AAA"));
        assert_eq!(
            report.explorer_url.as_deref(),
            Some("https://lora.algokit.io/testnet/transaction/AAA")
        );
        assert!(report.message.contains("2 transactions"));
        assert!(report.asset_url.is_none());
    }

    #[test]
    fn test_asset_creation_links_asset() {
        let reporter = Reporter::new("https://lora.algokit.io/testnet");
        let report = reporter.report(&success(&["AAA"], Some(AssetId(1001))));
        assert_eq!(
            report.asset_url.as_deref(),
            Some("https://lora.algokit.io/testnet/asset/1001")
        );
        assert_eq!(report.message, "Asset 1001 created");
    }

    #[test]
    fn test_failure_has_no_links() {
        let err = Error::SubmissionRejected("receiver not opted in".into());
        let outcome = SubmissionOutcome::Failure(FailureReason::from(&err));
        let report = Reporter::new("https://x").report(&outcome);

        assert_eq!(report.status, ReportStatus::Failure);
        assert!(report.message.contains("not opted in"));
        assert!(report.reference.is_none());
        assert!(report.explorer_url.is_none());
    }

    #[test]
    fn test_without_links() {
        let report = Reporter::without_links().report(&success(&["AAA"], None));
        assert_eq!(report.reference.as_deref(), Some("AAA"));
        assert!(report.explorer_url.is_none());
    }

    #[test]
    fn test_surface_json() {
        let json = serde_json::to_value(OutcomeSurface::from(&success(&["AAA", "BBB"], None))).unwrap();
        assert_eq!(json, serde_json::json!({"status": "success", "txIds": ["AAA", "BBB"]}));

        let err = Error::SubmissionRejected("receiver not opted in".into());
        let outcome = SubmissionOutcome::Failure(FailureReason::from(&err));
        let json = serde_json::to_value(OutcomeSurface::from(&outcome)).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["kind"], "SubmissionRejected");
        assert!(json["message"].as_str().unwrap().contains("not opted in"));
    }
}
