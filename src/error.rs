use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::asset::AssetId;

/// Errors raised anywhere between intent validation and confirmation.
///
/// Validation errors (`InvalidAddress`, `InvalidAmount`, `EmptyGroup`,
/// `GroupTooLarge`) are detected before any network call and are fixed by
/// correcting the input. `ReceiverNotOptedIn` comes from a ledger read made
/// before signing. The remaining variants come from the ledger client, the
/// signer or the pinning service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Cannot seal an empty transaction group")]
    EmptyGroup,
    #[error("Transaction group too large: {size} members (max {max})")]
    GroupTooLarge { size: usize, max: usize },
    #[error("Receiver {address} is not opted in to asset {asset}")]
    ReceiverNotOptedIn { address: String, asset: AssetId },
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),
    #[error("Signer unavailable: {0}")]
    SignerUnavailable(String),
    #[error("Signer denied the request: {0}")]
    SignerDenied(String),
    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),
    #[error("Content pinning failed: {0}")]
    PinningFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidAddress(_) => FailureKind::InvalidAddress,
            Self::InvalidAmount(_) => FailureKind::InvalidAmount,
            Self::EmptyGroup => FailureKind::EmptyGroup,
            Self::GroupTooLarge { .. } => FailureKind::GroupTooLarge,
            Self::ReceiverNotOptedIn { .. } => FailureKind::ReceiverNotOptedIn,
            Self::LedgerUnavailable(_) => FailureKind::LedgerUnavailable,
            Self::SignerUnavailable(_) => FailureKind::SignerUnavailable,
            Self::SignerDenied(_) => FailureKind::SignerDenied,
            Self::SubmissionRejected(_) => FailureKind::SubmissionRejected,
            Self::PinningFailed(_) => FailureKind::PinningFailed,
            Self::Config(_) => FailureKind::Config,
        }
    }

    /// True for errors raised locally, before any network call was made.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress(_)
                | Self::InvalidAmount(_)
                | Self::EmptyGroup
                | Self::GroupTooLarge { .. }
                | Self::Config(_)
        )
    }
}

/// Flat discriminant of [`Error`], exposed to callers that render outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    InvalidAddress,
    InvalidAmount,
    EmptyGroup,
    GroupTooLarge,
    ReceiverNotOptedIn,
    LedgerUnavailable,
    SignerUnavailable,
    SignerDenied,
    SubmissionRejected,
    PinningFailed,
    Config,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidAddress => "InvalidAddress",
            Self::InvalidAmount => "InvalidAmount",
            Self::EmptyGroup => "EmptyGroup",
            Self::GroupTooLarge => "GroupTooLarge",
            Self::ReceiverNotOptedIn => "ReceiverNotOptedIn",
            Self::LedgerUnavailable => "LedgerUnavailable",
            Self::SignerUnavailable => "SignerUnavailable",
            Self::SignerDenied => "SignerDenied",
            Self::SubmissionRejected => "SubmissionRejected",
            Self::PinningFailed => "PinningFailed",
            Self::Config => "Config",
        };
        write!(f, "{}", name)
    }
}

/// Failure reported by a [`LedgerClient`](crate::adapters::LedgerClient).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Transport failure or timeout; the request may be retried.
    #[error("{0}")]
    Unavailable(String),
    /// The ledger evaluated the request and refused it.
    #[error("{0}")]
    Rejected(String),
}

impl LedgerError {
    pub fn reason(&self) -> &str {
        match self {
            Self::Unavailable(reason) | Self::Rejected(reason) => reason,
        }
    }
}

/// Failure reported by a [`TransactionSigner`](crate::adapters::TransactionSigner).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    #[error("signer unavailable: {0}")]
    Unavailable(String),
    #[error("signing denied: {0}")]
    Denied(String),
}

impl From<SignerError> for Error {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::Unavailable(msg) => Error::SignerUnavailable(msg),
            SignerError::Denied(msg) => Error::SignerDenied(msg),
        }
    }
}

/// Failure reported by a [`ContentPinner`](crate::adapters::ContentPinner).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PinError(pub String);

impl From<PinError> for Error {
    fn from(err: PinError) -> Self {
        Error::PinningFailed(err.0)
    }
}
