use crate::address::{Address, validate_address};
use crate::amount;
use crate::asset::{AssetId, AssetParams};
use crate::error::Error;
use crate::group::GroupId;
use data_encoding::BASE32_NOPAD;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512_256};
use std::fmt;

const TX_DOMAIN: &[u8] = b"TX";

/// An unsigned request for a single ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionRequest {
    Payment {
        sender: Address,
        receiver: Address,
        amount: u64,
    },
    AssetTransfer {
        sender: Address,
        receiver: Address,
        asset_id: AssetId,
        amount: u64,
    },
    AssetOptIn {
        sender: Address,
        asset_id: AssetId,
    },
    AssetCreate {
        sender: Address,
        params: AssetParams,
    },
}

impl TransactionRequest {
    pub fn sender(&self) -> &Address {
        match self {
            Self::Payment { sender, .. }
            | Self::AssetTransfer { sender, .. }
            | Self::AssetOptIn { sender, .. }
            | Self::AssetCreate { sender, .. } => sender,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Payment { .. } => "payment",
            Self::AssetTransfer { .. } => "asset_transfer",
            Self::AssetOptIn { .. } => "asset_opt_in",
            Self::AssetCreate { .. } => "asset_create",
        }
    }

    /// Deterministic byte encoding used for identities and signing.
    pub fn encode_canonical(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        match self {
            Self::Payment {
                sender,
                receiver,
                amount,
            } => {
                out.push(1);
                put_str(&mut out, sender.as_str());
                put_str(&mut out, receiver.as_str());
                out.extend_from_slice(&amount.to_be_bytes());
            }
            Self::AssetTransfer {
                sender,
                receiver,
                asset_id,
                amount,
            } => {
                out.push(2);
                put_str(&mut out, sender.as_str());
                put_str(&mut out, receiver.as_str());
                out.extend_from_slice(&asset_id.0.to_be_bytes());
                out.extend_from_slice(&amount.to_be_bytes());
            }
            Self::AssetOptIn { sender, asset_id } => {
                out.push(3);
                put_str(&mut out, sender.as_str());
                out.extend_from_slice(&asset_id.0.to_be_bytes());
            }
            Self::AssetCreate { sender, params } => {
                out.push(4);
                put_str(&mut out, sender.as_str());
                put_str(&mut out, &params.name);
                put_str(&mut out, &params.unit_name);
                out.extend_from_slice(&params.total.to_be_bytes());
                out.push(params.decimals);
                out.push(params.default_frozen as u8);
                put_str(&mut out, params.url.as_deref().unwrap_or(""));
                match &params.content_hash {
                    Some(hash) => {
                        out.push(1);
                        out.extend_from_slice(hash);
                    }
                    None => out.push(0),
                }
            }
        }
        out
    }
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn address(s: impl AsRef<str>) -> Result<Address, Error> {
    validate_address(s.as_ref())
}

fn amount_u64(amount: impl Into<BigUint>) -> Result<u64, Error> {
    amount::base_units_u64(&amount.into())
}

/// Native-currency payment from `sender` to `receiver`.
pub fn build_payment(
    sender: impl AsRef<str>,
    receiver: impl AsRef<str>,
    amount: impl Into<BigUint>,
) -> Result<TransactionRequest, Error> {
    Ok(TransactionRequest::Payment {
        sender: address(sender)?,
        receiver: address(receiver)?,
        amount: amount_u64(amount)?,
    })
}

/// Asset transfer. The receiver's opt-in is not checked here.
pub fn build_asset_transfer(
    sender: impl AsRef<str>,
    receiver: impl AsRef<str>,
    asset_id: impl Into<AssetId>,
    amount: impl Into<BigUint>,
) -> Result<TransactionRequest, Error> {
    let sender = address(sender)?;
    let receiver = address(receiver)?;
    let asset_id = asset_id.into();
    if asset_id.is_native() {
        return Err(Error::InvalidAmount(
            "asset id 0 is the native currency, use a payment".to_string(),
        ));
    }
    Ok(TransactionRequest::AssetTransfer {
        sender,
        receiver,
        asset_id,
        amount: amount_u64(amount)?,
    })
}

/// Opt `sender` in to `asset_id`: a zero-amount transfer to itself.
pub fn build_asset_opt_in(
    sender: impl AsRef<str>,
    asset_id: impl Into<AssetId>,
) -> Result<TransactionRequest, Error> {
    let asset_id = asset_id.into();
    if asset_id.is_native() {
        return Err(Error::InvalidAmount(
            "the native currency needs no opt-in".to_string(),
        ));
    }
    Ok(TransactionRequest::AssetOptIn {
        sender: address(sender)?,
        asset_id,
    })
}

/// Asset creation. `params` are checked against every ledger constraint.
pub fn build_asset_create(
    sender: impl AsRef<str>,
    params: AssetParams,
) -> Result<TransactionRequest, Error> {
    let sender = address(sender)?;
    params.validate()?;
    Ok(TransactionRequest::AssetCreate { sender, params })
}

/// Ledger transaction identifier (52 base32 characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(pub String);

impl TxId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request placed in its group, ready to be handed to a signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub request: TransactionRequest,
    pub group: Option<GroupId>,
}

impl UnsignedTransaction {
    pub fn new(request: TransactionRequest, group: Option<GroupId>) -> Self {
        Self { request, group }
    }

    pub fn sender(&self) -> &Address {
        self.request.sender()
    }

    /// Bytes a signer commits to.
    pub fn bytes_to_sign(&self) -> Vec<u8> {
        let mut out = TX_DOMAIN.to_vec();
        out.extend_from_slice(&self.request.encode_canonical());
        if let Some(group) = &self.group {
            out.extend_from_slice(group.as_bytes());
        }
        out
    }

    pub fn tx_id(&self) -> TxId {
        let digest = Sha512_256::digest(self.bytes_to_sign());
        TxId(BASE32_NOPAD.encode(&digest))
    }
}

/// An unsigned transaction together with the signer's authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub transaction: UnsignedTransaction,
    pub signer: Address,
    pub signature: Vec<u8>,
}

impl SignedTransaction {
    pub fn tx_id(&self) -> TxId {
        self.transaction.tx_id()
    }

    pub fn request(&self) -> &TransactionRequest {
        &self.transaction.request
    }
}
