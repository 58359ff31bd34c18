//! Ledger address validation.
//!
//! An address is the base32 encoding (RFC 4648 alphabet, no padding) of a
//! 32-byte public key followed by a 4-byte checksum. The checksum is the last
//! four bytes of the SHA-512/256 digest of the public key.

use crate::error::Error;
use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha512_256};
use std::fmt;
use std::str::FromStr;

/// Length of a canonical address string.
pub const ADDRESS_LENGTH: usize = 58;

const PUBLIC_KEY_LENGTH: usize = 32;
const CHECKSUM_LENGTH: usize = 4;

/// A validated ledger address.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(String);

impl Address {
    /// Encode a public key as an address.
    pub fn from_public_key(public_key: &[u8; PUBLIC_KEY_LENGTH]) -> Self {
        let mut payload = Vec::with_capacity(PUBLIC_KEY_LENGTH + CHECKSUM_LENGTH);
        payload.extend_from_slice(public_key);
        payload.extend_from_slice(&checksum(public_key));
        Self(BASE32_NOPAD.encode(&payload))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 32 public key bytes encoded in this address.
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        let mut key = [0u8; PUBLIC_KEY_LENGTH];
        // Construction guarantees a decodable 36-byte payload.
        if let Ok(decoded) = BASE32_NOPAD.decode(self.0.as_bytes()) {
            key.copy_from_slice(&decoded[..PUBLIC_KEY_LENGTH]);
        }
        key
    }
}

/// Validate an address string.
///
/// Fails with [`Error::InvalidAddress`] unless `s` is exactly
/// [`ADDRESS_LENGTH`] characters of the base32 alphabet and carries a valid
/// checksum.
pub fn validate_address(s: &str) -> Result<Address, Error> {
    if s.len() != ADDRESS_LENGTH {
        return Err(Error::InvalidAddress(format!(
            "expected {} characters, got {}",
            ADDRESS_LENGTH,
            s.chars().count()
        )));
    }

    if let Some(bad) = s.chars().find(|c| !matches!(c, 'A'..='Z' | '2'..='7')) {
        return Err(Error::InvalidAddress(format!(
            "invalid base32 character {:?}",
            bad
        )));
    }

    let decoded = BASE32_NOPAD
        .decode(s.as_bytes())
        .map_err(|e| Error::InvalidAddress(format!("invalid base32: {}", e)))?;

    if decoded.len() != PUBLIC_KEY_LENGTH + CHECKSUM_LENGTH {
        return Err(Error::InvalidAddress(format!(
            "decoded to {} bytes",
            decoded.len()
        )));
    }

    let (public_key, check) = decoded.split_at(PUBLIC_KEY_LENGTH);
    if check != checksum(public_key) {
        return Err(Error::InvalidAddress("checksum mismatch".to_string()));
    }

    Ok(Address(s.to_string()))
}

fn checksum(public_key: &[u8]) -> [u8; CHECKSUM_LENGTH] {
    let digest = Sha512_256::digest(public_key);
    let mut out = [0u8; CHECKSUM_LENGTH];
    out.copy_from_slice(&digest[digest.len() - CHECKSUM_LENGTH..]);
    out
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_address(s)
    }
}

impl TryFrom<&str> for Address {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        validate_address(s)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        validate_address(&raw).map_err(serde::de::Error::custom)
    }
}
