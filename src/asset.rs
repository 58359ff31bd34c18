use crate::amount::{self, MAX_DECIMALS};
use crate::error::Error;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512_256};
use std::fmt;

/// Maximum byte length of an asset name.
pub const MAX_ASSET_NAME_LEN: usize = 32;
/// Maximum byte length of an asset unit symbol.
pub const MAX_UNIT_NAME_LEN: usize = 8;
/// Maximum byte length of an asset content URL.
pub const MAX_URL_LEN: usize = 96;
/// Length of the content hash anchored in an asset.
pub const CONTENT_HASH_LEN: usize = 32;

/// Numeric asset identifier. Id `0` is the ledger's native currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub u64);

impl AssetId {
    pub const NATIVE: AssetId = AssetId(0);

    pub fn is_native(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for AssetId {
    fn from(id: u64) -> Self {
        AssetId(id)
    }
}

/// An asset as known to the caller: enough to scale human quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub unit_name: String,
    pub decimals: u8,
}

impl Asset {
    pub fn new(id: impl Into<AssetId>, unit_name: &str, decimals: u8) -> Self {
        Self {
            id: id.into(),
            unit_name: unit_name.to_string(),
            decimals,
        }
    }

    /// The native currency, six decimals.
    pub fn native() -> Self {
        Self::new(AssetId::NATIVE, "ALGO", 6)
    }

    pub fn to_base_units(&self, human: &str) -> Result<u64, Error> {
        amount::base_units_u64(&amount::to_base_units(human, self.decimals)?)
    }

    pub fn to_display(&self, base_units: u64) -> Result<String, Error> {
        amount::from_base_units(&BigUint::from(base_units), self.decimals)
    }
}

/// Parameters of a new asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetParams {
    pub name: String,
    pub unit_name: String,
    pub total: u64,
    pub decimals: u8,
    pub default_frozen: bool,
    pub url: Option<String>,
    pub content_hash: Option<[u8; CONTENT_HASH_LEN]>,
}

impl AssetParams {
    /// Parameters for a fungible token whose supply is given in human units.
    pub fn fungible(name: &str, unit_name: &str, human_total: &str, decimals: u8) -> Result<Self, Error> {
        let total = amount::base_units_u64(&amount::to_base_units(human_total, decimals)?)?;
        Ok(Self {
            name: name.to_string(),
            unit_name: unit_name.to_string(),
            total,
            decimals,
            default_frozen: false,
            url: None,
            content_hash: None,
        })
    }

    /// Parameters for a single indivisible unit (total 1, no decimals).
    pub fn unique(name: &str, unit_name: &str) -> Self {
        Self {
            name: name.to_string(),
            unit_name: unit_name.to_string(),
            total: 1,
            decimals: 0,
            default_frozen: false,
            url: None,
            content_hash: None,
        }
    }

    /// Attach a content URL, anchoring it with the digest of the URL string.
    pub fn with_content_url(mut self, url: &str) -> Self {
        self.content_hash = Some(content_hash(url));
        self.url = Some(url.to_string());
        self
    }

    /// Check every ledger constraint on the parameters.
    pub fn validate(&self) -> Result<(), Error> {
        if self.decimals > MAX_DECIMALS {
            return Err(Error::InvalidAmount(format!(
                "decimals must be between 0 and {}, got {}",
                MAX_DECIMALS, self.decimals
            )));
        }
        let factor = amount::scale(self.decimals)?;
        if BigUint::from(self.total) % factor != BigUint::from(0u8) {
            return Err(Error::InvalidAmount(format!(
                "total {} is not a whole number of units at {} decimals",
                self.total, self.decimals
            )));
        }

        check_text("asset name", &self.name, MAX_ASSET_NAME_LEN)?;
        check_text("unit name", &self.unit_name, MAX_UNIT_NAME_LEN)?;

        match (&self.url, &self.content_hash) {
            (Some(url), hash) => {
                if url.is_empty() || url.len() > MAX_URL_LEN {
                    return Err(Error::InvalidAmount(format!(
                        "content url must be 1..={} bytes",
                        MAX_URL_LEN
                    )));
                }
                if let Some(hash) = hash {
                    if *hash != content_hash(url) {
                        return Err(Error::InvalidAmount(
                            "content hash does not match the content url".to_string(),
                        ));
                    }
                }
            }
            (None, Some(_)) => {
                return Err(Error::InvalidAmount(
                    "content hash given without a content url".to_string(),
                ));
            }
            (None, None) => {}
        }

        Ok(())
    }
}

fn check_text(field: &str, value: &str, max: usize) -> Result<(), Error> {
    if value.is_empty() || value.len() > max {
        return Err(Error::InvalidAmount(format!(
            "{} must be 1..={} bytes, got {}",
            field,
            max,
            value.len()
        )));
    }
    Ok(())
}

/// SHA-512/256 digest of a content URL string.
///
/// The digest anchors the pointer, not the content behind it.
pub fn content_hash(url: &str) -> [u8; CONTENT_HASH_LEN] {
    let digest = Sha512_256::digest(url.as_bytes());
    let mut out = [0u8; CONTENT_HASH_LEN];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_conversion() {
        let usdc = Asset::new(10458941, "USDC", 6);
        assert_eq!(usdc.to_base_units("1").unwrap(), 1_000_000);
        assert_eq!(usdc.to_display(1_050_000).unwrap(), "1.05");

        let wide = Asset::new(7, "WIDE", 19);
        assert_eq!(wide.to_base_units("1").unwrap(), 10_000_000_000_000_000_000);
        assert!(wide.to_base_units("2").is_err());
    }

    #[test]
    fn test_fungible_params() {
        let params = AssetParams::fungible("MasterPass Token", "MPT", "1000", 2).unwrap();
        assert_eq!(params.total, 100_000);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_zero_supply_is_valid() {
        let params = AssetParams::fungible("Placeholder", "PHD", "0", 2).unwrap();
        assert_eq!(params.total, 0);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_total_must_be_whole_units() {
        let mut params = AssetParams::fungible("Token", "TKN", "10", 3).unwrap();
        params.total = 10_001;
        assert!(matches!(params.validate(), Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn test_content_hash_anchors_url() {
        let url = "ipfs://bafkreigh2akiscaildc/metadata.json";
        let params = AssetParams::unique("Ticket", "MTK").with_content_url(url);
        assert_eq!(params.content_hash, Some(content_hash(url)));
        assert!(params.validate().is_ok());

        let mut tampered = params.clone();
        tampered.url = Some("ipfs://other".to_string());
        assert!(matches!(tampered.validate(), Err(Error::InvalidAmount(_))));

        let mut orphan = AssetParams::unique("Ticket", "MTK");
        orphan.content_hash = Some([0u8; CONTENT_HASH_LEN]);
        assert!(orphan.validate().is_err());
    }

    #[test]
    fn test_name_limits() {
        let long = "x".repeat(MAX_ASSET_NAME_LEN + 1);
        assert!(AssetParams::unique(&long, "MTK").validate().is_err());
        assert!(AssetParams::unique("Ticket", "").validate().is_err());
        assert!(AssetParams::unique("Ticket", "TOOLONGUNIT").validate().is_err());
    }
}
