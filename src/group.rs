//! Atomic transaction groups.
//!
//! A group moves through `Empty -> Building -> Sealed`. Only
//! [`AtomicGroupBuilder`] accepts members; sealing consumes the builder and
//! yields an immutable [`TransactionGroup`], so a sealed group can never be
//! extended, shrunk or reordered.

use crate::error::Error;
use crate::transaction::{TransactionRequest, UnsignedTransaction};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Maximum number of transactions in one atomic group on the reference ledger.
pub const MAX_GROUP_SIZE: usize = 16;

const GROUP_DOMAIN: &[u8] = b"TG";

/// Shared identity of a sealed group, derived from its ordered members.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId([u8; 32]);

impl GroupId {
    pub(crate) fn derive(members: &[TransactionRequest]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(GROUP_DOMAIN);
        hasher.update(&(members.len() as u32).to_be_bytes());
        for member in members {
            // Member ids are taken without the group field, which does not exist yet.
            let tx_id = UnsignedTransaction::new(member.clone(), None).tx_id();
            hasher.update(tx_id.as_str().as_bytes());
        }
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex key suitable for detecting a resubmission of the same group.
    pub fn idempotency_key(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&BASE64.encode(self.0))
    }
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupId({})", self)
    }
}

impl Serialize for GroupId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for GroupId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let bytes = BASE64.decode(&raw).map_err(serde::de::Error::custom)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("group id must be 32 bytes"))?;
        Ok(GroupId(arr))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    Empty,
    Building,
    Sealed,
}

/// Collects members for an atomic group.
#[derive(Debug, Clone)]
pub struct AtomicGroupBuilder {
    members: Vec<TransactionRequest>,
    max_size: usize,
}

impl AtomicGroupBuilder {
    pub fn new() -> Self {
        Self::with_max_size(MAX_GROUP_SIZE)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            members: Vec::new(),
            max_size,
        }
    }

    pub fn state(&self) -> GroupState {
        if self.members.is_empty() {
            GroupState::Empty
        } else {
            GroupState::Building
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Append a member. Size is enforced when the group is sealed.
    pub fn add_member(&mut self, request: TransactionRequest) -> &mut Self {
        self.members.push(request);
        self
    }

    pub fn with_member(mut self, request: TransactionRequest) -> Self {
        self.members.push(request);
        self
    }

    /// Close the group and assign its identity.
    pub fn seal(self) -> Result<TransactionGroup, Error> {
        if self.members.is_empty() {
            return Err(Error::EmptyGroup);
        }
        if self.members.len() > self.max_size {
            return Err(Error::GroupTooLarge {
                size: self.members.len(),
                max: self.max_size,
            });
        }
        let id = GroupId::derive(&self.members);
        Ok(TransactionGroup {
            members: self.members,
            id,
        })
    }
}

impl Default for AtomicGroupBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A sealed, ordered, non-empty set of requests submitted as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionGroup {
    members: Vec<TransactionRequest>,
    id: GroupId,
}

impl TransactionGroup {
    /// The degenerate group of one request.
    pub fn single(request: TransactionRequest) -> Self {
        let members = vec![request];
        let id = GroupId::derive(&members);
        Self { members, id }
    }

    pub fn state(&self) -> GroupState {
        GroupState::Sealed
    }

    pub fn members(&self) -> &[TransactionRequest] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Identity of the member sequence, present for singletons too.
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Groups of one are not marked atomic.
    pub fn is_atomic(&self) -> bool {
        self.members.len() > 1
    }

    /// The group field stamped on each member, `None` for singletons.
    pub fn group_field(&self) -> Option<GroupId> {
        self.is_atomic().then_some(self.id)
    }

    pub fn unsigned_transactions(&self) -> Vec<UnsignedTransaction> {
        let group = self.group_field();
        self.members
            .iter()
            .cloned()
            .map(|request| UnsignedTransaction::new(request, group))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::transaction::{build_asset_transfer, build_payment};

    fn addr(seed: u8) -> Address {
        Address::from_public_key(&[seed; 32])
    }

    fn pay(amount: u64) -> TransactionRequest {
        build_payment(addr(1), addr(2), amount).unwrap()
    }

    #[test]
    fn test_state_transitions() {
        let mut builder = AtomicGroupBuilder::new();
        assert_eq!(builder.state(), GroupState::Empty);
        builder.add_member(pay(1));
        assert_eq!(builder.state(), GroupState::Building);
        let group = builder.seal().unwrap();
        assert_eq!(group.state(), GroupState::Sealed);
    }

    #[test]
    fn test_empty_group_fails() {
        assert_eq!(AtomicGroupBuilder::new().seal(), Err(Error::EmptyGroup));
    }

    #[test]
    fn test_identity_is_deterministic() {
        let builder = AtomicGroupBuilder::new()
            .with_member(pay(1_000_000))
            .with_member(build_asset_transfer(addr(1), addr(2), 42u64, 1_000_000u64).unwrap());

        let a = builder.clone().seal().unwrap();
        let b = builder.seal().unwrap();
        assert_eq!(a.id(), b.id());
        assert_eq!(a.id().idempotency_key(), b.id().idempotency_key());
    }

    #[test]
    fn test_identity_depends_on_order() {
        let forward = AtomicGroupBuilder::new()
            .with_member(pay(1))
            .with_member(pay(2))
            .seal()
            .unwrap();
        let reversed = AtomicGroupBuilder::new()
            .with_member(pay(2))
            .with_member(pay(1))
            .seal()
            .unwrap();
        assert_ne!(forward.id(), reversed.id());
    }

    #[test]
    fn test_too_large() {
        let mut builder = AtomicGroupBuilder::new();
        for i in 0..=MAX_GROUP_SIZE as u64 {
            builder.add_member(pay(i));
        }
        assert_eq!(
            builder.seal(),
            Err(Error::GroupTooLarge {
                size: MAX_GROUP_SIZE + 1,
                max: MAX_GROUP_SIZE
            })
        );
    }

    #[test]
    fn test_max_size_accepted() {
        let mut builder = AtomicGroupBuilder::new();
        for i in 0..MAX_GROUP_SIZE as u64 {
            builder.add_member(pay(i));
        }
        assert_eq!(builder.seal().unwrap().len(), MAX_GROUP_SIZE);
    }

    #[test]
    fn test_singleton_not_atomic() {
        let group = TransactionGroup::single(pay(1));
        assert!(!group.is_atomic());
        assert!(group.unsigned_transactions()[0].group.is_none());

        let pair = AtomicGroupBuilder::new()
            .with_member(pay(1))
            .with_member(pay(2))
            .seal()
            .unwrap();
        assert!(pair
            .unsigned_transactions()
            .iter()
            .all(|tx| tx.group == Some(pair.id())));
    }

    #[test]
    fn test_group_id_serde() {
        let group = TransactionGroup::single(pay(1));
        let json = serde_json::to_string(&group.id()).unwrap();
        let back: GroupId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, group.id());
    }
}
