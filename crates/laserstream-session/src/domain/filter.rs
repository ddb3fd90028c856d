//! # Filter Specification
//!
//! Declarative description of what a session subscribes to. Field names
//! follow the camelCase request shape used by existing clients, so a request
//! written as JSON for another client deserializes unchanged.
//!
//! An empty mapping for an entity type means "do not subscribe to that
//! type"; names within one mapping are unique because each mapping is keyed
//! by name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::errors::FilterError;
use super::updates::{EntityType, Slot};

/// Longest memcmp pattern accepted upstream.
pub const MAX_MEMCMP_BYTES: usize = 128;

/// Decoded width of a public key.
const ADDRESS_BYTES: usize = 32;
/// Decoded width of a transaction signature.
const SIGNATURE_BYTES: usize = 64;

/// Confirmation strength requested from the upstream.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase", try_from = "CommitmentRepr")]
pub enum CommitmentLevel {
    /// Processed by the connected node.
    #[default]
    Processed,
    /// Optimistically confirmed by the cluster.
    Confirmed,
    /// Rooted.
    Finalized,
}

impl CommitmentLevel {
    /// Numeric code used on the wire.
    pub fn code(self) -> u8 {
        match self {
            CommitmentLevel::Processed => 0,
            CommitmentLevel::Confirmed => 1,
            CommitmentLevel::Finalized => 2,
        }
    }
}

impl fmt::Display for CommitmentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitmentLevel::Processed => write!(f, "processed"),
            CommitmentLevel::Confirmed => write!(f, "confirmed"),
            CommitmentLevel::Finalized => write!(f, "finalized"),
        }
    }
}

impl FromStr for CommitmentLevel {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "processed" | "0" => Ok(CommitmentLevel::Processed),
            "confirmed" | "1" => Ok(CommitmentLevel::Confirmed),
            "finalized" | "2" => Ok(CommitmentLevel::Finalized),
            other => Err(FilterError::Malformed(format!(
                "unknown commitment level {other:?}"
            ))),
        }
    }
}

/// Commitment as either a name or the numeric enum value older clients send.
#[derive(Deserialize)]
#[serde(untagged)]
enum CommitmentRepr {
    Code(u8),
    Name(String),
}

impl TryFrom<CommitmentRepr> for CommitmentLevel {
    type Error = FilterError;

    fn try_from(repr: CommitmentRepr) -> Result<Self, Self::Error> {
        match repr {
            CommitmentRepr::Code(code) => code.to_string().parse(),
            CommitmentRepr::Name(name) => name.parse(),
        }
    }
}

/// Lamports comparison for account filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LamportsComparison {
    /// Equal to.
    Eq(u64),
    /// Not equal to.
    Ne(u64),
    /// Less than.
    Lt(u64),
    /// Greater than.
    Gt(u64),
}

/// Condition on account contents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccountFilterCondition {
    /// Bytes at `offset` equal `bytes`.
    Memcmp {
        /// Byte offset into account data.
        offset: u64,
        /// Expected bytes.
        bytes: Vec<u8>,
    },
    /// Account data length equals this value.
    Datasize(u64),
    /// Only valid SPL token accounts.
    TokenAccountState,
    /// Balance comparison.
    Lamports(LamportsComparison),
}

/// Account subscription filter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountFilter {
    /// Account addresses; empty matches every account.
    pub account: Vec<String>,
    /// Owner program addresses; empty matches every owner.
    pub owner: Vec<String>,
    /// Content conditions, all of which must hold.
    pub filters: Vec<AccountFilterCondition>,
    /// Only writes caused by a transaction.
    pub nonempty_txn_signature: Option<bool>,
}

/// Slot subscription filter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SlotFilter {
    /// Only emit slots at the session's commitment level.
    pub filter_by_commitment: Option<bool>,
    /// Include intermediate statuses (first shred, completed, ...).
    pub interslot_updates: Option<bool>,
}

/// Transaction (and transaction status) subscription filter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionFilter {
    /// Vote transactions only (`true`), none (`false`), or both (absent).
    pub vote: Option<bool>,
    /// Failed transactions only (`true`), none (`false`), or both (absent).
    pub failed: Option<bool>,
    /// A single signature to watch.
    pub signature: Option<String>,
    /// Transaction touches any of these accounts.
    pub account_include: Vec<String>,
    /// Transaction touches none of these accounts.
    pub account_exclude: Vec<String>,
    /// Transaction touches all of these accounts.
    pub account_required: Vec<String>,
}

/// Block subscription filter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockFilter {
    /// Restrict embedded transactions/accounts to these accounts.
    pub account_include: Vec<String>,
    /// Embed transactions.
    pub include_transactions: Option<bool>,
    /// Embed account writes.
    pub include_accounts: Option<bool>,
    /// Embed entries.
    pub include_entries: Option<bool>,
}

/// Block metadata subscription filter (no options).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMetaFilter {}

/// Entry subscription filter (no options).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFilter {}

/// Byte range of account data to deliver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataSlice {
    /// Start offset.
    pub offset: u64,
    /// Number of bytes.
    pub length: u64,
}

/// Complete subscription request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSpecification {
    /// Account filters by subscription name.
    pub accounts: BTreeMap<String, AccountFilter>,
    /// Slot filters by subscription name.
    pub slots: BTreeMap<String, SlotFilter>,
    /// Transaction filters by subscription name.
    pub transactions: BTreeMap<String, TransactionFilter>,
    /// Transaction status filters by subscription name.
    pub transactions_status: BTreeMap<String, TransactionFilter>,
    /// Block filters by subscription name.
    pub blocks: BTreeMap<String, BlockFilter>,
    /// Block metadata filters by subscription name.
    pub blocks_meta: BTreeMap<String, BlockMetaFilter>,
    /// Entry filters by subscription name.
    #[serde(alias = "entries")]
    pub entry: BTreeMap<String, EntryFilter>,
    /// Requested commitment level.
    pub commitment: CommitmentLevel,
    /// Account data slices.
    pub accounts_data_slice: Vec<DataSlice>,
    /// Replay from this slot instead of the live tip.
    pub from_slot: Option<Slot>,
}

impl FilterSpecification {
    /// Empty specification at the given commitment.
    pub fn new(commitment: CommitmentLevel) -> Self {
        Self {
            commitment,
            ..Default::default()
        }
    }

    /// Parse a JSON request.
    pub fn from_json(json: &str) -> Result<Self, FilterError> {
        serde_json::from_str(json).map_err(|e| FilterError::Malformed(e.to_string()))
    }

    /// Add an account filter.
    pub fn with_accounts(mut self, name: impl Into<String>, filter: AccountFilter) -> Self {
        self.accounts.insert(name.into(), filter);
        self
    }

    /// Add a slot filter.
    pub fn with_slots(mut self, name: impl Into<String>, filter: SlotFilter) -> Self {
        self.slots.insert(name.into(), filter);
        self
    }

    /// Add a transaction filter.
    pub fn with_transactions(mut self, name: impl Into<String>, filter: TransactionFilter) -> Self {
        self.transactions.insert(name.into(), filter);
        self
    }

    /// Add a transaction status filter.
    pub fn with_transactions_status(
        mut self,
        name: impl Into<String>,
        filter: TransactionFilter,
    ) -> Self {
        self.transactions_status.insert(name.into(), filter);
        self
    }

    /// Add a block filter.
    pub fn with_blocks(mut self, name: impl Into<String>, filter: BlockFilter) -> Self {
        self.blocks.insert(name.into(), filter);
        self
    }

    /// Add a block metadata filter.
    pub fn with_blocks_meta(mut self, name: impl Into<String>) -> Self {
        self.blocks_meta.insert(name.into(), BlockMetaFilter::default());
        self
    }

    /// Add an entry filter.
    pub fn with_entries(mut self, name: impl Into<String>) -> Self {
        self.entry.insert(name.into(), EntryFilter::default());
        self
    }

    /// Add an account data slice.
    pub fn with_data_slice(mut self, offset: u64, length: u64) -> Self {
        self.accounts_data_slice.push(DataSlice { offset, length });
        self
    }

    /// Set or clear the starting slot.
    pub fn with_from_slot(mut self, from_slot: Option<Slot>) -> Self {
        self.from_slot = from_slot;
        self
    }

    /// Whether the mapping for `entity` is non-empty.
    pub fn is_subscribed(&self, entity: EntityType) -> bool {
        match entity {
            EntityType::Account => !self.accounts.is_empty(),
            EntityType::Slot => !self.slots.is_empty(),
            EntityType::Transaction => !self.transactions.is_empty(),
            EntityType::TransactionStatus => !self.transactions_status.is_empty(),
            EntityType::Block => !self.blocks.is_empty(),
            EntityType::BlockMeta => !self.blocks_meta.is_empty(),
            EntityType::Entry => !self.entry.is_empty(),
        }
    }

    /// Entity types with at least one filter.
    pub fn subscribed_entities(&self) -> Vec<EntityType> {
        EntityType::ALL
            .into_iter()
            .filter(|e| self.is_subscribed(*e))
            .collect()
    }

    /// Validate and return the normalized specification.
    ///
    /// Address lists come back de-duplicated and sorted, data slices sorted
    /// by offset, and blank optional strings removed.
    pub fn validate(&self) -> Result<FilterSpecification, FilterError> {
        if self.subscribed_entities().is_empty() {
            return Err(FilterError::NothingToSubscribe);
        }

        let mut normalized = self.clone();

        for (name, filter) in normalized.accounts.iter_mut() {
            normalize_accounts(name, filter)?;
        }
        for (name, filter) in normalized.transactions.iter_mut() {
            normalize_transactions(name, filter)?;
        }
        for (name, filter) in normalized.transactions_status.iter_mut() {
            normalize_transactions(name, filter)?;
        }
        for (name, filter) in normalized.blocks.iter_mut() {
            filter.account_include = normalize_addresses(name, &filter.account_include)?;
        }

        normalized.accounts_data_slice = normalize_slices(&self.accounts_data_slice)?;
        Ok(normalized)
    }
}

fn normalize_accounts(name: &str, filter: &mut AccountFilter) -> Result<(), FilterError> {
    filter.account = normalize_addresses(name, &filter.account)?;
    filter.owner = normalize_addresses(name, &filter.owner)?;

    for condition in &filter.filters {
        if let AccountFilterCondition::Memcmp { offset, bytes } = condition {
            if bytes.is_empty() {
                return Err(FilterError::InvalidMemcmp {
                    filter: name.to_string(),
                    reason: "empty pattern".to_string(),
                });
            }
            if bytes.len() > MAX_MEMCMP_BYTES {
                return Err(FilterError::InvalidMemcmp {
                    filter: name.to_string(),
                    reason: format!("pattern longer than {MAX_MEMCMP_BYTES} bytes"),
                });
            }
            if offset.checked_add(bytes.len() as u64).is_none() {
                return Err(FilterError::InvalidMemcmp {
                    filter: name.to_string(),
                    reason: format!("offset {offset} overflows"),
                });
            }
        }
    }
    Ok(())
}

fn normalize_transactions(name: &str, filter: &mut TransactionFilter) -> Result<(), FilterError> {
    filter.account_include = normalize_addresses(name, &filter.account_include)?;
    filter.account_exclude = normalize_addresses(name, &filter.account_exclude)?;
    filter.account_required = normalize_addresses(name, &filter.account_required)?;

    // Both lists are sorted, so a merge walk finds any shared address.
    if let Some(address) = first_common(&filter.account_include, &filter.account_exclude) {
        return Err(FilterError::ConflictingAddress {
            filter: name.to_string(),
            address: address.clone(),
        });
    }

    filter.signature = match filter.signature.take() {
        Some(sig) if sig.trim().is_empty() => None,
        Some(sig) => {
            let sig = sig.trim().to_string();
            if !decodes_to(&sig, SIGNATURE_BYTES) {
                return Err(FilterError::InvalidSignature {
                    filter: name.to_string(),
                    signature: sig,
                });
            }
            Some(sig)
        }
        None => None,
    };
    Ok(())
}

fn normalize_addresses(name: &str, addresses: &[String]) -> Result<Vec<String>, FilterError> {
    let mut out = Vec::with_capacity(addresses.len());
    for address in addresses {
        let address = address.trim();
        if !decodes_to(address, ADDRESS_BYTES) {
            return Err(FilterError::InvalidAddress {
                filter: name.to_string(),
                address: address.to_string(),
            });
        }
        out.push(address.to_string());
    }
    out.sort();
    out.dedup();
    Ok(out)
}

fn normalize_slices(slices: &[DataSlice]) -> Result<Vec<DataSlice>, FilterError> {
    for slice in slices {
        if slice.offset.checked_add(slice.length).is_none() {
            return Err(FilterError::DataSliceOutOfBounds {
                offset: slice.offset,
                length: slice.length,
            });
        }
    }

    let mut sorted = slices.to_vec();
    sorted.sort();
    for pair in sorted.windows(2) {
        // Overflow was ruled out above.
        if pair[0].offset + pair[0].length > pair[1].offset {
            return Err(FilterError::DataSliceOverlap {
                offset: pair[1].offset,
            });
        }
    }
    Ok(sorted)
}

fn first_common<'a>(a: &'a [String], b: &[String]) -> Option<&'a String> {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => return Some(&a[i]),
        }
    }
    None
}

/// Base58 text that decodes to exactly `bytes` bytes.
fn decodes_to(s: &str, bytes: usize) -> bool {
    bs58::decode(s)
        .into_vec()
        .map_or(false, |decoded| decoded.len() == bytes)
}
