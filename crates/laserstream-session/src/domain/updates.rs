//! # Update Records
//!
//! Typed updates delivered to the consumer, one variant per entity type
//! plus the two liveness frames.
//!
//! Every data variant carries the slot that produced it and exposes a
//! stable [`ItemKey`] used to suppress redelivery across a reconnect.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger position used for ordering and resume.
pub type Slot = u64;

/// 32-byte account address.
pub type Pubkey = [u8; 32];

/// 32-byte hash (entry hashes).
pub type Hash = [u8; 32];

/// 64-byte transaction signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    /// Signature bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Signature({:02x}{:02x}{:02x}{:02x}..)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// Entity types a subscription can include.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    /// Account writes.
    Account,
    /// Slot status changes.
    Slot,
    /// Full transactions.
    Transaction,
    /// Transaction status only.
    TransactionStatus,
    /// Full blocks.
    Block,
    /// Block metadata.
    BlockMeta,
    /// Ledger entries.
    Entry,
}

impl EntityType {
    /// Number of entity types.
    pub const COUNT: usize = 7;

    /// All entity types in declaration order.
    pub const ALL: [EntityType; Self::COUNT] = [
        EntityType::Account,
        EntityType::Slot,
        EntityType::Transaction,
        EntityType::TransactionStatus,
        EntityType::Block,
        EntityType::BlockMeta,
        EntityType::Entry,
    ];

    /// Dense index, stable for the lifetime of the crate.
    pub const fn index(self) -> usize {
        match self {
            EntityType::Account => 0,
            EntityType::Slot => 1,
            EntityType::Transaction => 2,
            EntityType::TransactionStatus => 3,
            EntityType::Block => 4,
            EntityType::BlockMeta => 5,
            EntityType::Entry => 6,
        }
    }

    /// Label used in logs and metrics.
    pub const fn as_str(self) -> &'static str {
        match self {
            EntityType::Account => "account",
            EntityType::Slot => "slot",
            EntityType::Transaction => "transaction",
            EntityType::TransactionStatus => "transaction_status",
            EntityType::Block => "block",
            EntityType::BlockMeta => "block_meta",
            EntityType::Entry => "entry",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Slot lifecycle status reported by the upstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotStatus {
    /// Bank processed.
    Processed,
    /// Optimistically confirmed.
    Confirmed,
    /// Rooted.
    Finalized,
    /// First shred received.
    FirstShredReceived,
    /// All shreds received.
    Completed,
    /// Bank created.
    CreatedBank,
    /// Slot marked dead.
    Dead,
}

impl SlotStatus {
    /// Map a numeric wire code to a status.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(SlotStatus::Processed),
            1 => Some(SlotStatus::Confirmed),
            2 => Some(SlotStatus::Finalized),
            3 => Some(SlotStatus::FirstShredReceived),
            4 => Some(SlotStatus::Completed),
            5 => Some(SlotStatus::CreatedBank),
            6 => Some(SlotStatus::Dead),
            _ => None,
        }
    }

    /// Numeric wire code.
    pub fn code(self) -> i32 {
        match self {
            SlotStatus::Processed => 0,
            SlotStatus::Confirmed => 1,
            SlotStatus::Finalized => 2,
            SlotStatus::FirstShredReceived => 3,
            SlotStatus::Completed => 4,
            SlotStatus::CreatedBank => 5,
            SlotStatus::Dead => 6,
        }
    }
}

/// Account write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountUpdate {
    /// Slot of the write.
    pub slot: Slot,
    /// Account address.
    pub pubkey: Pubkey,
    /// Owning program.
    pub owner: Pubkey,
    /// Balance in lamports.
    pub lamports: u64,
    /// Executable flag.
    pub executable: bool,
    /// Rent epoch.
    pub rent_epoch: u64,
    /// Account data (possibly sliced).
    pub data: Vec<u8>,
    /// Monotonic per-validator write version.
    pub write_version: u64,
    /// Transaction that caused the write, if any.
    pub txn_signature: Option<Signature>,
    /// Emitted during validator startup.
    pub is_startup: bool,
}

/// Slot status change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotUpdate {
    /// Slot number.
    pub slot: Slot,
    /// Parent slot, when known.
    pub parent: Option<Slot>,
    /// New status.
    pub status: SlotStatus,
    /// Reason for a dead slot.
    pub dead_error: Option<String>,
}

/// Full transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionUpdate {
    /// Slot the transaction landed in.
    pub slot: Slot,
    /// First signature.
    pub signature: Signature,
    /// Vote transaction flag.
    pub is_vote: bool,
    /// Position within the block.
    pub index: u64,
    /// Execution error, if the transaction failed.
    pub err: Option<String>,
    /// Serialized transaction and meta, opaque to the session.
    pub raw: Vec<u8>,
}

/// Transaction status only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionStatusUpdate {
    /// Slot the transaction landed in.
    pub slot: Slot,
    /// First signature.
    pub signature: Signature,
    /// Vote transaction flag.
    pub is_vote: bool,
    /// Position within the block.
    pub index: u64,
    /// Execution error, if the transaction failed.
    pub err: Option<String>,
}

/// Full block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockUpdate {
    /// Block slot.
    pub slot: Slot,
    /// Base58 blockhash.
    pub blockhash: String,
    /// Parent slot.
    pub parent_slot: Slot,
    /// Base58 parent blockhash.
    pub parent_blockhash: String,
    /// Block height.
    pub block_height: Option<u64>,
    /// Unix block time.
    pub block_time: Option<i64>,
    /// Executed transaction count.
    pub executed_transaction_count: u64,
    /// Included transactions (when requested).
    pub transactions: Vec<TransactionUpdate>,
    /// Number of accounts updated in the block.
    pub updated_account_count: u64,
    /// Number of entries in the block.
    pub entries_count: u64,
}

/// Block metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockMetaUpdate {
    /// Block slot.
    pub slot: Slot,
    /// Base58 blockhash.
    pub blockhash: String,
    /// Parent slot.
    pub parent_slot: Slot,
    /// Base58 parent blockhash.
    pub parent_blockhash: String,
    /// Block height.
    pub block_height: Option<u64>,
    /// Unix block time.
    pub block_time: Option<i64>,
    /// Executed transaction count.
    pub executed_transaction_count: u64,
    /// Number of entries in the block.
    pub entries_count: u64,
}

/// Ledger entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryUpdate {
    /// Slot of the entry.
    pub slot: Slot,
    /// Entry index within the slot.
    pub index: u64,
    /// PoH hashes since the previous entry.
    pub num_hashes: u64,
    /// Entry hash.
    pub hash: Hash,
    /// Transactions executed in the entry.
    pub executed_transaction_count: u64,
    /// Index of the first transaction in the slot.
    pub starting_transaction_index: u64,
}

/// Identity of a delivered item, used for duplicate suppression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemKey {
    /// Account address plus write version.
    Account {
        /// Account address.
        pubkey: Pubkey,
        /// Write version.
        write_version: u64,
    },
    /// Slot plus the status being reported.
    Slot {
        /// Slot number.
        slot: Slot,
        /// Reported status.
        status: SlotStatus,
    },
    /// Transaction signature.
    Signature(Signature),
    /// One block (or block meta) per slot.
    Block(Slot),
    /// Entry position.
    Entry {
        /// Slot number.
        slot: Slot,
        /// Entry index.
        index: u64,
    },
}

/// One decoded update from the stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateRecord {
    /// Account write.
    Account(AccountUpdate),
    /// Slot status change.
    Slot(SlotUpdate),
    /// Full transaction.
    Transaction(TransactionUpdate),
    /// Transaction status.
    TransactionStatus(TransactionStatusUpdate),
    /// Full block.
    Block(BlockUpdate),
    /// Block metadata.
    BlockMeta(BlockMetaUpdate),
    /// Ledger entry.
    Entry(EntryUpdate),
    /// Server liveness ping; answered, never delivered.
    Ping,
    /// Reply to a client ping.
    Pong {
        /// Echoed ping id.
        id: i32,
    },
}

impl UpdateRecord {
    /// Producing slot, `None` for liveness frames.
    pub fn slot(&self) -> Option<Slot> {
        match self {
            UpdateRecord::Account(u) => Some(u.slot),
            UpdateRecord::Slot(u) => Some(u.slot),
            UpdateRecord::Transaction(u) => Some(u.slot),
            UpdateRecord::TransactionStatus(u) => Some(u.slot),
            UpdateRecord::Block(u) => Some(u.slot),
            UpdateRecord::BlockMeta(u) => Some(u.slot),
            UpdateRecord::Entry(u) => Some(u.slot),
            UpdateRecord::Ping | UpdateRecord::Pong { .. } => None,
        }
    }

    /// Entity type, `None` for liveness frames.
    pub fn entity_type(&self) -> Option<EntityType> {
        match self {
            UpdateRecord::Account(_) => Some(EntityType::Account),
            UpdateRecord::Slot(_) => Some(EntityType::Slot),
            UpdateRecord::Transaction(_) => Some(EntityType::Transaction),
            UpdateRecord::TransactionStatus(_) => Some(EntityType::TransactionStatus),
            UpdateRecord::Block(_) => Some(EntityType::Block),
            UpdateRecord::BlockMeta(_) => Some(EntityType::BlockMeta),
            UpdateRecord::Entry(_) => Some(EntityType::Entry),
            UpdateRecord::Ping | UpdateRecord::Pong { .. } => None,
        }
    }

    /// Stable identity for duplicate detection.
    pub fn item_key(&self) -> Option<ItemKey> {
        match self {
            UpdateRecord::Account(u) => Some(ItemKey::Account {
                pubkey: u.pubkey,
                write_version: u.write_version,
            }),
            UpdateRecord::Slot(u) => Some(ItemKey::Slot {
                slot: u.slot,
                status: u.status,
            }),
            UpdateRecord::Transaction(u) => Some(ItemKey::Signature(u.signature)),
            UpdateRecord::TransactionStatus(u) => Some(ItemKey::Signature(u.signature)),
            UpdateRecord::Block(u) => Some(ItemKey::Block(u.slot)),
            UpdateRecord::BlockMeta(u) => Some(ItemKey::Block(u.slot)),
            UpdateRecord::Entry(u) => Some(ItemKey::Entry {
                slot: u.slot,
                index: u.index,
            }),
            UpdateRecord::Ping | UpdateRecord::Pong { .. } => None,
        }
    }
}
