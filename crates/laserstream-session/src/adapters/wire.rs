//! Wire decoding
//!
//! [`WireUpdate`] mirrors the upstream's update message: keys and hashes as
//! raw byte vectors, slot status as a numeric code, one optional payload.
//! Decoders check every fixed-size field before producing an
//! [`UpdateRecord`].

use serde::{Deserialize, Serialize};

use crate::domain::{
    AccountUpdate, BlockMetaUpdate, BlockUpdate, DecodeError, EntryUpdate, Signature, SlotStatus,
    SlotUpdate, TransactionStatusUpdate, TransactionUpdate, UpdateRecord,
};
use crate::ports::outbound::FrameDecoder;

/// Upstream update message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireUpdate {
    /// Names of the subscriptions this update matched.
    pub filters: Vec<String>,
    /// Payload; absent on malformed frames.
    pub update: Option<WireUpdateKind>,
}

/// Payload of a [`WireUpdate`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum WireUpdateKind {
    Account(WireAccount),
    Slot(WireSlot),
    Transaction(WireTransaction),
    TransactionStatus(WireTransactionStatus),
    Block(WireBlock),
    BlockMeta(WireBlockMeta),
    Entry(WireEntry),
    Ping,
    Pong { id: i32 },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct WireAccount {
    pub slot: u64,
    pub pubkey: Vec<u8>,
    pub owner: Vec<u8>,
    pub lamports: u64,
    pub executable: bool,
    pub rent_epoch: u64,
    pub data: Vec<u8>,
    pub write_version: u64,
    pub txn_signature: Option<Vec<u8>>,
    pub is_startup: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct WireSlot {
    pub slot: u64,
    pub parent: Option<u64>,
    pub status: i32,
    pub dead_error: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct WireTransaction {
    pub slot: u64,
    pub signature: Vec<u8>,
    pub is_vote: bool,
    pub index: u64,
    pub err: Option<String>,
    pub raw: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct WireTransactionStatus {
    pub slot: u64,
    pub signature: Vec<u8>,
    pub is_vote: bool,
    pub index: u64,
    pub err: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct WireBlock {
    pub slot: u64,
    pub blockhash: String,
    pub parent_slot: u64,
    pub parent_blockhash: String,
    pub block_height: Option<u64>,
    pub block_time: Option<i64>,
    pub executed_transaction_count: u64,
    pub transactions: Vec<WireTransaction>,
    pub updated_account_count: u64,
    pub entries_count: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct WireBlockMeta {
    pub slot: u64,
    pub blockhash: String,
    pub parent_slot: u64,
    pub parent_blockhash: String,
    pub block_height: Option<u64>,
    pub block_time: Option<i64>,
    pub executed_transaction_count: u64,
    pub entries_count: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct WireEntry {
    pub slot: u64,
    pub index: u64,
    pub num_hashes: u64,
    pub hash: Vec<u8>,
    pub executed_transaction_count: u64,
    pub starting_transaction_index: u64,
}

fn fixed<const N: usize>(field: &'static str, bytes: &[u8]) -> Result<[u8; N], DecodeError> {
    bytes.try_into().map_err(|_| DecodeError::InvalidLength {
        field,
        expected: N,
        got: bytes.len(),
    })
}

fn signature(field: &'static str, bytes: &[u8]) -> Result<Signature, DecodeError> {
    fixed::<64>(field, bytes).map(Signature)
}

fn transaction(tx: WireTransaction) -> Result<TransactionUpdate, DecodeError> {
    Ok(TransactionUpdate {
        slot: tx.slot,
        signature: signature("transaction.signature", &tx.signature)?,
        is_vote: tx.is_vote,
        index: tx.index,
        err: tx.err,
        raw: tx.raw,
    })
}

/// Convert a wire message into a typed record.
pub fn decode_wire(update: WireUpdate) -> Result<UpdateRecord, DecodeError> {
    let kind = update.update.ok_or(DecodeError::MissingPayload)?;
    let record = match kind {
        WireUpdateKind::Account(a) => UpdateRecord::Account(AccountUpdate {
            slot: a.slot,
            pubkey: fixed("account.pubkey", &a.pubkey)?,
            owner: fixed("account.owner", &a.owner)?,
            lamports: a.lamports,
            executable: a.executable,
            rent_epoch: a.rent_epoch,
            data: a.data,
            write_version: a.write_version,
            txn_signature: a
                .txn_signature
                .as_deref()
                .map(|s| signature("account.txn_signature", s))
                .transpose()?,
            is_startup: a.is_startup,
        }),
        WireUpdateKind::Slot(s) => UpdateRecord::Slot(SlotUpdate {
            slot: s.slot,
            parent: s.parent,
            status: SlotStatus::from_code(s.status)
                .ok_or(DecodeError::UnknownSlotStatus(s.status))?,
            dead_error: s.dead_error,
        }),
        WireUpdateKind::Transaction(tx) => UpdateRecord::Transaction(transaction(tx)?),
        WireUpdateKind::TransactionStatus(st) => {
            UpdateRecord::TransactionStatus(TransactionStatusUpdate {
                slot: st.slot,
                signature: signature("transaction_status.signature", &st.signature)?,
                is_vote: st.is_vote,
                index: st.index,
                err: st.err,
            })
        }
        WireUpdateKind::Block(b) => UpdateRecord::Block(BlockUpdate {
            slot: b.slot,
            blockhash: b.blockhash,
            parent_slot: b.parent_slot,
            parent_blockhash: b.parent_blockhash,
            block_height: b.block_height,
            block_time: b.block_time,
            executed_transaction_count: b.executed_transaction_count,
            transactions: b
                .transactions
                .into_iter()
                .map(transaction)
                .collect::<Result<_, _>>()?,
            updated_account_count: b.updated_account_count,
            entries_count: b.entries_count,
        }),
        WireUpdateKind::BlockMeta(m) => UpdateRecord::BlockMeta(BlockMetaUpdate {
            slot: m.slot,
            blockhash: m.blockhash,
            parent_slot: m.parent_slot,
            parent_blockhash: m.parent_blockhash,
            block_height: m.block_height,
            block_time: m.block_time,
            executed_transaction_count: m.executed_transaction_count,
            entries_count: m.entries_count,
        }),
        WireUpdateKind::Entry(e) => UpdateRecord::Entry(EntryUpdate {
            slot: e.slot,
            index: e.index,
            num_hashes: e.num_hashes,
            hash: fixed("entry.hash", &e.hash)?,
            executed_transaction_count: e.executed_transaction_count,
            starting_transaction_index: e.starting_transaction_index,
        }),
        WireUpdateKind::Ping => UpdateRecord::Ping,
        WireUpdateKind::Pong { id } => UpdateRecord::Pong { id },
    };
    Ok(record)
}

/// Decodes structured [`WireUpdate`] frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct WireDecoder;

impl FrameDecoder<WireUpdate> for WireDecoder {
    fn decode(&self, frame: WireUpdate) -> Result<UpdateRecord, DecodeError> {
        decode_wire(frame)
    }
}

/// Decodes bincode-encoded [`WireUpdate`] byte frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeDecoder;

impl BincodeDecoder {
    /// Encode a message the way this decoder expects it.
    pub fn encode_frame(update: &WireUpdate) -> Result<Vec<u8>, DecodeError> {
        bincode::serialize(update).map_err(|e| DecodeError::Malformed(e.to_string()))
    }
}

impl FrameDecoder<Vec<u8>> for BincodeDecoder {
    fn decode(&self, frame: Vec<u8>) -> Result<UpdateRecord, DecodeError> {
        let update: WireUpdate =
            bincode::deserialize(&frame).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        decode_wire(update)
    }
}

/// For transports that already yield typed records.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughDecoder;

impl FrameDecoder<UpdateRecord> for PassthroughDecoder {
    fn decode(&self, frame: UpdateRecord) -> Result<UpdateRecord, DecodeError> {
        Ok(frame)
    }
}
