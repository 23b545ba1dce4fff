//! Shared data types for the cross-chain transfer state machine.

/// A Stellar transaction memo, as attached to a deposit into the custody account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Memo {
    /// A text memo, expected to encode `<kind>_<id>`.
    Text(String),
    /// A typed memo-hash, used as the Stellar-side acknowledgement of a refund.
    Return,
    /// No memo was attached.
    None,
}

/// A single inbound payment to the custody account, as surfaced by the wallet monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StellarPayment {
    pub tx_hash: String,
    pub memo: Memo,
    /// Opaque, monotonically ordered resume cursor for this payment.
    pub paging_token: String,
    /// Source accounts and the amount (in stroops) each contributed, in the order
    /// they were enumerated in the transaction's operations.
    pub senders: Vec<(String, u64)>,
}

impl StellarPayment {
    pub fn total_amount(&self) -> u64 {
        self.senders.iter().map(|(_, amount)| *amount).sum()
    }

    pub fn first_sender(&self) -> Option<&(String, u64)> {
        self.senders.first()
    }
}

/// A chain-L1 bridge event, as decoded from a finalized block's event batch.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BridgeEvent {
    WithdrawCreated { id: u64, source_chain_l1: String, target_stellar: String, amount: u64 },
    WithdrawExpired { id: u64, target_stellar: String, amount: u64 },
    WithdrawReady { id: u64 },
    RefundReady { hash: String },
    RefundExpired { hash: String, target: String, amount: u64 },
}

/// One block's worth of bridge events, already partitioned by variant.
///
/// The event loop processes the five lists in a fixed order (`spec.md` §4.8),
/// then persists `height` (`spec.md` §2: "...subClient extrinsic -> persisted
/// height", §4.1 `SaveHeight(h)`) so a restart resumes just past this block.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct EventBatch {
    pub height: u64,
    pub withdraw_created: Vec<BridgeEvent>,
    pub withdraw_expired: Vec<BridgeEvent>,
    pub withdraw_ready: Vec<BridgeEvent>,
    pub refund_ready: Vec<BridgeEvent>,
    pub refund_expired: Vec<BridgeEvent>,
}

impl EventBatch {
    pub fn new(height: u64) -> Self {
        Self { height, ..Self::default() }
    }

    pub fn push(&mut self, event: BridgeEvent) {
        match &event {
            BridgeEvent::WithdrawCreated { .. } => self.withdraw_created.push(event),
            BridgeEvent::WithdrawExpired { .. } => self.withdraw_expired.push(event),
            BridgeEvent::WithdrawReady { .. } => self.withdraw_ready.push(event),
            BridgeEvent::RefundReady { .. } => self.refund_ready.push(event),
            BridgeEvent::RefundExpired { .. } => self.refund_expired.push(event),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.withdraw_created.is_empty()
            && self.withdraw_expired.is_empty()
            && self.withdraw_ready.is_empty()
            && self.refund_ready.is_empty()
            && self.refund_expired.is_empty()
    }
}

/// A validator's partial signature over a Stellar transaction envelope, plus the
/// sequence number it was taken against.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PartialSignature {
    pub signer_address: String,
    pub signature: Vec<u8>,
    pub sequence_number: u64,
}

/// Accumulated multi-sig material for a burn, keyed by chain-assigned burn id.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BurnTransaction {
    pub target: String,
    pub amount: u64,
    pub signatures: Vec<PartialSignature>,
    pub sequence_number: u64,
}

/// Accumulated multi-sig material for a refund, keyed by the originating Stellar hash.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RefundTransaction {
    pub target: String,
    pub amount: u64,
    pub signatures: Vec<PartialSignature>,
    pub sequence_number: u64,
}

/// Chain-L1 account address resolution result for `twin`/`farm`/`node`/`entity` memos.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Twin {
    pub id: u64,
    pub account: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Farm {
    pub id: u64,
    pub twin_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Node {
    pub id: u64,
    pub twin_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Entity {
    pub id: u64,
    pub account: String,
}

/// The two advisory checkpoints persisted between restarts.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PersistencySnapshot {
    pub stellar_cursor: String,
    pub height: u64,
}

impl Default for PersistencySnapshot {
    fn default() -> Self {
        Self { stellar_cursor: String::new(), height: 0 }
    }
}
