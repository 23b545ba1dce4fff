// Copyright 2026 ThreeFold Tech
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The error kinds a transfer handler can raise, and their recovery contract.
//!
//! Every variant below corresponds to a row of the error handling table: some
//! are local (handled inline by the caller, e.g. routing to a refund) and some
//! are fatal (propagated out of the event loop, ending the process).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Distinguished sentinel: the mint retry loop treats this as success.
    #[error("stellar tx {0} was already refunded")]
    TransactionAlreadyRefunded(String),

    /// A mint for this hash already has a terminal on-chain record.
    #[error("stellar tx {0} was already minted")]
    AlreadyMinted(String),

    /// A burn for this id already has a terminal on-chain record.
    #[error("burn {0} was already executed")]
    AlreadyBurned(u64),

    /// A refund for this hash already has a terminal on-chain record.
    #[error("refund {0} was already executed")]
    AlreadyRefunded(String),

    /// The memo on a deposit could not be parsed into a known routing kind.
    #[error("malformed or unknown memo: {0:?}")]
    MalformedMemo(String),

    /// `CheckAccount` rejected the payout target as not a valid Stellar account.
    #[error("invalid stellar target account: {0}")]
    InvalidTargetAccount(String),

    /// This validator's identity is not enrolled in the chain-L1 bridge validator set.
    #[error("this identity is not an enrolled validator")]
    NotAValidator,

    /// `WithdrawReady`/`RefundReady` fired but no signatures were recorded on-chain.
    #[error("{0} is ready with zero signatures, which should not be possible")]
    ZeroSignatures(String),

    /// Any other failure from the wallet or subClient interfaces: fatal to the
    /// current handler, and fatal to the daemon outside of the mint retry loop.
    #[error(transparent)]
    Transient(#[from] anyhow::Error),
}

impl BridgeError {
    /// `true` for conditions that are local no-ops (the caller should advance
    /// past the current item, not propagate the error).
    pub fn is_already_done(&self) -> bool {
        matches!(
            self,
            BridgeError::TransactionAlreadyRefunded(_)
                | BridgeError::AlreadyMinted(_)
                | BridgeError::AlreadyBurned(_)
                | BridgeError::AlreadyRefunded(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
