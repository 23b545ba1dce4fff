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

//! The cross-chain transfer state machine: the five chain-L1 event handlers
//! plus the Stellar mint handler (`spec.md` §4.5-§4.7).

use tracing::{info, warn};

use crate::{
    classifier,
    error::{BridgeError, Result},
    model::{Memo, StellarPayment},
    subclient::SubClient,
    wallet::Wallet,
};

/// Outcome of routing a single Stellar payment, for the caller to log and to
/// decide whether the cursor may advance (`spec.md` §8 invariant 5: exactly
/// one of `{mint submitted, refund initiated, skip}` terminates the routing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintOutcome {
    Minted { mint_id: String, target: String, amount: u64 },
    RefundInitiated { target: String, amount: u64 },
    Skipped,
}

/// The identity this validator uses for all chain-L1 idempotency/proposal calls.
pub struct ValidatorIdentity(pub String);

/// §4.5 Mint handler (Stellar -> chain-L1).
pub async fn handle_stellar_payment(
    wallet: &dyn Wallet,
    subclient: &dyn SubClient,
    identity: &ValidatorIdentity,
    deposit_fee: u64,
    payment: &StellarPayment,
) -> Result<MintOutcome> {
    // 1. Multiple senders: refund the first enumerated sender only, and stop.
    // This is an intentional, documented asymmetry (`spec.md` §9): the other
    // senders' amounts are not refunded in this pass.
    if payment.senders.len() > 1 {
        let (sender, amount) = payment.first_sender().expect("len > 1 implies non-empty").clone();
        warn!(tx_hash = %payment.tx_hash, senders = payment.senders.len(), "multi-sender deposit, refunding first sender only");
        return refund(wallet, subclient, identity, &sender, amount, &payment.tx_hash).await;
    }

    // 2. Return memo: this is the Stellar-side acknowledgement of a refund we
    // already issued. Skip, advance cursor, no mint, no refund.
    if matches!(payment.memo, Memo::Return) {
        return Ok(MintOutcome::Skipped);
    }

    let (sender, amount) = match payment.first_sender() {
        Some(pair) => pair.clone(),
        None => return Ok(MintOutcome::Skipped),
    };

    // 3. Empty memo: refund to sender.
    let memo_text = match &payment.memo {
        Memo::Text(text) if !text.is_empty() => text.clone(),
        _ => {
            return refund(wallet, subclient, identity, &sender, amount, &payment.tx_hash).await;
        }
    };

    // 4. Already minted: a distinguished sentinel error, not a plain no-op
    // outcome, so the retry loop's `is_already_done` check is what advances
    // the cursor (`spec.md` §7's "Already minted" row).
    if subclient.is_minted_already(&identity.0, &payment.tx_hash).await? {
        return Err(BridgeError::AlreadyMinted(payment.tx_hash.clone()));
    }

    // 5. Below deposit fee: refund.
    if amount <= deposit_fee {
        return refund(wallet, subclient, identity, &sender, amount, &payment.tx_hash).await;
    }

    // 6. Memo parse failure: refund.
    let memo_kind = match classifier::parse_memo(&memo_text) {
        Ok(kind) => kind,
        Err(_) => return refund(wallet, subclient, identity, &sender, amount, &payment.tx_hash).await,
    };

    let target = classifier::resolve_account(subclient, &memo_kind).await?;

    // 7. Otherwise: propose/vote the mint and advance the cursor. The cursor
    // advances once the extrinsic is accepted, not once quorum is reached
    // (`spec.md` §4.5) — quorum is tracked on-chain.
    subclient.propose_or_vote_mint_transaction(&identity.0, &payment.tx_hash, &target, amount).await?;
    info!(tx_hash = %payment.tx_hash, %target, amount, ?memo_kind, "proposed mint transaction");

    Ok(MintOutcome::Minted { mint_id: payment.tx_hash.clone(), target, amount })
}

async fn refund(
    wallet: &dyn Wallet,
    subclient: &dyn SubClient,
    identity: &ValidatorIdentity,
    target: &str,
    amount: u64,
    source_tx_hash: &str,
) -> Result<MintOutcome> {
    match handle_refund_expired(wallet, subclient, identity, source_tx_hash, target, amount).await {
        Ok(()) | Err(BridgeError::TransactionAlreadyRefunded(_)) => {
            Ok(MintOutcome::RefundInitiated { target: target.to_string(), amount })
        }
        Err(e) => Err(e),
    }
}

/// §4.6 Refund initiation, shared by the mint handler (forced refund) and by
/// `RefundExpired` events (re-signed refund proposal).
pub async fn handle_refund_expired(
    wallet: &dyn Wallet,
    subclient: &dyn SubClient,
    identity: &ValidatorIdentity,
    hash: &str,
    target: &str,
    amount: u64,
) -> Result<()> {
    if subclient.is_refunded_already(&identity.0, hash).await? {
        return Err(BridgeError::TransactionAlreadyRefunded(hash.to_string()));
    }

    let signature = wallet.create_refund_and_return_signature(target, amount, hash).await?;
    subclient.create_refund_transaction_or_add_sig(&identity.0, hash, target, amount, &signature).await?;
    info!(%hash, %target, amount, "submitted refund signature");
    Ok(())
}

/// §4.6 Refund completion, on `RefundReady{hash}`.
pub async fn handle_refund_ready(
    wallet: &dyn Wallet,
    subclient: &dyn SubClient,
    identity: &ValidatorIdentity,
    hash: &str,
) -> Result<()> {
    if subclient.is_refunded_already(&identity.0, hash).await? {
        return Err(BridgeError::AlreadyRefunded(hash.to_string()));
    }

    let refund_tx = subclient.get_refund_transaction(&identity.0, hash).await?;
    if refund_tx.signatures.is_empty() {
        return Err(BridgeError::ZeroSignatures(format!("refund {hash}")));
    }

    wallet
        .create_refund_payment_with_signatures_and_submit(
            &refund_tx.target,
            refund_tx.amount,
            hash,
            refund_tx.signatures,
            refund_tx.sequence_number,
        )
        .await?;

    subclient.set_refund_transaction_executed(&identity.0, hash).await?;
    info!(%hash, "refund payout executed");
    Ok(())
}

/// §4.7 `WithdrawCreated{id, source, target, amount}`.
pub async fn handle_withdraw_created(
    wallet: &dyn Wallet,
    subclient: &dyn SubClient,
    identity: &ValidatorIdentity,
    id: u64,
    source: &str,
    target: &str,
    amount: u64,
) -> Result<()> {
    if subclient.is_burned_already(&identity.0, id).await? {
        return Err(BridgeError::AlreadyBurned(id));
    }

    propose_or_remint_withdrawal(wallet, subclient, identity, id, Some(source), target, amount).await
}

/// §4.7 `WithdrawExpired{id, target, amount}` — same steps as `Created`
/// without the `IsBurnedAlready` guard (`spec.md` §9 notes this is safe
/// because the runtime would not re-expire an already-burned withdrawal).
///
/// The event carries no `source` field, so if the payout target turns out to
/// be invalid here there is no account to re-mint to from the event payload
/// alone; that case is treated as fatal rather than guessed at (`spec.md` §9
/// leaves this implementer's choice open).
pub async fn handle_withdraw_expired(
    wallet: &dyn Wallet,
    subclient: &dyn SubClient,
    identity: &ValidatorIdentity,
    id: u64,
    target: &str,
    amount: u64,
) -> Result<()> {
    propose_or_remint_withdrawal(wallet, subclient, identity, id, None, target, amount).await
}

async fn propose_or_remint_withdrawal(
    wallet: &dyn Wallet,
    subclient: &dyn SubClient,
    identity: &ValidatorIdentity,
    id: u64,
    source: Option<&str>,
    target: &str,
    amount: u64,
) -> Result<()> {
    if wallet.check_account(target).await.is_err() {
        let source = source.ok_or_else(|| {
            BridgeError::InvalidTargetAccount(format!("burn {id}: invalid target {target} and no source to re-mint to"))
        })?;

        // The payout target is not a valid Stellar account: the burn is
        // unrecoverable as a payout. Mint the amount back to the source
        // under a synthetic mint id, then retire the burn.
        let synthetic_mint_id = format!("refund-{id}");
        warn!(burn_id = id, %target, "invalid stellar target for burn payout, re-minting to source");

        if !subclient.is_minted_already(&identity.0, &synthetic_mint_id).await? {
            subclient.propose_or_vote_mint_transaction(&identity.0, &synthetic_mint_id, source, amount).await?;
        }
        subclient.set_burn_transaction_executed(&identity.0, id).await?;
        return Ok(());
    }

    let signature = wallet.create_payment_and_return_signature(target, amount, id).await?;
    subclient.propose_burn_transaction_or_add_sig(&identity.0, id, target, amount, &signature).await?;
    info!(burn_id = id, %target, amount, "submitted burn payout signature");
    Ok(())
}

/// §4.7 `WithdrawReady{id}`.
pub async fn handle_withdraw_ready(
    wallet: &dyn Wallet,
    subclient: &dyn SubClient,
    identity: &ValidatorIdentity,
    id: u64,
) -> Result<()> {
    if subclient.is_burned_already(&identity.0, id).await? {
        return Err(BridgeError::AlreadyBurned(id));
    }

    let burn_tx = subclient.get_burn_transaction(&identity.0, id).await?;
    if burn_tx.signatures.is_empty() {
        return Err(BridgeError::ZeroSignatures(format!("burn {id}")));
    }

    wallet
        .create_payment_with_signatures_and_submit(&burn_tx.target, burn_tx.amount, id, burn_tx.signatures, burn_tx.sequence_number)
        .await?;

    subclient.set_burn_transaction_executed(&identity.0, id).await?;
    info!(burn_id = id, "burn payout executed");
    Ok(())
}
