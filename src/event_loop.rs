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

//! The coordinator: a single cooperative loop multiplexing the two event
//! producers (`spec.md` §5), Stellar payments and chain-L1 bridge events.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    error::BridgeError,
    model::{BridgeEvent, EventBatch, StellarPayment},
    persistence::Persistency,
    subclient::SubClient,
    transfer::{self, MintOutcome, ValidatorIdentity},
    wallet::Wallet,
};

/// Fixed backoff between retries of a failed mint attempt (`spec.md` §4.8).
const MINT_RETRY_BACKOFF: Duration = Duration::from_secs(10);

pub struct EventLoop<'a> {
    pub wallet: &'a dyn Wallet,
    pub subclient: &'a dyn SubClient,
    pub persistency: &'a dyn Persistency,
    pub identity: ValidatorIdentity,
    pub deposit_fee: u64,
}

impl<'a> EventLoop<'a> {
    /// Runs until `shutdown` is cancelled or a producer channel closes.
    #[tracing::instrument(skip_all, fields(component = "event_loop"))]
    pub async fn run(
        &self,
        shutdown: CancellationToken,
        mut stellar_payments: mpsc::Receiver<StellarPayment>,
        mut bridge_events: mpsc::Receiver<EventBatch>,
    ) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("shutdown requested, stopping event loop");
                    return Ok(());
                }

                payment = stellar_payments.recv() => {
                    match payment {
                        Some(payment) => self.handle_stellar_payment_with_retry(&shutdown, payment).await,
                        None => {
                            warn!("stellar payment stream ended");
                            return Ok(());
                        }
                    }
                }

                batch = bridge_events.recv() => {
                    match batch {
                        Some(batch) => self.handle_event_batch(batch).await?,
                        None => {
                            warn!("bridge event stream ended");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Mint handling retries on a fixed backoff rather than terminating the
    /// loop, since the Stellar-side cursor only advances once routing
    /// succeeds (`spec.md` §4.8).
    async fn handle_stellar_payment_with_retry(&self, shutdown: &CancellationToken, payment: StellarPayment) {
        loop {
            match transfer::handle_stellar_payment(self.wallet, self.subclient, &self.identity, self.deposit_fee, &payment).await {
                Ok(outcome) => {
                    self.log_mint_outcome(&payment, &outcome);
                    if let Err(e) = self.persistency.save_stellar_cursor(&payment.paging_token).await {
                        warn!(error = %e, "failed to persist stellar cursor");
                    }
                    return;
                }
                Err(e) if e.is_already_done() => {
                    // A concurrent validator beat us to it; treat as success.
                    info!(tx_hash = %payment.tx_hash, error = %e, "routing already completed by another validator");
                    if let Err(e) = self.persistency.save_stellar_cursor(&payment.paging_token).await {
                        warn!(error = %e, "failed to persist stellar cursor");
                    }
                    return;
                }
                Err(e) => {
                    error!(tx_hash = %payment.tx_hash, error = %e, "mint routing failed, retrying");
                    tokio::select! {
                        _ = shutdown.cancelled() => return,
                        _ = tokio::time::sleep(MINT_RETRY_BACKOFF) => {}
                    }
                }
            }
        }
    }

    fn log_mint_outcome(&self, payment: &StellarPayment, outcome: &MintOutcome) {
        match outcome {
            MintOutcome::Minted { mint_id, target, amount } => {
                info!(%mint_id, %target, amount, "mint routed");
            }
            MintOutcome::RefundInitiated { target, amount } => {
                info!(tx_hash = %payment.tx_hash, %target, amount, "refund routed");
            }
            MintOutcome::Skipped => {
                info!(tx_hash = %payment.tx_hash, "payment skipped");
            }
        }
    }

    /// Processes one block's worth of chain-L1 events in the fixed order
    /// required by `spec.md` §4.8. Any handler error here is fatal: unlike
    /// the mint path, there is no local retry loop for chain-L1 events, since
    /// the runtime will re-emit the unresolved event on a future block.
    async fn handle_event_batch(&self, batch: EventBatch) -> anyhow::Result<()> {
        for event in &batch.withdraw_created {
            if let BridgeEvent::WithdrawCreated { id, source_chain_l1, target_stellar, amount } = event {
                self.run_or_skip_already_done(
                    transfer::handle_withdraw_created(self.wallet, self.subclient, &self.identity, *id, source_chain_l1, target_stellar, *amount).await,
                )?;
            }
        }

        for event in &batch.withdraw_expired {
            if let BridgeEvent::WithdrawExpired { id, target_stellar, amount } = event {
                self.run_or_skip_already_done(
                    transfer::handle_withdraw_expired(self.wallet, self.subclient, &self.identity, *id, target_stellar, *amount).await,
                )?;
            }
        }

        for event in &batch.withdraw_ready {
            if let BridgeEvent::WithdrawReady { id } = event {
                self.run_or_skip_already_done(transfer::handle_withdraw_ready(self.wallet, self.subclient, &self.identity, *id).await)?;
            }
        }

        for event in &batch.refund_ready {
            if let BridgeEvent::RefundReady { hash } = event {
                self.run_or_skip_already_done(transfer::handle_refund_ready(self.wallet, self.subclient, &self.identity, hash).await)?;
            }
        }

        for event in &batch.refund_expired {
            if let BridgeEvent::RefundExpired { hash, target, amount } = event {
                self.run_or_skip_already_done(
                    transfer::handle_refund_expired(self.wallet, self.subclient, &self.identity, hash, target, *amount).await,
                )?;
            }
        }

        if let Err(e) = self.persistency.save_height(batch.height).await {
            warn!(height = batch.height, error = %e, "failed to persist chain-l1 height");
        }

        Ok(())
    }

    fn run_or_skip_already_done(&self, result: Result<(), BridgeError>) -> anyhow::Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_already_done() => {
                info!(error = %e, "event already resolved by another validator");
                Ok(())
            }
            Err(e) => Err(anyhow::Error::new(e).context("fatal error handling chain-L1 bridge event")),
        }
    }
}
