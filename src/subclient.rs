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

//! The chain-L1 RPC client interface: extrinsic proposals, typed event
//! subscription, idempotency queries and identity lookups.
//!
//! `spec.md` §1 treats this as an external collaborator, analogous to the
//! teacher's `StateChainClient` (`engine/src/state_chain/client.rs`) and its
//! `sc_observer` event dispatch loop. `TfchainClient` below talks to a
//! substrate node's JSON-RPC surface through a handful of custom RPC methods
//! a `tft-bridge` pallet would expose, the same shape as the teacher's
//! `ElectoralApi`/`StorageApi` client traits.

use async_trait::async_trait;
use jsonrpsee::{
    core::client::{ClientT, SubscriptionClientT},
    http_client::{HttpClient, HttpClientBuilder},
    rpc_params,
    ws_client::{WsClient, WsClientBuilder},
};
use tokio::sync::mpsc;
use tracing::{info, warn, Instrument};

use crate::{
    error::{BridgeError, Result},
    model::{BurnTransaction, EventBatch, Entity, Farm, Node, PartialSignature, RefundTransaction, Twin},
};

/// Bridge network label this daemon identifies as to the chain-L1 runtime.
pub const BRIDGE_NETWORK: &str = "stellar";

#[cfg_attr(feature = "test-util", mockall::automock)]
#[async_trait]
pub trait SubClient: Send + Sync {
    async fn is_validator(&self, identity: &str) -> Result<bool>;

    /// Subscribes to per-block batches of bridge events. The stream ends on
    /// cancellation or unrecoverable connection loss.
    async fn subscribe_bridge_events(&self) -> Result<mpsc::Receiver<EventBatch>>;

    async fn is_minted_already(&self, identity: &str, mint_id: &str) -> Result<bool>;
    async fn is_refunded_already(&self, identity: &str, hash: &str) -> Result<bool>;
    async fn is_burned_already(&self, identity: &str, burn_id: u64) -> Result<bool>;

    async fn propose_or_vote_mint_transaction(&self, identity: &str, mint_id: &str, target: &str, amount: u64) -> Result<()>;
    async fn propose_burn_transaction_or_add_sig(
        &self,
        identity: &str,
        burn_id: u64,
        target: &str,
        amount: u64,
        signature: &PartialSignature,
    ) -> Result<()>;
    async fn create_refund_transaction_or_add_sig(
        &self,
        identity: &str,
        hash: &str,
        target: &str,
        amount: u64,
        signature: &PartialSignature,
    ) -> Result<()>;
    async fn set_burn_transaction_executed(&self, identity: &str, burn_id: u64) -> Result<()>;
    async fn set_refund_transaction_executed(&self, identity: &str, hash: &str) -> Result<()>;

    async fn get_burn_transaction(&self, identity: &str, burn_id: u64) -> Result<BurnTransaction>;
    async fn get_refund_transaction(&self, identity: &str, hash: &str) -> Result<RefundTransaction>;
    async fn get_deposit_fee(&self, identity: &str) -> Result<u64>;

    async fn get_twin(&self, id: u64) -> Result<Twin>;
    async fn get_farm(&self, id: u64) -> Result<Farm>;
    async fn get_node(&self, id: u64) -> Result<Node>;
    async fn get_entity(&self, id: u64) -> Result<Entity>;
}

pub struct TfchainClient {
    http: HttpClient,
    ws_url: String,
}

impl TfchainClient {
    pub async fn connect(url: &str, _seed: &str) -> anyhow::Result<Self> {
        let http = HttpClientBuilder::default().build(url)?;
        Ok(Self { http, ws_url: url.replace("http://", "ws://").replace("https://", "wss://") })
    }

    async fn call<T: serde::de::DeserializeOwned>(&self, method: &str, params: jsonrpsee::core::params::ArrayParams) -> Result<T> {
        self.http.request(method, params).await.map_err(|e| BridgeError::Transient(e.into()))
    }
}

#[async_trait]
impl SubClient for TfchainClient {
    async fn is_validator(&self, identity: &str) -> Result<bool> {
        self.call("tftBridge_isValidator", rpc_params![identity, BRIDGE_NETWORK]).await
    }

    async fn subscribe_bridge_events(&self) -> Result<mpsc::Receiver<EventBatch>> {
        let ws = WsClientBuilder::default()
            .build(&self.ws_url)
            .await
            .map_err(|e| BridgeError::Transient(e.into()))?;

        let (tx, rx) = mpsc::channel(16);
        let span = tracing::info_span!("subclient_subscription", component = "subclient_subscription");
        tokio::spawn(drive_event_subscription(ws, tx).instrument(span));
        Ok(rx)
    }

    async fn is_minted_already(&self, identity: &str, mint_id: &str) -> Result<bool> {
        // `IsMintedAlready` may return a distinguished "not found" error,
        // which we treat as `false` (`spec.md` §4.3).
        match self.call::<bool>("tftBridge_isMintedAlready", rpc_params![identity, mint_id]).await {
            Ok(v) => Ok(v),
            Err(BridgeError::Transient(e)) if e.to_string().contains("NotFound") => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn is_refunded_already(&self, identity: &str, hash: &str) -> Result<bool> {
        self.call("tftBridge_isRefundedAlready", rpc_params![identity, hash]).await
    }

    async fn is_burned_already(&self, identity: &str, burn_id: u64) -> Result<bool> {
        self.call("tftBridge_isBurnedAlready", rpc_params![identity, burn_id]).await
    }

    async fn propose_or_vote_mint_transaction(&self, identity: &str, mint_id: &str, target: &str, amount: u64) -> Result<()> {
        info!(%mint_id, %target, amount, "proposing mint transaction");
        self.call("tftBridge_proposeOrVoteMintTransaction", rpc_params![identity, mint_id, target, amount]).await
    }

    async fn propose_burn_transaction_or_add_sig(
        &self,
        identity: &str,
        burn_id: u64,
        target: &str,
        amount: u64,
        signature: &PartialSignature,
    ) -> Result<()> {
        info!(burn_id, %target, amount, "proposing/voting burn transaction");
        self.call(
            "tftBridge_proposeBurnTransactionOrAddSig",
            rpc_params![identity, burn_id, target, amount, hex::encode(&signature.signature), &signature.signer_address, signature.sequence_number],
        )
        .await
    }

    async fn create_refund_transaction_or_add_sig(
        &self,
        identity: &str,
        hash: &str,
        target: &str,
        amount: u64,
        signature: &PartialSignature,
    ) -> Result<()> {
        info!(%hash, %target, amount, "creating/voting refund transaction");
        self.call(
            "tftBridge_createRefundTransactionOrAddSig",
            rpc_params![identity, hash, target, amount, hex::encode(&signature.signature), &signature.signer_address, signature.sequence_number],
        )
        .await
    }

    async fn set_burn_transaction_executed(&self, identity: &str, burn_id: u64) -> Result<()> {
        self.call("tftBridge_setBurnTransactionExecuted", rpc_params![identity, burn_id]).await
    }

    async fn set_refund_transaction_executed(&self, identity: &str, hash: &str) -> Result<()> {
        self.call("tftBridge_setRefundTransactionExecuted", rpc_params![identity, hash]).await
    }

    async fn get_burn_transaction(&self, identity: &str, burn_id: u64) -> Result<BurnTransaction> {
        self.call("tftBridge_getBurnTransaction", rpc_params![identity, burn_id]).await
    }

    async fn get_refund_transaction(&self, identity: &str, hash: &str) -> Result<RefundTransaction> {
        self.call("tftBridge_getRefundTransaction", rpc_params![identity, hash]).await
    }

    async fn get_deposit_fee(&self, identity: &str) -> Result<u64> {
        self.call("tftBridge_getDepositFee", rpc_params![identity]).await
    }

    async fn get_twin(&self, id: u64) -> Result<Twin> {
        self.call("tfgridModule_getTwin", rpc_params![id]).await
    }

    async fn get_farm(&self, id: u64) -> Result<Farm> {
        self.call("tfgridModule_getFarm", rpc_params![id]).await
    }

    async fn get_node(&self, id: u64) -> Result<Node> {
        self.call("tfgridModule_getNode", rpc_params![id]).await
    }

    async fn get_entity(&self, id: u64) -> Result<Entity> {
        self.call("tfgridModule_getEntity", rpc_params![id]).await
    }
}

/// Subscribes to the node's `tftBridge_events` subscription and forwards each
/// finalized block's event batch, until the connection drops or the receiver
/// is gone.
async fn drive_event_subscription(ws: WsClient, tx: mpsc::Sender<EventBatch>) {
    let mut subscription = match ws
        .subscribe::<EventBatch, _>("tftBridge_subscribeEvents", rpc_params![], "tftBridge_unsubscribeEvents")
        .await
    {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "could not subscribe to bridge events");
            return;
        }
    };

    use futures::StreamExt;
    while let Some(next) = subscription.next().await {
        match next {
            Ok(batch) => {
                if tx.send(batch).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, "bridge event subscription errored, ending");
                return;
            }
        }
    }
}
