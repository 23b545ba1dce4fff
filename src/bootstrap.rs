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

//! Wires the concrete adapters together into a runnable `Bridge` and performs
//! the startup checks `spec.md` §7 requires before the event loop may run.

use anyhow::{bail, Context};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    config::Settings,
    event_loop::EventLoop,
    persistence::{FilePersistency, Persistency},
    subclient::{SubClient, TfchainClient},
    transfer::ValidatorIdentity,
    wallet::{StellarWallet, Wallet},
};

/// Bundles the long-lived collaborators. There is no other process-wide
/// mutable state (`spec.md` §9): everything the event loop needs flows
/// through this struct or through the channels it hands to `run`.
pub struct Bridge {
    pub wallet: StellarWallet,
    pub subclient: TfchainClient,
    pub persistency: FilePersistency,
    pub identity: ValidatorIdentity,
    pub deposit_fee: u64,
}

impl Bridge {
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        let wallet = StellarWallet::new(&settings.stellar).context("failed to construct stellar wallet")?;
        let subclient = TfchainClient::connect(&settings.tfchain_url, &settings.tfchain_seed)
            .await
            .context("failed to connect to chain-l1 rpc endpoint")?;

        let identity = ValidatorIdentity(wallet.address().to_string());

        if !subclient.is_validator(&identity.0).await.context("failed to check validator enrollment")? {
            bail!("identity {} is not an enrolled bridge validator, refusing to start", identity.0);
        }

        let persistency = FilePersistency::new(settings.persistency_file.clone());

        if settings.rescan_bridge_account {
            info!("rescan_bridge_account set, resetting persisted cursor and height to zero");
            persistency.save_stellar_cursor("").await.context("failed to reset stellar cursor")?;
            persistency.save_height(0).await.context("failed to reset height")?;
        }

        let deposit_fee = subclient.get_deposit_fee(&identity.0).await.context("failed to fetch deposit fee")?;

        Ok(Self { wallet, subclient, persistency, identity, deposit_fee })
    }

    /// Spawns the two event producers and runs the coordinator until
    /// `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let snapshot = self.persistency.get_height().await;

        let stellar_payments = self.wallet.monitor_bridge_account_and_mint(shutdown.clone(), snapshot.stellar_cursor);
        let bridge_events = self.subclient.subscribe_bridge_events().await.context("failed to subscribe to bridge events")?;

        let event_loop = EventLoop {
            wallet: &self.wallet,
            subclient: &self.subclient,
            persistency: &self.persistency,
            identity: ValidatorIdentity(self.identity.0.clone()),
            deposit_fee: self.deposit_fee,
        };

        event_loop.run(shutdown, stellar_payments, bridge_events).await
    }
}
