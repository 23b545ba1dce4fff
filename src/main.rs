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

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use bridge::{
    bootstrap::Bridge,
    config::{CommandLineOptions, Settings},
    health::HealthChecker,
    logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let opts = CommandLineOptions::parse();
    let settings = Settings::load(opts).context("failed to load configuration")?;

    info!(tfchain_url = %settings.tfchain_url, "starting tfchain <-> stellar bridge daemon");

    let shutdown = CancellationToken::new();

    if let Some(health_check) = &settings.health_check {
        let checker = HealthChecker::new(health_check).await.context("failed to start health check listener")?;
        tokio::spawn(checker.run());
    }

    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal");
            shutdown_signal.cancel();
        }
    });

    let bridge = Bridge::new(&settings).await.context("failed to initialize bridge")?;

    if let Err(e) = bridge.run(shutdown).await {
        error!(error = %e, "bridge event loop exited with an error");
        return Err(e.context("bridge event loop terminated"));
    }

    Ok(())
}
