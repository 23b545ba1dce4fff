//! Health check listener for the daemon.
//!
//! Returns a bare HTTP 200 OK to any request on `{hostname}:{port}/health` so
//! an external process supervisor can probe liveness. Modeled on the
//! teacher's `engine::health::HealthChecker`, which serves the same purpose
//! for the chainflip engine process.

use anyhow::Context;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};
use tracing::{error, info, warn};

use crate::config::HealthCheckConfig;

pub struct HealthChecker {
    listener: TcpListener,
}

impl HealthChecker {
    pub async fn new(settings: &HealthCheckConfig) -> anyhow::Result<Self> {
        let bind_address = format!("{}:{}", settings.hostname, settings.port);
        info!(bind_address = %bind_address, "starting health check listener");
        let listener = TcpListener::bind(&bind_address)
            .await
            .with_context(|| format!("could not bind health check listener to {bind_address}"))?;
        Ok(Self { listener })
    }

    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((mut stream, _addr)) => {
                    if let Err(e) = Self::respond(&mut stream).await {
                        warn!(error = %e, "health check request failed");
                    }
                }
                Err(e) => error!(error = %e, "could not accept health check connection"),
            }
        }
    }

    async fn respond(stream: &mut tokio::net::TcpStream) -> anyhow::Result<()> {
        let mut buffer = [0u8; 1024];
        stream.read(&mut buffer).await.context("reading health check request")?;

        let mut headers = [httparse::EMPTY_HEADER; 16];
        let mut request = httparse::Request::new(&mut headers);
        request.parse(&buffer).context("parsing health check request")?;

        let response = if request.path == Some("/health") {
            "HTTP/1.1 200 OK\r\n\r\n"
        } else {
            "HTTP/1.1 404 Not Found\r\n\r\n"
        };

        stream.write_all(response.as_bytes()).await.context("writing health check response")?;
        stream.flush().await.context("flushing health check response")?;
        Ok(())
    }
}
