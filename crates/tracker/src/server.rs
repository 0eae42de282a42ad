//! TCP front end of the registry.

use crate::config::TrackerConfig;
use crate::error::Result;
use crate::registry::{Registry, TrackerCommand};
use crate::wire::{self, FrameLimits};
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

/// Registry server: one command per inbound connection.
pub struct TrackerServer {
    listener: TcpListener,
    registry: Registry,
    limits: FrameLimits,
}

impl TrackerServer {
    /// Bind the listening socket.
    pub async fn bind(config: &TrackerConfig) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr).await?;
        Ok(Self {
            listener,
            registry: Registry::new(),
            limits: config.frame_limits(),
        })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// A handle on the served registry.
    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    /// Accept connections forever.
    pub async fn run(self) -> Result<()> {
        tracing::info!("Tracker listening on {}", self.local_addr()?);

        loop {
            match self.listener.accept().await {
                Ok((stream, remote)) => {
                    let registry = self.registry.clone();
                    let limits = self.limits;
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, registry, limits).await {
                            tracing::warn!("Tracker connection from {} failed: {}", remote, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept tracker connection: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    registry: Registry,
    limits: FrameLimits,
) -> Result<()> {
    let line = match wire::read_line(&mut stream, &limits).await? {
        Some(line) => line,
        None => return Ok(()),
    };
    tracing::debug!("tracker request: {}", line);

    let command = TrackerCommand::parse(&line)?;
    if let Some(reply) = registry.apply(&command).await {
        stream.write_all(reply.as_bytes()).await?;
        stream.shutdown().await?;
    }
    Ok(())
}
