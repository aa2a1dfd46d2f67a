//! Client adapters for each transport, plus the commands the binary runs.

pub mod duplex;
pub mod error;
pub mod poll;
pub mod publish;
pub mod sse;
pub mod stream;

use anyhow::{Context, Result};
use futures::StreamExt;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ClientConfig;
pub use duplex::{DuplexClient, Exchange};
pub use error::ClientError;
pub use poll::{PollClient, PollEvent, PollLoop};
pub use publish::publish;
pub use sse::SseDecoder;
pub use stream::StreamClient;

fn report_unavailable(config: &ClientConfig) {
    eprintln!("[pushpull: server unavailable at {}]", config.base_url);
}

/// `pushpull publish <message>`
pub async fn publish_command(config: &ClientConfig, message: &str) -> Result<()> {
    let http = reqwest::Client::new();
    match publish(&http, config, message).await {
        Ok(resp) => {
            println!("{} (version {})", resp.status, resp.version);
            Ok(())
        }
        Err(ClientError::Unavailable) => {
            report_unavailable(config);
            Ok(())
        }
        Err(e) => Err(e).context("Failed to publish update"),
    }
}

/// `pushpull poll` - runs until `stop` is cancelled.
pub async fn poll_command(config: &ClientConfig, stop: &CancellationToken) -> Result<()> {
    let client = PollClient::new(reqwest::Client::new(), config);
    let mut poller = PollLoop::new(client, config.poll_interval);

    info!(url = %config.url("/poll"), "Long-polling for updates");
    let result = poller
        .run(stop, |event| match event {
            PollEvent::Update { message, .. } => println!("New message: {}", message),
            PollEvent::NoUpdate { .. } => println!("No new messages"),
        })
        .await;
    result.context("Long-poll stopped")
}

/// `pushpull stream` - prints events until the server ends the stream.
pub async fn stream_command(config: &ClientConfig, stop: &CancellationToken) -> Result<()> {
    let client = StreamClient::new(reqwest::Client::new(), config);
    let events = match client.subscribe().await {
        Ok(events) => events,
        Err(ClientError::Unavailable) => {
            report_unavailable(config);
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to open event stream"),
    };

    let mut events = std::pin::pin!(events.take_until(stop.cancelled()));
    while let Some(event) = events.next().await {
        match event {
            Ok(data) => println!("Received: {}", data),
            Err(e) => {
                warn!("Event stream ended: {}", e);
                break;
            }
        }
    }
    Ok(())
}

/// `pushpull duplex` - prompt, send, print the reply, repeat.
pub async fn duplex_command(config: &ClientConfig, stop: &CancellationToken) -> Result<()> {
    let mut client = match DuplexClient::connect(config).await {
        Ok(client) => client,
        Err(ClientError::Unavailable) => {
            report_unavailable(config);
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to open duplex session"),
    };
    println!("Connected to server");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("client >> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            _ = stop.cancelled() => break,
            line = lines.next_line() => line.context("Failed to read stdin")?,
        };
        let Some(line) = line else { break };

        match client.exchange(&line).await {
            Ok(Exchange::Reply(reply)) => println!("Server >> {}", reply),
            Ok(Exchange::Terminated) => break,
            Ok(Exchange::Closed) => {
                println!();
                eprintln!("[pushpull: server closed the session]");
                return Ok(());
            }
            Err(e) => return Err(e).context("Duplex session failed"),
        }
    }

    client.close().await?;
    Ok(())
}
