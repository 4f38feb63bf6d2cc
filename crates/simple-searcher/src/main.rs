//! Simple Searcher
//!
//! Places a fixed bid on every lot the Wallchain auction streams.

mod strategy;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use searcher_core::signing::BSC_CHAIN_ID;
use searcher_core::trace_context::{NoopPropagator, TracePropagator, TracingPropagator};
use searcher_core::{
    AuctionClient, AuctionConfig, LoggingResultSink, ReconnectPolicy, SearcherConfig,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strategy::SimpleSearcher;

/// Start searcher for Wallchain MEV auction
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base websocket url of the Wallchain auction, like ws://hostname
    #[arg(long, env = "AUCTION_URL")]
    auction_url: String,

    /// Authorization token for the auction API
    #[arg(long, env = "AUCTION_TOKEN", hide_env_values = true)]
    auction_token: String,

    /// Chain id used in signatures. Default is BNB
    #[arg(long, env = "CHAIN_ID", default_value_t = BSC_CHAIN_ID)]
    chain_id: u64,

    /// Address of Wallchain's capsule contract, used in signatures
    #[arg(long, env = "CAPSULE_ADDRESS")]
    capsule_address: String,

    /// Private key of the searcher contract owner, signs every SearcherRequest
    #[arg(long, env = "PRIVATE_KEY_HEX", hide_env_values = true)]
    private_key_hex: String,

    /// Address of the searcher's contract
    #[arg(long, env = "CONTRACT_ADDRESS")]
    contract_address: String,

    /// Record incoming trace context on lot spans
    #[arg(long, env = "OTEL_ENABLED")]
    otel_enabled: bool,

    /// Maximum number of reconnects before the process exits
    #[arg(long, env = "MAX_RECONNECTS", default_value_t = 10)]
    max_reconnects: u32,

    /// Wait this many seconds before reconnecting
    #[arg(long, env = "RECONNECT_TIMEOUT", default_value_t = 5)]
    reconnect_timeout: u64,

    /// Seconds between pings
    #[arg(long, env = "PING_INTERVAL", default_value_t = 10)]
    ping_interval: u64,

    /// Seconds to wait for pong before dropping the connection
    #[arg(long, env = "PING_TIMEOUT", default_value_t = 5)]
    ping_timeout: u64,
}

impl Args {
    fn searcher_config(&self) -> SearcherConfig {
        let mut auction = AuctionConfig::new(&self.auction_url, &self.auction_token);
        auction.ping_interval = Duration::from_secs(self.ping_interval);
        auction.ping_timeout = Duration::from_secs(self.ping_timeout);

        SearcherConfig {
            auction,
            chain_id: self.chain_id,
            capsule_address: self.capsule_address.clone(),
            private_key_hex: self.private_key_hex.clone(),
            reconnect: ReconnectPolicy {
                max_attempts: self.max_reconnects,
                backoff: Duration::from_secs(self.reconnect_timeout),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "simple_searcher=info,searcher_core=info,tungstenite=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args.searcher_config();
    config.validate().context("invalid configuration")?;

    let signer = config.signer()?;
    info!(
        searcher = %signer.address(),
        chain_id = config.chain_id,
        capsule = %config.capsule_address,
        "Starting simple searcher"
    );

    let propagator: Arc<dyn TracePropagator> = if args.otel_enabled {
        Arc::new(TracingPropagator)
    } else {
        Arc::new(NoopPropagator)
    };
    let client = AuctionClient::new(config.auction.clone(), signer).with_propagator(propagator);
    let searcher = SimpleSearcher::new(&args.contract_address).context("invalid contract address")?;

    client
        .run_forever(Arc::new(searcher), Arc::new(LoggingResultSink), config.reconnect)
        .await?;

    Ok(())
}
