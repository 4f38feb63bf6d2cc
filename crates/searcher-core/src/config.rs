//! Configuration for the auction client and the searcher process.

use crate::signing::{BidSigner, DomainInfo, BSC_CHAIN_ID};
use crate::types::HexString;
use crate::{Error, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Path of the broadcaster endpoint, relative to the auction url.
pub const LISTEN_PATH: &str = "/broadcaster/listen";

/// Connection settings for one auction endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct AuctionConfig {
    /// Base websocket url, e.g. `wss://auction.example`.
    pub url: String,
    pub token: String,
    pub ping_interval: Duration,
    /// How long to wait for `pong` before declaring the connection broken.
    pub ping_timeout: Duration,
    pub response_timeout: Duration,
}

impl AuctionConfig {
    pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(10);
    pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            ping_interval: Self::DEFAULT_PING_INTERVAL,
            ping_timeout: Self::DEFAULT_PING_TIMEOUT,
            response_timeout: Self::DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    /// `<url>/broadcaster/listen?token=<token>`, validated as a ws(s) url.
    #[allow(clippy::result_large_err)]
    pub fn listen_url(&self) -> Result<Url> {
        let raw = format!("{}{}", self.url.trim_end_matches('/'), LISTEN_PATH);
        let mut url = Url::parse(&raw).map_err(|e| Error::Config {
            message: format!("invalid auction url {:?}: {e}", self.url),
        })?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(Error::Config {
                    message: format!("auction url must use ws or wss, got {other}"),
                })
            }
        }
        url.query_pairs_mut().append_pair("token", &self.token);
        Ok(url)
    }
}

impl std::fmt::Debug for AuctionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuctionConfig")
            .field("url", &self.url)
            .field("token", &"[REDACTED]")
            .field("ping_interval", &self.ping_interval)
            .field("ping_timeout", &self.ping_timeout)
            .field("response_timeout", &self.response_timeout)
            .finish()
    }
}

/// How often, and how patiently, to reconnect after a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff: Duration::from_secs(5),
        }
    }
}

/// Everything a searcher process needs to bid.
#[derive(Clone)]
pub struct SearcherConfig {
    pub auction: AuctionConfig,
    pub chain_id: u64,
    /// Capsule contract that verifies signatures.
    pub capsule_address: String,
    pub private_key_hex: String,
    pub reconnect: ReconnectPolicy,
}

impl SearcherConfig {
    /// Load configuration from environment variables.
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut auction =
            AuctionConfig::new(required("AUCTION_URL")?, required("AUCTION_TOKEN")?);
        auction.ping_interval = secs_or("PING_INTERVAL", auction.ping_interval)?;
        auction.ping_timeout = secs_or("PING_TIMEOUT", auction.ping_timeout)?;
        auction.response_timeout = secs_or("RESPONSE_TIMEOUT", auction.response_timeout)?;

        let defaults = ReconnectPolicy::default();
        let config = Self {
            auction,
            chain_id: parsed_or("CHAIN_ID", BSC_CHAIN_ID)?,
            capsule_address: required("CAPSULE_ADDRESS")?,
            private_key_hex: required("PRIVATE_KEY_HEX")?,
            reconnect: ReconnectPolicy {
                max_attempts: parsed_or("MAX_RECONNECTS", defaults.max_attempts)?,
                backoff: secs_or("RECONNECT_TIMEOUT", defaults.backoff)?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Check everything that can be checked without connecting.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        self.auction.listen_url()?;
        if self.reconnect.max_attempts == 0 {
            return Err(Error::Config {
                message: "max reconnects must be at least 1".to_string(),
            });
        }
        if self.auction.ping_timeout.is_zero() || self.auction.response_timeout.is_zero() {
            return Err(Error::Config {
                message: "timeouts must be positive".to_string(),
            });
        }
        self.signer().map(|_| ())
    }

    #[allow(clippy::result_large_err)]
    pub fn domain(&self) -> Result<DomainInfo> {
        let capsule = HexString::new(&self.capsule_address)
            .and_then(|hex| hex.to_address())
            .map_err(|e| Error::Config {
                message: format!("invalid capsule address: {e}"),
            })?;
        Ok(DomainInfo::capsule(self.chain_id, capsule))
    }

    #[allow(clippy::result_large_err)]
    pub fn signer(&self) -> Result<BidSigner> {
        BidSigner::from_private_key(&self.private_key_hex, self.domain()?)
    }
}

impl std::fmt::Debug for SearcherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearcherConfig")
            .field("auction", &self.auction)
            .field("chain_id", &self.chain_id)
            .field("capsule_address", &self.capsule_address)
            .field("private_key_hex", &"[REDACTED]")
            .field("reconnect", &self.reconnect)
            .finish()
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config {
        message: format!("{name} environment variable not set"),
    })
}

fn parsed_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| Error::Config {
            message: format!("{name} has invalid value {raw:?}"),
        }),
        Err(_) => Ok(default),
    }
}

fn secs_or(name: &str, default: Duration) -> Result<Duration> {
    parsed_or(name, default.as_secs_f64()).and_then(|secs| {
        Duration::try_from_secs_f64(secs).map_err(|e| Error::Config {
            message: format!("{name} is not a valid duration: {e}"),
        })
    })
}
