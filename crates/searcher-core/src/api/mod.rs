//! Client for the Wallchain auction.

pub mod auction;
pub mod retry;

pub use auction::{keep_alive, AuctionClient, BidSubmitter, MAKE_BID, PING, PONG, USER_TRANSACTION};
pub use retry::run_with_retries;
