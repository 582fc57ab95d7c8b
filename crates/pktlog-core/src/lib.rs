//! # pktlog core
//!
//! Live-reconfigurable packet observation layer for a bidirectional relay.
//!
//! ## Architecture
//!
//! This crate provides:
//! - **Filter state** - lock-free, atomically replaceable allow-list
//! - **Hidden counters** - per-direction tallies of suppressed packets
//! - **Report cadence** - interruptible periodic reporting of those tallies
//! - **Relay loops** - forwarding between two [`Connection`]s with classification
//! - **Configuration** - TOML configuration and hot reload
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pktlog_core::{Config, PacketLogger};
//! use pktlog_core::observe::TracingSink;
//!
//! # async fn demo() -> pktlog_core::Result<()> {
//! let config = Config::load("config.toml")?;
//! let logger = PacketLogger::new(&config.observation(), Arc::new(TracingSink));
//!
//! // One session per relayed connection pair
//! let session = logger.session();
//! // pktlog_core::relay::relay(client, server, &session).await;
//! session.finish().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod filter;
pub mod observe;
pub mod packet;
pub mod relay;
pub mod reload;

// Re-exports for convenience
pub use config::{Config, ObservationSettings};
pub use error::{Error, Result};
pub use filter::FilterState;
pub use observe::{Cadence, HiddenCounter, PacketLogger, Session};
pub use packet::{Direction, Packet};
pub use relay::Connection;
