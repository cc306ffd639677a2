#![allow(clippy::bool_assert_comparison, clippy::type_complexity)]

//! A cluster-aware client for an HTTP key-value coordination service.
//!
//! The client keeps track of the cluster membership and sends every request to the leader:
//!
//! - When a member redirects a request, the client switches to the member it names and reloads
//!   the membership from there.
//! - When a member does not answer, the client drops it and tries the next known member.
//!
//! On top of it, [`Client::observe`] keeps a watch running in the background and delivers every
//! change under a prefix exactly once, in order.
//!
//! ```ignore
//! let client = Client::http(Config::default())?;
//! client.connect().await?;
//!
//! client.set("/foo", "bar", None).await?;
//! let observer = client.observe("/foo", None, |value: Option<&str>, key: &str, _info: &KeyInfo| {
//!     println!("{} = {:?}", key, value);
//! });
//! ```

mod client;
mod config;
mod endpoint;
mod key_info;
mod keys;
mod membership;

pub mod error;
pub mod network;
pub mod router;
pub mod watch;

#[cfg(test)] mod testing;

pub use anyerror;

pub use crate::client::Client;
pub use crate::config::Config;
pub use crate::config::ConfigError;
pub use crate::endpoint::Endpoint;
pub use crate::endpoint::InvalidEndpoint;
pub use crate::error::ClientError;
pub use crate::error::DecodeError;
pub use crate::error::NetworkError;
pub use crate::error::TransportError;
pub use crate::error::Unreachable;
pub use crate::key_info::extract_info;
pub use crate::key_info::Action;
pub use crate::key_info::KeyInfo;
pub use crate::key_info::Lookup;
pub use crate::membership::MembershipCache;
pub use crate::watch::ChannelHandler;
pub use crate::watch::Observer;
pub use crate::watch::WatchHandler;
