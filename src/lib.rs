//! Buildkite resource provider.
//!
//! [`client`] talks to Buildkite's REST and GraphQL APIs; [`provider`] maps
//! host-managed resource state onto it.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod provider;

pub use error::{BuildkiteError, ErrorKind, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
