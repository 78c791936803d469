//! Remote web API access.

pub mod client;

pub use client::{SnapshotSource, WebClient};
