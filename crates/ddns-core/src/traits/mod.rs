//! Core traits for the DDNS system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DnsUpdater`]: Push an update to the DNS provider
//! - [`NetworkRestarter`]: Recover the host's network stack

pub mod dns_updater;
pub mod network_restarter;

pub use dns_updater::{DnsUpdater, DnsUpdaterFactory, UpdateResponse, UpdateStatus};
pub use network_restarter::{NetworkRestarter, NetworkRestarterFactory};
