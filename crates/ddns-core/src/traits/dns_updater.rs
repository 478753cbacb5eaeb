// # DNS Updater Trait
//
// Defines the interface for pushing an update to a dynamic DNS provider.
//
// ## Implementations
//
// - DynDNS2 (`/nic/update`): `ddns-provider-dyndns` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::DnsUpdater;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let updater = /* DnsUpdater implementation */;
//
//     // One authenticated request against the provider endpoint
//     let response = updater.update().await?;
//     println!("{}", response.body);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::Serialize;
use std::net::IpAddr;

/// Provider verdict carried in a successful response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpdateStatus {
    /// The record was changed (`good`)
    Good {
        /// Address the provider now serves, when echoed back
        ip: Option<IpAddr>,
    },
    /// The record already had this address (`nochg`)
    NoChange {
        /// Address the provider serves, when echoed back
        ip: Option<IpAddr>,
    },
    /// 2xx response whose body is not a known status code
    Unrecognized,
}

/// A completed update exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body, trimmed
    pub body: String,
    /// Parsed verdict
    pub outcome: UpdateStatus,
}

/// Trait for dynamic DNS update implementations
///
/// An updater owns everything needed for one request: the HTTP client,
/// the endpoint and the credentials. The engine only decides *when* to
/// call it and what to do when it fails.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (owned by `DdnsEngine`)
/// - ❌ Restart the network (owned by `DdnsEngine` via `NetworkRestarter`)
/// - ❌ Spawn tasks or threads
///
/// **Correct approach**: Return an error. The `DdnsEngine` decides whether
/// to recover and retry.
#[async_trait]
pub trait DnsUpdater: Send + Sync {
    /// Send one update request
    ///
    /// # Returns
    ///
    /// - `Ok(UpdateResponse)`: The provider accepted the update
    /// - `Err(Error::UpdateTransport)`: No response (connection, DNS, TLS, timeout)
    /// - `Err(Error::UpdateRejected)`: The provider answered with an error
    async fn update(&self) -> Result<UpdateResponse, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS updaters from configuration
pub trait DnsUpdaterFactory: Send + Sync {
    /// Create a DnsUpdater instance from configuration and loaded credentials
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
        credentials: &crate::credentials::Credentials,
    ) -> Result<Box<dyn DnsUpdater>, crate::Error>;
}
