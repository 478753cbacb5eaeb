// # Network Restarter Trait
//
// Defines the interface for bringing the host's network back after an
// update could not reach the provider.
//
// ## Implementations
//
// - systemd (`systemctl restart networking.service`): `ddns-restart-systemd` crate

use async_trait::async_trait;

/// Trait for network recovery implementations
///
/// # Outcome vs. Error
///
/// A restart that ran but did not succeed is a normal outcome and is
/// reported as `Ok(false)`. Only a restart that could not be started at
/// all is an `Err`.
///
/// # Bounded Execution
///
/// Implementations must not block forever; a hung command is reported as
/// `Ok(false)` once the implementation's timeout expires.
#[async_trait]
pub trait NetworkRestarter: Send + Sync {
    /// Restart the network
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: The network service restarted
    /// - `Ok(false)`: The restart ran but reported failure (or timed out)
    /// - `Err(Error::RestartInvocation)`: The restart could not be started
    async fn restart_network(&self) -> Result<bool, crate::Error>;

    /// Get the restarter name (for logging/debugging)
    fn restarter_name(&self) -> &'static str;
}

/// Helper trait for constructing network restarters from configuration
pub trait NetworkRestarterFactory: Send + Sync {
    /// Create a NetworkRestarter instance from configuration
    fn create(
        &self,
        config: &crate::config::RestartConfig,
    ) -> Result<Box<dyn NetworkRestarter>, crate::Error>;
}
