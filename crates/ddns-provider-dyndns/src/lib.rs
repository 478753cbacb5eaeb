// # DynDNS2 Provider
//
// This crate provides the DynDNS2 (`/nic/update`) updater for the DDNS
// system. The protocol is spoken by Google Domains, DNS-O-Matic, No-IP
// and most dynamic DNS services.
//
// ## Implementation
//
// - One authenticated GET per `update()` call
// - HTTP timeout on every request (default 10 seconds)
// - Explicit trust pool, with an insecure variant for self-signed endpoints
// - Non-2xx responses and DynDNS2 error codes are reported as rejections
// - ❌ NO retry logic (owned by DdnsEngine)
// - ❌ NO network recovery (owned by DdnsEngine)
//
// ## Security Requirements
//
// - Password NEVER appears in logs
// - Credentials come from the credentials file only
//
// ## API Reference
//
// ```http
// GET /nic/update?hostname=home.example.net
// Authorization: Basic <base64(username:password)>
// User-Agent: ddnsd/<version>
// ```

pub mod client;
pub mod response;

pub use client::{ClientFactory, TrustPool};

use async_trait::async_trait;
use ddns_core::config::ProviderConfig;
use ddns_core::traits::{DnsUpdater, DnsUpdaterFactory, UpdateResponse};
use ddns_core::{Credentials, Error, Result};
use reqwest::Url;
use std::error::Error as _;
use std::time::Duration;

/// DynDNS2 updater
///
/// Holds a ready client and the request parts (endpoint with the
/// `hostname` query parameter, credentials); every call sends the same
/// request.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the password.
pub struct DynDnsUpdater {
    /// HTTP client (timeout and trust pool already applied)
    client: reqwest::Client,

    /// Update URL including the `hostname` parameter
    url: Url,

    /// Basic-auth credentials
    credentials: Credentials,
}

impl std::fmt::Debug for DynDnsUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynDnsUpdater")
            .field("url", &self.url.as_str())
            .field("username", &self.credentials.username())
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl DynDnsUpdater {
    /// Create a new DynDNS2 updater
    ///
    /// # Parameters
    ///
    /// - `client`: HTTP client, usually from [`ClientFactory`]
    /// - `update_url`: Endpoint, e.g. `https://domains.google.com/nic/update`
    /// - `hostname`: Record to update
    /// - `credentials`: Basic-auth credentials
    pub fn new(
        client: reqwest::Client,
        update_url: &str,
        hostname: &str,
        credentials: Credentials,
    ) -> Result<Self> {
        let mut url = Url::parse(update_url)
            .map_err(|e| Error::config(format!("Invalid update URL {}: {}", update_url, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "Update URL must use HTTP or HTTPS scheme. Got: {}",
                update_url
            )));
        }

        url.query_pairs_mut().append_pair("hostname", hostname);

        Ok(Self {
            client,
            url,
            credentials,
        })
    }

    /// Request URL, including the hostname parameter
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl DnsUpdater for DynDnsUpdater {
    async fn update(&self) -> Result<UpdateResponse> {
        tracing::debug!("GET {}", self.url);

        let response = self
            .client
            .get(self.url.clone())
            .basic_auth(self.credentials.username(), Some(self.credentials.password()))
            .send()
            .await
            .map_err(|e| Error::transport(describe(&e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("Failed to read response body: {}", describe(&e))))?;

        response::classify(status, &body)
    }

    fn provider_name(&self) -> &'static str {
        "dyndns"
    }
}

/// Flatten a reqwest error and its sources into one line
fn describe(err: &reqwest::Error) -> String {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };

    let mut message = format!("{}: {}", kind, err);
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Factory for creating DynDNS2 updaters from configuration
///
/// The trust pool is built by the caller (reading a CA bundle is I/O)
/// and shared by every client the factory creates.
#[derive(Debug, Clone, Default)]
pub struct DynDnsFactory {
    pool: TrustPool,
}

impl DynDnsFactory {
    /// Create a factory whose clients trust `pool`
    pub fn new(pool: TrustPool) -> Self {
        Self { pool }
    }
}

impl DnsUpdaterFactory for DynDnsFactory {
    fn create(
        &self,
        config: &ProviderConfig,
        credentials: &Credentials,
    ) -> Result<Box<dyn DnsUpdater>> {
        config.validate()?;

        let factory = ClientFactory::new(
            Duration::from_secs(config.timeout_secs),
            self.pool.clone(),
        );

        if !config.tls.verify_certificates {
            tracing::warn!("Certificate verification DISABLED for {}", config.update_url);
        }
        let client = factory.new_client(config.tls.verify_certificates)?;

        Ok(Box::new(DynDnsUpdater::new(
            client,
            &config.update_url,
            &config.hostname,
            credentials.clone(),
        )?))
    }
}
