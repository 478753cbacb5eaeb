//! HTTP client factory
//!
//! Builds `reqwest` clients bound to a request timeout and an explicit
//! trust pool. The pool is an ordinary value built once at startup and
//! handed to the factory; there is no process-global certificate state.

use ddns_core::{Error, Result};
use reqwest::{Certificate, Client, ClientBuilder};
use std::path::Path;
use std::time::Duration;

/// Default per-request timeout (10 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// User agent sent with every request
///
/// DynDNS2 providers answer `badagent` to clients without one.
const USER_AGENT: &str = concat!("ddnsd/", env!("CARGO_PKG_VERSION"));

/// Set of certificate authorities a client trusts
///
/// The bundled set is the Mozilla root program compiled into the binary,
/// so the daemon does not depend on the host's CA store being current.
#[derive(Clone)]
pub struct TrustPool {
    /// Certificates added on top of (or instead of) the bundled roots
    certificates: Vec<Certificate>,

    /// Whether the bundled roots are trusted
    include_bundled: bool,
}

impl std::fmt::Debug for TrustPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustPool")
            .field("extra_certificates", &self.certificates.len())
            .field("include_bundled", &self.include_bundled)
            .finish()
    }
}

impl TrustPool {
    /// Trust the bundled root certificates only
    pub fn bundled() -> Self {
        Self {
            certificates: Vec::new(),
            include_bundled: true,
        }
    }

    /// Trust the bundled roots plus every certificate in a PEM bundle
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        Ok(Self {
            certificates: parse_bundle(pem)?,
            include_bundled: true,
        })
    }

    /// Trust exactly the certificates in a PEM bundle
    pub fn only_pem(pem: &[u8]) -> Result<Self> {
        Ok(Self {
            certificates: parse_bundle(pem)?,
            include_bundled: false,
        })
    }

    /// Trust the bundled roots plus every certificate in a PEM file
    pub async fn from_pem_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pem = tokio::fs::read(path).await.map_err(|e| {
            Error::tls(format!("Failed to read CA bundle {}: {}", path.display(), e))
        })?;
        Self::from_pem(&pem)
    }

    /// Number of certificates added to the bundled roots
    pub fn extra_certificates(&self) -> usize {
        self.certificates.len()
    }

    /// Whether the bundled roots are trusted
    pub fn includes_bundled(&self) -> bool {
        self.include_bundled
    }

    fn apply(&self, mut builder: ClientBuilder) -> ClientBuilder {
        builder = builder.tls_built_in_root_certs(self.include_bundled);
        for certificate in &self.certificates {
            builder = builder.add_root_certificate(certificate.clone());
        }
        builder
    }
}

impl Default for TrustPool {
    fn default() -> Self {
        Self::bundled()
    }
}

fn parse_bundle(pem: &[u8]) -> Result<Vec<Certificate>> {
    let certificates = Certificate::from_pem_bundle(pem)
        .map_err(|e| Error::tls(format!("Invalid PEM bundle: {}", e)))?;

    if certificates.is_empty() {
        return Err(Error::tls("PEM bundle contains no certificates"));
    }
    Ok(certificates)
}

/// Builds HTTP clients sharing one timeout and one trust pool
#[derive(Debug, Clone)]
pub struct ClientFactory {
    timeout: Duration,
    pool: TrustPool,
}

impl ClientFactory {
    /// Create a factory
    pub fn new(timeout: Duration, pool: TrustPool) -> Self {
        Self { timeout, pool }
    }

    /// Build a client
    ///
    /// # Parameters
    ///
    /// - `verify_certificates`: `false` skips server certificate
    ///   verification entirely (self-signed endpoints). The trust pool is
    ///   still installed.
    pub fn new_client(&self, verify_certificates: bool) -> Result<Client> {
        let builder = Client::builder()
            .use_rustls_tls()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(!verify_certificates);

        self.pool
            .apply(builder)
            .build()
            .map_err(|e| Error::tls(format!("Failed to build HTTP client: {}", e)))
    }

    /// Build a client that verifies server certificates against the pool
    pub fn secure_client(&self) -> Result<Client> {
        self.new_client(true)
    }

    /// Build a client without certificate verification
    pub fn insecure_client(&self) -> Result<Client> {
        self.new_client(false)
    }

    /// Timeout applied to every request
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Trust pool installed in every client
    pub fn pool(&self) -> &TrustPool {
        &self.pool
    }
}

impl Default for ClientFactory {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, TrustPool::bundled())
    }
}
