//! Error types for the DDNS system
//!
//! This module defines all error types used throughout the crate.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// The credentials file could not be opened or read
    #[error("Credentials unavailable at {}: {source}", path.display())]
    CredentialsUnavailable {
        /// Path that was read
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The credentials file did not contain a usable credential pair
    #[error("Credentials malformed at {}: {reason}", path.display())]
    CredentialsMalformed {
        /// Path that was read
        path: PathBuf,
        /// What was wrong with the content
        reason: String,
    },

    /// In-memory credentials were rejected
    #[error("Credentials invalid: {0}")]
    CredentialsInvalid(String),

    /// The update request never produced a response
    ///
    /// Connection refused, DNS resolution failure, TLS failure, timeout.
    #[error("Update transport error: {0}")]
    UpdateTransport(String),

    /// The provider answered, but did not accept the update
    #[error("Update rejected (HTTP {status}): {body}")]
    UpdateRejected {
        /// HTTP status code of the response
        status: u16,
        /// Response body as returned by the provider
        body: String,
    },

    /// The network restart command could not be started
    #[error("Restart invocation error: {0}")]
    RestartInvocation(String),

    /// The update retried after a successful network restart failed too
    #[error("Update failed after network restart: {0}")]
    PostRestartUpdate(String),

    /// TLS trust pool or client construction errors
    #[error("TLS error: {0}")]
    Tls(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a credentials-unavailable error
    pub fn credentials_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CredentialsUnavailable {
            path: path.into(),
            source,
        }
    }

    /// Create a credentials-malformed error
    pub fn credentials_malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CredentialsMalformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-credentials error
    pub fn credentials_invalid(reason: impl Into<String>) -> Self {
        Self::CredentialsInvalid(reason.into())
    }

    /// Create an update transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::UpdateTransport(msg.into())
    }

    /// Create an update rejection error
    pub fn rejected(status: u16, body: impl Into<String>) -> Self {
        Self::UpdateRejected {
            status,
            body: body.into(),
        }
    }

    /// Create a restart invocation error
    pub fn restart_invocation(msg: impl Into<String>) -> Self {
        Self::RestartInvocation(msg.into())
    }

    /// Create a post-restart update error
    pub fn post_restart_update(msg: impl Into<String>) -> Self {
        Self::PostRestartUpdate(msg.into())
    }

    /// Create a TLS error
    pub fn tls(msg: impl Into<String>) -> Self {
        Self::Tls(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error came from the transport rather than the provider
    ///
    /// Only transport failures can plausibly be cured by restarting the
    /// local network, so only they start the recovery sequence.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::UpdateTransport(_))
    }
}
