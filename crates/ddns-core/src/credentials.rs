// # Credentials
//
// Loader for the Basic-auth credential pair of the DNS provider.
//
// ## File Format
//
// ```json
// {
//   "Username": "generated-user",
//   "Password": "generated-password"
// }
// ```
//
// The file lives at `$HOME/.credentials/dnscreds` unless configured
// otherwise. It is read exactly once at startup; there is no default and
// no fallback credential.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{Error, Result};

/// Directory under `$HOME` holding the credentials file
const CREDENTIALS_DIR: &str = ".credentials";

/// File name of the credentials file
const CREDENTIALS_FILE: &str = "dnscreds";

/// Provider credentials, immutable for the lifetime of the process
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the password.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    #[serde(rename = "Username")]
    username: String,

    /// ⚠️ NEVER log this value
    #[serde(rename = "Password")]
    password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl Credentials {
    /// Build credentials from an in-memory pair
    ///
    /// Blank fields are rejected with [`Error::CredentialsInvalid`].
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let credentials = Self {
            username: username.into(),
            password: password.into(),
        };
        credentials
            .check_non_empty()
            .map_err(|reason| Error::credentials_invalid(reason))?;
        Ok(credentials)
    }

    /// Load credentials from a JSON file
    ///
    /// # Errors
    ///
    /// - [`Error::CredentialsUnavailable`] when the file cannot be opened or read
    /// - [`Error::CredentialsMalformed`] when the content is not a JSON object
    ///   with non-empty `Username` and `Password` strings
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let bytes = fs::read(path)
            .await
            .map_err(|e| Error::credentials_unavailable(path, e))?;

        let credentials: Credentials = serde_json::from_slice(&bytes)
            .map_err(|e| Error::credentials_malformed(path, e.to_string()))?;

        credentials
            .check_non_empty()
            .map_err(|reason| Error::credentials_malformed(path, reason))?;

        tracing::debug!(
            "Loaded credentials for user {} from {}",
            credentials.username,
            path.display()
        );
        Ok(credentials)
    }

    /// Username sent in the Basic-auth header
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password sent in the Basic-auth header
    pub fn password(&self) -> &str {
        &self.password
    }

    fn check_non_empty(&self) -> std::result::Result<(), &'static str> {
        if self.username.trim().is_empty() {
            return Err("Username is empty");
        }
        if self.password.trim().is_empty() {
            return Err("Password is empty");
        }
        Ok(())
    }
}

/// Default credentials location: `$HOME/.credentials/dnscreds`
pub fn default_credentials_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::config("Unable to determine the current user's home directory"))?;
    Ok(home.join(CREDENTIALS_DIR).join(CREDENTIALS_FILE))
}
