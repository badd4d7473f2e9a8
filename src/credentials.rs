//! Credential providers for authenticated portal access
//!
//! SODA portals accept anonymous requests but throttle them harshly; an app
//! key id/secret pair sent as HTTP Basic auth lifts the throttle. The engine
//! only forwards credentials, it never resolves them itself.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable holding the API key id
pub const KEY_ID_ENV: &str = "SOCRATA_KEY_ID";
/// Environment variable holding the API key secret
pub const KEY_SECRET_ENV: &str = "SOCRATA_KEY_SECRET";

/// Secret file name for the API key id
pub const KEY_ID_SECRET_NAME: &str = "socrata-key-id";
/// Secret file name for the API key secret
pub const KEY_SECRET_SECRET_NAME: &str = "socrata-key-secret";

/// Credential errors
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Secret could not be read
    #[error("failed to read secret {name} from {path}: {reason}")]
    SecretUnreadable {
        /// Secret name
        name: String,
        /// Path that was read
        path: PathBuf,
        /// Underlying IO error
        reason: String,
    },

    /// Only one half of the pair was supplied
    #[error("incomplete credentials: {0}")]
    Incomplete(String),
}

/// API key id/secret pair. An empty pair means unauthenticated access.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    key_id: String,
    key_secret: String,
}

impl Credentials {
    /// Create a credential pair
    pub fn new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        }
    }

    /// Empty credentials (unauthenticated mode)
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Whether no key id is present
    pub fn is_empty(&self) -> bool {
        self.key_id.is_empty()
    }

    /// API key id
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// API key secret
    pub fn key_secret(&self) -> &str {
        &self.key_secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key_id", &self.key_id)
            .field("key_secret", &if self.key_secret.is_empty() { "" } else { "***" })
            .finish()
    }
}

/// Source of credentials for a run
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Resolve the credential pair
    async fn credentials(&self) -> Result<Credentials, CredentialError>;

    /// Short label for logs
    fn describe(&self) -> String;
}

/// Fixed credentials
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials(pub Credentials);

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn credentials(&self) -> Result<Credentials, CredentialError> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

/// Reads credentials from `SOCRATA_KEY_ID` / `SOCRATA_KEY_SECRET`.
///
/// Missing or blank variables yield anonymous credentials.
#[derive(Debug, Clone)]
pub struct EnvCredentialProvider {
    key_id_var: String,
    key_secret_var: String,
}

impl Default for EnvCredentialProvider {
    fn default() -> Self {
        Self::new(KEY_ID_ENV, KEY_SECRET_ENV)
    }
}

impl EnvCredentialProvider {
    /// Read from custom variable names
    pub fn new(key_id_var: impl Into<String>, key_secret_var: impl Into<String>) -> Self {
        Self {
            key_id_var: key_id_var.into(),
            key_secret_var: key_secret_var.into(),
        }
    }

    fn read_var(name: &str) -> String {
        std::env::var(name)
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn credentials(&self) -> Result<Credentials, CredentialError> {
        let key_id = Self::read_var(&self.key_id_var);
        let key_secret = Self::read_var(&self.key_secret_var);

        match (key_id.is_empty(), key_secret.is_empty()) {
            (true, true) => {
                info!("No API credentials in environment, using unauthenticated access");
                Ok(Credentials::anonymous())
            }
            (false, false) => Ok(Credentials::new(key_id, key_secret)),
            (false, true) => Err(CredentialError::Incomplete(format!(
                "{} is set but {} is empty",
                self.key_id_var, self.key_secret_var
            ))),
            (true, false) => Err(CredentialError::Incomplete(format!(
                "{} is set but {} is empty",
                self.key_secret_var, self.key_id_var
            ))),
        }
    }

    fn describe(&self) -> String {
        format!("env({}, {})", self.key_id_var, self.key_secret_var)
    }
}

/// Reads credentials from mounted secret files (`socrata-key-id`,
/// `socrata-key-secret`) inside a directory.
#[derive(Debug, Clone)]
pub struct SecretDirProvider {
    dir: PathBuf,
}

impl SecretDirProvider {
    /// Read secrets from `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn read_secret(dir: &Path, name: &str) -> Result<String, CredentialError> {
        let path = dir.join(name);
        debug!(path = %path.display(), "Reading secret");
        let value = tokio::fs::read_to_string(&path).await.map_err(|e| {
            CredentialError::SecretUnreadable {
                name: name.to_string(),
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(value.trim().to_string())
    }
}

#[async_trait]
impl CredentialProvider for SecretDirProvider {
    async fn credentials(&self) -> Result<Credentials, CredentialError> {
        let key_id = Self::read_secret(&self.dir, KEY_ID_SECRET_NAME).await?;
        let key_secret = Self::read_secret(&self.dir, KEY_SECRET_SECRET_NAME).await?;
        info!(dir = %self.dir.display(), "API credentials loaded from secret directory");
        Ok(Credentials::new(key_id, key_secret))
    }

    fn describe(&self) -> String {
        format!("secrets({})", self.dir.display())
    }
}
