//! Consumer and token credentials.

use std::collections::BTreeMap;
use std::fmt;

use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};

/// Client application identity issued by the remote service.
#[derive(Clone)]
pub struct ConsumerCredentials {
    key: String,
    secret: String,
    private_key: Option<RsaPrivateKey>,
}

impl ConsumerCredentials {
    /// Create consumer credentials from a key/secret pair.
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
            private_key: None,
        }
    }

    /// Attach the private key used by RSA-SHA1.
    #[must_use]
    pub fn with_private_key(mut self, private_key: RsaPrivateKey) -> Self {
        self.private_key = Some(private_key);
        self
    }

    /// Value sent as `oauth_consumer_key`.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Shared secret (unused by RSA-SHA1, may be empty there).
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// RSA private key, if configured.
    pub fn private_key(&self) -> Option<&RsaPrivateKey> {
        self.private_key.as_ref()
    }
}

impl fmt::Debug for ConsumerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerCredentials")
            .field("key", &self.key)
            .field("secret", &"[REDACTED]")
            .field("private_key", &self.private_key.is_some())
            .finish()
    }
}

/// A token/secret pair: temporary credentials or access credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// `oauth_token`.
    pub token: String,
    /// `oauth_token_secret`.
    pub secret: String,
}

impl Credential {
    /// Create a credential.
    pub fn new(token: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &self.token)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Lifetime class of a stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    /// Valid for one handshake only.
    Temporary,
    /// Long-lived authorization to a remote account.
    Access,
}

/// What a [`CredentialStore`](crate::CredentialStore) holds for a flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Temporary or access.
    pub kind: CredentialKind,
    /// The token/secret pair.
    pub credential: Credential,
    /// Extra response fields and post-verification enrichment.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Unix timestamp (seconds) when the entry was written.
    pub stored_at: u64,
}

impl StoredCredential {
    /// Temporary credential obtained in the first handshake step.
    pub fn temporary(credential: Credential, stored_at: u64) -> Self {
        Self {
            kind: CredentialKind::Temporary,
            credential,
            metadata: BTreeMap::new(),
            stored_at,
        }
    }

    /// Access credential obtained at the end of the handshake.
    pub fn access(credential: Credential, metadata: BTreeMap<String, String>, stored_at: u64) -> Self {
        Self {
            kind: CredentialKind::Access,
            credential,
            metadata,
            stored_at,
        }
    }

    /// Attach one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
