//! Error types for OAuth signing and the handshake.

use std::fmt;
use std::path::PathBuf;
use std::str::Utf8Error;

use crate::handshake::HandshakeState;
use crate::store::FlowId;

/// Any failure surfaced by this crate.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// Missing or invalid key material.
    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),

    /// Network or connection failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Protocol-level handshake failure.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// Operation called in the wrong handshake state.
    #[error(transparent)]
    InvalidState(#[from] InvalidStateError),

    /// Credential store failure.
    #[error("credential store error: {0}")]
    Store(#[from] StoreError),

    /// Authenticated request returned a non-200 status.
    #[error("HTTP error: {status} - {body}")]
    Request {
        /// HTTP status code.
        status: u16,
        /// Response body (may contain error details).
        body: String,
    },

    /// URL could not be normalized for signing.
    #[error("invalid URL {url}: {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Signing or verification failure.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SignatureError {
    /// HMAC-SHA1 and PLAINTEXT need a consumer secret.
    #[error("consumer secret is required for {0}")]
    MissingConsumerSecret(&'static str),

    /// RSA-SHA1 signing needs the consumer private key.
    #[error("RSA-SHA1 signing requires a private key")]
    MissingPrivateKey,

    /// RSA-SHA1 verification needs the consumer public key.
    #[error("RSA-SHA1 verification requires a public key")]
    MissingPublicKey,

    /// Key material could not be loaded.
    #[error("invalid key: {0}")]
    InvalidKey(#[from] RsaKeyError),

    /// The HMAC key was rejected.
    #[error("invalid HMAC key length")]
    HmacKey(#[from] hmac::digest::InvalidLength),

    /// The RSA operation itself failed.
    #[error("RSA signing failed")]
    Rsa(#[from] rsa::signature::Error),

    /// A received signature is not valid base64 or has the wrong length.
    #[error("malformed signature")]
    MalformedSignature,

    /// Unknown `oauth_signature_method` value.
    #[error("unsupported signature method: {0}")]
    UnsupportedMethod(String),
}

/// RSA key loading/parsing error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RsaKeyError {
    /// Key file could not be read.
    #[error("failed to read key file {}", path.display())]
    Io {
        /// Path of the key file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid UTF-8 in key file.
    #[error("invalid UTF-8 in key")]
    InvalidUtf8(#[from] Utf8Error),

    /// PKCS#1 key parsing error.
    #[error("PKCS#1 key error")]
    Pkcs1(#[from] rsa::pkcs1::Error),

    /// PKCS#8 key parsing error (returned when both formats fail).
    #[error("PKCS#8 key error")]
    Pkcs8(#[from] rsa::pkcs8::Error),

    /// SubjectPublicKeyInfo parsing error (returned when both formats fail).
    #[error("public key error")]
    Spki(#[from] rsa::pkcs8::spki::Error),
}

/// Failure sending a request. Retrying is the caller's decision.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    /// HTTP request failed (network error, timeout, etc).
    #[error("HTTP request failed: {0}")]
    Http(#[from] ureq::Error),

    /// The transport cannot send this method.
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// Failure reported by a host-provided transport.
    #[error("{0}")]
    Connection(String),
}

/// Reason code for a failed handshake step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeReason {
    /// Temporary-credential request was rejected or unusable.
    TemporaryCredentialsFailed,
    /// Callback token does not belong to this flow.
    TokenMismatch,
    /// Access-token request was rejected.
    AccessTokenFailed,
    /// Access-token response lacked `oauth_token`/`oauth_token_secret`.
    MalformedResponse,
}

impl HandshakeReason {
    /// Reason code as it appears in logs and serialized flows.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TemporaryCredentialsFailed => "temporary_credentials_failed",
            Self::TokenMismatch => "token_mismatch",
            Self::AccessTokenFailed => "access_token_failed",
            Self::MalformedResponse => "malformed_response",
        }
    }

    /// Whether the failed step may be re-invoked on the same flow.
    ///
    /// Nothing is persisted when these steps fail, so a retry starts clean.
    /// `token_mismatch` and `malformed_response` require a new flow.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::TemporaryCredentialsFailed | Self::AccessTokenFailed)
    }
}

impl fmt::Display for HandshakeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol-level handshake failure. The flow is in `Failed` when this is returned.
#[derive(Debug, thiserror::Error)]
#[error("OAuth handshake failed: {reason}")]
pub struct HandshakeError {
    /// Reason code.
    pub reason: HandshakeReason,
    /// HTTP status of the response that caused the failure, if any.
    pub status: Option<u16>,
    /// Body of the response that caused the failure, if any.
    pub body: Option<String>,
}

impl HandshakeError {
    /// Create an error without response details.
    #[must_use]
    pub fn new(reason: HandshakeReason) -> Self {
        Self {
            reason,
            status: None,
            body: None,
        }
    }

    /// Attach the offending HTTP response.
    #[must_use]
    pub fn with_response(mut self, status: u16, body: impl Into<String>) -> Self {
        self.status = Some(status);
        self.body = Some(body.into());
        self
    }
}

/// An operation was invoked in a state that does not allow it.
#[derive(Debug, thiserror::Error)]
#[error("{operation} is not valid in state {state}")]
pub struct InvalidStateError {
    /// Name of the rejected operation.
    pub operation: &'static str,
    /// State the flow was in.
    pub state: HandshakeState,
}

/// Credential store failure.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Nothing is stored under this flow identifier.
    #[error("no credential stored for flow {0}")]
    NotFound(FlowId),

    /// Backend-specific failure.
    #[error("{0}")]
    Backend(String),
}
