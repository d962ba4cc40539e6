//! OAuth 1.0a (RFC 5849) for hosts that bring their own HTTP and storage.
//!
//! The crate is split into the signing protocol and the handshake that uses it:
//!
//! - [`encode`] - RFC 3986 percent-encoding and parameter normalization
//! - [`base_string`] - canonical signature base string construction
//! - [`signature`] - HMAC-SHA1, PLAINTEXT and RSA-SHA1 signing and verification
//! - [`RequestSigner`] - attaches OAuth parameters to an outbound request
//! - [`Handshake`] - temporary credentials, authorization, access-token exchange
//! - [`AuthenticatedClient`] - signed API calls once an access credential exists
//!
//! Network I/O, credential persistence, nonces and time are collaborator traits
//! ([`Transport`], [`CredentialStore`], [`NonceSource`], [`ClockSource`]). The crate
//! ships a blocking [`UreqTransport`] and an in-memory [`MemoryStore`]; a scripted
//! `MockTransport` is available behind the `mock` feature.
//!
//! # Example
//!
//! ```ignore
//! use latchkey_oauth::{
//!     ConsumerCredentials, Endpoint, Handshake, MemoryStore, RequestSigner, Service,
//!     SignatureMethod, UreqTransport,
//! };
//!
//! let signer = RequestSigner::new(
//!     ConsumerCredentials::new("consumer-key", "consumer-secret"),
//!     SignatureMethod::HmacSha1,
//! );
//! let service = Service::new(
//!     "example",
//!     signer,
//!     Endpoint::post("https://service.example/request_token"),
//!     "https://service.example/authorize",
//!     Endpoint::post("https://service.example/access_token"),
//! );
//!
//! let transport = UreqTransport::default();
//! let store = MemoryStore::new();
//! let mut handshake = Handshake::new(&service, &transport, &store);
//! handshake.request_temporary_credentials()?;
//! let redirect = handshake.build_authorization_redirect()?;
//! // ... user authorizes, callback delivers oauth_token + oauth_verifier ...
//! let access = handshake.exchange_for_access_token(&token, Some(&verifier))?;
//! ```

pub mod base_string;
mod client;
mod credentials;
pub mod encode;
mod error;
mod handshake;
pub mod key;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod service;
pub mod signature;
mod signer;
mod source;
mod store;
mod transport;

pub use client::AuthenticatedClient;
pub use credentials::{ConsumerCredentials, Credential, CredentialKind, StoredCredential};
pub use error::{
    HandshakeError, HandshakeReason, InvalidStateError, OAuthError, RsaKeyError, SignatureError,
    StoreError, TransportError,
};
pub use handshake::{Handshake, HandshakeFlow, HandshakeState};
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockTransport, RecordedRequest};
pub use service::{Endpoint, OUT_OF_BAND, Service};
pub use signature::SignatureMethod;
pub use signer::{Delivery, RequestSigner, SignedRequest};
pub use source::{ClockSource, FixedClock, FixedNonce, NonceSource, RandomNonce, SystemClock};
pub use store::{CredentialStore, FlowId, MemoryStore};
pub use transport::{HttpResponse, Transport, UreqTransport};
