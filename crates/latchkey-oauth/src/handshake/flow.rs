//! Handshake state and the per-flow record.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::credentials::Credential;
use crate::error::HandshakeReason;
use crate::store::FlowId;

/// Where a handshake currently stands.
///
/// `Initiated -> TemporaryCredentialsObtained -> AuthorizationPending -> Verified`,
/// with `Failed` reachable from any step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeState {
    #[default]
    Initiated,
    TemporaryCredentialsObtained,
    AuthorizationPending,
    Verified,
    Failed,
}

impl HandshakeState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::TemporaryCredentialsObtained => "temporary_credentials_obtained",
            Self::AuthorizationPending => "authorization_pending",
            Self::Verified => "verified",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything known about one handshake.
///
/// A flow is in exactly one state at a time. `temporary` is set from
/// `TemporaryCredentialsObtained` on; `access` only in `Verified`.
#[derive(Debug, Clone)]
pub struct HandshakeFlow {
    pub(super) id: FlowId,
    pub(super) service: String,
    pub(super) state: HandshakeState,
    pub(super) temporary: Option<Credential>,
    pub(super) verifier: Option<String>,
    pub(super) callback_confirmed: bool,
    pub(super) access: Option<Credential>,
    pub(super) metadata: BTreeMap<String, String>,
    pub(super) failure: Option<HandshakeReason>,
}

impl HandshakeFlow {
    pub(super) fn new(id: FlowId, service: &str) -> Self {
        Self {
            id,
            service: service.to_owned(),
            state: HandshakeState::Initiated,
            temporary: None,
            verifier: None,
            callback_confirmed: false,
            access: None,
            metadata: BTreeMap::new(),
            failure: None,
        }
    }

    /// Flow identifier, also the credential-store key.
    pub fn id(&self) -> &FlowId {
        &self.id
    }

    /// Name of the service being connected.
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Temporary credential, once obtained.
    pub fn temporary_credential(&self) -> Option<&Credential> {
        self.temporary.as_ref()
    }

    /// Verifier delivered together with the temporary credential, if any.
    pub fn verifier(&self) -> Option<&str> {
        self.verifier.as_deref()
    }

    /// Whether the service acknowledged `oauth_callback`.
    pub fn callback_confirmed(&self) -> bool {
        self.callback_confirmed
    }

    /// Access credential, only in `Verified`.
    pub fn access_credential(&self) -> Option<&Credential> {
        self.access.as_ref()
    }

    /// Extra access-token response fields plus post-verification enrichment.
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Reason of the last failure, only in `Failed`.
    pub fn failure(&self) -> Option<HandshakeReason> {
        self.failure
    }
}
