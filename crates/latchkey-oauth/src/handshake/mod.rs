//! Three-legged handshake (RFC 5849 Section 2).
//!
//! 1. Request temporary credentials
//! 2. Redirect the resource owner to the authorization endpoint
//! 3. Exchange the temporary credential and verifier for an access credential
//!
//! Each step is one method on [`Handshake`]; a step invoked in the wrong state
//! fails with [`InvalidStateError`] and leaves the flow untouched. Protocol
//! failures move the flow to [`HandshakeState::Failed`]. The temporary and
//! access-token steps may be retried after a failure of their own; a token
//! mismatch or malformed access-token response needs a new flow.

mod flow;
mod response;

use std::collections::BTreeMap;
use std::fmt;

use subtle::ConstantTimeEq;
use tracing::{info, warn};

pub use self::flow::{HandshakeFlow, HandshakeState};
use self::response::TokenResponse;
use crate::credentials::{Credential, CredentialKind, StoredCredential};
use crate::encode::append_query;
use crate::error::{HandshakeError, HandshakeReason, InvalidStateError, OAuthError};
use crate::service::Service;
use crate::signer::SignedRequest;
use crate::store::{CredentialStore, FlowId};
use crate::transport::{HttpResponse, Transport, send_signed};

/// Metadata key under which a verifier from step 1 survives a resume.
const VERIFIER_KEY: &str = "oauth_verifier";

/// Metadata key recording `oauth_callback_confirmed` across a resume.
const CALLBACK_CONFIRMED_KEY: &str = "oauth_callback_confirmed";

/// Post-verification enrichment: receives the access credential, returns
/// metadata stored alongside it.
type VerifiedHook<'a> = Box<dyn Fn(&Credential) -> BTreeMap<String, String> + Send + Sync + 'a>;

/// One handshake against one service.
pub struct Handshake<'a> {
    service: &'a Service,
    transport: &'a dyn Transport,
    store: &'a dyn CredentialStore,
    flow: HandshakeFlow,
    on_verified: Option<VerifiedHook<'a>>,
}

impl<'a> Handshake<'a> {
    /// Start a flow with a freshly generated identifier.
    pub fn new(
        service: &'a Service,
        transport: &'a dyn Transport,
        store: &'a dyn CredentialStore,
    ) -> Self {
        Self::with_flow_id(service, transport, store, FlowId::generate())
    }

    /// Start a flow under a host-chosen identifier.
    pub fn with_flow_id(
        service: &'a Service,
        transport: &'a dyn Transport,
        store: &'a dyn CredentialStore,
        flow_id: FlowId,
    ) -> Self {
        Self {
            service,
            transport,
            store,
            flow: HandshakeFlow::new(flow_id, service.name()),
            on_verified: None,
        }
    }

    /// Restore a flow from the credential store after the authorization redirect.
    ///
    /// A stored temporary credential resumes in `AuthorizationPending`; a stored
    /// access credential resumes in `Verified`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`](crate::StoreError::NotFound) when nothing
    /// is stored for `flow_id`. The handshake never continues with an empty secret.
    pub fn resume(
        service: &'a Service,
        transport: &'a dyn Transport,
        store: &'a dyn CredentialStore,
        flow_id: FlowId,
    ) -> Result<Self, OAuthError> {
        let stored = store.get(&flow_id)?;
        let mut flow = HandshakeFlow::new(flow_id, service.name());

        match stored.kind {
            CredentialKind::Temporary => {
                flow.state = HandshakeState::AuthorizationPending;
                flow.verifier = stored.metadata.get(VERIFIER_KEY).cloned();
                flow.callback_confirmed = stored
                    .metadata
                    .get(CALLBACK_CONFIRMED_KEY)
                    .is_some_and(|v| v == "true");
                flow.temporary = Some(stored.credential);
            }
            CredentialKind::Access => {
                flow.state = HandshakeState::Verified;
                flow.access = Some(stored.credential);
                flow.metadata = stored.metadata;
            }
        }

        info!(flow_id = %flow.id, service = %flow.service, state = %flow.state, "Resumed OAuth handshake");

        Ok(Self {
            service,
            transport,
            store,
            flow,
            on_verified: None,
        })
    }

    /// Run `hook` once the flow reaches `Verified`; its output is merged into
    /// the stored metadata, overriding response fields of the same name.
    #[must_use]
    pub fn on_verified(
        mut self,
        hook: impl Fn(&Credential) -> BTreeMap<String, String> + Send + Sync + 'a,
    ) -> Self {
        self.on_verified = Some(Box::new(hook));
        self
    }

    pub fn flow(&self) -> &HandshakeFlow {
        &self.flow
    }

    pub fn state(&self) -> HandshakeState {
        self.flow.state
    }

    pub fn into_flow(self) -> HandshakeFlow {
        self.flow
    }

    /// Step 1: obtain temporary credentials.
    ///
    /// Sends `oauth_callback` (the service's callback URL, `oob` by default)
    /// without a token. On success the credential is stored under the flow id
    /// and the flow moves to `TemporaryCredentialsObtained`.
    ///
    /// # Errors
    ///
    /// - `InvalidState` outside `Initiated` (or a failed first step)
    /// - `Signature` if the request cannot be signed; the state is unchanged
    /// - `Transport` or `Handshake(temporary_credentials_failed)` otherwise,
    ///   with the flow in `Failed` and no credential set
    pub fn request_temporary_credentials(&mut self) -> Result<&Credential, OAuthError> {
        const STEP: HandshakeReason = HandshakeReason::TemporaryCredentialsFailed;
        self.check_state(
            "request_temporary_credentials",
            HandshakeState::Initiated,
            STEP,
        )?;

        let endpoint = self.service.request_token();
        let params = [(
            "oauth_callback".to_owned(),
            self.service.callback_url().to_owned(),
        )];
        let request =
            self.service
                .signer()
                .sign_request(&endpoint.method, &endpoint.url, None, &params)?;

        let response = self.send(&request, STEP)?;
        if response.status != 200 {
            return Err(self.fail_with_response(STEP, &response));
        }

        let parsed = match TokenResponse::parse(&response.text()) {
            Ok(parsed) => parsed,
            Err(missing) => {
                warn!(flow_id = %self.flow.id, missing, "Temporary credential response incomplete");
                return Err(self.fail_with_response(STEP, &response));
            }
        };

        // A service that answers the callback must confirm it (RFC 5849 Section 2.1)
        let callback_confirmed = match parsed.callback_confirmed.as_deref() {
            None => false,
            Some("true") => true,
            Some(other) => {
                warn!(flow_id = %self.flow.id, value = other, "Callback not confirmed");
                return Err(self.fail_with_response(STEP, &response));
            }
        };

        let mut stored =
            StoredCredential::temporary(parsed.credential.clone(), self.service.signer().now());
        if let Some(verifier) = &parsed.verifier {
            stored = stored.with_metadata(VERIFIER_KEY, verifier.as_str());
        }
        if callback_confirmed {
            stored = stored.with_metadata(CALLBACK_CONFIRMED_KEY, "true");
        }
        if let Err(e) = self.store.put(&self.flow.id, stored) {
            self.fail(STEP);
            return Err(e.into());
        }

        self.flow.verifier = parsed.verifier;
        self.flow.callback_confirmed = callback_confirmed;
        self.transition(HandshakeState::TemporaryCredentialsObtained);

        let credential: &Credential = self.flow.temporary.insert(parsed.credential);
        Ok(credential)
    }

    /// Step 2: URL the resource owner must visit to authorize the flow.
    ///
    /// No network call. Appends `oauth_token` (and `oauth_callback` when the
    /// service asks for it) and moves the flow to `AuthorizationPending`.
    /// Calling it again while pending returns the same URL.
    pub fn build_authorization_redirect(&mut self) -> Result<String, InvalidStateError> {
        let operation = "build_authorization_redirect";
        let temporary = match (self.flow.state, &self.flow.temporary) {
            (
                HandshakeState::TemporaryCredentialsObtained | HandshakeState::AuthorizationPending,
                Some(temporary),
            ) => temporary,
            (state, _) => return Err(InvalidStateError { operation, state }),
        };

        let mut params = vec![("oauth_token".to_owned(), temporary.token.clone())];
        if self.service.authorize_includes_callback() {
            params.push((
                "oauth_callback".to_owned(),
                self.service.callback_url().to_owned(),
            ));
        }
        let url = append_query(self.service.authorize_url(), &params);

        if self.flow.state != HandshakeState::AuthorizationPending {
            self.transition(HandshakeState::AuthorizationPending);
        }
        Ok(url)
    }

    /// Step 3: exchange the authorized temporary credential for an access credential.
    ///
    /// `received_token` is the `oauth_token` delivered to the callback and must
    /// match the temporary credential of this flow. `received_verifier` falls
    /// back to a verifier the service returned in step 1.
    ///
    /// On success the flow is `Verified`, the verification hook has run, and
    /// the store entry for this flow holds the access credential.
    ///
    /// # Errors
    ///
    /// - `InvalidState` outside `AuthorizationPending` (or a failed exchange)
    /// - `Handshake(token_mismatch)` without contacting the service
    /// - `Transport` or `Handshake(access_token_failed)`, retryable
    /// - `Handshake(malformed_response)` when the response lacks the credential
    /// - `Store` when the verified credential cannot be persisted; the flow
    ///   stays `Verified`
    pub fn exchange_for_access_token(
        &mut self,
        received_token: &str,
        received_verifier: Option<&str>,
    ) -> Result<Credential, OAuthError> {
        const STEP: HandshakeReason = HandshakeReason::AccessTokenFailed;
        let operation = "exchange_for_access_token";
        self.check_state(operation, HandshakeState::AuthorizationPending, STEP)?;

        let temporary = self.flow.temporary.clone().ok_or(InvalidStateError {
            operation,
            state: self.flow.state,
        })?;

        let matches: bool = received_token
            .as_bytes()
            .ct_eq(temporary.token.as_bytes())
            .into();
        if !matches {
            warn!(flow_id = %self.flow.id, "Callback token does not match this flow");
            self.fail(HandshakeReason::TokenMismatch);
            self.discard_temporary();
            return Err(HandshakeError::new(HandshakeReason::TokenMismatch).into());
        }

        let verifier = received_verifier
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
            .or_else(|| self.flow.verifier.clone());
        let params: Vec<(String, String)> = verifier
            .into_iter()
            .map(|v| (VERIFIER_KEY.to_owned(), v))
            .collect();

        let endpoint = self.service.access_token();
        let request = self.service.signer().sign_request(
            &endpoint.method,
            &endpoint.url,
            Some(&temporary),
            &params,
        )?;

        let response = self.send(&request, STEP)?;
        if response.status != 200 {
            return Err(self.fail_with_response(STEP, &response));
        }

        let parsed = match TokenResponse::parse(&response.text()) {
            Ok(parsed) => parsed,
            Err(missing) => {
                warn!(flow_id = %self.flow.id, missing, "Access token response incomplete");
                let err = self.fail_with_response(HandshakeReason::MalformedResponse, &response);
                self.discard_temporary();
                return Err(err);
            }
        };

        let access = parsed.credential;
        let mut metadata = parsed.extra;
        if let Some(hook) = &self.on_verified {
            metadata.extend(hook(&access));
        }

        self.flow.access = Some(access.clone());
        self.flow.metadata = metadata.clone();
        self.transition(HandshakeState::Verified);

        let stored = StoredCredential::access(access.clone(), metadata, self.service.signer().now());
        self.store.put(&self.flow.id, stored)?;

        Ok(access)
    }

    /// The access credential of a verified flow.
    pub fn current_access_credential(&self) -> Result<&Credential, InvalidStateError> {
        match (self.flow.state, &self.flow.access) {
            (HandshakeState::Verified, Some(access)) => Ok(access),
            (state, _) => Err(InvalidStateError {
                operation: "current_access_credential",
                state,
            }),
        }
    }

    /// Allow `ready`, or `Failed` when the last failure was this step's own.
    fn check_state(
        &self,
        operation: &'static str,
        ready: HandshakeState,
        step: HandshakeReason,
    ) -> Result<(), InvalidStateError> {
        let state = self.flow.state;
        let retry = state == HandshakeState::Failed && self.flow.failure == Some(step);
        if state == ready || retry {
            Ok(())
        } else {
            Err(InvalidStateError { operation, state })
        }
    }

    fn send(
        &mut self,
        request: &SignedRequest,
        step: HandshakeReason,
    ) -> Result<HttpResponse, OAuthError> {
        send_signed(self.transport, request).map_err(|e| {
            warn!(flow_id = %self.flow.id, error = %e, "Transport failure during handshake");
            self.fail(step);
            OAuthError::from(e)
        })
    }

    fn transition(&mut self, state: HandshakeState) {
        info!(
            flow_id = %self.flow.id,
            service = %self.flow.service,
            from = %self.flow.state,
            to = %state,
            "OAuth handshake transition"
        );
        self.flow.state = state;
        self.flow.failure = None;
    }

    fn fail(&mut self, reason: HandshakeReason) {
        warn!(
            flow_id = %self.flow.id,
            service = %self.flow.service,
            from = %self.flow.state,
            reason = %reason,
            "OAuth handshake failed"
        );
        self.flow.state = HandshakeState::Failed;
        self.flow.failure = Some(reason);
    }

    fn fail_with_response(&mut self, reason: HandshakeReason, response: &HttpResponse) -> OAuthError {
        self.fail(reason);
        HandshakeError::new(reason)
            .with_response(response.status, response.text())
            .into()
    }

    /// Drop the stored temporary credential of a flow that cannot continue.
    fn discard_temporary(&self) {
        if let Err(e) = self.store.delete(&self.flow.id) {
            warn!(flow_id = %self.flow.id, error = %e, "Failed to discard temporary credential");
        }
    }
}

impl fmt::Debug for Handshake<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handshake")
            .field("service", &self.service.name())
            .field("flow", &self.flow)
            .field("on_verified", &self.on_verified.is_some())
            .finish_non_exhaustive()
    }
}
