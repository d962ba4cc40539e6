//! Signed API requests once the handshake is complete.

use tracing::{debug, warn};

use crate::credentials::Credential;
use crate::error::OAuthError;
use crate::signer::RequestSigner;
use crate::transport::{Transport, send_signed};

/// Makes signed requests on behalf of one access credential.
///
/// Holds no state beyond its inputs; every call signs afresh.
pub struct AuthenticatedClient<'a> {
    signer: &'a RequestSigner,
    transport: &'a dyn Transport,
    access: Credential,
}

impl<'a> AuthenticatedClient<'a> {
    pub fn new(signer: &'a RequestSigner, transport: &'a dyn Transport, access: Credential) -> Self {
        Self {
            signer,
            transport,
            access,
        }
    }

    /// Access credential used for signing.
    pub fn access_credential(&self) -> &Credential {
        &self.access
    }

    /// Sign and send a request, returning the raw body of a 200 response.
    ///
    /// # Errors
    ///
    /// Returns `Request { status, body }` for any other status, and signing or
    /// transport errors as they occur.
    pub fn request(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
    ) -> Result<Vec<u8>, OAuthError> {
        let signed = self
            .signer
            .sign_request(method, url, Some(&self.access), params)?;
        let response = send_signed(self.transport, &signed)?;

        if response.status != 200 {
            warn!(method = %signed.method, url = %signed.url, status = response.status, "Authenticated request failed");
            return Err(OAuthError::Request {
                status: response.status,
                body: response.text().into_owned(),
            });
        }

        debug!(method = %signed.method, url = %signed.url, bytes = response.body.len(), "Authenticated request succeeded");
        Ok(response.body)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::credentials::ConsumerCredentials;
    use crate::mock::MockTransport;
    use crate::signature::SignatureMethod;
    use crate::source::{FixedClock, FixedNonce};

    fn signer() -> RequestSigner {
        RequestSigner::new(
            ConsumerCredentials::new("consumer", "consumer-secret"),
            SignatureMethod::HmacSha1,
        )
        .with_nonce_source(FixedNonce::new("nonce"))
        .with_clock(FixedClock(1_700_000_000))
    }

    #[test]
    fn test_request_returns_body() {
        let signer = signer();
        let transport = MockTransport::new().with_response(200, r#"{"name":"jo"}"#);
        let client = AuthenticatedClient::new(
            &signer,
            &transport,
            Credential::new("access456", "accessXYZ"),
        );

        let body = client
            .request(
                "GET",
                "https://api.example/me",
                &[("fields".to_owned(), "name".to_owned())],
            )
            .unwrap();

        assert_eq!(body, br#"{"name":"jo"}"#.to_vec());
        let requests = transport.requests();
        assert_eq!(requests[0].url, "https://api.example/me?fields=name");
        assert!(
            requests[0]
                .header("Authorization")
                .unwrap()
                .contains(r#"oauth_token="access456""#)
        );
    }

    #[test]
    fn test_non_200_is_request_error() {
        let signer = signer();
        let transport = MockTransport::new().with_response(401, "oauth_problem=token_revoked");
        let client = AuthenticatedClient::new(&signer, &transport, Credential::new("a", "b"));

        let err = client
            .request("POST", "https://api.example/status", &[])
            .unwrap_err();

        match err {
            OAuthError::Request { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "oauth_problem=token_revoked");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_transport_failure_propagates() {
        let signer = signer();
        let transport = MockTransport::new().with_failure("timed out");
        let client = AuthenticatedClient::new(&signer, &transport, Credential::new("a", "b"));

        let err = client
            .request("GET", "https://api.example/me", &[])
            .unwrap_err();
        assert!(matches!(err, OAuthError::Transport(_)));
    }
}
