//! Token endpoint responses (RFC 5849 Sections 2.1 and 2.3).

use std::collections::BTreeMap;

use crate::credentials::Credential;
use crate::encode::parse_form;

/// Parsed form-encoded body of a token endpoint response.
#[derive(Debug)]
pub(super) struct TokenResponse {
    pub credential: Credential,
    pub callback_confirmed: Option<String>,
    pub verifier: Option<String>,
    /// Every other field, such as a user id or screen name.
    pub extra: BTreeMap<String, String>,
}

impl TokenResponse {
    /// Parse a response body, returning the name of the first missing field on failure.
    ///
    /// `oauth_token` and `oauth_token_secret` must be present and non-empty.
    pub fn parse(body: &str) -> Result<Self, &'static str> {
        let mut params: BTreeMap<String, String> = parse_form(body.trim()).into_iter().collect();

        let token = take_required(&mut params, "oauth_token")?;
        let secret = take_required(&mut params, "oauth_token_secret")?;
        let callback_confirmed = params.remove("oauth_callback_confirmed");
        let verifier = params.remove("oauth_verifier").filter(|v| !v.is_empty());

        Ok(Self {
            credential: Credential::new(token, secret),
            callback_confirmed,
            verifier,
            extra: params,
        })
    }
}

fn take_required(
    params: &mut BTreeMap<String, String>,
    key: &'static str,
) -> Result<String, &'static str> {
    params.remove(key).filter(|v| !v.is_empty()).ok_or(key)
}
