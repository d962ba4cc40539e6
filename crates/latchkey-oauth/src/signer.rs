//! Request signing (RFC 5849 Section 3.1).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::base_string::signature_base_string;
use crate::credentials::{ConsumerCredentials, Credential};
use crate::encode::{append_query, encode_form, percent_encode};
use crate::error::OAuthError;
use crate::signature::{self, KeyMaterial, SignatureMethod};
use crate::source::{ClockSource, NonceSource, RandomNonce, SystemClock};

/// Prefix reserved for protocol parameters.
const OAUTH_PREFIX: &str = "oauth_";

/// Content type of form-encoded request bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Where the protocol parameters travel (RFC 5849 Section 3.5).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// `Authorization: OAuth ...` header.
    #[default]
    Header,
    /// URL query string.
    Query,
    /// Form-encoded request body. Methods without a body fall back to `Query`.
    Body,
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Header => "header",
            Self::Query => "query",
            Self::Body => "body",
        })
    }
}

impl FromStr for Delivery {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "header" => Ok(Self::Header),
            "query" => Ok(Self::Query),
            "body" => Ok(Self::Body),
            _ => Err(format!("unknown delivery style: {s}")),
        }
    }
}

/// A request ready to hand to a [`Transport`](crate::Transport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Uppercased HTTP method.
    pub method: String,
    /// Target URL including any query parameters.
    pub url: String,
    /// Headers to send (`Authorization`, `Content-Type`).
    pub headers: Vec<(String, String)>,
    /// Request body; empty when there is none.
    pub body: Vec<u8>,
    /// Protocol parameters including `oauth_signature`.
    pub oauth_params: Vec<(String, String)>,
}

impl SignedRequest {
    /// Look up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Look up a protocol parameter.
    pub fn oauth_param(&self, name: &str) -> Option<&str> {
        self.oauth_params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The computed `oauth_signature`.
    pub fn signature(&self) -> Option<&str> {
        self.oauth_param("oauth_signature")
    }
}

/// Signs requests on behalf of one consumer.
///
/// The nonce and clock sources are injectable; with fixed sources the output
/// is fully deterministic.
pub struct RequestSigner {
    consumer: ConsumerCredentials,
    method: SignatureMethod,
    delivery: Delivery,
    nonce: Box<dyn NonceSource>,
    clock: Box<dyn ClockSource>,
}

impl RequestSigner {
    /// Create a signer using header delivery, random nonces and the system clock.
    pub fn new(consumer: ConsumerCredentials, method: SignatureMethod) -> Self {
        Self {
            consumer,
            method,
            delivery: Delivery::default(),
            nonce: Box::new(RandomNonce),
            clock: Box::new(SystemClock),
        }
    }

    /// Choose where protocol parameters are placed.
    #[must_use]
    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Replace the nonce source.
    #[must_use]
    pub fn with_nonce_source(mut self, nonce: impl NonceSource + 'static) -> Self {
        self.nonce = Box::new(nonce);
        self
    }

    /// Replace the clock source.
    #[must_use]
    pub fn with_clock(mut self, clock: impl ClockSource + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Consumer credentials this signer uses.
    pub fn consumer(&self) -> &ConsumerCredentials {
        &self.consumer
    }

    /// Signature method this signer uses.
    pub fn signature_method(&self) -> SignatureMethod {
        self.method
    }

    /// Delivery style this signer uses.
    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    /// Current time according to the signer's clock.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Sign a request.
    ///
    /// `params` may mix protocol parameters (`oauth_callback`, `oauth_verifier`)
    /// with ordinary request parameters. Ordinary parameters are sent in a form
    /// body for POST/PUT/PATCH and in the query string otherwise.
    ///
    /// `token` is `None` while requesting temporary credentials; the token
    /// secret is then empty in the signing key.
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, POST, etc.)
    /// * `url` - Target URL, may already carry query parameters
    /// * `token` - Temporary or access credential, if any
    /// * `params` - Extra parameters to sign and send
    pub fn sign_request(
        &self,
        method: &str,
        url: &str,
        token: Option<&Credential>,
        params: &[(String, String)],
    ) -> Result<SignedRequest, OAuthError> {
        let method = method.to_ascii_uppercase();
        let has_body = matches!(method.as_str(), "POST" | "PUT" | "PATCH");

        let (extra_oauth, request_params): (Vec<_>, Vec<_>) = params
            .iter()
            .filter(|(k, _)| k != "oauth_signature")
            .cloned()
            .partition(|(k, _)| k.starts_with(OAUTH_PREFIX));

        let mut oauth_params = vec![
            ("oauth_consumer_key".to_owned(), self.consumer.key().to_owned()),
            ("oauth_nonce".to_owned(), self.nonce.next()),
            ("oauth_signature_method".to_owned(), self.method.as_str().to_owned()),
            ("oauth_timestamp".to_owned(), self.clock.now().to_string()),
            ("oauth_version".to_owned(), "1.0".to_owned()),
        ];
        if let Some(token) = token {
            oauth_params.push(("oauth_token".to_owned(), token.token.clone()));
        }
        oauth_params.extend(extra_oauth);

        let (target_url, form_body) = if has_body {
            (url.to_owned(), request_params)
        } else {
            (append_query(url, &request_params), Vec::new())
        };

        let base_string = signature_base_string(&method, &target_url, &form_body, &oauth_params)?;

        let mut keys = KeyMaterial::shared(
            self.consumer.secret(),
            token.map(|t| t.secret.as_str()),
        );
        if let Some(private_key) = self.consumer.private_key() {
            keys = keys.with_private_key(private_key);
        }
        let signature = signature::sign(self.method, &base_string, &keys)?;
        oauth_params.push(("oauth_signature".to_owned(), signature));

        let delivery = match self.delivery {
            Delivery::Body if !has_body => {
                debug!(method = %method, "Body delivery not possible, using query string");
                Delivery::Query
            }
            delivery => delivery,
        };

        let mut headers = Vec::new();
        let (url, body_params) = match delivery {
            Delivery::Header => {
                headers.push(("Authorization".to_owned(), authorization_header(&oauth_params)));
                (target_url, form_body)
            }
            Delivery::Query => (append_query(&target_url, &oauth_params), form_body),
            Delivery::Body => {
                let mut body_params = form_body;
                body_params.extend(oauth_params.iter().cloned());
                (target_url, body_params)
            }
        };

        let body = if body_params.is_empty() {
            Vec::new()
        } else {
            headers.push(("Content-Type".to_owned(), FORM_CONTENT_TYPE.to_owned()));
            encode_form(&body_params).into_bytes()
        };

        debug!(method = %method, url = %url, delivery = %delivery, "Signed OAuth request");

        Ok(SignedRequest {
            method,
            url,
            headers,
            body,
            oauth_params,
        })
    }
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("consumer", &self.consumer)
            .field("method", &self.method)
            .field("delivery", &self.delivery)
            .finish_non_exhaustive()
    }
}

/// Build OAuth Authorization header value from protocol parameters.
pub fn authorization_header(oauth_params: &[(String, String)]) -> String {
    let mut header_parts: Vec<String> = oauth_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect();
    header_parts.sort();
    format!("OAuth {}", header_parts.join(", "))
}
