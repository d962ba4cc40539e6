//! Remote service description: endpoints, signer and callback.

use std::fmt;

use crate::signer::RequestSigner;

/// Callback value for clients that cannot receive redirects (RFC 5849 Section 2.1).
pub const OUT_OF_BAND: &str = "oob";

/// An endpoint URL and the HTTP method used to call it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Endpoint URL.
    pub url: String,
    /// Uppercased HTTP method.
    pub method: String,
}

impl Endpoint {
    /// Endpoint called with GET.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_owned(),
        }
    }

    /// Endpoint called with POST.
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "POST".to_owned(),
        }
    }

    /// Endpoint called with an arbitrary method.
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.to_ascii_uppercase(),
        }
    }
}

/// Everything a handshake needs to know about one remote service.
pub struct Service {
    name: String,
    signer: RequestSigner,
    request_token: Endpoint,
    authorize_url: String,
    access_token: Endpoint,
    callback_url: Option<String>,
    authorize_includes_callback: bool,
}

impl Service {
    /// Describe a service.
    ///
    /// # Arguments
    /// * `name` - Host-chosen name, used in logs
    /// * `signer` - Signer holding the consumer credentials
    /// * `request_token` - Temporary-credential endpoint
    /// * `authorize_url` - Resource-owner authorization endpoint
    /// * `access_token` - Token endpoint
    pub fn new(
        name: impl Into<String>,
        signer: RequestSigner,
        request_token: Endpoint,
        authorize_url: impl Into<String>,
        access_token: Endpoint,
    ) -> Self {
        Self {
            name: name.into(),
            signer,
            request_token,
            authorize_url: authorize_url.into(),
            access_token,
            callback_url: None,
            authorize_includes_callback: false,
        }
    }

    /// Set the callback URL sent as `oauth_callback`. Defaults to `oob`.
    #[must_use]
    pub fn with_callback(mut self, callback_url: impl Into<String>) -> Self {
        self.callback_url = Some(callback_url.into());
        self
    }

    /// Also append `oauth_callback` to the authorization redirect.
    #[must_use]
    pub fn with_callback_in_authorize(mut self, include: bool) -> Self {
        self.authorize_includes_callback = include;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signer(&self) -> &RequestSigner {
        &self.signer
    }

    pub fn request_token(&self) -> &Endpoint {
        &self.request_token
    }

    pub fn authorize_url(&self) -> &str {
        &self.authorize_url
    }

    pub fn access_token(&self) -> &Endpoint {
        &self.access_token
    }

    /// Callback URL, `oob` when none was configured.
    pub fn callback_url(&self) -> &str {
        self.callback_url.as_deref().unwrap_or(OUT_OF_BAND)
    }

    pub fn authorize_includes_callback(&self) -> bool {
        self.authorize_includes_callback
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("signer", &self.signer)
            .field("request_token", &self.request_token)
            .field("authorize_url", &self.authorize_url)
            .field("access_token", &self.access_token)
            .field("callback_url", &self.callback_url())
            .field("authorize_includes_callback", &self.authorize_includes_callback)
            .finish()
    }
}
