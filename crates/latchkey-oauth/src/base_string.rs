//! Signature base string construction (RFC 5849 Section 3.4.1).
//!
//! Format: `METHOD&encoded_base_uri&encoded_normalized_parameters`

use tracing::debug;
use ureq::http::Uri;

use crate::encode::{normalize_encoded, parse_form_encoded, percent_encode};
use crate::error::OAuthError;

/// Parameter excluded from its own base string.
const SIGNATURE_PARAM: &str = "oauth_signature";

/// Normalize a request URL into the base string URI (RFC 5849 Section 3.4.1.2).
///
/// Scheme and host are lowercased, default ports (80 for http, 443 for https)
/// are dropped, the query and fragment are removed, and the path is kept as-is.
pub fn base_string_uri(url: &str) -> Result<String, OAuthError> {
    let uri: Uri = url.parse().map_err(|e: ureq::http::uri::InvalidUri| OAuthError::InvalidUrl {
        url: url.to_owned(),
        message: e.to_string(),
    })?;

    let scheme = uri
        .scheme_str()
        .ok_or_else(|| invalid_url(url, "missing scheme"))?
        .to_ascii_lowercase();
    let host = uri
        .host()
        .ok_or_else(|| invalid_url(url, "missing host"))?
        .to_ascii_lowercase();

    let default_port = match scheme.as_str() {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    };
    let authority = match uri.port_u16() {
        Some(port) if Some(port) != default_port => format!("{host}:{port}"),
        _ => host,
    };

    let path = match uri.path() {
        "" => "/",
        path => path,
    };

    Ok(format!("{scheme}://{authority}{path}"))
}

/// Build the signature base string for a request.
///
/// # Arguments
/// * `method` - HTTP method (uppercased here)
/// * `url` - Full request URL; its query parameters are signed
/// * `form_body` - Decoded parameters of an `application/x-www-form-urlencoded`
///   body; pass an empty slice for any other body
/// * `oauth_params` - Protocol parameters; `oauth_signature` is ignored if present
pub fn signature_base_string(
    method: &str,
    url: &str,
    form_body: &[(String, String)],
    oauth_params: &[(String, String)],
) -> Result<String, OAuthError> {
    let base_uri = base_string_uri(url)?;

    // Query components stay in their raw bytes; re-encoding decoded text would
    // turn invalid UTF-8 into U+FFFD.
    let query_params = url
        .split_once('?')
        .map(|(_, rest)| rest.split_once('#').map_or(rest, |(query, _)| query))
        .map(parse_form_encoded)
        .unwrap_or_default();

    let params: Vec<(String, String)> = query_params
        .into_iter()
        .chain(
            form_body
                .iter()
                .chain(oauth_params)
                .map(|(k, v)| (percent_encode(k), percent_encode(v))),
        )
        .filter(|(key, _)| key != SIGNATURE_PARAM)
        .collect();

    let base_string = format!(
        "{}&{}&{}",
        percent_encode(&method.to_ascii_uppercase()),
        percent_encode(&base_uri),
        percent_encode(&normalize_encoded(params))
    );
    debug!(base_string = %base_string, "Built signature base string");

    Ok(base_string)
}

fn invalid_url(url: &str, message: &str) -> OAuthError {
    OAuthError::InvalidUrl {
        url: url.to_owned(),
        message: message.to_owned(),
    }
}
