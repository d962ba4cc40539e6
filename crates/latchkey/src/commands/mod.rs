//! CLI command implementations.

pub(crate) mod connect;
pub(crate) mod request;
pub(crate) mod sign;

pub(crate) use connect::ConnectArgs;
pub(crate) use request::RequestArgs;
pub(crate) use sign::SignArgs;

/// Parse a `key=value` request parameter. The value may be empty.
pub(crate) fn parse_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, _)) if key.is_empty() => Err(format!("missing parameter name in '{s}'")),
        Some((key, value)) => Ok((key.to_owned(), value.to_owned())),
        None => Err(format!("expected key=value, got '{s}'")),
    }
}
