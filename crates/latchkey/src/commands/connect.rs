//! `latchkey connect` command implementation.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use clap::Args;
use latchkey_config::Config;
use latchkey_oauth::encode::parse_form;
use latchkey_oauth::{CredentialStore, Handshake, MemoryStore, OAuthError, Service, Transport};
use serde::Serialize;

use crate::error::CliError;
use crate::output::Output;
use crate::service::{build_service, build_transport};

/// Arguments for the connect command.
#[derive(Args)]
pub(crate) struct ConnectArgs {
    /// Service name (a `[services.<name>]` section of latchkey.toml).
    service: String,

    /// Print the access credential as JSON on stdout.
    #[arg(long)]
    json: bool,
}

/// Result of a completed handshake.
#[derive(Debug, Serialize)]
pub(crate) struct Connected {
    service: String,
    access_token: String,
    access_secret: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, String>,
}

impl ConnectArgs {
    /// Execute the connect command.
    ///
    /// # Errors
    ///
    /// Returns an error if any handshake step fails.
    pub(crate) fn execute(self, config: &Config) -> Result<(), CliError> {
        let output = Output::new();

        let service = build_service(&self.service, config.service(&self.service)?)?;
        let transport = build_transport(config);
        let store = MemoryStore::new();

        let connected = connect(
            &service,
            &transport,
            &store,
            &mut io::stdin().lock(),
            &output,
        )?;

        if self.json {
            writeln!(io::stdout(), "{}", serde_json::to_string_pretty(&connected)?)?;
            return Ok(());
        }

        output.separator();
        output.success("OAuth Authorization Successful!");
        output.separator();
        output.info("\nUse these credentials with `latchkey request`:");
        output.info(&format!(
            "\nexport LATCHKEY_ACCESS_TOKEN=\"{}\"",
            connected.access_token
        ));
        output.info(&format!(
            "export LATCHKEY_ACCESS_SECRET=\"{}\"",
            connected.access_secret
        ));
        for (key, value) in &connected.metadata {
            output.info(&format!("# {key} = {value}"));
        }

        Ok(())
    }
}

/// Run the handshake, reading the callback URL or verifier from `input`.
pub(crate) fn connect(
    service: &Service,
    transport: &dyn Transport,
    store: &dyn CredentialStore,
    input: &mut impl BufRead,
    output: &Output,
) -> Result<Connected, CliError> {
    let mut handshake = Handshake::new(service, transport, store);

    // Step 1: Get temporary credentials
    output.info("Step 1: Requesting temporary credentials...");
    let temporary_token = handshake.request_temporary_credentials()?.token.clone();
    output.success("Temporary credentials received");

    // Step 2: User authorization
    let url = handshake
        .build_authorization_redirect()
        .map_err(OAuthError::from)?;
    output.separator();
    output.highlight("Step 2: Authorization Required");
    output.separator();
    output.info("\nPlease open this URL in your browser:");
    output.highlight(&format!("\n{url}\n"));
    output.prompt("Paste the callback URL or the verification code: ")?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let (token, verifier) = parse_callback(line.trim(), &temporary_token);

    // Step 3: Exchange for access token
    output.info("\nStep 3: Exchanging for access token...");
    let access = handshake.exchange_for_access_token(&token, verifier.as_deref())?;

    Ok(Connected {
        service: service.name().to_owned(),
        access_token: access.token,
        access_secret: access.secret,
        metadata: handshake.flow().metadata().clone(),
    })
}

/// Extract `oauth_token` and `oauth_verifier` from what the user pasted.
///
/// Accepts a full callback URL, a bare query string, or just the verifier.
/// A missing `oauth_token` means the flow's own temporary token.
fn parse_callback(input: &str, temporary_token: &str) -> (String, Option<String>) {
    if input.is_empty() {
        return (temporary_token.to_owned(), None);
    }
    if !input.contains('=') {
        return (temporary_token.to_owned(), Some(input.to_owned()));
    }

    let query = input.split_once('?').map_or(input, |(_, query)| query);
    let query = query.split_once('#').map_or(query, |(query, _)| query);
    let params = parse_form(query);
    let find = |name: &str| {
        params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    };

    (
        find("oauth_token").unwrap_or_else(|| temporary_token.to_owned()),
        find("oauth_verifier"),
    )
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use latchkey_oauth::{
        ConsumerCredentials, Endpoint, HandshakeReason, MockTransport, RequestSigner,
        SignatureMethod,
    };
    use pretty_assertions::assert_eq;

    use super::*;

    const TEMP_BODY: &str =
        "oauth_token=temp123&oauth_token_secret=secretABC&oauth_callback_confirmed=true";

    fn service() -> Service {
        Service::new(
            "example",
            RequestSigner::new(
                ConsumerCredentials::new("key", "secret"),
                SignatureMethod::HmacSha1,
            ),
            Endpoint::post("https://service.example/request_token"),
            "https://service.example/authorize",
            Endpoint::post("https://service.example/access_token"),
        )
    }

    #[test]
    fn test_parse_callback_url() {
        assert_eq!(
            parse_callback(
                "https://host.example/cb?oauth_token=temp123&oauth_verifier=abc%20d#frag",
                "temp123"
            ),
            ("temp123".to_owned(), Some("abc d".to_owned()))
        );
    }

    #[test]
    fn test_parse_callback_query_without_token() {
        assert_eq!(
            parse_callback("oauth_verifier=xyz", "temp123"),
            ("temp123".to_owned(), Some("xyz".to_owned()))
        );
    }

    #[test]
    fn test_parse_bare_verifier() {
        assert_eq!(
            parse_callback("8a7f3c", "temp123"),
            ("temp123".to_owned(), Some("8a7f3c".to_owned()))
        );
        assert_eq!(parse_callback("", "temp123"), ("temp123".to_owned(), None));
    }

    #[test]
    fn test_connect_end_to_end() {
        let service = service();
        let transport = MockTransport::new()
            .with_response(200, TEMP_BODY)
            .with_response(
                200,
                "oauth_token=access456&oauth_token_secret=accessXYZ&screen_name=jo",
            );
        let store = MemoryStore::new();
        let mut input = Cursor::new("https://host.example/cb?oauth_token=temp123&oauth_verifier=v1\n");

        let connected = connect(&service, &transport, &store, &mut input, &Output::new()).unwrap();

        assert_eq!(connected.access_token, "access456");
        assert_eq!(connected.access_secret, "accessXYZ");
        assert_eq!(
            connected.metadata.get("screen_name").map(String::as_str),
            Some("jo")
        );
        let json = serde_json::to_value(&connected).unwrap();
        assert_eq!(json["service"], "example");
        assert_eq!(json["metadata"]["screen_name"], "jo");
    }

    #[test]
    fn test_connect_rejects_foreign_token() {
        let service = service();
        let transport = MockTransport::new().with_response(200, TEMP_BODY);
        let store = MemoryStore::new();
        let mut input = Cursor::new("oauth_token=someone-else&oauth_verifier=v1\n");

        let err = connect(&service, &transport, &store, &mut input, &Output::new()).unwrap_err();

        assert!(matches!(
            err,
            CliError::OAuth(OAuthError::Handshake(ref e)) if e.reason == HandshakeReason::TokenMismatch
        ));
    }

    #[test]
    fn test_connect_temporary_credentials_rejected() {
        let service = service();
        let transport = MockTransport::new().with_response(401, "oauth_problem=signature_invalid");
        let store = MemoryStore::new();
        let mut input = Cursor::new("");

        let err = connect(&service, &transport, &store, &mut input, &Output::new()).unwrap_err();

        assert!(err.to_string().contains("temporary_credentials_failed"));
    }
}
