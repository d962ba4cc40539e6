//! `latchkey sign` command implementation.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::{self, Write};

use clap::Args;
use latchkey_config::Config;
use latchkey_oauth::{Credential, SignedRequest};
use serde::Serialize;

use super::parse_param;
use crate::error::CliError;
use crate::service::build_signer;

/// Arguments for the sign command.
#[derive(Args)]
pub(crate) struct SignArgs {
    /// Service name (a `[services.<name>]` section of latchkey.toml).
    service: String,

    /// Request URL.
    url: String,

    /// HTTP method.
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Request parameter as key=value (repeatable).
    #[arg(short, long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// OAuth token; omit to sign without one.
    #[arg(long, env = "LATCHKEY_ACCESS_TOKEN")]
    token: Option<String>,

    /// OAuth token secret.
    #[arg(long, env = "LATCHKEY_ACCESS_SECRET", hide_env_values = true)]
    token_secret: Option<String>,

    /// Print the signed request as JSON.
    #[arg(long)]
    json: bool,
}

/// JSON rendering of a signed request.
#[derive(Serialize)]
struct SignedOutput<'a> {
    method: &'a str,
    url: &'a str,
    headers: BTreeMap<&'a str, &'a str>,
    body: String,
}

impl SignArgs {
    /// Execute the sign command, printing the request to stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is incomplete or signing fails.
    pub(crate) fn execute(self, config: &Config) -> Result<(), CliError> {
        let signer = build_signer(config.service(&self.service)?)?;
        let token = self.token()?;

        let signed = signer.sign_request(&self.method, &self.url, token.as_ref(), &self.params)?;

        let rendered = if self.json {
            let output = SignedOutput {
                method: &signed.method,
                url: &signed.url,
                headers: signed
                    .headers
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect(),
                body: String::from_utf8_lossy(&signed.body).into_owned(),
            };
            serde_json::to_string_pretty(&output)?
        } else {
            render(&signed)
        };

        writeln!(io::stdout(), "{rendered}")?;
        Ok(())
    }

    fn token(&self) -> Result<Option<Credential>, CliError> {
        match (&self.token, &self.token_secret) {
            (Some(token), Some(secret)) => Ok(Some(Credential::new(token, secret))),
            (None, None) => Ok(None),
            _ => Err(CliError::Validation(
                "--token and --token-secret must be given together".to_owned(),
            )),
        }
    }
}

/// Render a signed request as HTTP/1.1-style text.
fn render(signed: &SignedRequest) -> String {
    let mut text = format!("{} {}", signed.method, signed.url);
    for (name, value) in &signed.headers {
        let _ = write!(text, "\n{name}: {value}");
    }
    if !signed.body.is_empty() {
        let _ = write!(text, "\n\n{}", String::from_utf8_lossy(&signed.body));
    }
    text
}
