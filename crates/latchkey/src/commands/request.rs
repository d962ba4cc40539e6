//! `latchkey request` command implementation.

use std::io::{self, Write};

use clap::Args;
use latchkey_config::Config;
use latchkey_oauth::{AuthenticatedClient, Credential, RequestSigner, Transport};

use super::parse_param;
use crate::error::CliError;
use crate::service::{build_signer, build_transport};

/// Arguments for the request command.
#[derive(Args)]
pub(crate) struct RequestArgs {
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

    /// OAuth access token.
    #[arg(long, env = "LATCHKEY_ACCESS_TOKEN")]
    token: String,

    /// OAuth access token secret.
    #[arg(long, env = "LATCHKEY_ACCESS_SECRET", hide_env_values = true)]
    token_secret: String,
}

impl RequestArgs {
    /// Execute the request command, writing the response body to stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails, the request fails, or the service
    /// answers with a non-200 status.
    pub(crate) fn execute(self, config: &Config) -> Result<(), CliError> {
        let signer = build_signer(config.service(&self.service)?)?;
        let transport = build_transport(config);

        let body = self.send(&signer, &transport)?;

        let mut stdout = io::stdout().lock();
        stdout.write_all(&body)?;
        stdout.flush()?;
        Ok(())
    }

    fn send(&self, signer: &RequestSigner, transport: &dyn Transport) -> Result<Vec<u8>, CliError> {
        let access = Credential::new(&self.token, &self.token_secret);
        let client = AuthenticatedClient::new(signer, transport, access);
        Ok(client.request(&self.method, &self.url, &self.params)?)
    }
}
