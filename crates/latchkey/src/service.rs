//! Builds core OAuth objects from configuration.

use std::time::Duration;

use latchkey_config::{Config, ServiceConfig};
use latchkey_oauth::key::load_private_key_from_file;
use latchkey_oauth::{ConsumerCredentials, Endpoint, RequestSigner, Service, UreqTransport};

use crate::error::CliError;

/// Create a signer for a configured service.
///
/// Loads the RSA private key when one is configured.
pub(crate) fn build_signer(config: &ServiceConfig) -> Result<RequestSigner, CliError> {
    let mut consumer = ConsumerCredentials::new(&config.consumer_key, &config.consumer_secret);
    if let Some(path) = &config.private_key {
        consumer = consumer.with_private_key(load_private_key_from_file(path)?);
    }

    Ok(RequestSigner::new(consumer, config.signature_method).with_delivery(config.delivery))
}

/// Describe a configured service for the handshake.
pub(crate) fn build_service(name: &str, config: &ServiceConfig) -> Result<Service, CliError> {
    let signer = build_signer(config)?;

    let mut service = Service::new(
        name,
        signer,
        Endpoint::new(config.request_token_method.as_str(), &config.request_token_url),
        &config.authorize_url,
        Endpoint::new(config.access_token_method.as_str(), &config.access_token_url),
    )
    .with_callback_in_authorize(config.authorize_includes_callback);

    if let Some(callback) = &config.callback_url {
        service = service.with_callback(callback);
    }

    Ok(service)
}

/// HTTP transport honoring `[http] timeout_secs`.
pub(crate) fn build_transport(config: &Config) -> UreqTransport {
    UreqTransport::new(Duration::from_secs(config.http.timeout_secs))
}
