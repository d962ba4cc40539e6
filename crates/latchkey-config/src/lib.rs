//! Configuration management for Latchkey.
//!
//! Parses `latchkey.toml` with serde and finds it in the current directory or
//! one of its parents when no explicit path is given.
//!
//! ```toml
//! [http]
//! timeout_secs = 30
//!
//! [services.example]
//! consumer_key = "${EXAMPLE_KEY}"
//! consumer_secret = "${EXAMPLE_SECRET}"
//! request_token_url = "https://service.example/oauth/request_token"
//! authorize_url = "https://service.example/oauth/authorize"
//! access_token_url = "https://service.example/oauth/access_token"
//! ```
//!
//! ## Environment Variable Expansion
//!
//! Every string value of a service supports:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default

mod expand;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use latchkey_oauth::{Delivery, SignatureMethod};
use serde::Deserialize;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "latchkey.toml";

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP client settings.
    pub http: HttpConfig,
    /// Remote services by name.
    pub services: BTreeMap<String, ServiceConfig>,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// HTTP client configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Global per-request timeout.
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

/// HTTP method of a token endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EndpointMethod {
    #[default]
    Get,
    Post,
}

impl EndpointMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for EndpointMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One remote service the consumer is registered with.
#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    /// OAuth consumer key.
    pub consumer_key: String,
    /// OAuth consumer secret (unused by RSA-SHA1).
    #[serde(default)]
    pub consumer_secret: String,
    /// Signature method.
    #[serde(default)]
    pub signature_method: SignatureMethod,
    /// PEM private key for RSA-SHA1, relative to the config file directory.
    #[serde(default)]
    pub private_key: Option<PathBuf>,
    /// Temporary-credential endpoint.
    pub request_token_url: String,
    #[serde(default)]
    pub request_token_method: EndpointMethod,
    /// Resource-owner authorization endpoint.
    pub authorize_url: String,
    /// Token endpoint.
    pub access_token_url: String,
    #[serde(default)]
    pub access_token_method: EndpointMethod,
    /// Callback URL; `oob` when unset.
    #[serde(default)]
    pub callback_url: Option<String>,
    /// Append `oauth_callback` to the authorization URL as well.
    #[serde(default)]
    pub authorize_includes_callback: bool,
    /// Where protocol parameters are sent.
    #[serde(default)]
    pub delivery: Delivery,
}

impl ServiceConfig {
    /// Validate that all required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` naming the first invalid field.
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let field = |suffix: &str| format!("services.{name}.{suffix}");

        require_non_empty(&self.consumer_key, &field("consumer_key"))?;
        require_http_url(&self.request_token_url, &field("request_token_url"))?;
        require_http_url(&self.authorize_url, &field("authorize_url"))?;
        require_http_url(&self.access_token_url, &field("access_token_url"))?;

        match self.signature_method {
            SignatureMethod::RsaSha1 => {
                if self.private_key.is_none() {
                    return Err(ConfigError::Validation(format!(
                        "{} is required for RSA-SHA1",
                        field("private_key")
                    )));
                }
            }
            SignatureMethod::HmacSha1 | SignatureMethod::Plaintext => {
                require_non_empty(&self.consumer_secret, &field("consumer_secret"))?;
            }
        }

        if let Some(callback) = &self.callback_url
            && callback != "oob"
        {
            require_http_url(callback, &field("callback_url"))?;
        }

        Ok(())
    }

    /// Expand environment variable references in string values.
    fn expand_env_vars(&mut self, name: &str) -> Result<(), ConfigError> {
        let field = |suffix: &str| format!("services.{name}.{suffix}");

        self.consumer_key = expand::expand_env(&self.consumer_key, &field("consumer_key"))?;
        self.consumer_secret =
            expand::expand_env(&self.consumer_secret, &field("consumer_secret"))?;
        self.request_token_url =
            expand::expand_env(&self.request_token_url, &field("request_token_url"))?;
        self.authorize_url = expand::expand_env(&self.authorize_url, &field("authorize_url"))?;
        self.access_token_url =
            expand::expand_env(&self.access_token_url, &field("access_token_url"))?;
        if let Some(callback) = &self.callback_url {
            self.callback_url = Some(expand::expand_env(callback, &field("callback_url"))?);
        }
        if let Some(path) = &self.private_key {
            let expanded = expand::expand_env(&path.to_string_lossy(), &field("private_key"))?;
            self.private_key = Some(PathBuf::from(expanded));
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// No `[services.<name>]` section.
    #[error("Unknown service: {0}")]
    UnknownService(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`services.example.consumer_secret`").
        field: String,
        /// Error message (e.g., "${`EXAMPLE_SECRET`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise, searches
    /// for `latchkey.toml` in the current directory and its parents, falling
    /// back to an empty configuration.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// an environment variable is missing, or validation fails.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)
        } else {
            Ok(Self::default())
        }
    }

    /// Look up a service by name.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownService` if no such section exists.
    pub fn service(&self, name: &str) -> Result<&ServiceConfig, ConfigError> {
        self.services
            .get(name)
            .ok_or_else(|| ConfigError::UnknownService(name.to_owned()))
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "http.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        for (name, service) in &self.services {
            service.validate(name)?;
        }
        Ok(())
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        for (name, service) in &mut self.services {
            service.expand_env_vars(name)?;
        }
        Ok(())
    }

    /// Resolve relative key paths against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        for service in self.services.values_mut() {
            if let Some(path) = &service.private_key
                && path.is_relative()
            {
                service.private_key = Some(config_dir.join(path));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const EXAMPLE: &str = r#"
[services.example]
consumer_key = "key"
consumer_secret = "secret"
request_token_url = "https://service.example/oauth/request_token"
authorize_url = "https://service.example/oauth/authorize"
access_token_url = "https://service.example/oauth/access_token"
"#;

    fn parse(toml: &str) -> Config {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse("");
        assert_eq!(config.http.timeout_secs, 30);
        assert!(config.services.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_service_defaults() {
        let config = parse(EXAMPLE);
        let service = config.service("example").unwrap();

        assert_eq!(service.consumer_key, "key");
        assert_eq!(service.signature_method, SignatureMethod::HmacSha1);
        assert_eq!(service.request_token_method, EndpointMethod::Get);
        assert_eq!(service.access_token_method, EndpointMethod::Get);
        assert_eq!(service.delivery, Delivery::Header);
        assert_eq!(service.callback_url, None);
        assert!(!service.authorize_includes_callback);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full_service() {
        let config = parse(
            r#"
[http]
timeout_secs = 5

[services.rsa]
consumer_key = "key"
signature_method = "RSA-SHA1"
private_key = "keys/rsa.pem"
request_token_url = "https://service.example/request_token"
request_token_method = "POST"
authorize_url = "https://service.example/authorize"
access_token_url = "https://service.example/access_token"
access_token_method = "POST"
callback_url = "https://host.example/callback"
authorize_includes_callback = true
delivery = "body"
"#,
        );
        let service = config.service("rsa").unwrap();

        assert_eq!(config.http.timeout_secs, 5);
        assert_eq!(service.signature_method, SignatureMethod::RsaSha1);
        assert_eq!(service.request_token_method, EndpointMethod::Post);
        assert_eq!(service.access_token_method.as_str(), "POST");
        assert_eq!(service.delivery, Delivery::Body);
        assert_eq!(
            service.callback_url.as_deref(),
            Some("https://host.example/callback")
        );
        assert!(service.authorize_includes_callback);
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_service() {
        let config = parse(EXAMPLE);
        let err = config.service("missing").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownService(ref name) if name == "missing"));
    }

    #[test]
    fn test_validate_requires_secret_for_hmac() {
        let config = parse(&EXAMPLE.replace("consumer_secret = \"secret\"\n", ""));
        let err = config.validate().unwrap_err();
        assert!(
            err.to_string()
                .contains("services.example.consumer_secret cannot be empty")
        );
    }

    #[test]
    fn test_validate_requires_key_for_rsa() {
        let config = parse(&format!("{EXAMPLE}signature_method = \"RSA-SHA1\"\n"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("services.example.private_key"));
    }

    #[test]
    fn test_validate_rejects_non_http_url() {
        let config = parse(&EXAMPLE.replace(
            "https://service.example/oauth/authorize",
            "ftp://service.example/authorize",
        ));
        let err = config.validate().unwrap_err();
        assert!(
            err.to_string()
                .contains("services.example.authorize_url must start with http://")
        );
    }

    #[test]
    fn test_validate_callback() {
        let oob = parse(&format!("{EXAMPLE}callback_url = \"oob\"\n"));
        oob.validate().unwrap();

        let bad = parse(&format!("{EXAMPLE}callback_url = \"myapp://done\"\n"));
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_validate_timeout_zero() {
        let config = parse("[http]\ntimeout_secs = 0\n");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_method_rejected_by_parser() {
        let result: Result<Config, _> =
            toml::from_str(&format!("{EXAMPLE}request_token_method = \"DELETE\"\n"));
        assert!(result.is_err());
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("LATCHKEY_CFG_KEY", "env-key");
            std::env::set_var("LATCHKEY_CFG_SECRET", "env-secret");
        }

        let mut config = parse(
            &EXAMPLE
                .replace("\"key\"", "\"${LATCHKEY_CFG_KEY}\"")
                .replace("\"secret\"", "\"${LATCHKEY_CFG_SECRET}\""),
        );
        config.expand_env_vars().unwrap();

        let service = config.service("example").unwrap();
        assert_eq!(service.consumer_key, "env-key");
        assert_eq!(service.consumer_secret, "env-secret");

        unsafe {
            std::env::remove_var("LATCHKEY_CFG_KEY");
            std::env::remove_var("LATCHKEY_CFG_SECRET");
        }
    }

    #[test]
    fn test_expand_env_vars_missing_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("LATCHKEY_CFG_MISSING");
        }

        let mut config = parse(&EXAMPLE.replace("\"secret\"", "\"${LATCHKEY_CFG_MISSING}\""));
        let err = config.expand_env_vars().unwrap_err();

        assert!(err.to_string().contains("LATCHKEY_CFG_MISSING"));
        assert!(err.to_string().contains("services.example.consumer_secret"));
    }

    #[test]
    fn test_load_resolves_private_key_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(
            &path,
            format!("{EXAMPLE}signature_method = \"RSA-SHA1\"\nprivate_key = \"keys/rsa.pem\"\n"),
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(
            config.service("example").unwrap().private_key,
            Some(dir.path().join("keys/rsa.pem"))
        );
    }

    #[test]
    fn test_load_keeps_absolute_private_key_path() {
        let mut config = parse(&format!("{EXAMPLE}private_key = \"/etc/latchkey/rsa.pem\"\n"));
        config.resolve_paths(Path::new("/project"));
        assert_eq!(
            config.service("example").unwrap().private_key,
            Some(PathBuf::from("/etc/latchkey/rsa.pem"))
        );
    }

    #[test]
    fn test_load_explicit_path_not_found() {
        let err = Config::load(Some(Path::new("/nonexistent/latchkey.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, EXAMPLE.replace("consumer_key = \"key\"", "consumer_key = \"\"")).unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
