//! Environment variable expansion for configuration strings.

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` references in a string.
///
/// Strings without `${` are returned unchanged, so a literal `$` in a secret
/// or URL needs no escaping.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    shellexpand::env_with_context(value, |var| -> Result<Option<String>, LookupError> {
        match std::env::var(var) {
            Ok(val) => Ok(Some(val)),
            Err(_) => Err(LookupError {
                var_name: var.to_owned(),
            }),
        }
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{0}}} not set", e.cause.var_name),
    })
}

struct LookupError {
    var_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("LATCHKEY_TEST_SECRET", "s3cr3t");
        }
        let result = expand_env("${LATCHKEY_TEST_SECRET}", "services.x.consumer_secret").unwrap();
        assert_eq!(result, "s3cr3t");
        unsafe {
            std::env::remove_var("LATCHKEY_TEST_SECRET");
        }
    }

    #[test]
    fn test_expand_default_when_unset() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("LATCHKEY_TEST_UNSET");
        }
        let result = expand_env("${LATCHKEY_TEST_UNSET:-fallback}", "test.field").unwrap();
        assert_eq!(result, "fallback");
    }

    #[test]
    fn test_expand_embedded_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("LATCHKEY_TEST_HOST", "service.example");
        }
        let result = expand_env("https://${LATCHKEY_TEST_HOST}/oauth/authorize", "test.url").unwrap();
        assert_eq!(result, "https://service.example/oauth/authorize");
        unsafe {
            std::env::remove_var("LATCHKEY_TEST_HOST");
        }
    }

    #[test]
    fn test_missing_var_names_field() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("LATCHKEY_TEST_MISSING");
        }
        let err = expand_env("${LATCHKEY_TEST_MISSING}", "services.x.consumer_key").unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { .. }));
        assert!(err.to_string().contains("LATCHKEY_TEST_MISSING"));
        assert!(err.to_string().contains("services.x.consumer_key"));
    }

    #[test]
    fn test_literal_dollar_unchanged() {
        let result = expand_env("pa$$word", "test.field").unwrap();
        assert_eq!(result, "pa$$word");
    }
}
