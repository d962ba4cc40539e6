//! OAuth 1.0 signature methods (RFC 5849 Section 3.4).
//!
//! The set of methods is closed: [`SignatureMethod`] is matched directly
//! rather than dispatched through a trait object.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use hmac::{Hmac, Mac};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::encode::percent_encode;
use crate::error::SignatureError;

type HmacSha1 = Hmac<Sha1>;

/// Value of `oauth_signature_method`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureMethod {
    /// HMAC-SHA1 over the base string, keyed by the encoded secrets.
    #[default]
    #[serde(rename = "HMAC-SHA1")]
    HmacSha1,
    /// The encoded secrets themselves. Only safe over TLS.
    #[serde(rename = "PLAINTEXT")]
    Plaintext,
    /// RSASSA-PKCS1-v1_5 with SHA-1 using the consumer private key.
    #[serde(rename = "RSA-SHA1")]
    RsaSha1,
}

impl SignatureMethod {
    /// Wire name of the method.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HmacSha1 => "HMAC-SHA1",
            Self::Plaintext => "PLAINTEXT",
            Self::RsaSha1 => "RSA-SHA1",
        }
    }
}

impl fmt::Display for SignatureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureMethod {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HMAC-SHA1" => Ok(Self::HmacSha1),
            "PLAINTEXT" => Ok(Self::Plaintext),
            "RSA-SHA1" => Ok(Self::RsaSha1),
            _ => Err(SignatureError::UnsupportedMethod(s.to_owned())),
        }
    }
}

/// Secrets and keys available for signing or verifying one request.
#[derive(Clone, Copy, Default)]
pub struct KeyMaterial<'a> {
    consumer_secret: &'a str,
    token_secret: Option<&'a str>,
    private_key: Option<&'a RsaPrivateKey>,
    public_key: Option<&'a RsaPublicKey>,
}

impl<'a> KeyMaterial<'a> {
    /// Shared secrets for HMAC-SHA1 and PLAINTEXT.
    ///
    /// `token_secret` is `None` while requesting temporary credentials.
    #[must_use]
    pub fn shared(consumer_secret: &'a str, token_secret: Option<&'a str>) -> Self {
        Self {
            consumer_secret,
            token_secret,
            ..Self::default()
        }
    }

    /// Attach the consumer private key for RSA-SHA1 signing.
    #[must_use]
    pub fn with_private_key(mut self, key: &'a RsaPrivateKey) -> Self {
        self.private_key = Some(key);
        self
    }

    /// Attach the consumer public key for RSA-SHA1 verification.
    #[must_use]
    pub fn with_public_key(mut self, key: &'a RsaPublicKey) -> Self {
        self.public_key = Some(key);
        self
    }

    /// `encode(consumer_secret)&encode(token_secret)`.
    fn composite_key(&self, method: SignatureMethod) -> Result<String, SignatureError> {
        if self.consumer_secret.is_empty() {
            return Err(SignatureError::MissingConsumerSecret(method.as_str()));
        }
        Ok(format!(
            "{}&{}",
            percent_encode(self.consumer_secret),
            percent_encode(self.token_secret.unwrap_or(""))
        ))
    }
}

impl fmt::Debug for KeyMaterial<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("consumer_secret", &"[REDACTED]")
            .field("token_secret", &self.token_secret.map(|_| "[REDACTED]"))
            .field("private_key", &self.private_key.is_some())
            .field("public_key", &self.public_key.is_some())
            .finish()
    }
}

/// Compute `oauth_signature` for a base string.
pub fn sign(
    method: SignatureMethod,
    base_string: &str,
    keys: &KeyMaterial<'_>,
) -> Result<String, SignatureError> {
    match method {
        SignatureMethod::HmacSha1 => sign_hmac_sha1(&keys.composite_key(method)?, base_string),
        SignatureMethod::Plaintext => keys.composite_key(method),
        SignatureMethod::RsaSha1 => {
            let private_key = keys.private_key.ok_or(SignatureError::MissingPrivateKey)?;
            sign_rsa_sha1(private_key, base_string)
        }
    }
}

/// Check a received `oauth_signature` against a base string.
///
/// Shared-secret methods compare in constant time.
pub fn verify(
    method: SignatureMethod,
    base_string: &str,
    signature: &str,
    keys: &KeyMaterial<'_>,
) -> Result<bool, SignatureError> {
    match method {
        SignatureMethod::HmacSha1 | SignatureMethod::Plaintext => {
            let expected = sign(method, base_string, keys)?;
            Ok(expected.as_bytes().ct_eq(signature.as_bytes()).into())
        }
        SignatureMethod::RsaSha1 => {
            let public_key = keys.public_key.ok_or(SignatureError::MissingPublicKey)?;
            let raw = BASE64_STANDARD
                .decode(signature)
                .map_err(|_| SignatureError::MalformedSignature)?;
            let signature = Signature::try_from(raw.as_slice())
                .map_err(|_| SignatureError::MalformedSignature)?;
            let verifying_key = VerifyingKey::<Sha1>::new(public_key.clone());
            Ok(verifying_key
                .verify(base_string.as_bytes(), &signature)
                .is_ok())
        }
    }
}

/// base64(HMAC-SHA1(key, data)).
fn sign_hmac_sha1(key: &str, data: &str) -> Result<String, SignatureError> {
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())?;
    mac.update(data.as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

/// Sign data with RSA-SHA1 and return base64-encoded signature.
fn sign_rsa_sha1(private_key: &RsaPrivateKey, data: &str) -> Result<String, SignatureError> {
    let signing_key = SigningKey::<Sha1>::new(private_key.clone());
    let signature = signing_key.try_sign(data.as_bytes())?;
    Ok(BASE64_STANDARD.encode(signature.to_bytes()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::key::{load_private_key, load_public_key};

    /// Base string from the RFC 5849 Section 3.4.1.1 example.
    const RFC_BASE_STRING: &str = "POST&http%3A%2F%2Fexample.com%2Frequest&a2%3Dr%2520b%26a3%3D2%2520q\
        %26a3%3Da%26b5%3D%253D%25253D%26c%2540%3D%26c2%3D%26oauth_consumer_key%3D9djdj82h48djs9d2\
        %26oauth_nonce%3D7d8f3e4a%26oauth_signature_method%3DHMAC-SHA1%26oauth_timestamp%3D137131201\
        %26oauth_token%3Dkkk9d7dh3k39sjv7";

    const PKCS8_KEY: &str = include_str!("../testdata/private_pkcs8.pem");
    const SPKI_PUBLIC: &str = include_str!("../testdata/public_spki.pem");
    const RFC_RSA_SIGNATURE: &str = include_str!("../testdata/rfc5849_rsa_sha1.sig");

    #[test]
    fn test_hmac_sha1_rfc_example() {
        let keys = KeyMaterial::shared("j49sk3j29djd", Some("dh893hdasih9"));
        let signature = sign(SignatureMethod::HmacSha1, RFC_BASE_STRING, &keys).unwrap();
        assert_eq!(signature, "r6/TJjbCOr97/+UU0NsvSne7s5g=");
    }

    #[test]
    fn test_hmac_sha1_key_longer_than_block() {
        let consumer_secret = "c".repeat(100);
        let keys = KeyMaterial::shared(&consumer_secret, Some("dh893hdasih9"));

        let signature = sign(SignatureMethod::HmacSha1, RFC_BASE_STRING, &keys).unwrap();

        assert_eq!(signature.len(), 28);
        assert_ne!(signature, "r6/TJjbCOr97/+UU0NsvSne7s5g=");
    }

    #[test]
    fn test_plaintext_is_composite_key() {
        let keys = KeyMaterial::shared("j49sk3j29djd", Some("dh893hdasih9"));
        let signature = sign(SignatureMethod::Plaintext, "ignored", &keys).unwrap();
        assert_eq!(signature, "j49sk3j29djd&dh893hdasih9");
    }

    #[test]
    fn test_plaintext_without_token_secret() {
        let keys = KeyMaterial::shared("kd94hf93k423kf44", None);
        let signature = sign(SignatureMethod::Plaintext, "ignored", &keys).unwrap();
        assert_eq!(signature, "kd94hf93k423kf44&");
    }

    #[test]
    fn test_composite_key_is_encoded() {
        let keys = KeyMaterial::shared("a&b c", Some("d=e"));
        let signature = sign(SignatureMethod::Plaintext, "ignored", &keys).unwrap();
        assert_eq!(signature, "a%26b%20c&d%3De");
    }

    #[test]
    fn test_missing_consumer_secret() {
        let keys = KeyMaterial::shared("", Some("secret"));
        let result = sign(SignatureMethod::HmacSha1, RFC_BASE_STRING, &keys);
        assert!(matches!(
            result,
            Err(SignatureError::MissingConsumerSecret("HMAC-SHA1"))
        ));
    }

    #[test]
    fn test_rsa_sha1_requires_private_key() {
        let keys = KeyMaterial::shared("secret", None);
        let result = sign(SignatureMethod::RsaSha1, RFC_BASE_STRING, &keys);
        assert!(matches!(result, Err(SignatureError::MissingPrivateKey)));
    }

    #[test]
    fn test_rsa_sha1_matches_reference_signature() {
        // PKCS#1 v1.5 is deterministic, so an independently produced signature must match
        let private_key = load_private_key(PKCS8_KEY.as_bytes()).unwrap();
        let keys = KeyMaterial::default().with_private_key(&private_key);

        let signature = sign(SignatureMethod::RsaSha1, RFC_BASE_STRING, &keys).unwrap();
        assert_eq!(signature, RFC_RSA_SIGNATURE.trim());
    }

    #[test]
    fn test_rsa_sha1_verify() {
        let private_key = load_private_key(PKCS8_KEY.as_bytes()).unwrap();
        let public_key = load_public_key(SPKI_PUBLIC.as_bytes()).unwrap();
        let keys = KeyMaterial::default()
            .with_private_key(&private_key)
            .with_public_key(&public_key);

        let signature = sign(SignatureMethod::RsaSha1, RFC_BASE_STRING, &keys).unwrap();
        assert!(verify(SignatureMethod::RsaSha1, RFC_BASE_STRING, &signature, &keys).unwrap());
        assert!(!verify(SignatureMethod::RsaSha1, "GET&other&base", &signature, &keys).unwrap());
    }

    #[test]
    fn test_rsa_sha1_verify_rejects_garbage() {
        let public_key = load_public_key(SPKI_PUBLIC.as_bytes()).unwrap();
        let keys = KeyMaterial::default().with_public_key(&public_key);

        let result = verify(SignatureMethod::RsaSha1, RFC_BASE_STRING, "not base64!", &keys);
        assert!(matches!(result, Err(SignatureError::MalformedSignature)));
    }

    #[test]
    fn test_hmac_sha1_verify() {
        let keys = KeyMaterial::shared("j49sk3j29djd", Some("dh893hdasih9"));
        assert!(
            verify(
                SignatureMethod::HmacSha1,
                RFC_BASE_STRING,
                "r6/TJjbCOr97/+UU0NsvSne7s5g=",
                &keys
            )
            .unwrap()
        );
        assert!(
            !verify(
                SignatureMethod::HmacSha1,
                RFC_BASE_STRING,
                "AAAAAAAAAAAAAAAAAAAAAAAAAAA=",
                &keys
            )
            .unwrap()
        );
    }

    #[test]
    fn test_method_names() {
        assert_eq!("HMAC-SHA1".parse::<SignatureMethod>().unwrap(), SignatureMethod::HmacSha1);
        assert_eq!("plaintext".parse::<SignatureMethod>().unwrap(), SignatureMethod::Plaintext);
        assert_eq!(SignatureMethod::RsaSha1.to_string(), "RSA-SHA1");
        assert!(matches!(
            "HMAC-SHA256".parse::<SignatureMethod>(),
            Err(SignatureError::UnsupportedMethod(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let keys = KeyMaterial::shared("consumer-secret", Some("token-secret"));
        let debug = format!("{keys:?}");
        assert!(!debug.contains("consumer-secret"));
        assert!(!debug.contains("token-secret"));
    }
}
