//! Sender authentication for push delivery.
//!
//! Parses the configured VAPID key material and mints the short-lived ES256
//! token carried in the `Authorization` header, so the push service can
//! verify which application server is sending. The signing primitive itself
//! comes from the `p256` crate; this module only assembles key material and
//! the token.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use p256::ecdsa::{signature::Signer, Signature, SigningKey, VerifyingKey};
use taskflow_core::VapidSettings;

use crate::error::{DeliveryError, Result};

/// How long a minted token stays valid. Push services accept up to 24h.
const TOKEN_LIFETIME: Duration = Duration::from_secs(12 * 60 * 60);

/// Fixed JWS header for ES256 tokens, pre-encoded at first use.
const JWS_HEADER: &str = r#"{"typ":"JWT","alg":"ES256"}"#;

/// Validated signing credentials.
///
/// Constructed once at startup; an invalid key pair is rejected before the
/// worker consumes a single job.
#[derive(Debug, Clone)]
pub struct VapidKeys {
    signing_key: SigningKey,
    public_key: String,
    subject: String,
}

impl VapidKeys {
    /// Parses and validates configured key material.
    ///
    /// The public key must be an uncompressed P-256 point (65 bytes), the
    /// private key a 32-byte scalar, both base64url without padding, and the
    /// pair must actually belong together.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Vapid` on any decoding or validation failure.
    pub fn parse(settings: &VapidSettings) -> Result<Self> {
        if !settings.subject.starts_with("mailto:") && !settings.subject.starts_with("https:") {
            return Err(DeliveryError::vapid(format!(
                "subject must be a mailto: or https: URI, got {:?}",
                settings.subject
            )));
        }

        let public_bytes = URL_SAFE_NO_PAD
            .decode(&settings.public_key)
            .map_err(|e| DeliveryError::vapid(format!("public key is not base64url: {e}")))?;
        let verifying_key = VerifyingKey::from_sec1_bytes(&public_bytes)
            .map_err(|_| DeliveryError::vapid("public key is not a valid P-256 point"))?;

        let private_bytes = URL_SAFE_NO_PAD
            .decode(&settings.private_key)
            .map_err(|e| DeliveryError::vapid(format!("private key is not base64url: {e}")))?;
        let private_bytes: [u8; 32] = private_bytes
            .try_into()
            .map_err(|_| DeliveryError::vapid("private key must be a 32-byte scalar"))?;
        let signing_key = SigningKey::from_bytes((&private_bytes).into())
            .map_err(|_| DeliveryError::vapid("private key is not a valid P-256 scalar"))?;

        if signing_key.verifying_key() != &verifying_key {
            return Err(DeliveryError::vapid(
                "public key does not match the private key",
            ));
        }

        Ok(Self {
            signing_key,
            public_key: settings.public_key.clone(),
            subject: settings.subject.clone(),
        })
    }

    /// Mints the `Authorization` header value for one delivery.
    ///
    /// The token audience is the endpoint's origin, so one token cannot be
    /// replayed against a different push service.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if the endpoint is not an
    /// http(s) URI.
    pub fn authorization(&self, endpoint: &str, now: SystemTime) -> Result<String> {
        let url = reqwest::Url::parse(endpoint)
            .map_err(|e| DeliveryError::configuration(format!("endpoint is not a URI: {e}")))?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(DeliveryError::configuration(format!(
                "endpoint scheme {:?} is not http(s)",
                url.scheme()
            )));
        }
        let audience = url.origin().ascii_serialization();

        let expiry = now
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .saturating_add(TOKEN_LIFETIME)
            .as_secs();
        let claims = serde_json::json!({
            "aud": audience,
            "exp": expiry,
            "sub": self.subject,
        });

        let token = self.sign_token(&claims.to_string());
        Ok(format!("vapid t={token}, k={}", self.public_key))
    }

    /// The contact subject configured for this sender.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    fn sign_token(&self, claims: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(JWS_HEADER);
        let claims = URL_SAFE_NO_PAD.encode(claims);
        let signing_input = format!("{header}.{claims}");

        let signature: Signature = self.signing_key.sign(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(signature.to_bytes().as_slice());

        format!("{signing_input}.{signature}")
    }
}
