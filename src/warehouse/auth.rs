//! Key-pair authentication for the Snowflake SQL API.
//!
//! Each request carries a short-lived RS256 JWT whose issuer names the
//! fingerprint of the user's registered public key.

use crate::error::WarehouseError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Snowflake rejects tokens valid for longer than an hour.
const TOKEN_LIFETIME_MINUTES: i64 = 59;

#[derive(Debug, Serialize)]
struct Claims {
    iss: String,
    sub: String,
    iat: i64,
    exp: i64,
}

/// A parsed private key plus the fingerprint of its public half.
pub struct KeyPair {
    encoding_key: EncodingKey,
    fingerprint: String,
}

impl KeyPair {
    /// Parse an unencrypted PKCS#8 or PKCS#1 PEM private key.
    pub fn from_pem(pem: &str) -> Result<Self, WarehouseError> {
        let pem = normalize_pem(pem);

        let private_key = RsaPrivateKey::from_pkcs8_pem(&pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&pem))
            .map_err(|e| {
                WarehouseError::Key(format!(
                    "expected an unencrypted RSA private key in PEM form ({})",
                    e
                ))
            })?;

        let public_der = RsaPublicKey::from(&private_key)
            .to_public_key_der()
            .map_err(|e| WarehouseError::Key(e.to_string()))?;
        let fingerprint = format!(
            "SHA256:{}",
            STANDARD.encode(Sha256::digest(public_der.as_bytes()))
        );

        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| WarehouseError::Key(e.to_string()))?;

        Ok(Self {
            encoding_key,
            fingerprint,
        })
    }

    /// `SHA256:<base64>` fingerprint of the public key.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Mint a token for `user` in `account`, valid from `now`.
    pub fn token(
        &self,
        account: &str,
        user: &str,
        now: DateTime<Utc>,
    ) -> Result<String, WarehouseError> {
        let qualified_user = format!("{}.{}", account_locator(account), user.to_uppercase());
        let claims = Claims {
            iss: format!("{}.{}", qualified_user, self.fingerprint),
            sub: qualified_user,
            iat: now.timestamp(),
            exp: (now + Duration::minutes(TOKEN_LIFETIME_MINUTES)).timestamp(),
        };

        Ok(encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.encoding_key,
        )?)
    }
}

/// Secrets stores often flatten the PEM onto one line with literal `\n`.
pub fn normalize_pem(raw: &str) -> String {
    raw.trim().replace("\\n", "\n")
}

/// Account name as it appears in token claims: uppercased, region dropped.
pub fn account_locator(account: &str) -> String {
    account
        .split('.')
        .next()
        .unwrap_or(account)
        .to_uppercase()
}
