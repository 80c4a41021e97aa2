//! Access token verification.
//!
//! Tokens are minted by the identity service and carry the caller's user id as
//! `sub` plus the active organization. This service only needs the public key;
//! a private key enables signing for local development and tests.

use base64::Engine;
use jwt_simple::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT_PUBLIC_KEY or JWT_PRIVATE_KEY must be set")]
    MissingKey,

    #[error("{0} must be valid base64")]
    InvalidEncoding(&'static str),

    #[error("{0} must be a valid Ed25519 key")]
    InvalidKey(&'static str),

    #[error("no signing key configured")]
    CannotSign,

    #[error(transparent)]
    Token(#[from] jwt_simple::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizationClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Claims {
    pub sub: String,
    pub organization_id: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Clone)]
pub struct JwtConfig {
    key_pair: Option<Arc<Ed25519KeyPair>>,
    public_key: Arc<Ed25519PublicKey>,
    pub access_token_expiry: i64,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

fn decode_key(name: &'static str, value: &str) -> Result<Vec<u8>, JwtError> {
    base64::engine::general_purpose::STANDARD
        .decode(value.trim())
        .map_err(|_| JwtError::InvalidEncoding(name))
}

impl JwtConfig {
    /// Reads `JWT_PUBLIC_KEY`, falling back to `JWT_PRIVATE_KEY` (both base64).
    pub fn from_env(issuer: Option<String>, audience: Option<String>) -> Result<Self, JwtError> {
        let mut config = if let Ok(public_b64) = std::env::var("JWT_PUBLIC_KEY") {
            let bytes = decode_key("JWT_PUBLIC_KEY", &public_b64)?;
            let public_key = Ed25519PublicKey::from_bytes(&bytes)
                .map_err(|_| JwtError::InvalidKey("JWT_PUBLIC_KEY"))?;
            Self::from_public_key(public_key)
        } else if let Ok(private_b64) = std::env::var("JWT_PRIVATE_KEY") {
            let bytes = decode_key("JWT_PRIVATE_KEY", &private_b64)?;
            let key_pair = Ed25519KeyPair::from_bytes(&bytes)
                .map_err(|_| JwtError::InvalidKey("JWT_PRIVATE_KEY"))?;
            Self::from_key_pair(key_pair)
        } else {
            return Err(JwtError::MissingKey);
        };

        config.issuer = issuer;
        config.audience = audience;
        Ok(config)
    }

    pub fn from_public_key(public_key: Ed25519PublicKey) -> Self {
        Self {
            key_pair: None,
            public_key: Arc::new(public_key),
            access_token_expiry: 3600,
            issuer: None,
            audience: None,
        }
    }

    pub fn from_key_pair(key_pair: Ed25519KeyPair) -> Self {
        let public_key = key_pair.public_key();
        Self {
            key_pair: Some(Arc::new(key_pair)),
            public_key: Arc::new(public_key),
            access_token_expiry: 3600,
            issuer: None,
            audience: None,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Returns `(private, public)` base64 keys.
    pub fn generate_key_pair() -> (String, String) {
        let key_pair = Ed25519KeyPair::generate();
        let private_b64 = base64::engine::general_purpose::STANDARD.encode(key_pair.to_bytes());
        let public_b64 =
            base64::engine::general_purpose::STANDARD.encode(key_pair.public_key().to_bytes());
        (private_b64, public_b64)
    }

    pub fn public_key(&self) -> &Ed25519PublicKey {
        &self.public_key
    }

    pub fn can_sign(&self) -> bool {
        self.key_pair.is_some()
    }

    pub fn generate_access_token(
        &self,
        user_id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<String, JwtError> {
        let key_pair = self.key_pair.as_ref().ok_or(JwtError::CannotSign)?;

        let custom_claims = OrganizationClaims {
            organization_id: organization_id.map(|id| id.to_string()),
        };

        let mut claims = jwt_simple::claims::Claims::with_custom_claims(
            custom_claims,
            Duration::from_secs(self.access_token_expiry as u64),
        )
        .with_subject(user_id.to_string());

        if let Some(issuer) = &self.issuer {
            claims = claims.with_issuer(issuer);
        }
        if let Some(audience) = &self.audience {
            claims = claims.with_audience(audience);
        }

        Ok(key_pair.sign(claims)?)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut options = VerificationOptions::default();
        if let Some(issuer) = &self.issuer {
            options.allowed_issuers = Some(HashSet::from([issuer.clone()]));
        }
        if let Some(audience) = &self.audience {
            options.allowed_audiences = Some(HashSet::from([audience.clone()]));
        }

        let token_data = self
            .public_key
            .verify_token::<OrganizationClaims>(token, Some(options))?;

        Ok(Claims {
            sub: token_data.subject.unwrap_or_default(),
            organization_id: token_data.custom.organization_id,
            exp: token_data
                .expires_at
                .map(|t| t.as_secs() as i64)
                .unwrap_or(0),
            iat: token_data
                .issued_at
                .map(|t| t.as_secs() as i64)
                .unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig::from_key_pair(Ed25519KeyPair::generate())
    }

    #[test]
    fn test_token_carries_organization() {
        let config = test_config();
        let user_id = Uuid::new_v4();
        let organization_id = Uuid::new_v4();

        let token = config
            .generate_access_token(user_id, Some(organization_id))
            .expect("Token generation should succeed");
        let claims = config
            .verify_access_token(&token)
            .expect("Token verification should succeed");

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.organization_id, Some(organization_id.to_string()));
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_without_organization() {
        let config = test_config();
        let token = config.generate_access_token(Uuid::new_v4(), None).unwrap();

        let claims = config.verify_access_token(&token).unwrap();
        assert!(claims.organization_id.is_none());
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let signer = test_config();
        let other = test_config();

        let token = signer
            .generate_access_token(Uuid::new_v4(), Some(Uuid::new_v4()))
            .unwrap();

        assert!(other.verify_access_token(&token).is_err());
        assert!(other.verify_access_token("invalid.token.here").is_err());
    }

    #[test]
    fn test_issuer_is_enforced() {
        let key_pair = Ed25519KeyPair::generate();
        let public_key = key_pair.public_key();
        let signer = JwtConfig::from_key_pair(key_pair).with_issuer("someone-else");
        let verifier = JwtConfig::from_public_key(public_key).with_issuer("identity");

        let token = signer
            .generate_access_token(Uuid::new_v4(), Some(Uuid::new_v4()))
            .unwrap();

        assert!(verifier.verify_access_token(&token).is_err());
    }

    #[test]
    fn test_public_key_only_verifies() {
        let (private_b64, public_b64) = JwtConfig::generate_key_pair();

        let private = decode_key("JWT_PRIVATE_KEY", &private_b64).unwrap();
        let signer = JwtConfig::from_key_pair(Ed25519KeyPair::from_bytes(&private).unwrap());

        let public = decode_key("JWT_PUBLIC_KEY", &public_b64).unwrap();
        let verifier = JwtConfig::from_public_key(Ed25519PublicKey::from_bytes(&public).unwrap());

        assert!(!verifier.can_sign());
        assert!(matches!(
            verifier.generate_access_token(Uuid::new_v4(), None),
            Err(JwtError::CannotSign)
        ));

        let user_id = Uuid::new_v4();
        let token = signer.generate_access_token(user_id, None).unwrap();
        let claims = verifier.verify_access_token(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
    }

    #[test]
    fn test_bad_key_encoding() {
        assert!(matches!(
            decode_key("JWT_PUBLIC_KEY", "not base64!"),
            Err(JwtError::InvalidEncoding("JWT_PUBLIC_KEY"))
        ));
    }
}
