use anyhow::Context;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::{Claims, TokenKind};
use crate::{config::JwtConfig, error::AuthError};

/// Signing and verification material for one token kind.
#[derive(Clone)]
struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: TimeDuration,
}

impl KeyPair {
    /// Refuses lifetimes whose expiry cannot be represented.
    fn from_secret(secret: &str, ttl_minutes: i64, kind: TokenKind) -> anyhow::Result<Self> {
        anyhow::ensure!(ttl_minutes > 0, "{kind} token ttl must be positive");
        let ttl = ttl_minutes
            .checked_mul(60)
            .map(TimeDuration::seconds)
            .filter(|ttl| OffsetDateTime::now_utc().checked_add(*ttl).is_some())
            .with_context(|| format!("{kind} token ttl of {ttl_minutes} minutes is out of range"))?;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        })
    }
}

/// Access and refresh keys, built once at startup.
#[derive(Clone)]
pub struct JwtKeys {
    access: KeyPair,
    refresh: KeyPair,
    issuer: String,
    audience: String,
}

/// Freshly signed access + refresh tokens.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl JwtKeys {
    /// Fails on misconfiguration; callers treat that as fatal.
    pub fn from_config(cfg: &JwtConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(!cfg.access_secret.is_empty(), "access token secret is empty");
        anyhow::ensure!(!cfg.refresh_secret.is_empty(), "refresh token secret is empty");
        anyhow::ensure!(
            cfg.access_secret != cfg.refresh_secret,
            "access and refresh token secrets must differ"
        );

        Ok(Self {
            access: KeyPair::from_secret(
                &cfg.access_secret,
                cfg.access_ttl_minutes,
                TokenKind::Access,
            )?,
            refresh: KeyPair::from_secret(
                &cfg.refresh_secret,
                cfg.refresh_ttl_minutes,
                TokenKind::Refresh,
            )?,
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
        })
    }

    fn keys_for(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    fn sign_at(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        now: OffsetDateTime,
    ) -> anyhow::Result<String> {
        let keys = self.keys_for(kind);
        let exp = now
            .checked_add(keys.ttl)
            .context("token expiry out of range")?;
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign(&self, user_id: Uuid, kind: TokenKind) -> anyhow::Result<String> {
        self.sign_at(user_id, kind, OffsetDateTime::now_utc())
    }

    pub fn issue_pair(&self, user_id: Uuid) -> anyhow::Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.sign(user_id, TokenKind::Access)?,
            refresh_token: self.sign(user_id, TokenKind::Refresh)?,
        })
    }

    /// Checks signature, expiry, issuer, audience and kind. All failures look the same to the caller.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));

        let invalid = || AuthError::unauthorized(format!("Invalid {kind} token"));

        let data = decode::<Claims>(token, &self.keys_for(kind).decoding, &validation)
            .map_err(|e| {
                debug!(error = %e, kind = %kind, "jwt rejected");
                invalid()
            })?;

        if data.claims.kind != kind {
            debug!(expected = %kind, got = %data.claims.kind, "jwt kind mismatch");
            return Err(invalid());
        }

        debug!(user_id = %data.claims.sub, kind = %kind, "jwt verified");
        Ok(data.claims)
    }
}
