use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::store::{TokenRecord, TokenStore};
use crate::config::TokenConfig;
use crate::error::{FlareError, InfraResultExt, Result};
use crate::metrics::AuthMetrics;

/// Lower bound applied to the configured token lifetime
pub const MIN_TOKEN_TTL: Duration = Duration::from_secs(60);

/// JWT claims carried by session tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

impl TokenClaims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.exp, 0)
    }
}

/// Session token service: HS256-signed tokens paired with a revocable store record
///
/// A token is accepted only when its signature and `exp` check out *and* the
/// store still holds an unexpired record for its `jti`. Deleting the record
/// revokes the token before its natural expiry.
pub struct TokenService {
    issuer: String,
    ttl: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    store: Arc<dyn TokenStore>,
    metrics: Option<AuthMetrics>,
}

impl TokenService {
    /// Creates a new token service; `ttl` is floored at [`MIN_TOKEN_TTL`]
    pub fn new(
        secret: &SecretString,
        issuer: impl Into<String>,
        ttl: Duration,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            issuer: issuer.into(),
            ttl: ttl.max(MIN_TOKEN_TTL),
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            store,
            metrics: None,
        }
    }

    pub fn from_config(config: &TokenConfig, store: Arc<dyn TokenStore>) -> Self {
        Self::new(
            &config.secret,
            config.issuer.clone(),
            Duration::from_secs(config.ttl_secs),
            store,
        )
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: AuthMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Issues a token for the user and persists its record
    ///
    /// Nothing is returned unless both signing and persistence succeed.
    pub async fn issue(&self, user_id: &str) -> Result<String> {
        if user_id.is_empty() {
            return Err(FlareError::invalid_parameter("user id is required"));
        }

        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|err| crate::error::map_infra_error(err, "token ttl out of range"))?;
        let expires_at = now + ttl;

        let claims = TokenClaims {
            sub: user_id.to_string(),
            iss: self.issuer.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| crate::error::map_infra_error(err, "token signing"))?;

        let record = TokenRecord {
            jti: claims.jti.clone(),
            user_id: claims.sub.clone(),
            issued_at: now,
            expires_at,
            token: token.clone(),
        };
        self.store
            .save(&record)
            .await
            .or_internal("token persist record")?;

        if let Some(metrics) = &self.metrics {
            metrics.token_issued();
        }
        info!(user_id, jti = %claims.jti, "token issued");
        Ok(token)
    }

    /// Validates the token and returns the owning user id
    ///
    /// Bad signature, expired claims, unknown issuer, revoked or missing
    /// record all yield the same `TOKEN_EXPIRED` error.
    pub async fn validate(&self, token: &str) -> Result<String> {
        self.validate_claims(token).await.map(|claims| claims.sub)
    }

    /// Same as [`validate`](Self::validate) but returns the decoded claims
    pub async fn validate_claims(&self, token: &str) -> Result<TokenClaims> {
        if token.is_empty() {
            return Err(FlareError::authentication_required());
        }

        let claims = match self.decode_claims(token, true) {
            Ok(claims) => claims,
            Err(err) => {
                debug!(error = %err, "token rejected by signature check");
                return Err(self.rejected());
            }
        };

        let record = self
            .store
            .get(&claims.jti)
            .await
            .or_internal("token load record")?;

        match record {
            Some(record) if !record.is_expired_at(Utc::now()) && record.user_id == claims.sub => {
                Ok(claims)
            }
            _ => {
                debug!(jti = %claims.jti, "token record missing or expired");
                Err(self.rejected())
            }
        }
    }

    /// Revokes a single token by `jti`; unknown ids succeed silently
    pub async fn revoke(&self, jti: &str) -> Result<()> {
        let record = self
            .store
            .get(jti)
            .await
            .or_internal("token load record for revoke")?;

        if let Some(record) = record {
            self.store
                .delete_one(&record.user_id, jti)
                .await
                .or_internal("token delete record")?;
            info!(user_id = %record.user_id, jti, "token revoked");
        }

        if let Some(metrics) = &self.metrics {
            metrics.token_revoked("single");
        }
        Ok(())
    }

    /// Revokes the token presented by the caller (logout)
    ///
    /// Only the signature is checked, so an already expired token can still be
    /// logged out; a forged token is rejected as `TOKEN_EXPIRED`.
    pub async fn revoke_token(&self, token: &str) -> Result<()> {
        if token.is_empty() {
            return Err(FlareError::authentication_required());
        }
        let claims = self.decode_claims(token, false).map_err(|err| {
            debug!(error = %err, "logout with untrusted token");
            self.rejected()
        })?;

        self.store
            .delete_one(&claims.sub, &claims.jti)
            .await
            .or_internal("token delete record")?;
        if let Some(metrics) = &self.metrics {
            metrics.token_revoked("single");
        }
        info!(user_id = %claims.sub, jti = %claims.jti, "token logged out");
        Ok(())
    }

    /// Revokes every outstanding token of the given user
    ///
    /// Password change and password reset must pass the *target* user id
    /// explicitly; reset callers are usually unauthenticated.
    pub async fn revoke_all(&self, user_id: &str) -> Result<()> {
        if user_id.is_empty() {
            return Err(FlareError::invalid_parameter("user id is required"));
        }
        self.store
            .delete_all(user_id)
            .await
            .or_internal("token delete all records")?;
        if let Some(metrics) = &self.metrics {
            metrics.token_revoked("all");
        }
        info!(user_id, "all tokens revoked");
        Ok(())
    }

    /// Lists the user's live sessions, newest first
    pub async fn sessions(&self, user_id: &str) -> Result<Vec<TokenRecord>> {
        self.store
            .get_all(user_id)
            .await
            .or_internal("token list records")
    }

    /// Returns token TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns issuer
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    fn rejected(&self) -> FlareError {
        if let Some(metrics) = &self.metrics {
            metrics.token_rejected();
        }
        FlareError::token_expired()
    }

    fn decode_claims(
        &self,
        token: &str,
        check_exp: bool,
    ) -> jsonwebtoken::errors::Result<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;
        validation.validate_exp = check_exp;

        decode::<TokenClaims>(token, &self.decoding_key, &validation).map(|data| data.claims)
    }
}
