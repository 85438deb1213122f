use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::task::{JoinError, JoinHandle};
use uuid::Uuid;

use crate::db::types::TokenRecord;
use crate::db::Database;
use crate::now::current_timestamp;
use crate::rsa::read_or_generate_keys;

use super::config::AuthConfig;
use super::error::AuthError;
use super::group::{GroupRegistry, PUBLIC_GROUP};

const ISSUER: &str = "groupgate/token-service";

/// Claims carried by every token this service signs.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    jti: String,         // Token id, also the key of the stored record
    groups: Vec<String>, // Ordered, de-duplicated, non-empty
    aud: String,
    iss: String,
    iat: u64,
    exp: u64,
    nbf: u64,
}

/// What a verified token grants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub id: String,
    pub groups: Vec<String>,
    pub audience: String,
    pub issued_at: u64,
    pub expires_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub info: TokenInfo,
}

/// How much of the verification to run.
///
/// `Stateless` checks only what the token itself proves plus group
/// membership through the registry view, and never reads the token record. `StoreChecked` also looks the record up (bounded by the
/// configured store timeout) and rejects unknown or revoked tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Stateless,
    StoreChecked,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,

    audience: String,
    default_ttl: Duration,
    max_ttl_secs: u64,
    store_timeout: Duration,

    db: Arc<Database>,
    registry: Arc<GroupRegistry>,
}

impl TokenService {
    pub fn new(
        cfg: &AuthConfig,
        public_key: &[u8],
        private_key: &[u8],
        db: Arc<Database>,
        registry: Arc<GroupRegistry>,
    ) -> Result<Self> {
        let encoding_key = match EncodingKey::from_rsa_pem(private_key) {
            Ok(key) => key,
            Err(e) => bail!("parse RSA private key for token signing failed: {e}"),
        };
        let decoding_key = match DecodingKey::from_rsa_pem(public_key) {
            Ok(key) => key,
            Err(e) => bail!("parse RSA public key for token verification failed: {e}"),
        };

        Ok(Self {
            encoding_key,
            decoding_key,
            audience: cfg.audience.clone(),
            default_ttl: Duration::from_secs(cfg.default_ttl_secs),
            max_ttl_secs: cfg.max_ttl_secs,
            store_timeout: cfg.store_timeout(),
            db,
            registry,
        })
    }

    /// Reads the key pair named by the config, generating it on first start.
    pub fn load(
        cfg: &AuthConfig,
        db: Arc<Database>,
        registry: Arc<GroupRegistry>,
    ) -> Result<Self> {
        let (public_key, private_key) =
            read_or_generate_keys(&cfg.public_key, &cfg.private_key).context("load token keys")?;
        Self::new(cfg, &public_key, &private_key, db, registry)
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Issues a token for `groups`. `audience` defaults to the audience this
    /// service accepts.
    pub fn create_token(
        &self,
        groups: &[String],
        ttl: Duration,
        audience: Option<&str>,
    ) -> Result<IssuedToken, AuthError> {
        self.create_token_at(groups, ttl, audience, None, current_timestamp())
    }

    pub fn create_token_at(
        &self,
        groups: &[String],
        ttl: Duration,
        audience: Option<&str>,
        note: Option<String>,
        now: u64,
    ) -> Result<IssuedToken, AuthError> {
        let ttl_secs = ttl.as_secs();
        if ttl_secs == 0 {
            return Err(AuthError::InvalidTtl(String::from(
                "ttl must be at least 1 second",
            )));
        }
        if ttl_secs > self.max_ttl_secs {
            return Err(AuthError::InvalidTtl(format!(
                "ttl {ttl_secs}s exceeds the maximum {}s",
                self.max_ttl_secs
            )));
        }
        self.issue(groups, ttl_secs, audience, note, now)
    }

    /// Issues a bootstrap token. Bootstrap ttl is not bounded by `max_ttl_secs`.
    pub(super) fn issue_bootstrap(
        &self,
        group: &str,
        ttl: Duration,
        now: u64,
    ) -> Result<IssuedToken, AuthError> {
        let note = format!("bootstrap {group} token");
        self.issue(
            &[group.to_string()],
            ttl.as_secs().max(1),
            None,
            Some(note),
            now,
        )
    }

    fn issue(
        &self,
        groups: &[String],
        ttl_secs: u64,
        audience: Option<&str>,
        note: Option<String>,
        now: u64,
    ) -> Result<IssuedToken, AuthError> {
        if groups.is_empty() {
            return Err(AuthError::EmptyGroupSet);
        }

        let mut deduped: Vec<String> = Vec::with_capacity(groups.len());
        for group in groups {
            if deduped.contains(group) {
                continue;
            }
            if !self.registry.contains(group)? {
                return Err(AuthError::UnknownGroup(group.clone()));
            }
            deduped.push(group.clone());
        }

        let claims = Claims {
            jti: Uuid::new_v4().to_string(),
            groups: deduped,
            aud: audience.unwrap_or(&self.audience).to_string(),
            iss: String::from(ISSUER),
            iat: now,
            exp: now + ttl_secs,
            nbf: now,
        };

        let token = match encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key) {
            Ok(token) => token,
            Err(e) => {
                return Err(AuthError::BackendUnavailable(format!(
                    "sign token failed: {e}"
                )))
            }
        };

        let record = TokenRecord {
            id: claims.jti.clone(),
            groups: claims.groups.clone(),
            audience: claims.aud.clone(),
            issued_at: claims.iat,
            expires_at: claims.exp,
            revoked: false,
            note,
        };
        self.db
            .with_transaction(|tx| tx.create_token(&record))
            .map_err(AuthError::backend)?;

        info!(
            "Issued token '{}' for groups {:?}, expires at {}",
            record.id, record.groups, record.expires_at
        );
        Ok(IssuedToken {
            token,
            info: TokenInfo::from(claims),
        })
    }

    /// Verifies `token` in the given mode. Dropping the returned future
    /// abandons a pending store lookup.
    pub async fn verify(&self, token: &str, mode: Verification) -> Result<TokenInfo, AuthError> {
        self.verify_at(token, mode, current_timestamp()).await
    }

    pub async fn verify_at(
        &self,
        token: &str,
        mode: Verification,
        now: u64,
    ) -> Result<TokenInfo, AuthError> {
        let info = self.verify_stateless_at(token, now)?;
        if mode == Verification::Stateless {
            return Ok(info);
        }

        let record = self.lookup_record(&info.id).await?;
        check_record(&info.id, record)?;
        Ok(info)
    }

    /// Store-checked verification that waits on the store directly, for
    /// callers outside the async runtime (startup and the local CLI).
    pub fn verify_blocking(&self, token: &str, now: u64) -> Result<TokenInfo, AuthError> {
        let info = self.verify_stateless_at(token, now)?;
        let record = self
            .db
            .with_transaction(|tx| tx.get_token(&info.id))
            .map_err(AuthError::backend)?;
        check_record(&info.id, record)?;
        Ok(info)
    }

    pub fn verify_stateless_at(&self, token: &str, now: u64) -> Result<TokenInfo, AuthError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["aud", "exp", "iss", "nbf"]);
        // Audience and time bounds are checked below so that each failure
        // keeps its own kind.
        validation.validate_aud = false;
        validation.validate_exp = false;
        validation.validate_nbf = false;

        let claims = match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => data.claims,
            Err(e) => return Err(AuthError::TokenMalformed(e.to_string())),
        };

        if claims.aud != self.audience {
            return Err(AuthError::TokenAudienceMismatch {
                expected: self.audience.clone(),
                actual: claims.aud,
            });
        }
        if now >= claims.exp {
            return Err(AuthError::TokenExpired);
        }
        if now < claims.nbf {
            return Err(AuthError::TokenMalformed(String::from(
                "token is not valid yet",
            )));
        }

        if claims.groups.is_empty() {
            return Err(AuthError::TokenMalformed(String::from(
                "token names no groups",
            )));
        }
        for group in claims.groups.iter() {
            if !self.registry.contains(group)? {
                return Err(AuthError::UnknownGroup(group.clone()));
            }
        }

        debug!("Token '{}' verified, groups: {:?}", claims.jti, claims.groups);
        Ok(TokenInfo::from(claims))
    }

    async fn lookup_record(&self, id: &str) -> Result<Option<TokenRecord>, AuthError> {
        let db = self.db.clone();
        let key = id.to_string();
        let lookup = AbortOnDrop(tokio::task::spawn_blocking(move || {
            db.with_transaction(|tx| tx.get_token(&key))
        }));

        match tokio::time::timeout(self.store_timeout, lookup).await {
            Ok(Ok(Ok(record))) => Ok(record),
            Ok(Ok(Err(e))) => Err(AuthError::backend(e)),
            Ok(Err(e)) => Err(AuthError::BackendUnavailable(format!(
                "token lookup task failed: {e}"
            ))),
            Err(_) => Err(AuthError::BackendUnavailable(format!(
                "token lookup for '{id}' timed out after {}ms",
                self.store_timeout.as_millis()
            ))),
        }
    }

    /// Marks the record of `id` revoked. The current bootstrap public token
    /// backs every request without credentials and is refused.
    pub fn revoke_token(&self, id: &str) -> Result<(), AuthError> {
        let outcome = self
            .db
            .with_transaction(|tx| {
                if let Some(token) = tx.get_bootstrap_token(PUBLIC_GROUP)? {
                    if self.token_id(&token).as_deref() == Some(id) {
                        return Ok(Err(AuthError::BootstrapTokenProtected(id.to_string())));
                    }
                }
                if tx.get_token(id)?.is_none() {
                    return Ok(Err(AuthError::TokenNotFound(id.to_string())));
                }
                tx.revoke_token(id)?;
                Ok(Ok(()))
            })
            .map_err(AuthError::backend)?;
        outcome?;

        info!("Token '{id}' revoked");
        Ok(())
    }

    /// The `jti` of a token signed with our key, ignoring every other claim.
    fn token_id(&self, token: &str) -> Option<String> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.required_spec_claims.clear();
        validation.validate_aud = false;
        validation.validate_exp = false;
        validation.validate_nbf = false;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .ok()
            .map(|data| data.claims.jti)
    }

    /// Token records, newest first.
    pub fn list_tokens(&self) -> Result<Vec<TokenRecord>, AuthError> {
        self.db
            .with_transaction(|tx| tx.list_tokens())
            .map_err(AuthError::backend)
    }
}

/// Aborts the blocking task once nobody waits for it, so a lookup still
/// queued behind a stalled store never runs. A lookup already running is
/// left to finish.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Future for AbortOnDrop<T> {
    type Output = Result<T, JoinError>;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().0).poll(cx)
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn check_record(id: &str, record: Option<TokenRecord>) -> Result<(), AuthError> {
    match record {
        Some(record) if record.revoked => Err(AuthError::TokenRevoked(id.to_string())),
        Some(_) => Ok(()),
        None => Err(AuthError::TokenNotFound(id.to_string())),
    }
}

impl From<Claims> for TokenInfo {
    fn from(c: Claims) -> Self {
        Self {
            id: c.jti,
            groups: c.groups,
            audience: c.aud,
            issued_at: c.iat,
            expires_at: c.exp,
        }
    }
}
