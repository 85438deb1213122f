use std::time::Duration;

use log::{info, warn};

use crate::db::Database;
use crate::now::current_timestamp;

use super::error::AuthError;
use super::group::{ADMIN_GROUP, PUBLIC_GROUP};
use super::token::TokenService;

/// The long-lived tokens minted at first start. The public token stands in
/// for requests that carry no token, the admin token is handed to the
/// operator to create the first groups and tokens.
#[derive(Debug, Clone)]
pub struct BootstrapTokens {
    pub public: String,
    pub admin: String,
}

impl BootstrapTokens {
    /// Reuses the stored bootstrap tokens, re-issuing any that is missing or
    /// no longer verifies (expired, revoked, signed by a replaced key).
    pub fn ensure(db: &Database, tokens: &TokenService, ttl: Duration) -> Result<Self, AuthError> {
        let now = current_timestamp();
        let public = Self::ensure_one(db, tokens, PUBLIC_GROUP, ttl, now)?;
        let admin = Self::ensure_one(db, tokens, ADMIN_GROUP, ttl, now)?;
        Ok(Self { public, admin })
    }

    fn ensure_one(
        db: &Database,
        tokens: &TokenService,
        group: &str,
        ttl: Duration,
        now: u64,
    ) -> Result<String, AuthError> {
        let stored = db
            .with_transaction(|tx| tx.get_bootstrap_token(group))
            .map_err(AuthError::backend)?;

        if let Some(token) = stored {
            match tokens.verify_blocking(&token, now) {
                Ok(info) if info.groups == [group] => return Ok(token),
                Ok(info) => warn!(
                    "Bootstrap {group} token names groups {:?}, re-issuing",
                    info.groups
                ),
                Err(AuthError::BackendUnavailable(msg)) => {
                    return Err(AuthError::BackendUnavailable(msg))
                }
                Err(e) => warn!("Bootstrap {group} token no longer verifies: {e}, re-issuing"),
            }
        }

        let issued = tokens.issue_bootstrap(group, ttl, now)?;
        db.with_transaction(|tx| tx.put_bootstrap_token(group, &issued.token))
            .map_err(AuthError::backend)?;

        info!(
            "Issued bootstrap {group} token '{}', expires at {}",
            issued.info.id, issued.info.expires_at
        );
        Ok(issued.token)
    }
}
