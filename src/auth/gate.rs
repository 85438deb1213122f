use std::sync::Arc;

use log::warn;

use super::error::AuthError;
use super::resolver::{GroupResolver, ResolvedAccess};
use super::token::Verification;

/// Guards the management plane. Always verifies against the store, so a
/// revoked admin token stops working immediately.
pub struct AdminGate {
    resolver: Arc<GroupResolver>,
}

impl AdminGate {
    pub fn new(resolver: Arc<GroupResolver>) -> Self {
        Self { resolver }
    }

    pub async fn require_admin(&self, tokens: &[String]) -> Result<ResolvedAccess, AuthError> {
        let access = self
            .resolver
            .resolve(tokens, Verification::StoreChecked)
            .await?;
        if !access.is_admin {
            warn!(
                "Admin action denied for groups {:?}",
                access.permitted_groups
            );
            return Err(AuthError::AdminRequired);
        }
        Ok(access)
    }
}
