use std::sync::Arc;

use crate::auth::Authorizer;
use crate::db::Database;

/// Shared by every worker of the authorizing service.
pub struct ServerContext {
    pub auth: Authorizer,
}

impl ServerContext {
    pub fn new(auth: Authorizer) -> Self {
        Self { auth }
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.auth.db
    }

    #[cfg(test)]
    pub fn new_test() -> Self {
        Self::new(crate::auth::testing::build_test_auth())
    }
}
