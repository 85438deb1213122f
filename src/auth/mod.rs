pub mod bootstrap;
pub mod config;
pub mod error;
pub mod gate;
pub mod group;
pub mod header;
pub mod resolver;
pub mod token;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::db::Database;

use bootstrap::BootstrapTokens;
use config::AuthConfig;
use gate::AdminGate;
use group::GroupRegistry;
use resolver::GroupResolver;
use token::TokenService;

/// Every authorization component wired over one store.
pub struct Authorizer {
    pub db: Arc<Database>,
    pub registry: Arc<GroupRegistry>,
    pub tokens: Arc<TokenService>,
    pub bootstrap: BootstrapTokens,
    pub resolver: Arc<GroupResolver>,
    pub gate: AdminGate,
}

impl Authorizer {
    /// Startup sequence: reserved groups first, then signing keys, then the
    /// bootstrap tokens.
    pub fn open(cfg: &AuthConfig, db: Arc<Database>) -> Result<Self> {
        let registry = GroupRegistry::open(db.clone(), cfg.registry_refresh())
            .context("ensure reserved groups")?;
        let registry = Arc::new(registry);
        let tokens = TokenService::load(cfg, db.clone(), registry.clone())?;
        Self::assemble(cfg, db, registry, tokens)
    }

    pub fn with_keys(
        cfg: &AuthConfig,
        db: Arc<Database>,
        public_key: &[u8],
        private_key: &[u8],
    ) -> Result<Self> {
        let registry = GroupRegistry::open(db.clone(), cfg.registry_refresh())
            .context("ensure reserved groups")?;
        let registry = Arc::new(registry);
        let tokens = TokenService::new(cfg, public_key, private_key, db.clone(), registry.clone())?;
        Self::assemble(cfg, db, registry, tokens)
    }

    fn assemble(
        cfg: &AuthConfig,
        db: Arc<Database>,
        registry: Arc<GroupRegistry>,
        tokens: TokenService,
    ) -> Result<Self> {
        let tokens = Arc::new(tokens);
        let bootstrap = BootstrapTokens::ensure(&db, &tokens, cfg.bootstrap_ttl())
            .context("ensure bootstrap tokens")?;
        let resolver = Arc::new(GroupResolver::new(tokens.clone(), bootstrap.public.clone()));
        let gate = AdminGate::new(resolver.clone());

        Ok(Self {
            db,
            registry,
            tokens,
            bootstrap,
            resolver,
            gate,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use once_cell::sync::Lazy;

    use super::*;

    /// One RSA key pair for the whole test binary.
    pub static TEST_KEYS: Lazy<(Vec<u8>, Vec<u8>)> =
        Lazy::new(|| crate::rsa::generate_rsa_keys().unwrap());

    pub fn build_test_auth() -> Authorizer {
        let (public_key, private_key) = &*TEST_KEYS;
        Authorizer::with_keys(
            &AuthConfig::default(),
            Arc::new(Database::new_test()),
            public_key,
            private_key,
        )
        .unwrap()
    }
}
