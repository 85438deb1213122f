pub mod config;
pub mod context;
pub mod handlers;
pub mod response;

use std::sync::Arc;
use std::time::Duration;

use actix_web::web::{self, Data, PayloadConfig};
use actix_web::{App, HttpServer};
use anyhow::{Context, Result};
use log::{info, warn};
use openssl::ssl::SslAcceptorBuilder;
use sd_notify::NotifyState;

use crate::auth::Authorizer;

use config::ServerConfig;
use context::ServerContext;
use response::Response;

/// The authorizing REST service.
pub struct RestfulServer {
    ssl: Option<SslAcceptorBuilder>,
    ctx: Arc<ServerContext>,

    keep_alive_secs: Option<u64>,
    workers: Option<u64>,

    bind: String,

    payload_limit_mib: usize,
}

impl RestfulServer {
    pub fn new(
        bind: String,
        ssl: Option<SslAcceptorBuilder>,
        ctx: Arc<ServerContext>,
        payload_limit_mib: usize,
    ) -> Self {
        Self {
            ssl,
            ctx,
            keep_alive_secs: None,
            workers: None,
            bind,
            payload_limit_mib,
        }
    }

    /// Opens the store, runs the startup sequence of the authorizer and
    /// prepares the server described by `cfg`.
    pub fn build(cfg: &ServerConfig) -> Result<Self> {
        let db = Arc::new(cfg.db.build().context("init database")?);
        let auth = Authorizer::open(&cfg.auth, db).context("init authorizer")?;
        info!(
            "Authorizer ready, audience '{}', {} groups",
            cfg.auth.audience,
            auth.registry.list_groups()?.len()
        );

        let ssl = cfg.build_ssl().context("init ssl")?;
        let ctx = Arc::new(ServerContext::new(auth));

        let mut srv = Self::new(cfg.bind.clone(), ssl, ctx, cfg.payload_limit_mib);
        if cfg.keep_alive_secs > 0 {
            srv.set_keep_alive_secs(cfg.keep_alive_secs);
        }
        if cfg.workers > 0 {
            srv.set_workers(cfg.workers);
        }
        Ok(srv)
    }

    pub fn set_keep_alive_secs(&mut self, keep_alive_secs: u64) {
        self.keep_alive_secs = Some(keep_alive_secs);
    }

    pub fn set_workers(&mut self, workers: u64) {
        self.workers = Some(workers);
    }

    pub async fn run(mut self) -> Result<()> {
        let ctx = self.ctx.clone();
        let payload_limit = self.payload_limit_mib * 1024 * 1024;
        let mut srv = HttpServer::new(move || {
            App::new()
                .app_data(Data::new(ctx.clone()))
                .app_data(PayloadConfig::new(payload_limit))
                .configure(handlers::configure)
                .default_service(web::route().to(Self::default_handler))
        });

        if let Some(ssl) = self.ssl.take() {
            info!("Binding to https://{}", self.bind);
            srv = srv.bind_openssl(&self.bind, ssl).context("bind with ssl")?
        } else {
            warn!("Using HTTP (without SSL), bearer tokens travel in plain text");
            info!("Binding to http://{}", self.bind);
            srv = srv.bind(&self.bind).context("bind without ssl")?
        };

        if let Some(keep_alive) = self.keep_alive_secs {
            srv = srv.keep_alive(Duration::from_secs(keep_alive));
        }
        if let Some(workers) = self.workers {
            srv = srv.workers(workers as usize);
        }

        sd_notify::notify(true, &[NotifyState::Ready]).context("notify systemd")?;
        info!("Starting authorizing server");
        srv.run().await.context("run server")?;

        info!("Server stopped by user");
        Ok(())
    }

    async fn default_handler() -> Response {
        Response::not_found()
    }
}
