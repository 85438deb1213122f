pub mod config;

use std::sync::Arc;

use actix_web::http::header::{self, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::web::{self, Bytes, Data, ServiceConfig};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use openssl::ssl::SslAcceptorBuilder;
use reqwest::Method;
use sd_notify::NotifyState;

use crate::auth::header::AuthContext;
use crate::server::response::Response;

use config::ProxyConfig;

/// Forwards requests to the authorizing service.
///
/// The proxy never decides access. It lifts the caller's `Authorization`
/// headers into an [`AuthContext`] and writes the same bytes onto the
/// upstream request.
pub struct ProxyContext {
    upstream: String,
    client: reqwest::Client,
}

impl ProxyContext {
    pub fn new(upstream: String, client: reqwest::Client) -> Self {
        Self { upstream, client }
    }

    pub async fn forward(
        &self,
        req: &HttpRequest,
        auth: AuthContext,
        body: Bytes,
    ) -> Result<HttpResponse> {
        let method =
            Method::from_bytes(req.method().as_str().as_bytes()).context("convert method")?;
        let mut url = format!("{}{}", self.upstream, req.path());
        if !req.query_string().is_empty() {
            url.push('?');
            url.push_str(req.query_string());
        }
        debug!(
            "Forward {} {url}, {} authorization header(s)",
            req.method(),
            auth.raw_values().len()
        );

        let mut builder = self.client.request(method, &url);
        for value in auth.raw_values() {
            let value = reqwest::header::HeaderValue::from_bytes(value)
                .context("copy authorization header")?;
            builder = builder.header(reqwest::header::AUTHORIZATION, value);
        }
        if let Some(content_type) = req.headers().get(header::CONTENT_TYPE) {
            let value = reqwest::header::HeaderValue::from_bytes(content_type.as_bytes())
                .context("copy content type header")?;
            builder = builder.header(reqwest::header::CONTENT_TYPE, value);
        }
        if !body.is_empty() {
            builder = builder.body(body.to_vec());
        }

        let resp = builder.send().await.context("send upstream request")?;

        let status = StatusCode::from_u16(resp.status().as_u16()).context("convert status")?;
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .map(|v| v.as_bytes().to_vec());
        let data = resp.bytes().await.context("read upstream response")?;

        let mut out = HttpResponse::build(status);
        if let Some(content_type) = content_type {
            let value = HeaderValue::from_bytes(&content_type).context("copy content type")?;
            out.insert_header((header::CONTENT_TYPE, value));
        }
        Ok(out.body(data.to_vec()))
    }
}

async fn handle_forward(
    req: HttpRequest,
    auth: AuthContext,
    body: Bytes,
    ctx: Data<Arc<ProxyContext>>,
) -> HttpResponse {
    match ctx.forward(&req, auth, body).await {
        Ok(resp) => resp,
        Err(e) => {
            error!("Forward {} {} failed: {e:#}", req.method(), req.path());
            Response::bad_gateway(format!("upstream unavailable: {e:#}")).into()
        }
    }
}

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.default_service(web::route().to(handle_forward));
}

pub struct ProxyServer {
    ssl: Option<SslAcceptorBuilder>,
    ctx: Arc<ProxyContext>,
    workers: Option<u64>,
    bind: String,
}

impl ProxyServer {
    pub fn build(cfg: &ProxyConfig) -> Result<Self> {
        let client = cfg.build_client()?;
        let ssl = cfg.build_ssl().context("init ssl")?;
        let ctx = Arc::new(ProxyContext::new(cfg.upstream.clone(), client));
        Ok(Self {
            ssl,
            ctx,
            workers: if cfg.workers > 0 {
                Some(cfg.workers)
            } else {
                None
            },
            bind: cfg.bind.clone(),
        })
    }

    pub async fn run(mut self) -> Result<()> {
        let ctx = self.ctx.clone();
        info!("Proxying to {}", ctx.upstream);

        let mut srv = HttpServer::new(move || {
            App::new()
                .app_data(Data::new(ctx.clone()))
                .configure(configure)
        });

        if let Some(ssl) = self.ssl.take() {
            info!("Binding to https://{}", self.bind);
            srv = srv.bind_openssl(&self.bind, ssl).context("bind with ssl")?
        } else {
            warn!("Using HTTP (without SSL), bearer tokens travel in plain text");
            info!("Binding to http://{}", self.bind);
            srv = srv.bind(&self.bind).context("bind without ssl")?
        };
        if let Some(workers) = self.workers {
            srv = srv.workers(workers as usize);
        }

        sd_notify::notify(true, &[NotifyState::Ready]).context("notify systemd")?;
        info!("Starting proxy server");
        srv.run().await.context("run proxy")?;

        info!("Proxy stopped by user");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test::{self, TestRequest};

    use super::*;

    #[actix_web::test]
    async fn test_upstream_down() {
        // Nothing listens on port 1
        let ctx = Arc::new(ProxyContext::new(
            String::from("http://127.0.0.1:1"),
            reqwest::Client::new(),
        ));
        let app =
            test::init_service(App::new().app_data(Data::new(ctx)).configure(configure)).await;

        let req = TestRequest::get()
            .uri("/v1/access")
            .append_header((header::AUTHORIZATION, "Bearer t1"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
