pub mod access;
pub mod group;
pub mod healthz;
pub mod source;
pub mod token;

use actix_web::web::{self, ServiceConfig};

/// Returns the [`AuthError`](crate::auth::error::AuthError) of a failed
/// authorization step as the handler's response.
#[macro_export]
macro_rules! try_auth {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(e) => return $crate::server::response::Response::from(e),
        }
    };
}

/// Decodes a JSON request body or answers 400.
#[macro_export]
macro_rules! parse_json {
    ($body:expr) => {
        match serde_json::from_slice(&$body) {
            Ok(value) => value,
            Err(e) => {
                return $crate::server::response::Response::bad_request(format!(
                    "decode json body: {e}"
                ))
            }
        }
    };
}

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.route("/healthz", web::get().to(healthz::get_healthz))
        .service(
            web::scope("/v1")
                .route("/access", web::get().to(access::get_access))
                .route("/access/write", web::get().to(access::get_write_group))
                .service(
                    web::resource("/groups")
                        .route(web::get().to(group::list_groups))
                        .route(web::put().to(group::put_group)),
                )
                .service(
                    web::resource("/groups/{name}")
                        .route(web::get().to(group::get_group))
                        .route(web::patch().to(group::patch_group))
                        .route(web::delete().to(group::delete_group)),
                )
                .service(
                    web::resource("/tokens")
                        .route(web::get().to(token::list_tokens))
                        .route(web::put().to(token::put_token)),
                )
                .route("/tokens/{id}", web::delete().to(token::delete_token))
                .service(
                    web::resource("/sources")
                        .route(web::get().to(source::list_sources))
                        .route(web::put().to(source::put_source)),
                ),
        );
}

#[cfg(test)]
pub(crate) mod testing {
    use actix_web::http::header::AUTHORIZATION;
    use actix_web::test::TestRequest;

    /// Builds the service under test around a `ServerContext`.
    #[macro_export]
    macro_rules! init_test_app {
        ($sc:expr) => {
            actix_web::test::init_service(
                actix_web::App::new()
                    .app_data(actix_web::web::Data::new($sc.clone()))
                    .configure($crate::server::handlers::configure),
            )
            .await
        };
    }

    pub fn with_token(req: TestRequest, token: &str) -> TestRequest {
        req.append_header((AUTHORIZATION, format!("Bearer {token}")))
    }
}
