use std::sync::Arc;
use std::time::Duration;

use actix_web::web::{Bytes, Data, Path};
use serde::{Deserialize, Serialize};

use crate::auth::header::AuthContext;
use crate::now::current_timestamp;
use crate::server::context::ServerContext;
use crate::server::response::Response;
use crate::{parse_json, try_auth};

#[derive(Debug, Serialize, Deserialize)]
pub struct PutTokenRequest {
    pub groups: Vec<String>,

    /// Defaults to the configured ttl.
    #[serde(default)]
    pub ttl_secs: Option<u64>,

    #[serde(default)]
    pub audience: Option<String>,

    #[serde(default)]
    pub note: Option<String>,
}

pub async fn list_tokens(auth: AuthContext, sc: Data<Arc<ServerContext>>) -> Response {
    let tokens = try_auth!(auth.bearer_tokens());
    try_auth!(sc.auth.gate.require_admin(&tokens).await);

    let records = try_auth!(sc.auth.tokens.list_tokens());
    Response::json(records)
}

pub async fn put_token(auth: AuthContext, body: Bytes, sc: Data<Arc<ServerContext>>) -> Response {
    let tokens = try_auth!(auth.bearer_tokens());
    try_auth!(sc.auth.gate.require_admin(&tokens).await);

    let req: PutTokenRequest = parse_json!(body);
    let ttl = match req.ttl_secs {
        Some(secs) => Duration::from_secs(secs),
        None => sc.auth.tokens.default_ttl(),
    };
    let issued = try_auth!(sc.auth.tokens.create_token_at(
        &req.groups,
        ttl,
        req.audience.as_deref(),
        req.note,
        current_timestamp(),
    ));
    Response::json(issued)
}

pub async fn delete_token(
    auth: AuthContext,
    id: Path<String>,
    sc: Data<Arc<ServerContext>>,
) -> Response {
    let tokens = try_auth!(auth.bearer_tokens());
    try_auth!(sc.auth.gate.require_admin(&tokens).await);

    try_auth!(sc.auth.tokens.revoke_token(&id));
    Response::ok()
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test::{self, TestRequest};

    use crate::auth::error::ErrorKind;
    use crate::auth::token::IssuedToken;
    use crate::db::types::TokenRecord;
    use crate::init_test_app;
    use crate::server::handlers::testing::with_token;
    use crate::server::response::ResponseBody;

    use super::*;

    fn put(groups: &[&str], ttl_secs: Option<u64>) -> TestRequest {
        TestRequest::put().uri("/v1/tokens").set_json(PutTokenRequest {
            groups: groups.iter().map(|s| s.to_string()).collect(),
            ttl_secs,
            audience: None,
            note: Some(String::from("test")),
        })
    }

    #[actix_web::test]
    async fn test_token_lifecycle() {
        let sc = Arc::new(ServerContext::new_test());
        sc.auth.registry.create_group("us-sales", None).unwrap();
        let admin = sc.auth.bootstrap.admin.clone();
        let app = init_test_app!(sc);

        let req = with_token(put(&["us-sales"], Some(120)), &admin).to_request();
        let body: ResponseBody<IssuedToken> = test::call_and_read_body_json(&app, req).await;
        let issued = body.data.unwrap();
        assert_eq!(issued.info.groups, vec!["us-sales"]);
        assert_eq!(issued.info.expires_at - issued.info.issued_at, 120);

        // The issued token is not an admin token
        let req = with_token(TestRequest::get().uri("/v1/tokens"), &issued.token).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = with_token(TestRequest::get().uri("/v1/tokens"), &admin).to_request();
        let body: ResponseBody<Vec<TokenRecord>> = test::call_and_read_body_json(&app, req).await;
        let record = body
            .data
            .unwrap()
            .into_iter()
            .find(|r| r.id == issued.info.id)
            .unwrap();
        assert_eq!(record.note.as_deref(), Some("test"));

        let uri = format!("/v1/tokens/{}", issued.info.id);
        let req = with_token(TestRequest::delete().uri(&uri), &admin).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = with_token(TestRequest::delete().uri(&uri), &admin).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = with_token(TestRequest::delete().uri("/v1/tokens/none"), &admin).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: ResponseBody<()> = test::read_body_json(resp).await;
        assert_eq!(body.kind, Some(ErrorKind::TokenNotFound));

        let public_id = sc
            .auth
            .tokens
            .verify_stateless_at(&sc.auth.bootstrap.public, current_timestamp())
            .unwrap()
            .id;
        let uri = format!("/v1/tokens/{public_id}");
        let req = with_token(TestRequest::delete().uri(&uri), &admin).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: ResponseBody<()> = test::read_body_json(resp).await;
        assert_eq!(body.kind, Some(ErrorKind::BootstrapTokenProtected));

        // Requests without a token keep working
        let req = TestRequest::get().uri("/v1/access").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_put_token_errors() {
        let sc = Arc::new(ServerContext::new_test());
        let admin = sc.auth.bootstrap.admin.clone();
        let app = init_test_app!(sc);

        let cases = [
            (put(&[], None), StatusCode::BAD_REQUEST, ErrorKind::EmptyGroupSet),
            (put(&["nope"], None), StatusCode::NOT_FOUND, ErrorKind::UnknownGroup),
            (put(&["public"], Some(0)), StatusCode::BAD_REQUEST, ErrorKind::InvalidTtl),
        ];
        for (req, status, kind) in cases {
            let resp = test::call_service(&app, with_token(req, &admin).to_request()).await;
            assert_eq!(resp.status(), status);
            let body: ResponseBody<()> = test::read_body_json(resp).await;
            assert_eq!(body.kind, Some(kind));
        }
    }
}
