use std::sync::Arc;

use actix_web::web::{Data, Query};
use serde::{Deserialize, Serialize};

use crate::auth::header::AuthContext;
use crate::auth::token::Verification;
use crate::server::context::ServerContext;
use crate::server::response::Response;
use crate::try_auth;

#[derive(Debug, Default, Deserialize)]
pub struct WriteQuery {
    pub group: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WriteGroupResponse {
    pub write_group: String,
}

/// Read access of the caller: permitted groups and admin flag.
pub async fn get_access(auth: AuthContext, sc: Data<Arc<ServerContext>>) -> Response {
    let tokens = try_auth!(auth.bearer_tokens());
    let access = try_auth!(
        sc.auth
            .resolver
            .resolve(&tokens, Verification::Stateless)
            .await
    );
    Response::json(access)
}

pub async fn get_write_group(
    auth: AuthContext,
    query: Query<WriteQuery>,
    sc: Data<Arc<ServerContext>>,
) -> Response {
    let tokens = try_auth!(auth.bearer_tokens());
    let write_group = try_auth!(
        sc.auth
            .resolver
            .resolve_write_group(&tokens, query.group.as_deref(), Verification::Stateless)
            .await
    );
    Response::json(WriteGroupResponse { write_group })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use actix_web::http::StatusCode;
    use actix_web::test::{self, TestRequest};

    use crate::auth::error::ErrorKind;
    use crate::auth::resolver::ResolvedAccess;
    use crate::init_test_app;
    use crate::server::handlers::testing::with_token;
    use crate::server::response::ResponseBody;

    use super::*;

    fn issue(sc: &ServerContext, groups: &[&str]) -> String {
        let groups: Vec<String> = groups.iter().map(|s| s.to_string()).collect();
        sc.auth
            .tokens
            .create_token(&groups, Duration::from_secs(60), None)
            .unwrap()
            .token
    }

    #[actix_web::test]
    async fn test_get_access() {
        let sc = Arc::new(ServerContext::new_test());
        sc.auth.registry.create_group("us-sales", None).unwrap();
        let token = issue(&sc, &["us-sales"]);
        let app = init_test_app!(sc);

        let req = TestRequest::get().uri("/v1/access").to_request();
        let body: ResponseBody<ResolvedAccess> = test::call_and_read_body_json(&app, req).await;
        let access = body.data.unwrap();
        assert_eq!(access.permitted_groups, BTreeSet::from([String::from("public")]));
        assert!(!access.is_admin);

        let req = with_token(TestRequest::get().uri("/v1/access"), &token).to_request();
        let body: ResponseBody<ResolvedAccess> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            body.data.unwrap().permitted_groups,
            BTreeSet::from([String::from("public"), String::from("us-sales")])
        );

        let req = TestRequest::get()
            .uri("/v1/access")
            .append_header(("Authorization", "Basic abc"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: ResponseBody<()> = test::read_body_json(resp).await;
        assert_eq!(body.kind, Some(ErrorKind::TokenMalformed));
    }

    #[actix_web::test]
    async fn test_get_write_group() {
        let sc = Arc::new(ServerContext::new_test());
        sc.auth.registry.create_group("us-sales", None).unwrap();
        sc.auth.registry.create_group("apac-sales", None).unwrap();
        let token = issue(&sc, &["us-sales", "apac-sales"]);
        let app = init_test_app!(sc);

        let req = with_token(TestRequest::get().uri("/v1/access/write"), &token).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ResponseBody<()> = test::read_body_json(resp).await;
        assert_eq!(body.kind, Some(ErrorKind::AmbiguousWriteTarget));

        let req = with_token(
            TestRequest::get().uri("/v1/access/write?group=apac-sales"),
            &token,
        )
        .to_request();
        let body: ResponseBody<WriteGroupResponse> =
            test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.data.unwrap().write_group, "apac-sales");
    }
}
