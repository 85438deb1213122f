use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use actix_web::dev::ServerHandle;
use actix_web::http::header::AUTHORIZATION;
use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use groupgate::auth::config::AuthConfig;
use groupgate::auth::error::{AuthError, ErrorKind};
use groupgate::auth::group::Group;
use groupgate::auth::resolver::ResolvedAccess;
use groupgate::auth::token::{IssuedToken, Verification};
use groupgate::auth::Authorizer;
use groupgate::db::Database;
use groupgate::proxy::{self, ProxyContext};
use groupgate::rsa::generate_rsa_keys;
use groupgate::server::context::ServerContext;
use groupgate::server::handlers;
use groupgate::server::handlers::access::WriteGroupResponse;
use groupgate::server::handlers::group::PutGroupRequest;
use groupgate::server::handlers::token::PutTokenRequest;
use groupgate::server::response::ResponseBody;
use serde::de::DeserializeOwned;

fn build_authorizer() -> Authorizer {
    let (public_key, private_key) = generate_rsa_keys().unwrap();
    Authorizer::with_keys(
        &AuthConfig::default(),
        Arc::new(Database::memory()),
        &public_key,
        &private_key,
    )
    .unwrap()
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Starts the authorizing service on a free port.
fn start_server(auth: Authorizer) -> (String, ServerHandle) {
    let ctx = Arc::new(ServerContext::new(auth));
    let srv = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(ctx.clone()))
            .configure(handlers::configure)
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();
    let addr = srv.addrs()[0];
    let srv = srv.run();
    let handle = srv.handle();
    actix_web::rt::spawn(srv);
    (format!("http://{addr}"), handle)
}

fn with_tokens(mut req: TestRequest, tokens: &[&str]) -> TestRequest {
    for token in tokens {
        req = req.append_header((AUTHORIZATION, format!("Bearer {token}")));
    }
    req
}

fn data<T: DeserializeOwned>(body: ResponseBody<T>) -> T {
    body.data.unwrap()
}

#[test]
fn test_fresh_store_has_reserved_groups() {
    let auth = build_authorizer();
    let names: Vec<_> = auth
        .registry
        .list_groups()
        .unwrap()
        .into_iter()
        .map(|g| g.name)
        .collect();
    assert_eq!(names, vec!["admin", "public"]);
}

#[tokio::test]
async fn test_token_expires() {
    let auth = build_authorizer();
    let issued = auth
        .tokens
        .create_token(&[String::from("public")], Duration::from_secs(1), None)
        .unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;

    for mode in [Verification::Stateless, Verification::StoreChecked] {
        assert!(matches!(
            auth.tokens.verify(&issued.token, mode).await,
            Err(AuthError::TokenExpired)
        ));
    }
    // An expired token never degrades to public-only access
    assert!(matches!(
        auth.resolver
            .resolve(&[issued.token], Verification::Stateless)
            .await,
        Err(AuthError::TokenExpired)
    ));
}

#[actix_web::test]
async fn test_sales_scenario_through_proxy() {
    let auth = build_authorizer();
    let admin = auth.bootstrap.admin.clone();
    let (upstream, handle) = start_server(auth);

    let ctx = Arc::new(ProxyContext::new(upstream, reqwest::Client::new()));
    let app = test::init_service(App::new().app_data(Data::new(ctx)).configure(proxy::configure))
        .await;

    // Admin creates the sales groups
    for name in ["us-sales", "apac-sales"] {
        let req = TestRequest::put().uri("/v1/groups").set_json(PutGroupRequest {
            name: name.to_string(),
            description: None,
        });
        let req = with_tokens(req, &[&admin]).to_request();
        let body: ResponseBody<Group> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(data(body).name, name);
    }

    let issue = |groups: &[&str]| {
        let req = TestRequest::put().uri("/v1/tokens").set_json(PutTokenRequest {
            groups: groups.iter().map(|s| s.to_string()).collect(),
            ttl_secs: Some(600),
            audience: None,
            note: None,
        });
        with_tokens(req, &[&admin]).to_request()
    };
    let t1: IssuedToken = data(test::call_and_read_body_json(&app, issue(&["us-sales"])).await);
    let t2: IssuedToken =
        data(test::call_and_read_body_json(&app, issue(&["admin", "public"])).await);
    let (t1, t2) = (t1.token, t2.token);

    let access = |tokens: Vec<String>| {
        let tokens: Vec<&str> = tokens.iter().map(String::as_str).collect();
        with_tokens(TestRequest::get().uri("/v1/access"), &tokens).to_request()
    };
    let write = |tokens: Vec<String>| {
        let tokens: Vec<&str> = tokens.iter().map(String::as_str).collect();
        with_tokens(TestRequest::get().uri("/v1/access/write"), &tokens).to_request()
    };

    // No token: public only
    let got: ResolvedAccess = data(test::call_and_read_body_json(&app, access(vec![])).await);
    assert_eq!(got.permitted_groups, set(&["public"]));
    assert!(!got.is_admin);

    // T1
    let got: ResolvedAccess =
        data(test::call_and_read_body_json(&app, access(vec![t1.clone()])).await);
    assert_eq!(got.permitted_groups, set(&["public", "us-sales"]));
    assert!(!got.is_admin);
    let got: WriteGroupResponse =
        data(test::call_and_read_body_json(&app, write(vec![t1.clone()])).await);
    assert_eq!(got.write_group, "us-sales");

    // T2
    let got: ResolvedAccess =
        data(test::call_and_read_body_json(&app, access(vec![t2.clone()])).await);
    assert_eq!(got.permitted_groups, set(&["admin", "public"]));
    assert!(got.is_admin);
    let got: WriteGroupResponse =
        data(test::call_and_read_body_json(&app, write(vec![t2.clone()])).await);
    assert_eq!(got.write_group, "public");

    // T1 + T2: union, admin is not a write candidate
    let got: ResolvedAccess =
        data(test::call_and_read_body_json(&app, access(vec![t1.clone(), t2.clone()])).await);
    assert_eq!(got.permitted_groups, set(&["admin", "public", "us-sales"]));
    assert!(got.is_admin);
    let got: WriteGroupResponse =
        data(test::call_and_read_body_json(&app, write(vec![t1.clone(), t2.clone()])).await);
    assert_eq!(got.write_group, "us-sales");

    // T1 cannot manage groups
    let req = TestRequest::put().uri("/v1/groups").set_json(PutGroupRequest {
        name: String::from("emea-sales"),
        description: None,
    });
    let resp = test::call_service(&app, with_tokens(req, &[&t1]).to_request()).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: ResponseBody<()> = test::read_body_json(resp).await;
    assert_eq!(body.kind, Some(ErrorKind::AdminRequired));

    // A garbage token fails the whole request
    let resp = test::call_service(&app, access(vec![t1.clone(), String::from("garbage")])).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: ResponseBody<()> = test::read_body_json(resp).await;
    assert_eq!(body.kind, Some(ErrorKind::TokenMalformed));

    handle.stop(true).await;
}
