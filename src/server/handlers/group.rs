use std::sync::Arc;

use actix_web::web::{Bytes, Data, Path};
use serde::{Deserialize, Serialize};

use crate::auth::header::AuthContext;
use crate::auth::token::Verification;
use crate::server::context::ServerContext;
use crate::server::response::Response;
use crate::{parse_json, try_auth};

#[derive(Debug, Serialize, Deserialize)]
pub struct PutGroupRequest {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PatchGroupRequest {
    #[serde(default)]
    pub description: Option<String>,
}

pub async fn list_groups(auth: AuthContext, sc: Data<Arc<ServerContext>>) -> Response {
    // Reading the catalog needs no group, but presented tokens must be valid
    let tokens = try_auth!(auth.bearer_tokens());
    try_auth!(
        sc.auth
            .resolver
            .resolve_permitted_groups(&tokens, Verification::Stateless)
            .await
    );
    let groups = try_auth!(sc.auth.registry.list_groups());
    Response::json(groups)
}

pub async fn get_group(
    auth: AuthContext,
    name: Path<String>,
    sc: Data<Arc<ServerContext>>,
) -> Response {
    let tokens = try_auth!(auth.bearer_tokens());
    try_auth!(
        sc.auth
            .resolver
            .resolve_permitted_groups(&tokens, Verification::Stateless)
            .await
    );
    let group = try_auth!(sc.auth.registry.get_group(&name));
    Response::json(group)
}

pub async fn put_group(auth: AuthContext, body: Bytes, sc: Data<Arc<ServerContext>>) -> Response {
    let tokens = try_auth!(auth.bearer_tokens());
    try_auth!(sc.auth.gate.require_admin(&tokens).await);

    let req: PutGroupRequest = parse_json!(body);
    let group = try_auth!(sc.auth.registry.create_group(&req.name, req.description));
    Response::json(group)
}

pub async fn patch_group(
    auth: AuthContext,
    name: Path<String>,
    body: Bytes,
    sc: Data<Arc<ServerContext>>,
) -> Response {
    let tokens = try_auth!(auth.bearer_tokens());
    try_auth!(sc.auth.gate.require_admin(&tokens).await);

    let req: PatchGroupRequest = parse_json!(body);
    let group = try_auth!(sc.auth.registry.update_description(&name, req.description));
    Response::json(group)
}

pub async fn delete_group(
    auth: AuthContext,
    name: Path<String>,
    sc: Data<Arc<ServerContext>>,
) -> Response {
    let tokens = try_auth!(auth.bearer_tokens());
    try_auth!(sc.auth.gate.require_admin(&tokens).await);

    try_auth!(sc.auth.registry.delete_group(&name));
    Response::ok()
}
