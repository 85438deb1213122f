use std::sync::Arc;

use actix_web::web::{Bytes, Data, Query};
use log::info;
use serde::{Deserialize, Serialize};

use crate::auth::error::AuthError;
use crate::auth::header::AuthContext;
use crate::auth::token::Verification;
use crate::db::types::SourceRecord;
use crate::now::current_timestamp;
use crate::server::context::ServerContext;
use crate::server::handlers::access::WriteQuery;
use crate::server::response::Response;
use crate::{parse_json, try_auth};

/// A trusted content source, registered by an admin.
#[derive(Debug, Serialize, Deserialize)]
pub struct PutSourceRequest {
    pub name: String,
    pub url: String,
}

/// Sources attributed to any group the caller may read.
pub async fn list_sources(auth: AuthContext, sc: Data<Arc<ServerContext>>) -> Response {
    let tokens = try_auth!(auth.bearer_tokens());
    let groups = try_auth!(
        sc.auth
            .resolver
            .resolve_permitted_groups(&tokens, Verification::Stateless)
            .await
    );

    let groups: Vec<String> = groups.into_iter().collect();
    let sources = try_auth!(sc
        .db()
        .with_transaction(|tx| tx.list_sources(&groups))
        .map_err(AuthError::backend));
    Response::json(sources)
}

pub async fn put_source(
    auth: AuthContext,
    query: Query<WriteQuery>,
    body: Bytes,
    sc: Data<Arc<ServerContext>>,
) -> Response {
    let tokens = try_auth!(auth.bearer_tokens());
    try_auth!(sc.auth.gate.require_admin(&tokens).await);
    let group = try_auth!(
        sc.auth
            .resolver
            .resolve_write_group(&tokens, query.group.as_deref(), Verification::StoreChecked)
            .await
    );

    let req: PutSourceRequest = parse_json!(body);
    if req.name.is_empty() || req.url.is_empty() {
        return Response::bad_request("source name and url are required");
    }

    let source = SourceRecord {
        name: req.name,
        url: req.url,
        group,
        create_time: current_timestamp(),
    };
    let created = try_auth!(sc
        .db()
        .with_transaction(|tx| {
            if tx.has_source(&source.name)? {
                return Ok(false);
            }
            tx.create_source(&source)?;
            Ok(true)
        })
        .map_err(AuthError::backend));
    if !created {
        return Response::conflict(format!("source '{}' already exists", source.name));
    }

    info!(
        "Registered source '{}' for group '{}'",
        source.name, source.group
    );
    Response::json(source)
}
