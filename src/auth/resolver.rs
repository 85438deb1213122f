use std::collections::BTreeSet;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::group::{ADMIN_GROUP, PUBLIC_GROUP};
use super::token::{TokenInfo, TokenService, Verification};

/// The groups a request may read from, and whether it carries admin rights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAccess {
    pub permitted_groups: BTreeSet<String>,
    pub is_admin: bool,
}

/// Turns the bearer tokens of one request into access decisions.
///
/// A request without tokens is resolved with the bootstrap public token, so
/// every path goes through token verification. Any verification failure
/// aborts the whole resolution.
pub struct GroupResolver {
    tokens: Arc<TokenService>,
    public_token: String,
}

impl GroupResolver {
    pub fn new(tokens: Arc<TokenService>, public_token: String) -> Self {
        Self {
            tokens,
            public_token,
        }
    }

    pub async fn resolve_permitted_groups(
        &self,
        tokens: &[String],
        mode: Verification,
    ) -> Result<BTreeSet<String>, AuthError> {
        let infos = self.verify_all(tokens, mode).await?;
        Ok(permitted_groups(&infos))
    }

    pub async fn resolve_write_group(
        &self,
        tokens: &[String],
        requested: Option<&str>,
        mode: Verification,
    ) -> Result<String, AuthError> {
        let infos = self.verify_all(tokens, mode).await?;
        let group = select_write_group(&write_candidates(&infos), requested)?;
        debug!("Resolved write group '{group}' (requested: {requested:?})");
        Ok(group)
    }

    pub async fn is_admin(&self, tokens: &[String], mode: Verification) -> Result<bool, AuthError> {
        Ok(self.resolve(tokens, mode).await?.is_admin)
    }

    pub async fn resolve(
        &self,
        tokens: &[String],
        mode: Verification,
    ) -> Result<ResolvedAccess, AuthError> {
        let permitted_groups = self.resolve_permitted_groups(tokens, mode).await?;
        let is_admin = permitted_groups.contains(ADMIN_GROUP);
        debug!("Resolved access: groups {permitted_groups:?}, admin: {is_admin}");
        Ok(ResolvedAccess {
            permitted_groups,
            is_admin,
        })
    }

    async fn verify_all(
        &self,
        tokens: &[String],
        mode: Verification,
    ) -> Result<Vec<TokenInfo>, AuthError> {
        if tokens.is_empty() {
            let info = self.tokens.verify(&self.public_token, mode).await?;
            return Ok(vec![info]);
        }

        let mut infos = Vec::with_capacity(tokens.len());
        for token in tokens {
            infos.push(self.tokens.verify(token, mode).await?);
        }
        Ok(infos)
    }
}

fn permitted_groups(infos: &[TokenInfo]) -> BTreeSet<String> {
    let mut groups: BTreeSet<String> = infos
        .iter()
        .flat_map(|info| info.groups.iter().cloned())
        .collect();
    groups.insert(String::from(PUBLIC_GROUP));
    groups
}

/// Groups a request could write to implicitly: everything its tokens grant
/// except the reserved groups.
fn write_candidates(infos: &[TokenInfo]) -> BTreeSet<String> {
    infos
        .iter()
        .flat_map(|info| info.groups.iter())
        .filter(|g| g.as_str() != PUBLIC_GROUP && g.as_str() != ADMIN_GROUP)
        .cloned()
        .collect()
}

fn select_write_group(
    candidates: &BTreeSet<String>,
    requested: Option<&str>,
) -> Result<String, AuthError> {
    if let Some(group) = requested {
        if group == PUBLIC_GROUP || candidates.contains(group) {
            return Ok(group.to_string());
        }
        return Err(AuthError::AmbiguousWriteTarget {
            requested: Some(group.to_string()),
            candidates: candidates.iter().cloned().collect(),
        });
    }

    let mut iter = candidates.iter();
    match (iter.next(), iter.next()) {
        (None, _) => Ok(String::from(PUBLIC_GROUP)),
        (Some(group), None) => Ok(group.clone()),
        _ => Err(AuthError::AmbiguousWriteTarget {
            requested: None,
            candidates: candidates.iter().cloned().collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::auth::testing::build_test_auth;
    use crate::auth::Authorizer;

    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn issue(auth: &Authorizer, groups: &[&str]) -> String {
        let groups: Vec<String> = groups.iter().map(|s| s.to_string()).collect();
        auth.tokens
            .create_token(&groups, Duration::from_secs(60), None)
            .unwrap()
            .token
    }

    fn sales_auth() -> Authorizer {
        let auth = build_test_auth();
        auth.registry.create_group("us-sales", None).unwrap();
        auth.registry.create_group("apac-sales", None).unwrap();
        auth
    }

    #[test]
    fn test_select_write_group() {
        // No candidates falls back to public
        assert_eq!(select_write_group(&set(&[]), None).unwrap(), "public");
        assert_eq!(select_write_group(&set(&[]), Some("public")).unwrap(), "public");

        assert_eq!(select_write_group(&set(&["a"]), None).unwrap(), "a");
        assert_eq!(select_write_group(&set(&["a", "b"]), Some("b")).unwrap(), "b");
        assert_eq!(select_write_group(&set(&["a", "b"]), Some("public")).unwrap(), "public");

        match select_write_group(&set(&["b", "a"]), None) {
            Err(AuthError::AmbiguousWriteTarget {
                requested,
                candidates,
            }) => {
                assert_eq!(requested, None);
                assert_eq!(candidates, vec!["a", "b"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        assert!(matches!(
            select_write_group(&set(&["a"]), Some("c")),
            Err(AuthError::AmbiguousWriteTarget { requested: Some(g), .. }) if g == "c"
        ));
        // admin is never a write target, not even on request
        assert!(matches!(
            select_write_group(&set(&["a"]), Some("admin")),
            Err(AuthError::AmbiguousWriteTarget { .. })
        ));
    }

    #[tokio::test]
    async fn test_no_token_fallback() {
        let auth = build_test_auth();
        let resolver = &auth.resolver;

        for mode in [Verification::Stateless, Verification::StoreChecked] {
            let access = resolver.resolve(&[], mode).await.unwrap();
            assert_eq!(access.permitted_groups, set(&["public"]));
            assert!(!access.is_admin);

            assert_eq!(
                resolver.resolve_write_group(&[], None, mode).await.unwrap(),
                "public"
            );
        }
    }

    #[tokio::test]
    async fn test_union() {
        let auth = sales_auth();
        let t1 = issue(&auth, &["us-sales"]);
        let t2 = issue(&auth, &["apac-sales"]);
        let mode = Verification::Stateless;

        let groups = auth
            .resolver
            .resolve_permitted_groups(&[t1.clone()], mode)
            .await
            .unwrap();
        assert_eq!(groups, set(&["public", "us-sales"]));

        let groups = auth
            .resolver
            .resolve_permitted_groups(&[t1.clone(), t2.clone()], mode)
            .await
            .unwrap();
        assert_eq!(groups, set(&["apac-sales", "public", "us-sales"]));

        // Order of presentation does not matter
        let reversed = auth
            .resolver
            .resolve_permitted_groups(&[t2, t1], mode)
            .await
            .unwrap();
        assert_eq!(groups, reversed);
    }

    #[tokio::test]
    async fn test_write_group() {
        let auth = sales_auth();
        let single = issue(&auth, &["us-sales"]);
        let multi = issue(&auth, &["us-sales", "apac-sales"]);
        let admin = issue(&auth, &["admin"]);
        let mode = Verification::Stateless;

        let resolver = &auth.resolver;
        assert_eq!(
            resolver
                .resolve_write_group(&[single.clone()], None, mode)
                .await
                .unwrap(),
            "us-sales"
        );
        assert_eq!(
            resolver
                .resolve_write_group(&[admin.clone()], None, mode)
                .await
                .unwrap(),
            "public"
        );
        assert_eq!(
            resolver
                .resolve_write_group(&[multi.clone()], Some("apac-sales"), mode)
                .await
                .unwrap(),
            "apac-sales"
        );
        assert!(matches!(
            resolver.resolve_write_group(&[multi.clone()], None, mode).await,
            Err(AuthError::AmbiguousWriteTarget { .. })
        ));
        assert!(matches!(
            resolver
                .resolve_write_group(&[single, admin], Some("apac-sales"), mode)
                .await,
            Err(AuthError::AmbiguousWriteTarget { .. })
        ));
    }

    #[tokio::test]
    async fn test_error_aborts() {
        let auth = sales_auth();
        let good = issue(&auth, &["us-sales"]);
        let mode = Verification::Stateless;

        // One bad token fails the request instead of being skipped
        let result = auth
            .resolver
            .resolve_permitted_groups(&[good.clone(), String::from("garbage")], mode)
            .await;
        assert!(matches!(result, Err(AuthError::TokenMalformed(_))));

        let revoked = issue(&auth, &["apac-sales"]);
        let id = auth
            .tokens
            .verify(&revoked, mode)
            .await
            .unwrap()
            .id;
        auth.tokens.revoke_token(&id).unwrap();
        let result = auth
            .resolver
            .resolve(&[good, revoked], Verification::StoreChecked)
            .await;
        assert!(matches!(result, Err(AuthError::TokenRevoked(_))));
    }

    #[tokio::test]
    async fn test_is_admin() {
        let auth = sales_auth();
        let mode = Verification::StoreChecked;

        let admin = issue(&auth, &["admin", "public"]);
        assert!(auth.resolver.is_admin(&[admin], mode).await.unwrap());
        assert!(auth
            .resolver
            .is_admin(&[auth.bootstrap.admin.clone()], mode)
            .await
            .unwrap());

        let sales = issue(&auth, &["us-sales"]);
        assert!(!auth.resolver.is_admin(&[sales], mode).await.unwrap());
        assert!(!auth.resolver.is_admin(&[], mode).await.unwrap());
    }
}
