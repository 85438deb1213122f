use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::group::ADMIN_GROUP;

/// Every failure the authorizer can surface. Nothing here is ever downgraded
/// to public-only access by the caller; each variant reaches the client with
/// its [`ErrorKind`] and a recovery hint.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token expired")]
    TokenExpired,

    #[error("malformed token: {0}")]
    TokenMalformed(String),

    #[error("token audience '{actual}' does not match '{expected}'")]
    TokenAudienceMismatch { expected: String, actual: String },

    #[error("token '{0}' has been revoked")]
    TokenRevoked(String),

    #[error("token '{0}' not found")]
    TokenNotFound(String),

    #[error("token '{0}' is the bootstrap public token and cannot be revoked")]
    BootstrapTokenProtected(String),

    #[error("unknown group '{0}'")]
    UnknownGroup(String),

    #[error("group '{0}' already exists")]
    GroupAlreadyExists(String),

    #[error("group '{0}' not found")]
    GroupNotFound(String),

    #[error("group name '{0}' is reserved")]
    ReservedNameConflict(String),

    #[error("group '{0}' is still referenced by a live token")]
    GroupInUse(String),

    #[error("invalid group name '{0}'")]
    InvalidGroupName(String),

    #[error("token must name at least one group")]
    EmptyGroupSet,

    #[error("invalid token ttl: {0}")]
    InvalidTtl(String),

    #[error("{}", ambiguous_message(.requested, .candidates))]
    AmbiguousWriteTarget {
        requested: Option<String>,
        candidates: Vec<String>,
    },

    #[error("admin privilege required")]
    AdminRequired,

    #[error("storage backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// Machine-readable kind of an [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TokenExpired,
    TokenMalformed,
    TokenAudienceMismatch,
    TokenRevoked,
    TokenNotFound,
    BootstrapTokenProtected,
    UnknownGroup,
    GroupAlreadyExists,
    GroupNotFound,
    ReservedNameConflict,
    GroupInUse,
    InvalidGroupName,
    EmptyGroupSet,
    InvalidTtl,
    AmbiguousWriteTarget,
    AdminRequired,
    BackendUnavailable,
}

impl AuthError {
    /// Wraps a storage failure. The request fails closed.
    pub fn backend(err: anyhow::Error) -> Self {
        Self::BackendUnavailable(format!("{err:#}"))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TokenExpired => ErrorKind::TokenExpired,
            Self::TokenMalformed(_) => ErrorKind::TokenMalformed,
            Self::TokenAudienceMismatch { .. } => ErrorKind::TokenAudienceMismatch,
            Self::TokenRevoked(_) => ErrorKind::TokenRevoked,
            Self::TokenNotFound(_) => ErrorKind::TokenNotFound,
            Self::BootstrapTokenProtected(_) => ErrorKind::BootstrapTokenProtected,
            Self::UnknownGroup(_) => ErrorKind::UnknownGroup,
            Self::GroupAlreadyExists(_) => ErrorKind::GroupAlreadyExists,
            Self::GroupNotFound(_) => ErrorKind::GroupNotFound,
            Self::ReservedNameConflict(_) => ErrorKind::ReservedNameConflict,
            Self::GroupInUse(_) => ErrorKind::GroupInUse,
            Self::InvalidGroupName(_) => ErrorKind::InvalidGroupName,
            Self::EmptyGroupSet => ErrorKind::EmptyGroupSet,
            Self::InvalidTtl(_) => ErrorKind::InvalidTtl,
            Self::AmbiguousWriteTarget { .. } => ErrorKind::AmbiguousWriteTarget,
            Self::AdminRequired => ErrorKind::AdminRequired,
            Self::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
        }
    }

    /// What the caller can do about it.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::TokenExpired => "request a new token",
            Self::TokenMalformed(_) => {
                "send 'Authorization: Bearer <token>' with a token issued by this service"
            }
            Self::TokenAudienceMismatch { .. } => "use a token issued for this service",
            Self::TokenRevoked(_) => "the token was revoked, request a new one",
            Self::TokenNotFound(_) => "the token is unknown to this service, request a new one",
            Self::BootstrapTokenProtected(_) => {
                "requests without a token depend on it, rotate the token keys to replace it"
            }
            Self::UnknownGroup(_) => "create the group first or remove it from the request",
            Self::GroupAlreadyExists(_) => "choose another group name",
            Self::GroupNotFound(_) => "check the group name with the list of groups",
            Self::ReservedNameConflict(_) => "'public' and 'admin' are managed by the service",
            Self::GroupInUse(_) => "revoke or wait for expiry of tokens naming this group",
            Self::InvalidGroupName(_) => "use 1-64 characters of letters, digits, '_' or '-'",
            Self::EmptyGroupSet => "pass at least one group, e.g. 'public'",
            Self::InvalidTtl(_) => "use a positive ttl within the configured maximum",
            Self::AmbiguousWriteTarget { .. } => {
                "supply an explicit target group that one of your tokens grants"
            }
            Self::AdminRequired => "present a token scoped to the 'admin' group",
            Self::BackendUnavailable(_) => "retry later, the token store did not respond",
        }
    }
}

fn ambiguous_message(requested: &Option<String>, candidates: &[String]) -> String {
    match requested {
        Some(group) if group == ADMIN_GROUP => format!(
            "'{ADMIN_GROUP}' is never a write target, candidates: [{}]",
            candidates.join(", ")
        ),
        Some(group) => format!(
            "requested write group '{group}' is not granted, candidates: [{}]",
            candidates.join(", ")
        ),
        None => format!(
            "write target is ambiguous, candidates: [{}]",
            candidates.join(", ")
        ),
    }
}
