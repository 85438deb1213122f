use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use actix_web::{FromRequest, HttpRequest};

use super::error::AuthError;

const BEARER_SCHEME: &str = "bearer";

/// The caller's credentials as they arrived on one inbound request.
///
/// Holds every `Authorization` header value as raw bytes, in arrival order.
/// It is built when a handler starts and dropped when the handler returns, so
/// credentials never outlive the request that carried them. A proxy forwards
/// [`AuthContext::raw_values`] untouched; only the authorizing service calls
/// [`AuthContext::bearer_tokens`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    values: Vec<Vec<u8>>,
}

impl AuthContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let values = headers
            .get_all(AUTHORIZATION)
            .map(|value| value.as_bytes().to_vec())
            .collect();
        Self { values }
    }

    pub fn from_raw(values: Vec<Vec<u8>>) -> Self {
        Self { values }
    }

    pub fn raw_values(&self) -> &[Vec<u8>] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bearer tokens in header order. No header means no tokens; any header
    /// that is not `Bearer <token>` fails the request.
    pub fn bearer_tokens(&self) -> Result<Vec<String>, AuthError> {
        self.values.iter().map(|v| parse_bearer(v)).collect()
    }
}

fn parse_bearer(value: &[u8]) -> Result<String, AuthError> {
    let value = match std::str::from_utf8(value) {
        Ok(s) => s.trim(),
        Err(_) => {
            return Err(AuthError::TokenMalformed(String::from(
                "authorization header is not valid utf-8",
            )))
        }
    };

    let fields: Vec<&str> = value.split_whitespace().collect();
    if fields.len() != 2 {
        return Err(AuthError::TokenMalformed(String::from(
            "authorization header should be 'Bearer <token>'",
        )));
    }
    if !fields[0].eq_ignore_ascii_case(BEARER_SCHEME) {
        return Err(AuthError::TokenMalformed(format!(
            "unsupported authorization scheme '{}'",
            fields[0]
        )));
    }

    Ok(fields[1].to_string())
}

impl FromRequest for AuthContext {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(Self::from_headers(req.headers())))
    }
}
