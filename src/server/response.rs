use actix_web::body::BoxBody;
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, HttpResponseBuilder, Responder};
use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::auth::error::{AuthError, ErrorKind};

/// JSON envelope of every response from the authorizing service.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseBody<T> {
    pub code: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,

    // No `default` here, it would require `T: Default`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub struct Response {
    http_response: HttpResponse,
}

impl Response {
    pub fn ok() -> Self {
        Self::build::<()>(StatusCode::OK, None, None, None)
    }

    pub fn json<T: Serialize>(data: T) -> Self {
        Self::build(StatusCode::OK, None, None, Some(data))
    }

    pub fn bad_request(message: impl AsRef<str>) -> Self {
        let message = format!("Bad request: {}", message.as_ref());
        Self::build::<()>(StatusCode::BAD_REQUEST, Some(message), None, None)
    }

    pub fn not_found() -> Self {
        Self::build::<()>(
            StatusCode::NOT_FOUND,
            Some(String::from("Resource not found")),
            None,
            None,
        )
    }

    pub fn conflict(message: impl AsRef<str>) -> Self {
        let message = format!("Conflict: {}", message.as_ref());
        Self::build::<()>(StatusCode::CONFLICT, Some(message), None, None)
    }

    pub fn bad_gateway(message: impl AsRef<str>) -> Self {
        let message = format!("Bad gateway: {}", message.as_ref());
        Self::build::<()>(StatusCode::BAD_GATEWAY, Some(message), None, None)
    }

    pub fn status(&self) -> StatusCode {
        self.http_response.status()
    }

    fn build<T: Serialize>(
        status: StatusCode,
        message: Option<String>,
        err: Option<&AuthError>,
        data: Option<T>,
    ) -> Self {
        let body = ResponseBody {
            code: status.as_u16(),
            message,
            kind: err.map(|e| e.kind()),
            hint: err.map(|e| e.hint().to_string()),
            data,
        };
        Self {
            http_response: HttpResponseBuilder::new(status).json(body),
        }
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::TokenExpired
        | ErrorKind::TokenMalformed
        | ErrorKind::TokenAudienceMismatch
        | ErrorKind::TokenRevoked
        | ErrorKind::TokenNotFound => StatusCode::UNAUTHORIZED,

        ErrorKind::AdminRequired => StatusCode::FORBIDDEN,

        ErrorKind::AmbiguousWriteTarget
        | ErrorKind::InvalidTtl
        | ErrorKind::EmptyGroupSet
        | ErrorKind::InvalidGroupName => StatusCode::BAD_REQUEST,

        ErrorKind::UnknownGroup | ErrorKind::GroupNotFound => StatusCode::NOT_FOUND,

        ErrorKind::GroupAlreadyExists
        | ErrorKind::BootstrapTokenProtected
        | ErrorKind::ReservedNameConflict
        | ErrorKind::GroupInUse => StatusCode::CONFLICT,

        ErrorKind::BackendUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl From<AuthError> for Response {
    fn from(err: AuthError) -> Self {
        let status = status_for(err.kind());
        if status.is_server_error() {
            error!("Request failed: {err}");
        } else {
            warn!("Request rejected: {err}");
        }
        Self::build::<()>(status, Some(err.to_string()), Some(&err), None)
    }
}

impl From<Response> for HttpResponse {
    fn from(val: Response) -> Self {
        val.http_response
    }
}

impl Responder for Response {
    type Body = BoxBody;

    fn respond_to(self, _req: &HttpRequest) -> HttpResponse<Self::Body> {
        self.http_response
    }
}
