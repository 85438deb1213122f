use serde::{Deserialize, Serialize};

use crate::now::current_timestamp;
use crate::server::response::Response;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthzResponse {
    pub version: String,
    pub now: u64,
}

pub async fn get_healthz() -> Response {
    Response::json(HealthzResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        now: current_timestamp(),
    })
}
