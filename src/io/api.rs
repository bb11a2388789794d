//! JSON response envelope shared by all API endpoints
//!
//! ```json
//! {"success":true,"message":"Current zone status retrieved","data":{...}}
//! ```

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self { success: true, message: message.into(), data: Some(data) }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), data: None }
    }
}

/// Build a response with a fixed content type
pub fn text_response(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Serialize an envelope; serialization failure degrades to a plain 500
pub fn json_response<T: Serialize>(status: StatusCode, body: &ApiResponse<T>) -> Response<Full<Bytes>> {
    match serde_json::to_string(body) {
        Ok(json) => text_response(status, "application/json", json),
        Err(e) => {
            error!(error = %e, "response_serialization_failed");
            text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain; charset=utf-8",
                "Internal Server Error".to_string(),
            )
        }
    }
}
