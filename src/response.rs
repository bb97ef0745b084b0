//! Response helpers shared by controllers and the error responder.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Paged listing envelope used by fact and value listings.
#[derive(Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[derive(Serialize)]
pub struct PageMeta {
    pub count: u64,
    pub page: u32,
    pub page_size: u32,
}

/// 200 with the value serialized as the JSON body (serialized once, never re-encoded).
pub fn json_ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

pub fn page_ok<T: Serialize>(data: Vec<T>, page: u32, page_size: u32) -> Response {
    let count = data.len() as u64;
    json_ok(Page {
        data,
        meta: PageMeta {
            count,
            page,
            page_size,
        },
    })
}

/// `{"error": {"message": ..., "reason": ...}}`
pub fn error_body(message: &str, reason: &str) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "message": message,
            "reason": reason
        }
    })
}
