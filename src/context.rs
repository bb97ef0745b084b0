//! Per-request execution context handed to a controller. Never shared between requests.

use crate::error::AppError;
use crate::model::Model;
use axum::body::Bytes;
use axum::extract::Query;
use axum::http::{request::Parts, HeaderMap, Method, Uri};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Reserved parameter carrying the requested locale.
pub const LOCALE_PARAM: &str = "lang";

#[derive(Clone, Debug)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Path variables from the matched pattern.
    pub params: HashMap<String, String>,
    /// Query string arguments.
    pub args: HashMap<String, String>,
    pub body: Bytes,
    pub locale: Option<String>,
    pub model: Arc<Model>,
    pub pool: PgPool,
}

impl RequestContext {
    pub fn new(
        request_id: Uuid,
        parts: Parts,
        params: HashMap<String, String>,
        args: HashMap<String, String>,
        body: Bytes,
        model: Arc<Model>,
        pool: PgPool,
    ) -> Self {
        let locale = locale_from(&params, &args);
        RequestContext {
            request_id,
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            params,
            args,
            body,
            locale,
            model,
            pool,
        }
    }

    /// Path variable that the route pattern guarantees.
    pub fn param(&self, name: &str) -> Result<&str, AppError> {
        self.params
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| AppError::Internal(format!("route has no '{}' parameter", name)))
    }

    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args.get(name).map(String::as_str)
    }
}

/// Query string as a flat map; a repeated key keeps its last value.
pub fn parse_args(uri: &Uri) -> Result<HashMap<String, String>, AppError> {
    Query::<HashMap<String, String>>::try_from_uri(uri)
        .map(|Query(args)| args)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

/// Verbatim `lang`, path variable first, then query argument. No validation or default.
fn locale_from(params: &HashMap<String, String>, args: &HashMap<String, String>) -> Option<String> {
    params
        .get(LOCALE_PARAM)
        .or_else(|| args.get(LOCALE_PARAM))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn args(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn locale_prefers_path_variable() {
        let locale = locale_from(&args(&[("lang", "sk")]), &args(&[("lang", "en")]));
        assert_eq!(locale.as_deref(), Some("sk"));
    }

    #[test]
    fn locale_falls_back_to_query_and_is_verbatim() {
        let locale = locale_from(&args(&[]), &args(&[("lang", "xx-NOT-A-LOCALE")]));
        assert_eq!(locale.as_deref(), Some("xx-NOT-A-LOCALE"));
    }

    #[test]
    fn locale_absent_without_parameter() {
        assert_eq!(locale_from(&args(&[("name", "time")]), &args(&[])), None);
    }

    #[test]
    fn query_args_are_decoded() {
        let (parts, _) = Request::builder()
            .uri("/aggregate?cut=date%3A2010&drilldown=product")
            .body(())
            .unwrap()
            .into_parts();
        let args = parse_args(&parts.uri).unwrap();
        assert_eq!(args["cut"], "date:2010");
        assert_eq!(args["drilldown"], "product");
    }
}
