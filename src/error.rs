//! Typed errors and HTTP mapping.

use crate::response::error_body;
use axum::{
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Failure to resolve a request to an operation. Never reaches a controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("no route matches path '{path}'")]
    NotFound { path: String },
    #[error("method {method} not allowed for path '{path}'")]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },
}

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model source is not set")]
    SourceUnset,
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("missing reference: {kind} '{name}'")]
    MissingReference { kind: &'static str, name: String },
    #[error("duplicate {kind} '{name}'")]
    Duplicate { kind: &'static str, name: String },
    #[error("invalid model: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
    #[error("missing setting {0}")]
    Missing(&'static str),
}

/// Fatal failures while building the server; the server never starts.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unable to open database: {0}")]
    Database(#[source] sqlx::Error),
    #[error("unable to load model from {source_path}: {cause}")]
    ModelLoad {
        source_path: String,
        #[source]
        cause: ModelError,
    },
    #[error("invalid route table: {0}")]
    Routes(#[from] RouteError),
    #[error("unable to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to watch {path}: {source}")]
    Watch {
        path: String,
        #[source]
        source: notify::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// A failure that already knows its HTTP status and body. Passed to the client unmodified.
#[derive(Debug, Clone)]
pub struct HttpFailure {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

impl HttpFailure {
    pub fn new(status: StatusCode, body: serde_json::Value) -> Self {
        HttpFailure {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    pub fn payload_too_large(reason: impl std::fmt::Display) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            error_body("request body too large", &reason.to_string()),
        )
    }
}

impl std::fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "http failure {}", self.status)
    }
}

impl IntoResponse for HttpFailure {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        response.headers_mut().extend(self.headers);
        response
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error("{0}")]
    Http(HttpFailure),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Routing(RoutingError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Routing(RoutingError::MethodNotAllowed { .. }) => {
                StatusCode::METHOD_NOT_ALLOWED
            }
            AppError::Http(f) => f.status,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Db(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::Db(_) | AppError::Model(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short client-facing message; the detail goes into `reason`.
    pub fn message(&self) -> &'static str {
        match self {
            AppError::Routing(RoutingError::NotFound { .. }) => "not found",
            AppError::Routing(RoutingError::MethodNotAllowed { .. }) => "method not allowed",
            AppError::Http(_) => "http failure",
            AppError::NotFound(_) => "resource not found",
            AppError::BadRequest(_) => "bad request",
            AppError::Validation(_) => "validation failed",
            AppError::Db(_) => "database error",
            AppError::Model(_) => "model error",
            AppError::Internal(_) => "internal server error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request failed");
        }
        let err = match self {
            AppError::Http(failure) => return failure.into_response(),
            other => other,
        };
        let allow = match &err {
            AppError::Routing(RoutingError::MethodNotAllowed { allowed, .. }) => Some(
                allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            _ => None,
        };
        let body = error_body(err.message(), &err.to_string());
        let mut response = (status, Json(body)).into_response();
        if let Some(allow) = allow.and_then(|a| HeaderValue::from_str(&a).ok()) {
            response.headers_mut().insert(header::ALLOW, allow);
        }
        response
    }
}
