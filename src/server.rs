//! Server shell: owns model, pool and route table; turns each request into a controller run.

use crate::config::ServerConfig;
use crate::context::{parse_args, RequestContext};
use crate::dispatch;
use crate::error::{AppError, ConfigError, HttpFailure, ModelError, StartupError};
use crate::model::{load_model, Model};
use crate::reload::ModelWatcher;
use crate::routes::RouteTable;
use crate::scope::RequestScope;
use crate::state::AppState;
use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::Router;
use http_body_util::LengthLimitError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::Instrument;
use uuid::Uuid;

/// Label used in startup errors when no model source is configured.
pub const UNKNOWN_MODEL_SOURCE: &str = "unknown path";

pub struct Slicer {
    state: AppState,
}

impl Slicer {
    /// Open the database pool, then load the model. Any failure is fatal.
    pub async fn initialize(config: &ServerConfig) -> Result<Self, StartupError> {
        let url = config.db.url.as_deref().ok_or(ConfigError::Missing("db.url"))?;
        let pool = PgPoolOptions::new()
            .max_connections(config.db.max_connections)
            .connect_lazy(url)
            .map_err(StartupError::Database)?;

        let model = match &config.model.path {
            Some(path) => load_model(path).await.map_err(|cause| StartupError::ModelLoad {
                source_path: path.display().to_string(),
                cause,
            })?,
            None => {
                return Err(StartupError::ModelLoad {
                    source_path: UNKNOWN_MODEL_SOURCE.to_string(),
                    cause: ModelError::SourceUnset,
                })
            }
        };
        Ok(Self::from_parts(model, pool, RouteTable::standard()?, config.server.body_limit))
    }

    pub fn from_parts(model: Model, pool: PgPool, routes: RouteTable, body_limit: usize) -> Self {
        Slicer {
            state: AppState {
                pool,
                model: Arc::new(model),
                routes: Arc::new(routes),
                body_limit,
            },
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Every request goes through the shell's own route table,
    /// so the axum router is a single fallback.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(fallback)
            .layer(RequestBodyLimitLayer::new(self.state.body_limit))
            .with_state(self.state.clone())
    }
}

async fn fallback(State(state): State<AppState>, request: Request) -> Response {
    handle(state, request).await
}

/// Route, build the context, run the controller lifecycle, and attach the request scope
/// so it is released after the body has been sent.
pub async fn handle(state: AppState, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let scope = RequestScope::open(&parts.method, parts.uri.path());
    let request_id = scope.request_id();
    let span = scope.span().clone();
    let response = match dispatch_request(&state, parts, body, request_id).instrument(span).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };
    scope.attach(response)
}

async fn dispatch_request(
    state: &AppState,
    parts: Parts,
    body: Body,
    request_id: Uuid,
) -> Result<Response, AppError> {
    let route = state.routes.resolve(&parts.method, parts.uri.path())?;
    tracing::debug!(pattern = %route.pattern, action = route.operation.action_name(), "routed");
    let args = parse_args(&parts.uri)?;
    let body = to_bytes(body, state.body_limit).await.map_err(body_error)?;
    let ctx = RequestContext::new(
        request_id,
        parts,
        route.params,
        args,
        body,
        state.model.clone(),
        state.pool.clone(),
    );
    let mut controller = route.operation.instantiate(ctx);
    dispatch::run(controller.as_mut()).await
}

/// Only a tripped length limit is a 413; any other read failure is the client's bad request.
fn body_error(e: axum::Error) -> AppError {
    if exceeds_limit(&e) {
        AppError::Http(HttpFailure::payload_too_large(e))
    } else {
        AppError::BadRequest(format!("cannot read request body: {}", e))
    }
}

fn exceeds_limit(e: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(e);
    while let Some(err) = current {
        if err.is::<LengthLimitError>() {
            return true;
        }
        current = err.source();
    }
    false
}

enum Stop {
    Signal,
    Reload,
}

/// Serve until Ctrl-C. With `server.reload`, a change of the model source rebuilds the
/// shell and serving restarts; a reload that fails keeps the previous shell.
pub async fn run_server(config: ServerConfig) -> Result<(), StartupError> {
    let mut slicer = Slicer::initialize(&config).await?;
    let addr = config.server.addr();
    let mut first = true;
    loop {
        let listener = TcpListener::bind(&addr).await.map_err(|source| StartupError::Bind {
            addr: addr.clone(),
            source,
        })?;
        let local = listener.local_addr().map_err(StartupError::Serve)?;
        tracing::info!("listening on http://{}", local);

        let mut watcher = watch_model(&config, first)?;
        first = false;
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel();
        let shutdown = async move {
            let stop = tokio::select! {
                _ = shutdown_signal() => Stop::Signal,
                _ = changed(watcher.as_mut()) => Stop::Reload,
            };
            let _ = stop_tx.send(stop);
        };
        axum::serve(listener, slicer.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(StartupError::Serve)?;

        match stop_rx.await.unwrap_or(Stop::Signal) {
            Stop::Signal => {
                tracing::info!("shutting down");
                return Ok(());
            }
            Stop::Reload => {
                tracing::info!("model source changed, reloading");
                match Slicer::initialize(&config).await {
                    Ok(fresh) => slicer = fresh,
                    Err(e) => tracing::error!(error = %e, "reload failed, keeping previous model"),
                }
            }
        }
    }
}

/// Watcher for the model source when reload is on. Failing to watch aborts the first start;
/// after a reload it only disables further reloads.
fn watch_model(config: &ServerConfig, first: bool) -> Result<Option<ModelWatcher>, StartupError> {
    let path = match (&config.model.path, config.server.reload) {
        (Some(path), true) => path,
        _ => return Ok(None),
    };
    match ModelWatcher::start(path) {
        Ok(watcher) => Ok(Some(watcher)),
        Err(e) if first => Err(e),
        Err(e) => {
            tracing::error!(error = %e, "cannot watch model source, reload disabled");
            Ok(None)
        }
    }
}

async fn changed(watcher: Option<&mut ModelWatcher>) {
    match watcher {
        Some(w) => w.changed().await,
        None => std::future::pending().await,
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
