//! Slicer server: HTTP access to an OLAP model and its cubes.
//!
//! Requests are resolved against a [`RouteTable`], turned into a controller, and run
//! through an initialize / execute / finalize lifecycle. Errors are JSON
//! `{"error": {"message", "reason"}}` bodies.

pub mod config;
pub mod context;
pub mod controllers;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod reload;
pub mod response;
pub mod routes;
pub mod scope;
pub mod server;
pub mod service;
pub mod sql;
pub mod state;

pub use config::{load_config, ServerConfig};
pub use context::RequestContext;
pub use dispatch::Controller;
pub use error::{AppError, ConfigError, HttpFailure, ModelError, RoutingError, StartupError};
pub use model::{load_model, Model};
pub use response::error_body;
pub use routes::{Operation, RouteTable};
pub use server::{handle, run_server, Slicer};
pub use state::AppState;
