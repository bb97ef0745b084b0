//! Shared state for every request. Model and route table are immutable once built.

use crate::model::Model;
use crate::routes::RouteTable;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub model: Arc<Model>,
    pub routes: Arc<RouteTable>,
    /// Largest accepted request body, in bytes.
    pub body_limit: usize,
}
