//! Substring search over dimension level values of a cube.

use crate::context::RequestContext;
use crate::controllers::requested_cube;
use crate::dispatch::Controller;
use crate::error::AppError;
use crate::response::json_ok;
use crate::service::{BrowseQuery, Browser};
use crate::sql::CubeView;
use async_trait::async_trait;
use axum::response::Response;
use sqlx::pool::PoolConnection;
use sqlx::Postgres;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchAction {
    Search,
}

impl SearchAction {
    pub fn name(&self) -> &'static str {
        match self {
            SearchAction::Search => "search",
        }
    }
}

pub struct SearchController {
    action: SearchAction,
    ctx: RequestContext,
    cube: String,
    conn: Option<PoolConnection<Postgres>>,
}

impl SearchController {
    pub fn new(action: SearchAction, ctx: RequestContext) -> Self {
        SearchController {
            action,
            ctx,
            cube: String::new(),
            conn: None,
        }
    }
}

#[async_trait]
impl Controller for SearchController {
    fn action_name(&self) -> &'static str {
        self.action.name()
    }

    async fn initialize(&mut self) -> Result<(), AppError> {
        let text = self.ctx.arg("q").map(str::trim).unwrap_or_default();
        if text.is_empty() {
            return Err(AppError::BadRequest("search needs a non-empty 'q' argument".into()));
        }
        self.cube = requested_cube(&self.ctx)?;
        self.conn = Some(self.ctx.pool.acquire().await?);
        Ok(())
    }

    async fn execute(&mut self) -> Result<Response, AppError> {
        let model = self.ctx.model.clone();
        let cube = model
            .cube(&self.cube)
            .ok_or_else(|| AppError::NotFound(format!("cube '{}'", self.cube)))?;
        let text = self.ctx.arg("q").map(str::trim).unwrap_or_default();
        let limit = BrowseQuery::from_args(&self.ctx.args)?.paging.page_size;
        let dimension = self.ctx.arg("dimension");
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| AppError::Internal("search controller has no connection".into()))?;
        let matches = Browser::new(CubeView::new(&model, cube), &mut **conn)
            .search(text, dimension, limit)
            .await?;
        Ok(json_ok(serde_json::json!({
            "cube": cube.name,
            "query": text,
            "matches": matches,
        })))
    }

    async fn finalize(&mut self) -> Result<(), AppError> {
        self.conn.take();
        Ok(())
    }
}
