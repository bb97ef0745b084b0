//! Aggregations, fact listings, dimension values and composite reports over a cube.

use crate::context::RequestContext;
use crate::controllers::requested_cube;
use crate::dispatch::Controller;
use crate::error::AppError;
use crate::response::{json_ok, page_ok};
use crate::service::{BrowseQuery, Browser};
use crate::sql::CubeView;
use async_trait::async_trait;
use axum::response::Response;
use serde::Deserialize;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::Postgres;
use std::collections::{BTreeMap, HashMap};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregationAction {
    Aggregate,
    Facts,
    Fact,
    Values,
    Report,
}

impl AggregationAction {
    pub fn name(&self) -> &'static str {
        match self {
            AggregationAction::Aggregate => "aggregate",
            AggregationAction::Facts => "facts",
            AggregationAction::Fact => "fact",
            AggregationAction::Values => "values",
            AggregationAction::Report => "report",
        }
    }
}

/// POST /report body: named queries, each with a `query` kind and browse arguments.
#[derive(Debug, Deserialize)]
struct ReportRequest {
    queries: BTreeMap<String, BTreeMap<String, Value>>,
}

pub struct AggregationController {
    action: AggregationAction,
    ctx: RequestContext,
    cube: String,
    report: Option<Vec<(String, HashMap<String, String>)>>,
    conn: Option<PoolConnection<Postgres>>,
}

impl AggregationController {
    pub fn new(action: AggregationAction, ctx: RequestContext) -> Self {
        AggregationController {
            action,
            ctx,
            cube: String::new(),
            report: None,
            conn: None,
        }
    }

    async fn run_report(&mut self) -> Result<Value, AppError> {
        let queries = self
            .report
            .take()
            .ok_or_else(|| AppError::Internal("report request was not parsed".into()))?;
        let mut results = serde_json::Map::new();
        for (name, args) in queries {
            let kind = args.get("query").cloned().unwrap_or_default();
            let result = self.run_query(&kind, &args).await?;
            results.insert(name, result);
        }
        Ok(Value::Object(results))
    }

    async fn run_query(
        &mut self,
        kind: &str,
        args: &HashMap<String, String>,
    ) -> Result<Value, AppError> {
        let model = self.ctx.model.clone();
        let cube_name = args.get("cube").unwrap_or(&self.cube);
        let cube = model
            .cube(cube_name)
            .ok_or_else(|| AppError::NotFound(format!("cube '{}'", cube_name)))?;
        let query = BrowseQuery::from_args(args)?;
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| AppError::Internal("aggregation controller has no connection".into()))?;
        let mut browser = Browser::new(CubeView::new(&model, cube), &mut **conn);
        match kind {
            "aggregate" => browser.aggregate(&query).await,
            "facts" => Ok(Value::Array(browser.facts(&query).await?)),
            "fact" => {
                let id = args
                    .get("id")
                    .ok_or_else(|| AppError::BadRequest("fact query needs 'id'".into()))?;
                browser.fact(id).await
            }
            "values" => {
                let dimension = args
                    .get("dimension")
                    .ok_or_else(|| AppError::BadRequest("values query needs 'dimension'".into()))?;
                let depth = parse_depth(args)?;
                Ok(Value::Array(browser.values(dimension, depth, &query).await?))
            }
            other => Err(AppError::BadRequest(format!("unknown report query '{}'", other))),
        }
    }
}

#[async_trait]
impl Controller for AggregationController {
    fn action_name(&self) -> &'static str {
        self.action.name()
    }

    async fn initialize(&mut self) -> Result<(), AppError> {
        if self.action == AggregationAction::Report {
            self.report = Some(parse_report(&self.ctx.body)?);
        }
        self.cube = requested_cube(&self.ctx)?;
        self.conn = Some(self.ctx.pool.acquire().await?);
        tracing::debug!(cube = %self.cube, "connection acquired");
        Ok(())
    }

    async fn execute(&mut self) -> Result<Response, AppError> {
        let query = BrowseQuery::from_args(&self.ctx.args)?;
        match self.action {
            AggregationAction::Aggregate => {
                let args = self.ctx.args.clone();
                Ok(json_ok(self.run_query("aggregate", &args).await?))
            }
            AggregationAction::Facts => {
                let args = self.ctx.args.clone();
                let rows = match self.run_query("facts", &args).await? {
                    Value::Array(rows) => rows,
                    other => vec![other],
                };
                Ok(page_ok(rows, query.paging.page, query.paging.page_size))
            }
            AggregationAction::Fact => {
                let mut args = self.ctx.args.clone();
                args.insert("id".into(), self.ctx.param("id")?.to_string());
                Ok(json_ok(self.run_query("fact", &args).await?))
            }
            AggregationAction::Values => {
                let mut args = self.ctx.args.clone();
                args.insert("dimension".into(), self.ctx.param("dimension")?.to_string());
                let rows = match self.run_query("values", &args).await? {
                    Value::Array(rows) => rows,
                    other => vec![other],
                };
                Ok(page_ok(rows, query.paging.page, query.paging.page_size))
            }
            AggregationAction::Report => Ok(json_ok(self.run_report().await?)),
        }
    }

    async fn finalize(&mut self) -> Result<(), AppError> {
        if self.conn.take().is_some() {
            tracing::debug!(cube = %self.cube, "connection released");
        }
        Ok(())
    }
}

const REPORT_KINDS: &[&str] = &["aggregate", "facts", "fact", "values"];

/// Named report queries as argument maps, each with a known `query` kind.
fn parse_report(body: &[u8]) -> Result<Vec<(String, HashMap<String, String>)>, AppError> {
    if body.is_empty() {
        return Err(AppError::BadRequest("report request body is empty".into()));
    }
    let request: ReportRequest = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("invalid report request: {}", e)))?;
    request
        .queries
        .into_iter()
        .map(|(name, spec)| {
            let args = report_args(spec);
            let kind = args.get("query").cloned();
            match kind.as_deref() {
                None => Err(AppError::BadRequest(format!(
                    "report query '{}' has no 'query' kind",
                    name
                ))),
                Some(kind) if !REPORT_KINDS.contains(&kind) => {
                    Err(AppError::BadRequest(format!("unknown report query '{}'", kind)))
                }
                Some(_) => Ok((name, args)),
            }
        })
        .collect()
}

fn parse_depth(args: &HashMap<String, String>) -> Result<Option<usize>, AppError> {
    args.get("depth")
        .map(|d| {
            d.parse().map_err(|_| {
                AppError::BadRequest(format!("depth must be a positive integer, got '{}'", d))
            })
        })
        .transpose()
}

/// Report query arguments as strings; non-string JSON values use their JSON text.
fn report_args(spec: BTreeMap<String, Value>) -> HashMap<String, String> {
    spec.into_iter()
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (k, v)
        })
        .collect()
}
