//! Runs cube view queries on a borrowed connection and returns JSON rows.

use crate::error::AppError;
use crate::service::BrowseQuery;
use crate::sql::{CubeView, QueryBuf};
use serde_json::Value;
use sqlx::PgConnection;

/// All rows of `q` as JSON objects, in query order.
pub async fn fetch_rows(conn: &mut PgConnection, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
    let sql = format!("SELECT coalesce(json_agg(row_to_json(q)), '[]'::json) FROM ({}) q", q.sql);
    tracing::debug!(sql = %sql, params = ?q.params, "query");
    let mut query = sqlx::query_scalar::<_, Value>(&sql);
    for p in &q.params {
        query = query.bind(p.as_str());
    }
    match query.fetch_one(&mut *conn).await? {
        Value::Array(rows) => Ok(rows),
        Value::Null => Ok(Vec::new()),
        other => Ok(vec![other]),
    }
}

/// First row of `q` as a JSON object, if any.
pub async fn fetch_one(conn: &mut PgConnection, q: &QueryBuf) -> Result<Option<Value>, AppError> {
    let sql = format!("SELECT row_to_json(q) FROM ({}) q LIMIT 1", q.sql);
    tracing::debug!(sql = %sql, params = ?q.params, "query");
    let mut query = sqlx::query_scalar::<_, Value>(&sql);
    for p in &q.params {
        query = query.bind(p.as_str());
    }
    Ok(query.fetch_optional(&mut *conn).await?)
}

/// Browsing operations of one cube over one connection.
pub struct Browser<'a> {
    view: CubeView<'a>,
    conn: &'a mut PgConnection,
}

impl<'a> Browser<'a> {
    pub fn new(view: CubeView<'a>, conn: &'a mut PgConnection) -> Self {
        Browser { view, conn }
    }

    /// `{"cube", "summary", "drilldown"?}`
    pub async fn aggregate(&mut self, query: &BrowseQuery) -> Result<Value, AppError> {
        let summary_q = self.view.summary(query)?;
        let drill_q = self.view.drilldown(query)?;
        let summary = fetch_one(self.conn, &summary_q).await?.unwrap_or(Value::Null);
        let mut result = serde_json::json!({
            "cube": self.view.cube().name,
            "summary": summary,
        });
        if let Some(q) = drill_q {
            result["drilldown"] = Value::Array(fetch_rows(self.conn, &q).await?);
        }
        Ok(result)
    }

    pub async fn facts(&mut self, query: &BrowseQuery) -> Result<Vec<Value>, AppError> {
        let q = self.view.facts(query)?;
        fetch_rows(self.conn, &q).await
    }

    pub async fn fact(&mut self, id: &str) -> Result<Value, AppError> {
        let q = self.view.fact(id);
        fetch_one(self.conn, &q)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("fact '{}' in cube '{}'", id, self.view.cube().name))
            })
    }

    pub async fn values(
        &mut self,
        dimension: &str,
        depth: Option<usize>,
        query: &BrowseQuery,
    ) -> Result<Vec<Value>, AppError> {
        let q = self.view.values(dimension, depth, query)?;
        fetch_rows(self.conn, &q).await
    }

    pub async fn search(
        &mut self,
        text: &str,
        dimension: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Value>, AppError> {
        let q = self.view.search(text, dimension, limit)?;
        fetch_rows(self.conn, &q).await
    }
}
