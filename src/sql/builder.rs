//! Builds parameterized SELECTs over a cube's denormalised fact view.
//! Level columns are named `dimension.level`; measures and the key keep their own names.

use crate::error::AppError;
use crate::model::{Cube, Dimension, Model};
use crate::service::{BrowseQuery, Cut, Order};

/// Quote identifier for PostgreSQL (safe: only from the model).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// SQL string literal for model names (already restricted to plain characters by the loader).
fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// `schema.view` or `view`, each part quoted.
fn qualified_view(view: &str) -> String {
    view.split('.').map(quoted).collect::<Vec<_>>().join(".")
}

pub fn level_column(dimension: &str, level: &str) -> String {
    format!("{}.{}", dimension, level)
}

pub fn measure_sum_column(measure: &str) -> String {
    format!("{}_sum", measure)
}

pub const RECORD_COUNT: &str = "record_count";

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<String>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: String) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// Escape `%`, `_` and `\` for ILIKE, then wrap as a substring match.
fn like_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

pub struct CubeView<'a> {
    model: &'a Model,
    cube: &'a Cube,
}

impl<'a> CubeView<'a> {
    pub fn new(model: &'a Model, cube: &'a Cube) -> Self {
        CubeView { model, cube }
    }

    pub fn cube(&self) -> &'a Cube {
        self.cube
    }

    fn view(&self) -> String {
        qualified_view(self.cube.fact_view())
    }

    /// Dimension of this cube: unknown to the model is 404, not in the cube is 400.
    pub fn dimension(&self, name: &str) -> Result<&'a Dimension, AppError> {
        let dim = self
            .model
            .dimension(name)
            .ok_or_else(|| AppError::NotFound(format!("dimension '{}'", name)))?;
        if !self.cube.has_dimension(name) {
            return Err(AppError::BadRequest(format!(
                "cube '{}' has no dimension '{}'",
                self.cube.name, name
            )));
        }
        Ok(dim)
    }

    fn dimensions(&self) -> impl Iterator<Item = &'a Dimension> + '_ {
        self.cube.dimensions.iter().filter_map(|d| self.model.dimension(d))
    }

    /// Every column of the fact view a client may order facts by.
    pub fn fact_columns(&self) -> Vec<String> {
        let mut columns = vec![self.cube.key_column().to_string()];
        for dim in self.dimensions() {
            columns.extend(dim.levels.iter().map(|l| level_column(&dim.name, &l.name)));
        }
        columns.extend(self.cube.measures.iter().map(|m| m.name.clone()));
        columns
    }

    fn where_clause(&self, cuts: &[Cut], q: &mut QueryBuf) -> Result<String, AppError> {
        let mut conditions = Vec::new();
        for cut in cuts {
            let dim = self.dimension(&cut.dimension)?;
            let levels = dim.default_levels();
            if cut.path.len() > levels.len() {
                return Err(AppError::BadRequest(format!(
                    "cut on '{}' has {} values but the dimension has {} levels",
                    cut.dimension,
                    cut.path.len(),
                    levels.len()
                )));
            }
            for (level, value) in levels.iter().zip(&cut.path) {
                let n = q.push_param(value.clone());
                conditions.push(format!(
                    "{}::text = ${}",
                    quoted(&level_column(&dim.name, &level.name)),
                    n
                ));
            }
        }
        Ok(if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        })
    }

    fn order_clause(
        order: Option<&Order>,
        allowed: &[String],
        default: &[String],
    ) -> Result<String, AppError> {
        let terms: Vec<String> = match order {
            Some(o) => {
                if !allowed.iter().any(|c| c == &o.column) {
                    return Err(AppError::BadRequest(format!("cannot order by '{}'", o.column)));
                }
                vec![format!("{}{}", quoted(&o.column), if o.descending { " DESC" } else { "" })]
            }
            None => default.iter().map(|c| quoted(c)).collect(),
        };
        Ok(if terms.is_empty() {
            String::new()
        } else {
            format!(" ORDER BY {}", terms.join(", "))
        })
    }

    fn aggregates(&self) -> Vec<String> {
        let mut parts = vec![format!("count(*) AS {}", quoted(RECORD_COUNT))];
        parts.extend(self.cube.measures.iter().map(|m| {
            format!("sum({}) AS {}", quoted(&m.name), quoted(&measure_sum_column(&m.name)))
        }));
        parts
    }

    fn aggregate_columns(&self) -> Vec<String> {
        let mut columns = vec![RECORD_COUNT.to_string()];
        columns.extend(self.cube.measures.iter().map(|m| measure_sum_column(&m.name)));
        columns
    }

    /// Totals over the cut cell.
    pub fn summary(&self, query: &BrowseQuery) -> Result<QueryBuf, AppError> {
        let mut q = QueryBuf::new();
        let where_sql = self.where_clause(&query.cuts, &mut q)?;
        q.sql = format!(
            "SELECT {} FROM {}{}",
            self.aggregates().join(", "),
            self.view(),
            where_sql
        );
        Ok(q)
    }

    /// Group by the next level below the cut for each drilldown dimension.
    /// `None` without drilldown.
    pub fn drilldown(&self, query: &BrowseQuery) -> Result<Option<QueryBuf>, AppError> {
        if query.drilldown.is_empty() {
            return Ok(None);
        }
        let mut group = Vec::new();
        for name in &query.drilldown {
            let dim = self.dimension(name)?;
            let levels = dim.default_levels();
            let depth = query.cut_depth(name);
            if depth >= levels.len() {
                return Err(AppError::BadRequest(format!(
                    "cannot drill down '{}' below its last level",
                    name
                )));
            }
            group.extend(levels[..=depth].iter().map(|l| level_column(&dim.name, &l.name)));
        }
        let mut q = QueryBuf::new();
        let where_sql = self.where_clause(&query.cuts, &mut q)?;
        let group_sql: Vec<String> = group.iter().map(|c| quoted(c)).collect();
        let mut allowed = group.clone();
        allowed.extend(self.aggregate_columns());
        let order_sql = Self::order_clause(query.order.as_ref(), &allowed, &group)?;
        q.sql = format!(
            "SELECT {}, {} FROM {}{} GROUP BY {}{} LIMIT {} OFFSET {}",
            group_sql.join(", "),
            self.aggregates().join(", "),
            self.view(),
            where_sql,
            group_sql.join(", "),
            order_sql,
            query.paging.page_size,
            query.paging.offset()
        );
        Ok(Some(q))
    }

    pub fn facts(&self, query: &BrowseQuery) -> Result<QueryBuf, AppError> {
        let mut q = QueryBuf::new();
        let where_sql = self.where_clause(&query.cuts, &mut q)?;
        let key = vec![self.cube.key_column().to_string()];
        let order_sql = Self::order_clause(query.order.as_ref(), &self.fact_columns(), &key)?;
        q.sql = format!(
            "SELECT * FROM {}{}{} LIMIT {} OFFSET {}",
            self.view(),
            where_sql,
            order_sql,
            query.paging.page_size,
            query.paging.offset()
        );
        Ok(q)
    }

    /// One fact by key; the key is compared as text so any key type works.
    pub fn fact(&self, id: &str) -> QueryBuf {
        let mut q = QueryBuf::new();
        let n = q.push_param(id.to_string());
        q.sql = format!(
            "SELECT * FROM {} WHERE {}::text = ${}",
            self.view(),
            quoted(self.cube.key_column()),
            n
        );
        q
    }

    /// Distinct values of the first `depth` levels (all levels when `None`).
    pub fn values(
        &self,
        dimension: &str,
        depth: Option<usize>,
        query: &BrowseQuery,
    ) -> Result<QueryBuf, AppError> {
        let dim = self.dimension(dimension)?;
        let levels = dim.default_levels();
        let depth = depth.unwrap_or(levels.len());
        if depth == 0 || depth > levels.len() {
            return Err(AppError::BadRequest(format!(
                "depth must be between 1 and {} for dimension '{}'",
                levels.len(),
                dimension
            )));
        }
        let columns: Vec<String> = levels[..depth]
            .iter()
            .map(|l| level_column(&dim.name, &l.name))
            .collect();
        let mut q = QueryBuf::new();
        let where_sql = self.where_clause(&query.cuts, &mut q)?;
        let column_sql: Vec<String> = columns.iter().map(|c| quoted(c)).collect();
        let order_sql = Self::order_clause(query.order.as_ref(), &columns, &columns)?;
        q.sql = format!(
            "SELECT DISTINCT {} FROM {}{}{} LIMIT {} OFFSET {}",
            column_sql.join(", "),
            self.view(),
            where_sql,
            order_sql,
            query.paging.page_size,
            query.paging.offset()
        );
        Ok(q)
    }

    /// Case-insensitive substring match over level values, optionally of one dimension.
    pub fn search(
        &self,
        text: &str,
        dimension: Option<&str>,
        limit: u32,
    ) -> Result<QueryBuf, AppError> {
        let dims: Vec<&Dimension> = match dimension {
            Some(name) => vec![self.dimension(name)?],
            None => self.dimensions().collect(),
        };
        let mut q = QueryBuf::new();
        let n = q.push_param(like_pattern(text));
        let mut parts = Vec::new();
        for dim in dims {
            for level in &dim.levels {
                let column = quoted(&level_column(&dim.name, &level.name));
                parts.push(format!(
                    "SELECT {} AS dimension, {} AS level, {}::text AS value \
                     FROM {} WHERE {}::text ILIKE ${}",
                    literal(&dim.name),
                    literal(&level.name),
                    column,
                    self.view(),
                    column,
                    n
                ));
            }
        }
        if parts.is_empty() {
            return Err(AppError::BadRequest(format!(
                "cube '{}' has no dimensions to search",
                self.cube.name
            )));
        }
        q.sql = format!(
            "SELECT * FROM ({}) matches ORDER BY dimension, level, value LIMIT {}",
            parts.join(" UNION "),
            limit
        );
        Ok(q)
    }
}
