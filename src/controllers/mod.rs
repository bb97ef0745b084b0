//! Controllers behind the HTTP API. Each is built per request from its action and the context.

mod aggregation;
mod application;
mod model;
mod search;

pub use aggregation::{AggregationAction, AggregationController};
pub use application::{ApplicationAction, ApplicationController};
pub use model::{ModelAction, ModelController};
pub use search::{SearchAction, SearchController};

use crate::context::RequestContext;
use crate::error::AppError;

/// Cube named by the `cube` argument, else the model's default cube.
pub(crate) fn requested_cube(ctx: &RequestContext) -> Result<String, AppError> {
    let cube = match ctx.arg("cube") {
        Some(name) => ctx.model.cube(name),
        None => ctx.model.default_cube(),
    };
    cube.map(|c| c.name.clone()).ok_or_else(|| match ctx.arg("cube") {
        Some(name) => AppError::NotFound(format!("cube '{}'", name)),
        None => AppError::NotFound("model has no cubes".into()),
    })
}
