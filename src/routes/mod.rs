//! Route table: ordered (pattern, methods, operation) bindings, first match wins.

mod pattern;

pub use pattern::Pattern;

use crate::context::RequestContext;
use crate::controllers::{
    AggregationAction, AggregationController, ApplicationAction, ApplicationController, ModelAction,
    ModelController, SearchAction, SearchController,
};
use crate::dispatch::Controller;
use crate::error::{RouteError, RoutingError};
use axum::http::Method;
use std::collections::HashMap;

/// What a matched route runs: a controller plus one of its actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Application(ApplicationAction),
    Model(ModelAction),
    Aggregation(AggregationAction),
    Search(SearchAction),
}

impl Operation {
    pub fn controller_name(&self) -> &'static str {
        match self {
            Operation::Application(_) => "application",
            Operation::Model(_) => "model",
            Operation::Aggregation(_) => "aggregation",
            Operation::Search(_) => "search",
        }
    }

    pub fn action_name(&self) -> &'static str {
        match self {
            Operation::Application(a) => a.name(),
            Operation::Model(a) => a.name(),
            Operation::Aggregation(a) => a.name(),
            Operation::Search(a) => a.name(),
        }
    }

    /// Fresh controller for one request; the context is its only input.
    pub fn instantiate(self, ctx: RequestContext) -> Box<dyn Controller> {
        match self {
            Operation::Application(action) => Box::new(ApplicationController::new(action, ctx)),
            Operation::Model(action) => Box::new(ModelController::new(action, ctx)),
            Operation::Aggregation(action) => Box::new(AggregationController::new(action, ctx)),
            Operation::Search(action) => Box::new(SearchController::new(action, ctx)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Route {
    pub pattern: Pattern,
    /// `None` accepts every method.
    pub methods: Option<Vec<Method>>,
    pub operation: Operation,
}

impl Route {
    pub fn new(
        pattern: &str,
        methods: Option<Vec<Method>>,
        operation: Operation,
    ) -> Result<Self, RouteError> {
        Ok(Route {
            pattern: Pattern::parse(pattern)?,
            methods,
            operation,
        })
    }

    pub fn get(pattern: &str, operation: Operation) -> Result<Self, RouteError> {
        Self::new(pattern, Some(vec![Method::GET]), operation)
    }

    pub fn post(pattern: &str, operation: Operation) -> Result<Self, RouteError> {
        Self::new(pattern, Some(vec![Method::POST]), operation)
    }

    /// GET routes also answer HEAD.
    pub fn allows(&self, method: &Method) -> bool {
        match &self.methods {
            None => true,
            Some(methods) => {
                methods.contains(method)
                    || (*method == Method::HEAD && methods.contains(&Method::GET))
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct RouteMatch {
    pub operation: Operation,
    pub params: HashMap<String, String>,
    pub pattern: String,
}

#[derive(Clone, Debug)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        RouteTable { routes }
    }

    /// The slicer HTTP API.
    pub fn standard() -> Result<Self, RouteError> {
        use crate::controllers::AggregationAction as Agg;
        use crate::controllers::ModelAction as M;
        Ok(Self::new(vec![
            Route::get("/", Operation::Application(ApplicationAction::Index))?,
            Route::get("/version", Operation::Application(ApplicationAction::Version))?,
            Route::get("/model", Operation::Model(M::Show))?,
            Route::get("/model/dimension/{name}", Operation::Model(M::Dimension))?,
            Route::get("/model/cube", Operation::Model(M::DefaultCube))?,
            Route::get("/model/cube/{name}", Operation::Model(M::Cube))?,
            Route::get("/model/dimension/{name}/levels", Operation::Model(M::DimensionLevels))?,
            Route::get(
                "/model/dimension/{name}/level_names",
                Operation::Model(M::DimensionLevelNames),
            )?,
            Route::get("/aggregate", Operation::Aggregation(Agg::Aggregate))?,
            Route::get("/facts", Operation::Aggregation(Agg::Facts))?,
            Route::get("/fact/{id}", Operation::Aggregation(Agg::Fact))?,
            Route::get("/dimension/{dimension}", Operation::Aggregation(Agg::Values))?,
            Route::post("/report", Operation::Aggregation(Agg::Report))?,
            Route::get("/search", Operation::Search(SearchAction::Search))?,
        ]))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// First route (in declaration order) whose pattern and method both match.
    /// A path matched only with other methods is `MethodNotAllowed`, not `NotFound`.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<RouteMatch, RoutingError> {
        let path = normalize_path(path);
        let mut allowed: Vec<Method> = Vec::new();
        for route in &self.routes {
            let Some(params) = route.pattern.captures(path) else {
                continue;
            };
            if route.allows(method) {
                return Ok(RouteMatch {
                    operation: route.operation,
                    params,
                    pattern: route.pattern.as_str().to_string(),
                });
            }
            for m in route.methods.iter().flatten() {
                if !allowed.contains(m) {
                    allowed.push(m.clone());
                }
            }
        }
        if allowed.is_empty() {
            Err(RoutingError::NotFound { path: path.to_string() })
        } else {
            Err(RoutingError::MethodNotAllowed {
                method: method.clone(),
                path: path.to_string(),
                allowed,
            })
        }
    }
}

/// `/model/` and `/model` are the same resource.
fn normalize_path(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::standard().unwrap()
    }

    #[test]
    fn every_standard_route_resolves() {
        let cases: &[(Method, &str, Operation, &[(&str, &str)])] = &[
            (Method::GET, "/", Operation::Application(ApplicationAction::Index), &[]),
            (Method::GET, "/version", Operation::Application(ApplicationAction::Version), &[]),
            (Method::GET, "/model", Operation::Model(ModelAction::Show), &[]),
            (
                Method::GET,
                "/model/dimension/time",
                Operation::Model(ModelAction::Dimension),
                &[("name", "time")],
            ),
            (Method::GET, "/model/cube", Operation::Model(ModelAction::DefaultCube), &[]),
            (
                Method::GET,
                "/model/cube/sales",
                Operation::Model(ModelAction::Cube),
                &[("name", "sales")],
            ),
            (
                Method::GET,
                "/model/dimension/time/levels",
                Operation::Model(ModelAction::DimensionLevels),
                &[("name", "time")],
            ),
            (
                Method::GET,
                "/model/dimension/geography/level_names",
                Operation::Model(ModelAction::DimensionLevelNames),
                &[("name", "geography")],
            ),
            (Method::GET, "/aggregate", Operation::Aggregation(AggregationAction::Aggregate), &[]),
            (Method::GET, "/facts", Operation::Aggregation(AggregationAction::Facts), &[]),
            (
                Method::GET,
                "/fact/42",
                Operation::Aggregation(AggregationAction::Fact),
                &[("id", "42")],
            ),
            (
                Method::GET,
                "/dimension/date",
                Operation::Aggregation(AggregationAction::Values),
                &[("dimension", "date")],
            ),
            (Method::POST, "/report", Operation::Aggregation(AggregationAction::Report), &[]),
            (Method::GET, "/search", Operation::Search(SearchAction::Search), &[]),
        ];
        let table = table();
        for (method, path, operation, params) in cases {
            let m = table.resolve(method, path).unwrap();
            assert_eq!(m.operation, *operation, "{path}");
            let expected: HashMap<String, String> =
                params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
            assert_eq!(m.params, expected, "{path}");
        }
    }

    #[test]
    fn unknown_path_is_not_found() {
        let err = table().resolve(&Method::GET, "/cubes/sales").unwrap_err();
        assert_eq!(err, RoutingError::NotFound { path: "/cubes/sales".into() });
    }

    #[test]
    fn get_on_report_is_method_not_allowed() {
        let err = table().resolve(&Method::GET, "/report").unwrap_err();
        match err {
            RoutingError::MethodNotAllowed { allowed, .. } => {
                assert_eq!(allowed, vec![Method::POST])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn post_on_get_route_is_method_not_allowed() {
        let err = table().resolve(&Method::POST, "/model").unwrap_err();
        assert!(matches!(err, RoutingError::MethodNotAllowed { .. }));
    }

    #[test]
    fn head_is_accepted_for_get_routes() {
        assert!(table().resolve(&Method::HEAD, "/model").is_ok());
    }

    #[test]
    fn trailing_slash_is_ignored() {
        let m = table().resolve(&Method::GET, "/model/cube/").unwrap();
        assert_eq!(m.operation, Operation::Model(ModelAction::DefaultCube));
    }

    #[test]
    fn first_match_wins() {
        let table = RouteTable::new(vec![
            Route::get("/model/cube/{name}", Operation::Model(ModelAction::Cube)).unwrap(),
            Route::get("/model/cube/default", Operation::Model(ModelAction::DefaultCube)).unwrap(),
        ]);
        let m = table.resolve(&Method::GET, "/model/cube/default").unwrap();
        assert_eq!(m.operation, Operation::Model(ModelAction::Cube));
        assert_eq!(m.params["name"], "default");
    }

    #[test]
    fn unrestricted_route_accepts_any_method() {
        let table = RouteTable::new(vec![
            Route::new("/search", None, Operation::Search(SearchAction::Search)).unwrap(),
        ]);
        assert!(table.resolve(&Method::DELETE, "/search").is_ok());
    }

    #[test]
    fn later_route_with_matching_method_still_wins() {
        let table = RouteTable::new(vec![
            Route::post("/report", Operation::Aggregation(AggregationAction::Report)).unwrap(),
            Route::get("/report", Operation::Aggregation(AggregationAction::Facts)).unwrap(),
        ]);
        let m = table.resolve(&Method::GET, "/report").unwrap();
        assert_eq!(m.operation, Operation::Aggregation(AggregationAction::Facts));
    }
}
