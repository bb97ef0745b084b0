//! Server index and version.

use crate::context::RequestContext;
use crate::dispatch::Controller;
use crate::error::AppError;
use crate::response::json_ok;
use async_trait::async_trait;
use axum::response::Response;

pub const API_VERSION: &str = "1";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplicationAction {
    Index,
    Version,
}

impl ApplicationAction {
    pub fn name(&self) -> &'static str {
        match self {
            ApplicationAction::Index => "index",
            ApplicationAction::Version => "version",
        }
    }
}

pub struct ApplicationController {
    action: ApplicationAction,
    ctx: RequestContext,
}

impl ApplicationController {
    pub fn new(action: ApplicationAction, ctx: RequestContext) -> Self {
        ApplicationController { action, ctx }
    }
}

#[async_trait]
impl Controller for ApplicationController {
    fn action_name(&self) -> &'static str {
        self.action.name()
    }

    async fn execute(&mut self) -> Result<Response, AppError> {
        Ok(match self.action {
            ApplicationAction::Index => {
                let model = self.ctx.model.localized(self.ctx.locale.as_deref());
                let cubes: Vec<_> = model
                    .cubes
                    .iter()
                    .map(|c| serde_json::json!({"name": c.name, "label": c.label}))
                    .collect();
                json_ok(serde_json::json!({
                    "name": env!("CARGO_PKG_NAME"),
                    "server_version": env!("CARGO_PKG_VERSION"),
                    "api_version": API_VERSION,
                    "model": {"name": model.name, "label": model.label, "locale": model.locale},
                    "cubes": cubes,
                }))
            }
            ApplicationAction::Version => json_ok(serde_json::json!({
                "server_version": env!("CARGO_PKG_VERSION"),
                "api_version": API_VERSION,
            })),
        })
    }
}
