//! Model metadata: the whole model, dimensions, cubes and dimension levels.

use crate::context::RequestContext;
use crate::dispatch::Controller;
use crate::error::AppError;
use crate::model::{Dimension, Model};
use crate::response::json_ok;
use async_trait::async_trait;
use axum::response::Response;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelAction {
    Show,
    Dimension,
    DefaultCube,
    Cube,
    DimensionLevels,
    DimensionLevelNames,
}

impl ModelAction {
    pub fn name(&self) -> &'static str {
        match self {
            ModelAction::Show => "show",
            ModelAction::Dimension => "dimension",
            ModelAction::DefaultCube => "get_default_cube",
            ModelAction::Cube => "get_cube",
            ModelAction::DimensionLevels => "dimension_levels",
            ModelAction::DimensionLevelNames => "dimension_level_names",
        }
    }
}

pub struct ModelController {
    action: ModelAction,
    ctx: RequestContext,
    /// Model with labels for the request locale; set in `initialize`.
    localized: Option<Model>,
}

impl ModelController {
    pub fn new(action: ModelAction, ctx: RequestContext) -> Self {
        ModelController {
            action,
            ctx,
            localized: None,
        }
    }

    fn dimension<'m>(&self, model: &'m Model) -> Result<&'m Dimension, AppError> {
        let name = self.ctx.param("name")?;
        model
            .dimension(name)
            .ok_or_else(|| AppError::NotFound(format!("dimension '{}'", name)))
    }
}

#[async_trait]
impl Controller for ModelController {
    fn action_name(&self) -> &'static str {
        self.action.name()
    }

    async fn initialize(&mut self) -> Result<(), AppError> {
        self.localized = Some(self.ctx.model.localized(self.ctx.locale.as_deref()));
        Ok(())
    }

    async fn execute(&mut self) -> Result<Response, AppError> {
        let model = self
            .localized
            .as_ref()
            .ok_or_else(|| AppError::Internal("model controller not initialized".into()))?;
        Ok(match self.action {
            ModelAction::Show => json_ok(model),
            ModelAction::Dimension => json_ok(self.dimension(model)?),
            ModelAction::DefaultCube => {
                let cube = model
                    .default_cube()
                    .ok_or_else(|| AppError::NotFound("model has no cubes".into()))?;
                json_ok(cube)
            }
            ModelAction::Cube => {
                let name = self.ctx.param("name")?;
                let cube = model
                    .cube(name)
                    .ok_or_else(|| AppError::NotFound(format!("cube '{}'", name)))?;
                json_ok(cube)
            }
            ModelAction::DimensionLevels => json_ok(self.dimension(model)?.default_levels()),
            ModelAction::DimensionLevelNames => {
                let names: Vec<&str> = self
                    .dimension(model)?
                    .default_levels()
                    .iter()
                    .map(|l| l.name.as_str())
                    .collect();
                json_ok(names)
            }
        })
    }

    async fn finalize(&mut self) -> Result<(), AppError> {
        self.localized = None;
        Ok(())
    }
}
