//! Controller lifecycle: initialize, execute, finalize. Finalize runs on every exit path.

use crate::error::AppError;
use async_trait::async_trait;
use axum::response::Response;

/// One operation behind an endpoint. Built per request by `Operation::instantiate`.
#[async_trait]
pub trait Controller: Send {
    /// Action name used in logs.
    fn action_name(&self) -> &'static str;

    /// Acquire per-invocation resources. `execute` is skipped if this fails.
    async fn initialize(&mut self) -> Result<(), AppError> {
        Ok(())
    }

    async fn execute(&mut self) -> Result<Response, AppError>;

    /// Release what `initialize` acquired; must cope with a partial `initialize`.
    async fn finalize(&mut self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Run the full lifecycle. `finalize` is called exactly once before this returns.
/// An initialize/execute failure takes priority over a finalize failure, which is only logged then.
pub async fn run(controller: &mut dyn Controller) -> Result<Response, AppError> {
    let action = controller.action_name();

    let outcome = match controller.initialize().await {
        Ok(()) => {
            tracing::debug!(action, "initialized");
            let executed = controller.execute().await;
            if executed.is_ok() {
                tracing::debug!(action, "executed");
            }
            executed
        }
        Err(e) => Err(e),
    };

    let finalized = controller.finalize().await;
    tracing::debug!(action, failed = outcome.is_err(), "finalized");

    match (outcome, finalized) {
        (Ok(response), Ok(())) => Ok(response),
        (Err(e), Ok(())) => Err(e),
        (Ok(_), Err(fe)) => {
            tracing::error!(action, error = %fe, "finalize failed");
            Err(fe)
        }
        (Err(e), Err(fe)) => {
            tracing::error!(
                action,
                error = %e,
                finalize_error = %fe,
                "finalize failed after earlier failure"
            );
            Err(e)
        }
    }
}
