use async_trait::async_trait;
use axum::Router;

/// Handed to every module once its schema is migrated.
pub struct InitCtx<'a> {
    pub settings: &'a crate::settings::Settings,
}

/// A named SQL script. Each id is applied at most once per database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

/// A feature slice of the service: routes, schema and lifecycle hooks.
#[async_trait]
pub trait Module: Sync + Send {
    /// Mount prefix and log label; routes land under `/api/{name}`.
    fn name(&self) -> &'static str;

    /// Runs after migrations, before the server accepts requests.
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
    }

    /// OpenAPI fragment with `paths` relative to the mount prefix and
    /// optional `components.schemas`.
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Schema scripts; the registry orders them by module name, then id.
    fn migrations(&self) -> Vec<Migration> {
        vec![]
    }

    /// Runs after the server stops, in reverse registration order.
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
