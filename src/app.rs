//! Application bootstrap: services, modules, migrations, router.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use sqlx::SqlitePool;

use bookshelf_authz::Authorizer;
use bookshelf_cache::TagAwareCache;
use bookshelf_http::versioning::Versioning;
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules;

/// Shared collaborators handed to modules at registration.
#[derive(Clone)]
pub struct AppServices {
    pub pool: SqlitePool,
    pub cache: Arc<TagAwareCache>,
    pub authorizer: Authorizer,
    pub versioning: Versioning,
    pub public_url: String,
}

impl AppServices {
    pub async fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let pool = bookshelf_db::connect(&settings.database).await?;
        let versioning = Versioning::new(&settings.api.default_version)
            .with_context(|| format!("invalid api.default_version '{}'", settings.api.default_version))?;

        Ok(Self {
            pool,
            cache: Arc::new(TagAwareCache::new(settings.cache.capacity)),
            authorizer: Authorizer::from_settings(&settings.auth),
            versioning,
            public_url: settings.server.public_url.clone(),
        })
    }
}

/// A fully wired application, ready to serve.
pub struct Application {
    pub services: AppServices,
    pub registry: ModuleRegistry,
    pub router: Router,
}

/// Connect and register modules, then apply pending migrations.
async fn prepare(settings: &Settings) -> anyhow::Result<(AppServices, ModuleRegistry, usize)> {
    let services = AppServices::from_settings(settings).await?;

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, &services);

    let migrations = registry.collect_migrations();
    let applied = bookshelf_db::run_migrations(&services.pool, &migrations)
        .await
        .context("failed to run migrations")?;

    Ok((services, registry, applied))
}

/// Connect, migrate, initialize modules and build the router.
pub async fn build(settings: &Settings) -> anyhow::Result<Application> {
    let (services, registry, _) = prepare(settings).await?;

    let ctx = InitCtx { settings };
    registry.init_modules(&ctx).await?;

    let router = bookshelf_http::build_router(&registry, settings);

    tracing::info!(modules = registry.len(), "bookshelf-app bootstrap complete");
    Ok(Application {
        services,
        registry,
        router,
    })
}

/// Apply pending migrations and return how many ran.
pub async fn migrate(settings: &Settings) -> anyhow::Result<usize> {
    let (services, _, applied) = prepare(settings).await?;
    services.pool.close().await;
    Ok(applied)
}

/// Apply migrations and load the demo catalog; returns the number of books created.
pub async fn seed(settings: &Settings) -> anyhow::Result<usize> {
    let (services, _, _) = prepare(settings).await?;
    let books = modules::books::repository::BookRepository::new(services.pool.clone());
    let authors = modules::books::repository::AuthorRepository::new(services.pool.clone());

    let created = modules::books::fixtures::seed(&books, &authors).await?;
    services.pool.close().await;
    Ok(created)
}

/// Build the application and serve it until shutdown.
pub async fn serve(settings: &Settings) -> anyhow::Result<()> {
    let app = build(settings).await?;

    bookshelf_http::start_server(app.router.clone(), settings).await?;

    app.registry.stop_modules().await?;
    app.services.pool.close().await;
    Ok(())
}
