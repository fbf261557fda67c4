//! Service wiring for the table lifecycle.
//!
//! Selects a storage backend from [`Config`], and drives one table through
//! its whole lifecycle with structured logging along the way.

pub mod config;
pub mod error;

use std::sync::Arc;

use common::{Context, Id, IdGenerator, UuidGenerator};
use domain::{MenuCatalog, MenuItem, TableRepository, TableService, TableStatus};
use sqlx::postgres::PgPoolOptions;
use table_store::{
    InMemoryMenuCatalog, InMemoryTableRepository, PostgresMenuCatalog, PostgresTableRepository,
};

pub use config::Config;
pub use error::AppError;

/// The storage pair the service runs against.
#[derive(Clone)]
pub struct Backend {
    pub tables: Arc<dyn TableRepository>,
    pub menu: Arc<dyn MenuCatalog>,
}

impl Backend {
    /// In-memory storage, lost on exit.
    pub fn in_memory() -> Self {
        Self {
            tables: Arc::new(InMemoryTableRepository::new()),
            menu: Arc::new(InMemoryMenuCatalog::new()),
        }
    }

    /// Connects to the configured database and runs migrations, or falls
    /// back to in-memory storage when no database is configured.
    pub async fn connect(config: &Config) -> Result<Self, AppError> {
        let Some(url) = config.database_url.as_deref() else {
            return Ok(Self::in_memory());
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await?;

        let tables = PostgresTableRepository::new(pool.clone());
        tables.run_migrations().await?;
        tracing::info!(max_connections = config.max_connections, "connected to postgres");

        Ok(Self {
            tables: Arc::new(tables),
            menu: Arc::new(PostgresMenuCatalog::new(pool)),
        })
    }
}

/// Outcome of a completed lifecycle run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleSummary {
    pub table_id: Id,
    pub order_id: Id,
    pub preparations: usize,
    /// Sum of the served menu item prices in minor units.
    pub total: i64,
}

/// Seeds the menu, then opens a table, takes an order, serves every
/// preparation and closes the table.
///
/// Each service call gets its own deadline derived from `root`, so
/// cancelling `root` stops the run at the next call.
pub async fn run_lifecycle(
    backend: &Backend,
    root: &Context,
    config: &Config,
) -> Result<LifecycleSummary, AppError> {
    let service = TableService::new(Arc::clone(&backend.tables));
    let call = || root.with_timeout(config.request_timeout);

    let ids = UuidGenerator;
    let menu = [
        MenuItem::new(ids.next_id(), "Tomato soup", 100),
        MenuItem::new(ids.next_id(), "Apple pie", 150),
    ];
    for item in &menu {
        backend
            .menu
            .save_item(&call(), item)
            .await
            .map_err(|err| AppError::domain("seeding menu", err))?;
    }

    let table = service
        .open_table(&call())
        .await
        .map_err(|err| AppError::domain("opening table", err))?;

    let menu_item_ids: Vec<Id> = menu.iter().map(|item| item.id).collect();
    let order = service
        .take_order_from_catalog(&call(), &*backend.menu, table.id, &menu_item_ids)
        .await
        .map_err(|err| AppError::domain("taking order", err))?;

    for preparation in &order.preparations {
        service
            .start_preparation(&call(), preparation.id)
            .await
            .map_err(|err| AppError::domain("starting preparation", err))?;
        service
            .finish_preparation(&call(), preparation.id)
            .await
            .map_err(|err| AppError::domain("finishing preparation", err))?;
        service
            .serve_preparation(&call(), preparation.id)
            .await
            .map_err(|err| AppError::domain("serving preparation", err))?;
    }

    let closed = service
        .close_table(&call(), table.id)
        .await
        .map_err(|err| AppError::domain("closing table", err))?;
    debug_assert_eq!(closed.status, TableStatus::Closed);

    let total = closed.preparations().map(|p| p.menu_item.price).sum();
    tracing::info!(table_id = %closed.id, total, "bill ready");

    Ok(LifecycleSummary {
        table_id: closed.id,
        order_id: order.id,
        preparations: order.preparations.len(),
        total,
    })
}
