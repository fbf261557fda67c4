//! PostgreSQL backend.
//!
//! One aggregate is spread over `tables`, `orders` and `preparations`, with
//! preparations referencing the catalog's `menu_items` rows. Every call runs
//! in its own short transaction; reads use a repeatable-read snapshot so a
//! concurrent `save` is never observed half-applied.

mod menu;
mod rows;

use std::collections::HashMap;

use async_trait::async_trait;
use common::{Context, Id};
use domain::{
    DomainError, MenuItem, Preparation, Result, Table, TableRepository, TableStatus,
    ValidationError,
};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

pub use menu::PostgresMenuCatalog;

use crate::error::SqlxResultExt;
use rows::{MenuItemRow, TableRow};

/// Rows per multi-row insert; keeps every statement well below the
/// protocol's bind parameter limit.
const ROWS_PER_INSERT: usize = 1000;

/// PostgreSQL-backed table repository.
#[derive(Clone)]
pub struct PostgresTableRepository {
    pool: PgPool,
}

impl PostgresTableRepository {
    /// Creates a new repository over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    async fn begin_read(&self) -> sqlx::Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    async fn write_table(&self, table: &Table) -> Result<()> {
        let table_id = table.id;
        let context = || format!("saving table {table_id}");

        let mut tx = self.pool.begin().await.classify(context)?;

        check_menu_items(&mut *tx, table, &context()).await?;

        sqlx::query(
            r#"
            INSERT INTO tables (id, status)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status
            "#,
        )
        .bind(table_id.as_uuid())
        .bind(table.status.as_str())
        .execute(&mut *tx)
        .await
        .classify(context)?;

        upsert_orders(&mut *tx, table).await.classify(context)?;
        upsert_preparations(&mut *tx, table).await.classify(context)?;
        prune(&mut *tx, table).await.classify(context)?;

        tx.commit().await.classify(context)?;
        Ok(())
    }

    /// Loads every table selected by `sql`, which must return `id, status`
    /// rows and bind at most the single parameter `param`.
    async fn read_tables(
        &self,
        sql: &'static str,
        param: Option<Param>,
        context: String,
    ) -> Result<Vec<Table>> {
        let mut tx = self.begin_read().await.classify(|| context.clone())?;

        let query = sqlx::query_as::<_, TableRow>(sql);
        let query = match param {
            Some(Param::Id(id)) => query.bind(id.as_uuid()),
            Some(Param::Status(status)) => query.bind(status.as_str()),
            None => query,
        };
        let rows = query
            .fetch_all(&mut *tx)
            .await
            .classify(|| context.clone())?;

        let tables = rows::assemble(&mut *tx, rows, &context).await?;
        tx.commit().await.classify(|| context.clone())?;
        Ok(tables)
    }

    async fn read_one(
        &self,
        ctx: &Context,
        sql: &'static str,
        id: Id,
        context: String,
    ) -> Result<Table> {
        let tables = ctx
            .run(self.read_tables(sql, Some(Param::Id(id)), context.clone()))
            .await??;

        tables
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::not_found(format!("{context}: not found")))
    }
}

enum Param {
    Id(Id),
    Status(TableStatus),
}

/// Rejects preparations whose embedded menu item is missing from the
/// catalog or differs from the catalog row with the same id.
async fn check_menu_items(conn: &mut PgConnection, table: &Table, context: &str) -> Result<()> {
    let embedded: HashMap<Uuid, &MenuItem> = table
        .preparations()
        .map(|preparation| (preparation.menu_item.id.as_uuid(), &preparation.menu_item))
        .collect();
    if embedded.is_empty() {
        return Ok(());
    }

    let ids: Vec<Uuid> = embedded.keys().copied().collect();
    let stored: HashMap<Uuid, MenuItem> =
        sqlx::query_as::<_, MenuItemRow>("SELECT id, name, price FROM menu_items WHERE id = ANY($1)")
            .bind(&ids[..])
            .fetch_all(&mut *conn)
            .await
            .classify(|| format!("{context}: loading menu items"))?
            .into_iter()
            .map(|row| (row.id, MenuItem::from(row)))
            .collect();

    for (id, item) in embedded {
        match stored.get(&id) {
            Some(row) if row == item => {}
            Some(_) => {
                return Err(ValidationError::ConflictingMenuItem { item_id: item.id }.into());
            }
            None => {
                return Err(DomainError::invalid(format!(
                    "{context}: menu item {id} is not in the catalog"
                )));
            }
        }
    }

    Ok(())
}

async fn upsert_orders(conn: &mut PgConnection, table: &Table) -> sqlx::Result<()> {
    let rows: Vec<_> = table.orders.iter().enumerate().collect();

    for chunk in rows.chunks(ROWS_PER_INSERT) {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO orders (id, table_id, status, position) ");
        builder.push_values(chunk, |mut row, (position, order)| {
            row.push_bind(order.id.as_uuid())
                .push_bind(table.id.as_uuid())
                .push_bind(order.status.as_str())
                .push_bind(*position as i32);
        });
        builder.push(
            " ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, position = EXCLUDED.position",
        );
        builder.build().execute(&mut *conn).await?;
    }

    Ok(())
}

async fn upsert_preparations(conn: &mut PgConnection, table: &Table) -> sqlx::Result<()> {
    let rows: Vec<(Id, usize, &Preparation)> = table
        .orders
        .iter()
        .flat_map(|order| {
            order
                .preparations
                .iter()
                .enumerate()
                .map(move |(position, preparation)| (order.id, position, preparation))
        })
        .collect();

    for chunk in rows.chunks(ROWS_PER_INSERT) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO preparations (id, order_id, menu_item_id, status, position) ",
        );
        builder.push_values(chunk, |mut row, (order_id, position, preparation)| {
            row.push_bind(preparation.id.as_uuid())
                .push_bind(order_id.as_uuid())
                .push_bind(preparation.menu_item.id.as_uuid())
                .push_bind(preparation.status.as_str())
                .push_bind(*position as i32);
        });
        builder.push(
            " ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, position = EXCLUDED.position",
        );
        builder.build().execute(&mut *conn).await?;
    }

    Ok(())
}

/// Removes orders and preparations that are no longer part of the aggregate.
async fn prune(conn: &mut PgConnection, table: &Table) -> sqlx::Result<()> {
    let order_ids: Vec<Uuid> = table.orders.iter().map(|order| order.id.as_uuid()).collect();
    let preparation_ids: Vec<Uuid> = table
        .preparations()
        .map(|preparation| preparation.id.as_uuid())
        .collect();

    sqlx::query(
        r#"
        DELETE FROM preparations p
        USING orders o
        WHERE p.order_id = o.id AND o.table_id = $1 AND NOT (p.id = ANY($2))
        "#,
    )
    .bind(table.id.as_uuid())
    .bind(&preparation_ids[..])
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM orders WHERE table_id = $1 AND NOT (id = ANY($2))")
        .bind(table.id.as_uuid())
        .bind(&order_ids[..])
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[async_trait]
impl TableRepository for PostgresTableRepository {
    async fn save(&self, ctx: &Context, table: &Table) -> Result<()> {
        ctx.check()?;
        table.validate()?;

        // Dropping the transaction on cancellation rolls it back.
        ctx.run(self.write_table(table)).await??;

        metrics::counter!("table_store_saves_total", "backend" => "postgres").increment(1);
        tracing::debug!(table_id = %table.id, status = %table.status, "table saved");
        Ok(())
    }

    async fn find_by_id(&self, ctx: &Context, id: Id) -> Result<Table> {
        ctx.check()?;
        self.read_one(
            ctx,
            "SELECT id, status FROM tables WHERE id = $1",
            id,
            format!("loading table {id}"),
        )
        .await
    }

    async fn find_by_status(&self, ctx: &Context, status: TableStatus) -> Result<Vec<Table>> {
        ctx.check()?;
        ctx.run(self.read_tables(
            "SELECT id, status FROM tables WHERE status = $1 ORDER BY id",
            Some(Param::Status(status)),
            format!("loading {status} tables"),
        ))
        .await?
    }

    async fn find_by_preparation_id(&self, ctx: &Context, preparation_id: Id) -> Result<Table> {
        ctx.check()?;
        self.read_one(
            ctx,
            r#"
            SELECT t.id, t.status
            FROM tables t
            JOIN orders o ON o.table_id = t.id
            JOIN preparations p ON p.order_id = o.id
            WHERE p.id = $1
            "#,
            preparation_id,
            format!("loading table with preparation {preparation_id}"),
        )
        .await
    }

    async fn find_by_order_id(&self, ctx: &Context, order_id: Id) -> Result<Table> {
        ctx.check()?;
        self.read_one(
            ctx,
            r#"
            SELECT t.id, t.status
            FROM tables t
            JOIN orders o ON o.table_id = t.id
            WHERE o.id = $1
            "#,
            order_id,
            format!("loading table with order {order_id}"),
        )
        .await
    }
}
