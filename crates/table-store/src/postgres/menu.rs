use std::collections::HashMap;

use async_trait::async_trait;
use common::{Context, Id};
use domain::{DomainError, MenuCatalog, MenuItem, Result, ValidationError};
use sqlx::PgPool;
use uuid::Uuid;

use super::rows::MenuItemRow;
use crate::error::SqlxResultExt;

/// Menu catalog stored in the `menu_items` table that preparations
/// reference.
#[derive(Clone)]
pub struct PostgresMenuCatalog {
    pool: PgPool,
}

impl PostgresMenuCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts the item unless its id is taken, in which case the stored row
    /// is returned for comparison.
    async fn insert_or_fetch(&self, item: &MenuItem) -> sqlx::Result<Option<MenuItemRow>> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO menu_items (id, name, price)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(item.price)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted > 0 {
            return Ok(None);
        }

        sqlx::query_as::<_, MenuItemRow>("SELECT id, name, price FROM menu_items WHERE id = $1")
            .bind(item.id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map(Some)
    }
}

#[async_trait]
impl MenuCatalog for PostgresMenuCatalog {
    async fn save_item(&self, ctx: &Context, item: &MenuItem) -> Result<()> {
        ctx.check()?;
        item.validate()?;

        let existing = ctx
            .run(self.insert_or_fetch(item))
            .await?
            .classify(|| format!("saving menu item {}", item.id))?;

        if let Some(row) = existing {
            if MenuItem::from(row) != *item {
                return Err(ValidationError::ConflictingMenuItem { item_id: item.id }.into());
            }
            return Ok(());
        }

        tracing::debug!(item_id = %item.id, "menu item saved");
        Ok(())
    }

    async fn find_item(&self, ctx: &Context, id: Id) -> Result<MenuItem> {
        ctx.check()?;

        let query = sqlx::query_as::<_, MenuItemRow>(
            "SELECT id, name, price FROM menu_items WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_one(&self.pool);

        let row = ctx
            .run(query)
            .await?
            .classify(|| format!("menu item {id}"))?;
        Ok(row.into())
    }

    async fn find_items(&self, ctx: &Context, ids: &[Id]) -> Result<Vec<MenuItem>> {
        ctx.check()?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let uuids: Vec<Uuid> = ids.iter().map(Id::as_uuid).collect();
        let query = sqlx::query_as::<_, MenuItemRow>(
            "SELECT id, name, price FROM menu_items WHERE id = ANY($1)",
        )
        .bind(&uuids[..])
        .fetch_all(&self.pool);

        let found: HashMap<Id, MenuItem> = ctx
            .run(query)
            .await?
            .classify(|| "loading menu items".to_string())?
            .into_iter()
            .map(|row| {
                let item = MenuItem::from(row);
                (item.id, item)
            })
            .collect();

        ids.iter()
            .map(|id| {
                found
                    .get(id)
                    .cloned()
                    .ok_or_else(|| DomainError::not_found(format!("menu item {id} not found")))
            })
            .collect()
    }
}
