use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use common::{Context, Id};
use domain::{
    DomainError, MenuCatalog, MenuItem, Result, Table, TableRepository, TableStatus, ValidationError,
};
use tokio::sync::Mutex;

/// In-memory table repository.
///
/// Aggregates are stored whole, keyed by table id, behind a single lock.
/// Every read hands out a copy, so callers can never mutate the store
/// directly. Two read-modify-write sequences on the same table can still
/// race; the last `save` wins.
#[derive(Clone, Default)]
pub struct InMemoryTableRepository {
    tables: Arc<Mutex<BTreeMap<Id, Table>>>,
}

impl InMemoryTableRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored tables.
    pub async fn table_count(&self) -> usize {
        self.tables.lock().await.len()
    }

    /// Removes every table.
    pub async fn clear(&self) {
        self.tables.lock().await.clear();
    }

    async fn find_owner(
        &self,
        ctx: &Context,
        owns: impl Fn(&Table) -> bool,
        missing: impl FnOnce() -> DomainError,
    ) -> Result<Table> {
        ctx.check()?;

        let tables = self.tables.lock().await;
        tables
            .values()
            .find(|table| owns(table))
            .cloned()
            .ok_or_else(missing)
    }
}

#[async_trait]
impl TableRepository for InMemoryTableRepository {
    async fn save(&self, ctx: &Context, table: &Table) -> Result<()> {
        ctx.check()?;
        table.validate()?;

        self.tables.lock().await.insert(table.id, table.clone());

        metrics::counter!("table_store_saves_total", "backend" => "memory").increment(1);
        tracing::debug!(table_id = %table.id, status = %table.status, "table saved");
        Ok(())
    }

    async fn find_by_id(&self, ctx: &Context, id: Id) -> Result<Table> {
        ctx.check()?;

        let tables = self.tables.lock().await;
        tables
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("table {id} not found")))
    }

    async fn find_by_status(&self, ctx: &Context, status: TableStatus) -> Result<Vec<Table>> {
        ctx.check()?;

        let tables = self.tables.lock().await;
        Ok(tables
            .values()
            .filter(|table| table.status == status)
            .cloned()
            .collect())
    }

    async fn find_by_preparation_id(&self, ctx: &Context, preparation_id: Id) -> Result<Table> {
        self.find_owner(
            ctx,
            |table| table.owns_preparation(preparation_id),
            || DomainError::not_found(format!("table with preparation {preparation_id} not found")),
        )
        .await
    }

    async fn find_by_order_id(&self, ctx: &Context, order_id: Id) -> Result<Table> {
        self.find_owner(
            ctx,
            |table| table.owns_order(order_id),
            || DomainError::not_found(format!("table with order {order_id} not found")),
        )
        .await
    }
}

/// In-memory menu catalog.
#[derive(Clone, Default)]
pub struct InMemoryMenuCatalog {
    items: Arc<Mutex<HashMap<Id, MenuItem>>>,
}

impl InMemoryMenuCatalog {
    /// Creates a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog pre-filled with `items`.
    ///
    /// Invalid items are skipped with a warning.
    pub fn with_items(items: impl IntoIterator<Item = MenuItem>) -> Self {
        let items = items
            .into_iter()
            .filter(|item| match item.validate() {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(item_id = %item.id, %err, "skipping invalid menu item");
                    false
                }
            })
            .map(|item| (item.id, item))
            .collect();

        Self {
            items: Arc::new(Mutex::new(items)),
        }
    }
}

#[async_trait]
impl MenuCatalog for InMemoryMenuCatalog {
    async fn save_item(&self, ctx: &Context, item: &MenuItem) -> Result<()> {
        ctx.check()?;
        item.validate()?;

        let mut items = self.items.lock().await;
        match items.get(&item.id) {
            Some(existing) if existing == item => Ok(()),
            Some(_) => Err(ValidationError::ConflictingMenuItem { item_id: item.id }.into()),
            None => {
                items.insert(item.id, item.clone());
                Ok(())
            }
        }
    }

    async fn find_item(&self, ctx: &Context, id: Id) -> Result<MenuItem> {
        ctx.check()?;

        let items = self.items.lock().await;
        items
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("menu item {id} not found")))
    }

    async fn find_items(&self, ctx: &Context, ids: &[Id]) -> Result<Vec<MenuItem>> {
        ctx.check()?;

        let items = self.items.lock().await;
        ids.iter()
            .map(|id| {
                items
                    .get(id)
                    .cloned()
                    .ok_or_else(|| DomainError::not_found(format!("menu item {id} not found")))
            })
            .collect()
    }
}
