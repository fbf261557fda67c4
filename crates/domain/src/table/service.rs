//! Table service driving the aggregate's state machine.

use common::{Context, Id, IdGenerator, UuidGenerator};

use crate::error::Result;
use crate::menu::{MenuCatalog, MenuItem};
use crate::repository::TableRepository;

use super::{Order, OrderStatus, Preparation, Table, TableError, TableStatus};

/// Service for managing tables.
///
/// Every operation reads the aggregate through the repository, applies one
/// transition, validates the result and saves the whole table back. Errors
/// from the repository are forwarded unchanged.
pub struct TableService<R, G = UuidGenerator> {
    repo: R,
    ids: G,
}

impl<R: TableRepository> TableService<R> {
    /// Creates a new table service minting random UUIDs.
    pub fn new(repo: R) -> Self {
        Self::with_id_generator(repo, UuidGenerator)
    }
}

impl<R: TableRepository, G: IdGenerator> TableService<R, G> {
    pub fn with_id_generator(repo: R, ids: G) -> Self {
        Self { repo, ids }
    }

    /// Returns a reference to the underlying repository.
    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Loads a table by id.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn find_table(&self, ctx: &Context, table_id: Id) -> Result<Table> {
        self.repo.find_by_id(ctx, table_id).await
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn find_opened_tables(&self, ctx: &Context) -> Result<Vec<Table>> {
        self.repo.find_by_status(ctx, TableStatus::Opened).await
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn find_closed_tables(&self, ctx: &Context) -> Result<Vec<Table>> {
        self.repo.find_by_status(ctx, TableStatus::Closed).await
    }

    /// Opens a new table with no orders and saves it immediately.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn open_table(&self, ctx: &Context) -> Result<Table> {
        let table = Table::open(self.ids.next_id());
        self.persist(ctx, &table).await?;

        metrics::counter!("tables_opened_total").increment(1);
        tracing::info!(table_id = %table.id, "table opened");
        Ok(table)
    }

    /// Closes a table once every order is done or aborted.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn close_table(&self, ctx: &Context, table_id: Id) -> Result<Table> {
        let mut table = self.repo.find_by_id(ctx, table_id).await?;
        table
            .close()
            .inspect_err(|err| tracing::warn!(%err, "close rejected"))?;
        self.persist(ctx, &table).await?;

        metrics::counter!("tables_closed_total").increment(1);
        tracing::info!(%table_id, orders = table.orders.len(), "table closed");
        Ok(table)
    }

    /// Takes a new order with one pending preparation per menu item.
    #[tracing::instrument(skip(self, ctx, menu_items), fields(items = menu_items.len()))]
    pub async fn take_order(
        &self,
        ctx: &Context,
        table_id: Id,
        menu_items: &[MenuItem],
    ) -> Result<Order> {
        if menu_items.is_empty() {
            return Err(TableError::NoMenuItems.into());
        }
        for item in menu_items {
            item.validate().map_err(TableError::InvalidMenuItem)?;
        }

        let mut table = self.repo.find_by_id(ctx, table_id).await?;

        let preparations = menu_items
            .iter()
            .map(|item| Preparation::pending(self.ids.next_id(), item.clone()))
            .collect();
        let order = Order::taken(self.ids.next_id(), preparations);

        table
            .take_order(order.clone())
            .inspect_err(|err| tracing::warn!(%err, "order rejected"))?;
        self.persist(ctx, &table).await?;

        metrics::counter!("orders_taken_total").increment(1);
        tracing::info!(%table_id, order_id = %order.id, "order taken");
        Ok(order)
    }

    /// Resolves menu item ids through the catalog, then takes the order.
    #[tracing::instrument(skip(self, ctx, catalog, menu_item_ids), fields(items = menu_item_ids.len()))]
    pub async fn take_order_from_catalog<C: MenuCatalog + ?Sized>(
        &self,
        ctx: &Context,
        catalog: &C,
        table_id: Id,
        menu_item_ids: &[Id],
    ) -> Result<Order> {
        if menu_item_ids.is_empty() {
            return Err(TableError::NoMenuItems.into());
        }

        let items = catalog.find_items(ctx, menu_item_ids).await?;
        self.take_order(ctx, table_id, &items).await
    }

    /// Moves a pending preparation to in progress.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn start_preparation(&self, ctx: &Context, preparation_id: Id) -> Result<Table> {
        let (table, ()) = self
            .update_preparation(ctx, preparation_id, |table| {
                table.start_preparation(preparation_id)
            })
            .await?;
        Ok(table)
    }

    /// Moves an in-progress preparation to ready.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn finish_preparation(&self, ctx: &Context, preparation_id: Id) -> Result<Table> {
        let (table, ()) = self
            .update_preparation(ctx, preparation_id, |table| {
                table.finish_preparation(preparation_id)
            })
            .await?;
        Ok(table)
    }

    /// Serves a ready preparation. The owning order becomes done when this
    /// was its last unserved preparation.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn serve_preparation(&self, ctx: &Context, preparation_id: Id) -> Result<Table> {
        let (table, order_status) = self
            .update_preparation(ctx, preparation_id, |table| {
                table.serve_preparation(preparation_id)
            })
            .await?;

        if order_status == OrderStatus::Done {
            metrics::counter!("orders_done_total").increment(1);
            tracing::info!(table_id = %table.id, "order done");
        }
        Ok(table)
    }

    /// Aborts a pending or in-progress preparation. The owning order becomes
    /// aborted when every preparation in it is aborted.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn abort_preparation(&self, ctx: &Context, preparation_id: Id) -> Result<Table> {
        let (table, order_status) = self
            .update_preparation(ctx, preparation_id, |table| {
                table.abort_preparation(preparation_id)
            })
            .await?;

        metrics::counter!("preparations_aborted_total").increment(1);
        if order_status == OrderStatus::Aborted {
            tracing::info!(table_id = %table.id, "order aborted");
        }
        Ok(table)
    }

    /// Aborts a taken order and all of its preparations.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn abort_order(&self, ctx: &Context, order_id: Id) -> Result<Table> {
        let mut table = self.repo.find_by_order_id(ctx, order_id).await?;
        let aborted = table
            .abort_order(order_id)
            .inspect_err(|err| tracing::warn!(%err, "abort rejected"))?;
        self.persist(ctx, &table).await?;

        metrics::counter!("preparations_aborted_total").increment(aborted as u64);
        tracing::info!(table_id = %table.id, %order_id, aborted, "order aborted");
        Ok(table)
    }

    async fn update_preparation<F, T>(
        &self,
        ctx: &Context,
        preparation_id: Id,
        transition: F,
    ) -> Result<(Table, T)>
    where
        F: FnOnce(&mut Table) -> Result<T, TableError>,
    {
        let mut table = self.repo.find_by_preparation_id(ctx, preparation_id).await?;
        let outcome = transition(&mut table)
            .inspect_err(|err| tracing::warn!(%err, "preparation transition rejected"))?;
        self.persist(ctx, &table).await?;
        Ok((table, outcome))
    }

    async fn persist(&self, ctx: &Context, table: &Table) -> Result<()> {
        table.validate()?;
        self.repo.save(ctx, table).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use common::SequentialIdGenerator;

    use super::*;
    use crate::error::{DomainError, ErrorKind};
    use crate::table::PreparationStatus;

    /// Map-backed repository, enough to drive the service in isolation.
    #[derive(Default)]
    struct MapRepository {
        tables: Mutex<HashMap<Id, Table>>,
    }

    #[async_trait]
    impl TableRepository for MapRepository {
        async fn save(&self, ctx: &Context, table: &Table) -> Result<()> {
            ctx.check()?;
            table.validate()?;
            self.tables.lock().unwrap().insert(table.id, table.clone());
            Ok(())
        }

        async fn find_by_id(&self, ctx: &Context, id: Id) -> Result<Table> {
            ctx.check()?;
            self.tables
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or_else(|| DomainError::not_found(format!("table {id} not found")))
        }

        async fn find_by_status(&self, ctx: &Context, status: TableStatus) -> Result<Vec<Table>> {
            ctx.check()?;
            Ok(self
                .tables
                .lock()
                .unwrap()
                .values()
                .filter(|t| t.status == status)
                .cloned()
                .collect())
        }

        async fn find_by_preparation_id(&self, ctx: &Context, preparation_id: Id) -> Result<Table> {
            ctx.check()?;
            self.tables
                .lock()
                .unwrap()
                .values()
                .find(|t| t.owns_preparation(preparation_id))
                .cloned()
                .ok_or_else(|| DomainError::not_found("preparation not found"))
        }

        async fn find_by_order_id(&self, ctx: &Context, order_id: Id) -> Result<Table> {
            ctx.check()?;
            self.tables
                .lock()
                .unwrap()
                .values()
                .find(|t| t.owns_order(order_id))
                .cloned()
                .ok_or_else(|| DomainError::not_found("order not found"))
        }
    }

    /// Repository whose every call fails with a storage error.
    struct BrokenRepository;

    #[async_trait]
    impl TableRepository for BrokenRepository {
        async fn save(&self, _ctx: &Context, _table: &Table) -> Result<()> {
            Err(DomainError::storage("saving table", "disk full"))
        }

        async fn find_by_id(&self, _ctx: &Context, _id: Id) -> Result<Table> {
            Err(DomainError::storage("loading table", "disk full"))
        }

        async fn find_by_status(&self, _ctx: &Context, _status: TableStatus) -> Result<Vec<Table>> {
            Err(DomainError::storage("listing tables", "disk full"))
        }

        async fn find_by_preparation_id(&self, _ctx: &Context, _id: Id) -> Result<Table> {
            Err(DomainError::storage("loading table", "disk full"))
        }

        async fn find_by_order_id(&self, _ctx: &Context, _id: Id) -> Result<Table> {
            Err(DomainError::storage("loading table", "disk full"))
        }
    }

    struct FixedCatalog(Vec<MenuItem>);

    #[async_trait]
    impl MenuCatalog for FixedCatalog {
        async fn save_item(&self, _ctx: &Context, _item: &MenuItem) -> Result<()> {
            unimplemented!("read-only catalog")
        }

        async fn find_item(&self, _ctx: &Context, id: Id) -> Result<MenuItem> {
            self.0
                .iter()
                .find(|item| item.id == id)
                .cloned()
                .ok_or_else(|| DomainError::not_found(format!("menu item {id} not found")))
        }

        async fn find_items(&self, ctx: &Context, ids: &[Id]) -> Result<Vec<MenuItem>> {
            let mut items = Vec::with_capacity(ids.len());
            for id in ids {
                items.push(self.find_item(ctx, *id).await?);
            }
            Ok(items)
        }
    }

    fn create_service() -> TableService<MapRepository, SequentialIdGenerator> {
        TableService::with_id_generator(MapRepository::default(), SequentialIdGenerator::new())
    }

    fn menu_item(name: &str, price: i64) -> MenuItem {
        MenuItem::new(UuidGenerator.next_id(), name, price)
    }

    #[tokio::test]
    async fn test_open_table() {
        let service = create_service();
        let ctx = Context::background();

        let table = service.open_table(&ctx).await.unwrap();

        assert!(!table.id.is_nil());
        assert_eq!(table.status, TableStatus::Opened);
        assert!(table.orders.is_empty());
        assert_eq!(service.find_table(&ctx, table.id).await.unwrap(), table);
    }

    #[tokio::test]
    async fn test_find_opened_and_closed_tables() {
        let service = create_service();
        let ctx = Context::background();

        let open = service.open_table(&ctx).await.unwrap();
        let closed = service.open_table(&ctx).await.unwrap();
        service.close_table(&ctx, closed.id).await.unwrap();

        let opened = service.find_opened_tables(&ctx).await.unwrap();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].id, open.id);

        let closed_tables = service.find_closed_tables(&ctx).await.unwrap();
        assert_eq!(closed_tables.len(), 1);
        assert_eq!(closed_tables[0].id, closed.id);
    }

    #[tokio::test]
    async fn test_take_order() {
        let service = create_service();
        let ctx = Context::background();
        let table = service.open_table(&ctx).await.unwrap();
        let soup = menu_item("Soup", 450);

        let order = service
            .take_order(&ctx, table.id, std::slice::from_ref(&soup))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Taken);
        assert_eq!(order.preparations.len(), 1);
        assert_eq!(order.preparations[0].menu_item, soup);
        assert_eq!(order.preparations[0].status, PreparationStatus::Pending);

        let stored = service.find_table(&ctx, table.id).await.unwrap();
        assert_eq!(stored.orders, vec![order]);
    }

    #[tokio::test]
    async fn test_take_order_rejects_bad_input() {
        let service = create_service();
        let ctx = Context::background();
        let table = service.open_table(&ctx).await.unwrap();

        let err = service.take_order(&ctx, table.id, &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);

        let err = service
            .take_order(&ctx, table.id, &[menu_item("", 100)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);

        let err = service
            .take_order(&ctx, table.id, &[menu_item("Soup", -5)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[tokio::test]
    async fn test_take_order_on_missing_or_closed_table() {
        let service = create_service();
        let ctx = Context::background();

        let err = service
            .take_order(&ctx, UuidGenerator.next_id(), &[menu_item("Soup", 450)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let table = service.open_table(&ctx).await.unwrap();
        service.close_table(&ctx, table.id).await.unwrap();
        let err = service
            .take_order(&ctx, table.id, &[menu_item("Soup", 450)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[tokio::test]
    async fn test_take_order_from_catalog() {
        let service = create_service();
        let ctx = Context::background();
        let table = service.open_table(&ctx).await.unwrap();
        let soup = menu_item("Soup", 450);
        let bread = menu_item("Bread", 150);
        let catalog = FixedCatalog(vec![soup.clone(), bread.clone()]);

        let order = service
            .take_order_from_catalog(&ctx, &catalog, table.id, &[bread.id, soup.id])
            .await
            .unwrap();
        assert_eq!(order.preparations[0].menu_item, bread);
        assert_eq!(order.preparations[1].menu_item, soup);

        let err = service
            .take_order_from_catalog(&ctx, &catalog, table.id, &[UuidGenerator.next_id()])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = service
            .take_order_from_catalog(&ctx, &catalog, table.id, &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[tokio::test]
    async fn test_start_preparation_requires_pending() {
        let service = create_service();
        let ctx = Context::background();
        let table = service.open_table(&ctx).await.unwrap();
        let order = service
            .take_order(&ctx, table.id, &[menu_item("Soup", 450)])
            .await
            .unwrap();
        let prep_id = order.preparations[0].id;

        let table = service.start_preparation(&ctx, prep_id).await.unwrap();
        assert_eq!(
            table.preparation(prep_id).unwrap().status,
            PreparationStatus::InProgress
        );

        let err = service.start_preparation(&ctx, prep_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);

        let err = service
            .start_preparation(&ctx, UuidGenerator.next_id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_finish_preparation_requires_in_progress() {
        let service = create_service();
        let ctx = Context::background();
        let table = service.open_table(&ctx).await.unwrap();
        let order = service
            .take_order(&ctx, table.id, &[menu_item("Soup", 450)])
            .await
            .unwrap();
        let prep_id = order.preparations[0].id;

        let err = service.finish_preparation(&ctx, prep_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);

        service.start_preparation(&ctx, prep_id).await.unwrap();
        let table = service.finish_preparation(&ctx, prep_id).await.unwrap();
        assert_eq!(
            table.preparation(prep_id).unwrap().status,
            PreparationStatus::Ready
        );
    }

    #[tokio::test]
    async fn test_serving_last_preparation_completes_order() {
        let service = create_service();
        let ctx = Context::background();
        let table = service.open_table(&ctx).await.unwrap();
        let order = service
            .take_order(
                &ctx,
                table.id,
                &[menu_item("Soup", 450), menu_item("Bread", 150)],
            )
            .await
            .unwrap();
        let first = order.preparations[0].id;
        let second = order.preparations[1].id;

        for prep_id in [first, second] {
            service.start_preparation(&ctx, prep_id).await.unwrap();
            service.finish_preparation(&ctx, prep_id).await.unwrap();
        }

        let table = service.serve_preparation(&ctx, first).await.unwrap();
        assert_eq!(table.order(order.id).unwrap().status, OrderStatus::Taken);

        let table = service.serve_preparation(&ctx, second).await.unwrap();
        assert_eq!(table.order(order.id).unwrap().status, OrderStatus::Done);

        let stored = service.find_table(&ctx, table.id).await.unwrap();
        assert_eq!(stored, table);
    }

    #[tokio::test]
    async fn test_close_table_rules() {
        let service = create_service();
        let ctx = Context::background();
        let table = service.open_table(&ctx).await.unwrap();
        let order = service
            .take_order(&ctx, table.id, &[menu_item("Soup", 450)])
            .await
            .unwrap();

        let err = service.close_table(&ctx, table.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);

        service.abort_order(&ctx, order.id).await.unwrap();
        let closed = service.close_table(&ctx, table.id).await.unwrap();
        assert_eq!(closed.status, TableStatus::Closed);

        let err = service.close_table(&ctx, table.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);

        let err = service
            .close_table(&ctx, UuidGenerator.next_id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_abort_preparation() {
        let service = create_service();
        let ctx = Context::background();
        let table = service.open_table(&ctx).await.unwrap();
        let order = service
            .take_order(&ctx, table.id, &[menu_item("Soup", 450)])
            .await
            .unwrap();
        let prep_id = order.preparations[0].id;

        let table = service.abort_preparation(&ctx, prep_id).await.unwrap();
        assert_eq!(table.order(order.id).unwrap().status, OrderStatus::Aborted);

        let err = service.abort_preparation(&ctx, prep_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[tokio::test]
    async fn test_abort_unknown_order_is_not_found() {
        let service = create_service();
        let ctx = Context::background();

        let err = service
            .abort_order(&ctx, UuidGenerator.next_id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_cancelled_context_is_reported_as_canceled() {
        let service = create_service();
        let ctx = Context::background();
        ctx.cancel();

        let err = service.open_table(&ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Canceled);
        assert!(service.repository().tables.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_storage_errors_are_forwarded_unchanged() {
        let service = TableService::new(BrokenRepository);
        let ctx = Context::background();

        let err = service.open_table(&ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.to_string(), "saving table: disk full");

        let err = service
            .start_preparation(&ctx, UuidGenerator.next_id())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }
}
