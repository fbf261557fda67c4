//! Storage contract for the table aggregate.

use std::sync::Arc;

use async_trait::async_trait;
use common::{Context, Id};

use crate::error::Result;
use crate::table::{Table, TableStatus};

/// Persistence for whole table aggregates.
///
/// Implementations must:
/// - check the context before doing any work and report cancellation as
///   `Canceled`, never as a generic failure
/// - validate the aggregate on every `save` and reject invalid ones with
///   `Invalid` without writing anything
/// - apply a `save` atomically: either the whole tree is replaced or nothing
///   changes
///
/// There is no optimistic concurrency check; the last `save` for a given
/// table id wins.
#[async_trait]
pub trait TableRepository: Send + Sync {
    /// Inserts the table or fully replaces its orders and preparations.
    async fn save(&self, ctx: &Context, table: &Table) -> Result<()>;

    /// Fails `NotFound` if no table has this id.
    async fn find_by_id(&self, ctx: &Context, id: Id) -> Result<Table>;

    /// All tables with the given top-level status. Empty when none match.
    async fn find_by_status(&self, ctx: &Context, status: TableStatus) -> Result<Vec<Table>>;

    /// The table that owns the given preparation. Fails `NotFound` otherwise.
    async fn find_by_preparation_id(&self, ctx: &Context, preparation_id: Id) -> Result<Table>;

    /// The table that owns the given order. Fails `NotFound` otherwise.
    async fn find_by_order_id(&self, ctx: &Context, order_id: Id) -> Result<Table>;
}

#[async_trait]
impl<T: TableRepository + ?Sized> TableRepository for Arc<T> {
    async fn save(&self, ctx: &Context, table: &Table) -> Result<()> {
        (**self).save(ctx, table).await
    }

    async fn find_by_id(&self, ctx: &Context, id: Id) -> Result<Table> {
        (**self).find_by_id(ctx, id).await
    }

    async fn find_by_status(&self, ctx: &Context, status: TableStatus) -> Result<Vec<Table>> {
        (**self).find_by_status(ctx, status).await
    }

    async fn find_by_preparation_id(&self, ctx: &Context, preparation_id: Id) -> Result<Table> {
        (**self).find_by_preparation_id(ctx, preparation_id).await
    }

    async fn find_by_order_id(&self, ctx: &Context, order_id: Id) -> Result<Table> {
        (**self).find_by_order_id(ctx, order_id).await
    }
}
