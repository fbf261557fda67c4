//! Row shapes for the normalized schema and their mapping back into the
//! aggregate.

use std::collections::HashMap;

use common::Id;
use domain::{
    DomainError, MenuItem, Order, OrderStatus, Preparation, PreparationStatus, Result, Table,
    TableStatus,
};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::error::SqlxResultExt;

#[derive(Debug, FromRow)]
pub(super) struct TableRow {
    pub id: Uuid,
    pub status: String,
}

#[derive(Debug, FromRow)]
pub(super) struct OrderRow {
    pub id: Uuid,
    pub table_id: Uuid,
    pub status: String,
}

#[derive(Debug, FromRow)]
pub(super) struct PreparationRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub menu_item_id: Uuid,
    pub status: String,
}

#[derive(Debug, FromRow)]
pub(super) struct MenuItemRow {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
}

impl From<MenuItemRow> for MenuItem {
    fn from(row: MenuItemRow) -> Self {
        MenuItem::new(Id::from_uuid(row.id), row.name, row.price)
    }
}

fn corrupt(entity: &str, id: Uuid, err: impl std::error::Error + Send + Sync + 'static) -> DomainError {
    DomainError::storage(format!("decoding {entity} {id}"), err)
}

impl TableRow {
    fn into_table(self, orders: Vec<Order>) -> Result<Table> {
        let status: TableStatus = self
            .status
            .parse()
            .map_err(|err| corrupt("table", self.id, err))?;

        Ok(Table {
            id: Id::from_uuid(self.id),
            status,
            orders,
        })
    }
}

impl OrderRow {
    fn into_order(self, preparations: Vec<Preparation>) -> Result<Order> {
        let status: OrderStatus = self
            .status
            .parse()
            .map_err(|err| corrupt("order", self.id, err))?;

        Ok(Order {
            id: Id::from_uuid(self.id),
            status,
            preparations,
        })
    }
}

impl PreparationRow {
    fn into_preparation(self, menu_item: MenuItem) -> Result<Preparation> {
        let status: PreparationStatus = self
            .status
            .parse()
            .map_err(|err| corrupt("preparation", self.id, err))?;

        Ok(Preparation {
            id: Id::from_uuid(self.id),
            menu_item,
            status,
        })
    }
}

/// Loads the orders, preparations and menu items under `tables` and
/// rebuilds each aggregate, keeping the input order of `tables`.
///
/// Must run on the same connection (and transaction) that produced `tables`
/// so that every row comes from one snapshot.
pub(super) async fn assemble(
    conn: &mut PgConnection,
    tables: Vec<TableRow>,
    context: &str,
) -> Result<Vec<Table>> {
    if tables.is_empty() {
        return Ok(Vec::new());
    }

    let table_ids: Vec<Uuid> = tables.iter().map(|row| row.id).collect();
    let orders: Vec<OrderRow> = sqlx::query_as(
        r#"
        SELECT id, table_id, status
        FROM orders
        WHERE table_id = ANY($1)
        ORDER BY table_id, position
        "#,
    )
    .bind(&table_ids[..])
    .fetch_all(&mut *conn)
    .await
    .classify(|| format!("{context}: loading orders"))?;

    let order_ids: Vec<Uuid> = orders.iter().map(|row| row.id).collect();
    let preparations: Vec<PreparationRow> = if order_ids.is_empty() {
        Vec::new()
    } else {
        sqlx::query_as(
            r#"
            SELECT id, order_id, menu_item_id, status
            FROM preparations
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            "#,
        )
        .bind(&order_ids[..])
        .fetch_all(&mut *conn)
        .await
        .classify(|| format!("{context}: loading preparations"))?
    };

    let mut menu_item_ids: Vec<Uuid> = preparations.iter().map(|row| row.menu_item_id).collect();
    menu_item_ids.sort_unstable();
    menu_item_ids.dedup();

    let menu_items: HashMap<Uuid, MenuItem> = if menu_item_ids.is_empty() {
        HashMap::new()
    } else {
        sqlx::query_as::<_, MenuItemRow>("SELECT id, name, price FROM menu_items WHERE id = ANY($1)")
            .bind(&menu_item_ids[..])
            .fetch_all(&mut *conn)
            .await
            .classify(|| format!("{context}: loading menu items"))?
            .into_iter()
            .map(|row| (row.id, MenuItem::from(row)))
            .collect()
    };

    let mut preparations_by_order: HashMap<Uuid, Vec<Preparation>> = HashMap::new();
    for row in preparations {
        let menu_item = menu_items.get(&row.menu_item_id).cloned().ok_or_else(|| {
            DomainError::storage(
                context,
                format!("preparation {} references missing menu item {}", row.id, row.menu_item_id),
            )
        })?;
        preparations_by_order
            .entry(row.order_id)
            .or_default()
            .push(row.into_preparation(menu_item)?);
    }

    let mut orders_by_table: HashMap<Uuid, Vec<Order>> = HashMap::new();
    for row in orders {
        let preparations = preparations_by_order.remove(&row.id).unwrap_or_default();
        orders_by_table
            .entry(row.table_id)
            .or_default()
            .push(row.into_order(preparations)?);
    }

    tables
        .into_iter()
        .map(|row| {
            let orders = orders_by_table.remove(&row.id).unwrap_or_default();
            row.into_table(orders)
        })
        .collect()
}
