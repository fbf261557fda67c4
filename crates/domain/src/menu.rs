//! Menu items and the catalog that owns them.

use std::sync::Arc;

use async_trait::async_trait;
use common::{Context, Id};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::table::ValidationError;

/// A dish or drink that can be ordered.
///
/// Owned by the menu catalog; preparations embed a copy by value and never
/// change it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: Id,
    pub name: String,
    /// Price in minor currency units.
    pub price: i64,
}

impl MenuItem {
    pub fn new(id: Id, name: impl Into<String>, price: i64) -> Self {
        Self {
            id,
            name: name.into(),
            price,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_nil() {
            return Err(ValidationError::NilId {
                entity: "menu item",
            });
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyMenuItemName { item_id: self.id });
        }
        if self.price < 0 {
            return Err(ValidationError::NegativePrice {
                item_id: self.id,
                price: self.price,
            });
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Lookup side of the menu catalog.
///
/// The catalog itself is managed elsewhere; the table service only needs to
/// resolve ids into validated items and, for relational storage, make sure
/// the referenced rows exist.
#[async_trait]
pub trait MenuCatalog: Send + Sync {
    /// Inserts a menu item.
    ///
    /// Items are immutable: saving the exact same item again is a no-op, while
    /// a different item under an existing id fails `Invalid`, as does an item
    /// that does not validate.
    async fn save_item(&self, ctx: &Context, item: &MenuItem) -> Result<()>;

    /// Fails `NotFound` if no item has this id.
    async fn find_item(&self, ctx: &Context, id: Id) -> Result<MenuItem>;

    /// Resolves every id in order. Fails `NotFound` on the first unknown id.
    async fn find_items(&self, ctx: &Context, ids: &[Id]) -> Result<Vec<MenuItem>>;
}

#[async_trait]
impl<T: MenuCatalog + ?Sized> MenuCatalog for Arc<T> {
    async fn save_item(&self, ctx: &Context, item: &MenuItem) -> Result<()> {
        (**self).save_item(ctx, item).await
    }

    async fn find_item(&self, ctx: &Context, id: Id) -> Result<MenuItem> {
        (**self).find_item(ctx, id).await
    }

    async fn find_items(&self, ctx: &Context, ids: &[Id]) -> Result<Vec<MenuItem>> {
        (**self).find_items(ctx, ids).await
    }
}
