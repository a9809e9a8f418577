//! Catalog reads.

use rust_decimal::Decimal;

use edubook_core::ProductId;

use super::{CatalogStore, PgStore, RepositoryError};
use crate::models::Product;

#[derive(Debug, sqlx::FromRow)]
pub(super) struct ProductRow {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub thumbnail: Option<String>,
    pub stock: i32,
    pub is_active: bool,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        if row.price.is_sign_negative() && !row.price.is_zero() {
            return Err(RepositoryError::DataCorruption(format!(
                "negative price for product {}",
                row.id
            )));
        }
        Ok(Self {
            id: row.id,
            name: row.name,
            price: row.price,
            thumbnail: row.thumbnail,
            stock: row.stock,
            is_active: row.is_active,
        })
    }
}

impl CatalogStore for PgStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, price, thumbnail, stock, is_active
            FROM products
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.map(Product::try_from).transpose()
    }
}
