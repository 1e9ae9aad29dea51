use crate::domain::catalog::{Product, ProductSpecs, Variant};
use crate::domain::money::Money;
use crate::error::{EngineError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;

/// One line of a catalog import. A row with an empty `variant_id` defines
/// the product; rows that carry one add a variant to it.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CatalogRow {
    pub store_id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub name: String,
    pub sku: Option<String>,
    pub price: Money,
    pub stock: i64,
    pub tracks_inventory: bool,
    pub available: bool,
}

/// Reads catalog rows from a CSV source.
///
/// Whitespace is trimmed and records may be ragged, like every other CSV
/// input this crate accepts.
pub struct CatalogReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CatalogReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes rows.
    pub fn rows(self) -> impl Iterator<Item = Result<CatalogRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(EngineError::from))
    }

    /// Folds the rows into products, keeping first-seen order. Fails on the
    /// first malformed row or on a variant with no product row.
    pub fn products(self) -> Result<Vec<Product>> {
        let mut order: Vec<String> = Vec::new();
        let mut products: HashMap<String, Product> = HashMap::new();
        let mut variants: Vec<(String, Variant)> = Vec::new();

        for row in self.rows() {
            let row = row?;
            match row.variant_id {
                Some(variant_id) => variants.push((
                    row.product_id,
                    Variant {
                        id: variant_id,
                        name: row.name,
                        price: Some(row.price),
                        stock: row.stock,
                        is_available: row.available,
                    },
                )),
                None => {
                    if products.contains_key(&row.product_id) {
                        return Err(EngineError::ValidationError(format!(
                            "Product {} defined twice",
                            row.product_id
                        )));
                    }
                    order.push(row.product_id.clone());
                    products.insert(
                        row.product_id.clone(),
                        Product {
                            id: row.product_id,
                            store_id: row.store_id,
                            name: row.name,
                            description: None,
                            images: vec![],
                            sku: row.sku,
                            price: row.price,
                            tracks_inventory: row.tracks_inventory,
                            stock: row.stock,
                            is_available: row.available,
                            order_count: 0,
                            specs: ProductSpecs::default(),
                            variants: vec![],
                        },
                    );
                }
            }
        }

        for (product_id, variant) in variants {
            let product = products.get_mut(&product_id).ok_or_else(|| {
                EngineError::ValidationError(format!(
                    "Variant {} refers to unknown product {}",
                    variant.id, product_id
                ))
            })?;
            product.variants.push(variant);
        }

        Ok(order
            .into_iter()
            .filter_map(|id| products.remove(&id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const HEADER: &str = "store_id, product_id, variant_id, name, sku, price, stock, tracks_inventory, available";

    #[test]
    fn test_reader_builds_products_with_variants() {
        let data = format!(
            "{HEADER}\n\
             s1, p2, v1, Large, , 12.50, 2, true, true\n\
             s1, p1, , Rice, RC-1, 10.00, 5, true, true\n\
             s1, p2, , Shirt, SH-1, 10.00, 0, true, true\n"
        );
        let products = CatalogReader::new(data.as_bytes()).products().unwrap();

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].id, "p1");
        assert_eq!(products[0].sku.as_deref(), Some("RC-1"));
        assert_eq!(products[1].variants.len(), 1);
        assert_eq!(products[1].variants[0].price, Some(Money::new(dec!(12.50)).unwrap()));
    }

    #[test]
    fn test_reader_rejects_orphan_variant() {
        let data = format!("{HEADER}\ns1, p9, v1, Large, , 1.00, 1, true, true\n");
        assert!(matches!(
            CatalogReader::new(data.as_bytes()).products(),
            Err(EngineError::ValidationError(_))
        ));
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = format!("{HEADER}\ns1, p1, , Rice, , -1.00, 5, true, true\n");
        let results: Vec<Result<CatalogRow>> = CatalogReader::new(data.as_bytes()).rows().collect();
        assert!(results[0].is_err());
    }
}
