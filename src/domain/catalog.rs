use super::money::Money;
use crate::error::EngineError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreCategory {
    Fashion,
    Food,
    Electronics,
    #[default]
    General,
}

/// A merchant's storefront. Orders are always placed against exactly one.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Storefront {
    pub id: String,
    pub merchant_id: String,
    pub name: String,
    #[serde(default)]
    pub category: StoreCategory,
    pub is_active: bool,
    pub is_published: bool,
}

impl Storefront {
    pub fn is_orderable(&self) -> bool {
        self.is_active && self.is_published
    }
}

/// Category-specific product attributes.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum ProductSpecs {
    Fashion {
        #[serde(default)]
        sizes: Vec<String>,
        #[serde(default)]
        colors: Vec<String>,
        material: Option<String>,
    },
    Food {
        #[serde(default)]
        ingredients: Vec<String>,
        #[serde(default)]
        allergens: Vec<String>,
        preparation_minutes: Option<u32>,
    },
    Electronics {
        brand: Option<String>,
        model: Option<String>,
        warranty_months: Option<u32>,
    },
    #[default]
    General,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Variant {
    pub id: String,
    pub name: String,
    /// Overrides the product price when present.
    pub price: Option<Money>,
    pub stock: i64,
    pub is_available: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Product {
    pub id: String,
    pub store_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub sku: Option<String>,
    pub price: Money,
    pub tracks_inventory: bool,
    pub stock: i64,
    pub is_available: bool,
    #[serde(default)]
    pub order_count: u64,
    #[serde(default)]
    pub specs: ProductSpecs,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

impl Product {
    pub fn variant(&self, variant_id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    /// Stock counter that backs an order line: the variant's when one is
    /// chosen, otherwise the product's.
    pub fn stock_slot_mut(&mut self, variant_id: Option<&str>) -> Option<&mut i64> {
        match variant_id {
            Some(id) => self
                .variants
                .iter_mut()
                .find(|v| v.id == id)
                .map(|v| &mut v.stock),
            None => Some(&mut self.stock),
        }
    }

    /// Applies `delta` to the backing stock counter. A decrement that would
    /// take the counter below zero changes nothing.
    pub fn adjust_stock(&mut self, variant_id: Option<&str>, delta: i64) -> Result<i64, EngineError> {
        let label = match variant_id.and_then(|id| self.variant(id)) {
            Some(variant) => format!("{} ({})", self.name, variant.name),
            None => self.name.clone(),
        };
        let product_id = self.id.clone();
        let slot = self.stock_slot_mut(variant_id).ok_or_else(|| {
            EngineError::NotFound(format!(
                "Variant {} of product {}",
                variant_id.unwrap_or_default(),
                product_id
            ))
        })?;
        let next = *slot + delta;
        if next < 0 {
            return Err(EngineError::InsufficientStock {
                item: label,
                requested: delta.unsigned_abs(),
                available: *slot,
            });
        }
        *slot = next;
        Ok(next)
    }

    /// Resolves the orderable view of this product, or `None` if the
    /// requested variant does not exist under it.
    pub fn orderable(&self, variant_id: Option<&str>) -> Option<OrderableItem> {
        let variant = match variant_id {
            Some(id) => Some(self.variant(id)?),
            None => None,
        };

        Some(OrderableItem {
            product_id: self.id.clone(),
            variant_id: variant.map(|v| v.id.clone()),
            variant_name: variant.map(|v| v.name.clone()),
            store_id: self.store_id.clone(),
            price: variant.and_then(|v| v.price).unwrap_or(self.price),
            tracks_inventory: self.tracks_inventory,
            available_qty: variant.map_or(self.stock, |v| v.stock),
            product_available: self.is_available,
            variant_available: variant.map(|v| v.is_available),
            snapshot: ProductSnapshot {
                name: self.name.clone(),
                description: self.description.clone(),
                images: self.images.clone(),
                sku: self.sku.clone(),
                specs: self.specs.clone(),
            },
        })
    }
}

/// Frozen copy of catalog data captured on the order line.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ProductSnapshot {
    pub name: String,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub sku: Option<String>,
    pub specs: ProductSpecs,
}

/// What the order path needs to know about a product/variant pair.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct OrderableItem {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub variant_name: Option<String>,
    pub store_id: String,
    pub price: Money,
    pub tracks_inventory: bool,
    pub available_qty: i64,
    pub product_available: bool,
    pub variant_available: Option<bool>,
    pub snapshot: ProductSnapshot,
}

impl OrderableItem {
    pub fn is_available(&self) -> bool {
        self.product_available && self.variant_available.unwrap_or(true)
    }

    pub fn label(&self) -> String {
        match &self.variant_name {
            Some(variant) => format!("{} ({})", self.snapshot.name, variant),
            None => self.snapshot.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn shirt() -> Product {
        Product {
            id: "p1".to_string(),
            store_id: "s1".to_string(),
            name: "Shirt".to_string(),
            description: None,
            images: vec![],
            sku: Some("SH-1".to_string()),
            price: Money::new(dec!(10.00)).unwrap(),
            tracks_inventory: true,
            stock: 5,
            is_available: true,
            order_count: 0,
            specs: ProductSpecs::Fashion {
                sizes: vec!["M".to_string(), "L".to_string()],
                colors: vec![],
                material: None,
            },
            variants: vec![Variant {
                id: "v1".to_string(),
                name: "Large".to_string(),
                price: Some(Money::new(dec!(12.50)).unwrap()),
                stock: 2,
                is_available: false,
            }],
        }
    }

    #[test]
    fn test_variant_overrides_price_and_stock() {
        let item = shirt().orderable(Some("v1")).unwrap();
        assert_eq!(item.price, Money::new(dec!(12.50)).unwrap());
        assert_eq!(item.available_qty, 2);
        assert!(!item.is_available());
        assert_eq!(item.label(), "Shirt (Large)");
    }

    #[test]
    fn test_product_without_variant() {
        let item = shirt().orderable(None).unwrap();
        assert_eq!(item.price, Money::new(dec!(10.00)).unwrap());
        assert_eq!(item.available_qty, 5);
        assert!(item.is_available());
    }

    #[test]
    fn test_adjust_stock_never_goes_negative() {
        let mut product = shirt();
        assert_eq!(product.adjust_stock(None, -3).unwrap(), 2);
        let err = product.adjust_stock(Some("v1"), -3).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            }
        ));
        assert_eq!(err.to_string(), "Insufficient stock for Shirt (Large): requested 3, available 2");
        assert_eq!(product.variants[0].stock, 2);
        assert_eq!(product.adjust_stock(Some("v1"), 4).unwrap(), 6);
        assert!(matches!(
            product.adjust_stock(Some("nope"), 1),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_unknown_variant() {
        assert!(shirt().orderable(Some("nope")).is_none());
    }

    #[test]
    fn test_specs_are_tagged_by_category() {
        let json = serde_json::to_value(&shirt().specs).unwrap();
        assert_eq!(json["category"], "fashion");
        let food: ProductSpecs = serde_json::from_str(
            r#"{"category":"food","ingredients":["rice"],"preparation_minutes":20}"#,
        )
        .unwrap();
        assert!(matches!(
            food,
            ProductSpecs::Food {
                preparation_minutes: Some(20),
                ..
            }
        ));
    }
}
