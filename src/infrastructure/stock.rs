use crate::domain::catalog::Product;
use crate::domain::order::Order;
use crate::error::{EngineError, Result};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::warn;

/// Products touched by one commit, keyed by id. Built in memory and only
/// written back once every line has been applied.
pub type WorkingSet = HashMap<String, Product>;

fn load_into<'a, F>(working: &'a mut WorkingSet, product_id: &str, load: &mut F) -> Result<Option<&'a mut Product>>
where
    F: FnMut(&str) -> Result<Option<Product>>,
{
    match working.entry(product_id.to_string()) {
        Entry::Occupied(e) => Ok(Some(e.into_mut())),
        Entry::Vacant(e) => Ok(load(product_id)?.map(|product| e.insert(product))),
    }
}

/// Re-checks and decrements stock for every tracked line and bumps the
/// order counter of every product on the order. Fails on the first line
/// that cannot be satisfied, leaving the caller's storage untouched.
pub fn reserve<F>(order: &Order, mut load: F) -> Result<WorkingSet>
where
    F: FnMut(&str) -> Result<Option<Product>>,
{
    let mut working = WorkingSet::new();
    for line in &order.items {
        let product = load_into(&mut working, &line.product_id, &mut load)?
            .ok_or_else(|| EngineError::NotFound(format!("Product {}", line.product_id)))?;
        if line.tracks_inventory {
            product.adjust_stock(line.variant_id.as_deref(), -i64::from(line.quantity.value()))?;
        }
        product.order_count += 1;
    }
    Ok(working)
}

/// Puts back the stock taken by every tracked line. Products or variants
/// removed from the catalog since the order was placed are skipped.
pub fn release<F>(order: &Order, mut load: F) -> Result<WorkingSet>
where
    F: FnMut(&str) -> Result<Option<Product>>,
{
    let mut working = WorkingSet::new();
    for line in order.tracked_lines() {
        let Some(product) = load_into(&mut working, &line.product_id, &mut load)? else {
            warn!(product_id = %line.product_id, "Product gone, stock not restored");
            continue;
        };
        if let Err(e) = product.adjust_stock(line.variant_id.as_deref(), i64::from(line.quantity.value())) {
            warn!(product_id = %line.product_id, error = %e, "Stock not restored");
        }
    }
    Ok(working)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{ProductSnapshot, ProductSpecs};
    use crate::domain::money::{Money, Quantity};
    use crate::domain::order::{
        CustomerContact, DeliveryDetails, NewOrder, OrderItem, OrderTotals, PaymentMethod,
    };
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn product(id: &str, stock: i64, tracks_inventory: bool) -> Product {
        Product {
            id: id.to_string(),
            store_id: "s1".to_string(),
            name: id.to_uppercase(),
            description: None,
            images: vec![],
            sku: None,
            price: Money::new(dec!(10)).unwrap(),
            tracks_inventory,
            stock,
            is_available: true,
            order_count: 0,
            specs: ProductSpecs::General,
            variants: vec![],
        }
    }

    fn line(product_id: &str, quantity: u32, tracks_inventory: bool) -> OrderItem {
        let price = Money::new(dec!(10)).unwrap();
        let quantity = Quantity::new(quantity).unwrap();
        OrderItem {
            product_id: product_id.to_string(),
            variant_id: None,
            product_name: product_id.to_string(),
            variant_name: None,
            unit_price: price,
            quantity,
            subtotal: price * quantity,
            tracks_inventory,
            snapshot: ProductSnapshot {
                name: product_id.to_string(),
                description: None,
                images: vec![],
                sku: None,
                specs: ProductSpecs::General,
            },
        }
    }

    fn order(items: Vec<OrderItem>) -> Order {
        let subtotal = items.iter().map(|i| i.subtotal).sum();
        Order::place(
            NewOrder {
                order_number: "ORD-1".to_string(),
                store_id: "s1".to_string(),
                merchant_id: "m1".to_string(),
                customer: CustomerContact {
                    name: "Ada".to_string(),
                    phone: "08030000000".to_string(),
                    email: None,
                },
                items,
                totals: OrderTotals::compute(subtotal, Money::ZERO, Money::ZERO, Money::ZERO),
                delivery: DeliveryDetails::pickup(),
                payment_method: PaymentMethod::CashOnDelivery,
                notes: None,
            },
            Utc::now(),
        )
    }

    fn catalog() -> HashMap<String, Product> {
        [product("a", 5, true), product("b", 1, true), product("c", 0, false)]
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect()
    }

    #[test]
    fn test_reserve_aggregates_repeated_lines() {
        let catalog = catalog();
        let order = order(vec![line("a", 2, true), line("a", 3, true), line("c", 4, false)]);
        let working = reserve(&order, |id| Ok(catalog.get(id).cloned())).unwrap();
        assert_eq!(working["a"].stock, 0);
        assert_eq!(working["a"].order_count, 2);
        assert_eq!(working["c"].stock, 0);
        assert_eq!(working["c"].order_count, 1);
    }

    #[test]
    fn test_reserve_fails_whole_order() {
        let catalog = catalog();
        let order = order(vec![line("a", 2, true), line("b", 2, true)]);
        let err = reserve(&order, |id| Ok(catalog.get(id).cloned())).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientStock { available: 1, .. }));
        assert_eq!(catalog["a"].stock, 5);
    }

    #[test]
    fn test_release_skips_missing_products() {
        let catalog = catalog();
        let order = order(vec![line("a", 2, true), line("gone", 1, true), line("c", 1, false)]);
        let working = release(&order, |id| Ok(catalog.get(id).cloned())).unwrap();
        assert_eq!(working["a"].stock, 7);
        assert!(!working.contains_key("gone"));
        assert!(!working.contains_key("c"));
    }
}
