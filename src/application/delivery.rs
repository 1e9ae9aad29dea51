use crate::domain::money::Money;
use crate::domain::order::DeliveryMethod;
use crate::domain::ports::DeliveryFeePolicy;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// Flat per-city delivery fees with a default for unlisted cities.
///
/// Only merchant delivery is charged; pickup and customer-arranged
/// delivery are always free.
#[derive(Debug, Clone)]
pub struct CityFeeTable {
    fees: HashMap<String, Money>,
    default_fee: Money,
}

impl CityFeeTable {
    pub fn new(default_fee: Money) -> Self {
        Self {
            fees: HashMap::new(),
            default_fee,
        }
    }

    pub fn with_city(mut self, city: &str, fee: Money) -> Self {
        self.fees.insert(normalize_city(city), fee);
        self
    }

    /// The table the platform ships with.
    pub fn standard() -> Self {
        let fee = |d| Money::new(d).unwrap_or(Money::ZERO);
        Self::new(fee(dec!(3000)))
            .with_city("Lagos", fee(dec!(1500)))
            .with_city("Abuja", fee(dec!(2000)))
            .with_city("Ibadan", fee(dec!(1800)))
            .with_city("Port Harcourt", fee(dec!(2500)))
            .with_city("Kano", fee(dec!(2500)))
    }
}

impl Default for CityFeeTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl DeliveryFeePolicy for CityFeeTable {
    fn fee_for(&self, method: DeliveryMethod, city: Option<&str>) -> Money {
        match method {
            DeliveryMethod::Pickup | DeliveryMethod::CustomerArranged => Money::ZERO,
            DeliveryMethod::MerchantDelivery => city
                .and_then(|c| self.fees.get(&normalize_city(c)))
                .copied()
                .unwrap_or(self.default_fee),
        }
    }
}

fn normalize_city(city: &str) -> String {
    city.trim().to_lowercase()
}
