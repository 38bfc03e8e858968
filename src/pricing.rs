//! Checkout pricing: tax and shipping computed from the item subtotal.
//!
//! The rates are configuration, not constants, so regional variation and test
//! doubles never touch the arithmetic. Cart previews use only the subtotal
//! fold; tax and shipping are quoted once, at order creation.

use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub tax_rate: Decimal,
    pub shipping_flat_rate: Decimal,
    /// Subtotals strictly above this ship free.
    pub free_shipping_threshold: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(10, 2),
            shipping_flat_rate: Decimal::new(100, 0),
            free_shipping_threshold: Decimal::new(1000, 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping_charges: Decimal,
}

impl PricingConfig {
    /// Pure quote for a given item subtotal. No I/O, deterministic.
    pub fn quote(&self, subtotal: Decimal) -> OrderTotals {
        let tax = subtotal * self.tax_rate;
        let shipping_charges = if subtotal > self.free_shipping_threshold {
            Decimal::ZERO
        } else {
            self.shipping_flat_rate
        };
        OrderTotals { subtotal, tax, shipping_charges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_percent_tax() {
        let totals = PricingConfig::default().quote(Decimal::new(500, 0));
        assert_eq!(totals.tax, Decimal::new(50, 0));
        assert_eq!(totals.shipping_charges, Decimal::new(100, 0));
    }

    #[test]
    fn free_shipping_is_strictly_above_threshold() {
        let pricing = PricingConfig::default();
        // Exactly at the threshold still pays flat shipping.
        assert_eq!(pricing.quote(Decimal::new(1000, 0)).shipping_charges, Decimal::new(100, 0));
        assert_eq!(pricing.quote(Decimal::new(100001, 2)).shipping_charges, Decimal::ZERO);
    }

    #[test]
    fn configured_rates_apply() {
        let pricing = PricingConfig {
            tax_rate: Decimal::new(20, 2),
            shipping_flat_rate: Decimal::new(50, 0),
            free_shipping_threshold: Decimal::new(200, 0),
        };
        let totals = pricing.quote(Decimal::new(300, 0));
        assert_eq!(totals.tax, Decimal::new(60, 0));
        assert_eq!(totals.shipping_charges, Decimal::ZERO);
    }
}
