use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::catalog::CheckedLine;
use super::errors::OrderError;
use super::value_objects::OrderLineItem;

// ============================================================================
// Pricing Engine
// ============================================================================
//
// itemsPrice    = Σ quantity × unit price (price read from the live product)
// taxPrice      = itemsPrice × tax rate, rounded to cents
// shippingPrice = flat fee
// totalPrice    = itemsPrice + taxPrice + shippingPrice
//
// The per-unit discount is captured on the line item but is not applied to
// any total.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub tax_rate: Decimal,
    pub shipping_fee: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(10, 2),
            shipping_fee: Decimal::new(10, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub items_price: Decimal,
    pub tax_price: Decimal,
    pub shipping_price: Decimal,
    pub total_price: Decimal,
}

impl PriceBreakdown {
    /// Whether these prices agree with the line items they were derived from
    pub fn reconciles(&self, items: &[OrderLineItem]) -> bool {
        let items_price: Decimal = items
            .iter()
            .map(|item| item.price * Decimal::from(item.quantity))
            .sum();

        items_price == self.items_price
            && self.total_price == self.items_price + self.tax_price + self.shipping_price
            && items.iter().all(|item| item.total_price == item.price * Decimal::from(item.quantity))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedOrder {
    pub items: Vec<OrderLineItem>,
    pub prices: PriceBreakdown,
}

impl PricingPolicy {
    pub fn price(&self, lines: &[CheckedLine]) -> Result<PricedOrder, OrderError> {
        let mut items = Vec::with_capacity(lines.len());

        for line in lines {
            if line.quantity < 1 {
                return Err(OrderError::InvalidQuantity {
                    product_id: line.product.id,
                    quantity: line.quantity,
                });
            }
            items.push(OrderLineItem::capture(&line.product, line.quantity));
        }

        let items_price: Decimal = items.iter().map(|item| item.total_price).sum();
        let tax_price = (items_price * self.tax_rate)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let shipping_price = self.shipping_fee;

        Ok(PricedOrder {
            items,
            prices: PriceBreakdown {
                items_price,
                tax_price,
                shipping_price,
                total_price: items_price + tax_price + shipping_price,
            },
        })
    }
}
