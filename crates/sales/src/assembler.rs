//! Order assembly: unit prices, line totals and the order total.

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};

use fieldops_catalog::{CurrencyResolver, PriceKind, PriceOption, Product};
use fieldops_core::{ClientId, CountryId, DomainError, PriceOptionId, RegionId, UserId};
use fieldops_inventory::Allocation;

use crate::order::{OrderDraft, PreparedItem};

/// Header fields supplied by the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderHeaderInput {
    pub client_id: ClientId,
    pub requested_by: UserId,
    pub region_id: RegionId,
    pub country_id: CountryId,
    pub comment: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub attachment_url: Option<String>,
}

/// A line that passed catalog resolution and allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLine {
    pub product: Product,
    pub price_option_id: PriceOptionId,
    pub quantity: i64,
    pub allocation: Allocation,
}

/// Round an order total to cents, half away from zero.
pub fn round_total(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Build the order draft from resolved lines.
///
/// `tiers` is the batch re-lookup of every requested price tier. A line whose
/// tier is missing from it, or whose tier no longer belongs to the product's
/// category, is priced at zero and flagged `price_degraded`; the caller is
/// expected to log those.
pub fn assemble(
    header: OrderHeaderInput,
    lines: Vec<ResolvedLine>,
    tiers: &HashMap<PriceOptionId, PriceOption>,
    resolver: &dyn CurrencyResolver,
) -> Result<OrderDraft, DomainError> {
    if lines.is_empty() {
        return Err(DomainError::invariant("an order needs at least one line item"));
    }

    let country = header.country_id;
    let items = lines
        .into_iter()
        .map(|line| {
            let tier = tiers
                .get(&line.price_option_id)
                .filter(|t| t.category_id() == line.product.category_id());

            let (unit_price, price_option_name) = match tier {
                Some(t) => (resolver.resolve(&t.values, country, PriceKind::Sale), Some(t.name.clone())),
                None => (Decimal::ZERO, None),
            };

            PreparedItem {
                product_id: line.product.id,
                product_name: line.product.name.clone(),
                quantity: line.quantity,
                price_option_id: Some(line.price_option_id),
                price_option_name,
                store_candidates: line.allocation.candidate_store_ids(),
                unit_price,
                unit_cost: resolver.resolve(&line.product.unit_cost, country, PriceKind::Cost),
                price_degraded: tier.is_none(),
            }
        })
        .collect::<Vec<_>>();

    let total_amount = round_total(items.iter().map(PreparedItem::line_total).sum());

    Ok(OrderDraft {
        client_id: header.client_id,
        requested_by: header.requested_by,
        region_id: header.region_id,
        country_id: header.country_id,
        comment: header.comment,
        customer_name: header.customer_name,
        customer_phone: header.customer_phone,
        attachment_url: header.attachment_url,
        total_amount,
        items,
    })
}
