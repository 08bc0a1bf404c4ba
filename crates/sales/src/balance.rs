//! Outstanding-balance gate.
//!
//! A client whose oldest unpaid order is older than the threshold gets a
//! warning instead of a new order. This is not an error: the caller shows a
//! "confirm or settle first" prompt and may resubmit with an acknowledgement.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fieldops_core::OrderId;

/// An order with a strictly positive remaining balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpaidOrder {
    pub order_id: OrderId,
    pub created_at: DateTime<Utc>,
    pub balance: Decimal,
}

/// Why an order was held back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceBlock {
    /// Whole days since the oldest unpaid order was created.
    pub balance_age_days: i64,
    /// Sum of positive balances across all unpaid orders of the client.
    pub total_outstanding: Decimal,
    pub oldest_unpaid: UnpaidOrder,
    pub threshold_days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceGateDecision {
    Clear,
    Blocked(BalanceBlock),
}

impl BalanceGateDecision {
    pub fn is_blocked(&self) -> bool {
        matches!(self, BalanceGateDecision::Blocked(_))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BalanceGate {
    threshold_days: i64,
}

impl BalanceGate {
    pub fn new(threshold_days: i64) -> Self {
        Self { threshold_days }
    }

    pub fn threshold_days(&self) -> i64 {
        self.threshold_days
    }

    /// Blocks when the oldest unpaid order is strictly older than the threshold.
    pub fn evaluate(
        &self,
        oldest_unpaid: Option<&UnpaidOrder>,
        total_outstanding: Decimal,
        now: DateTime<Utc>,
    ) -> BalanceGateDecision {
        let Some(oldest) = oldest_unpaid else {
            return BalanceGateDecision::Clear;
        };
        if oldest.balance <= Decimal::ZERO {
            return BalanceGateDecision::Clear;
        }

        let age_days = (now - oldest.created_at).num_days();
        if age_days <= self.threshold_days {
            return BalanceGateDecision::Clear;
        }

        BalanceGateDecision::Blocked(BalanceBlock {
            balance_age_days: age_days,
            total_outstanding,
            oldest_unpaid: oldest.clone(),
            threshold_days: self.threshold_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn unpaid(days_ago: i64, now: DateTime<Utc>) -> UnpaidOrder {
        UnpaidOrder {
            order_id: OrderId::new(81).unwrap(),
            created_at: now - Duration::days(days_ago) - Duration::hours(2),
            balance: Decimal::new(45000, 2),
        }
    }

    #[test]
    fn no_unpaid_orders_never_blocks() {
        let gate = BalanceGate::new(3);
        assert_eq!(gate.evaluate(None, Decimal::ZERO, Utc::now()), BalanceGateDecision::Clear);
    }

    #[test]
    fn ten_day_old_balance_blocks_with_three_day_threshold() {
        let now = Utc::now();
        let gate = BalanceGate::new(3);
        let oldest = unpaid(10, now);

        match gate.evaluate(Some(&oldest), Decimal::new(72000, 2), now) {
            BalanceGateDecision::Blocked(block) => {
                assert_eq!(block.balance_age_days, 10);
                assert_eq!(block.total_outstanding, Decimal::new(72000, 2));
                assert_eq!(block.oldest_unpaid.order_id, oldest.order_id);
            }
            BalanceGateDecision::Clear => panic!("expected a block"),
        }
    }

    #[test]
    fn age_equal_to_threshold_is_still_clear() {
        let now = Utc::now();
        let gate = BalanceGate::new(30);
        assert!(!gate.evaluate(Some(&unpaid(30, now)), Decimal::ONE, now).is_blocked());
        assert!(gate.evaluate(Some(&unpaid(31, now)), Decimal::ONE, now).is_blocked());
    }

    #[test]
    fn settled_order_does_not_block() {
        let now = Utc::now();
        let mut settled = unpaid(90, now);
        settled.balance = Decimal::ZERO;
        assert!(!BalanceGate::new(3).evaluate(Some(&settled), Decimal::ZERO, now).is_blocked());
    }
}
