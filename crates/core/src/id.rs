//! Strongly-typed identifiers used across the domain.
//!
//! Every record in the relational store is keyed by a positive `BIGSERIAL`;
//! the newtypes keep a `StoreId` from ever being passed where a `ProductId`
//! is expected.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

macro_rules! int_id {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(i64);

        impl $t {
            /// Wrap a raw key. Rejects zero and negative values.
            pub fn new(raw: i64) -> Result<Self, DomainError> {
                if raw <= 0 {
                    return Err(DomainError::invalid_id(format!(
                        "{}: must be a positive integer, got {}",
                        $name, raw
                    )));
                }
                Ok(Self(raw))
            }

            /// Wrap a key read back from storage (already known to be valid).
            pub const fn from_db(raw: i64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl TryFrom<i64> for $t {
            type Error = DomainError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Self::new(raw)
            }
        }
    };
}

int_id!(
    /// Identifier of a client (the buying party).
    ClientId,
    "ClientId"
);
int_id!(
    /// Identifier of a sales user (the requester of an order).
    UserId,
    "UserId"
);
int_id!(ProductId, "ProductId");
int_id!(CategoryId, "CategoryId");
int_id!(
    /// Identifier of a price tier within a category.
    PriceOptionId,
    "PriceOptionId"
);
int_id!(StoreId, "StoreId");
int_id!(RegionId, "RegionId");
int_id!(CountryId, "CountryId");
int_id!(OrderId, "OrderId");
int_id!(OrderItemId, "OrderItemId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_ids() {
        assert!(ProductId::new(0).is_err());
        assert!(StoreId::new(-4).is_err());
        assert_eq!(ClientId::new(7).unwrap().get(), 7);
    }

    #[test]
    fn parse_reports_the_identifier_kind() {
        let err = "abc".parse::<PriceOptionId>().unwrap_err();
        match err {
            DomainError::InvalidId(msg) if msg.starts_with("PriceOptionId") => {}
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(" 12 ".parse::<CountryId>().unwrap(), CountryId::from_db(12));
    }

    #[test]
    fn serializes_as_plain_number() {
        let id = OrderId::from_db(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        let back: OrderId = serde_json::from_str("42").unwrap();
        assert_eq!(back, id);
    }
}
