use axum::http::HeaderMap;
use thiserror::Error;

use fieldops_core::{CountryId, RegionId, UserId};
use fieldops_infra::Requester;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const REGION_ID_HEADER: &str = "x-user-region-id";
pub const COUNTRY_ID_HEADER: &str = "x-user-country-id";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("missing identity header {0}")]
    Missing(&'static str),

    #[error("malformed identity header {header}: {reason}")]
    Malformed { header: &'static str, reason: String },
}

/// Resolves the requesting field user from a request.
///
/// Sessions and tokens are handled upstream; implementations only read what
/// the gateway already established.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Result<Requester, IdentityError>;
}

/// Reads the identity the gateway forwards in trusted `x-user-*` headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderIdentityResolver;

impl IdentityResolver for HeaderIdentityResolver {
    fn resolve(&self, headers: &HeaderMap) -> Result<Requester, IdentityError> {
        Ok(Requester {
            user_id: header_value::<UserId>(headers, USER_ID_HEADER)?,
            region_id: header_value::<RegionId>(headers, REGION_ID_HEADER)?,
            country_id: header_value::<CountryId>(headers, COUNTRY_ID_HEADER)?,
        })
    }
}

fn header_value<T>(headers: &HeaderMap, name: &'static str) -> Result<T, IdentityError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = headers.get(name).ok_or(IdentityError::Missing(name))?;
    let raw = raw.to_str().map_err(|e| IdentityError::Malformed {
        header: name,
        reason: e.to_string(),
    })?;
    raw.parse::<T>().map_err(|e| IdentityError::Malformed {
        header: name,
        reason: e.to_string(),
    })
}

/// Requester context for a request, inserted by the identity middleware.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequesterContext {
    requester: Requester,
}

impl RequesterContext {
    pub fn new(requester: Requester) -> Self {
        Self { requester }
    }

    pub fn requester(&self) -> Requester {
        self.requester
    }
}
