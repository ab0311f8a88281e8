//! SQL functions for IP address handling.
//!
//! SQLite has no network address type, so votes store addresses as text
//! and these functions provide range containment and numeric ordering.

use std::net::IpAddr;

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

use crate::search::inet::{sort_key, IpRange, SQL_CONTAINS_FN, SQL_SORT_KEY_FN};
use crate::{Result, VoteSearchError};

/// Register `inet_contains(network, addr)` and `inet_key(addr)`.
///
/// Both return NULL when an argument is NULL or unparsable.
pub fn register(conn: &Connection) -> Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function(SQL_CONTAINS_FN, 2, flags, |ctx| {
        let network: Option<String> = ctx.get(0)?;
        let addr: Option<String> = ctx.get(1)?;

        let range = network.as_deref().and_then(IpRange::parse);
        let addr = addr.and_then(|a| a.parse::<IpAddr>().ok());
        Ok(match (range, addr) {
            (Some(range), Some(addr)) => Some(range.contains(&addr)),
            _ => None,
        })
    })
    .map_err(|e| VoteSearchError::Database(format!("Failed to register {}: {}", SQL_CONTAINS_FN, e)))?;

    conn.create_scalar_function(SQL_SORT_KEY_FN, 1, flags, |ctx| {
        let addr: Option<String> = ctx.get(0)?;
        Ok(addr
            .and_then(|a| a.parse::<IpAddr>().ok())
            .map(|a| sort_key(&a)))
    })
    .map_err(|e| VoteSearchError::Database(format!("Failed to register {}: {}", SQL_SORT_KEY_FN, e)))?;

    Ok(())
}
