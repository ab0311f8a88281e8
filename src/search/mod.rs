//! Search module - parameter handling, score grammar, and query building.
//!
//! This module turns request parameters like `user_id=7&score=>5` into a
//! [`VoteQuery`] descriptor that the `db` module can execute.

pub mod builder;
pub mod filters;
pub mod inet;
pub mod params;
pub mod parser;
pub mod query;

pub use builder::{SearchContext, UserLookup, VoteSearch, DEFAULT_MAX_ID_VALUES};
pub use filters::*;
pub use inet::IpRange;
pub use params::{ParamValue, SearchParams};
pub use parser::{apply_score_filter, parse_score_filter};
pub use query::{DuplicateIps, Order, SqlParam, VoteQuery};
