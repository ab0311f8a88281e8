//! Filter types for vote searches.
//!
//! Defines the structured conditions a search parameter turns into,
//! like `post_id=1,2`, `score=>5`, `user_ip_addr=10.0.0.0/8`.

use super::inet::IpRange;
use super::query::DuplicateIps;
use crate::vote::VoteScore;

/// One restriction on the vote rows a query returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Vote is on one of these targets: post_id=1,2,3
    TargetIdIn(Vec<i64>),
    /// Vote was cast by one of these users: user_id=1,2
    UserIdIn(Vec<i64>),
    /// Target was created by one of these users: post_creator_id=5
    CreatorIdIn(Vec<i64>),
    /// Vote changed at or after this Unix timestamp: timeframe=7
    UpdatedSince(i64),
    /// Vote address lies within a network: user_ip_addr=10.0.0.0/8
    IpWithin(IpRange),
    /// Vote's own score: score_type=up
    VoteScoreIs(VoteScore),
    /// Target aggregate column against a score filter: upvotes=>10
    Aggregate {
        /// Column on the target table
        column: String,
        /// Parsed score expression
        filter: ScoreFilter,
    },
    /// Vote address is shared with other votes of a base search
    IpIn(DuplicateIps),
}

impl Condition {
    /// Whether this condition reads columns of the target table.
    pub fn needs_target_join(&self) -> bool {
        matches!(self, Condition::CreatorIdIn(_) | Condition::Aggregate { .. })
    }
}

/// Comparison operators for score filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Greater than: >5
    GreaterThan,
    /// Greater than or equal: >=5
    GreaterEqual,
    /// Less than: <5
    LessThan,
    /// Less than or equal: <=5
    LessEqual,
    /// Equal: =5
    Equal,
}

impl CompareOp {
    /// Parse the operator text of a comparison.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            ">" => Some(CompareOp::GreaterThan),
            ">=" => Some(CompareOp::GreaterEqual),
            "<" => Some(CompareOp::LessThan),
            "<=" => Some(CompareOp::LessEqual),
            "=" => Some(CompareOp::Equal),
            _ => None,
        }
    }

    /// Convert to SQL comparison operator.
    pub fn to_sql(&self) -> &'static str {
        match self {
            CompareOp::GreaterThan => ">",
            CompareOp::GreaterEqual => ">=",
            CompareOp::LessThan => "<",
            CompareOp::LessEqual => "<=",
            CompareOp::Equal => "=",
        }
    }

    fn holds(&self, lhs: i64, rhs: i64) -> bool {
        match self {
            CompareOp::GreaterThan => lhs > rhs,
            CompareOp::GreaterEqual => lhs >= rhs,
            CompareOp::LessThan => lhs < rhs,
            CompareOp::LessEqual => lhs <= rhs,
            CompareOp::Equal => lhs == rhs,
        }
    }
}

/// A parsed score expression: `5`, `1..10`, `>5`, `<=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreFilter {
    /// column = value
    Exact(i64),
    /// lower <= column <= upper; an inverted range matches nothing
    Range(i64, i64),
    /// column <op> value
    Compare(CompareOp, i64),
}

impl ScoreFilter {
    /// Whether a column value satisfies the filter.
    pub fn matches(&self, value: i64) -> bool {
        match *self {
            ScoreFilter::Exact(v) => value == v,
            ScoreFilter::Range(lo, hi) => value >= lo && value <= hi,
            ScoreFilter::Compare(op, v) => op.holds(value, v),
        }
    }

    /// SQL predicate over `column` with its parameters.
    pub fn to_sql(&self, column: &str) -> (String, Vec<i64>) {
        match *self {
            ScoreFilter::Exact(v) => (format!("{} = ?", column), vec![v]),
            ScoreFilter::Range(lo, hi) => (
                format!("{column} >= ? AND {column} <= ?", column = column),
                vec![lo, hi],
            ),
            ScoreFilter::Compare(op, v) => (format!("{} {} ?", column, op.to_sql()), vec![v]),
        }
    }
}
