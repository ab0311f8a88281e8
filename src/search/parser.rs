//! Score range parser using pest grammar.
//!
//! Parses score expressions like `5`, `1..10`, `>5` or `<=3` into a
//! [`ScoreFilter`] and applies them to a target aggregate column.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use super::filters::{CompareOp, Condition, ScoreFilter};
use super::query::VoteQuery;
use crate::{Result, VoteSearchError};

#[derive(Parser)]
#[grammar = "search/score.pest"]
struct ScoreGrammar;

/// Parse a score expression aimed at `column`.
///
/// Forms, tried in order:
/// - `N` exact match
/// - `A..B` inclusive range (not reordered; `10..1` matches nothing)
/// - `>N`, `>=N`, `<N`, `<=N`, `=N` comparison
///
/// # Examples
///
/// ```
/// use votesearch::search::{parse_score_filter, CompareOp, ScoreFilter};
///
/// assert_eq!(parse_score_filter("1..10", "score").unwrap(), ScoreFilter::Range(1, 10));
/// assert_eq!(
///     parse_score_filter(">=5", "score").unwrap(),
///     ScoreFilter::Compare(CompareOp::GreaterEqual, 5)
/// );
/// assert!(parse_score_filter("abc", "score").is_err());
/// ```
pub fn parse_score_filter(input: &str, column: &str) -> Result<ScoreFilter> {
    let invalid = || VoteSearchError::Format {
        input: input.to_string(),
        column: column.to_string(),
    };

    let mut pairs = ScoreGrammar::parse(Rule::score_filter, input).map_err(|_| invalid())?;
    let expr = pairs
        .next()
        .and_then(|filter| filter.into_inner().next())
        .ok_or_else(invalid)?;

    let int = |pair: Option<Pair<'_, Rule>>| -> Result<i64> {
        pair.and_then(|p| p.as_str().parse::<i64>().ok())
            .ok_or_else(invalid)
    };

    match expr.as_rule() {
        Rule::exact => Ok(ScoreFilter::Exact(int(expr.into_inner().next())?)),
        Rule::range => {
            let mut bounds = expr.into_inner();
            let lower = int(bounds.next())?;
            let upper = int(bounds.next())?;
            Ok(ScoreFilter::Range(lower, upper))
        }
        Rule::comparison => {
            let mut parts = expr.into_inner();
            let op = parts
                .next()
                .and_then(|p| CompareOp::from_symbol(p.as_str()))
                .ok_or_else(invalid)?;
            Ok(ScoreFilter::Compare(op, int(parts.next())?))
        }
        _ => Err(invalid()),
    }
}

/// Restrict `query` to votes whose target `column` satisfies `input`.
///
/// Joins the target table. The input query is left untouched.
pub fn apply_score_filter(query: &VoteQuery, input: &str, column: &str) -> Result<VoteQuery> {
    let filter = parse_score_filter(input, column)?;
    tracing::debug!("Score filter on {}: {:?}", column, filter);
    Ok(query.clone().filter(Condition::Aggregate {
        column: column.to_string(),
        filter,
    }))
}
