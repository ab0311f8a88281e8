//! Search parameters -> vote query.
//!
//! Recognized keys, where `<target>` is the target name (`post`, `comment`):
//!
//! | key | effect |
//! |-----|--------|
//! | `<target>_id` | target id in the first 100 comma-separated ids |
//! | `user_id` / `user_name` | voter in the given ids / names |
//! | `<target>_creator_id` / `<target>_creator_name` | target creator (*) |
//! | `timeframe` | changed within the last N days (*) |
//! | `user_ip_addr` | voter address inside an IP or CIDR range (*) |
//! | `score_type` | the vote's own score (*) |
//! | `score`, `downvotes`, `upvotes` | score expression on the target (*) |
//! | `duplicates_only` | address shared by several matching votes (*) |
//! | `order` | `ip_addr` (*), `id_asc`, `id_desc`, else newest first |
//!
//! Keys marked (*) only take effect when one of `<target>_id`, `user_id`
//! or `user_name` is present, so that broad searches never scan the whole
//! vote table. Unknown keys and unparsable optional values are ignored;
//! a malformed score expression is an error.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::filters::Condition;
use super::inet::IpRange;
use super::params::SearchParams;
use super::parser::apply_score_filter;
use super::query::{Order, VoteQuery};
use crate::target::TargetConfig;
use crate::vote::{VoteContext, VoteScore};
use crate::Result;

/// Default cap on comma-separated id lists.
pub const DEFAULT_MAX_ID_VALUES: usize = 100;

/// Score-filter parameter keys, in the order they are applied.
const SCORE_PARAMS: [&str; 3] = ["score", "downvotes", "upvotes"];

/// Resolves user names to user ids.
pub trait UserLookup {
    /// Ids of the users matching any of `names`. Unknown names are skipped.
    fn ids_for_names(&self, names: &[String]) -> Result<Vec<i64>>;
}

/// Per-request inputs to a search.
#[derive(Debug, Clone)]
pub struct SearchContext {
    /// Reference time for `timeframe`
    pub now: DateTime<Utc>,
}

impl SearchContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// Context anchored at the current time.
    pub fn current() -> Self {
        Self::new(Utc::now())
    }
}

impl From<&VoteContext> for SearchContext {
    fn from(ctx: &VoteContext) -> Self {
        Self::new(ctx.now)
    }
}

/// Builds vote queries for one target kind.
pub struct VoteSearch<L> {
    target: TargetConfig,
    users: L,
    max_id_values: usize,
}

impl<L: UserLookup> VoteSearch<L> {
    pub fn new(target: TargetConfig, users: L) -> Self {
        Self {
            target,
            users,
            max_id_values: DEFAULT_MAX_ID_VALUES,
        }
    }

    /// Override the cap on comma-separated id lists.
    pub fn with_max_id_values(mut self, max_id_values: usize) -> Self {
        self.max_id_values = max_id_values;
        self
    }

    pub fn target(&self) -> &TargetConfig {
        &self.target
    }

    /// Whether `params` unlock the expensive filters.
    ///
    /// The key only has to be supplied; a blank `user_id=` from an empty
    /// form field still counts.
    pub fn allows_complex_filters(&self, params: &SearchParams) -> bool {
        params.contains_key(&self.target.id_param())
            || params.contains_key("user_name")
            || params.contains_key("user_id")
    }

    /// Build the query for `params`.
    ///
    /// The result is an unexecuted descriptor; see [`crate::db::fetch_votes`].
    pub fn search(&self, params: &SearchParams, ctx: &SearchContext) -> Result<VoteQuery> {
        let complex = self.allows_complex_filters(params);
        let base = self.build_base(&params.without("duplicates_only"), ctx)?;
        let mut query = base.clone();

        if complex && params.is_truthy("duplicates_only") {
            debug!("Restricting to duplicate addresses");
            query = query.restrict_ips_to(base.duplicate_ips());
        }

        let order = match params.get("order").as_deref() {
            Some("ip_addr") if complex => Order::IpAddr,
            Some("id_asc") => Order::IdAsc,
            Some("id_desc") => Order::IdDesc,
            _ => Order::Newest,
        };

        Ok(query.order_by(order))
    }

    /// Every filter except the duplicate-address stage, unordered.
    pub fn build_base(&self, params: &SearchParams, ctx: &SearchContext) -> Result<VoteQuery> {
        let mut query = VoteQuery::new(self.target.clone()).order_by(Order::Unordered);

        let id_param = self.target.id_param();
        if let Some(ids) = self.id_list(params, &id_param) {
            query = query.filter(Condition::TargetIdIn(ids));
        }

        if let Some(ids) = self.user_ids(params, "user_id", "user_name")? {
            query = query.filter(Condition::UserIdIn(ids));
        }

        if !self.allows_complex_filters(params) {
            if params.keys().any(|k| self.is_complex_key(k)) {
                debug!("Complex filters skipped: no {}, user_id or user_name given", id_param);
            }
            return Ok(query);
        }

        let creator_ids = self.user_ids(
            params,
            &self.target.creator_id_param(),
            &self.target.creator_name_param(),
        )?;
        if let Some(ids) = creator_ids {
            query = query.filter(Condition::CreatorIdIn(ids));
        }

        if let Some(days) = params.get("timeframe") {
            let since = days
                .trim()
                .parse::<u32>()
                .ok()
                .and_then(|d| ctx.now.checked_sub_signed(Duration::days(i64::from(d))));
            match since {
                Some(since) => query = query.filter(Condition::UpdatedSince(since.timestamp())),
                None => warn!("Ignoring invalid timeframe {:?}", days),
            }
        }

        if let Some(addr) = params.get("user_ip_addr") {
            match IpRange::parse(&addr) {
                Some(range) => query = query.filter(Condition::IpWithin(range)),
                None => warn!("Ignoring invalid user_ip_addr {:?}", addr),
            }
        }

        if let Some(score_type) = params.get("score_type") {
            match VoteScore::from_param(&score_type) {
                Some(score) => query = query.filter(Condition::VoteScoreIs(score)),
                None => warn!("Ignoring invalid score_type {:?}", score_type),
            }
        }

        for key in SCORE_PARAMS {
            let Some(expr) = params.get(key) else { continue };
            match self.target.aggregate_column(key) {
                Some(column) => query = apply_score_filter(&query, &expr, column)?,
                None => debug!("{} has no column for {}", self.target.name, key),
            }
        }

        Ok(query)
    }

    fn is_complex_key(&self, key: &str) -> bool {
        matches!(
            key,
            "timeframe" | "user_ip_addr" | "score_type" | "score" | "downvotes" | "upvotes" | "duplicates_only"
        ) || key == self.target.creator_id_param()
            || key == self.target.creator_name_param()
    }

    /// Integer ids from a comma-separated parameter.
    ///
    /// `None` when the key is absent or no value parses.
    fn id_list(&self, params: &SearchParams, key: &str) -> Option<Vec<i64>> {
        let values = params.list(key, self.max_id_values)?;
        let ids: Vec<i64> = values.iter().filter_map(|v| v.parse().ok()).collect();
        if ids.is_empty() {
            warn!("Ignoring {}: no valid ids in {:?}", key, values);
            return None;
        }
        Some(ids)
    }

    /// Ids from `id_key`, or else names from `name_key` resolved to ids.
    fn user_ids(&self, params: &SearchParams, id_key: &str, name_key: &str) -> Result<Option<Vec<i64>>> {
        if params.is_present(id_key) {
            return Ok(self.id_list(params, id_key));
        }
        match params.list(name_key, self.max_id_values) {
            Some(names) => {
                let ids = self.users.ids_for_names(&names)?;
                debug!("Resolved {} {:?} to {} user(s)", name_key, names, ids.len());
                Ok(Some(ids))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::filters::{CompareOp, ScoreFilter};
    use crate::VoteSearchError;
    use chrono::TimeZone;

    struct Users(Vec<(&'static str, i64)>);

    impl UserLookup for Users {
        fn ids_for_names(&self, names: &[String]) -> Result<Vec<i64>> {
            Ok(self
                .0
                .iter()
                .filter(|(name, _)| names.iter().any(|n| n.eq_ignore_ascii_case(name)))
                .map(|(_, id)| *id)
                .collect())
        }
    }

    fn post_search() -> VoteSearch<Users> {
        VoteSearch::new(TargetConfig::post(), Users(vec![("alice", 1), ("bob", 2)]))
    }

    fn ctx() -> SearchContext {
        SearchContext::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
    }

    fn params(pairs: &[(&str, &str)]) -> SearchParams {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    fn search(pairs: &[(&str, &str)]) -> VoteQuery {
        post_search().search(&params(pairs), &ctx()).unwrap()
    }

    #[test]
    fn test_empty_params() {
        let query = search(&[]);
        assert!(query.conditions().is_empty());
        assert_eq!(query.ordering(), Order::Newest);
    }

    #[test]
    fn test_target_ids_capped_at_100() {
        let ids: Vec<String> = (1..=150).map(|i| i.to_string()).collect();
        let query = search(&[("post_id", &ids.join(","))]);

        match &query.conditions()[0] {
            Condition::TargetIdIn(got) => {
                assert_eq!(got.len(), 100);
                assert_eq!(got[0], 1);
                assert_eq!(got[99], 100);
            }
            other => panic!("unexpected condition {:?}", other),
        }
    }

    #[test]
    fn test_custom_id_cap() {
        let search = post_search().with_max_id_values(2);
        let query = search.search(&params(&[("post_id", "1,2,3")]), &ctx()).unwrap();
        assert_eq!(query.conditions()[0], Condition::TargetIdIn(vec![1, 2]));
    }

    #[test]
    fn test_invalid_ids_are_skipped() {
        let query = search(&[("post_id", "1,abc,3")]);
        assert_eq!(query.conditions()[0], Condition::TargetIdIn(vec![1, 3]));

        let query = search(&[("user_id", "abc")]);
        assert!(query.conditions().is_empty());
    }

    #[test]
    fn test_user_name_resolution() {
        let query = search(&[("user_name", "Alice,bob,carol")]);
        assert_eq!(query.conditions()[0], Condition::UserIdIn(vec![1, 2]));

        let query = search(&[("user_name", "nobody")]);
        assert_eq!(query.conditions()[0], Condition::UserIdIn(vec![]));
    }

    #[test]
    fn test_user_id_wins_over_user_name() {
        let query = search(&[("user_id", "9"), ("user_name", "alice")]);
        assert_eq!(query.conditions(), &[Condition::UserIdIn(vec![9])]);
    }

    #[test]
    fn test_complex_filters_gated() {
        let query = search(&[
            ("score", "5"),
            ("timeframe", "3"),
            ("user_ip_addr", "10.0.0.1"),
            ("duplicates_only", "true"),
        ]);
        assert!(query.conditions().is_empty());
        assert!(!query.joins_target());
    }

    #[test]
    fn test_score_without_gate_is_ignored_even_if_malformed() {
        let result = post_search().search(&params(&[("score", "abc")]), &ctx());
        assert!(result.is_ok());
    }

    #[test]
    fn test_blank_gate_key_still_opens_complex_filters() {
        let query = search(&[("user_id", ""), ("score", "5")]);
        assert_eq!(
            query.conditions(),
            &[Condition::Aggregate {
                column: "score".to_string(),
                filter: ScoreFilter::Exact(5),
            }]
        );

        let query = search(&[("post_id", " "), ("order", "ip_addr")]);
        assert_eq!(query.ordering(), Order::IpAddr);
    }

    #[test]
    fn test_complex_filters_with_user_id() {
        let query = search(&[
            ("user_id", "7"),
            ("timeframe", "3"),
            ("user_ip_addr", "10.0.0.0/8"),
            ("score_type", "-1"),
            ("score", ">5"),
            ("downvotes", "1..4"),
            ("upvotes", "<=10"),
        ]);

        let since = ctx().now - Duration::days(3);
        assert_eq!(
            query.conditions(),
            &[
                Condition::UserIdIn(vec![7]),
                Condition::UpdatedSince(since.timestamp()),
                Condition::IpWithin(IpRange::parse("10.0.0.0/8").unwrap()),
                Condition::VoteScoreIs(VoteScore::Down),
                Condition::Aggregate {
                    column: "score".to_string(),
                    filter: ScoreFilter::Compare(CompareOp::GreaterThan, 5),
                },
                Condition::Aggregate {
                    column: "down_score".to_string(),
                    filter: ScoreFilter::Range(1, 4),
                },
                Condition::Aggregate {
                    column: "up_score".to_string(),
                    filter: ScoreFilter::Compare(CompareOp::LessEqual, 10),
                },
            ]
        );
        assert!(query.joins_target());
    }

    #[test]
    fn test_invalid_optional_values_ignored() {
        let query = search(&[
            ("post_id", "1"),
            ("timeframe", "-2"),
            ("user_ip_addr", "nowhere"),
            ("score_type", "sideways"),
        ]);
        assert_eq!(query.conditions(), &[Condition::TargetIdIn(vec![1])]);
    }

    #[test]
    fn test_malformed_score_is_error() {
        let err = post_search()
            .search(&params(&[("post_id", "1"), ("upvotes", "1..2..3")]), &ctx())
            .unwrap_err();
        match err {
            VoteSearchError::Format { input, column } => {
                assert_eq!(input, "1..2..3");
                assert_eq!(column, "up_score");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_comment_targets_ignore_up_down() {
        let search = VoteSearch::new(TargetConfig::comment(), Users(vec![]));
        let query = search
            .search(
                &params(&[("comment_id", "3"), ("upvotes", ">1"), ("downvotes", "garbage")]),
                &ctx(),
            )
            .unwrap();
        assert_eq!(query.conditions(), &[Condition::TargetIdIn(vec![3])]);
    }

    #[test]
    fn test_creator_filters() {
        let query = search(&[("post_id", "1"), ("post_creator_name", "bob")]);
        assert_eq!(query.conditions()[1], Condition::CreatorIdIn(vec![2]));
        assert!(query.joins_target());

        let query = search(&[("user_id", "1"), ("post_creator_id", "5,6")]);
        assert_eq!(query.conditions()[1], Condition::CreatorIdIn(vec![5, 6]));

        let query = search(&[("post_creator_id", "5")]);
        assert!(query.conditions().is_empty());
    }

    #[test]
    fn test_duplicates_only_stages() {
        let p = params(&[("user_id", "1,2,3"), ("duplicates_only", "true")]);
        let search = post_search();
        let query = search.search(&p, &ctx()).unwrap();

        let base = search.build_base(&p.without("duplicates_only"), &ctx()).unwrap();
        assert_eq!(
            query.conditions(),
            &[
                Condition::UserIdIn(vec![1, 2, 3]),
                Condition::IpIn(base.duplicate_ips()),
            ]
        );
    }

    #[test]
    fn test_duplicates_only_looks_up_names_once() {
        use std::cell::Cell;

        struct Counting(Cell<usize>);

        impl UserLookup for Counting {
            fn ids_for_names(&self, _names: &[String]) -> Result<Vec<i64>> {
                self.0.set(self.0.get() + 1);
                Ok(vec![1])
            }
        }

        let search = VoteSearch::new(TargetConfig::post(), Counting(Cell::new(0)));
        search
            .search(&params(&[("user_name", "alice"), ("duplicates_only", "1")]), &ctx())
            .unwrap();
        assert_eq!(search.users.0.get(), 1);
    }

    #[test]
    fn test_duplicates_only_false() {
        let query = search(&[("user_id", "1"), ("duplicates_only", "false")]);
        assert_eq!(query.conditions(), &[Condition::UserIdIn(vec![1])]);
    }

    #[test]
    fn test_ip_order_requires_gate() {
        assert_eq!(search(&[("order", "ip_addr"), ("user_id", "7")]).ordering(), Order::IpAddr);
        assert_eq!(search(&[("order", "ip_addr")]).ordering(), Order::Newest);
    }

    #[test]
    fn test_basic_orders() {
        assert_eq!(search(&[("order", "id_asc")]).ordering(), Order::IdAsc);
        assert_eq!(search(&[("order", "id_desc")]).ordering(), Order::IdDesc);
        assert_eq!(search(&[("order", "sideways")]).ordering(), Order::Newest);
    }

    #[test]
    fn test_search_context_from_vote_context() {
        let vote_ctx = VoteContext::new(1, None);
        let search_ctx = SearchContext::from(&vote_ctx);
        assert_eq!(search_ctx.now, vote_ctx.now);
    }
}
