//! Vote query descriptors and their SQL rendering.
//!
//! A [`VoteQuery`] is a value: building one never touches the database.
//! Rendering produces a parameterized statement with `?` placeholders,
//! so no search value is ever spliced into SQL text.

use super::filters::Condition;
use super::inet::{SQL_CONTAINS_FN, SQL_SORT_KEY_FN};
use crate::target::TargetConfig;

/// SQL parameter value for prepared statements.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// Text parameter (addresses, networks)
    Text(String),
    /// Integer parameter (ids, scores, timestamps, limits)
    Integer(i64),
}

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Newest first: created_at DESC, id DESC
    #[default]
    Newest,
    /// id ASC
    IdAsc,
    /// id DESC
    IdDesc,
    /// Numeric IP address ascending, votes without an address last
    IpAddr,
    /// No ORDER BY clause
    Unordered,
}

/// A composable, unexecuted query over one vote table.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteQuery {
    target: TargetConfig,
    conditions: Vec<Condition>,
    join_target: bool,
    order: Order,
    limit: Option<i64>,
    offset: Option<i64>,
}

/// The set of addresses used by more than one vote of a base query.
///
/// Renders as `SELECT ip ... GROUP BY ip HAVING COUNT(ip) > 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateIps {
    base: Box<VoteQuery>,
}

impl DuplicateIps {
    /// The query whose addresses are grouped.
    pub fn base(&self) -> &VoteQuery {
        &self.base
    }

    /// Render the grouped address subquery.
    pub fn to_sql(&self) -> (String, Vec<SqlParam>) {
        let mut params = Vec::new();
        let sql = self.render(&mut params);
        (sql, params)
    }

    fn render(&self, params: &mut Vec<SqlParam>) -> String {
        let ip = self.base.vote_column("user_ip_addr");
        format!(
            "SELECT {ip} {from} GROUP BY {ip} HAVING COUNT({ip}) > 1",
            ip = ip,
            from = self.base.render_from_where(params),
        )
    }
}

impl VoteQuery {
    /// Unfiltered query over all votes of `target`.
    pub fn new(target: TargetConfig) -> Self {
        Self {
            target,
            conditions: Vec::new(),
            join_target: false,
            order: Order::default(),
            limit: None,
            offset: None,
        }
    }

    pub fn target(&self) -> &TargetConfig {
        &self.target
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn joins_target(&self) -> bool {
        self.join_target
    }

    pub fn ordering(&self) -> Order {
        self.order
    }

    /// Add a condition. Conditions on target columns join the target table.
    pub fn filter(mut self, condition: Condition) -> Self {
        if condition.needs_target_join() {
            self.join_target = true;
        }
        self.conditions.push(condition);
        self
    }

    /// Join the target table; joining twice is a no-op.
    pub fn join_target(mut self) -> Self {
        self.join_target = true;
        self
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Addresses shared by more than one row of this query.
    ///
    /// Ordering and paging of this query do not apply to the grouping.
    pub fn duplicate_ips(&self) -> DuplicateIps {
        let mut base = self.clone().order_by(Order::Unordered);
        base.limit = None;
        base.offset = None;
        DuplicateIps {
            base: Box::new(base),
        }
    }

    /// Keep only votes whose address is in `ips`.
    pub fn restrict_ips_to(self, ips: DuplicateIps) -> Self {
        self.filter(Condition::IpIn(ips))
    }

    /// Render the full SELECT statement.
    ///
    /// Returns a tuple of (SQL statement, parameters). Selected columns are
    /// id, user_id, target id, score, user_ip_addr, created_at, updated_at.
    pub fn to_sql(&self) -> (String, Vec<SqlParam>) {
        let mut params = Vec::new();
        let columns = [
            "id",
            "user_id",
            self.target.target_column.as_str(),
            "score",
            "user_ip_addr",
            "created_at",
            "updated_at",
        ]
        .iter()
        .map(|c| self.vote_column(c))
        .collect::<Vec<_>>()
        .join(", ");

        let mut sql = format!("SELECT {} {}", columns, self.render_from_where(&mut params));

        if let Some(order) = self.render_order() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order);
        }

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(" LIMIT ? OFFSET ?");
                params.push(SqlParam::Integer(limit));
                params.push(SqlParam::Integer(offset));
            }
            (Some(limit), None) => {
                sql.push_str(" LIMIT ?");
                params.push(SqlParam::Integer(limit));
            }
            (None, Some(offset)) => {
                // SQLite only accepts OFFSET after LIMIT; -1 means unbounded
                sql.push_str(" LIMIT -1 OFFSET ?");
                params.push(SqlParam::Integer(offset));
            }
            (None, None) => {}
        }

        (sql, params)
    }

    /// Render a `SELECT COUNT(*)` over the same rows, ignoring order and paging.
    pub fn count_sql(&self) -> (String, Vec<SqlParam>) {
        let mut params = Vec::new();
        let sql = format!("SELECT COUNT(*) {}", self.render_from_where(&mut params));
        (sql, params)
    }

    fn vote_column(&self, column: &str) -> String {
        format!("{}.{}", self.target.vote_table, column)
    }

    fn target_column(&self, column: &str) -> String {
        format!("{}.{}", self.target.target_table, column)
    }

    fn render_from_where(&self, params: &mut Vec<SqlParam>) -> String {
        let mut sql = format!("FROM {}", self.target.vote_table);

        if self.join_target {
            sql.push_str(&format!(
                " INNER JOIN {tt} ON {tt}.id = {vt}.{tc}",
                tt = self.target.target_table,
                vt = self.target.vote_table,
                tc = self.target.target_column,
            ));
        }

        if !self.conditions.is_empty() {
            let clauses: Vec<String> = self
                .conditions
                .iter()
                .map(|c| self.render_condition(c, params))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        sql
    }

    fn render_condition(&self, condition: &Condition, params: &mut Vec<SqlParam>) -> String {
        match condition {
            Condition::TargetIdIn(ids) => {
                in_list(&self.vote_column(&self.target.target_column), ids, params)
            }
            Condition::UserIdIn(ids) => in_list(&self.vote_column("user_id"), ids, params),
            Condition::CreatorIdIn(ids) => {
                in_list(&self.target_column(&self.target.creator_column), ids, params)
            }
            Condition::UpdatedSince(timestamp) => {
                params.push(SqlParam::Integer(*timestamp));
                format!("{} >= ?", self.vote_column("updated_at"))
            }
            Condition::IpWithin(range) => {
                params.push(SqlParam::Text(range.to_string()));
                format!("{}(?, {}) = 1", SQL_CONTAINS_FN, self.vote_column("user_ip_addr"))
            }
            Condition::VoteScoreIs(score) => {
                params.push(SqlParam::Integer(score.value()));
                format!("{} = ?", self.vote_column("score"))
            }
            Condition::Aggregate { column, filter } => {
                let (sql, values) = filter.to_sql(&self.target_column(column));
                params.extend(values.into_iter().map(SqlParam::Integer));
                format!("({})", sql)
            }
            Condition::IpIn(ips) => {
                format!("{} IN ({})", self.vote_column("user_ip_addr"), ips.render(params))
            }
        }
    }

    fn render_order(&self) -> Option<String> {
        match self.order {
            Order::Newest => Some(format!(
                "{} DESC, {} DESC",
                self.vote_column("created_at"),
                self.vote_column("id")
            )),
            Order::IdAsc => Some(format!("{} ASC", self.vote_column("id"))),
            Order::IdDesc => Some(format!("{} DESC", self.vote_column("id"))),
            Order::IpAddr => {
                let ip = self.vote_column("user_ip_addr");
                Some(format!(
                    "{ip} IS NULL, {key}({ip}) ASC, {id} ASC",
                    ip = ip,
                    key = SQL_SORT_KEY_FN,
                    id = self.vote_column("id"),
                ))
            }
            Order::Unordered => None,
        }
    }
}

/// Longest id list rendered as one `?` per id.
///
/// Longer lists (user name wildcards can resolve to any number of users)
/// are bound as a single JSON array so SQLite's variable limit never applies.
pub const MAX_INLINE_IDS: usize = 100;

fn in_list(expr: &str, ids: &[i64], params: &mut Vec<SqlParam>) -> String {
    if ids.is_empty() {
        return "0 = 1".to_string();
    }
    if ids.len() > MAX_INLINE_IDS {
        let json = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
        params.push(SqlParam::Text(format!("[{}]", json)));
        return format!("{} IN (SELECT value FROM json_each(?))", expr);
    }
    params.extend(ids.iter().map(|id| SqlParam::Integer(*id)));
    let placeholders = vec!["?"; ids.len()].join(", ");
    format!("{} IN ({})", expr, placeholders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::filters::{CompareOp, ScoreFilter};
    use crate::search::inet::IpRange;
    use crate::vote::VoteScore;

    fn post_query() -> VoteQuery {
        VoteQuery::new(TargetConfig::post())
    }

    #[test]
    fn test_unfiltered_query() {
        let (sql, params) = post_query().to_sql();

        assert!(sql.starts_with("SELECT post_votes.id, post_votes.user_id, post_votes.post_id"));
        assert!(sql.contains("FROM post_votes"));
        assert!(!sql.contains("WHERE"));
        assert!(!sql.contains("JOIN"));
        assert!(sql.ends_with("ORDER BY post_votes.created_at DESC, post_votes.id DESC"));
        assert!(params.is_empty());
    }

    #[test]
    fn test_target_ids() {
        let (sql, params) = post_query().filter(Condition::TargetIdIn(vec![1, 2, 3])).to_sql();

        assert!(sql.contains("WHERE post_votes.post_id IN (?, ?, ?)"));
        assert_eq!(
            params,
            vec![SqlParam::Integer(1), SqlParam::Integer(2), SqlParam::Integer(3)]
        );
    }

    #[test]
    fn test_long_id_list_binds_one_json_array() {
        let ids: Vec<i64> = (1..=40_000).collect();
        let query = post_query().filter(Condition::UserIdIn(ids));
        let (sql, params) = query.to_sql();

        assert!(sql.contains("WHERE post_votes.user_id IN (SELECT value FROM json_each(?))"));
        assert_eq!(params.len(), 1);
        match &params[0] {
            SqlParam::Text(json) => {
                assert!(json.starts_with("[1,2,3,"));
                assert!(json.ends_with(",40000]"));
            }
            other => panic!("expected JSON text, got {:?}", other),
        }

        let (_, params) = query.clone().restrict_ips_to(query.duplicate_ips()).to_sql();
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_id_list_at_inline_limit_uses_placeholders() {
        let ids: Vec<i64> = (1..=MAX_INLINE_IDS as i64).collect();
        let (sql, params) = post_query().filter(Condition::TargetIdIn(ids)).to_sql();

        assert!(!sql.contains("json_each"));
        assert_eq!(params.len(), MAX_INLINE_IDS);
    }

    #[test]
    fn test_empty_id_list_matches_nothing() {
        let (sql, params) = post_query().filter(Condition::UserIdIn(vec![])).to_sql();

        assert!(sql.contains("WHERE 0 = 1"));
        assert!(params.is_empty());
    }

    #[test]
    fn test_conditions_joined_with_and_in_order() {
        let query = post_query()
            .filter(Condition::UserIdIn(vec![7]))
            .filter(Condition::VoteScoreIs(VoteScore::Down))
            .filter(Condition::UpdatedSince(1_700_000_000));
        let (sql, params) = query.to_sql();

        assert!(sql.contains(
            "WHERE post_votes.user_id IN (?) AND post_votes.score = ? AND post_votes.updated_at >= ?"
        ));
        assert_eq!(
            params,
            vec![
                SqlParam::Integer(7),
                SqlParam::Integer(-1),
                SqlParam::Integer(1_700_000_000)
            ]
        );
    }

    #[test]
    fn test_aggregate_joins_once() {
        let query = post_query()
            .join_target()
            .filter(Condition::Aggregate {
                column: "score".to_string(),
                filter: ScoreFilter::Compare(CompareOp::GreaterThan, 5),
            })
            .filter(Condition::Aggregate {
                column: "down_score".to_string(),
                filter: ScoreFilter::Exact(0),
            });
        let (sql, _) = query.to_sql();

        assert_eq!(sql.matches("INNER JOIN").count(), 1);
        assert!(sql.contains("(posts.score > ?)"));
        assert!(sql.contains("(posts.down_score = ?)"));
    }

    #[test]
    fn test_creator_filter_uses_target_column() {
        let (sql, _) = VoteQuery::new(TargetConfig::comment())
            .filter(Condition::CreatorIdIn(vec![4]))
            .to_sql();

        assert!(sql.contains("INNER JOIN comments ON comments.id = comment_votes.comment_id"));
        assert!(sql.contains("comments.creator_id IN (?)"));
    }

    #[test]
    fn test_ip_range_is_parameterized() {
        let range = IpRange::parse("10.0.0.0/8").unwrap();
        let (sql, params) = post_query().filter(Condition::IpWithin(range)).to_sql();

        assert!(sql.contains("inet_contains(?, post_votes.user_ip_addr) = 1"));
        assert_eq!(params, vec![SqlParam::Text("10.0.0.0/8".to_string())]);
    }

    #[test]
    fn test_duplicate_ip_subquery() {
        let base = post_query()
            .filter(Condition::UserIdIn(vec![1, 2]))
            .order_by(Order::IpAddr)
            .limit(20);
        let dupes = base.duplicate_ips();
        let (sub_sql, sub_params) = dupes.to_sql();

        assert_eq!(
            sub_sql,
            "SELECT post_votes.user_ip_addr FROM post_votes \
             WHERE post_votes.user_id IN (?, ?) \
             GROUP BY post_votes.user_ip_addr HAVING COUNT(post_votes.user_ip_addr) > 1"
        );
        assert_eq!(sub_params.len(), 2);
        assert_eq!(dupes.base().ordering(), Order::Unordered);

        let (sql, params) = base.clone().restrict_ips_to(dupes).to_sql();
        assert!(sql.contains("AND post_votes.user_ip_addr IN (SELECT post_votes.user_ip_addr FROM"));
        // outer user ids, inner user ids, limit
        assert_eq!(params.len(), 5);
        assert_eq!(params.last(), Some(&SqlParam::Integer(20)));
    }

    #[test]
    fn test_orderings() {
        let (sql, _) = post_query().order_by(Order::IdAsc).to_sql();
        assert!(sql.ends_with("ORDER BY post_votes.id ASC"));

        let (sql, _) = post_query().order_by(Order::IdDesc).to_sql();
        assert!(sql.ends_with("ORDER BY post_votes.id DESC"));

        let (sql, _) = post_query().order_by(Order::IpAddr).to_sql();
        assert!(sql.contains("ORDER BY post_votes.user_ip_addr IS NULL, inet_key(post_votes.user_ip_addr) ASC"));

        let (sql, _) = post_query().order_by(Order::Unordered).to_sql();
        assert!(!sql.contains("ORDER BY"));
    }

    #[test]
    fn test_paging() {
        let (sql, params) = post_query().limit(50).offset(100).to_sql();
        assert!(sql.ends_with("LIMIT ? OFFSET ?"));
        assert_eq!(params, vec![SqlParam::Integer(50), SqlParam::Integer(100)]);

        let (sql, params) = post_query().offset(10).to_sql();
        assert!(sql.ends_with("LIMIT -1 OFFSET ?"));
        assert_eq!(params, vec![SqlParam::Integer(10)]);
    }

    #[test]
    fn test_count_ignores_order_and_paging() {
        let (sql, params) = post_query()
            .filter(Condition::TargetIdIn(vec![9]))
            .limit(5)
            .count_sql();

        assert_eq!(sql, "SELECT COUNT(*) FROM post_votes WHERE post_votes.post_id IN (?)");
        assert_eq!(params, vec![SqlParam::Integer(9)]);
    }
}
