//! Database operations module - vote recording and query execution.
//!
//! This module provides the operations behind vote searches: recording
//! votes, executing [`VoteQuery`] descriptors, and the small inserts for
//! users, posts and comments that votes point at.

use std::net::IpAddr;

use rusqlite::types::{ToSqlOutput, Type};
use rusqlite::{params, params_from_iter, Connection, Row, ToSql};

use super::users::SqliteUserLookup;
use crate::search::{SearchContext, SearchParams, SqlParam, VoteQuery, VoteSearch};
use crate::target::TargetConfig;
use crate::vote::{NewVote, Vote, VoteContext, VoteScore};
use crate::{Result, VoteSearchError};

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SqlParam::Text(text) => text.to_sql(),
            SqlParam::Integer(value) => value.to_sql(),
        }
    }
}

/// A post to insert.
#[derive(Debug, Clone, Default)]
pub struct PostEntry {
    /// Uploading user
    pub uploader_id: i64,
    /// Net score
    pub score: i64,
    /// Up vote count
    pub up_score: i64,
    /// Down vote count
    pub down_score: i64,
}

/// Map a row selected by [`VoteQuery::to_sql`] to a [`Vote`].
fn map_vote(row: &Row<'_>) -> rusqlite::Result<Vote> {
    let raw_score: i64 = row.get(3)?;
    let score = VoteScore::try_from(raw_score)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Integer, Box::new(e)))?;
    let ip: Option<String> = row.get(4)?;

    Ok(Vote {
        id: row.get(0)?,
        user_id: row.get(1)?,
        target_id: row.get(2)?,
        score,
        user_ip_addr: ip.and_then(|s| s.parse::<IpAddr>().ok()),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Execute a vote query and return the matching votes in query order.
pub fn fetch_votes(conn: &Connection, query: &VoteQuery) -> Result<Vec<Vote>> {
    let (sql, params) = query.to_sql();
    tracing::debug!("Executing vote search: {}", sql);

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| VoteSearchError::Database(format!("Failed to prepare search: {}", e)))?;

    let rows = stmt
        .query_map(params_from_iter(params.iter()), map_vote)
        .map_err(|e| VoteSearchError::Database(format!("Failed to execute search: {}", e)))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row.map_err(|e| VoteSearchError::Database(format!("Failed to read row: {}", e)))?);
    }

    tracing::info!("Vote search on {} returned {} row(s)", query.target().vote_table, results.len());
    Ok(results)
}

/// Count the votes a query matches, ignoring its paging.
pub fn count_votes(conn: &Connection, query: &VoteQuery) -> Result<i64> {
    let (sql, params) = query.count_sql();
    conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))
        .map_err(|e| VoteSearchError::Database(format!("Failed to count votes: {}", e)))
}

/// Build and run a search in one step, resolving user names from `conn`.
pub fn search_votes(
    conn: &Connection,
    target: &TargetConfig,
    params: &SearchParams,
    ctx: &SearchContext,
) -> Result<Vec<Vote>> {
    let query = VoteSearch::new(target.clone(), SqliteUserLookup::new(conn)).search(params, ctx)?;
    fetch_votes(conn, &query)
}

/// Record a vote, creating it or changing the score of an existing one.
///
/// The user and address default from `ctx`. A second vote by the same user
/// on the same target updates score, address and `updated_at`, keeping
/// `created_at`.
pub fn record_vote(conn: &Connection, target: &TargetConfig, vote: &NewVote, ctx: &VoteContext) -> Result<Vote> {
    let (user_id, ip) = vote.resolve(ctx);
    let now = ctx.now.timestamp();

    let sql = format!(
        "INSERT INTO {vt} ({tc}, user_id, score, user_ip_addr, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(user_id, {tc}) DO UPDATE SET
             score = excluded.score,
             user_ip_addr = excluded.user_ip_addr,
             updated_at = excluded.updated_at",
        vt = target.vote_table,
        tc = target.target_column,
    );

    conn.execute(
        &sql,
        params![vote.target_id, user_id, vote.score.value(), ip.map(|a| a.to_string()), now],
    )
    .map_err(|e| VoteSearchError::Database(format!("Failed to record vote: {}", e)))?;

    tracing::debug!(
        "Recorded {} vote {} by user {} on {}",
        target.name,
        vote.score.value(),
        user_id,
        vote.target_id
    );

    get_vote(conn, target, user_id, vote.target_id)?
        .ok_or_else(|| VoteSearchError::Database("Recorded vote not found".to_string()))
}

/// Get one user's vote on one target.
pub fn get_vote(conn: &Connection, target: &TargetConfig, user_id: i64, target_id: i64) -> Result<Option<Vote>> {
    let sql = format!(
        "SELECT id, user_id, {tc}, score, user_ip_addr, created_at, updated_at
         FROM {vt} WHERE user_id = ?1 AND {tc} = ?2",
        vt = target.vote_table,
        tc = target.target_column,
    );

    match conn.query_row(&sql, params![user_id, target_id], map_vote) {
        Ok(vote) => Ok(Some(vote)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(VoteSearchError::Database(format!("Failed to get vote: {}", e))),
    }
}

/// Insert a user, returning its ID.
pub fn insert_user(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute("INSERT INTO users (name) VALUES (?1)", params![name])
        .map_err(|e| VoteSearchError::Database(format!("Failed to insert user: {}", e)))?;
    Ok(conn.last_insert_rowid())
}

/// Insert a post, returning its ID.
pub fn insert_post(conn: &Connection, post: &PostEntry) -> Result<i64> {
    conn.execute(
        "INSERT INTO posts (uploader_id, score, up_score, down_score) VALUES (?1, ?2, ?3, ?4)",
        params![post.uploader_id, post.score, post.up_score, post.down_score],
    )
    .map_err(|e| VoteSearchError::Database(format!("Failed to insert post: {}", e)))?;
    Ok(conn.last_insert_rowid())
}

/// Insert a comment on a post, returning its ID.
pub fn insert_comment(conn: &Connection, post_id: i64, creator_id: i64, score: i64) -> Result<i64> {
    conn.execute(
        "INSERT INTO comments (post_id, creator_id, score) VALUES (?1, ?2, ?3)",
        params![post_id, creator_id, score],
    )
    .map_err(|e| VoteSearchError::Database(format!("Failed to insert comment: {}", e)))?;
    Ok(conn.last_insert_rowid())
}
