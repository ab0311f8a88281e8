//! Database schema module - table definitions.
//!
//! This module contains the SQL schema for the vote database: users, the
//! two votable targets, and one vote table per target.

use rusqlite::Connection;

use crate::{Result, VoteSearchError};

/// Initialize the database schema.
///
/// Creates tables and indexes if they don't already exist. This is called
/// on every database open.
///
/// # Schema
///
/// ## users table
/// - `id`: Primary key
/// - `name`: Unique, case-insensitive user name
///
/// ## posts / comments tables
/// - `uploader_id` / `creator_id`: User who created the target
/// - `score`: Net vote score
/// - `up_score`, `down_score`: Vote counts (posts only)
///
/// ## post_votes / comment_votes tables
/// - `user_id`: Voting user
/// - `post_id` / `comment_id`: Voted target
/// - `score`: -1, 0 (locked) or 1
/// - `user_ip_addr`: Canonical textual address, NULL if unknown
/// - `created_at`, `updated_at`: Unix timestamps
///
/// One vote per (user, target) is enforced by a unique index.
pub fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY,
            uploader_id INTEGER NOT NULL REFERENCES users(id),
            score INTEGER NOT NULL DEFAULT 0,
            up_score INTEGER NOT NULL DEFAULT 0,
            down_score INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY,
            post_id INTEGER NOT NULL REFERENCES posts(id),
            creator_id INTEGER NOT NULL REFERENCES users(id),
            score INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE TABLE IF NOT EXISTS post_votes (
            id INTEGER PRIMARY KEY,
            post_id INTEGER NOT NULL REFERENCES posts(id),
            user_id INTEGER NOT NULL REFERENCES users(id),
            score INTEGER NOT NULL CHECK (score IN (-1, 0, 1)),
            user_ip_addr TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS comment_votes (
            id INTEGER PRIMARY KEY,
            comment_id INTEGER NOT NULL REFERENCES comments(id),
            user_id INTEGER NOT NULL REFERENCES users(id),
            score INTEGER NOT NULL CHECK (score IN (-1, 0, 1)),
            user_ip_addr TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_post_votes_user_post ON post_votes(user_id, post_id);
        CREATE INDEX IF NOT EXISTS idx_post_votes_post ON post_votes(post_id);
        CREATE INDEX IF NOT EXISTS idx_post_votes_created ON post_votes(user_id, created_at);

        CREATE UNIQUE INDEX IF NOT EXISTS idx_comment_votes_user_comment ON comment_votes(user_id, comment_id);
        CREATE INDEX IF NOT EXISTS idx_comment_votes_comment ON comment_votes(comment_id);
        CREATE INDEX IF NOT EXISTS idx_comment_votes_created ON comment_votes(created_at);

        CREATE INDEX IF NOT EXISTS idx_comments_creator ON comments(creator_id);
        CREATE INDEX IF NOT EXISTS idx_posts_uploader ON posts(uploader_id);
        "#,
    )
    .map_err(|e| VoteSearchError::Database(format!("Failed to initialize schema: {}", e)))?;

    Ok(())
}
