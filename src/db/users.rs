//! User name resolution against the `users` table.

use rusqlite::{params, Connection};

use crate::search::UserLookup;
use crate::{Result, VoteSearchError};

/// [`UserLookup`] backed by a SQLite connection.
///
/// Names match case-insensitively; spaces are treated as underscores and
/// `*` is a wildcard (`ali*` matches `alice`).
pub struct SqliteUserLookup<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteUserLookup<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl UserLookup for SqliteUserLookup<'_> {
    fn ids_for_names(&self, names: &[String]) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = Vec::new();

        for name in names {
            let name = normalize_name(name);
            if name.is_empty() {
                continue;
            }

            let (sql, value) = if name.contains('*') {
                (
                    "SELECT id FROM users WHERE name LIKE ?1 ESCAPE '\\' ORDER BY id",
                    convert_wildcards_to_sql(&name),
                )
            } else {
                ("SELECT id FROM users WHERE name = ?1 COLLATE NOCASE ORDER BY id", name)
            };

            let mut stmt = self
                .conn
                .prepare_cached(sql)
                .map_err(|e| VoteSearchError::Database(format!("Failed to prepare user lookup: {}", e)))?;
            let rows = stmt
                .query_map(params![value], |row| row.get::<_, i64>(0))
                .map_err(|e| VoteSearchError::Database(format!("Failed to look up users: {}", e)))?;

            for row in rows {
                let id = row.map_err(|e| VoteSearchError::Database(format!("Failed to read row: {}", e)))?;
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }

        Ok(ids)
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().replace(' ', "_")
}

/// Convert a `*` wildcard name to a SQL LIKE pattern.
///
/// - `*` becomes `%`
/// - `%`, `_`, `\` in input are escaped with `\`
fn convert_wildcards_to_sql(pattern: &str) -> String {
    let mut result = String::with_capacity(pattern.len() + 4);

    for c in pattern.chars() {
        match c {
            '*' => result.push('%'),
            '%' | '_' | '\\' => {
                result.push('\\');
                result.push(c);
            }
            _ => result.push(c),
        }
    }

    result
}
