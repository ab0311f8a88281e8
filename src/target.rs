//! Votable target descriptions.
//!
//! Post votes and comment votes share one search implementation; the
//! difference between them is only which tables and columns are involved.

use serde::{Deserialize, Serialize};

use crate::{Result, VoteSearchError};

/// Table and column names for one kind of votable target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Short name used as the parameter prefix (`post` -> `post_id`)
    pub name: String,
    /// Table holding the votes
    pub vote_table: String,
    /// Table holding the targets
    pub target_table: String,
    /// Column on the vote table referencing the target
    pub target_column: String,
    /// Column on the target table holding its creator's user id
    pub creator_column: String,
    /// Aggregate score column on the target table
    pub score_column: String,
    /// Aggregate down-vote column, if the target tracks one
    #[serde(default)]
    pub down_score_column: Option<String>,
    /// Aggregate up-vote column, if the target tracks one
    #[serde(default)]
    pub up_score_column: Option<String>,
}

impl TargetConfig {
    /// Votes on posts (`post_votes` joined to `posts`).
    pub fn post() -> Self {
        Self {
            name: "post".to_string(),
            vote_table: "post_votes".to_string(),
            target_table: "posts".to_string(),
            target_column: "post_id".to_string(),
            creator_column: "uploader_id".to_string(),
            score_column: "score".to_string(),
            down_score_column: Some("down_score".to_string()),
            up_score_column: Some("up_score".to_string()),
        }
    }

    /// Votes on comments (`comment_votes` joined to `comments`).
    ///
    /// Comments only carry a net score.
    pub fn comment() -> Self {
        Self {
            name: "comment".to_string(),
            vote_table: "comment_votes".to_string(),
            target_table: "comments".to_string(),
            target_column: "comment_id".to_string(),
            creator_column: "creator_id".to_string(),
            score_column: "score".to_string(),
            down_score_column: None,
            up_score_column: None,
        }
    }

    /// Look up a built-in target by name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "post" => Some(Self::post()),
            "comment" => Some(Self::comment()),
            _ => None,
        }
    }

    /// Check that every table and column name is a plain SQL identifier.
    ///
    /// Names are spliced into generated SQL, so anything else is rejected.
    pub fn validate(&self) -> Result<()> {
        let mut names = vec![
            &self.name,
            &self.vote_table,
            &self.target_table,
            &self.target_column,
            &self.creator_column,
            &self.score_column,
        ];
        names.extend(self.down_score_column.iter());
        names.extend(self.up_score_column.iter());

        for name in names {
            if !is_identifier(name) {
                return Err(VoteSearchError::Config(format!(
                    "Invalid identifier in target '{}': {:?}",
                    self.name, name
                )));
            }
        }
        Ok(())
    }

    /// Parameter key restricting target ids (`post_id`).
    pub fn id_param(&self) -> String {
        format!("{}_id", self.name)
    }

    /// Parameter key restricting target creators by id (`post_creator_id`).
    pub fn creator_id_param(&self) -> String {
        format!("{}_creator_id", self.name)
    }

    /// Parameter key restricting target creators by name (`post_creator_name`).
    pub fn creator_name_param(&self) -> String {
        format!("{}_creator_name", self.name)
    }

    /// Resolve a score-filter parameter key to its aggregate column.
    ///
    /// Returns `None` for `downvotes`/`upvotes` when the target has no
    /// such column.
    pub fn aggregate_column(&self, param: &str) -> Option<&str> {
        match param {
            "score" => Some(self.score_column.as_str()),
            "downvotes" => self.down_score_column.as_deref(),
            "upvotes" => self.up_score_column.as_deref(),
            _ => None,
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
