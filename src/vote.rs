//! Vote records and the request context they are created under.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, VoteSearchError};

/// The three allowed vote scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum VoteScore {
    /// Down vote (-1)
    Down,
    /// Locked vote (0); neutral and no longer counted
    Locked,
    /// Up vote (+1)
    Up,
}

impl VoteScore {
    /// Integer value stored in the score column.
    pub fn value(self) -> i64 {
        match self {
            VoteScore::Down => -1,
            VoteScore::Locked => 0,
            VoteScore::Up => 1,
        }
    }

    /// Parse a `score_type` search value: `-1`/`0`/`1` or `down`/`locked`/`up`.
    pub fn from_param(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "-1" | "down" => Some(VoteScore::Down),
            "0" | "locked" => Some(VoteScore::Locked),
            "1" | "up" => Some(VoteScore::Up),
            _ => None,
        }
    }
}

impl TryFrom<i64> for VoteScore {
    type Error = VoteSearchError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            -1 => Ok(VoteScore::Down),
            0 => Ok(VoteScore::Locked),
            1 => Ok(VoteScore::Up),
            other => Err(VoteSearchError::InvalidScore(other)),
        }
    }
}

impl From<VoteScore> for i64 {
    fn from(score: VoteScore) -> i64 {
        score.value()
    }
}

/// A stored vote on a post or comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    /// Database ID
    pub id: i64,
    /// Voting user
    pub user_id: i64,
    /// Post or comment the vote is on
    pub target_id: i64,
    /// Vote score
    pub score: VoteScore,
    /// Address the vote was cast from
    pub user_ip_addr: Option<IpAddr>,
    /// Creation time as Unix timestamp
    pub created_at: i64,
    /// Last score change as Unix timestamp
    pub updated_at: i64,
}

impl Vote {
    pub fn is_positive(&self) -> bool {
        self.score == VoteScore::Up
    }

    pub fn is_negative(&self) -> bool {
        self.score == VoteScore::Down
    }

    pub fn is_locked(&self) -> bool {
        self.score == VoteScore::Locked
    }
}

/// Who is acting, from where, and when.
///
/// Passed explicitly into everything that needs request identity.
#[derive(Debug, Clone)]
pub struct VoteContext {
    /// Current user id
    pub user_id: i64,
    /// Current request address
    pub ip_addr: Option<IpAddr>,
    /// Request time
    pub now: DateTime<Utc>,
}

impl VoteContext {
    pub fn new(user_id: i64, ip_addr: Option<IpAddr>) -> Self {
        Self {
            user_id,
            ip_addr,
            now: Utc::now(),
        }
    }
}

/// A vote about to be recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVote {
    /// Voting user; defaults to the context user
    pub user_id: Option<i64>,
    /// Post or comment being voted on
    pub target_id: i64,
    /// Vote score
    pub score: VoteScore,
    /// Origin address; defaults to the context address
    pub user_ip_addr: Option<IpAddr>,
}

impl NewVote {
    /// Vote by whoever the context says is acting.
    pub fn new(target_id: i64, score: VoteScore) -> Self {
        Self {
            user_id: None,
            target_id,
            score,
            user_ip_addr: None,
        }
    }

    /// Vote from a raw integer score, rejecting anything but -1, 0, 1.
    pub fn with_raw_score(target_id: i64, score: i64) -> Result<Self> {
        Ok(Self::new(target_id, VoteScore::try_from(score)?))
    }

    /// Vote on behalf of a specific user.
    pub fn by_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Vote from a specific address.
    pub fn from_ip(mut self, ip: IpAddr) -> Self {
        self.user_ip_addr = Some(ip);
        self
    }

    /// Fill unset attributes from the context.
    ///
    /// Returns `(user_id, ip_addr)`; explicit values win over the context.
    pub fn resolve(&self, ctx: &VoteContext) -> (i64, Option<IpAddr>) {
        (
            self.user_id.unwrap_or(ctx.user_id),
            self.user_ip_addr.or(ctx.ip_addr),
        )
    }
}
