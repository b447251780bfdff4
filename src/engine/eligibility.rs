// src/engine/eligibility.rs — Candidate filtering and ranking

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

use crate::gateway::{Session, SocialGateway, UserRecord};
use crate::store::store::FollowedUser;

/// A candidate's most recent activity must be within this window when the
/// activity filter is on.
const ACTIVITY_WINDOW_DAYS: i64 = 30;

/// Whether a discovered user is a legal follow target. Already-ledgered ids
/// are never re-attempted. With the activity filter on, one recent-activity
/// lookup decides; no activity record disqualifies, and a failed lookup is
/// treated as inactive rather than propagated.
pub async fn is_follow_candidate(
    user: &UserRecord,
    ledger: &HashSet<String>,
    filter_active: bool,
    now: DateTime<Utc>,
    gateway: &dyn SocialGateway,
    session: &Session,
) -> bool {
    if ledger.contains(&user.id) {
        return false;
    }
    if !filter_active {
        return true;
    }

    match gateway.recent_activity(session, &user.id).await {
        Ok(Some(last_active)) => {
            now.signed_duration_since(last_active) <= Duration::days(ACTIVITY_WINDOW_DAYS)
        }
        Ok(None) => false,
        Err(e) => {
            tracing::debug!(
                user_id = %user.id,
                "Activity lookup failed, treating as inactive: {e}"
            );
            false
        }
    }
}

/// Whether a ledger entry is a legal unfollow target: followed strictly
/// before the cutoff, not reciprocated, not whitelisted.
pub fn is_unfollow_candidate(
    entry: &FollowedUser,
    cutoff: DateTime<Utc>,
    whitelist: &HashSet<String>,
) -> bool {
    entry.followed_date < cutoff && !entry.followed_back && !whitelist.contains(&entry.user_id)
}

/// Stable partition: verified accounts first, discovery order preserved
/// within each tier.
pub fn rank_candidates(users: Vec<UserRecord>) -> Vec<UserRecord> {
    let (verified, rest): (Vec<_>, Vec<_>) = users.into_iter().partition(|u| u.verified);
    verified.into_iter().chain(rest).collect()
}
