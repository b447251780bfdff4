// src/gateway/mod.rs — Social API gateway layer

pub mod backoff;
pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::infra::errors::FlockError;

/// Credentials for the authenticated account, passed explicitly into every
/// gateway call. A cycle without a session is a clean no-op, never a
/// re-authentication side effect.
#[derive(Clone)]
pub struct Session {
    pub account_id: String,
    pub bearer_token: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("account_id", &self.account_id)
            .field("bearer_token", &"<redacted>")
            .finish()
    }
}

/// A resolved user record, as needed for eligibility and ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub screen_name: String,
    pub verified: bool,
}

/// One page of follower ids plus the continuation token, if any.
#[derive(Debug, Clone, Default)]
pub struct FollowerPage {
    pub ids: Vec<String>,
    pub next_token: Option<String>,
}

/// Contract against the external social-media API. Every call may fail with
/// a throttling or transient error; the engine treats all such failures as
/// non-fatal per item and logs them.
#[async_trait]
pub trait SocialGateway: Send + Sync {
    /// Resolve a handle to its user record, including the canonical screen
    /// name. `Ok(None)` means the handle does not exist.
    async fn resolve_user(
        &self,
        session: &Session,
        handle: &str,
    ) -> Result<Option<UserRecord>, FlockError>;

    /// One bounded page of follower ids of the given user.
    async fn list_followers(
        &self,
        session: &Session,
        user_id: &str,
        page_token: Option<&str>,
    ) -> Result<FollowerPage, FlockError>;

    /// Resolve full records for a batch of ids. Callers slice into
    /// fixed-size batches; a failed batch is skipped, not retried.
    async fn get_users(
        &self,
        session: &Session,
        ids: &[String],
    ) -> Result<Vec<UserRecord>, FlockError>;

    /// Timestamp of the user's most recent public activity, if any.
    async fn recent_activity(
        &self,
        session: &Session,
        user_id: &str,
    ) -> Result<Option<DateTime<Utc>>, FlockError>;

    async fn follow(&self, session: &Session, user_id: &str) -> Result<(), FlockError>;

    async fn unfollow(&self, session: &Session, user_id: &str) -> Result<(), FlockError>;
}
