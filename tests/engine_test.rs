// tests/engine_test.rs — Full follow/unfollow cycle scenarios against a fake
// gateway, a zero-delay backoff policy, and an in-memory store.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use flockmirror::engine::driver::{trigger_cycle, Task, TriggerOutcome};
use flockmirror::engine::follow::run_follow_cycle;
use flockmirror::engine::unfollow::run_unfollow_cycle;
use flockmirror::engine::EngineContext;
use flockmirror::gateway::backoff::NoDelay;
use flockmirror::gateway::{FollowerPage, Session, SocialGateway, UserRecord};
use flockmirror::infra::errors::FlockError;
use flockmirror::store::store::{keys, Store};
use flockmirror::store::{spawn_store_server, StoreHandle, StoreManager};

const TARGET_ID: &str = "t-1";
const ACCOUNT_ID: &str = "me";

/// Scriptable in-memory gateway.
struct FakeGateway {
    /// handle -> user id
    handles: HashMap<String, String>,
    /// followers of the target, in discovery order
    target_followers: Vec<String>,
    /// full records for get_users
    users: HashMap<String, UserRecord>,
    /// followers of the authenticated account (reciprocity set)
    our_followers: Vec<String>,
    /// most recent activity per user id
    activity: HashMap<String, DateTime<Utc>>,
    /// ids whose follow/unfollow calls fail
    fail_follow: HashSet<String>,
    fail_unfollow: HashSet<String>,
    /// ids whose recent_activity lookup fails
    fail_activity: HashSet<String>,
    /// a hydration batch containing any of these ids fails
    fail_get_users_containing: HashSet<String>,
    /// listing pages starting at or past this offset fail
    fail_page_from: Option<usize>,
    /// return hydration batches reversed
    reverse_get_users: bool,
    /// follower ids per page
    page_size: usize,
    follows: Mutex<Vec<String>>,
    unfollows: Mutex<Vec<String>>,
    activity_lookups: Mutex<Vec<String>>,
}

impl FakeGateway {
    fn new() -> Self {
        Self {
            handles: HashMap::from([("target".to_string(), TARGET_ID.to_string())]),
            target_followers: Vec::new(),
            users: HashMap::new(),
            our_followers: Vec::new(),
            activity: HashMap::new(),
            fail_follow: HashSet::new(),
            fail_unfollow: HashSet::new(),
            fail_activity: HashSet::new(),
            fail_get_users_containing: HashSet::new(),
            fail_page_from: None,
            reverse_get_users: false,
            page_size: 1000,
            follows: Mutex::new(Vec::new()),
            unfollows: Mutex::new(Vec::new()),
            activity_lookups: Mutex::new(Vec::new()),
        }
    }

    fn with_follower(mut self, id: &str, screen_name: &str, verified: bool) -> Self {
        self.target_followers.push(id.to_string());
        self.users.insert(
            id.to_string(),
            UserRecord {
                id: id.to_string(),
                screen_name: screen_name.to_string(),
                verified,
            },
        );
        self
    }

    fn follows(&self) -> Vec<String> {
        self.follows.lock().unwrap().clone()
    }

    fn unfollows(&self) -> Vec<String> {
        self.unfollows.lock().unwrap().clone()
    }
}

#[async_trait]
impl SocialGateway for FakeGateway {
    async fn resolve_user(
        &self,
        _session: &Session,
        handle: &str,
    ) -> Result<Option<UserRecord>, FlockError> {
        Ok(self.handles.get(handle).map(|id| {
            self.users.get(id).cloned().unwrap_or(UserRecord {
                id: id.clone(),
                screen_name: handle.to_string(),
                verified: false,
            })
        }))
    }

    async fn list_followers(
        &self,
        _session: &Session,
        user_id: &str,
        page_token: Option<&str>,
    ) -> Result<FollowerPage, FlockError> {
        let list: &[String] = if user_id == ACCOUNT_ID {
            &self.our_followers
        } else {
            &self.target_followers
        };

        let start: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        if self.fail_page_from.is_some_and(|n| start >= n) {
            return Err(FlockError::Gateway {
                message: "HTTP 500".into(),
                retriable: true,
            });
        }
        let end = (start + self.page_size).min(list.len());
        let next_token = if end < list.len() {
            Some(end.to_string())
        } else {
            None
        };

        Ok(FollowerPage {
            ids: list[start..end].to_vec(),
            next_token,
        })
    }

    async fn get_users(
        &self,
        _session: &Session,
        ids: &[String],
    ) -> Result<Vec<UserRecord>, FlockError> {
        if ids.iter().any(|id| self.fail_get_users_containing.contains(id)) {
            return Err(FlockError::Gateway {
                message: "HTTP 503".into(),
                retriable: true,
            });
        }
        let mut records: Vec<UserRecord> =
            ids.iter().filter_map(|id| self.users.get(id).cloned()).collect();
        if self.reverse_get_users {
            records.reverse();
        }
        Ok(records)
    }

    async fn recent_activity(
        &self,
        _session: &Session,
        user_id: &str,
    ) -> Result<Option<DateTime<Utc>>, FlockError> {
        self.activity_lookups.lock().unwrap().push(user_id.to_string());
        if self.fail_activity.contains(user_id) {
            return Err(FlockError::RateLimited { retry_after_ms: 60_000 });
        }
        Ok(self.activity.get(user_id).copied())
    }

    async fn follow(&self, _session: &Session, user_id: &str) -> Result<(), FlockError> {
        if self.fail_follow.contains(user_id) {
            return Err(FlockError::Gateway {
                message: "HTTP 403: cannot follow".into(),
                retriable: false,
            });
        }
        self.follows.lock().unwrap().push(user_id.to_string());
        Ok(())
    }

    async fn unfollow(&self, _session: &Session, user_id: &str) -> Result<(), FlockError> {
        if self.fail_unfollow.contains(user_id) {
            return Err(FlockError::Gateway {
                message: "HTTP 500".into(),
                retriable: true,
            });
        }
        self.unfollows.lock().unwrap().push(user_id.to_string());
        Ok(())
    }
}

/// Build an engine context over a fake gateway and an in-memory store.
/// `seed` runs against the raw store before it moves into the server task.
async fn setup(
    gateway: Arc<FakeGateway>,
    seed: impl FnOnce(&Store),
) -> (Arc<EngineContext>, StoreHandle) {
    let manager = StoreManager::in_memory().unwrap();
    seed(&manager.store);
    let (store, _task) = spawn_store_server(manager.store);

    let session = Session {
        account_id: ACCOUNT_ID.into(),
        bearer_token: "test-token".into(),
    };
    let ctx = Arc::new(EngineContext::new(
        gateway,
        store.clone(),
        Some(session),
        Arc::new(NoDelay),
        100,
    ));
    (ctx, store)
}

fn seed_followed(store: &Store, user_id: &str, screen_name: &str, days_old: i64) {
    let date = (Utc::now() - Duration::days(days_old)).to_rfc3339();
    store
        .conn()
        .execute(
            "INSERT INTO followed_users (user_id, screen_name, followed_date, followed_back)
             VALUES (?1, ?2, ?3, 0)",
            params![user_id, screen_name, date],
        )
        .unwrap();
}

async fn logs_contain(store: &StoreHandle, needle: &str) -> bool {
    store
        .recent_logs(100)
        .await
        .unwrap()
        .iter()
        .any(|l| l.message.contains(needle))
}

// -- Follow cycle --

#[tokio::test]
async fn test_follow_verified_first_up_to_limit() {
    // 3 followers (2 verified, 1 not), limit 2, filter off: both verified are
    // followed, the non-verified one is never attempted.
    let gateway = Arc::new(
        FakeGateway::new()
            .with_follower("u1", "plain", false)
            .with_follower("u2", "blue_a", true)
            .with_follower("u3", "blue_b", true),
    );
    let (ctx, store) = setup(gateway.clone(), |_| {}).await;
    store.set_setting(keys::TARGET_PROFILE, "target").await.unwrap();
    store.set_setting(keys::DAILY_FOLLOW_LIMIT, "2").await.unwrap();

    let report = run_follow_cycle(&ctx).await.unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(gateway.follows(), vec!["u2", "u3"]);
    assert_eq!(store.count_followed().await.unwrap(), 2);
    assert!(logs_contain(&store, "Followed @blue_a").await);
    assert!(logs_contain(&store, "Followed @blue_b").await);
}

#[tokio::test]
async fn test_follow_never_reattempts_ledgered_user() {
    let gateway = Arc::new(
        FakeGateway::new()
            .with_follower("u1", "a", false)
            .with_follower("u2", "b", false),
    );
    let (ctx, store) = setup(gateway.clone(), |s| {
        s.insert_followed("u1", "a").unwrap();
    })
    .await;
    store.set_setting(keys::TARGET_PROFILE, "target").await.unwrap();

    run_follow_cycle(&ctx).await.unwrap();

    assert_eq!(gateway.follows(), vec!["u2"]);
    assert_eq!(store.count_followed().await.unwrap(), 2);
}

#[tokio::test]
async fn test_follow_failure_is_skipped_not_fatal() {
    let mut inner = FakeGateway::new()
        .with_follower("u1", "broken", true)
        .with_follower("u2", "fine", false);
    inner.fail_follow.insert("u1".into());
    let gateway = Arc::new(inner);

    let (ctx, store) = setup(gateway.clone(), |_| {}).await;
    store.set_setting(keys::TARGET_PROFILE, "target").await.unwrap();

    let report = run_follow_cycle(&ctx).await.unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(gateway.follows(), vec!["u2"]);
    assert!(logs_contain(&store, "Error following @broken").await);
    // The failed candidate must not be ledgered.
    assert!(store.get_followed("u1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_follow_bot_inactive_is_logged_noop() {
    let gateway = Arc::new(FakeGateway::new().with_follower("u1", "a", false));
    let (ctx, store) = setup(gateway.clone(), |_| {}).await;
    store.set_setting(keys::TARGET_PROFILE, "target").await.unwrap();
    store.set_setting(keys::BOT_ACTIVE, "false").await.unwrap();

    let report = run_follow_cycle(&ctx).await.unwrap();

    assert_eq!(report.succeeded + report.attempted, 0);
    assert!(gateway.follows().is_empty());
    assert_eq!(store.count_followed().await.unwrap(), 0);
    assert!(logs_contain(&store, "bot is inactive").await);
}

#[tokio::test]
async fn test_follow_without_target_is_logged_noop() {
    let gateway = Arc::new(FakeGateway::new().with_follower("u1", "a", false));
    let (ctx, store) = setup(gateway.clone(), |_| {}).await;

    let report = run_follow_cycle(&ctx).await.unwrap();

    assert_eq!(report.attempted, 0);
    assert!(gateway.follows().is_empty());
    assert!(logs_contain(&store, "no target profile").await);
}

#[tokio::test]
async fn test_follow_activity_filter_excludes_stale_and_silent() {
    let mut inner = FakeGateway::new()
        .with_follower("fresh", "fresh_user", false)
        .with_follower("stale", "stale_user", false)
        .with_follower("silent", "silent_user", false);
    inner
        .activity
        .insert("fresh".into(), Utc::now() - Duration::days(5));
    inner
        .activity
        .insert("stale".into(), Utc::now() - Duration::days(40));
    let gateway = Arc::new(inner);

    let (ctx, store) = setup(gateway.clone(), |_| {}).await;
    store.set_setting(keys::TARGET_PROFILE, "target").await.unwrap();
    store.set_setting(keys::FILTER_ACTIVE, "true").await.unwrap();

    run_follow_cycle(&ctx).await.unwrap();

    assert_eq!(gateway.follows(), vec!["fresh"]);
    // One activity lookup per discovered user.
    assert_eq!(gateway.activity_lookups.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_follow_pages_through_all_followers_and_resets_cursor() {
    let mut inner = FakeGateway::new()
        .with_follower("u1", "a", false)
        .with_follower("u2", "b", false)
        .with_follower("u3", "c", false)
        .with_follower("u4", "d", false)
        .with_follower("u5", "e", false);
    inner.page_size = 2;
    let gateway = Arc::new(inner);

    let (ctx, store) = setup(gateway.clone(), |_| {}).await;
    store.set_setting(keys::TARGET_PROFILE, "target").await.unwrap();

    run_follow_cycle(&ctx).await.unwrap();

    assert_eq!(gateway.follows().len(), 5);
    // Cursor is cleared once the listing is exhausted.
    assert_eq!(store.get_setting(keys::CURSOR).await.unwrap(), Some(String::new()));
}

#[tokio::test]
async fn test_follow_preserves_discovery_order_after_hydration() {
    // The hydration endpoint answers in its own order; follows must still
    // happen in listing order.
    let mut inner = FakeGateway::new()
        .with_follower("u1", "a", false)
        .with_follower("u2", "b", false)
        .with_follower("u3", "c", false);
    inner.reverse_get_users = true;
    let gateway = Arc::new(inner);

    let (ctx, store) = setup(gateway.clone(), |_| {}).await;
    store.set_setting(keys::TARGET_PROFILE, "target").await.unwrap();

    run_follow_cycle(&ctx).await.unwrap();

    assert_eq!(gateway.follows(), vec!["u1", "u2", "u3"]);
}

#[tokio::test]
async fn test_follow_failed_hydration_batch_is_skipped() {
    let mut inner = FakeGateway::new()
        .with_follower("u1", "a", false)
        .with_follower("u2", "b", false)
        .with_follower("u3", "c", false)
        .with_follower("u4", "d", false);
    inner.fail_get_users_containing.insert("u1".into());
    let gateway = Arc::new(inner);

    // Batch size 2: the first batch fails, the second hydrates.
    let manager = StoreManager::in_memory().unwrap();
    let (store, _task) = spawn_store_server(manager.store);
    let session = Session {
        account_id: ACCOUNT_ID.into(),
        bearer_token: "test-token".into(),
    };
    let ctx = Arc::new(EngineContext::new(
        gateway.clone(),
        store.clone(),
        Some(session),
        Arc::new(NoDelay),
        2,
    ));
    store.set_setting(keys::TARGET_PROFILE, "target").await.unwrap();

    let report = run_follow_cycle(&ctx).await.unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(gateway.follows(), vec!["u3", "u4"]);
    assert!(logs_contain(&store, "Error resolving a batch").await);
}

#[tokio::test]
async fn test_follow_later_page_failure_keeps_collected_ids() {
    let mut inner = FakeGateway::new()
        .with_follower("u1", "a", false)
        .with_follower("u2", "b", false)
        .with_follower("u3", "c", false)
        .with_follower("u4", "d", false);
    inner.page_size = 2;
    inner.fail_page_from = Some(2);
    let gateway = Arc::new(inner);

    let (ctx, store) = setup(gateway.clone(), |_| {}).await;
    store.set_setting(keys::TARGET_PROFILE, "target").await.unwrap();

    let report = run_follow_cycle(&ctx).await.unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(gateway.follows(), vec!["u1", "u2"]);
    assert!(logs_contain(&store, "Follower page failed").await);
}

#[tokio::test]
async fn test_follow_activity_lookup_failure_treated_as_inactive() {
    let mut inner = FakeGateway::new()
        .with_follower("ok", "ok_user", false)
        .with_follower("err", "err_user", false);
    inner.activity.insert("ok".into(), Utc::now() - Duration::days(5));
    inner.fail_activity.insert("err".into());
    let gateway = Arc::new(inner);

    let (ctx, store) = setup(gateway.clone(), |_| {}).await;
    store.set_setting(keys::TARGET_PROFILE, "target").await.unwrap();
    store.set_setting(keys::FILTER_ACTIVE, "true").await.unwrap();

    let report = run_follow_cycle(&ctx).await.unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(gateway.follows(), vec!["ok"]);
}

// -- Unfollow cycle --

#[tokio::test]
async fn test_unfollow_prunes_stale_nonreciprocal_entry() {
    let gateway = Arc::new(FakeGateway::new());
    let (ctx, store) = setup(gateway.clone(), |s| {
        seed_followed(s, "u1", "ghost", 10);
    })
    .await;

    let report = run_unfollow_cycle(&ctx).await.unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(gateway.unfollows(), vec!["u1"]);
    assert_eq!(store.count_followed().await.unwrap(), 0);
    assert!(logs_contain(&store, "Unfollowed @ghost").await);
}

#[tokio::test]
async fn test_unfollow_retains_whitelisted_entry() {
    let gateway = Arc::new(FakeGateway::new());
    let (ctx, store) = setup(gateway.clone(), |s| {
        seed_followed(s, "u1", "friend", 10);
        s.insert_whitelisted("u1", "friend").unwrap();
    })
    .await;

    let report = run_unfollow_cycle(&ctx).await.unwrap();

    assert_eq!(report.attempted, 0);
    assert!(gateway.unfollows().is_empty());
    assert_eq!(store.count_followed().await.unwrap(), 1);
}

#[tokio::test]
async fn test_unfollow_retains_recent_entry() {
    let gateway = Arc::new(FakeGateway::new());
    let (ctx, store) = setup(gateway.clone(), |s| {
        seed_followed(s, "u1", "recent", 3);
    })
    .await;

    run_unfollow_cycle(&ctx).await.unwrap();

    assert!(gateway.unfollows().is_empty());
    assert_eq!(store.count_followed().await.unwrap(), 1);
}

#[tokio::test]
async fn test_unfollow_refreshes_and_persists_reciprocity() {
    let mut inner = FakeGateway::new();
    inner.our_followers = vec!["u1".into()];
    let gateway = Arc::new(inner);

    let (ctx, store) = setup(gateway.clone(), |s| {
        seed_followed(s, "u1", "loyal", 10);
    })
    .await;

    run_unfollow_cycle(&ctx).await.unwrap();

    // Reciprocal: retained, and the refreshed flag is durable.
    assert!(gateway.unfollows().is_empty());
    let entry = store.get_followed("u1").await.unwrap().unwrap();
    assert!(entry.followed_back);
}

#[tokio::test]
async fn test_unfollow_failure_keeps_ledger_entry() {
    let mut inner = FakeGateway::new();
    inner.fail_unfollow.insert("u1".into());
    let gateway = Arc::new(inner);

    let (ctx, store) = setup(gateway.clone(), |s| {
        seed_followed(s, "u1", "sticky", 10);
    })
    .await;

    let report = run_unfollow_cycle(&ctx).await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(store.count_followed().await.unwrap(), 1);
    assert!(logs_contain(&store, "Error unfollowing @sticky").await);
}

#[tokio::test]
async fn test_unfollow_bot_inactive_is_logged_noop() {
    let gateway = Arc::new(FakeGateway::new());
    let (ctx, store) = setup(gateway.clone(), |s| {
        seed_followed(s, "u1", "ghost", 10);
    })
    .await;
    store.set_setting(keys::BOT_ACTIVE, "false").await.unwrap();

    run_unfollow_cycle(&ctx).await.unwrap();

    assert!(gateway.unfollows().is_empty());
    assert_eq!(store.count_followed().await.unwrap(), 1);
    assert!(logs_contain(&store, "bot is inactive").await);
}

// -- Driver guards --

#[tokio::test]
async fn test_overlapping_trigger_is_suppressed() {
    let gateway = Arc::new(FakeGateway::new());
    let (ctx, _store) = setup(gateway, |_| {}).await;

    let _guard = ctx.follow_lock.try_lock().unwrap();
    let outcome = trigger_cycle(&ctx, Task::Follow).await.unwrap();
    assert!(matches!(outcome, TriggerOutcome::AlreadyRunning));

    // The other task is independent and still runs.
    let outcome = trigger_cycle(&ctx, Task::Unfollow).await.unwrap();
    assert!(matches!(outcome, TriggerOutcome::Ran(_)));
}

#[tokio::test]
async fn test_missing_session_is_clean_abort() {
    let gateway = Arc::new(FakeGateway::new().with_follower("u1", "a", false));
    let manager = StoreManager::in_memory().unwrap();
    let (store, _task) = spawn_store_server(manager.store);
    store.set_setting(keys::TARGET_PROFILE, "target").await.unwrap();

    let ctx = Arc::new(EngineContext::new(
        gateway.clone(),
        store.clone(),
        None,
        Arc::new(NoDelay),
        100,
    ));

    let report = run_follow_cycle(&ctx).await.unwrap();
    assert_eq!(report.attempted, 0);
    assert!(gateway.follows().is_empty());
    assert!(logs_contain(&store, "no authenticated session").await);
}
