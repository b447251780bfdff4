// src/engine/mod.rs — Follow/unfollow scheduling engine

pub mod driver;
pub mod eligibility;
pub mod follow;
pub mod unfollow;

use serde::Serialize;
use std::sync::Arc;

use crate::gateway::backoff::BackoffPolicy;
use crate::gateway::{Session, SocialGateway};
use crate::store::store::keys;
use crate::store::StoreHandle;

/// Everything a cycle needs, passed explicitly instead of captured in
/// module-level state. One instance lives for the life of the process and is
/// shared between the periodic driver, the CLI trigger path, and the control
/// API.
pub struct EngineContext {
    pub gateway: Arc<dyn SocialGateway>,
    pub store: StoreHandle,
    pub session: Option<Session>,
    pub backoff: Arc<dyn BackoffPolicy>,
    /// User records resolved per lookup batch.
    pub batch_size: usize,
    /// Run guards: at most one instance of each task at a time. Follow and
    /// unfollow may run concurrently with each other.
    pub follow_lock: tokio::sync::Mutex<()>,
    pub unfollow_lock: tokio::sync::Mutex<()>,
}

impl EngineContext {
    pub fn new(
        gateway: Arc<dyn SocialGateway>,
        store: StoreHandle,
        session: Option<Session>,
        backoff: Arc<dyn BackoffPolicy>,
        batch_size: usize,
    ) -> Self {
        Self {
            gateway,
            store,
            session,
            backoff,
            batch_size,
            follow_lock: tokio::sync::Mutex::new(()),
            unfollow_lock: tokio::sync::Mutex::new(()),
        }
    }
}

/// Outcome of one cycle, consumed by logs and the manual-trigger response.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CycleReport {
    /// Side effects attempted.
    pub attempted: usize,
    /// Side effects that succeeded (ledger mutated).
    pub succeeded: usize,
    /// Attempts that failed and were skipped.
    pub skipped: usize,
}

/// Read a setting, treating absent and empty values as missing.
pub(crate) async fn setting(store: &StoreHandle, key: &str) -> anyhow::Result<Option<String>> {
    Ok(store.get_setting(key).await?.filter(|v| !v.is_empty()))
}

pub(crate) async fn setting_or(
    store: &StoreHandle,
    key: &str,
    default: &str,
) -> anyhow::Result<String> {
    Ok(setting(store, key).await?.unwrap_or_else(|| default.to_string()))
}

/// `bot_active` defaults to true; anything but the literal "false" counts as
/// active.
pub(crate) async fn bot_active(store: &StoreHandle) -> anyhow::Result<bool> {
    Ok(setting_or(store, keys::BOT_ACTIVE, "true").await? != "false")
}
