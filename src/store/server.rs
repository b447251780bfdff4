// src/store/server.rs — Async message passing for Store
//
// Both schedulers and the control API share one StoreHandle; the connection
// itself is owned by a single background task, which gives every logical
// store operation one-writer serialization on top of SQLite's own
// transactional guarantees.

use crate::store::store::{FollowedUser, LogEntry, Store, WhitelistedUser};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug)]
pub enum StoreCommand {
    GetSetting {
        key: String,
        resp: oneshot::Sender<anyhow::Result<Option<String>>>,
    },
    SetSetting {
        key: String,
        value: String,
        resp: oneshot::Sender<anyhow::Result<()>>,
    },
    InsertFollowed {
        user_id: String,
        screen_name: String,
        resp: oneshot::Sender<anyhow::Result<bool>>,
    },
    DeleteFollowed {
        user_id: String,
        resp: oneshot::Sender<anyhow::Result<bool>>,
    },
    SetFollowedBack {
        user_id: String,
        followed_back: bool,
        resp: oneshot::Sender<anyhow::Result<()>>,
    },
    GetFollowed {
        user_id: String,
        resp: oneshot::Sender<anyhow::Result<Option<FollowedUser>>>,
    },
    LedgerIds {
        resp: oneshot::Sender<anyhow::Result<HashSet<String>>>,
    },
    FollowedBefore {
        cutoff: DateTime<Utc>,
        resp: oneshot::Sender<anyhow::Result<Vec<FollowedUser>>>,
    },
    CountFollowed {
        resp: oneshot::Sender<anyhow::Result<i64>>,
    },
    InsertWhitelisted {
        user_id: String,
        screen_name: String,
        resp: oneshot::Sender<anyhow::Result<bool>>,
    },
    RemoveWhitelisted {
        user_id: String,
        resp: oneshot::Sender<anyhow::Result<Option<String>>>,
    },
    Whitelist {
        resp: oneshot::Sender<anyhow::Result<Vec<WhitelistedUser>>>,
    },
    AppendLog {
        message: String,
        resp: oneshot::Sender<anyhow::Result<()>>,
    },
    RecentLogs {
        limit: u32,
        resp: oneshot::Sender<anyhow::Result<Vec<LogEntry>>>,
    },
}

/// A handle to the Store that uses message passing.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreCommand>,
}

impl StoreHandle {
    pub fn new(tx: mpsc::Sender<StoreCommand>) -> Self {
        Self { tx }
    }

    pub async fn get_setting(&self, key: &str) -> anyhow::Result<Option<String>> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::GetSetting {
                key: key.to_string(),
                resp: resp_tx,
            })
            .await?;
        resp_rx.await?
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::SetSetting {
                key: key.to_string(),
                value: value.to_string(),
                resp: resp_tx,
            })
            .await?;
        resp_rx.await?
    }

    pub async fn insert_followed(
        &self,
        user_id: String,
        screen_name: String,
    ) -> anyhow::Result<bool> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::InsertFollowed {
                user_id,
                screen_name,
                resp: resp_tx,
            })
            .await?;
        resp_rx.await?
    }

    pub async fn delete_followed(&self, user_id: String) -> anyhow::Result<bool> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::DeleteFollowed {
                user_id,
                resp: resp_tx,
            })
            .await?;
        resp_rx.await?
    }

    pub async fn set_followed_back(
        &self,
        user_id: String,
        followed_back: bool,
    ) -> anyhow::Result<()> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::SetFollowedBack {
                user_id,
                followed_back,
                resp: resp_tx,
            })
            .await?;
        resp_rx.await?
    }

    pub async fn get_followed(&self, user_id: &str) -> anyhow::Result<Option<FollowedUser>> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::GetFollowed {
                user_id: user_id.to_string(),
                resp: resp_tx,
            })
            .await?;
        resp_rx.await?
    }

    pub async fn ledger_ids(&self) -> anyhow::Result<HashSet<String>> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::LedgerIds { resp: resp_tx })
            .await?;
        resp_rx.await?
    }

    pub async fn followed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> anyhow::Result<Vec<FollowedUser>> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::FollowedBefore {
                cutoff,
                resp: resp_tx,
            })
            .await?;
        resp_rx.await?
    }

    pub async fn count_followed(&self) -> anyhow::Result<i64> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::CountFollowed { resp: resp_tx })
            .await?;
        resp_rx.await?
    }

    pub async fn insert_whitelisted(
        &self,
        user_id: String,
        screen_name: String,
    ) -> anyhow::Result<bool> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::InsertWhitelisted {
                user_id,
                screen_name,
                resp: resp_tx,
            })
            .await?;
        resp_rx.await?
    }

    pub async fn remove_whitelisted(&self, user_id: &str) -> anyhow::Result<Option<String>> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::RemoveWhitelisted {
                user_id: user_id.to_string(),
                resp: resp_tx,
            })
            .await?;
        resp_rx.await?
    }

    pub async fn whitelist(&self) -> anyhow::Result<Vec<WhitelistedUser>> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::Whitelist { resp: resp_tx })
            .await?;
        resp_rx.await?
    }

    pub async fn append_log(&self, message: impl Into<String>) -> anyhow::Result<()> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::AppendLog {
                message: message.into(),
                resp: resp_tx,
            })
            .await?;
        resp_rx.await?
    }

    pub async fn recent_logs(&self, limit: u32) -> anyhow::Result<Vec<LogEntry>> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::RecentLogs {
                limit,
                resp: resp_tx,
            })
            .await?;
        resp_rx.await?
    }
}

/// Helper to spawn the store server and return a handle.
pub fn spawn_store_server(store: Store) -> (StoreHandle, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(100);
    let handle = StoreHandle::new(tx);
    let join_handle = tokio::spawn(run_store_server(store, rx));
    (handle, join_handle)
}

/// The background task that owns the Store.
pub async fn run_store_server(store: Store, mut rx: mpsc::Receiver<StoreCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            StoreCommand::GetSetting { key, resp } => {
                let _ = resp.send(store.get_setting(&key));
            }
            StoreCommand::SetSetting { key, value, resp } => {
                let _ = resp.send(store.set_setting(&key, &value));
            }
            StoreCommand::InsertFollowed {
                user_id,
                screen_name,
                resp,
            } => {
                let _ = resp.send(store.insert_followed(&user_id, &screen_name));
            }
            StoreCommand::DeleteFollowed { user_id, resp } => {
                let _ = resp.send(store.delete_followed(&user_id));
            }
            StoreCommand::SetFollowedBack {
                user_id,
                followed_back,
                resp,
            } => {
                let _ = resp.send(store.set_followed_back(&user_id, followed_back));
            }
            StoreCommand::GetFollowed { user_id, resp } => {
                let _ = resp.send(store.get_followed(&user_id));
            }
            StoreCommand::LedgerIds { resp } => {
                let _ = resp.send(store.ledger_ids());
            }
            StoreCommand::FollowedBefore { cutoff, resp } => {
                let _ = resp.send(store.followed_before(cutoff));
            }
            StoreCommand::CountFollowed { resp } => {
                let _ = resp.send(store.count_followed());
            }
            StoreCommand::InsertWhitelisted {
                user_id,
                screen_name,
                resp,
            } => {
                let _ = resp.send(store.insert_whitelisted(&user_id, &screen_name));
            }
            StoreCommand::RemoveWhitelisted { user_id, resp } => {
                let _ = resp.send(store.remove_whitelisted(&user_id));
            }
            StoreCommand::Whitelist { resp } => {
                let _ = resp.send(store.whitelist());
            }
            StoreCommand::AppendLog { message, resp } => {
                let _ = resp.send(store.append_log(&message));
            }
            StoreCommand::RecentLogs { limit, resp } => {
                let _ = resp.send(store.recent_logs(limit));
            }
        }
    }
}
