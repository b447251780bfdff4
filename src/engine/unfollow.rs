// src/engine/unfollow.rs — Prune cycle
//
// Unfollows ledgered accounts that did not reciprocate within the configured
// delay. Reciprocity is refreshed from a full listing of our own followers
// and persisted before any unfollow decision, so the ledger's followed_back
// flags are never staler than the last cycle.

use chrono::{Duration, Utc};
use std::collections::HashSet;

use super::{bot_active, eligibility, setting_or, CycleReport, EngineContext};
use crate::gateway::Session;
use crate::store::store::keys;

const DEFAULT_UNFOLLOW_DELAY_DAYS: i64 = 7;

pub async fn run_unfollow_cycle(ctx: &EngineContext) -> anyhow::Result<CycleReport> {
    match unfollow_cycle_inner(ctx).await {
        Ok(report) => Ok(report),
        Err(e) => {
            let _ = ctx
                .store
                .append_log(format!("Unfollow cycle error: {e}"))
                .await;
            Err(e)
        }
    }
}

async fn unfollow_cycle_inner(ctx: &EngineContext) -> anyhow::Result<CycleReport> {
    if !bot_active(&ctx.store).await? {
        ctx.store
            .append_log("Unfollow cycle skipped: bot is inactive")
            .await?;
        tracing::info!("Unfollow cycle skipped: bot is inactive");
        return Ok(CycleReport::default());
    }

    let Some(session) = ctx.session.as_ref() else {
        ctx.store
            .append_log("Unfollow cycle aborted: no authenticated session")
            .await?;
        tracing::warn!("Unfollow cycle aborted: no authenticated session");
        return Ok(CycleReport::default());
    };

    let delay_days: i64 = setting_or(&ctx.store, keys::UNFOLLOW_DELAY, "7")
        .await?
        .parse()
        .unwrap_or(DEFAULT_UNFOLLOW_DELAY_DAYS);
    let cutoff = Utc::now() - Duration::days(delay_days);

    let stale = ctx.store.followed_before(cutoff).await?;
    if stale.is_empty() {
        tracing::info!("Unfollow cycle complete: no entries older than cutoff");
        return Ok(CycleReport::default());
    }

    let our_followers = collect_own_followers(ctx, session).await?;
    tracing::info!(
        stale = stale.len(),
        reciprocal = our_followers.len(),
        "Reciprocity set fetched"
    );

    // Refresh and persist followed_back before any unfollow decision.
    let mut refreshed = Vec::with_capacity(stale.len());
    for mut entry in stale {
        entry.followed_back = our_followers.contains(&entry.user_id);
        ctx.store
            .set_followed_back(entry.user_id.clone(), entry.followed_back)
            .await?;
        refreshed.push(entry);
    }

    let whitelist: HashSet<String> = ctx
        .store
        .whitelist()
        .await?
        .into_iter()
        .map(|w| w.user_id)
        .collect();

    let mut report = CycleReport::default();
    for entry in refreshed {
        if !eligibility::is_unfollow_candidate(&entry, cutoff, &whitelist) {
            continue;
        }
        report.attempted += 1;

        match ctx.gateway.unfollow(session, &entry.user_id).await {
            Ok(()) => {
                ctx.store.delete_followed(entry.user_id.clone()).await?;
                ctx.store
                    .append_log(format!("Unfollowed @{}", entry.screen_name))
                    .await?;
                report.succeeded += 1;
                tokio::time::sleep(ctx.backoff.action_delay()).await;
            }
            Err(e) => {
                report.skipped += 1;
                ctx.store
                    .append_log(format!("Error unfollowing @{}: {e}", entry.screen_name))
                    .await?;
            }
        }
    }

    tracing::info!(
        succeeded = report.succeeded,
        skipped = report.skipped,
        "Unfollow cycle complete"
    );
    Ok(report)
}

/// Full follower-id set of the authenticated account. No persisted cursor
/// here: reciprocity needs the complete set every cycle.
async fn collect_own_followers(
    ctx: &EngineContext,
    session: &Session,
) -> anyhow::Result<HashSet<String>> {
    let mut ids = HashSet::new();
    let mut page_token: Option<String> = None;
    let mut first_page = true;

    loop {
        let page = match ctx
            .gateway
            .list_followers(session, &session.account_id, page_token.as_deref())
            .await
        {
            Ok(page) => page,
            Err(e) if first_page => {
                return Err(anyhow::anyhow!("own follower listing failed: {e}"));
            }
            Err(e) => {
                ctx.store
                    .append_log(format!(
                        "Own follower page failed, reciprocity may be incomplete: {e}"
                    ))
                    .await?;
                break;
            }
        };
        first_page = false;

        ids.extend(page.ids);

        match page.next_token {
            Some(token) => {
                page_token = Some(token);
                tokio::time::sleep(ctx.backoff.page_delay()).await;
            }
            None => break,
        }
    }

    Ok(ids)
}
