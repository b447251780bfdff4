// src/engine/follow.rs — Grow cycle
//
// Mirrors the target profile's followers: page through them, hydrate to full
// records, filter and rank, then follow up to the daily limit. Per-item
// failures are logged and skipped; only a total listing failure aborts the
// cycle.

use chrono::Utc;
use std::collections::{HashMap, HashSet};

use super::{bot_active, eligibility, setting, setting_or, CycleReport, EngineContext};
use crate::gateway::{Session, UserRecord};
use crate::store::store::keys;

const DEFAULT_DAILY_LIMIT: usize = 100;

pub async fn run_follow_cycle(ctx: &EngineContext) -> anyhow::Result<CycleReport> {
    match follow_cycle_inner(ctx).await {
        Ok(report) => Ok(report),
        Err(e) => {
            // One audit entry per observable failure; tracing happens at the
            // caller that decides whether to surface the error.
            let _ = ctx.store.append_log(format!("Follow cycle error: {e}")).await;
            Err(e)
        }
    }
}

async fn follow_cycle_inner(ctx: &EngineContext) -> anyhow::Result<CycleReport> {
    if !bot_active(&ctx.store).await? {
        ctx.store
            .append_log("Follow cycle skipped: bot is inactive")
            .await?;
        tracing::info!("Follow cycle skipped: bot is inactive");
        return Ok(CycleReport::default());
    }

    let Some(target) = setting(&ctx.store, keys::TARGET_PROFILE).await? else {
        ctx.store
            .append_log("Follow cycle skipped: no target profile configured")
            .await?;
        tracing::info!("Follow cycle skipped: no target profile configured");
        return Ok(CycleReport::default());
    };

    let Some(session) = ctx.session.as_ref() else {
        ctx.store
            .append_log("Follow cycle aborted: no authenticated session")
            .await?;
        tracing::warn!("Follow cycle aborted: no authenticated session");
        return Ok(CycleReport::default());
    };

    let daily_limit: usize = setting_or(&ctx.store, keys::DAILY_FOLLOW_LIMIT, "100")
        .await?
        .parse()
        .unwrap_or(DEFAULT_DAILY_LIMIT);
    let filter_active = setting_or(&ctx.store, keys::FILTER_ACTIVE, "false").await? == "true";

    let target_id = match ctx.gateway.resolve_user(session, &target).await? {
        Some(user) => user.id,
        None => {
            ctx.store
                .append_log(format!("Follow cycle skipped: target @{target} not found"))
                .await?;
            tracing::warn!("Target profile @{target} not found");
            return Ok(CycleReport::default());
        }
    };

    let follower_ids = collect_followers(ctx, session, &target_id).await?;
    tracing::info!(
        target = %target,
        discovered = follower_ids.len(),
        "Follower listing complete"
    );

    // Hydrate ids to full records in fixed-size batches; a failed batch is
    // logged and dropped, never retried within the cycle.
    let mut by_id = HashMap::new();
    for batch in follower_ids.chunks(ctx.batch_size.max(1)) {
        match ctx.gateway.get_users(session, batch).await {
            Ok(records) => {
                for record in records {
                    by_id.insert(record.id.clone(), record);
                }
            }
            Err(e) => {
                ctx.store
                    .append_log(format!(
                        "Error resolving a batch of {} followers: {e}",
                        batch.len()
                    ))
                    .await?;
            }
        }
    }

    // Hydration responses carry no ordering guarantee; walk the discovery
    // list so ranking sees listing order within each tier.
    let users: Vec<UserRecord> = follower_ids
        .iter()
        .filter_map(|id| by_id.remove(id))
        .collect();

    let ledger = ctx.store.ledger_ids().await?;
    let now = Utc::now();
    let mut candidates = Vec::new();
    for user in users {
        if eligibility::is_follow_candidate(
            &user,
            &ledger,
            filter_active,
            now,
            ctx.gateway.as_ref(),
            session,
        )
        .await
        {
            candidates.push(user);
        }
    }
    let candidates = eligibility::rank_candidates(candidates);

    let mut report = CycleReport::default();
    for user in candidates {
        if report.succeeded >= daily_limit {
            break;
        }
        report.attempted += 1;

        match ctx.gateway.follow(session, &user.id).await {
            Ok(()) => {
                ctx.store
                    .insert_followed(user.id.clone(), user.screen_name.clone())
                    .await?;
                ctx.store
                    .append_log(format!("Followed @{}", user.screen_name))
                    .await?;
                report.succeeded += 1;
                tokio::time::sleep(ctx.backoff.action_delay()).await;
            }
            Err(e) => {
                report.skipped += 1;
                ctx.store
                    .append_log(format!("Error following @{}: {e}", user.screen_name))
                    .await?;
            }
        }
    }

    tracing::info!(
        succeeded = report.succeeded,
        skipped = report.skipped,
        "Follow cycle complete"
    );
    Ok(report)
}

/// Page through the target's follower set, resuming from the persisted
/// cursor and persisting each continuation token before the next fetch. A
/// failure on the first page aborts the cycle; a later page failure keeps
/// what was already collected.
async fn collect_followers(
    ctx: &EngineContext,
    session: &Session,
    target_id: &str,
) -> anyhow::Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut seen = HashSet::new();
    let mut page_token = setting(&ctx.store, keys::CURSOR).await?;
    let mut first_page = true;

    loop {
        let page = match ctx
            .gateway
            .list_followers(session, target_id, page_token.as_deref())
            .await
        {
            Ok(page) => page,
            Err(e) if first_page => {
                return Err(anyhow::anyhow!("follower listing failed: {e}"));
            }
            Err(e) => {
                ctx.store
                    .append_log(format!(
                        "Follower page failed, continuing with {} ids: {e}",
                        ids.len()
                    ))
                    .await?;
                break;
            }
        };
        first_page = false;

        for id in page.ids {
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }

        match page.next_token {
            Some(token) => {
                ctx.store.set_setting(keys::CURSOR, &token).await?;
                page_token = Some(token);
                tokio::time::sleep(ctx.backoff.page_delay()).await;
            }
            None => {
                ctx.store.set_setting(keys::CURSOR, "").await?;
                break;
            }
        }
    }

    Ok(ids)
}
