// src/engine/driver.rs — Periodic driver
//
// Two wall-clock schedules, one per task, evaluated once per minute. A fire
// while the same task is still running is dropped, never queued; the two
// tasks may overlap with each other. The manual trigger path (CLI and
// control API) goes through the same run guards.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{follow, unfollow, CycleReport, EngineContext};
use crate::infra::config::ScheduleConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Follow,
    Unfollow,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Follow => "follow",
            Task::Unfollow => "unfollow",
        }
    }
}

impl std::str::FromStr for Task {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "follow" => Ok(Task::Follow),
            "unfollow" => Ok(Task::Unfollow),
            other => Err(anyhow::anyhow!("unknown task '{other}'")),
        }
    }
}

#[derive(Debug)]
pub enum TriggerOutcome {
    Ran(CycleReport),
    /// The same task was already running; this invocation was suppressed.
    AlreadyRunning,
}

/// Run one cycle under the task's run guard. Errors propagate to the caller,
/// which decides whether to surface them (manual trigger) or only log them
/// (scheduled fire).
pub async fn trigger_cycle(ctx: &EngineContext, task: Task) -> anyhow::Result<TriggerOutcome> {
    let lock = match task {
        Task::Follow => &ctx.follow_lock,
        Task::Unfollow => &ctx.unfollow_lock,
    };
    let Ok(_guard) = lock.try_lock() else {
        return Ok(TriggerOutcome::AlreadyRunning);
    };

    let report = match task {
        Task::Follow => follow::run_follow_cycle(ctx).await?,
        Task::Unfollow => unfollow::run_unfollow_cycle(ctx).await?,
    };
    Ok(TriggerOutcome::Ran(report))
}

/// Check if a fire spec matches the current UTC minute. Supported specs:
/// "daily HH:MM", "hourly", "every Xm".
pub fn should_run_now(spec: &str, now: &DateTime<Utc>) -> bool {
    use chrono::Timelike;
    let spec = spec.trim().to_lowercase();

    if spec == "hourly" {
        return now.minute() == 0;
    }

    if let Some(time_str) = spec.strip_prefix("daily ") {
        let parts: Vec<&str> = time_str.trim().split(':').collect();
        if parts.len() == 2 {
            if let (Ok(hour), Ok(minute)) = (parts[0].parse::<u32>(), parts[1].parse::<u32>()) {
                return now.hour() == hour && now.minute() == minute;
            }
        }
        return false;
    }

    if let Some(interval_str) = spec.strip_prefix("every ").and_then(|s| s.strip_suffix('m')) {
        if let Ok(interval) = interval_str.trim().parse::<u32>() {
            return interval > 0 && (now.hour() * 60 + now.minute()).is_multiple_of(interval);
        }
    }

    false
}

/// Run the driver loop until ctrl-c.
pub async fn run_driver(ctx: Arc<EngineContext>, schedule: ScheduleConfig) -> anyhow::Result<()> {
    tracing::info!(
        follow = %schedule.follow,
        unfollow = %schedule.unfollow,
        "Driver starting"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut tick = tokio::time::interval(Duration::from_secs(60));
    // Consume the immediate first tick
    tick.tick().await;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let now = Utc::now();
                if should_run_now(&schedule.follow, &now) {
                    spawn_scheduled(ctx.clone(), Task::Follow);
                }
                if should_run_now(&schedule.unfollow, &now) {
                    spawn_scheduled(ctx.clone(), Task::Unfollow);
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    tracing::info!("Driver stopped.");
    Ok(())
}

/// Fire-and-forget: scheduled runs never surface errors to a caller.
fn spawn_scheduled(ctx: Arc<EngineContext>, task: Task) {
    tokio::spawn(async move {
        match trigger_cycle(&ctx, task).await {
            Ok(TriggerOutcome::Ran(report)) => {
                tracing::info!(
                    task = task.as_str(),
                    succeeded = report.succeeded,
                    skipped = report.skipped,
                    "Scheduled cycle finished"
                );
            }
            Ok(TriggerOutcome::AlreadyRunning) => {
                tracing::warn!(
                    task = task.as_str(),
                    "Previous cycle still running, dropping this fire"
                );
            }
            Err(e) => {
                tracing::error!(task = task.as_str(), "Scheduled cycle failed: {e}");
            }
        }
    });
}
