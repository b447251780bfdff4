// src/main.rs — flockmirror entry point

use clap::Parser;
use std::sync::Arc;

use flockmirror::api;
use flockmirror::cli::{Cli, Commands, TaskArg, WhitelistAction};
use flockmirror::engine::driver::{self, Task, TriggerOutcome};
use flockmirror::engine::EngineContext;
use flockmirror::gateway::backoff::RandomizedBackoff;
use flockmirror::gateway::http::HttpGateway;
use flockmirror::gateway::Session;
use flockmirror::infra::config::Config;
use flockmirror::infra::errors::FlockError;
use flockmirror::infra::{logger, paths};
use flockmirror::store::store::keys;
use flockmirror::store::{spawn_store_server, StoreManager};
use flockmirror::util::parse_target_profile;

#[tokio::main]
async fn main() {
    // Initialize logging (respects RUST_LOG)
    logger::init_logging("info");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };

    paths::ensure_dirs().await?;
    let manager = StoreManager::open(&paths::db_path())?;
    let (store, _store_task) = spawn_store_server(manager.store);

    let session = match (&config.gateway.bearer_token, &config.gateway.account_id) {
        (Some(token), Some(account)) => Some(Session {
            account_id: account.clone(),
            bearer_token: token.clone(),
        }),
        _ => None,
    };

    let gateway = Arc::new(HttpGateway::new(&config.gateway)?);
    let backoff = Arc::new(RandomizedBackoff::new(&config.backoff));
    let ctx = Arc::new(EngineContext::new(
        gateway,
        store.clone(),
        session,
        backoff,
        config.gateway.batch_size,
    ));

    match cli.command {
        Commands::Run => {
            if config.api.enabled {
                let api_state = api::ApiState {
                    engine: ctx.clone(),
                    token: config.api.token.clone(),
                };
                let api_config = config.api.clone();
                tokio::spawn(async move {
                    if let Err(e) = api::start_server(&api_config, api_state).await {
                        tracing::error!("Control API failed: {e}");
                    }
                });
            }
            driver::run_driver(ctx, config.schedule).await
        }

        Commands::Trigger { task } => {
            let task = match task {
                TaskArg::Follow => Task::Follow,
                TaskArg::Unfollow => Task::Unfollow,
            };
            match driver::trigger_cycle(&ctx, task).await? {
                TriggerOutcome::Ran(report) => {
                    println!(
                        "{} cycle finished: {} succeeded, {} skipped ({} attempted)",
                        task.as_str(),
                        report.succeeded,
                        report.skipped,
                        report.attempted
                    );
                }
                TriggerOutcome::AlreadyRunning => {
                    println!("{} cycle already running", task.as_str());
                }
            }
            Ok(())
        }

        Commands::Status => {
            let target = store
                .get_setting(keys::TARGET_PROFILE)
                .await?
                .filter(|v| !v.is_empty());
            let bot_active = store.get_setting(keys::BOT_ACTIVE).await?;
            println!(
                "bot:      {}",
                if bot_active.as_deref() == Some("false") {
                    "inactive"
                } else {
                    "active"
                }
            );
            println!(
                "target:   {}",
                target.as_deref().map(|t| format!("@{t}")).unwrap_or_else(|| "(unset)".into())
            );
            println!(
                "limit:    {}/day",
                store
                    .get_setting(keys::DAILY_FOLLOW_LIMIT)
                    .await?
                    .unwrap_or_else(|| "100".into())
            );
            println!(
                "delay:    {} days",
                store
                    .get_setting(keys::UNFOLLOW_DELAY)
                    .await?
                    .unwrap_or_else(|| "7".into())
            );
            println!(
                "filter:   {}",
                store
                    .get_setting(keys::FILTER_ACTIVE)
                    .await?
                    .unwrap_or_else(|| "false".into())
            );
            println!("ledger:   {} followed", store.count_followed().await?);
            println!("whitelist: {} entries", store.whitelist().await?.len());
            println!(
                "session:  {}",
                if ctx.session.is_some() { "present" } else { "absent" }
            );
            Ok(())
        }

        Commands::Set {
            target,
            daily_follow_limit,
            unfollow_delay,
            filter_active,
            bot_active,
        } => {
            let mut changes = Vec::new();
            if let Some(ref url) = target {
                let username = parse_target_profile(url)?;
                store.set_setting(keys::TARGET_PROFILE, &username).await?;
                // Drop any pagination token left over from the old target.
                store.set_setting(keys::CURSOR, "").await?;
                changes.push(format!("Target @{username}"));
            }
            if let Some(limit) = daily_follow_limit {
                anyhow::ensure!(limit > 0, "daily_follow_limit must be positive");
                store
                    .set_setting(keys::DAILY_FOLLOW_LIMIT, &limit.to_string())
                    .await?;
                changes.push(format!("Limit {limit}"));
            }
            if let Some(delay) = unfollow_delay {
                store
                    .set_setting(keys::UNFOLLOW_DELAY, &delay.to_string())
                    .await?;
                changes.push(format!("Delay {delay} days"));
            }
            if let Some(filter) = filter_active {
                store
                    .set_setting(keys::FILTER_ACTIVE, if filter { "true" } else { "false" })
                    .await?;
                changes.push(format!("Filter {filter}"));
            }
            if let Some(active) = bot_active {
                store
                    .set_setting(keys::BOT_ACTIVE, if active { "true" } else { "false" })
                    .await?;
                changes.push(if active { "Bot activated" } else { "Bot deactivated" }.into());
            }
            anyhow::ensure!(!changes.is_empty(), "no settings provided");
            store
                .append_log(format!("Settings updated: {}", changes.join(", ")))
                .await?;
            println!("updated: {}", changes.join(", "));
            Ok(())
        }

        Commands::Whitelist { action } => match action {
            WhitelistAction::Add { screen_name } => {
                let handle = screen_name.trim().trim_start_matches('@').to_string();
                let session = ctx.session.as_ref().ok_or(FlockError::NoSession)?;
                let user = ctx
                    .gateway
                    .resolve_user(session, &handle)
                    .await?
                    .ok_or(FlockError::UserNotFound { handle })?;
                if store
                    .insert_whitelisted(user.id.clone(), user.screen_name.clone())
                    .await?
                {
                    store
                        .append_log(format!("Added @{} to whitelist", user.screen_name))
                        .await?;
                    println!("added @{} ({})", user.screen_name, user.id);
                } else {
                    println!("@{} already whitelisted", user.screen_name);
                }
                Ok(())
            }
            WhitelistAction::Remove { user_id } => {
                match store.remove_whitelisted(&user_id).await? {
                    Some(screen_name) => {
                        store
                            .append_log(format!("Removed @{screen_name} from whitelist"))
                            .await?;
                        println!("removed @{screen_name}");
                    }
                    None => println!("no whitelist entry for '{user_id}'"),
                }
                Ok(())
            }
            WhitelistAction::List => {
                for entry in store.whitelist().await? {
                    println!("{}\t@{}", entry.user_id, entry.screen_name);
                }
                Ok(())
            }
        },

        Commands::Logs { limit } => {
            for entry in store.recent_logs(limit).await?.into_iter().rev() {
                println!("{}  {}", entry.timestamp, entry.message);
            }
            Ok(())
        }
    }
}
