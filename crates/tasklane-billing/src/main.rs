//! Command-line surface for a persisted subscription store.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tasklane_billing::{BillingConfig, SimulatedGateway, SubscriptionStore};
use tasklane_models::{
    catalog, format_megabytes, CountedFeature, Limit, LimitFeature, MeteredResource, PlanId,
    UsageCounter,
};
use tasklane_storage::FileStorage;

#[derive(Parser)]
#[command(name = "tasklane-billing")]
#[command(about = "Inspect and drive the Tasklane plan/usage store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the active plan, trial and usage
    Status,
    /// List the plan catalog
    Plans,
    /// Check whether a gated action is allowed (e.g. maxProjects, aiFeatures)
    Check { feature: LimitFeature },
    /// Show units left for maxProjects or maxTeamMembers
    Remaining { feature: CountedFeature },
    /// Add to a usage counter (projects, teamMembers, storageUsedMB, aiRequestsThisMonth)
    Increment {
        counter: UsageCounter,
        #[arg(default_value_t = 1)]
        amount: u64,
    },
    /// Upgrade (or change) to another plan
    Upgrade { plan: PlanId },
    /// Delete persisted state and start over
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = BillingConfig::from_env().context("Failed to load billing config")?;
    info!(
        state_dir = %config.storage.state_dir.display(),
        key = %config.storage_key,
        "Opening subscription store"
    );

    let storage = Arc::new(FileStorage::from_config(&config.storage));
    let gateway = Arc::new(SimulatedGateway::new(config.upgrade_delay));
    let store = SubscriptionStore::hydrate(config, storage, gateway)
        .await
        .context("Failed to hydrate subscription store")?;

    match cli.command {
        Command::Status => print_status(&store),
        Command::Plans => {
            for plan in catalog() {
                let marker = if plan.id == store.current_plan_id() { "*" } else { " " };
                println!(
                    "{} {:<13} ${:>6.2}/mo  {}",
                    marker,
                    plan.id,
                    plan.price_monthly_cents as f64 / 100.0,
                    plan.description
                );
            }
        }
        Command::Check { feature } => {
            let allowed = store.check_limit(feature);
            println!("{}: {}", feature, if allowed { "allowed" } else { "denied" });
        }
        Command::Remaining { feature } => {
            println!("{}: {}", feature, store.remaining_limit(feature).as_sentinel());
        }
        Command::Increment { counter, amount } => {
            let value = store.increment_usage_by(counter, amount).await?;
            println!("{} = {}", counter, value);
        }
        Command::Upgrade { plan } => {
            store.set_upgrade_dialog(true);
            println!("Contacting billing...");
            let receipt = store.upgrade_to(plan).await?;
            match receipt.trial_ends_at {
                Some(ends) if receipt.is_trial_active => {
                    println!("Now on {} (trial until {})", receipt.plan, ends.format("%Y-%m-%d"));
                }
                _ => println!("Now on {}", receipt.plan),
            }
        }
        Command::Reset => {
            store.reset().await?;
            println!("Subscription state reset");
        }
    }

    Ok(())
}

fn print_status(store: &SubscriptionStore) {
    let plan = store.current_plan();
    println!("Plan: {} ({})", plan.name, plan.id);
    if let Some(days) = store.trial_days_remaining(chrono::Utc::now()) {
        println!("Trial: {} day(s) left", days);
    }
    for reading in store.usage_report() {
        let (used, limit) = match (reading.resource, reading.limit) {
            (MeteredResource::Storage, Limit::Capped(mb)) => {
                (format_megabytes(reading.used), format_megabytes(mb))
            }
            (MeteredResource::Storage, limit) => (format_megabytes(reading.used), limit.to_string()),
            (_, limit) => (reading.used.to_string(), limit.to_string()),
        };
        println!(
            "{:<12} {:>10} / {:<10} {:>6.1}%",
            reading.resource.as_str(),
            used,
            limit,
            reading.percentage
        );
    }
    let usage = store.usage();
    println!("AI requests this month: {}", usage.ai_requests_this_month);
}

/// Colored output for dev, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tasklane=warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}
