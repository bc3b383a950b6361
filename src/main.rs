mod cli;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Commands};
use colored::*;
use provider_verifier::{
    config::{config_file_path, Config},
    error::{self, VerifyError},
    notify::PassNotifier,
    server::{self, AppState},
    storage::{Database, ProviderRole, TriggerSource},
    utils,
    verification::{self, VerificationRunner},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("provider_verifier=debug,verifier=debug,info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match Config::load_from(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve => {
            info!("Starting verification trigger server...");
            serve(config).await
        }

        Commands::Run { role, dry_run } => run_once(&config, role.as_deref(), dry_run).await,

        Commands::Auto { interval, role, dry_run } => {
            let interval = interval.unwrap_or(config.verification.interval_secs);
            info!("Starting automated verification service (interval: {}s)", interval);
            run_auto_service(&config, interval, role.as_deref(), dry_run).await
        }

        Commands::Check { provider_id } => check_provider(&config, &provider_id),

        Commands::List { role, status, format } => {
            list_providers(&config, role.as_deref(), &status, &format)
        }

        Commands::History { limit, passes, format } => {
            show_history(&config, limit, passes, &format)
        }

        Commands::Stats { format } => {
            info!("Generating statistics...");
            show_stats(&config, &format)
        }

        Commands::Init { show_config, write_config } => {
            initialize(&config, &cli.config, show_config, write_config)
        }
    };

    if let Err(e) = result {
        error!("{}", format!("Error: {}", e).red());
        std::process::exit(1);
    }
}

fn resolve_role(role: Option<&str>, config: &Config) -> error::Result<ProviderRole> {
    match role {
        Some(raw) => raw.parse(),
        None => Ok(config.trigger.default_role),
    }
}

fn open_runner(config: &Config, dry_run: bool) -> error::Result<Arc<VerificationRunner<Database>>> {
    let db = Database::new(&config.database.path)?;
    Ok(Arc::new(VerificationRunner::new(
        db,
        dry_run || config.verification.dry_run,
    )))
}

async fn serve(config: Config) -> error::Result<()> {
    let runner = open_runner(&config, false)?;
    let notifier = PassNotifier::new(&config);
    let state = AppState::new(runner, config, notifier);
    server::serve(state).await
}

async fn run_once(config: &Config, role: Option<&str>, dry_run: bool) -> error::Result<()> {
    let role = resolve_role(role, config)?;
    println!("{}", format!("Running verification pass for {} providers...", role).cyan());

    let runner = open_runner(config, dry_run)?;
    let summary = runner.run_pass(role, TriggerSource::Cli).await?;

    if let Some(notifier) = PassNotifier::new(config) {
        notifier.notify_pass_complete(&summary).await;
    }

    summary.print_summary();
    Ok(())
}

async fn run_auto_service(
    config: &Config,
    interval: u64,
    role: Option<&str>,
    dry_run: bool,
) -> error::Result<()> {
    if interval == 0 {
        return Err(VerifyError::Config("interval must be greater than zero".to_string()));
    }

    let role = resolve_role(role, config)?;
    let runner = open_runner(config, dry_run)?;

    println!("{}", "Starting automated verification service...".green());
    println!("Role:     {}", role);
    println!("Interval: {} seconds", interval);
    println!("Dry run:  {}", runner.is_dry_run());

    let notifier = PassNotifier::new(config);
    if notifier.is_some() {
        println!("{}", "✓ Telegram notifications enabled".green());
    }

    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, stopping automated verification");
                return Ok(());
            }
        }

        info!("Running verification cycle...");

        match runner.run_pass(role, TriggerSource::Auto).await {
            Ok(summary) => {
                if let Some(ref n) = notifier {
                    n.notify_pass_complete(&summary).await;
                }
                summary.print_summary();
            }
            Err(e) => {
                warn!("Verification cycle failed: {}", e);
                if let Some(ref n) = notifier {
                    n.notify_pass_failed(role, &e.to_string()).await;
                }
            }
        }
    }
}

fn check_provider(config: &Config, provider_id: &str) -> error::Result<()> {
    let db = Database::new(&config.database.path)?;
    let provider = db
        .get_provider(provider_id)?
        .ok_or_else(|| VerifyError::ProviderNotFound(provider_id.to_string()))?;

    let decision = verification::evaluate(&provider.stats);

    println!("{}", format!("=== Provider {} ===", provider.id).cyan().bold());
    println!("Name:               {}", provider.name);
    println!("Role:               {}", provider.role);
    println!("Completed bookings: {}", provider.stats.completed_bookings);
    println!("Average rating:     {}", utils::format_rating(provider.stats.average_rating));
    println!(
        "Verified:           {}",
        utils::format_verified(provider.stats.verified_at.as_ref())
    );
    println!("\nNext pass:          {:?}", decision.decision);
    println!("Reason:             {}", verification::explain(&provider.stats));

    Ok(())
}

fn list_providers(config: &Config, role: Option<&str>, status: &str, format: &str) -> error::Result<()> {
    let role = role.map(str::parse::<ProviderRole>).transpose()?;
    let db = Database::new(&config.database.path)?;

    let providers: Vec<_> = db
        .list_providers(role)?
        .into_iter()
        .filter(|p| match status {
            "verified" => p.stats.is_verified(),
            "unverified" => !p.stats.is_verified(),
            _ => true,
        })
        .collect();

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&providers)?);
        return Ok(());
    }

    if providers.is_empty() {
        println!("{}", "No providers found".yellow());
        return Ok(());
    }

    let widths = [20, 24, 8, 10, 8, 14, 10];
    utils::print_table_border(110);
    utils::print_table_row(
        &["Id", "Name", "Role", "Bookings", "Rating", "Verified", "Next"],
        &widths,
    );
    utils::print_table_border(110);

    for provider in &providers {
        let decision = verification::evaluate(&provider.stats).decision;
        utils::print_table_row(
            &[
                &utils::format_id(&provider.id, 20),
                &utils::format_id(&provider.name, 24),
                &provider.role.to_string(),
                &provider.stats.completed_bookings.to_string(),
                &utils::format_rating(provider.stats.average_rating),
                &utils::format_verified(provider.stats.verified_at.as_ref()),
                &format!("{:?}", decision),
            ],
            &widths,
        );
    }
    utils::print_table_border(110);
    println!("{} providers", providers.len());

    Ok(())
}

fn show_history(config: &Config, limit: usize, passes: bool, format: &str) -> error::Result<()> {
    let db = Database::new(&config.database.path)?;

    if passes {
        let history = db.get_pass_history(Some(limit))?;
        if format == "json" {
            println!("{}", serde_json::to_string_pretty(&history)?);
            return Ok(());
        }

        println!("{}", "Recent Verification Passes:".yellow());
        let widths = [22, 8, 6, 6, 8, 8, 6, 10];
        utils::print_table_border(100);
        utils::print_table_row(
            &["Finished", "Role", "Source", "Total", "Verified", "Revoked", "Failed", "Status"],
            &widths,
        );
        utils::print_table_border(100);
        for pass in history {
            let status = match (&pass.error, pass.dry_run) {
                (Some(_), _) => "aborted".red().to_string(),
                (None, true) => "dry run".yellow().to_string(),
                (None, false) => "ok".green().to_string(),
            };
            utils::print_table_row(
                &[
                    &utils::format_timestamp(&pass.finished_at),
                    &pass.role.to_string(),
                    &pass.source.to_string(),
                    &pass.total.to_string(),
                    &pass.verified.to_string(),
                    &pass.revoked.to_string(),
                    &pass.failed.to_string(),
                    &status,
                ],
                &widths,
            );
        }
        utils::print_table_border(100);
        return Ok(());
    }

    let history = db.get_verification_history(Some(limit))?;
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    println!("{}", "Recent Verification Changes:".yellow());
    let widths = [22, 20, 8, 8, 8, 6, 6];
    utils::print_table_border(100);
    utils::print_table_row(
        &["Timestamp", "Provider", "Role", "Action", "Bookings", "Rating", "Source"],
        &widths,
    );
    utils::print_table_border(100);
    for event in history {
        utils::print_table_row(
            &[
                &utils::format_timestamp(&event.timestamp),
                &utils::format_id(&event.provider_id, 20),
                &event.role.to_string(),
                &utils::format_action(event.action),
                &event.completed_bookings.to_string(),
                &utils::format_rating(event.average_rating),
                &event.source.to_string(),
            ],
            &widths,
        );
    }
    utils::print_table_border(100);

    Ok(())
}

fn show_stats(config: &Config, format: &str) -> error::Result<()> {
    let db = Database::new(&config.database.path)?;
    let stats = db.get_stats()?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", "=== Provider Verification Statistics ===".cyan().bold());
    println!("\nProviders:");
    println!("  Total:       {}", stats.total_providers);
    println!("  Companies:   {}", stats.companies);
    println!("  Workers:     {}", stats.workers);
    println!("  Verified:    {}", stats.verified_providers.to_string().green());

    println!("\nVerification Changes:");
    println!("  Granted:     {}", stats.total_grants.to_string().green());
    println!("  Revoked:     {}", stats.total_revocations.to_string().red());

    println!("\nPasses:");
    println!("  Total:       {}", stats.total_passes);
    match stats.last_pass_at {
        Some(ts) => println!("  Last pass:   {}", utils::format_timestamp(&ts)),
        None => println!("  Last pass:   {}", "never".dimmed()),
    }

    Ok(())
}

fn initialize(
    config: &Config,
    config_arg: &str,
    show_config: bool,
    write_config: bool,
) -> error::Result<()> {
    println!("{}", "Initializing provider verifier...".green());
    let _db = Database::new(&config.database.path)?;
    println!("{}", "✓ Database initialized".green());
    println!("{}", "✓ Configuration loaded".green());

    if write_config {
        let path = config_file_path(config_arg);
        Config::default().write_to(&path)?;
        println!("{}", format!("✓ Default configuration written to {}", path.display()).green());
    }

    println!("\n{}", "Configuration:".cyan());
    println!("  Database:       {}", config.database.path);
    println!("  Listen:         {}:{}", config.server.host, config.server.port);
    println!("  Default role:   {}", config.trigger.default_role);
    println!(
        "  Cron secret:    {}",
        if config.trigger.cron_secret.is_some() { "set".green() } else { "not set".yellow() }
    );
    println!("  Interval:       {}s", config.verification.interval_secs);
    println!("  Dry run:        {}", config.verification.dry_run);

    if show_config {
        println!("\n{}", config.to_toml()?);
    }

    println!("\n{}", "Ready to use! Try running:".cyan());
    println!("  {} to verify providers once", "verifier run --dry-run".yellow());
    println!("  {} to serve the cron trigger", "verifier serve".yellow());
    println!("  {} to view statistics", "verifier stats".yellow());
    Ok(())
}
