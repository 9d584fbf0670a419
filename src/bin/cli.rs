//! CAF release tracker CLI
//!
//! Local execution entry point.

use std::path::PathBuf;

use caf_tracker::{
    error::{AppError, Result},
    models::{Config, ProjectKind, ReleaseRecord},
    pipeline::Tracker,
    services::{
        ExclusionRuleSet, LogMessenger, ManifestResolver, MessageFormatter, Messenger,
        TelegramMessenger,
    },
    storage::{GitPublisher, LocalStore, SnapshotStore},
    utils::HttpClient,
};
use clap::{Parser, Subcommand};

/// caf-tracker - CodeLinaro release tracker
#[derive(Parser, Debug)]
#[command(
    name = "caf-tracker",
    version,
    about = "Tracks CAF releases and posts enriched notifications"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Override the data directory from the configuration
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, diff, notify, persist, and publish
    Run {
        /// Log messages instead of sending them and keep stored data unchanged
        #[arg(long)]
        dry_run: bool,

        /// Skip the git publish step
        #[arg(long)]
        no_publish: bool,

        /// Only track this project
        #[arg(long)]
        project: Option<String>,
    },

    /// Resolve one tag and print its notification text
    Resolve {
        tag: String,

        /// Listing the tag belongs to (platform, system, vendor)
        #[arg(long, default_value = "platform")]
        project: String,
    },

    /// Validate the configuration file
    Validate,

    /// Show stored snapshot info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_if_present(&cli.config).inspect_err(|e| {
        log::error!("Failed to load {}: {}", cli.config.display(), e);
    })?;
    if let Some(data_dir) = &cli.data_dir {
        config.paths.data_dir = data_dir.clone();
    }
    Ok(config)
}

/// Main entry point for the CLI application.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;

    match &cli.command {
        Command::Run {
            dry_run,
            no_publish,
            project,
        } => {
            config.validate()?;
            let client = HttpClient::new(&config.http)?;
            let store = LocalStore::new(&config.paths.data_dir);

            let messenger: Box<dyn Messenger> = if *dry_run {
                Box::new(LogMessenger)
            } else {
                Box::new(TelegramMessenger::from_env(
                    client.inner().clone(),
                    &config.notify,
                )?)
            };

            let mut tracker = Tracker::new(&config, &client, &store, messenger.as_ref())?;
            if *dry_run {
                tracker = tracker.without_persist();
            }

            let mut report = tracker.run(project.as_deref()).await?;
            for project in &report.projects {
                log::info!(
                    "{}: {} records, {} new, {} deliveries",
                    project.project,
                    project.fetched,
                    project.new_records,
                    project.delivered
                );
            }

            if config.publish.enabled && !*no_publish && !*dry_run {
                let publisher = GitPublisher::from_env(&config.publish, &config.paths.data_dir)?;
                report.published = Some(tracker.publish(&publisher).await?);
            }

            if !report.is_success() {
                let failed: Vec<&str> = report.failures.iter().map(|(p, _)| p.as_str()).collect();
                return Err(AppError::fetch("run", format!("failed projects: {}", failed.join(", "))));
            }
        }

        Command::Resolve { tag, project } => {
            let client = HttpClient::new(&config.http)?;
            let exclusions = ExclusionRuleSet::new(&config.exclusions)?;
            let resolver = ManifestResolver::new(&client, &config, &exclusions)?;

            let enrichment = resolver.resolve(tag, ProjectKind::parse(project)).await;
            let record = ReleaseRecord::new(
                tag.as_str(),
                project.as_str(),
                chrono::Utc::now().to_rfc3339(),
            );
            println!("{}", MessageFormatter::new(&config).format(&record, &enrichment));
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            let exclusions = ExclusionRuleSet::new(&config.exclusions)?;
            if exclusions.is_empty() {
                log::warn!("No exclusion rules configured");
            }
            log::info!(
                "✓ Config OK ({} projects, {} exclusion rules)",
                config.projects.len(),
                exclusions.len()
            );
        }

        Command::Info => {
            let store = LocalStore::new(&config.paths.data_dir);
            log::info!("Data directory: {}", store.root_dir().display());

            for project in &config.projects {
                let snapshot = store.load(&project.name).await?;
                if snapshot.is_empty() {
                    log::info!("{}: no snapshot found yet", project.name);
                    continue;
                }
                log::info!("{}: {} records", project.name, snapshot.len());
                for (section, records) in snapshot.sections() {
                    log::info!("  {}: {}", section, records.len());
                }
                if let Some(backup) = store.load_backup(&project.name).await? {
                    log::info!("  backup: {} records", backup.len());
                }
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
