mod collector;
mod output;
mod telemetry;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ghmon_core::config::Config;
use ghmon_core::model::repo::{RepoId, parse_repo_list};
use ghmon_core::time::parse_interval;
use ghmon_github::{FetcherConfig, GitHubFetcher};
use ghmon_ship::{ArcShipper, ShipperConfig};
use tokio_util::sync::CancellationToken;

use crate::collector::{Collector, CollectorSettings};
use crate::output::{print_config_human, print_record_human};
use crate::telemetry::{LogFormat, init_tracing};

#[derive(Parser, Debug)]
#[command(name = "ghmon")]
#[command(about = "Poll GitHub repository stats and write them to Arc")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Collect on an interval and write each pass to Arc")]
    Run {
        #[arg(long, help = "Run a single pass and exit")]
        once: bool,
        #[arg(long, help = "Comma-separated owner/name list (overrides GITHUB_REPOS)")]
        repos: Option<String>,
        #[arg(long, help = "Seconds or duration between passes, e.g. 600 or 10m")]
        interval: Option<String>,
        #[arg(long)]
        arc_url: Option<String>,
        #[arg(long)]
        database: Option<String>,
    },
    #[command(about = "Print the effective configuration with tokens masked")]
    Config {
        #[arg(long)]
        json: bool,
    },
    #[command(about = "Fetch one repository and print its record without writing it")]
    Fetch {
        repo: String,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // Variables already set in the process win over the file.
    let env_file = dotenvy::dotenv();
    init_tracing(LogFormat::from_env());
    match env_file {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env file"),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!(error = %err, "failed to read .env file"),
    }

    match cli.command {
        Commands::Run {
            once,
            repos,
            interval,
            arc_url,
            database,
        } => {
            let cfg = run_config(repos, interval, arc_url, database)?;
            run_collector(cfg, once).await
        }
        Commands::Config { json } => {
            let cfg = Config::load().context("load config")?;
            let view = cfg.redacted();
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_config_human(&view);
            }
            Ok(())
        }
        Commands::Fetch { repo, json } => {
            let repo = RepoId::parse(&repo)?;
            let cfg = Config::load().context("load config")?;
            let fetcher = GitHubFetcher::new(FetcherConfig::from_config(&cfg))?;
            let record = fetcher.fetch(&repo).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_record_human(&record);
            }
            Ok(())
        }
    }
}

/// Layers CLI flags over file and environment settings and validates the
/// result. Nothing touches the network until this has succeeded.
fn run_config(
    repos: Option<String>,
    interval: Option<String>,
    arc_url: Option<String>,
    database: Option<String>,
) -> anyhow::Result<Config> {
    let mut cfg = Config::load().context("load config")?;
    if let Some(v) = repos {
        cfg.repos = parse_repo_list(&v).context("parse --repos")?;
    }
    if let Some(v) = interval {
        cfg.interval = parse_interval(&v).context("parse --interval")?;
    }
    if let Some(v) = arc_url {
        cfg.arc_url = v.trim_end_matches('/').to_string();
    }
    if let Some(v) = database {
        cfg.arc_database = v;
    }
    cfg.validate().context("invalid configuration")?;
    Ok(cfg)
}

async fn run_collector(cfg: Config, once: bool) -> anyhow::Result<()> {
    let fetcher = GitHubFetcher::new(FetcherConfig::from_config(&cfg))?;
    let shipper = ArcShipper::new(ShipperConfig::from_config(&cfg)?)?;

    tracing::info!(
        repos = cfg.repos.len(),
        arc_url = %cfg.arc_url,
        database = %cfg.arc_database,
        authenticated = cfg.github_token.is_some(),
        "ghmon starting"
    );

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));

    let settings = CollectorSettings::from_config(&cfg, once);
    let collector = Collector::new(settings, fetcher, shipper);
    collector.run(cancel).await;
    Ok(())
}

async fn cancel_on_shutdown_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("received ctrl-c, shutting down");
                    }
                    _ = term.recv() => {
                        tracing::info!("received SIGTERM, shutting down");
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = ?err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("received ctrl-c, shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received ctrl-c, shutting down");
    }
    cancel.cancel();
}
