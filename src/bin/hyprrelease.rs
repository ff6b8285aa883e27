// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use hyprrelease::{
    ai::model::ModelFetch,
    config::Settings,
    install::prompt::AlwaysDecline,
    manager::Manager,
    path::default_config_file,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, process::exit, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "hyprrelease [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Decline every confirmation instead of asking.
    #[arg(short, long, global = true)]
    pub non_interactive: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let path = match self.config {
            Some(path) => path,
            None => default_config_file()?,
        };
        let mut manager = Manager::new(Settings::load(path)?)?;
        if self.non_interactive {
            manager = manager.with_prompt(Arc::new(AlwaysDecline));
        }

        match self.command {
            Command::CheckVersion(opts) => run_check_version(&manager, opts).await,
            Command::CheckChannel(opts) => run_check_channel(&manager, opts).await,
            Command::Audit(opts) => run_audit(&manager, opts).await,
            Command::Install(opts) => run_install(&manager, opts).await,
            Command::Update(opts) => run_update(&manager, opts).await,
            Command::ExportJson => run_export_json(&manager),
            Command::List => run_list(&manager),
            Command::FetchModels => run_fetch_models(&manager).await,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Resolve installed version of dotfiles.
    #[command(override_usage = "hyprrelease check-version [options] <name>")]
    CheckVersion(NameOptions),

    /// Classify release channel of installed dotfiles.
    #[command(override_usage = "hyprrelease check-channel [options] <name>")]
    CheckChannel(NameOptions),

    /// Audit installed Hyprland components.
    #[command(override_usage = "hyprrelease audit [options] [<component>]...")]
    Audit(AuditOptions),

    /// Clone and install dotfiles from registry.
    #[command(override_usage = "hyprrelease install [options] <name>")]
    Install(InstallOptions),

    /// Check for updates, and offer to reinstall dotfiles.
    #[command(override_usage = "hyprrelease update [options] <name>")]
    Update(NameOptions),

    /// Print both metadata files as one JSON document.
    ExportJson,

    /// List dotfiles in registry.
    List,

    /// Download configured model artifacts.
    FetchModels,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct NameOptions {
    /// Name of dotfiles in registry.
    #[arg(required = true, value_name = "name")]
    pub name: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AuditOptions {
    /// Components to audit, all of them if none are given.
    #[arg(value_name = "component")]
    pub components: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InstallOptions {
    /// Name of dotfiles in registry.
    #[arg(required = true, value_name = "name")]
    pub name: String,

    /// Branch to install instead of asking.
    #[arg(short, long, value_name = "branch")]
    pub branch: Option<String>,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

async fn run_check_version(manager: &Manager, opts: NameOptions) -> Result<()> {
    let resolution = manager.check_version(&opts.name).await?;
    println!("main: {}", resolution.pair.main);
    println!("build: {}", resolution.pair.build);
    println!("commits behind: {}", resolution.commits_behind);

    Ok(())
}

async fn run_check_channel(manager: &Manager, opts: NameOptions) -> Result<()> {
    let channel = manager.check_channel(&opts.name).await?;
    println!("branch: {}", channel.branch);
    println!("channel: {}", channel.channel);
    println!("source: {}", channel.source);

    Ok(())
}

async fn run_audit(manager: &Manager, opts: AuditOptions) -> Result<()> {
    let (records, report) = manager.audit(&opts.components).await?;
    for record in &records {
        let marker = if record.update_available { "update available" } else { "up to date" };
        println!(
            "{}: {} (remote {}, {} package {}) {marker}",
            record.name,
            record.version,
            record.remote_version,
            record.package_source,
            record.package_version,
        );
    }

    for name in &report.skipped {
        println!("{name}: not installed");
    }

    if let Some(error) = &report.persistence_error {
        error!("{error}");
    }

    Ok(())
}

async fn run_install(manager: &Manager, opts: InstallOptions) -> Result<()> {
    let report = manager.install(&opts.name, opts.branch).await?;
    info!(
        "installed {} ({}) through {} tier",
        report.name, report.branch, report.summary.tier
    );
    println!("{}", report.summary.outcome.detail);
    println!("version: {}", report.resolution.pair);
    println!("channel: {}", report.channel);

    Ok(())
}

async fn run_update(manager: &Manager, opts: NameOptions) -> Result<()> {
    let report = manager.update(&opts.name).await?;
    if !report.updates_available {
        println!("system components are up to date");
    }

    if let Some(resolution) = &report.resolution {
        println!("dotfiles: {} ({} commits behind)", resolution.pair, resolution.commits_behind);
    }

    if let Some(reinstalled) = &report.reinstalled {
        println!("reinstalled through {} tier", reinstalled.summary.tier);
    }

    Ok(())
}

fn run_export_json(manager: &Manager) -> Result<()> {
    println!("{}", manager.export_json()?);
    Ok(())
}

fn run_list(manager: &Manager) -> Result<()> {
    for entry in manager.list() {
        let releases = if entry.has_releases { " [releases]" } else { "" };
        println!("{} by {} ({}){releases}", entry.name, entry.author, entry.branch);
        if !entry.description.is_empty() {
            println!("    {}", entry.description);
        }
    }

    Ok(())
}

async fn run_fetch_models(manager: &Manager) -> Result<()> {
    for fetched in manager.fetch_models().await? {
        match fetched {
            ModelFetch::Downloaded(path) => println!("downloaded {}", path.display()),
            ModelFetch::Present(path) => println!("already present {}", path.display()),
        }
    }

    Ok(())
}
