mod cli;
mod config;
mod export;
mod knowbe4;
mod mail;
mod report;

use crate::cli::onboard::run_onboarding;
use crate::cli::{Cli, Commands, ConfigCommands, ReportArgs};
use crate::config::{Config, is_secret_key};
use crate::knowbe4::ApiClient;
use crate::mail::{MailSettings, ReportMail};
use crate::report::model::CampaignKind;
use crate::report::source::CampaignSource;
use crate::report::{
    Report, ReportKind, ReportOutcome, ReportRequest, report_title, run_report,
};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => run_onboarding(),
        Commands::Config { command } => handle_config_command(command),
        Commands::Doctor => handle_doctor(),
        Commands::Send {
            report,
            to,
            keep_file,
        } => handle_send(report, &to, keep_file),
        Commands::Export { report, output } => handle_export(report, output),
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load().unwrap_or_default();
            config.set_value(&key, &value)?;
            config.save()?;

            let masked = if is_secret_key(&key) {
                "***hidden***".to_string()
            } else {
                value
            };
            println!("Config saved: {key} = {masked}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = Config::load().unwrap_or_default();

    if config.resolve_api_key().is_some() {
        println!("[OK] KnowBe4 API key is configured");
    } else {
        println!("[WARN] KnowBe4 API key is missing");
        issues.push("api key missing".to_string());
    }

    match MailSettings::from_config(&config) {
        Ok(settings) => println!(
            "[OK] SMTP sender configured: {} via {}:{}",
            settings.sender, settings.host, settings.port
        ),
        Err(error) => {
            println!("[WARN] {error}");
            issues.push("smtp settings incomplete".to_string());
        }
    }

    if config.report_dir.exists() {
        println!("[OK] report dir exists: {}", config.report_dir.display());
    } else {
        println!(
            "[OK] report dir will be created on first export: {}",
            config.report_dir.display()
        );
    }

    if config.resolve_api_key().is_some() {
        match ApiClient::from_config(&config)
            .and_then(|client| {
                client
                    .list_campaigns(CampaignKind::Training)
                    .map_err(anyhow::Error::from)
            })
        {
            Ok(campaigns) => println!(
                "[OK] KnowBe4 API reachable ({} training campaign(s))",
                campaigns.len()
            ),
            Err(error) => {
                println!("[WARN] KnowBe4 API check failed: {error:#}");
                issues.push("api unreachable".to_string());
            }
        }
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn handle_send(args: ReportArgs, recipient: &str, keep_file: bool) -> Result<()> {
    let config = load_config()?;
    let mail_settings = MailSettings::from_config(&config)?;
    let client = client_name(&args, &config);
    let request = build_request(&args, &config)?;

    let Some(report) = generate(&config, &request)? else {
        println!("Nothing to report for {}. No email sent.", request.kind);
        return Ok(());
    };

    let title = report_title(client.as_deref(), report.kind);
    let csv_path = export::save_report_csv(&report, &title, &config.report_dir)?;

    let sent = mail::send_report(
        &mail_settings,
        &ReportMail {
            recipient,
            subject: &title,
            body: &report.kind.description(),
            attachment: &csv_path,
        },
    );

    if !keep_file {
        if let Err(error) = fs::remove_file(&csv_path) {
            warn!(error = %error, path = %csv_path.display(), "failed to remove sent report file");
        }
    }

    sent?;
    println!(
        "Report sent: {title} ({} row(s)) to {recipient}",
        report.records.len()
    );
    if keep_file {
        println!("- CSV: {}", csv_path.display());
    }

    Ok(())
}

fn handle_export(args: ReportArgs, output: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let client = client_name(&args, &config);
    let request = build_request(&args, &config)?;

    let Some(report) = generate(&config, &request)? else {
        println!("Nothing to report for {}. No file written.", request.kind);
        return Ok(());
    };

    let title = report_title(client.as_deref(), report.kind);
    let csv_path = match output {
        Some(path) => {
            export::write_report_csv(&report, &path)?;
            path
        }
        None => export::save_report_csv(&report, &title, &config.report_dir)?,
    };

    println!("Report exported: {title} ({} row(s))", report.records.len());
    println!("- CSV: {}", csv_path.display());

    Ok(())
}

/// Resolves CLI input into a request before any network access happens.
fn build_request(args: &ReportArgs, config: &Config) -> Result<ReportRequest> {
    let kind = ReportKind::resolve(args.kind, args.frequency)?;

    Ok(ReportRequest {
        kind,
        exclude_new_hire: args.exclude_new_hire,
        now: Utc::now(),
        new_hire: config.new_hire(),
    })
}

fn generate(config: &Config, request: &ReportRequest) -> Result<Option<Report>> {
    let source = ApiClient::from_config(config)?;

    info!(kind = %request.kind, "generating report");
    match run_report(&source, request).context("Report generation failed")? {
        ReportOutcome::Ready(report) => Ok(Some(report)),
        ReportOutcome::Empty => Ok(None),
    }
}

fn client_name(args: &ReportArgs, config: &Config) -> Option<String> {
    args.client.clone().or_else(|| config.client_name.clone())
}

fn load_config() -> Result<Config> {
    Config::load()
        .with_context(|| "Config file not found. Run `kb4-report onboard` first.".to_string())
}
