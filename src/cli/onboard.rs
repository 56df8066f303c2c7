use crate::config::{Config, expand_home};
use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Password, theme::ColorfulTheme};
use url::Url;

pub fn run_onboarding() -> Result<()> {
    println!("──────────────────────────────────────────");
    println!("  Welcome to kb4-report onboarding.");
    println!("──────────────────────────────────────────");

    let theme = ColorfulTheme::default();
    let existing = Config::load().unwrap_or_default();

    println!("\n[1/4] KnowBe4 API");
    let api_base_url: String = Input::with_theme(&theme)
        .with_prompt("  Reporting API base URL")
        .default(existing.api_base_url.clone())
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            Url::parse(input.trim())
                .map(|_| ())
                .map_err(|_| "Enter a full URL (example: https://us.api.knowbe4.com/v1)")
        })
        .interact_text()
        .context("Failed to read API base URL")?;

    let api_key = Password::with_theme(&theme)
        .with_prompt("  Reporting API key (leave empty to use KB4_REPORT_API_KEY)")
        .allow_empty_password(true)
        .interact()
        .context("Failed to read API key")?;
    println!("  ✓ API configured");

    println!("\n[2/4] Client name");
    let client_name: String = Input::with_theme(&theme)
        .with_prompt("  Name used in report titles (example: ACME)")
        .default(existing.client_name.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()
        .context("Failed to read client name")?;

    println!("\n[3/4] Email delivery");
    let smtp_sender: String = Input::with_theme(&theme)
        .with_prompt("  Sender address")
        .default(existing.smtp_sender.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()
        .context("Failed to read sender address")?;

    let smtp_password = Password::with_theme(&theme)
        .with_prompt("  Sender app password (leave empty to use KB4_REPORT_SMTP_PASSWORD)")
        .allow_empty_password(true)
        .interact()
        .context("Failed to read sender password")?;

    let use_default_host = Confirm::with_theme(&theme)
        .with_prompt(format!(
            "  Send through {}:{}?",
            existing.smtp_host, existing.smtp_port
        ))
        .default(true)
        .interact()
        .context("Failed to read SMTP host confirmation")?;

    let smtp_host = if use_default_host {
        existing.smtp_host.clone()
    } else {
        Input::with_theme(&theme)
            .with_prompt("  SMTP host")
            .interact_text()
            .context("Failed to read SMTP host")?
    };

    println!("\n[4/4] Report output directory");
    let report_dir_input: String = Input::with_theme(&theme)
        .with_prompt("  Folder where CSV reports are written")
        .default(existing.report_dir.display().to_string())
        .interact_text()
        .context("Failed to read report directory")?;

    let mut config = Config {
        report_dir: expand_home(&report_dir_input),
        smtp_host,
        ..existing
    };
    config.set_value("api_base_url", &api_base_url)?;
    config.set_value("client_name", &client_name)?;
    config.set_value("smtp_sender", &smtp_sender)?;
    if !api_key.trim().is_empty() {
        config.set_value("api_key", &api_key)?;
    }
    if !smtp_password.trim().is_empty() {
        config.set_value("smtp_password", &smtp_password)?;
    }

    config.save()?;
    println!("  ✓ Config saved ({})", Config::config_path()?.display());

    println!("\n──────────────────────────────────────────");
    println!("  Onboarding complete!");
    println!("  Run kb4-report doctor to verify the setup.");
    println!("──────────────────────────────────────────");

    Ok(())
}
