use crate::config::Config;
use anyhow::{Context, Result, anyhow};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub host: String,
    pub port: u16,
    pub sender: String,
    pub password: String,
    pub timeout: Duration,
}

impl MailSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        let sender = config.smtp_sender.clone().context(
            "SMTP sender is missing. Set `kb4-report config set smtp.sender <ADDRESS>`.",
        )?;
        let password = config.resolve_smtp_password().context(
            "SMTP password is missing. Set `kb4-report config set smtp.password <PASSWORD>` or `KB4_REPORT_SMTP_PASSWORD`.",
        )?;

        Ok(Self {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            sender,
            password,
            timeout: Duration::from_secs(config.request_timeout_seconds.max(5)),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReportMail<'a> {
    pub recipient: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
    pub attachment: &'a Path,
}

pub fn build_message(sender: &str, mail: &ReportMail<'_>) -> Result<Message> {
    let from: Mailbox = sender
        .parse()
        .with_context(|| format!("Invalid sender address: {sender}"))?;
    let to: Mailbox = mail
        .recipient
        .parse()
        .with_context(|| format!("Invalid recipient address: {}", mail.recipient))?;

    let file_name = mail
        .attachment
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .with_context(|| format!("Attachment has no file name: {}", mail.attachment.display()))?;
    let content = fs::read(mail.attachment).with_context(|| {
        format!(
            "Failed to read report attachment: {}",
            mail.attachment.display()
        )
    })?;

    let mime = mime_guess::from_path(mail.attachment).first_or_octet_stream();
    let content_type = ContentType::parse(mime.essence_str())
        .map_err(|error| anyhow!("Unsupported attachment content type {mime}: {error}"))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(mail.subject)
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(mail.body.to_string()))
                .singlepart(Attachment::new(file_name).body(content, content_type)),
        )
        .context("Failed to build report email")
}

pub fn send_report(settings: &MailSettings, mail: &ReportMail<'_>) -> Result<()> {
    let message = build_message(&settings.sender, mail)?;

    let transport = SmtpTransport::starttls_relay(&settings.host)
        .with_context(|| format!("Failed to configure SMTP relay: {}", settings.host))?
        .port(settings.port)
        .credentials(Credentials::new(
            settings.sender.clone(),
            settings.password.clone(),
        ))
        .timeout(Some(settings.timeout))
        .build();

    info!(
        sender = %settings.sender,
        recipient = mail.recipient,
        host = %settings.host,
        "sending report email"
    );

    transport
        .send(&message)
        .with_context(|| format!("Failed to send report email to {}", mail.recipient))?;

    Ok(())
}
