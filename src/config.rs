use crate::report::model::{DEFAULT_NEW_HIRE_MARKER, NewHireMarker};
use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use url::Url;

const APP_DIR: &str = ".kb4-report";
const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_API_BASE_URL: &str = "https://us.api.knowbe4.com/v1";
pub const API_KEY_ENV: &str = "KB4_REPORT_API_KEY";
pub const SMTP_PASSWORD_ENV: &str = "KB4_REPORT_SMTP_PASSWORD";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub page_size: u32,
    pub request_timeout_seconds: u64,
    pub user_lookup_delay_ms: u64,
    pub new_hire_marker: String,
    pub client_name: Option<String>,
    pub report_dir: PathBuf,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_sender: Option<String>,
    pub smtp_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: None,
            page_size: 500,
            request_timeout_seconds: 30,
            user_lookup_delay_ms: 1000,
            new_hire_marker: DEFAULT_NEW_HIRE_MARKER.to_string(),
            client_name: None,
            report_dir: default_report_dir(),
            smtp_host: "smtp.office365.com".to_string(),
            smtp_port: 587,
            smtp_sender: None,
            smtp_password: None,
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(config_path)?;

        Ok(())
    }

    pub fn new_hire(&self) -> NewHireMarker {
        NewHireMarker::new(self.new_hire_marker.clone())
    }

    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret(API_KEY_ENV, self.api_key.as_ref())
    }

    pub fn resolve_smtp_password(&self) -> Option<String> {
        resolve_secret(SMTP_PASSWORD_ENV, self.smtp_password.as_ref())
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "api_base_url" => {
                let trimmed = value.trim().trim_end_matches('/');
                Url::parse(trimmed)
                    .with_context(|| format!("api_base_url must be a valid URL: {value}"))?;
                self.api_base_url = trimmed.to_string();
            }
            "api_key" => {
                self.api_key = non_blank(value);
            }
            "page_size" => {
                self.page_size = value
                    .parse::<u32>()
                    .map_err(|_| anyhow!("page_size must be a number"))?
                    .clamp(1, 500);
            }
            "request_timeout_seconds" => {
                self.request_timeout_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("request_timeout_seconds must be a number"))?
                    .max(5);
            }
            "user_lookup_delay_ms" => {
                self.user_lookup_delay_ms = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("user_lookup_delay_ms must be a number"))?;
            }
            "new_hire_marker" => {
                self.new_hire_marker = value.trim().to_string();
            }
            "client_name" => {
                self.client_name = non_blank(value);
            }
            "report_dir" => {
                self.report_dir = expand_home(value);
            }
            "smtp_host" => {
                let host = value.trim();
                if host.is_empty() {
                    bail!("smtp_host must not be empty");
                }
                self.smtp_host = host.to_string();
            }
            "smtp_port" => {
                self.smtp_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("smtp_port must be a number"))?;
            }
            "smtp_sender" => {
                self.smtp_sender = non_blank(value);
            }
            "smtp_password" => {
                self.smtp_password = non_blank(value);
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: api_base_url|api.base_url, api_key|api.key, page_size|api.page_size, request_timeout_seconds|api.timeout_seconds, user_lookup_delay_ms|api.user_delay_ms, new_hire_marker|report.new_hire_marker, client_name|report.client, report_dir|report.dir, smtp_host|smtp.host, smtp_port|smtp.port, smtp_sender|smtp.sender, smtp_password|smtp.password"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "api_base_url" => Some(self.api_base_url.clone()),
            "api_key" => Some(mask(self.api_key.as_ref())),
            "page_size" => Some(self.page_size.to_string()),
            "request_timeout_seconds" => Some(self.request_timeout_seconds.to_string()),
            "user_lookup_delay_ms" => Some(self.user_lookup_delay_ms.to_string()),
            "new_hire_marker" => Some(self.new_hire_marker.clone()),
            "client_name" => Some(self.client_name.clone().unwrap_or_default()),
            "report_dir" => Some(self.report_dir.display().to_string()),
            "smtp_host" => Some(self.smtp_host.clone()),
            "smtp_port" => Some(self.smtp_port.to_string()),
            "smtp_sender" => Some(self.smtp_sender.clone().unwrap_or_default()),
            "smtp_password" => Some(mask(self.smtp_password.as_ref())),
            _ => None,
        }
    }
}

pub fn is_secret_key(key: &str) -> bool {
    matches!(normalize_config_key(key), "api_key" | "smtp_password")
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "api_base_url" | "api.base_url" => "api_base_url",
        "api_key" | "api.key" => "api_key",
        "page_size" | "api.page_size" => "page_size",
        "request_timeout_seconds" | "api.timeout_seconds" => "request_timeout_seconds",
        "user_lookup_delay_ms" | "api.user_delay_ms" => "user_lookup_delay_ms",
        "new_hire_marker" | "report.new_hire_marker" => "new_hire_marker",
        "client_name" | "report.client" => "client_name",
        "report_dir" | "report.dir" => "report_dir",
        "smtp_host" | "smtp.host" => "smtp_host",
        "smtp_port" | "smtp.port" => "smtp_port",
        "smtp_sender" | "smtp.sender" => "smtp_sender",
        "smtp_password" | "smtp.password" => "smtp_password",
        _ => key,
    }
}

fn resolve_secret(env_key: &str, configured: Option<&String>) -> Option<String> {
    std::env::var(env_key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| configured.filter(|value| !value.trim().is_empty()).cloned())
}

fn non_blank(value: &str) -> Option<String> {
    (!value.trim().is_empty()).then(|| value.trim().to_string())
}

fn mask(secret: Option<&String>) -> String {
    secret
        .map(|_| "***set***".to_string())
        .unwrap_or_else(|| "not_set".to_string())
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

pub fn default_report_dir() -> PathBuf {
    default_root_dir().join("reports")
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}
