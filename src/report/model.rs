use serde::Deserialize;
use std::fmt;

pub const DEFAULT_NEW_HIRE_MARKER: &str = "New Hire";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignKind {
    Training,
    Phishing,
}

impl CampaignKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::Phishing => "phishing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Status {
    Created,
    InProgress,
    Active,
    Completed,
    Closed,
    Other(String),
}

impl Status {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Campaigns report "In Progress" while security tests report "Active".
    pub fn is_running(&self) -> bool {
        matches!(self, Self::InProgress | Self::Active)
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<&str> for Status {
    fn from(raw: &str) -> Self {
        match raw.trim() {
            "Created" => Self::Created,
            "In Progress" => Self::InProgress,
            "Active" => Self::Active,
            "Completed" => Self::Completed,
            "Closed" => Self::Closed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Status {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("Created"),
            Self::InProgress => f.write_str("In Progress"),
            Self::Active => f.write_str("Active"),
            Self::Completed => f.write_str("Completed"),
            Self::Closed => f.write_str("Closed"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Campaign {
    #[serde(rename = "campaign_id")]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub last_run: Option<String>,
}

impl Campaign {
    /// Training campaigns are windowed by start date, phishing campaigns by their last run.
    pub fn window_timestamp(&self, kind: CampaignKind) -> (&'static str, Option<&str>) {
        match kind {
            CampaignKind::Training => ("start_date", self.start_date.as_deref()),
            CampaignKind::Phishing => ("last_run", self.last_run.as_deref()),
        }
    }

    pub fn is_open_ended(&self) -> bool {
        self.end_date
            .as_deref()
            .is_none_or(|value| value.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityTest {
    #[serde(rename = "pst_id")]
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub started_at: Option<String>,
}

impl SecurityTest {
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("security test {}", self.id))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserRef {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserRef {
    pub fn display_name(&self) -> Option<String> {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        (!name.is_empty()).then_some(name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Enrollment {
    #[serde(default)]
    pub user: Option<UserRef>,
    #[serde(default)]
    pub module_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateRef {
    #[serde(default)]
    pub name: Option<String>,
}

/// Each timestamp is present only when the event happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PhishEvents {
    #[serde(default)]
    pub delivered_at: Option<String>,
    #[serde(default)]
    pub opened_at: Option<String>,
    #[serde(default)]
    pub clicked_at: Option<String>,
    #[serde(default)]
    pub replied_at: Option<String>,
    #[serde(default)]
    pub attachment_opened_at: Option<String>,
    #[serde(default)]
    pub macro_enabled_at: Option<String>,
    #[serde(default)]
    pub data_entered_at: Option<String>,
    #[serde(default)]
    pub reported_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Recipient {
    #[serde(default)]
    pub user: Option<UserRef>,
    #[serde(default)]
    pub template: Option<TemplateRef>,
    #[serde(flatten)]
    pub events: PhishEvents,
}

/// The parts of a user profile the reports read. Other fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    #[serde(default)]
    pub manager_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl User {
    pub fn is_archived(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|status| status.trim().eq_ignore_ascii_case("archived"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHireMarker(String);

impl NewHireMarker {
    pub fn new(marker: impl Into<String>) -> Self {
        Self(marker.into())
    }

    pub fn matches(&self, campaign_name: &str) -> bool {
        !self.0.is_empty() && campaign_name.contains(&self.0)
    }
}

impl Default for NewHireMarker {
    fn default() -> Self {
        Self::new(DEFAULT_NEW_HIRE_MARKER)
    }
}
