pub mod enrich;
pub mod error;
pub mod model;
pub mod normalize;
pub mod select;
pub mod source;
pub mod window;

use crate::report::enrich::Enricher;
use crate::report::error::{ReportError, Result};
use crate::report::model::{CampaignKind, NewHireMarker};
use crate::report::normalize::{NormalizedRecord, PHISHING_COLUMNS, TRAINING_COLUMNS, normalize};
use crate::report::select::{SelectionPolicy, select_campaigns};
use crate::report::source::CampaignSource;
use crate::report::window::{Frequency, TimeWindow};
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    WeeklyTraining,
    Training,
    Phishing,
}

impl FromStr for ReportType {
    type Err = ReportError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "wt" | "weekly-training" => Ok(Self::WeeklyTraining),
            "t" | "training" => Ok(Self::Training),
            "p" | "phishing" => Ok(Self::Phishing),
            _ => Err(ReportError::UnknownReportKind(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    WeeklyTraining,
    WindowedTraining(Frequency),
    WindowedPhishing(Frequency),
}

impl ReportKind {
    /// Windowed kinds need a frequency; the weekly training report ignores it.
    pub fn resolve(report_type: ReportType, frequency: Option<Frequency>) -> Result<Self> {
        match (report_type, frequency) {
            (ReportType::WeeklyTraining, _) => Ok(Self::WeeklyTraining),
            (ReportType::Training, Some(frequency)) => Ok(Self::WindowedTraining(frequency)),
            (ReportType::Phishing, Some(frequency)) => Ok(Self::WindowedPhishing(frequency)),
            (ReportType::Training, None) => Err(ReportError::MissingFrequency("training")),
            (ReportType::Phishing, None) => Err(ReportError::MissingFrequency("phishing")),
        }
    }

    pub fn campaign_kind(self) -> CampaignKind {
        match self {
            Self::WeeklyTraining | Self::WindowedTraining(_) => CampaignKind::Training,
            Self::WindowedPhishing(_) => CampaignKind::Phishing,
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self.campaign_kind() {
            CampaignKind::Training => &TRAINING_COLUMNS,
            CampaignKind::Phishing => &PHISHING_COLUMNS,
        }
    }

    pub fn title_stem(self) -> &'static str {
        match self.campaign_kind() {
            CampaignKind::Training => "Training Completion Status",
            CampaignKind::Phishing => "Phish Test Status",
        }
    }

    pub fn description(self) -> String {
        match self {
            Self::WeeklyTraining => "This report shows the status of current training campaigns broken down by user training completion status.".to_string(),
            Self::WindowedTraining(frequency) => format!(
                "This report shows training completion status by user for campaigns active during the past {frequency}."
            ),
            Self::WindowedPhishing(frequency) => format!(
                "This report shows phishing test results by recipient for security tests run during the past {frequency}."
            ),
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WeeklyTraining => f.write_str("weekly training"),
            Self::WindowedTraining(frequency) => write!(f, "training ({frequency})"),
            Self::WindowedPhishing(frequency) => write!(f, "phishing ({frequency})"),
        }
    }
}

/// Human-readable report title, used as file name stem and email subject.
pub fn report_title(client: Option<&str>, kind: ReportKind) -> String {
    match client.map(str::trim).filter(|client| !client.is_empty()) {
        Some(client) => format!("{client} {}", kind.title_stem()),
        None => kind.title_stem().to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub kind: ReportKind,
    pub exclude_new_hire: bool,
    pub now: DateTime<Utc>,
    pub new_hire: NewHireMarker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub kind: ReportKind,
    pub records: Vec<NormalizedRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Nothing matched; no file should be written and nothing sent.
    Empty,
    Ready(Report),
}

enum Plan {
    Training(SelectionPolicy),
    Phishing(TimeWindow),
}

impl ReportRequest {
    fn plan(&self) -> Plan {
        match self.kind {
            ReportKind::WeeklyTraining => Plan::Training(SelectionPolicy::Status {
                exclude_new_hire: self.exclude_new_hire,
            }),
            ReportKind::WindowedTraining(frequency) => Plan::Training(SelectionPolicy::Window(
                TimeWindow::ending_at(self.now, frequency),
            )),
            ReportKind::WindowedPhishing(frequency) => {
                Plan::Phishing(TimeWindow::ending_at(self.now, frequency))
            }
        }
    }
}

pub fn run_report<S: CampaignSource + ?Sized>(
    source: &S,
    request: &ReportRequest,
) -> Result<ReportOutcome> {
    let campaign_kind = request.kind.campaign_kind();
    let plan = request.plan();

    info!(kind = %request.kind, "fetching campaigns");
    let campaigns = source.list_campaigns(campaign_kind)?;

    let policy = match &plan {
        Plan::Training(policy) => *policy,
        Plan::Phishing(window) => SelectionPolicy::Window(*window),
    };
    let selected = select_campaigns(campaigns, campaign_kind, &policy, &request.new_hire)?;

    let mut enricher = Enricher::new(source, &request.new_hire);
    let mut enriched = Vec::new();
    for campaign in &selected {
        let records = match &plan {
            Plan::Training(_) => enricher.enrich_training(campaign)?,
            Plan::Phishing(window) => enricher.enrich_phishing(campaign, window)?,
        };
        enriched.extend(records);
    }

    let records = normalize(&enriched);
    if records.is_empty() {
        info!(kind = %request.kind, "no records matched, nothing to report");
        return Ok(ReportOutcome::Empty);
    }

    info!(kind = %request.kind, records = records.len(), "report assembled");
    Ok(ReportOutcome::Ready(Report {
        kind: request.kind,
        records,
    }))
}
