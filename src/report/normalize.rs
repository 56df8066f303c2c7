use crate::report::enrich::EnrichedRecord;

pub const TRAINING_COLUMNS: [&str; 6] = ["name", "email", "manager", "campaign", "module", "status"];

pub const PHISHING_COLUMNS: [&str; 13] = [
    "name",
    "email",
    "manager",
    "campaign",
    "template_name",
    "delivered_at",
    "opened_at",
    "clicked_at",
    "replied_at",
    "attachment_opened_at",
    "macro_enabled_at",
    "data_entered_at",
    "reported_at",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingRow {
    pub name: String,
    pub email: String,
    pub manager: String,
    pub campaign: String,
    pub module: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhishingRow {
    pub name: String,
    pub email: String,
    pub manager: String,
    pub campaign: String,
    pub template_name: String,
    pub delivered_at: Option<String>,
    pub opened_at: Option<String>,
    pub clicked_at: Option<String>,
    pub replied_at: Option<String>,
    pub attachment_opened_at: Option<String>,
    pub macro_enabled_at: Option<String>,
    pub data_entered_at: Option<String>,
    pub reported_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedRecord {
    Training(TrainingRow),
    Phishing(PhishingRow),
}

impl NormalizedRecord {
    #[cfg(test)]
    pub fn campaign(&self) -> &str {
        match self {
            Self::Training(row) => &row.campaign,
            Self::Phishing(row) => &row.campaign,
        }
    }

    /// Field values in column order; absent timestamps become empty strings.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::Training(row) => vec![
                row.name.as_str(),
                row.email.as_str(),
                row.manager.as_str(),
                row.campaign.as_str(),
                row.module.as_str(),
                row.status.as_str(),
            ],
            Self::Phishing(row) => {
                let mut fields = vec![
                    row.name.as_str(),
                    row.email.as_str(),
                    row.manager.as_str(),
                    row.campaign.as_str(),
                    row.template_name.as_str(),
                ];
                fields.extend(
                    [
                        &row.delivered_at,
                        &row.opened_at,
                        &row.clicked_at,
                        &row.replied_at,
                        &row.attachment_opened_at,
                        &row.macro_enabled_at,
                        &row.data_entered_at,
                        &row.reported_at,
                    ]
                    .into_iter()
                    .map(|value| value.as_deref().unwrap_or_default()),
                );
                fields
            }
        }
    }
}

pub fn normalize(records: &[EnrichedRecord]) -> Vec<NormalizedRecord> {
    records.iter().map(normalize_record).collect()
}

fn normalize_record(record: &EnrichedRecord) -> NormalizedRecord {
    match record {
        EnrichedRecord::Training(entry) => NormalizedRecord::Training(TrainingRow {
            name: entry.name.clone(),
            email: entry.email.clone(),
            manager: entry.manager.clone().unwrap_or_default(),
            campaign: entry.campaign.clone(),
            module: entry.module.clone(),
            status: entry.status.clone(),
        }),
        EnrichedRecord::Phishing(entry) => NormalizedRecord::Phishing(PhishingRow {
            name: entry.name.clone(),
            email: entry.email.clone(),
            manager: entry.manager.clone().unwrap_or_default(),
            campaign: entry.campaign.clone(),
            template_name: entry.template_name.clone(),
            delivered_at: entry.events.delivered_at.clone(),
            opened_at: entry.events.opened_at.clone(),
            clicked_at: entry.events.clicked_at.clone(),
            replied_at: entry.events.replied_at.clone(),
            attachment_opened_at: entry.events.attachment_opened_at.clone(),
            macro_enabled_at: entry.events.macro_enabled_at.clone(),
            data_entered_at: entry.events.data_entered_at.clone(),
            reported_at: entry.events.reported_at.clone(),
        }),
    }
}
