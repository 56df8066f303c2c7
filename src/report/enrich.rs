use crate::report::error::{RecordError, Result};
use crate::report::model::{
    Campaign, Enrollment, NewHireMarker, PhishEvents, Recipient, SecurityTest, UserRef,
};
use crate::report::select::select_security_tests;
use crate::report::source::{CampaignSource, UserRecord};
use crate::report::window::TimeWindow;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use tracing::{debug, info, warn};

const PASSED: &str = "Passed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingEntry {
    pub user_id: u64,
    pub name: String,
    pub email: String,
    pub manager: Option<String>,
    pub campaign: String,
    pub module: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhishingEntry {
    pub user_id: u64,
    pub name: String,
    pub email: String,
    pub manager: Option<String>,
    pub campaign: String,
    pub template_name: String,
    pub events: PhishEvents,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichedRecord {
    Training(TrainingEntry),
    Phishing(PhishingEntry),
}

#[cfg(test)]
impl EnrichedRecord {
    pub fn campaign(&self) -> &str {
        match self {
            Self::Training(entry) => &entry.campaign,
            Self::Phishing(entry) => &entry.campaign,
        }
    }

    pub fn user_id(&self) -> u64 {
        match self {
            Self::Training(entry) => entry.user_id,
            Self::Phishing(entry) => entry.user_id,
        }
    }
}

#[derive(Debug)]
enum DropReason {
    Archived,
    NewHirePassed,
    Invalid(RecordError),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Archived => f.write_str("user is archived"),
            Self::NewHirePassed => f.write_str("new hire training already passed"),
            Self::Invalid(error) => write!(f, "malformed record: {error}"),
        }
    }
}

impl From<RecordError> for DropReason {
    fn from(error: RecordError) -> Self {
        Self::Invalid(error)
    }
}

enum Verdict<T> {
    Keep(T),
    Drop(DropReason),
}

struct Participant {
    user_id: u64,
    name: String,
    email: String,
}

/// Joins enrollments and recipients with user profiles for one report run.
///
/// User profiles are cached by id, so each distinct user costs one read.
/// A profile that failed to decode is cached too.
pub struct Enricher<'a, S: CampaignSource + ?Sized> {
    source: &'a S,
    new_hire: &'a NewHireMarker,
    users: HashMap<u64, UserRecord>,
}

impl<'a, S: CampaignSource + ?Sized> Enricher<'a, S> {
    pub fn new(source: &'a S, new_hire: &'a NewHireMarker) -> Self {
        Self {
            source,
            new_hire,
            users: HashMap::new(),
        }
    }

    pub fn enrich_training(&mut self, campaign: &Campaign) -> Result<Vec<EnrichedRecord>> {
        let enrollments = self.source.list_enrollments(campaign.id)?;
        let is_new_hire = self.new_hire.matches(&campaign.name);

        info!(
            campaign = %campaign.name,
            enrollments = enrollments.len(),
            "enriching training enrollments"
        );

        let mut records = Vec::with_capacity(enrollments.len());
        for (index, enrollment) in enrollments.iter().enumerate() {
            match self.training_entry(campaign, is_new_hire, enrollment)? {
                Verdict::Keep(entry) => records.push(EnrichedRecord::Training(entry)),
                Verdict::Drop(reason) => log_drop(&campaign.name, index, &reason),
            }
        }

        Ok(records)
    }

    pub fn enrich_phishing(
        &mut self,
        campaign: &Campaign,
        window: &TimeWindow,
    ) -> Result<Vec<EnrichedRecord>> {
        let tests = self.source.list_security_tests(campaign.id)?;
        let tests = select_security_tests(tests, window)?;

        info!(
            campaign = %campaign.name,
            security_tests = tests.len(),
            "enriching phishing recipients"
        );

        let mut records = Vec::new();
        for test in &tests {
            records.extend(self.enrich_security_test(campaign, test)?);
        }

        Ok(records)
    }

    fn enrich_security_test(
        &mut self,
        campaign: &Campaign,
        test: &SecurityTest,
    ) -> Result<Vec<EnrichedRecord>> {
        let recipients = self.source.list_recipients(test.id)?;

        debug!(
            campaign = %campaign.name,
            test = %test.label(),
            recipients = recipients.len(),
            "fetched security test recipients"
        );

        let mut records = Vec::with_capacity(recipients.len());
        for (index, recipient) in recipients.iter().enumerate() {
            match self.phishing_entry(campaign, recipient)? {
                Verdict::Keep(entry) => records.push(EnrichedRecord::Phishing(entry)),
                Verdict::Drop(reason) => log_drop(&campaign.name, index, &reason),
            }
        }

        Ok(records)
    }

    fn training_entry(
        &mut self,
        campaign: &Campaign,
        is_new_hire: bool,
        enrollment: &Enrollment,
    ) -> Result<Verdict<TrainingEntry>> {
        let (participant, module, status) = match validate_enrollment(enrollment) {
            Ok(fields) => fields,
            Err(error) => return Ok(Verdict::Drop(error.into())),
        };

        if is_new_hire && status == PASSED {
            return Ok(Verdict::Drop(DropReason::NewHirePassed));
        }

        let manager = match self.active_manager(participant.user_id)? {
            Verdict::Keep(manager) => manager,
            Verdict::Drop(reason) => return Ok(Verdict::Drop(reason)),
        };

        Ok(Verdict::Keep(TrainingEntry {
            user_id: participant.user_id,
            name: participant.name,
            email: participant.email,
            manager,
            campaign: campaign.name.clone(),
            module,
            status,
        }))
    }

    fn phishing_entry(
        &mut self,
        campaign: &Campaign,
        recipient: &Recipient,
    ) -> Result<Verdict<PhishingEntry>> {
        let (participant, template_name) = match validate_recipient(recipient) {
            Ok(fields) => fields,
            Err(error) => return Ok(Verdict::Drop(error.into())),
        };

        let manager = match self.active_manager(participant.user_id)? {
            Verdict::Keep(manager) => manager,
            Verdict::Drop(reason) => return Ok(Verdict::Drop(reason)),
        };

        Ok(Verdict::Keep(PhishingEntry {
            user_id: participant.user_id,
            name: participant.name,
            email: participant.email,
            manager,
            campaign: campaign.name.clone(),
            template_name,
            events: recipient.events.clone(),
        }))
    }

    /// Manager name of a non-archived user.
    fn active_manager(&mut self, user_id: u64) -> Result<Verdict<Option<String>>> {
        let cached = match self.users.entry(user_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.source.get_user(user_id)?),
        };
        let user = match cached {
            Ok(user) => user,
            Err(error) => return Ok(Verdict::Drop(error.clone().into())),
        };

        if user.status.is_none() {
            return Ok(Verdict::Drop(RecordError::MissingField("user.status").into()));
        }

        if user.is_archived() {
            return Ok(Verdict::Drop(DropReason::Archived));
        }

        Ok(Verdict::Keep(user.manager_name.clone()))
    }
}

fn validate_enrollment(
    enrollment: &Enrollment,
) -> std::result::Result<(Participant, String, String), RecordError> {
    let participant = validate_participant(enrollment.user.as_ref())?;
    let module = required(enrollment.module_name.as_deref(), "module_name")?;
    let status = required(enrollment.status.as_deref(), "status")?;

    Ok((participant, module, status))
}

fn validate_recipient(
    recipient: &Recipient,
) -> std::result::Result<(Participant, String), RecordError> {
    let participant = validate_participant(recipient.user.as_ref())?;
    let template_name = required(
        recipient
            .template
            .as_ref()
            .and_then(|template| template.name.as_deref()),
        "template.name",
    )?;

    Ok((participant, template_name))
}

fn validate_participant(user: Option<&UserRef>) -> std::result::Result<Participant, RecordError> {
    let user = user.ok_or(RecordError::MissingField("user"))?;

    Ok(Participant {
        user_id: user.id.ok_or(RecordError::MissingField("user.id"))?,
        name: user
            .display_name()
            .ok_or(RecordError::MissingField("user.first_name"))?,
        email: required(user.email.as_deref(), "user.email")?,
    })
}

fn required(value: Option<&str>, field: &'static str) -> std::result::Result<String, RecordError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .ok_or(RecordError::MissingField(field))
}

fn log_drop(campaign: &str, index: usize, reason: &DropReason) {
    match reason {
        DropReason::Invalid(_) => warn!(campaign, index, reason = %reason, "dropping record"),
        _ => debug!(campaign, index, reason = %reason, "excluding record"),
    }
}

#[cfg(test)]
mod tests {
    use super::{EnrichedRecord, Enricher};
    use crate::report::error::ReportError;
    use crate::report::model::{Enrollment, NewHireMarker, User, UserRef};
    use crate::report::source::memory::{
        MemorySource, campaign, enrollment, recipient, security_test, user, user_ref,
    };
    use crate::report::window::{Frequency, TimeWindow, parse_timestamp};
    use std::collections::{HashMap, HashSet};

    fn pairs(records: &[EnrichedRecord]) -> Vec<(String, u64)> {
        records
            .iter()
            .map(|record| (record.campaign().to_string(), record.user_id()))
            .collect()
    }

    fn window() -> TimeWindow {
        TimeWindow::ending_at(
            parse_timestamp("2024-03-15T00:00:00Z").expect("timestamp"),
            Frequency::Week,
        )
    }

    #[test]
    fn archived_user_yields_no_records() {
        let source = MemorySource {
            enrollments: HashMap::from([(
                1,
                vec![enrollment(user_ref(10, "Ada", "Lovelace"), "Phishing 101", "In Progress")],
            )]),
            users: HashMap::from([(10, user("Boss", "archived"))]),
            ..MemorySource::default()
        };
        let marker = NewHireMarker::default();
        let mut enricher = Enricher::new(&source, &marker);

        let records = enricher
            .enrich_training(&campaign(1, "Q1 Security", "In Progress"))
            .expect("enrichment");

        assert!(records.is_empty());
    }

    #[test]
    fn new_hire_passes_are_dropped_other_statuses_kept() {
        let source = MemorySource {
            enrollments: HashMap::from([(
                1,
                vec![
                    enrollment(user_ref(10, "Ada", "Lovelace"), "Onboarding", "Passed"),
                    enrollment(user_ref(11, "Grace", "Hopper"), "Onboarding", "In Progress"),
                    enrollment(user_ref(12, "Alan", "Turing"), "Onboarding", "Past Due"),
                ],
            )]),
            users: HashMap::from([
                (10, user("Boss", "active")),
                (11, user("Boss", "active")),
                (12, user("Boss", "active")),
            ]),
            ..MemorySource::default()
        };
        let marker = NewHireMarker::default();
        let mut enricher = Enricher::new(&source, &marker);

        let records = enricher
            .enrich_training(&campaign(1, "New Hire Onboarding", "In Progress"))
            .expect("enrichment");

        assert_eq!(
            pairs(&records),
            vec![
                ("New Hire Onboarding".to_string(), 11),
                ("New Hire Onboarding".to_string(), 12)
            ]
        );
        assert_eq!(*source.user_reads.borrow(), vec![11, 12]);
    }

    #[test]
    fn passes_outside_new_hire_campaigns_are_kept() {
        let source = MemorySource {
            enrollments: HashMap::from([(
                1,
                vec![enrollment(user_ref(10, "Ada", "Lovelace"), "Phishing 101", "Passed")],
            )]),
            users: HashMap::from([(10, user("Boss", "active"))]),
            ..MemorySource::default()
        };
        let marker = NewHireMarker::default();
        let mut enricher = Enricher::new(&source, &marker);

        let records = enricher
            .enrich_training(&campaign(1, "Q1 Security", "In Progress"))
            .expect("enrichment");

        let [EnrichedRecord::Training(entry)] = records.as_slice() else {
            panic!("expected one training record, got {records:?}");
        };
        assert_eq!(entry.name, "Ada Lovelace");
        assert_eq!(entry.email, "ada@example.com");
        assert_eq!(entry.manager.as_deref(), Some("Boss"));
        assert_eq!(entry.module, "Phishing 101");
        assert_eq!(entry.status, "Passed");
    }

    #[test]
    fn malformed_enrollment_is_skipped_and_processing_continues() {
        let source = MemorySource {
            enrollments: HashMap::from([(
                1,
                vec![
                    Enrollment {
                        user: Some(UserRef {
                            id: Some(10),
                            ..UserRef::default()
                        }),
                        ..Enrollment::default()
                    },
                    enrollment(user_ref(11, "Grace", "Hopper"), "Phishing 101", "In Progress"),
                ],
            )]),
            users: HashMap::from([(11, user("Boss", "active"))]),
            ..MemorySource::default()
        };
        let marker = NewHireMarker::default();
        let mut enricher = Enricher::new(&source, &marker);

        let records = enricher
            .enrich_training(&campaign(1, "Q1 Security", "In Progress"))
            .expect("enrichment");

        assert_eq!(pairs(&records), vec![("Q1 Security".to_string(), 11)]);
        assert_eq!(*source.user_reads.borrow(), vec![11]);
    }

    #[test]
    fn undecodable_user_drops_only_that_users_records() {
        let source = MemorySource {
            enrollments: HashMap::from([(
                1,
                vec![
                    enrollment(user_ref(10, "Ada", "Lovelace"), "Module A", "In Progress"),
                    enrollment(user_ref(11, "Grace", "Hopper"), "Module A", "In Progress"),
                    enrollment(user_ref(10, "Ada", "Lovelace"), "Module B", "In Progress"),
                ],
            )]),
            users: HashMap::from([(11, user("Boss", "active"))]),
            malformed_users: HashSet::from([10]),
            ..MemorySource::default()
        };
        let marker = NewHireMarker::default();
        let mut enricher = Enricher::new(&source, &marker);

        let records = enricher
            .enrich_training(&campaign(1, "Q1 Security", "In Progress"))
            .expect("enrichment");

        assert_eq!(pairs(&records), vec![("Q1 Security".to_string(), 11)]);
        assert_eq!(*source.user_reads.borrow(), vec![10, 11]);
    }

    #[test]
    fn user_without_status_is_dropped() {
        let source = MemorySource {
            recipients: HashMap::from([(
                100,
                vec![
                    recipient(user_ref(10, "Ada", "Lovelace"), "Invoice", None),
                    recipient(user_ref(11, "Grace", "Hopper"), "Invoice", None),
                ],
            )]),
            security_tests: HashMap::from([(
                1,
                vec![security_test(100, "Closed", "2024-03-12T00:00:00.000Z")],
            )]),
            users: HashMap::from([
                (
                    10,
                    User {
                        manager_name: Some("Boss".to_string()),
                        status: None,
                    },
                ),
                (11, user("Boss", "active")),
            ]),
            ..MemorySource::default()
        };
        let marker = NewHireMarker::default();
        let mut enricher = Enricher::new(&source, &marker);

        let records = enricher
            .enrich_phishing(&campaign(1, "Monthly Phish", "Closed"), &window())
            .expect("enrichment");

        assert_eq!(pairs(&records), vec![("Monthly Phish".to_string(), 11)]);
    }

    #[test]
    fn each_distinct_user_is_read_once() {
        let source = MemorySource {
            enrollments: HashMap::from([
                (
                    1,
                    vec![enrollment(user_ref(10, "Ada", "Lovelace"), "Module A", "In Progress")],
                ),
                (
                    2,
                    vec![enrollment(user_ref(10, "Ada", "Lovelace"), "Module B", "Not Started")],
                ),
            ]),
            users: HashMap::from([(10, user("Boss", "active"))]),
            ..MemorySource::default()
        };
        let marker = NewHireMarker::default();
        let mut enricher = Enricher::new(&source, &marker);

        let mut records = enricher
            .enrich_training(&campaign(1, "Campaign A", "In Progress"))
            .expect("enrichment");
        records.extend(
            enricher
                .enrich_training(&campaign(2, "Campaign B", "In Progress"))
                .expect("enrichment"),
        );

        assert_eq!(records.len(), 2);
        assert_eq!(*source.user_reads.borrow(), vec![10]);
    }

    #[test]
    fn phishing_joins_recipients_of_in_scope_tests_only() {
        let source = MemorySource {
            security_tests: HashMap::from([(
                1,
                vec![
                    security_test(100, "Closed", "2024-03-12T00:00:00.000Z"),
                    security_test(101, "Closed", "2023-01-01T00:00:00.000Z"),
                ],
            )]),
            recipients: HashMap::from([
                (
                    100,
                    vec![
                        recipient(user_ref(10, "Ada", "Lovelace"), "Invoice", Some("2024-03-12T10:00:00.000Z")),
                        recipient(user_ref(11, "Grace", "Hopper"), "Invoice", None),
                    ],
                ),
                (
                    101,
                    vec![recipient(user_ref(12, "Alan", "Turing"), "Invoice", None)],
                ),
            ]),
            users: HashMap::from([
                (10, user("Boss", "active")),
                (11, user("Boss", "archived")),
                (12, user("Boss", "active")),
            ]),
            ..MemorySource::default()
        };
        let marker = NewHireMarker::default();
        let mut enricher = Enricher::new(&source, &marker);

        let records = enricher
            .enrich_phishing(&campaign(1, "Monthly Phish", "Closed"), &window())
            .expect("enrichment");

        let [EnrichedRecord::Phishing(entry)] = records.as_slice() else {
            panic!("expected one phishing record, got {records:?}");
        };
        assert_eq!(entry.user_id, 10);
        assert_eq!(entry.template_name, "Invoice");
        assert_eq!(
            entry.events.clicked_at.as_deref(),
            Some("2024-03-12T10:00:00.000Z")
        );
        assert!(entry.events.reported_at.is_none());
    }

    #[test]
    fn unreachable_source_is_fatal() {
        let source = MemorySource {
            unreachable: true,
            ..MemorySource::default()
        };
        let marker = NewHireMarker::default();
        let mut enricher = Enricher::new(&source, &marker);

        let error = enricher
            .enrich_training(&campaign(1, "Q1 Security", "In Progress"))
            .expect_err("must fail");

        assert!(matches!(error, ReportError::Transport { .. }));
    }
}
