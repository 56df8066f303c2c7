use crate::report::error::{ReportError, Result};
use crate::report::model::{Campaign, CampaignKind, NewHireMarker, SecurityTest};
use crate::report::window::{TimeWindow, parse_timestamp};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Currently running campaigns only.
    Status { exclude_new_hire: bool },
    /// Campaigns that ran inside the window or are still running.
    Window(TimeWindow),
}

pub fn select_campaigns(
    campaigns: Vec<Campaign>,
    kind: CampaignKind,
    policy: &SelectionPolicy,
    new_hire: &NewHireMarker,
) -> Result<Vec<Campaign>> {
    let mut selected = Vec::with_capacity(campaigns.len());

    for campaign in campaigns {
        let include = match policy {
            SelectionPolicy::Status { exclude_new_hire } => {
                status_selects(&campaign, *exclude_new_hire, new_hire)
            }
            SelectionPolicy::Window(window) => window_selects(&campaign, kind, window, new_hire)?,
        };

        if include {
            selected.push(campaign);
        }
    }

    info!(
        kind = kind.as_str(),
        selected = selected.len(),
        "campaign selection finished"
    );

    Ok(selected)
}

/// Security tests of one campaign that started inside the window or are still active.
pub fn select_security_tests(
    tests: Vec<SecurityTest>,
    window: &TimeWindow,
) -> Result<Vec<SecurityTest>> {
    let mut selected = Vec::with_capacity(tests.len());

    for test in tests {
        let started_at = test
            .started_at
            .as_deref()
            .map(|raw| {
                parse_timestamp(raw).ok_or_else(|| ReportError::InvalidTimestamp {
                    entity: "security test",
                    name: test.label(),
                    field: "started_at",
                    value: raw.to_string(),
                })
            })
            .transpose()?;

        if started_at.is_some_and(|instant| window.contains(instant)) {
            debug!(test = %test.label(), "security test falls within the report window");
            selected.push(test);
        } else if test.status.is_running() {
            debug!(test = %test.label(), "security test is outside the window but still active");
            selected.push(test);
        } else {
            debug!(test = %test.label(), "security test is outside the report window, skipping");
        }
    }

    Ok(selected)
}

fn status_selects(campaign: &Campaign, exclude_new_hire: bool, new_hire: &NewHireMarker) -> bool {
    if exclude_new_hire && new_hire.matches(&campaign.name) {
        debug!(campaign = %campaign.name, "skipping new hire campaign");
        return false;
    }

    if campaign.status.is_in_progress() {
        debug!(campaign = %campaign.name, "campaign is in progress");
        true
    } else {
        debug!(campaign = %campaign.name, status = %campaign.status, "campaign is not in progress, skipping");
        false
    }
}

fn window_selects(
    campaign: &Campaign,
    kind: CampaignKind,
    window: &TimeWindow,
    new_hire: &NewHireMarker,
) -> Result<bool> {
    let ran_at = window_instant(campaign, kind)?;

    if campaign.is_open_ended()
        && new_hire.matches(&campaign.name)
        && campaign.status.is_in_progress()
    {
        debug!(campaign = %campaign.name, "open-ended new hire campaign is in progress");
        return Ok(true);
    }

    if ran_at.is_some_and(|instant| window.contains(instant)) {
        debug!(campaign = %campaign.name, "campaign falls within the report window");
        return Ok(true);
    }

    if campaign.status.is_running() {
        debug!(campaign = %campaign.name, "campaign is outside the window but still in progress");
        return Ok(true);
    }

    debug!(campaign = %campaign.name, "campaign is outside the report window, skipping");
    Ok(false)
}

fn window_instant(campaign: &Campaign, kind: CampaignKind) -> Result<Option<DateTime<Utc>>> {
    let (field, raw) = campaign.window_timestamp(kind);

    raw.map(|value| {
        parse_timestamp(value).ok_or_else(|| ReportError::InvalidTimestamp {
            entity: "campaign",
            name: campaign.name.clone(),
            field,
            value: value.to_string(),
        })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::{SelectionPolicy, select_campaigns, select_security_tests};
    use crate::report::error::ReportError;
    use crate::report::model::{Campaign, CampaignKind, NewHireMarker, SecurityTest, Status};
    use crate::report::window::{Frequency, TimeWindow, parse_timestamp};

    fn campaign(id: u64, name: &str, status: &str, start: Option<&str>) -> Campaign {
        Campaign {
            id,
            name: name.to_string(),
            status: Status::from(status),
            start_date: start.map(str::to_string),
            end_date: Some("2030-01-01T00:00:00.000Z".to_string()),
            last_run: start.map(str::to_string),
        }
    }

    fn week_ending_mid_march() -> TimeWindow {
        TimeWindow::ending_at(
            parse_timestamp("2024-03-15T00:00:00Z").expect("timestamp"),
            Frequency::Week,
        )
    }

    fn names(campaigns: &[Campaign]) -> Vec<&str> {
        campaigns.iter().map(|campaign| campaign.name.as_str()).collect()
    }

    #[test]
    fn status_policy_excludes_new_hire_when_flagged() {
        let campaigns = vec![
            campaign(1, "Q1 Security", "In Progress", None),
            campaign(2, "New Hire Onboarding", "In Progress", None),
        ];

        let selected = select_campaigns(
            campaigns.clone(),
            CampaignKind::Training,
            &SelectionPolicy::Status {
                exclude_new_hire: true,
            },
            &NewHireMarker::default(),
        )
        .expect("selection");
        assert_eq!(names(&selected), vec!["Q1 Security"]);

        let selected = select_campaigns(
            campaigns,
            CampaignKind::Training,
            &SelectionPolicy::Status {
                exclude_new_hire: false,
            },
            &NewHireMarker::default(),
        )
        .expect("selection");
        assert_eq!(names(&selected), vec!["Q1 Security", "New Hire Onboarding"]);
    }

    #[test]
    fn status_policy_ignores_timestamps() {
        let campaigns = vec![
            campaign(1, "Old but running", "In Progress", Some("not a date")),
            campaign(2, "Finished", "Completed", Some("2024-03-10T00:00:00.000Z")),
        ];

        let selected = select_campaigns(
            campaigns,
            CampaignKind::Training,
            &SelectionPolicy::Status {
                exclude_new_hire: false,
            },
            &NewHireMarker::default(),
        )
        .expect("selection");

        assert_eq!(names(&selected), vec!["Old but running"]);
    }

    #[test]
    fn window_policy_keeps_recent_and_running_in_source_order() {
        let mut open_new_hire = campaign(4, "New Hire Basics", "In Progress", None);
        open_new_hire.end_date = None;

        let campaigns = vec![
            campaign(1, "Still running", "In Progress", Some("2023-01-01T00:00:00.000Z")),
            campaign(2, "Recent", "Completed", Some("2024-03-10T00:00:00.000Z")),
            campaign(3, "Stale", "Closed", Some("2023-06-01T00:00:00.000Z")),
            open_new_hire,
            campaign(5, "Future", "Created", Some("2024-04-01T00:00:00.000Z")),
        ];

        let selected = select_campaigns(
            campaigns,
            CampaignKind::Training,
            &SelectionPolicy::Window(week_ending_mid_march()),
            &NewHireMarker::default(),
        )
        .expect("selection");

        assert_eq!(
            names(&selected),
            vec!["Still running", "Recent", "New Hire Basics"]
        );
    }

    #[test]
    fn phishing_campaigns_are_windowed_by_last_run() {
        let mut never_run = campaign(1, "Never run", "Closed", None);
        never_run.start_date = Some("2024-03-10T00:00:00.000Z".to_string());
        let mut ran_recently = campaign(2, "Ran recently", "Closed", None);
        ran_recently.last_run = Some("2024-03-12T00:00:00.000Z".to_string());

        let selected = select_campaigns(
            vec![never_run, ran_recently],
            CampaignKind::Phishing,
            &SelectionPolicy::Window(week_ending_mid_march()),
            &NewHireMarker::default(),
        )
        .expect("selection");

        assert_eq!(names(&selected), vec!["Ran recently"]);
    }

    #[test]
    fn unparseable_timestamp_aborts_selection() {
        let campaigns = vec![campaign(1, "Broken", "In Progress", Some("yesterday"))];

        let error = select_campaigns(
            campaigns,
            CampaignKind::Training,
            &SelectionPolicy::Window(week_ending_mid_march()),
            &NewHireMarker::default(),
        )
        .expect_err("selection must fail");

        assert!(matches!(
            error,
            ReportError::InvalidTimestamp { field: "start_date", .. }
        ));
    }

    #[test]
    fn security_tests_use_start_or_active_state() {
        let test = |id: u64, status: &str, started_at: &str| SecurityTest {
            id,
            name: None,
            status: Status::from(status),
            started_at: Some(started_at.to_string()),
        };

        let selected = select_security_tests(
            vec![
                test(1, "Closed", "2024-03-09T00:00:00.000Z"),
                test(2, "Active", "2023-01-01T00:00:00.000Z"),
                test(3, "Closed", "2023-01-01T00:00:00.000Z"),
            ],
            &week_ending_mid_march(),
        )
        .expect("selection");

        assert_eq!(
            selected.iter().map(|test| test.id).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn unparseable_security_test_start_aborts_selection() {
        let tests = vec![SecurityTest {
            id: 7,
            name: Some("March PST".to_string()),
            status: Status::from("Active"),
            started_at: Some("not a date".to_string()),
        }];

        let error = select_security_tests(tests, &week_ending_mid_march())
            .expect_err("selection must fail");

        assert!(matches!(
            error,
            ReportError::InvalidTimestamp {
                entity: "security test",
                field: "started_at",
                ..
            }
        ));
    }
}
