use crate::report::error::{RecordError, Result};
use crate::report::model::{Campaign, CampaignKind, Enrollment, Recipient, SecurityTest, User};

/// A fetched user profile, or the reason it could not be decoded.
pub type UserRecord = std::result::Result<User, RecordError>;

/// Read-only access to campaign, enrollment and user data.
///
/// Every call is a remote read; failures are fatal for the run. A user
/// profile that arrives but does not decode is reported through
/// [`UserRecord`] so only the records for that user are dropped.
pub trait CampaignSource {
    fn list_campaigns(&self, kind: CampaignKind) -> Result<Vec<Campaign>>;

    fn list_enrollments(&self, campaign_id: u64) -> Result<Vec<Enrollment>>;

    fn list_security_tests(&self, campaign_id: u64) -> Result<Vec<SecurityTest>>;

    fn list_recipients(&self, security_test_id: u64) -> Result<Vec<Recipient>>;

    fn get_user(&self, user_id: u64) -> Result<UserRecord>;
}
