pub mod throttle;

use crate::config::Config;
use crate::knowbe4::throttle::Throttle;
use crate::report::error::{RecordError, ReportError, Result as ReportResult};
use crate::report::model::{Campaign, CampaignKind, Enrollment, Recipient, SecurityTest};
use crate::report::source::{CampaignSource, UserRecord};
use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub struct ApiClient {
    http: Client,
    base_url: String,
    page_size: u32,
    user_throttle: Throttle,
}

impl ApiClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.resolve_api_key().context(
            "KnowBe4 API key is missing. Set `kb4-report config set api.key <KEY>` or `KB4_REPORT_API_KEY`.",
        )?;

        Self::new(
            &config.api_base_url,
            &api_key,
            config.page_size,
            Duration::from_secs(config.request_timeout_seconds.max(5)),
            Throttle::new(Duration::from_millis(config.user_lookup_delay_ms)),
        )
    }

    pub fn new(
        base_url: &str,
        api_key: &str,
        page_size: u32,
        timeout: Duration,
        user_throttle: Throttle,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            bail!("KnowBe4 API key is empty");
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
                .context("Failed to build Authorization header")?,
        );

        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("Failed to create KnowBe4 HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            page_size: page_size.max(1),
            user_throttle,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn get_json(&self, operation: &str, path: &str, query: &[(&str, String)]) -> ReportResult<Value> {
        let endpoint = self.endpoint(path);
        debug!(operation, endpoint = %endpoint, "requesting KnowBe4 API");

        let response = self
            .http
            .get(&endpoint)
            .query(query)
            .send()
            .map_err(|error| ReportError::transport(operation, error))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|error| ReportError::transport(operation, error))?;

        parse_response(operation, status, &body)
    }

    fn get_page(&self, operation: &str, path: &str, query: &[(&str, String)]) -> ReportResult<Vec<Value>> {
        let mut query = query.to_vec();
        query.push(("per_page", self.page_size.to_string()));

        expect_array(operation, self.get_json(operation, path, &query)?)
    }

    /// Any malformed item invalidates the whole payload.
    fn list_strict<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> ReportResult<Vec<T>> {
        let items = self.get_page(operation, path, query)?;
        serde_json::from_value(Value::Array(items))
            .map_err(|error| ReportError::transport(operation, error))
    }

    fn list_lenient<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> ReportResult<Vec<T>> {
        let items = self.get_page(operation, path, query)?;
        Ok(decode_items(operation, items))
    }
}

impl CampaignSource for ApiClient {
    fn list_campaigns(&self, kind: CampaignKind) -> ReportResult<Vec<Campaign>> {
        match kind {
            CampaignKind::Training => {
                self.list_strict("list training campaigns", "training/campaigns", &[])
            }
            CampaignKind::Phishing => {
                self.list_strict("list phishing campaigns", "phishing/campaigns", &[])
            }
        }
    }

    fn list_enrollments(&self, campaign_id: u64) -> ReportResult<Vec<Enrollment>> {
        self.list_lenient(
            &format!("list enrollments for campaign {campaign_id}"),
            "training/enrollments",
            &[("campaign_id", campaign_id.to_string())],
        )
    }

    fn list_security_tests(&self, campaign_id: u64) -> ReportResult<Vec<SecurityTest>> {
        self.list_strict(
            &format!("list security tests for campaign {campaign_id}"),
            &format!("phishing/campaigns/{campaign_id}/security_tests"),
            &[],
        )
    }

    fn list_recipients(&self, security_test_id: u64) -> ReportResult<Vec<Recipient>> {
        self.list_lenient(
            &format!("list recipients for security test {security_test_id}"),
            &format!("phishing/security_tests/{security_test_id}/recipients"),
            &[],
        )
    }

    fn get_user(&self, user_id: u64) -> ReportResult<UserRecord> {
        let operation = format!("get user {user_id}");
        self.user_throttle.wait();

        let value = self.get_json(&operation, &format!("users/{user_id}"), &[])?;
        decode_user(&operation, value)
    }
}

fn parse_response(operation: &str, status: StatusCode, body: &str) -> ReportResult<Value> {
    if !status.is_success() {
        return Err(ReportError::transport(
            operation,
            format!("KnowBe4 API error {status}: {}", truncate(body, 200)),
        ));
    }

    serde_json::from_str(body).map_err(|error| ReportError::transport(operation, error))
}

fn expect_array(operation: &str, value: Value) -> ReportResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(ReportError::transport(
            operation,
            format!("expected a JSON array, got {}", json_kind(&other)),
        )),
    }
}

/// A non-object payload is a transport error. An object whose fields have
/// the wrong types only invalidates this user.
fn decode_user(operation: &str, value: Value) -> ReportResult<UserRecord> {
    if !value.is_object() {
        return Err(ReportError::transport(
            operation,
            format!("expected a JSON object, got {}", json_kind(&value)),
        ));
    }

    Ok(serde_json::from_value(value).map_err(|error| RecordError::Malformed {
        entity: "user",
        reason: error.to_string(),
    }))
}

/// Decodes each item on its own, dropping the ones that do not fit `T`.
fn decode_items<T: DeserializeOwned>(operation: &str, items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            serde_json::from_value(item)
                .map_err(|error| {
                    warn!(operation, index, error = %error, "dropping malformed record");
                })
                .ok()
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn truncate(body: &str, limit: usize) -> &str {
    match body.char_indices().nth(limit) {
        Some((index, _)) => &body[..index],
        None => body,
    }
}
