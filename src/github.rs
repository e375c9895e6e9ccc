//! Minimal GitHub REST client for the organization billing endpoints.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::collector::CollectorError;

/// Default GitHub API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default per-request timeout (10 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("github-billing-exporter/", env!("CARGO_PKG_VERSION"));

/// Settings shared by every GitHub billing collector.
#[derive(Debug, Clone)]
pub struct GithubSettings {
    /// API token, sent as a bearer token when present.
    pub token: Option<String>,
    /// Organizations to report on.
    pub orgs: Vec<String>,
    /// API base URL.
    pub api_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            token: None,
            orgs: Vec::new(),
            api_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// GitHub Actions usage for an organization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionsBilling {
    #[serde(default)]
    pub total_minutes_used: f64,
    #[serde(default)]
    pub total_paid_minutes_used: f64,
    #[serde(default)]
    pub included_minutes: f64,
    #[serde(default)]
    pub minutes_used_breakdown: BTreeMap<String, f64>,
}

/// GitHub Packages usage for an organization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackagesBilling {
    #[serde(default)]
    pub total_gigabytes_bandwidth_used: f64,
    #[serde(default)]
    pub total_paid_gigabytes_bandwidth_used: f64,
    #[serde(default)]
    pub included_gigabytes_bandwidth: f64,
}

/// Shared storage usage for an organization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SharedStorageBilling {
    #[serde(default)]
    pub days_left_in_billing_cycle: f64,
    #[serde(default)]
    pub estimated_paid_storage_for_month: f64,
    #[serde(default)]
    pub estimated_storage_for_month: f64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Cloneable GitHub API client.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: Client,
    api_url: String,
    token: Option<String>,
}

impl GithubClient {
    /// Build a client from settings.
    ///
    /// # Errors
    /// Returns `CollectorError::Config` if the HTTP client cannot be built.
    pub fn new(settings: &GithubSettings) -> Result<Self, CollectorError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            header::HeaderValue::from_static(API_VERSION),
        );

        let http = Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| CollectorError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            token: settings.token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Fetch Actions billing for `org`.
    pub async fn actions_billing(&self, org: &str) -> Result<ActionsBilling, CollectorError> {
        self.get_json(&format!("/orgs/{org}/settings/billing/actions"))
            .await
    }

    /// Fetch Packages billing for `org`.
    pub async fn packages_billing(&self, org: &str) -> Result<PackagesBilling, CollectorError> {
        self.get_json(&format!("/orgs/{org}/settings/billing/packages"))
            .await
    }

    /// Fetch shared storage billing for `org`.
    pub async fn shared_storage_billing(
        &self,
        org: &str,
    ) -> Result<SharedStorageBilling, CollectorError> {
        self.get_json(&format!("/orgs/{org}/settings/billing/shared-storage"))
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CollectorError> {
        let url = format!("{}{}", self.api_url, path);
        let mut request = self.http.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        tracing::trace!(url = %url, bytes = body.len(), "Billing API response");
        Ok(serde_json::from_slice(&body)?)
    }
}

fn api_error(status: StatusCode, body: &[u8]) -> CollectorError {
    let message = serde_json::from_slice::<ApiErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });

    CollectorError::Api {
        status: status.as_u16(),
        message,
    }
}
