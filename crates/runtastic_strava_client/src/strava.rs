//! Strava v3 API client.
//!
//! Every response refreshes the rate-limit snapshot exposed through
//! [`DestinationClient::rate_limit`](crate::DestinationClient::rate_limit).

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Local;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::utils::parse_start_date;
use crate::{
    ActivitySummary, ApiError, DestinationClient, RateLimitState, Service, UploadReceipt,
    UploadRequest, rate_limit,
};

pub const DEFAULT_PER_PAGE: u32 = 30;

#[derive(Clone, Debug)]
pub struct ReqwestStravaClient {
    base_url: String,
    access_token: SecretString,
    per_page: u32,
    client: reqwest::Client,
    rate_limit: Arc<Mutex<Option<RateLimitState>>>,
}

#[derive(Deserialize)]
struct ActivityPayload {
    #[serde(deserialize_with = "crate::deserialize_id")]
    id: String,
    start_date: String,
}

impl ReqwestStravaClient {
    /// Create a new client instance.
    ///
    /// # Arguments
    /// * `base_url` - Strava's base URL (e.g. "https://www.strava.com")
    /// * `access_token` - An OAuth access token with `activity:write` scope
    pub fn new(base_url: &str, access_token: SecretString) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("reqwest client build should not fail");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
            per_page: DEFAULT_PER_PAGE,
            client,
            rate_limit: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    fn get_request(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .bearer_auth(self.access_token.expose_secret())
    }

    fn post_request(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .bearer_auth(self.access_token.expose_secret())
    }

    /// Send a request, record the quota headers and turn failures into errors.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let resp = request.send().await?;
        if let Some(state) = rate_limit::from_headers(resp.headers(), Local::now()) {
            tracing::debug!(
                usage_short = state.usage_short,
                limit_short = state.limit_short,
                usage_long = state.usage_long,
                limit_long = state.limit_long,
                "strava rate limit"
            );
            *self.rate_limit.lock().unwrap_or_else(PoisonError::into_inner) = Some(state);
        }
        if !resp.status().is_success() {
            return Err(Self::error_from_response(resp).await);
        }
        Ok(resp)
    }

    async fn error_from_response(resp: reqwest::Response) -> ApiError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let body_snippet: String = body.chars().take(256).collect();
        ApiError::from_status(status, body_snippet)
    }
}

#[async_trait]
impl DestinationClient for ReqwestStravaClient {
    async fn list_activities(&self, page: u32) -> Result<Vec<ActivitySummary>, ApiError> {
        let url = format!("{}/api/v3/athlete/activities", self.base_url);
        let qp = [
            ("page", page.to_string()),
            ("per_page", self.per_page.to_string()),
        ];
        let resp = self.send(self.get_request(&url).query(&qp)).await?;
        let payload: Vec<ActivityPayload> = resp.json().await?;
        tracing::debug!(page, count = payload.len(), "listed strava activities");
        payload
            .into_iter()
            .map(|a| {
                let start_time = parse_start_date(&a.start_date).ok_or_else(|| {
                    ApiError::Decode(format!(
                        "activity {} has invalid start_date {}",
                        a.id, a.start_date
                    ))
                })?;
                Ok(ActivitySummary {
                    id: a.id,
                    start_time,
                    source: Service::Strava,
                })
            })
            .collect()
    }

    async fn create_upload(&self, upload: UploadRequest) -> Result<UploadReceipt, ApiError> {
        let url = format!("{}/api/v3/uploads", self.base_url);
        let file = Part::bytes(upload.file)
            .file_name(upload.filename)
            .mime_str("application/gpx+xml")?;
        let mut form = Form::new()
            .part("file", file)
            .text("data_type", upload.data_type)
            .text("activity_type", upload.activity_type);
        if let Some(description) = upload.description {
            form = form.text("description", description);
        }
        if let Some(external_id) = upload.external_id {
            form = form.text("external_id", external_id);
        }

        let resp = self.send(self.post_request(&url).multipart(form)).await?;
        let receipt: UploadReceipt = resp.json().await?;
        if let Some(error) = receipt.error.as_deref().filter(|e| !e.is_empty()) {
            return Err(ApiError::Validation(error.to_string()));
        }
        Ok(receipt)
    }

    fn rate_limit(&self) -> Option<RateLimitState> {
        self.rate_limit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
