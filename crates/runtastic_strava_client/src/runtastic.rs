//! Runtastic web-services client: login, session metadata sync and per-session detail.

use std::collections::HashSet;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::utils::from_epoch_millis;
use crate::{
    ActivityDetail, ActivitySummary, ActivityType, ApiError, Service, SourceClient, TrackPoint,
};

/// Runtastic account credentials.
#[derive(Clone, Debug)]
pub struct RuntasticCredentials {
    pub email: String,
    pub password: SecretString,
}

/// Logged-in Runtastic session.
#[derive(Clone, Debug)]
pub struct ReqwestRuntasticClient {
    base_url: String,
    user_id: String,
    access_token: SecretString,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    #[serde(deserialize_with = "crate::deserialize_id")]
    user_id: String,
    access_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncPage {
    #[serde(default)]
    sessions: Vec<SessionPayload>,
    #[serde(default)]
    more_items_available: bool,
    synced_until: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionPayload {
    #[serde(deserialize_with = "crate::deserialize_id")]
    id: String,
    start_time: i64,
    #[serde(default)]
    deleted_at: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailPayload {
    #[serde(deserialize_with = "crate::deserialize_id")]
    id: String,
    sport_type: ActivityType,
    notes: Option<String>,
    #[serde(default)]
    track_points: Vec<TrackPointPayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackPointPayload {
    time: i64,
    latitude: f64,
    longitude: f64,
    altitude: Option<f64>,
    heart_rate: Option<u16>,
}

impl ReqwestRuntasticClient {
    /// Log into Runtastic and return an authenticated session.
    pub async fn login(
        base_url: &str,
        credentials: &RuntasticCredentials,
    ) -> Result<Self, ApiError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .build()
            .expect("reqwest client build should not fail");
        let url = format!("{base_url}/webapps/services/auth/login");
        let body = LoginRequest {
            email: &credentials.email,
            password: credentials.password.expose_secret(),
        };
        let resp = client.post(&url).json(&body).send().await?;
        let resp = Self::check(resp).await?;
        let login: LoginResponse = resp.json().await?;
        tracing::debug!(user_id = %login.user_id, "runtastic login succeeded");
        Ok(Self {
            base_url,
            user_id: login.user_id,
            access_token: SecretString::new(login.access_token.into()),
            client,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn get_request(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .bearer_auth(self.access_token.expose_secret())
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let body_snippet: String = body.chars().take(256).collect();
        Err(ApiError::from_status(status, body_snippet))
    }
}

/// Sort newest first, keeping one entry per session id. A session that shows
/// up on several sync pages keeps its most recently synced record.
fn newest_first_unique(summaries: Vec<ActivitySummary>) -> Vec<ActivitySummary> {
    let mut seen = HashSet::new();
    let mut unique: Vec<ActivitySummary> = summaries
        .into_iter()
        .rev()
        .filter(|s| seen.insert(s.id.clone()))
        .collect();
    unique.sort_by(|a, b| b.start_time.cmp(&a.start_time).then_with(|| b.id.cmp(&a.id)));
    unique
}

#[async_trait]
impl SourceClient for ReqwestRuntasticClient {
    async fn list_metadata(&self) -> Result<Vec<ActivitySummary>, ApiError> {
        let url = format!("{}/webapps/services/runsessions/v3/sync", self.base_url);
        let mut synced_until = "0".to_string();
        let mut summaries = Vec::new();
        loop {
            let req = self
                .get_request(&url)
                .query(&[("syncedUntil", synced_until.as_str())]);
            let page: SyncPage = Self::check(req.send().await?).await?.json().await?;
            tracing::debug!(
                count = page.sessions.len(),
                more = page.more_items_available,
                "runtastic sync page"
            );
            for s in page.sessions.into_iter().filter(|s| s.deleted_at.is_none()) {
                let start_time = from_epoch_millis(s.start_time).ok_or_else(|| {
                    ApiError::Decode(format!("session {} has invalid startTime", s.id))
                })?;
                summaries.push(ActivitySummary {
                    id: s.id,
                    start_time,
                    source: Service::Runtastic,
                });
            }
            match page.synced_until {
                Some(next) if page.more_items_available && next != synced_until => {
                    synced_until = next;
                }
                _ => break,
            }
        }
        Ok(newest_first_unique(summaries))
    }

    async fn get_activity(&self, activity_id: &str) -> Result<ActivityDetail, ApiError> {
        let url = format!(
            "{}/webapps/services/runsessions/v2/{}/details",
            self.base_url, activity_id
        );
        let resp = Self::check(self.get_request(&url).send().await?).await?;
        let payload: DetailPayload = resp.json().await?;
        let mut track_points = payload
            .track_points
            .into_iter()
            .map(|p| {
                let time = from_epoch_millis(p.time).ok_or_else(|| {
                    ApiError::Decode(format!("session {activity_id} has an invalid track time"))
                })?;
                Ok(TrackPoint {
                    time,
                    latitude: p.latitude,
                    longitude: p.longitude,
                    elevation: p.altitude,
                    heart_rate: p.heart_rate,
                })
            })
            .collect::<Result<Vec<_>, ApiError>>()?;
        track_points.sort_by_key(|p| p.time);
        Ok(ActivityDetail {
            id: payload.id,
            activity_type: payload.sport_type,
            notes: payload.notes,
            track_points,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn summary(id: &str, hour: u32) -> ActivitySummary {
        ActivitySummary {
            id: id.into(),
            start_time: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
            source: Service::Runtastic,
        }
    }

    #[test]
    fn duplicate_ids_are_dropped_even_when_not_adjacent() {
        // "a" is resynced with a new start time; "b" and "c" share 10:00.
        let merged = newest_first_unique(vec![
            summary("a", 10),
            summary("b", 10),
            summary("c", 10),
            summary("a", 12),
        ]);
        let ids: Vec<&str> = merged.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert_eq!(merged[0].start_time, summary("a", 12).start_time);
    }

    #[test]
    fn same_id_on_two_pages_with_equal_times_is_kept_once() {
        let merged = newest_first_unique(vec![
            summary("x", 9),
            summary("y", 9),
            summary("x", 9),
        ]);
        assert_eq!(merged.len(), 2);
    }
}
