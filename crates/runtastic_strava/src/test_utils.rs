//! In-memory `SourceClient` and `DestinationClient` implementations shared by
//! the engine's unit tests.
#![cfg(test)]

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use runtastic_strava_client::{
    ActivityDetail, ActivitySummary, ActivityType, ApiError, DestinationClient, RateLimitState,
    Service, SourceClient, TrackPoint, UploadReceipt, UploadRequest,
};

/// 2024-05-01 at `hour:minute` UTC.
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
}

pub fn summary_at(id: &str, hour: u32, minute: u32) -> ActivitySummary {
    ActivitySummary {
        id: id.into(),
        start_time: at(hour, minute),
        source: Service::Runtastic,
    }
}

/// A two-point run whose first fix is at `hour:minute`.
pub fn detail_at(id: &str, hour: u32, minute: u32) -> ActivityDetail {
    let start = at(hour, minute);
    ActivityDetail {
        id: id.into(),
        activity_type: ActivityType::Running,
        notes: Some(format!("run {id}")),
        track_points: vec![
            TrackPoint {
                time: start,
                latitude: 48.2,
                longitude: 16.37,
                elevation: Some(170.0),
                heart_rate: Some(110),
            },
            TrackPoint {
                time: start + chrono::Duration::seconds(5),
                latitude: 48.2001,
                longitude: 16.3702,
                elevation: None,
                heart_rate: None,
            },
        ],
    }
}

/// Source activities whose summary and first fix share the same time.
pub fn source_at(times: &[(u32, u32)]) -> MockSource {
    MockSource::new(
        times
            .iter()
            .enumerate()
            .map(|(i, &(h, m))| {
                let id = format!("rt{i}");
                (summary_at(&id, h, m), detail_at(&id, h, m))
            })
            .collect(),
    )
}

pub struct MockSource {
    activities: Vec<(ActivitySummary, ActivityDetail)>,
    failing: HashSet<String>,
    detail_fetches: AtomicUsize,
}

impl MockSource {
    pub fn new(activities: Vec<(ActivitySummary, ActivityDetail)>) -> Self {
        Self {
            activities,
            failing: HashSet::new(),
            detail_fetches: AtomicUsize::new(0),
        }
    }

    /// Make detail fetches for `id` fail with a transport error.
    pub fn failing_on(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn detail_fetches(&self) -> usize {
        self.detail_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceClient for MockSource {
    async fn list_metadata(&self) -> Result<Vec<ActivitySummary>, ApiError> {
        Ok(self.activities.iter().map(|(s, _)| s.clone()).collect())
    }

    async fn get_activity(&self, activity_id: &str) -> Result<ActivityDetail, ApiError> {
        self.detail_fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(activity_id) {
            return Err(ApiError::Status {
                status: 500,
                body: format!("session {activity_id} unavailable"),
            });
        }
        self.activities
            .iter()
            .find(|(s, _)| s.id == activity_id)
            .map(|(_, d)| d.clone())
            .ok_or_else(|| ApiError::NotFound(activity_id.to_string()))
    }
}

pub struct MockDestination {
    pages: Vec<Vec<ActivitySummary>>,
    pages_requested: Mutex<Vec<u32>>,
    uploads: Mutex<Vec<UploadRequest>>,
    scripted: Mutex<VecDeque<Result<UploadReceipt, ApiError>>>,
    rate_limit: Mutex<Option<RateLimitState>>,
}

impl MockDestination {
    /// Pages of destination activity times, newest first.
    pub fn with_pages(pages: Vec<Vec<DateTime<Utc>>>) -> Self {
        let mut n = 0;
        let pages = pages
            .into_iter()
            .map(|page| {
                page.into_iter()
                    .map(|start_time| {
                        n += 1;
                        ActivitySummary {
                            id: format!("st{n}"),
                            start_time,
                            source: Service::Strava,
                        }
                    })
                    .collect()
            })
            .collect();
        Self {
            pages,
            pages_requested: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            scripted: Mutex::new(VecDeque::new()),
            rate_limit: Mutex::new(None),
        }
    }

    /// Queue the outcome of the next upload; unscripted uploads succeed.
    pub fn script_upload(&self, outcome: Result<UploadReceipt, ApiError>) {
        self.scripted.lock().unwrap().push_back(outcome);
    }

    pub fn set_rate_limit(&self, state: Option<RateLimitState>) {
        *self.rate_limit.lock().unwrap() = state;
    }

    pub fn pages_requested(&self) -> Vec<u32> {
        self.pages_requested.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<UploadRequest> {
        self.uploads.lock().unwrap().clone()
    }
}

pub fn receipt(id: &str) -> UploadReceipt {
    UploadReceipt {
        id: id.into(),
        status: Some("Your activity is still being processed.".into()),
        error: None,
        activity_id: None,
    }
}

#[async_trait]
impl DestinationClient for MockDestination {
    async fn list_activities(&self, page: u32) -> Result<Vec<ActivitySummary>, ApiError> {
        self.pages_requested.lock().unwrap().push(page);
        Ok(self
            .pages
            .get(page as usize - 1)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_upload(&self, upload: UploadRequest) -> Result<UploadReceipt, ApiError> {
        let n = {
            let mut uploads = self.uploads.lock().unwrap();
            uploads.push(upload);
            uploads.len()
        };
        self.scripted
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(receipt(&format!("up{n}"))))
    }

    fn rate_limit(&self) -> Option<RateLimitState> {
        self.rate_limit.lock().unwrap().clone()
    }
}
