//! Cursors over the two activity timelines.
//!
//! [`SourceTimeline`] holds the full Runtastic listing and resolves each
//! activity's comparison time from its first track point. Fetched details stay
//! cached only while the activity may still be uploaded, so the upload step
//! reuses them. [`DestinationPages`] hands out Strava
//! pages in order, fetching lazily after the first.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use runtastic_strava_client::{ActivityDetail, ActivitySummary, DestinationClient, SourceClient};

use crate::error::SyncResult;

pub struct SourceTimeline<'a> {
    client: &'a dyn SourceClient,
    summaries: Vec<ActivitySummary>,
    details: HashMap<String, ActivityDetail>,
}

impl<'a> SourceTimeline<'a> {
    /// Fetch the complete source listing, newest first.
    pub async fn fetch(client: &'a dyn SourceClient) -> SyncResult<Self> {
        let mut summaries = client.list_metadata().await?;
        summaries.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        tracing::info!(count = summaries.len(), "fetched runtastic activity list");
        Ok(Self {
            client,
            summaries,
            details: HashMap::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    pub fn summaries(&self) -> &[ActivitySummary] {
        &self.summaries
    }

    async fn load(&mut self, id: &str) -> SyncResult<&ActivityDetail> {
        if !self.details.contains_key(id) {
            tracing::debug!(activity_id = id, "fetching runtastic activity detail");
            let detail = self.client.get_activity(id).await?;
            self.details.insert(id.to_string(), detail);
        }
        Ok(&self.details[id])
    }

    /// Comparison time of the activity at `index`: the first track point, or
    /// the nominal start time for activities recorded without GPS.
    pub async fn time_at(&mut self, index: usize) -> SyncResult<DateTime<Utc>> {
        let summary = self.summaries[index].clone();
        let detail = self.load(&summary.id).await?;
        Ok(detail.first_point_time().unwrap_or(summary.start_time))
    }

    /// Drop the cached detail of the activity at `index` once it is known not
    /// to need uploading.
    pub fn release(&mut self, index: usize) {
        if let Some(summary) = self.summaries.get(index) {
            self.details.remove(&summary.id);
        }
    }

    /// Number of details currently held.
    pub fn cached_details(&self) -> usize {
        self.details.len()
    }

    /// Detail for `id`, taken out of the cache when the reconciler already
    /// fetched it.
    pub async fn take_detail(&mut self, id: &str) -> SyncResult<ActivityDetail> {
        match self.details.remove(id) {
            Some(detail) => Ok(detail),
            None => Ok(self.client.get_activity(id).await?),
        }
    }
}

pub struct DestinationPages<'a> {
    client: &'a dyn DestinationClient,
    newest: Option<ActivitySummary>,
    first_page: Option<Vec<ActivitySummary>>,
    next_page: u32,
    exhausted: bool,
}

impl<'a> DestinationPages<'a> {
    /// Fetch page 1, which both reconciliation policies need.
    pub async fn open(client: &'a dyn DestinationClient) -> SyncResult<Self> {
        let first = client.list_activities(1).await?;
        Ok(Self {
            client,
            newest: first.first().cloned(),
            exhausted: first.is_empty(),
            first_page: Some(first),
            next_page: 2,
        })
    }

    /// Most recent destination activity.
    pub fn newest(&self) -> Option<&ActivitySummary> {
        self.newest.as_ref()
    }

    /// Next non-empty page, or `None` once the listing ends. Page 1 comes from
    /// the fetch made by [`open`](Self::open).
    pub async fn next_page(&mut self) -> SyncResult<Option<Vec<ActivitySummary>>> {
        if let Some(first) = self.first_page.take() {
            if !first.is_empty() {
                return Ok(Some(first));
            }
        }
        if self.exhausted {
            return Ok(None);
        }
        let page = self.client.list_activities(self.next_page).await?;
        tracing::debug!(page = self.next_page, count = page.len(), "fetched strava page");
        self.next_page += 1;
        if page.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }
        Ok(Some(page))
    }
}
