//! Upload gate that waits out Strava's usage windows.
//!
//! Strava counts requests in fifteen-minute windows aligned to the quarter
//! hour and in a daily window. Before each upload the latest snapshot is
//! checked; when a window is used up the caller sleeps until it resets.

use chrono::{DateTime, Days, Local, TimeDelta, TimeZone};
use runtastic_strava_client::RateLimitState;

pub const SHORT_WINDOW_SECS: i64 = 15 * 60;

/// Start of the short window following the one containing `reference`.
pub fn next_short_window(reference: DateTime<Local>) -> DateTime<Local> {
    let secs = reference.timestamp();
    let next = secs - secs.rem_euclid(SHORT_WINDOW_SECS) + SHORT_WINDOW_SECS;
    Local
        .timestamp_opt(next, 0)
        .single()
        .unwrap_or_else(|| reference + TimeDelta::seconds(SHORT_WINDOW_SECS))
}

/// Local midnight at the start of the day after `reference`.
pub fn next_local_midnight(reference: DateTime<Local>) -> DateTime<Local> {
    reference
        .date_naive()
        .checked_add_days(Days::new(1))
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .unwrap_or_else(|| reference + TimeDelta::days(1))
}

/// When uploads may resume, or `None` if neither window is exhausted.
pub fn resume_at(state: &RateLimitState) -> Option<DateTime<Local>> {
    let short = state
        .short_exhausted()
        .then(|| next_short_window(state.window_reference_time));
    let long = state
        .long_exhausted()
        .then(|| next_local_midnight(state.window_reference_time));
    short.max(long)
}

async fn sleep_until(resume: DateTime<Local>) {
    let remaining = resume - Local::now();
    if let Ok(wait) = remaining.to_std() {
        tracing::warn!(%resume, wait_secs = wait.as_secs(), "strava rate limit reached, waiting");
        println!("Rate limit reached, waiting until {}", resume.format("%Y-%m-%d %H:%M:%S"));
        tokio::time::sleep(wait).await;
    }
}

/// Block until the destination has capacity for another request.
///
/// Returns the instant waited for, if any.
pub async fn wait_for_capacity(state: Option<&RateLimitState>) -> Option<DateTime<Local>> {
    let resume = state.and_then(resume_at)?;
    sleep_until(resume).await;
    Some(resume)
}

/// Wait after the destination refused a request for exceeding its quota.
///
/// The snapshot may lag behind the server's own count, so when it does not
/// show exhaustion the wait still runs to the next short window.
pub async fn wait_after_rejection(state: Option<&RateLimitState>) -> DateTime<Local> {
    let resume = state.and_then(resume_at).unwrap_or_else(|| {
        let reference = state.map_or_else(Local::now, |s| s.window_reference_time);
        next_short_window(reference)
    });
    sleep_until(resume).await;
    resume
}
