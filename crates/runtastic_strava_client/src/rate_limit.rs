//! Strava's two-window request quota as reported in response headers.

use chrono::{DateTime, Local};
use reqwest::header::HeaderMap;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const USAGE_HEADER: &str = "x-ratelimit-usage";

/// Snapshot of the destination's usage counters. The short window is fifteen
/// minutes long, the long window one day.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitState {
    pub usage_short: u32,
    pub limit_short: u32,
    pub usage_long: u32,
    pub limit_long: u32,
    /// When the counters were observed.
    pub window_reference_time: DateTime<Local>,
}

impl RateLimitState {
    pub fn short_exhausted(&self) -> bool {
        self.usage_short >= self.limit_short
    }

    pub fn long_exhausted(&self) -> bool {
        self.usage_long >= self.limit_long
    }
}

/// Parse a `"short,long"` header pair.
fn parse_pair(value: &str) -> Option<(u32, u32)> {
    let (short, long) = value.split_once(',')?;
    Some((short.trim().parse().ok()?, long.trim().parse().ok()?))
}

/// Read the quota headers from a response. Returns `None` when either header is
/// absent or malformed.
pub fn from_headers(headers: &HeaderMap, observed_at: DateTime<Local>) -> Option<RateLimitState> {
    let limit = headers.get(LIMIT_HEADER)?.to_str().ok()?;
    let usage = headers.get(USAGE_HEADER)?.to_str().ok()?;
    let (limit_short, limit_long) = parse_pair(limit)?;
    let (usage_short, usage_long) = parse_pair(usage)?;
    Some(RateLimitState {
        usage_short,
        limit_short,
        usage_long,
        limit_long,
        window_reference_time: observed_at,
    })
}
