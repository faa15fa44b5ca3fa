//! Decide which Runtastic activities are missing on Strava.
//!
//! Both timelines are newest first and activities are matched by time only:
//! a source activity is "present" when some destination activity starts at
//! exactly the same instant.

use std::cmp::Ordering;

use runtastic_strava_client::ActivitySummary;

use crate::error::SyncResult;
use crate::fetcher::{DestinationPages, SourceTimeline};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Policy {
    /// Upload everything newer than the latest Strava activity.
    #[default]
    Bounded,
    /// Walk the whole Strava history and upload every unmatched activity.
    Exhaustive,
}

/// Select the activities to upload, oldest first.
pub async fn select(
    policy: Policy,
    source: &mut SourceTimeline<'_>,
    destination: &mut DestinationPages<'_>,
) -> SyncResult<Vec<ActivitySummary>> {
    match policy {
        Policy::Bounded => select_bounded(source, destination).await,
        Policy::Exhaustive => select_exhaustive(source, destination).await,
    }
}

/// Take the run of source activities strictly newer than the newest
/// destination activity. Assumes the two accounts agree before that point.
pub async fn select_bounded(
    source: &mut SourceTimeline<'_>,
    destination: &DestinationPages<'_>,
) -> SyncResult<Vec<ActivitySummary>> {
    let Some(newest) = destination.newest().map(|a| a.start_time) else {
        return Ok(source.summaries().iter().rev().cloned().collect());
    };

    let mut cursor = 0;
    while cursor < source.len() {
        if source.time_at(cursor).await? <= newest {
            source.release(cursor);
            break;
        }
        cursor += 1;
    }
    Ok(source.summaries()[..cursor].iter().rev().cloned().collect())
}

/// Merge-walk the full source list against every destination page.
///
/// The source cursor only moves forward; each destination activity either lets
/// newer source activities through, absorbs one with an identical time, or is
/// passed over. Pages stop being fetched once the source cursor is exhausted,
/// and whatever remains when the destination runs out is selected.
pub async fn select_exhaustive(
    source: &mut SourceTimeline<'_>,
    destination: &mut DestinationPages<'_>,
) -> SyncResult<Vec<ActivitySummary>> {
    let mut selected = Vec::new();
    let mut cursor = 0;

    while cursor < source.len() {
        let Some(page) = destination.next_page().await? else {
            selected.extend_from_slice(&source.summaries()[cursor..]);
            break;
        };
        for existing in &page {
            while cursor < source.len() {
                match source.time_at(cursor).await?.cmp(&existing.start_time) {
                    Ordering::Greater => {
                        selected.push(source.summaries()[cursor].clone());
                        cursor += 1;
                    }
                    Ordering::Equal => {
                        tracing::debug!(
                            activity_id = %source.summaries()[cursor].id,
                            strava_id = %existing.id,
                            "already on strava"
                        );
                        source.release(cursor);
                        cursor += 1;
                        break;
                    }
                    Ordering::Less => break,
                }
            }
            if cursor == source.len() {
                break;
            }
        }
    }

    selected.reverse();
    Ok(selected)
}
