//! Copy one activity: fetch its detail, export GPX, upload it.

use runtastic_strava_client::gpx;
use runtastic_strava_client::{
    ActivityDetail, ActivitySummary, ActivityType, ApiError, DestinationClient, UploadReceipt,
    UploadRequest,
};

use crate::error::{SyncError, SyncResult};
use crate::fetcher::SourceTimeline;
use crate::governor;

/// Outcome of one attempted transfer.
#[derive(Debug)]
pub struct TransferResult {
    pub activity_id: String,
    pub outcome: SyncResult<UploadReceipt>,
}

/// Strava `activity_type` for a Runtastic sport.
pub fn destination_activity_type(activity_type: ActivityType) -> &'static str {
    match activity_type {
        ActivityType::Running => "run",
        ActivityType::Biking => "ride",
        ActivityType::Swimming => "swim",
        ActivityType::Walking => "walk",
        ActivityType::Other => "workout",
    }
}

/// Build the upload for `detail`.
pub fn build_upload(detail: &ActivityDetail) -> SyncResult<UploadRequest> {
    let file = gpx::encode(detail).map_err(|source| SyncError::Encode {
        id: detail.id.clone(),
        source,
    })?;
    Ok(UploadRequest {
        data_type: "gpx".into(),
        filename: format!("runtastic_activity_{}.gpx", detail.id),
        file,
        activity_type: destination_activity_type(detail.activity_type).into(),
        description: detail.notes.clone().filter(|n| !n.is_empty()),
        external_id: Some(format!("runtastic-{}", detail.id)),
    })
}

/// Submit `upload`, waiting out and retrying rate-limit rejections at most
/// `max_rate_limit_retries` times.
async fn submit(
    destination: &dyn DestinationClient,
    upload: UploadRequest,
    max_rate_limit_retries: u32,
) -> SyncResult<UploadReceipt> {
    let mut rejections = 0;
    loop {
        match destination.create_upload(upload.clone()).await {
            Err(ApiError::RateLimited(msg)) if rejections < max_rate_limit_retries => {
                rejections += 1;
                tracing::warn!(attempt = rejections, %msg, "upload rate limited");
                governor::wait_after_rejection(destination.rate_limit().as_ref()).await;
            }
            other => return other.map_err(SyncError::from),
        }
    }
}

/// Transfer the activity behind `summary`.
pub async fn transfer(
    source: &mut SourceTimeline<'_>,
    destination: &dyn DestinationClient,
    summary: &ActivitySummary,
    max_rate_limit_retries: u32,
) -> TransferResult {
    let outcome: SyncResult<UploadReceipt> = async {
        let detail = source.take_detail(&summary.id).await?;
        let upload = build_upload(&detail)?;
        tracing::debug!(
            activity_id = %summary.id,
            activity_type = %upload.activity_type,
            bytes = upload.file.len(),
            "uploading activity"
        );
        submit(destination, upload, max_rate_limit_retries).await
    }
    .await;
    TransferResult {
        activity_id: summary.id.clone(),
        outcome,
    }
}
