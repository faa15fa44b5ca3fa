//! Drives one run: read both timelines, reconcile, then upload in order.

use runtastic_strava_client::{ActivitySummary, DestinationClient, SourceClient};

use crate::error::SyncError;
use crate::fetcher::{DestinationPages, SourceTimeline};
use crate::governor;
use crate::reconcile::{self, Policy};
use crate::transfer::{self, TransferResult};

/// What to do when Strava rejects an individual upload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the rejection and carry on with the next activity.
    #[default]
    Skip,
    /// Stop the run.
    Abort,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOptions {
    pub policy: Policy,
    pub failure_policy: FailurePolicy,
    pub max_rate_limit_retries: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            policy: Policy::Bounded,
            failure_policy: FailurePolicy::Skip,
            max_rate_limit_retries: 3,
        }
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed {
        uploaded: usize,
        skipped: Vec<TransferResult>,
    },
    Aborted {
        uploaded: usize,
        error: SyncError,
    },
}

impl RunOutcome {
    pub fn uploaded(&self) -> usize {
        match self {
            RunOutcome::Completed { uploaded, .. } | RunOutcome::Aborted { uploaded, .. } => {
                *uploaded
            }
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, RunOutcome::Aborted { .. })
    }
}

pub struct Orchestrator<'a> {
    source: &'a dyn SourceClient,
    destination: &'a dyn DestinationClient,
    options: SyncOptions,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        source: &'a dyn SourceClient,
        destination: &'a dyn DestinationClient,
        options: SyncOptions,
    ) -> Self {
        Self {
            source,
            destination,
            options,
        }
    }

    pub async fn run(&self) -> RunOutcome {
        let (mut timeline, selected) = match self.prepare().await {
            Ok(prepared) => prepared,
            Err(error) => return RunOutcome::Aborted { uploaded: 0, error },
        };

        let mut uploaded = 0;
        let mut skipped = Vec::new();
        for summary in &selected {
            governor::wait_for_capacity(self.destination.rate_limit().as_ref()).await;
            let TransferResult {
                activity_id,
                outcome,
            } = transfer::transfer(
                &mut timeline,
                self.destination,
                summary,
                self.options.max_rate_limit_retries,
            )
            .await;
            let started = summary.start_time.format("%Y-%m-%d %H:%M");
            match outcome {
                Ok(receipt) => {
                    uploaded += 1;
                    tracing::info!(%activity_id, upload_id = %receipt.id, "uploaded activity");
                    println!(
                        "Uploaded activity from {started} (upload {}: {})",
                        receipt.id,
                        receipt.status.as_deref().unwrap_or("submitted")
                    );
                }
                Err(SyncError::Validation(msg))
                    if self.options.failure_policy == FailurePolicy::Skip =>
                {
                    tracing::warn!(%activity_id, %msg, "strava rejected upload, skipping");
                    println!("Skipped activity from {started}: {msg}");
                    skipped.push(TransferResult {
                        activity_id,
                        outcome: Err(SyncError::Validation(msg)),
                    });
                }
                Err(error) => {
                    tracing::error!(%activity_id, %error, "transfer failed");
                    return RunOutcome::Aborted { uploaded, error };
                }
            }
        }
        RunOutcome::Completed { uploaded, skipped }
    }

    /// Fetch both timelines and pick the work list.
    async fn prepare(
        &self,
    ) -> Result<(SourceTimeline<'a>, Vec<ActivitySummary>), SyncError> {
        let mut pages = DestinationPages::open(self.destination).await?;
        match pages.newest() {
            Some(last) => println!("Last strava activity was on {}", last.start_time),
            None => println!("No activities on strava yet"),
        }

        let mut timeline = SourceTimeline::fetch(self.source).await?;
        let selected = reconcile::select(self.options.policy, &mut timeline, &mut pages).await?;
        tracing::info!(
            policy = ?self.options.policy,
            source = timeline.len(),
            selected = selected.len(),
            "reconciled timelines"
        );
        println!("{} activities to upload", selected.len());
        Ok((timeline, selected))
    }
}
