//! Background outfit-generation jobs.
//!
//! A job outlives the chat turn that requested it. The orchestrator commits
//! the claim (`active_generation` set, state `GeneratingOutfit`) before the
//! coordinator ever sees the job; the coordinator re-checks that claim,
//! runs the text→image pipeline with retries, and reports the terminal
//! outcome as a completion signal fed back into the event stream. Every
//! started job reaches a terminal outcome — the signal channel is unbounded
//! and failures are signals too.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::adapters::{ImageAdapter, TextAdapter};
use crate::config::RetryConfig;
use crate::error::JobError;
use crate::fsm::JobOutcome;
use crate::profile::{JobResult, JobStatus, UserProfile};
use crate::prompts;
use crate::retry;
use crate::store::ProfileStore;

/// Terminal outcome of one job, delivered back into the engine's stream.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    pub user_id: String,
    pub job_id: Uuid,
    pub outcome: JobOutcome,
}

pub struct GenerationCoordinator {
    store: Arc<dyn ProfileStore>,
    text: Arc<dyn TextAdapter>,
    image: Arc<dyn ImageAdapter>,
    retry: RetryConfig,
    staleness: Duration,
    completion_tx: mpsc::UnboundedSender<CompletionSignal>,
}

impl GenerationCoordinator {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        text: Arc<dyn TextAdapter>,
        image: Arc<dyn ImageAdapter>,
        retry: RetryConfig,
        staleness: Duration,
        completion_tx: mpsc::UnboundedSender<CompletionSignal>,
    ) -> Self {
        Self {
            store,
            text,
            image,
            retry,
            staleness,
            completion_tx,
        }
    }

    /// Launch the job as an independent task. Call only after the claim has
    /// been committed.
    pub fn spawn(self: &Arc<Self>, user_id: &str, job_id: Uuid) {
        let this = Arc::clone(self);
        let user_id = user_id.to_string();
        tokio::spawn(async move {
            this.run_job(user_id, job_id).await;
        });
    }

    async fn run_job(&self, user_id: String, job_id: Uuid) {
        let outcome = match self.execute(&user_id, job_id).await {
            Ok(result) => JobOutcome::Succeeded(result),
            Err(JobError::ClaimLost { .. }) => {
                // Another actor (restart, recovery sweep) took the claim;
                // whoever did also owns the terminal outcome.
                tracing::debug!(user_id, %job_id, "Generation claim lost, dropping job");
                return;
            }
            Err(JobError::Failed { reason, .. }) => {
                tracing::warn!(user_id, %job_id, reason, "Generation job failed");
                JobOutcome::Failed { error: reason }
            }
        };

        let signal = CompletionSignal {
            user_id,
            job_id,
            outcome,
        };
        if self.completion_tx.send(signal).is_err() {
            tracing::error!(%job_id, "Completion channel closed, signal lost");
        }
    }

    async fn execute(&self, user_id: &str, job_id: Uuid) -> Result<JobResult, JobError> {
        let profile = self.mark_running(user_id, job_id).await?;
        let request_notes = profile
            .active_generation
            .as_ref()
            .map(|j| j.request_notes.clone())
            .unwrap_or_default();

        // Recommendation first, then the visualization grounded in it.
        let plan_request = prompts::outfit_plan_request(&profile, &request_notes);
        let plan_raw = retry::with_backoff(&self.retry, "outfit_plan", || {
            self.text.complete(plan_request.clone())
        })
        .await
        .map_err(|e| JobError::Failed {
            id: job_id,
            reason: format!("outfit plan: {e}"),
        })?;
        let plan = prompts::parse_outfit_plan(&plan_raw).map_err(|e| JobError::Failed {
            id: job_id,
            reason: format!("unparseable outfit plan: {e}"),
        })?;

        let items = prompts::resolve_planned_items(&profile, &plan);
        let prompt = prompts::image_prompt(&plan, &items, &request_notes);
        let mut references = Vec::with_capacity(items.len() + 1);
        if let Some(selfie) = &profile.selfie {
            references.push(selfie.clone());
        }
        references.extend(items.iter().map(|g| g.image.clone()));

        let image = retry::with_backoff(&self.retry, "outfit_image", || {
            self.image.generate(&prompt, &references)
        })
        .await
        .map_err(|e| JobError::Failed {
            id: job_id,
            reason: format!("image generation: {e}"),
        })?;

        let summary = if plan.summary_text.trim().is_empty() {
            "Here's the look I put together for you.".to_string()
        } else {
            plan.summary_text.clone()
        };
        Ok(JobResult {
            summary,
            image: Some(image),
            prompt,
        })
    }

    /// Re-check the claim and flip the job to `running`. The CAS commit
    /// closes the race window between the orchestrator's check and this
    /// task starting.
    async fn mark_running(&self, user_id: &str, job_id: Uuid) -> Result<UserProfile, JobError> {
        for _ in 0..3 {
            let Some((mut profile, version)) = self
                .store
                .load(user_id)
                .await
                .map_err(|e| JobError::Failed {
                    id: job_id,
                    reason: format!("loading profile: {e}"),
                })?
            else {
                return Err(JobError::ClaimLost {
                    id: job_id,
                    user_id: user_id.to_string(),
                });
            };

            match profile.active_generation.as_mut() {
                Some(job) if job.job_id == job_id => job.status = JobStatus::Running,
                _ => {
                    return Err(JobError::ClaimLost {
                        id: job_id,
                        user_id: user_id.to_string(),
                    });
                }
            }

            match self.store.commit(&profile, version).await {
                Ok(_) => return Ok(profile),
                Err(e) if e.is_conflict() => continue,
                Err(e) => {
                    return Err(JobError::Failed {
                        id: job_id,
                        reason: format!("marking running: {e}"),
                    });
                }
            }
        }
        Err(JobError::Failed {
            id: job_id,
            reason: "could not mark job running (persistent conflicts)".to_string(),
        })
    }

    /// Startup sweep: any non-terminal job older than the staleness
    /// threshold gets a synthetic failure completion, which clears
    /// `active_generation` through the ordinary delivery path. Returns the
    /// number of jobs failed.
    pub async fn recover_stale(&self) -> usize {
        let user_ids = match self.store.user_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %e, "Recovery sweep could not list users");
                return 0;
            }
        };

        let cutoff = chrono::Utc::now()
            - chrono::Duration::from_std(self.staleness).unwrap_or(chrono::Duration::zero());
        let mut recovered = 0;
        for user_id in user_ids {
            let loaded = match self.store.load(&user_id).await {
                Ok(loaded) => loaded,
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "Recovery sweep skipped user");
                    continue;
                }
            };
            let Some((profile, _)) = loaded else { continue };
            let Some(job) = &profile.active_generation else {
                continue;
            };
            if job.status.is_terminal() || job.requested_at > cutoff {
                continue;
            }
            tracing::warn!(
                user_id,
                job_id = %job.job_id,
                requested_at = %job.requested_at,
                "Failing stale generation job"
            );
            let signal = CompletionSignal {
                user_id: user_id.clone(),
                job_id: job.job_id,
                outcome: JobOutcome::Failed {
                    error: "job interrupted by restart".to_string(),
                },
            };
            if self.completion_tx.send(signal).is_ok() {
                recovered += 1;
            }
        }
        recovered
    }
}
