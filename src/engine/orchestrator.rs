//! Turn processing — runs one inbound event through the state machine and
//! executes the resulting effects.
//!
//! Everything mutates a working copy of the profile; the turn lands as a
//! single versioned commit. On a version conflict the whole turn is retried
//! from a fresh load, so concurrent turns for the same user serialize
//! instead of interleaving.

use std::sync::Arc;

use uuid::Uuid;

use crate::adapters::{SpeechAdapter, TextAdapter};
use crate::channels::OutboundMessage;
use crate::config::RetryConfig;
use crate::engine::jobs::{CompletionSignal, GenerationCoordinator};
use crate::error::Result;
use crate::fsm::{
    self, Command, Effect, EventKind, GuardView, InboundEvent, JobOutcome, replies,
};
use crate::profile::{FeedbackEntry, GarmentRecord, GenerationJob, JobStatus, UserProfile};
use crate::prompts;
use crate::retry;
use crate::store::ProfileStore;

pub struct Orchestrator {
    store: Arc<dyn ProfileStore>,
    text: Arc<dyn TextAdapter>,
    speech: Arc<dyn SpeechAdapter>,
    coordinator: Arc<GenerationCoordinator>,
    retry: RetryConfig,
    storage_retries: u32,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        text: Arc<dyn TextAdapter>,
        speech: Arc<dyn SpeechAdapter>,
        coordinator: Arc<GenerationCoordinator>,
        retry: RetryConfig,
        storage_retries: u32,
    ) -> Self {
        Self {
            store,
            text,
            speech,
            coordinator,
            retry,
            storage_retries,
        }
    }

    /// Process one inbound event to completion. Idempotent under
    /// at-least-once delivery: a replayed event id is a no-op.
    pub async fn handle_event(
        &self,
        user_id: &str,
        event: InboundEvent,
    ) -> Result<Vec<OutboundMessage>> {
        // Voice notes become text before the state machine sees them.
        let kind = match event.kind {
            EventKind::Voice { audio } => {
                let transcript = retry::with_backoff(&self.retry, "transcribe", || {
                    self.speech.transcribe(&audio)
                })
                .await;
                match transcript {
                    Ok(text) if !text.trim().is_empty() => match Command::parse(&text) {
                        Some(command) => EventKind::Command(command),
                        None => EventKind::Text { text },
                    },
                    Ok(_) => {
                        return Ok(vec![OutboundMessage::text(replies::voice_not_understood())]);
                    }
                    Err(failure) => {
                        tracing::warn!(user_id, error = %failure, "Voice transcription failed");
                        return Ok(vec![OutboundMessage::text(replies::voice_not_understood())]);
                    }
                }
            }
            kind => kind,
        };

        // Carried across conflict retries so re-running a `CaptureStyle`
        // effect does not call the model a second time.
        let mut extraction_cache: Option<String> = None;

        for attempt in 0..=self.storage_retries {
            let (mut profile, version) = self.load_or_create(user_id).await?;

            if let Some(repaired) = profile.repair() {
                tracing::warn!(user_id, repaired, "Repaired corrupt profile on load");
            }

            if profile.last_event_id.as_deref() == Some(event.event_id.as_str()) {
                tracing::debug!(user_id, event_id = %event.event_id, "Duplicate event, skipping");
                return Ok(vec![]);
            }

            let view = GuardView::of(&profile);
            let outcome = fsm::transition(profile.state, &kind, &view);
            tracing::debug!(
                user_id,
                from = %profile.state,
                to = %outcome.next,
                effects = outcome.effects.len(),
                "Transition"
            );

            let mut outbound = Vec::new();
            let mut claimed_job: Option<Uuid> = None;
            for effect in &outcome.effects {
                if let Err(failure) = self
                    .apply_effect(
                        &mut profile,
                        effect,
                        &mut outbound,
                        &mut claimed_job,
                        &mut extraction_cache,
                    )
                    .await
                {
                    // Adapter trouble: nothing was committed, the user can
                    // resend the same input.
                    tracing::warn!(user_id, error = %failure, "Effect execution failed");
                    return Ok(vec![OutboundMessage::text(replies::transient_trouble())]);
                }
            }

            profile.state = outcome.next;
            profile.last_event_id = Some(event.event_id.clone());

            match self.store.commit(&profile, version).await {
                Ok(_) => {
                    // Only a committed claim reaches the coordinator.
                    if let Some(job_id) = claimed_job {
                        self.coordinator.spawn(user_id, job_id);
                    }
                    return Ok(outbound);
                }
                Err(e) if e.is_conflict() => {
                    tracing::debug!(user_id, attempt, "Commit conflict, retrying turn");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(user_id, "Turn abandoned after repeated commit conflicts");
        Ok(vec![OutboundMessage::text(replies::transient_trouble())])
    }

    /// Entry point for job completion signals; routed through the same
    /// pipeline as chat events, so ordering and dedup apply uniformly.
    pub async fn handle_job_result(
        &self,
        signal: CompletionSignal,
    ) -> Result<Vec<OutboundMessage>> {
        let event = InboundEvent::new(
            format!("job:{}", signal.job_id),
            EventKind::JobCompleted {
                job_id: signal.job_id,
                outcome: signal.outcome,
            },
        );
        self.handle_event(&signal.user_id, event).await
    }

    async fn load_or_create(&self, user_id: &str) -> Result<(UserProfile, u64)> {
        Ok(match self.store.load(user_id).await? {
            Some((profile, version)) => (profile, version),
            None => (UserProfile::new(user_id), 0),
        })
    }

    async fn apply_effect(
        &self,
        profile: &mut UserProfile,
        effect: &Effect,
        outbound: &mut Vec<OutboundMessage>,
        claimed_job: &mut Option<Uuid>,
        extraction_cache: &mut Option<String>,
    ) -> std::result::Result<(), crate::error::AdapterFailure> {
        match effect {
            Effect::Reply(text) => outbound.push(OutboundMessage::text(text.clone())),

            Effect::StoreSelfie { image } => {
                profile.selfie = Some(image.clone());
            }

            Effect::StagePendingItem { image } => {
                profile.pending_item = Some(GarmentRecord::new(image.clone()));
            }

            Effect::CommitPendingItem { category } => {
                if let Some(mut garment) = profile.pending_item.take() {
                    garment.category = Some(*category);
                    profile.wardrobe_items.push(garment);
                }
            }

            Effect::CaptureStyle { text } => {
                if !profile.style_notes.is_empty() {
                    profile.style_notes.push('\n');
                }
                profile.style_notes.push_str(text);

                let response = match extraction_cache {
                    Some(cached) => cached.clone(),
                    None => {
                        let request = prompts::preference_extraction_request(text);
                        let response =
                            retry::with_backoff(&self.retry, "extract_preferences", || {
                                self.text.complete(request.clone())
                            })
                            .await?;
                        *extraction_cache = Some(response.clone());
                        response
                    }
                };
                match prompts::parse_preferences(&response) {
                    Ok(preferences) => profile.preferences = preferences,
                    Err(e) => {
                        // The raw notes are captured either way; a model that
                        // ignored the JSON instruction shouldn't wedge intake.
                        tracing::warn!(error = %e, "Unparseable preference extraction output");
                    }
                }
            }

            Effect::RecordFeedback { sentiment, note } => {
                profile.feedback.push(FeedbackEntry {
                    sentiment: *sentiment,
                    note: note.clone(),
                    at: chrono::Utc::now(),
                });
            }

            Effect::StartGeneration { request_notes } => {
                let job = GenerationJob::new(&profile.user_id, request_notes.clone());
                *claimed_job = Some(job.job_id);
                profile.active_generation = Some(job);
            }

            Effect::DeliverGenerationOutcome { job_id, outcome } => {
                let matches = profile
                    .active_generation
                    .as_ref()
                    .is_some_and(|j| j.job_id == *job_id);
                if !matches {
                    tracing::debug!(%job_id, "Completion for a job that is no longer active");
                    return Ok(());
                }
                let mut job = profile.active_generation.take().unwrap_or_else(|| {
                    GenerationJob::new(&profile.user_id, "")
                });
                match outcome {
                    JobOutcome::Succeeded(result) => {
                        job.status = JobStatus::Succeeded;
                        job.result = Some(result.clone());
                        outbound.push(OutboundMessage::text(result.summary.clone()));
                        if let Some(image) = &result.image {
                            outbound.push(OutboundMessage::Photo {
                                image: image.clone(),
                                caption: Some(replies::image_caption()),
                            });
                        }
                    }
                    JobOutcome::Failed { error } => {
                        job.status = JobStatus::Failed;
                        job.error = Some(error.clone());
                        outbound.push(OutboundMessage::text(replies::generation_failed()));
                    }
                }
                profile.last_generation = Some(job);
            }

            Effect::ResetProfile => {
                profile.reset_intake();
            }
        }
        Ok(())
    }
}
