//! The declarative transition table at the heart of the engine.
//!
//! `transition` is a pure function from (state, event, guards) to a next
//! state plus an ordered list of effects. It performs no I/O and never
//! errors: every (state, event) pair resolves to a defined row or an
//! explicit fallback, so the orchestrator never has to second-guess it.

use uuid::Uuid;

use crate::fsm::event::{self, Command, EventKind, JobOutcome};
use crate::fsm::replies;
use crate::fsm::state::ConversationState;
use crate::profile::{Category, FeedbackSentiment, MediaHandle, UserProfile};

/// Abstract instruction for the orchestrator to execute.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Send a text message back to the user.
    Reply(String),
    /// Persist the selfie reference.
    StoreSelfie { image: MediaHandle },
    /// Hold a garment photo until a category is chosen.
    StagePendingItem { image: MediaHandle },
    /// Move the pending item into the wardrobe with its category.
    CommitPendingItem { category: Category },
    /// Append style text and run preference extraction on it.
    CaptureStyle { text: String },
    /// Record a 👍/👎 reaction on the last delivered outfit.
    RecordFeedback {
        sentiment: FeedbackSentiment,
        note: String,
    },
    /// Claim `active_generation` and hand the job to the coordinator.
    StartGeneration { request_notes: String },
    /// Terminalize the job and produce the result (or failure) messages.
    DeliverGenerationOutcome { job_id: Uuid, outcome: JobOutcome },
    /// Clear selfie, wardrobe, notes, and generation state.
    ResetProfile,
}

/// Value snapshot of the guards the table consults.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardView {
    pub has_wardrobe: bool,
    pub has_pending_item: bool,
    pub has_active_generation: bool,
    /// Id of the job currently claimed in `active_generation`, if any.
    pub active_job_id: Option<Uuid>,
}

impl GuardView {
    pub fn of(profile: &UserProfile) -> Self {
        Self {
            has_wardrobe: profile.has_wardrobe(),
            has_pending_item: profile.pending_item.is_some(),
            has_active_generation: profile.active_generation.is_some(),
            active_job_id: profile.active_generation.as_ref().map(|j| j.job_id),
        }
    }
}

/// Decision for one turn.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub next: ConversationState,
    pub effects: Vec<Effect>,
}

impl Outcome {
    fn stay(state: ConversationState, effects: Vec<Effect>) -> Self {
        Self {
            next: state,
            effects,
        }
    }

    fn go(next: ConversationState, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }
}

/// Evaluate the transition table, first-match-wins.
pub fn transition(state: ConversationState, kind: &EventKind, view: &GuardView) -> Outcome {
    use ConversationState::*;

    // Restart wins in every state.
    if let EventKind::Command(Command::Restart) = kind {
        return Outcome::go(
            Idle,
            vec![Effect::ResetProfile, Effect::Reply(replies::restart_done())],
        );
    }

    // A repeated /start never rewinds intake; only /restart does.
    if matches!(kind, EventKind::Command(Command::Start)) && state != Idle {
        return Outcome::stay(state, vec![Effect::Reply(replies::already_started())]);
    }

    match (state, kind) {
        // ── Idle ────────────────────────────────────────────────────
        (Idle, EventKind::Command(Command::Start)) => Outcome::go(
            AwaitingSelfie,
            vec![Effect::Reply(replies::welcome())],
        ),
        (Idle, EventKind::JobCompleted { .. }) => Outcome::stay(Idle, vec![]),
        (Idle, _) => Outcome::stay(Idle, vec![Effect::Reply(replies::idle_hint())]),

        // ── AwaitingSelfie ──────────────────────────────────────────
        (AwaitingSelfie, EventKind::Photo { image }) => Outcome::go(
            CollectingGarments,
            vec![
                Effect::StoreSelfie {
                    image: image.clone(),
                },
                Effect::Reply(replies::selfie_saved()),
            ],
        ),
        (AwaitingSelfie, EventKind::JobCompleted { .. }) => Outcome::stay(AwaitingSelfie, vec![]),
        (AwaitingSelfie, _) => Outcome::stay(
            AwaitingSelfie,
            vec![Effect::Reply(replies::send_a_photo())],
        ),

        // ── CollectingGarments ──────────────────────────────────────
        (CollectingGarments, EventKind::Photo { image }) => Outcome::go(
            AwaitingCategory,
            vec![
                Effect::StagePendingItem {
                    image: image.clone(),
                },
                Effect::Reply(replies::choose_category()),
            ],
        ),
        (CollectingGarments, EventKind::Text { text }) if event::is_done_marker(text) => {
            if view.has_wardrobe {
                Outcome::go(ReadyForStyle, vec![Effect::Reply(replies::style_prompt())])
            } else {
                Outcome::stay(
                    CollectingGarments,
                    vec![Effect::Reply(replies::add_at_least_one())],
                )
            }
        }
        (CollectingGarments, EventKind::JobCompleted { .. }) => {
            Outcome::stay(CollectingGarments, vec![])
        }
        (CollectingGarments, _) => Outcome::stay(
            CollectingGarments,
            vec![Effect::Reply(replies::collecting_hint())],
        ),

        // ── AwaitingCategory ────────────────────────────────────────
        (AwaitingCategory, EventKind::Text { text }) => match Category::parse(text) {
            Some(category) if view.has_pending_item => Outcome::go(
                CollectingGarments,
                vec![
                    Effect::CommitPendingItem { category },
                    Effect::Reply(replies::category_saved(category)),
                ],
            ),
            // Pending item lost (stale turn): route back to collecting
            // instead of trapping the user in a category loop.
            Some(_) => Outcome::go(
                CollectingGarments,
                vec![Effect::Reply(replies::no_pending_item())],
            ),
            None => Outcome::stay(
                AwaitingCategory,
                vec![Effect::Reply(replies::category_reprompt())],
            ),
        },
        (AwaitingCategory, EventKind::JobCompleted { .. }) => {
            Outcome::stay(AwaitingCategory, vec![])
        }
        (AwaitingCategory, _) => Outcome::stay(
            AwaitingCategory,
            vec![Effect::Reply(replies::category_reprompt())],
        ),

        // ── ReadyForStyle ───────────────────────────────────────────
        (ReadyForStyle, EventKind::Text { text }) => Outcome::go(
            AwaitingOutfitRequest,
            vec![
                Effect::CaptureStyle { text: text.clone() },
                Effect::Reply(replies::ask_outfit()),
            ],
        ),
        (ReadyForStyle, EventKind::JobCompleted { .. }) => Outcome::stay(ReadyForStyle, vec![]),
        (ReadyForStyle, _) => Outcome::stay(
            ReadyForStyle,
            vec![Effect::Reply(replies::style_in_words())],
        ),

        // ── AwaitingOutfitRequest ───────────────────────────────────
        (AwaitingOutfitRequest, EventKind::Text { text }) if event::is_outfit_request(text) => {
            if view.has_active_generation {
                Outcome::stay(
                    AwaitingOutfitRequest,
                    vec![Effect::Reply(replies::already_generating())],
                )
            } else {
                Outcome::go(
                    GeneratingOutfit,
                    vec![
                        Effect::StartGeneration {
                            request_notes: text.clone(),
                        },
                        Effect::Reply(replies::generation_started()),
                    ],
                )
            }
        }
        (AwaitingOutfitRequest, EventKind::Text { text }) => {
            match event::parse_feedback(text) {
                Some((sentiment, note)) => Outcome::stay(
                    AwaitingOutfitRequest,
                    vec![
                        Effect::RecordFeedback { sentiment, note },
                        Effect::Reply(replies::feedback_thanks()),
                    ],
                ),
                None => Outcome::stay(
                    AwaitingOutfitRequest,
                    vec![Effect::Reply(replies::outfit_hint())],
                ),
            }
        }
        (AwaitingOutfitRequest, EventKind::JobCompleted { .. }) => {
            Outcome::stay(AwaitingOutfitRequest, vec![])
        }
        (AwaitingOutfitRequest, _) => Outcome::stay(
            AwaitingOutfitRequest,
            vec![Effect::Reply(replies::outfit_hint())],
        ),

        // ── GeneratingOutfit ────────────────────────────────────────
        (GeneratingOutfit, EventKind::JobCompleted { job_id, outcome }) => {
            if view.active_job_id == Some(*job_id) {
                Outcome::go(
                    AwaitingOutfitRequest,
                    vec![Effect::DeliverGenerationOutcome {
                        job_id: *job_id,
                        outcome: outcome.clone(),
                    }],
                )
            } else {
                // Completion for a job this profile no longer owns (a
                // restarted-then-reclaimed flow); the real job is still out.
                Outcome::stay(GeneratingOutfit, vec![])
            }
        }
        (GeneratingOutfit, _) => Outcome::stay(
            GeneratingOutfit,
            vec![Effect::Reply(replies::still_working())],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::JobResult;

    fn photo() -> EventKind {
        EventKind::Photo {
            image: MediaHandle::new("abc123.jpg"),
        }
    }

    fn text(s: &str) -> EventKind {
        EventKind::Text {
            text: s.to_string(),
        }
    }

    fn completed_for(job_id: Uuid) -> EventKind {
        EventKind::JobCompleted {
            job_id,
            outcome: JobOutcome::Succeeded(JobResult {
                summary: "look".into(),
                image: None,
                prompt: "p".into(),
            }),
        }
    }

    fn completed() -> EventKind {
        completed_for(Uuid::new_v4())
    }

    fn has_reply(outcome: &Outcome) -> bool {
        outcome
            .effects
            .iter()
            .any(|e| matches!(e, Effect::Reply(_)))
    }

    #[test]
    fn scenario_a_intake_path() {
        use ConversationState::*;
        let view = GuardView::default();

        let o = transition(Idle, &EventKind::Command(Command::Start), &view);
        assert_eq!(o.next, AwaitingSelfie);

        let o = transition(AwaitingSelfie, &photo(), &view);
        assert_eq!(o.next, CollectingGarments);
        assert!(o
            .effects
            .iter()
            .any(|e| matches!(e, Effect::StoreSelfie { .. })));

        let o = transition(CollectingGarments, &photo(), &view);
        assert_eq!(o.next, AwaitingCategory);
        assert!(o
            .effects
            .iter()
            .any(|e| matches!(e, Effect::StagePendingItem { .. })));

        let view = GuardView {
            has_pending_item: true,
            ..Default::default()
        };
        let o = transition(AwaitingCategory, &text("top"), &view);
        assert_eq!(o.next, CollectingGarments);
        assert!(o.effects.iter().any(|e| matches!(
            e,
            Effect::CommitPendingItem {
                category: Category::Top
            }
        )));
    }

    #[test]
    fn scenario_b_done_with_empty_wardrobe() {
        let view = GuardView::default();
        let o = transition(ConversationState::CollectingGarments, &text("done"), &view);
        assert_eq!(o.next, ConversationState::CollectingGarments);
        assert!(has_reply(&o));
    }

    #[test]
    fn done_with_items_moves_to_style() {
        let view = GuardView {
            has_wardrobe: true,
            ..Default::default()
        };
        let o = transition(ConversationState::CollectingGarments, &text("done"), &view);
        assert_eq!(o.next, ConversationState::ReadyForStyle);
    }

    #[test]
    fn unknown_category_reprompts() {
        let view = GuardView {
            has_pending_item: true,
            ..Default::default()
        };
        let o = transition(ConversationState::AwaitingCategory, &text("banana"), &view);
        assert_eq!(o.next, ConversationState::AwaitingCategory);
        assert!(has_reply(&o));
    }

    #[test]
    fn category_without_pending_item_recovers() {
        let view = GuardView::default();
        let o = transition(ConversationState::AwaitingCategory, &text("top"), &view);
        assert_eq!(o.next, ConversationState::CollectingGarments);
        assert!(!o
            .effects
            .iter()
            .any(|e| matches!(e, Effect::CommitPendingItem { .. })));
    }

    #[test]
    fn style_text_arms_outfit_requests() {
        let view = GuardView {
            has_wardrobe: true,
            ..Default::default()
        };
        let o = transition(
            ConversationState::ReadyForStyle,
            &text("minimalist, earth tones"),
            &view,
        );
        assert_eq!(o.next, ConversationState::AwaitingOutfitRequest);
        assert!(o
            .effects
            .iter()
            .any(|e| matches!(e, Effect::CaptureStyle { .. })));
    }

    #[test]
    fn outfit_request_starts_generation() {
        let view = GuardView {
            has_wardrobe: true,
            ..Default::default()
        };
        let o = transition(
            ConversationState::AwaitingOutfitRequest,
            &text("what should I wear today?"),
            &view,
        );
        assert_eq!(o.next, ConversationState::GeneratingOutfit);
        assert!(o
            .effects
            .iter()
            .any(|e| matches!(e, Effect::StartGeneration { .. })));
    }

    #[test]
    fn duplicate_request_is_rejected_while_active() {
        let view = GuardView {
            has_wardrobe: true,
            has_active_generation: true,
            ..Default::default()
        };
        let o = transition(
            ConversationState::AwaitingOutfitRequest,
            &text("what should I wear?"),
            &view,
        );
        assert_eq!(o.next, ConversationState::AwaitingOutfitRequest);
        assert!(!o
            .effects
            .iter()
            .any(|e| matches!(e, Effect::StartGeneration { .. })));
        assert!(has_reply(&o));
    }

    #[test]
    fn completion_delivers_and_reopens_requests() {
        let job_id = Uuid::new_v4();
        let view = GuardView {
            has_active_generation: true,
            active_job_id: Some(job_id),
            ..Default::default()
        };
        let o = transition(
            ConversationState::GeneratingOutfit,
            &completed_for(job_id),
            &view,
        );
        assert_eq!(o.next, ConversationState::AwaitingOutfitRequest);
        assert!(o
            .effects
            .iter()
            .any(|e| matches!(e, Effect::DeliverGenerationOutcome { .. })));
    }

    #[test]
    fn mismatched_completion_keeps_generating() {
        let view = GuardView {
            has_active_generation: true,
            active_job_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        let o = transition(ConversationState::GeneratingOutfit, &completed(), &view);
        assert_eq!(o.next, ConversationState::GeneratingOutfit);
        assert!(o.effects.is_empty());
    }

    #[test]
    fn repeated_start_never_rewinds() {
        let view = GuardView::default();
        for state in ConversationState::ALL {
            if state == ConversationState::Idle {
                continue;
            }
            let o = transition(state, &EventKind::Command(Command::Start), &view);
            assert_eq!(o.next, state, "start in {state}");
            assert!(has_reply(&o));
        }
    }

    #[test]
    fn restart_resets_from_every_state() {
        let view = GuardView::default();
        for state in ConversationState::ALL {
            let o = transition(state, &EventKind::Command(Command::Restart), &view);
            assert_eq!(o.next, ConversationState::Idle, "restart from {state}");
            assert!(o
                .effects
                .iter()
                .any(|e| matches!(e, Effect::ResetProfile)));
        }
    }

    #[test]
    fn feedback_is_recorded_without_leaving_state() {
        let view = GuardView {
            has_wardrobe: true,
            ..Default::default()
        };
        let o = transition(
            ConversationState::AwaitingOutfitRequest,
            &text("👍 loved it"),
            &view,
        );
        assert_eq!(o.next, ConversationState::AwaitingOutfitRequest);
        assert!(o
            .effects
            .iter()
            .any(|e| matches!(e, Effect::RecordFeedback { .. })));
    }

    #[test]
    fn stale_completions_are_ignored_outside_generating() {
        let view = GuardView::default();
        for state in ConversationState::ALL {
            if state == ConversationState::GeneratingOutfit {
                continue;
            }
            let o = transition(state, &completed(), &view);
            assert_eq!(o.next, state, "completion in {state}");
            assert!(o.effects.is_empty(), "completion in {state}");
        }
    }

    #[test]
    fn every_state_event_pair_is_defined_and_stays_put() {
        // Totality: for every state, events outside its matched rows keep
        // the machine in place (restart excluded, it always moves).
        let view = GuardView::default();
        let probes = [photo(), text("random words"), EventKind::Voice {
            audio: MediaHandle::new("v.ogg"),
        }];
        for state in ConversationState::ALL {
            for probe in &probes {
                let o = transition(state, probe, &view);
                // The only forward moves from these probes are the defined
                // table rows; everything else must stay.
                match (state, probe) {
                    (ConversationState::Idle, _) => assert_eq!(o.next, state),
                    (ConversationState::AwaitingSelfie, EventKind::Photo { .. }) => {
                        assert_eq!(o.next, ConversationState::CollectingGarments)
                    }
                    (ConversationState::CollectingGarments, EventKind::Photo { .. }) => {
                        assert_eq!(o.next, ConversationState::AwaitingCategory)
                    }
                    (ConversationState::ReadyForStyle, EventKind::Text { .. }) => {
                        assert_eq!(o.next, ConversationState::AwaitingOutfitRequest)
                    }
                    (ConversationState::AwaitingCategory, EventKind::Text { .. }) => {
                        // "random words" is not a category: stays.
                        assert_eq!(o.next, state)
                    }
                    _ => assert_eq!(o.next, state, "{state} on {probe:?}"),
                }
            }
        }
    }

    #[test]
    fn generating_keeps_user_informed() {
        let view = GuardView {
            has_active_generation: true,
            ..Default::default()
        };
        let o = transition(ConversationState::GeneratingOutfit, &photo(), &view);
        assert_eq!(o.next, ConversationState::GeneratingOutfit);
        assert!(has_reply(&o));
    }
}
