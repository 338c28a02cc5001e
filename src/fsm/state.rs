//! Conversation states for the stylist intake flow.

use serde::{Deserialize, Serialize};

/// The stages of the stylist conversation.
///
/// `CollectingGarments` and `AwaitingCategory` alternate during wardrobe
/// intake: each garment photo moves forward, each category choice moves
/// back. After the first generation the user loops on
/// `AwaitingOutfitRequest` without re-onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Idle,
    AwaitingSelfie,
    CollectingGarments,
    AwaitingCategory,
    ReadyForStyle,
    AwaitingOutfitRequest,
    GeneratingOutfit,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::Idle
    }
}

impl ConversationState {
    pub const ALL: [ConversationState; 7] = [
        ConversationState::Idle,
        ConversationState::AwaitingSelfie,
        ConversationState::CollectingGarments,
        ConversationState::AwaitingCategory,
        ConversationState::ReadyForStyle,
        ConversationState::AwaitingOutfitRequest,
        ConversationState::GeneratingOutfit,
    ];
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::AwaitingSelfie => "awaiting_selfie",
            Self::CollectingGarments => "collecting_garments",
            Self::AwaitingCategory => "awaiting_category",
            Self::ReadyForStyle => "ready_for_style",
            Self::AwaitingOutfitRequest => "awaiting_outfit_request",
            Self::GeneratingOutfit => "generating_outfit",
        };
        write!(f, "{s}")
    }
}
