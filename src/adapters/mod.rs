//! External AI service adapters, specified at their interface boundary.

pub mod aitunnel;

pub use aitunnel::AiTunnelClient;

use async_trait::async_trait;

use crate::error::AdapterFailure;
use crate::profile::MediaHandle;

/// What a completion is for; carried through for logging and model routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    PreferenceExtraction,
    OutfitPlan,
}

impl std::fmt::Display for Purpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PreferenceExtraction => "preference_extraction",
            Self::OutfitPlan => "outfit_plan",
        };
        write!(f, "{s}")
    }
}

/// A text-completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub purpose: Purpose,
    /// Ask the model for a strict JSON object response.
    pub json_response: bool,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>, purpose: Purpose) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            purpose,
            json_response: false,
        }
    }

    pub fn expecting_json(mut self) -> Self {
        self.json_response = true;
        self
    }
}

/// Text-completion adapter.
#[async_trait]
pub trait TextAdapter: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, AdapterFailure>;
}

/// Image-generation adapter. Reference images ground the generation in the
/// user's selfie and chosen garments.
#[async_trait]
pub trait ImageAdapter: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        reference_images: &[MediaHandle],
    ) -> Result<MediaHandle, AdapterFailure>;
}

/// Speech-to-text adapter for voice notes.
#[async_trait]
pub trait SpeechAdapter: Send + Sync {
    async fn transcribe(&self, audio: &MediaHandle) -> Result<String, AdapterFailure>;
}
