//! Profile record types persisted per user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fsm::ConversationState;

/// Content-addressed handle to a stored media file (sha256 hex + extension).
///
/// The engine only ever passes handles around; raw bytes stay with the
/// transport and the adapters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaHandle(pub String);

impl MediaHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wardrobe garment categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Top,
    Bottom,
    Footwear,
    Accessory,
    Outerwear,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Top,
        Category::Bottom,
        Category::Footwear,
        Category::Accessory,
        Category::Outerwear,
    ];

    /// Parse a user-supplied category name, accepting common aliases.
    pub fn parse(raw: &str) -> Option<Category> {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "top" | "tops" | "shirt" | "t-shirt" | "tee" | "blouse" | "sweater" => {
                Some(Category::Top)
            }
            "bottom" | "bottoms" | "pants" | "trousers" | "jeans" | "skirt" | "shorts" => {
                Some(Category::Bottom)
            }
            "footwear" | "shoes" | "boots" | "sneakers" | "heels" => Some(Category::Footwear),
            "accessory" | "accessories" | "bag" | "belt" | "hat" | "scarf" | "jewelry" => {
                Some(Category::Accessory)
            }
            "outerwear" | "jacket" | "coat" | "parka" | "blazer" => Some(Category::Outerwear),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Footwear => "footwear",
            Self::Accessory => "accessory",
            Self::Outerwear => "outerwear",
        };
        write!(f, "{s}")
    }
}

/// One garment in the wardrobe. Category is null until the user picks one;
/// categorization is the only mutation allowed once the record is committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GarmentRecord {
    pub item_id: Uuid,
    pub image: MediaHandle,
    pub category: Option<Category>,
    pub added_at: DateTime<Utc>,
}

impl GarmentRecord {
    pub fn new(image: MediaHandle) -> Self {
        Self {
            item_id: Uuid::new_v4(),
            image,
            category: None,
            added_at: Utc::now(),
        }
    }
}

/// Structured style preferences extracted from free-form text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StylePreferences {
    #[serde(default)]
    pub style_tags: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub brand_refs: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

impl StylePreferences {
    pub fn is_empty(&self) -> bool {
        self.style_tags.is_empty()
            && self.colors.is_empty()
            && self.brand_refs.is_empty()
            && self.notes.is_empty()
    }
}

/// Reaction recorded after a delivered outfit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSentiment {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub sentiment: FeedbackSentiment,
    pub note: String,
    pub at: DateTime<Utc>,
}

/// Status of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Successful output of the generation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    /// Plain-language outfit recommendation shown to the user.
    pub summary: String,
    /// Generated visualization, when image generation succeeded.
    pub image: Option<MediaHandle>,
    /// The image prompt that was used (kept for inspection).
    pub prompt: String,
}

/// An asynchronous outfit-generation unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    pub job_id: Uuid,
    pub user_id: String,
    pub requested_at: DateTime<Utc>,
    pub status: JobStatus,
    /// Free-text context the user supplied with the request (occasion,
    /// weather, mood).
    #[serde(default)]
    pub request_notes: String,
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

impl GenerationJob {
    pub fn new(user_id: impl Into<String>, request_notes: impl Into<String>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            user_id: user_id.into(),
            requested_at: Utc::now(),
            status: JobStatus::Queued,
            request_notes: request_notes.into(),
            result: None,
            error: None,
        }
    }
}

/// One profile record per end user. Created lazily on first contact and
/// mutated only through whole-record commits guarded by `version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub state: ConversationState,
    /// Monotonic counter bumped by the store on every committed mutation.
    pub version: u64,
    pub selfie: Option<MediaHandle>,
    /// Append-only during intake; categorization is the only in-place edit.
    pub wardrobe_items: Vec<GarmentRecord>,
    /// Accumulated free-text style description.
    #[serde(default)]
    pub style_notes: String,
    #[serde(default)]
    pub preferences: StylePreferences,
    /// At most one garment awaiting a category choice.
    pub pending_item: Option<GarmentRecord>,
    /// At most one non-terminal job at any time.
    pub active_generation: Option<GenerationJob>,
    /// Most recent terminal job, kept for context in follow-up requests.
    pub last_generation: Option<GenerationJob>,
    #[serde(default)]
    pub feedback: Vec<FeedbackEntry>,
    /// Last applied inbound event id, for at-least-once dedup.
    pub last_event_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            state: ConversationState::Idle,
            version: 0,
            selfie: None,
            wardrobe_items: Vec::new(),
            style_notes: String::new(),
            preferences: StylePreferences::default(),
            pending_item: None,
            active_generation: None,
            last_generation: None,
            feedback: Vec::new(),
            last_event_id: None,
            updated_at: Utc::now(),
        }
    }

    /// Garments that have been assigned a category.
    pub fn categorized_items(&self) -> impl Iterator<Item = &GarmentRecord> {
        self.wardrobe_items.iter().filter(|g| g.category.is_some())
    }

    pub fn has_wardrobe(&self) -> bool {
        self.categorized_items().next().is_some()
    }

    /// First garment of the given category, if any.
    pub fn first_of(&self, category: Category) -> Option<&GarmentRecord> {
        self.categorized_items()
            .find(|g| g.category == Some(category))
    }

    pub fn find_item(&self, item_id: Uuid) -> Option<&GarmentRecord> {
        self.wardrobe_items.iter().find(|g| g.item_id == item_id)
    }

    /// Clear intake data for a full restart. Conversation history on the
    /// transport side is untouched; generation state is dropped too so the
    /// user starts from a clean slate.
    pub fn reset_intake(&mut self) {
        self.selfie = None;
        self.wardrobe_items.clear();
        self.style_notes.clear();
        self.preferences = StylePreferences::default();
        self.pending_item = None;
        self.active_generation = None;
        self.last_generation = None;
        self.feedback.clear();
    }

    /// Detect and repair invariant violations on load: a terminal job left
    /// attached to `active_generation` is detached, a non-terminal job
    /// attached outside `GeneratingOutfit` is failed and detached, and a
    /// `GeneratingOutfit` state with no job falls back to accepting requests
    /// again. Returns a description of what was repaired, if anything.
    pub fn repair(&mut self) -> Option<String> {
        match &self.active_generation {
            Some(job) if job.status.is_terminal() => {
                self.last_generation = self.active_generation.take();
                if self.state == ConversationState::GeneratingOutfit {
                    self.state = ConversationState::AwaitingOutfitRequest;
                }
                Some("terminal job was still attached to active_generation".to_string())
            }
            Some(_) if self.state != ConversationState::GeneratingOutfit => {
                if let Some(mut job) = self.active_generation.take() {
                    job.status = JobStatus::Failed;
                    job.error = Some("job abandoned outside the generation flow".to_string());
                    self.last_generation = Some(job);
                }
                Some("non-terminal job attached outside generating state".to_string())
            }
            None if self.state == ConversationState::GeneratingOutfit => {
                self.state = ConversationState::AwaitingOutfitRequest;
                Some("generating state with no active job".to_string())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_aliases() {
        assert_eq!(Category::parse("Top"), Some(Category::Top));
        assert_eq!(Category::parse(" jeans "), Some(Category::Bottom));
        assert_eq!(Category::parse("sneakers"), Some(Category::Footwear));
        assert_eq!(Category::parse("bag"), Some(Category::Accessory));
        assert_eq!(Category::parse("coat"), Some(Category::Outerwear));
        assert_eq!(Category::parse("spaceship"), None);
    }

    #[test]
    fn category_display_matches_serde() {
        for category in Category::ALL {
            let display = category.to_string();
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(format!("\"{display}\""), json);
        }
    }

    #[test]
    fn job_status_terminal() {
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn reset_clears_intake_data() {
        let mut profile = UserProfile::new("u1");
        profile.selfie = Some(MediaHandle::new("abc.jpg"));
        let mut garment = GarmentRecord::new(MediaHandle::new("g1.jpg"));
        garment.category = Some(Category::Top);
        profile.wardrobe_items.push(garment);
        profile.style_notes = "minimalist".to_string();
        profile.active_generation = Some(GenerationJob::new("u1", ""));

        profile.reset_intake();
        assert!(profile.selfie.is_none());
        assert!(profile.wardrobe_items.is_empty());
        assert!(profile.style_notes.is_empty());
        assert!(profile.active_generation.is_none());
    }

    #[test]
    fn repair_detaches_terminal_job() {
        let mut profile = UserProfile::new("u1");
        profile.state = ConversationState::GeneratingOutfit;
        let mut job = GenerationJob::new("u1", "");
        job.status = JobStatus::Failed;
        job.error = Some("boom".to_string());
        profile.active_generation = Some(job);

        assert!(profile.repair().is_some());
        assert!(profile.active_generation.is_none());
        assert!(profile.last_generation.is_some());
        assert_eq!(profile.state, ConversationState::AwaitingOutfitRequest);
    }

    #[test]
    fn repair_detaches_abandoned_job() {
        let mut profile = UserProfile::new("u1");
        profile.state = ConversationState::AwaitingOutfitRequest;
        profile.active_generation = Some(GenerationJob::new("u1", ""));

        assert!(profile.repair().is_some());
        assert!(profile.active_generation.is_none());
        let last = profile.last_generation.unwrap();
        assert_eq!(last.status, JobStatus::Failed);
        assert!(last.error.is_some());
    }

    #[test]
    fn repair_fixes_generating_without_job() {
        let mut profile = UserProfile::new("u1");
        profile.state = ConversationState::GeneratingOutfit;
        assert!(profile.repair().is_some());
        assert_eq!(profile.state, ConversationState::AwaitingOutfitRequest);
    }

    #[test]
    fn repair_leaves_healthy_profile_alone() {
        let mut profile = UserProfile::new("u1");
        profile.state = ConversationState::GeneratingOutfit;
        profile.active_generation = Some(GenerationJob::new("u1", ""));
        assert!(profile.repair().is_none());
        assert!(profile.active_generation.is_some());
    }

    #[test]
    fn profile_serde_roundtrip() {
        let mut profile = UserProfile::new("u1");
        profile.state = ConversationState::AwaitingCategory;
        profile.pending_item = Some(GarmentRecord::new(MediaHandle::new("p.jpg")));
        profile.version = 7;

        let json = serde_json::to_string(&profile).unwrap();
        let parsed: UserProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.state, ConversationState::AwaitingCategory);
        assert_eq!(parsed.version, 7);
        assert!(parsed.pending_item.is_some());
    }
}
