//! Prompt construction and model-response parsing.
//!
//! Two completions drive the engine: preference extraction (free-form style
//! text → structured tags) and outfit planning (wardrobe + preferences →
//! chosen items, summary, image prompt text). Both ask for strict JSON.

use serde::Deserialize;
use uuid::Uuid;

use crate::adapters::{CompletionRequest, Purpose};
use crate::profile::{Category, GarmentRecord, StylePreferences, UserProfile};

// ── Preference extraction ──────────────────────────────────────────

pub fn preference_extraction_request(text: &str) -> CompletionRequest {
    let system = "You are a stylist's assistant. Classify the user's style \
                  description and return JSON of the form {\"style_tags\": [], \
                  \"colors\": [], \"brand_refs\": [], \"notes\": \"\"}. \
                  Output only the JSON object.";
    CompletionRequest::new(system, text, Purpose::PreferenceExtraction).expecting_json()
}

/// Parse the extraction response. Unknown fields are ignored; missing fields
/// default to empty so a sparse answer still lands.
pub fn parse_preferences(raw: &str) -> Result<StylePreferences, String> {
    serde_json::from_str(strip_code_fence(raw)).map_err(|e| e.to_string())
}

// ── Outfit planning ────────────────────────────────────────────────

/// One item the model picked, resolved later against the wardrobe.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannedItem {
    pub item_id: Option<Uuid>,
    pub category: Option<String>,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutfitPlan {
    #[serde(default)]
    pub recommended_items: Vec<PlannedItem>,
    #[serde(default)]
    pub summary_text: String,
    #[serde(default)]
    pub prompt_text: String,
}

pub fn outfit_plan_request(profile: &UserProfile, request_notes: &str) -> CompletionRequest {
    let wardrobe: Vec<serde_json::Value> = profile
        .categorized_items()
        .map(|g| {
            serde_json::json!({
                "item_id": g.item_id,
                "category": g.category.map(|c| c.to_string()),
            })
        })
        .collect();
    let payload = serde_json::json!({
        "wardrobe": wardrobe,
        "preferences": profile.preferences,
        "style_notes": profile.style_notes,
        "request": request_notes,
    });

    let system = "You are an AI stylist. Pick an outfit using only the items \
                  listed in the user's wardrobe; item_id values must be copied \
                  exactly from the input. Respond strictly in JSON: \
                  {\"recommended_items\": [{\"item_id\": \"...\", \"category\": \
                  \"top\", \"label\": \"...\"}], \"summary_text\": \"...\", \
                  \"prompt_text\": \"...\"}. No Markdown, no commentary, no \
                  invented items.";
    CompletionRequest::new(system, payload.to_string(), Purpose::OutfitPlan).expecting_json()
}

pub fn parse_outfit_plan(raw: &str) -> Result<OutfitPlan, String> {
    serde_json::from_str(strip_code_fence(raw)).map_err(|e| e.to_string())
}

/// Resolve the plan's items against the wardrobe: exact item id first, then
/// the first garment of the named category. If nothing resolves, fall back
/// to the first item of each category so the pipeline still produces a look.
pub fn resolve_planned_items<'a>(
    profile: &'a UserProfile,
    plan: &OutfitPlan,
) -> Vec<&'a GarmentRecord> {
    let mut resolved: Vec<&GarmentRecord> = Vec::new();
    for item in &plan.recommended_items {
        let found = item
            .item_id
            .and_then(|id| profile.find_item(id))
            .or_else(|| {
                item.category
                    .as_deref()
                    .and_then(Category::parse)
                    .and_then(|c| profile.first_of(c))
            });
        if let Some(garment) = found {
            if !resolved.iter().any(|g| g.item_id == garment.item_id) {
                resolved.push(garment);
            }
        }
    }
    if resolved.is_empty() {
        for category in Category::ALL {
            if let Some(garment) = profile.first_of(category) {
                resolved.push(garment);
            }
            if resolved.len() == 3 {
                break;
            }
        }
    }
    resolved
}

// ── Image prompt ───────────────────────────────────────────────────

/// Build the natural-language image prompt from the plan and chosen items.
pub fn image_prompt(plan: &OutfitPlan, items: &[&GarmentRecord], request_notes: &str) -> String {
    let garments = if items.is_empty() {
        "suitable pieces from the wardrobe".to_string()
    } else {
        items
            .iter()
            .map(|g| {
                g.category
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "garment".to_string())
            })
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut prompt = format!(
        "Dress the person in the first photo in the following items from the \
         other photos: {garments}. {}",
        plan.prompt_text.trim()
    );
    let notes = request_notes.trim();
    if !notes.is_empty() {
        prompt.push_str(&format!(" Occasion: {notes}."));
    }
    prompt.push_str(" Natural pose, realistic lighting, keep the person's appearance unchanged.");
    prompt
}

/// Models occasionally wrap JSON in a Markdown code fence despite
/// instructions; strip it before parsing.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.strip_suffix("```").unwrap_or(without_open).trim()
}
