//! Canned user-facing message text.
//!
//! Kept in one place so the transition table stays readable and the copy can
//! be reviewed as a whole.

use crate::profile::Category;

pub fn welcome() -> String {
    "Hi! I'm your stylist. Send me a full-body selfie and then add the \
     garments from your wardrobe one photo at a time."
        .to_string()
}

pub fn idle_hint() -> String {
    "Send /start and I'll walk you through setting up your wardrobe.".to_string()
}

pub fn already_started() -> String {
    "We're already underway. Send /restart if you want to begin from scratch.".to_string()
}

pub fn send_a_photo() -> String {
    "I need a photo here — send a full-body selfie to continue.".to_string()
}

pub fn selfie_saved() -> String {
    "Selfie saved. Now send your garments, one photo each. Say \"done\" when \
     your wardrobe is complete."
        .to_string()
}

pub fn choose_category() -> String {
    let options = Category::ALL
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("Got the photo. Which category is it? ({options})")
}

pub fn category_reprompt() -> String {
    choose_category()
}

pub fn category_saved(category: Category) -> String {
    format!("Filed under {category}. Send the next garment, or say \"done\".")
}

pub fn no_pending_item() -> String {
    "I don't have a photo waiting for a category. Send the next garment.".to_string()
}

pub fn add_at_least_one() -> String {
    "Your wardrobe is still empty — add at least one garment before we move on.".to_string()
}

pub fn collecting_hint() -> String {
    "Send a garment photo, or say \"done\" when your wardrobe is complete.".to_string()
}

pub fn style_prompt() -> String {
    "Wardrobe saved. Now describe your style in a few words — colors, brands, \
     vibes you like. Voice notes work too."
        .to_string()
}

pub fn style_in_words() -> String {
    "Describe your style in words (or a voice note) — photos come later.".to_string()
}

pub fn ask_outfit() -> String {
    "Noted! Whenever you're ready, ask me what to wear — e.g. \"what should I \
     wear to the office?\""
        .to_string()
}

pub fn outfit_hint() -> String {
    "Ask me for an outfit — e.g. \"what should I wear today?\" — and I'll put \
     a look together."
        .to_string()
}

pub fn generation_started() -> String {
    "Putting your look together — give me a minute.".to_string()
}

pub fn already_generating() -> String {
    "I'm already working on your outfit. Hang tight, it's almost there.".to_string()
}

pub fn still_working() -> String {
    "Still working on your outfit — I'll send it as soon as it's ready.".to_string()
}

pub fn generation_failed() -> String {
    "Sorry — I couldn't finish your outfit this time. Please ask again in a \
     little while."
        .to_string()
}

pub fn feedback_thanks() -> String {
    "Thanks for the feedback! I'll keep it in mind next time.".to_string()
}

pub fn restart_done() -> String {
    "All cleared. Send /start whenever you want to set up a new wardrobe.".to_string()
}

pub fn voice_not_understood() -> String {
    "I couldn't make out that voice note. Could you try again, or type it out?".to_string()
}

pub fn transient_trouble() -> String {
    "Sorry, something went wrong on my side. Please send that again.".to_string()
}

pub fn image_caption() -> String {
    "Here's your look!".to_string()
}
