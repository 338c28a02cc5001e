//! AI Stylist — conversation orchestration engine for a wardrobe chatbot.

pub mod adapters;
pub mod channels;
pub mod config;
pub mod engine;
pub mod error;
pub mod fsm;
pub mod profile;
pub mod prompts;
pub mod retry;
pub mod store;
