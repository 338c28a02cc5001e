//! Chat transport boundary types.

pub mod telegram;

pub use telegram::TelegramChannel;

use crate::profile::MediaHandle;

/// A message the engine wants delivered to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Text(String),
    Photo {
        image: MediaHandle,
        caption: Option<String>,
    },
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text(body.into())
    }
}
