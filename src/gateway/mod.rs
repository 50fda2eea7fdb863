//! Messaging gateway - the WhatsApp HTTP service that actually delivers sends.
//!
//! Gateway responses are data: a non-success status is returned to the caller, which
//! decides what counts as delivered. Dispatch items require `201 Created`; reminder
//! texts accept any 2xx.

/// WAHA HTTP implementation
pub mod waha;

use crate::entities::{MediaType, dispatch_item};
use crate::errors::Result;
use async_trait::async_trait;

pub use waha::WahaGateway;

/// What to send, chosen by media presence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundContent<'a> {
    /// Plain text
    Text {
        /// Message body
        text: &'a str,
    },
    /// Image with caption
    Image {
        /// Public image URL
        url: &'a str,
        /// Caption shown under the image
        caption: &'a str,
    },
    /// Video with caption
    Video {
        /// Public video URL
        url: &'a str,
        /// Caption shown under the video
        caption: &'a str,
    },
}

impl<'a> OutboundContent<'a> {
    /// Send variant for a dispatch item. Video wins over image, image over text.
    #[must_use]
    pub fn for_item(item: &'a dispatch_item::Model) -> Self {
        match item.media() {
            Some(media) if media.kind == MediaType::Video => Self::Video {
                url: media.url,
                caption: &item.content,
            },
            Some(media) => Self::Image {
                url: media.url,
                caption: &item.content,
            },
            None => Self::Text {
                text: &item.content,
            },
        }
    }

    /// Short label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Video { .. } => "video",
        }
    }
}

/// Status code and raw body returned by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body, kept for logging
    pub body: String,
}

impl GatewayResponse {
    /// `201 Created`, the gateway's answer to an accepted chat or status send.
    #[must_use]
    pub const fn is_created(&self) -> bool {
        self.status == 201
    }

    /// Any 2xx status.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// A WhatsApp gateway addressed by session name
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Sends content to a chat.
    async fn send_message(
        &self,
        session: &str,
        chat_id: &str,
        content: &OutboundContent<'_>,
    ) -> Result<GatewayResponse>;

    /// Posts content as the session's status update.
    async fn send_status(
        &self,
        session: &str,
        content: &OutboundContent<'_>,
    ) -> Result<GatewayResponse>;

    /// Sends a plain text message to a chat.
    async fn send_text(&self, session: &str, chat_id: &str, text: &str) -> Result<GatewayResponse> {
        self.send_message(session, chat_id, &OutboundContent::Text { text })
            .await
    }
}
