//! WAHA (WhatsApp HTTP API) gateway client.

use super::{GatewayResponse, MessagingGateway, OutboundContent};
use crate::config::settings::GatewayConfig;
use crate::errors::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

const API_KEY_HEADER: &str = "X-Api-Key";

#[derive(Debug, Serialize)]
struct FileRef<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatText<'a> {
    session: &'a str,
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatFile<'a> {
    session: &'a str,
    chat_id: &'a str,
    file: FileRef<'a>,
    caption: &'a str,
}

#[derive(Debug, Serialize)]
struct StatusText<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct StatusFile<'a> {
    file: FileRef<'a>,
    caption: &'a str,
}

/// Gateway backed by a WAHA server
#[derive(Debug, Clone)]
pub struct WahaGateway {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl WahaGateway {
    /// Creates a client for the configured server.
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url)
    }

    async fn post<T>(&self, path: &str, body: &T) -> Result<GatewayResponse>
    where
        T: Serialize + Sync,
    {
        let response = self
            .client
            .post(self.endpoint(path))
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        debug!(path, status, "Gateway responded");
        Ok(GatewayResponse { status, body })
    }
}

#[async_trait]
impl MessagingGateway for WahaGateway {
    async fn send_message(
        &self,
        session: &str,
        chat_id: &str,
        content: &OutboundContent<'_>,
    ) -> Result<GatewayResponse> {
        match *content {
            OutboundContent::Text { text } => {
                self.post(
                    "sendText",
                    &ChatText {
                        session,
                        chat_id,
                        text,
                    },
                )
                .await
            }
            OutboundContent::Image { url, caption } => {
                self.post(
                    "sendImage",
                    &ChatFile {
                        session,
                        chat_id,
                        file: FileRef { url },
                        caption,
                    },
                )
                .await
            }
            OutboundContent::Video { url, caption } => {
                self.post(
                    "sendVideo",
                    &ChatFile {
                        session,
                        chat_id,
                        file: FileRef { url },
                        caption,
                    },
                )
                .await
            }
        }
    }

    async fn send_status(
        &self,
        session: &str,
        content: &OutboundContent<'_>,
    ) -> Result<GatewayResponse> {
        match *content {
            OutboundContent::Text { text } => {
                self.post(&format!("{session}/status/text"), &StatusText { text })
                    .await
            }
            OutboundContent::Image { url, caption } => {
                self.post(
                    &format!("{session}/status/image"),
                    &StatusFile {
                        file: FileRef { url },
                        caption,
                    },
                )
                .await
            }
            OutboundContent::Video { url, caption } => {
                self.post(
                    &format!("{session}/status/video"),
                    &StatusFile {
                        file: FileRef { url },
                        caption,
                    },
                )
                .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let gateway = WahaGateway::new(&GatewayConfig {
            base_url: "http://waha:3000/".to_string(),
            api_key: "secret".to_string(),
        });
        assert_eq!(gateway.endpoint("sendText"), "http://waha:3000/api/sendText");
        assert_eq!(
            gateway.endpoint("main/status/image"),
            "http://waha:3000/api/main/status/image"
        );
    }

    #[test]
    fn test_request_bodies_use_camel_case() {
        let body = serde_json::to_value(ChatFile {
            session: "main",
            chat_id: "15550100@c.us",
            file: FileRef {
                url: "https://cdn/x.png",
            },
            caption: "hi",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "session": "main",
                "chatId": "15550100@c.us",
                "file": { "url": "https://cdn/x.png" },
                "caption": "hi"
            })
        );
    }
}
