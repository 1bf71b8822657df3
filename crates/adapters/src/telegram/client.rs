//! Bot API HTTP client

use async_trait::async_trait;
use newsroom_domain::{ChatSender, SendError, SentMessage};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::types::{Message, TelegramResponse, Update, User};

pub const DEFAULT_TELEGRAM_URL: &str = "https://api.telegram.org";

/// Client for the subset of the Bot API the bot needs
pub struct TelegramBot {
    client: Client,
    token: SecretString,
    base_url: String,
}

impl TelegramBot {
    pub fn new(token: SecretString) -> Self {
        Self::with_base_url(token, DEFAULT_TELEGRAM_URL.to_string())
    }

    pub fn with_base_url(token: SecretString, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            token,
            base_url,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.base_url.trim_end_matches('/'),
            self.token.expose_secret(),
            method
        )
    }

    async fn call<B, T>(
        &self,
        method: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<T, SendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.client.post(self.method_url(method)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        // reqwest errors embed the URL, which carries the token
        let response = request
            .send()
            .await
            .map_err(|e| SendError::Network(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let envelope: TelegramResponse<T> = match response.json().await {
            Ok(envelope) => envelope,
            Err(e) => {
                return Err(SendError::Api {
                    status,
                    description: format!("Invalid response: {}", e.without_url()),
                });
            }
        };

        if envelope.ok {
            return envelope.result.ok_or_else(|| SendError::Api {
                status,
                description: "Missing result".to_string(),
            });
        }

        let code = envelope.error_code.unwrap_or(status);
        let description = envelope
            .description
            .unwrap_or_else(|| format!("HTTP {}", status));

        match code {
            401 => Err(SendError::Auth(description)),
            429 => Err(SendError::RateLimited(
                envelope
                    .parameters
                    .and_then(|p| p.retry_after)
                    .map(Duration::from_secs),
            )),
            _ => Err(SendError::Api {
                status: code,
                description,
            }),
        }
    }

    /// Identify the bot (used to validate the token)
    pub async fn get_me(&self) -> Result<User, SendError> {
        self.call("getMe", &serde_json::json!({}), None).await
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, SendError> {
        let body = GetUpdates {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message", "channel_post"],
        };
        self.call(
            "getUpdates",
            &body,
            Some(Duration::from_secs(timeout_secs + 10)),
        )
        .await
    }

    /// Plain-text reply used by bot command handlers
    pub async fn reply(&self, chat_id: i64, text: &str) -> Result<SentMessage, SendError> {
        let body = SendMessage {
            chat_id: chat_id.to_string(),
            text,
            parse_mode: None,
            disable_web_page_preview: true,
        };
        let message: Message = self.call("sendMessage", &body, None).await?;
        Ok(SentMessage {
            message_id: message.message_id,
        })
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: String,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
    disable_web_page_preview: bool,
}

#[derive(Serialize)]
struct GetUpdates<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[async_trait]
impl ChatSender for TelegramBot {
    async fn send_message(&self, chat_id: &str, html: &str) -> Result<SentMessage, SendError> {
        let body = SendMessage {
            chat_id: chat_id.to_string(),
            text: html,
            parse_mode: Some("HTML"),
            disable_web_page_preview: false,
        };
        let message: Message = self.call("sendMessage", &body, None).await?;
        tracing::debug!(chat_id, message_id = message.message_id, "Sent message");
        Ok(SentMessage {
            message_id: message.message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn bot(uri: String) -> TelegramBot {
        TelegramBot::with_base_url(SecretString::new("123:abc".into()), uri)
    }

    #[tokio::test]
    async fn test_send_message_html() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "@ai_news",
                "text": "&lt;b&gt; hi",
                "parse_mode": "HTML"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {"message_id": 42, "chat": {"id": -1001, "type": "channel"}}
            })))
            .mount(&mock_server)
            .await;

        let sent = bot(mock_server.uri())
            .send_message("@ai_news", "&lt;b&gt; hi")
            .await
            .unwrap();

        assert_eq!(sent.message_id, 42);
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 429,
                "description": "Too Many Requests: retry after 5",
                "parameters": {"retry_after": 5}
            })))
            .mount(&mock_server)
            .await;

        let result = bot(mock_server.uri()).send_message("1", "x").await;

        assert!(matches!(
            result,
            Err(SendError::RateLimited(Some(d))) if d == Duration::from_secs(5)
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_and_bad_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/getMe"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "ok": false, "error_code": 401, "description": "Unauthorized"
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false, "error_code": 400, "description": "Bad Request: chat not found"
            })))
            .mount(&mock_server)
            .await;

        let bot = bot(mock_server.uri());
        assert!(matches!(bot.get_me().await, Err(SendError::Auth(_))));

        match bot.send_message("1", "x").await {
            Err(SendError::Api {
                status,
                description,
            }) => {
                assert_eq!(status, 400);
                assert!(description.contains("chat not found"));
            }
            other => panic!("unexpected result: {:?}", other.map(|m| m.message_id)),
        }
    }

    #[tokio::test]
    async fn test_get_updates() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/getUpdates"))
            .and(body_partial_json(serde_json::json!({"offset": 11, "timeout": 0})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": [
                    {"update_id": 11, "message": {"message_id": 1, "chat": {"id": 5, "type": "private"}, "text": "/start"}},
                    {"update_id": 12}
                ]
            })))
            .mount(&mock_server)
            .await;

        let updates = bot(mock_server.uri()).get_updates(Some(11), 0).await.unwrap();

        assert_eq!(updates.len(), 2);
        assert_eq!(
            updates[0].any_message().and_then(|m| m.text.as_deref()),
            Some("/start")
        );
        assert!(updates[1].any_message().is_none());
    }
}
